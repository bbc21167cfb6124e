use std::{ops::Index, time::Duration};

use shakmaty::Color;

use crate::{
	board::Board,
	state::{AbandonedTurn, MoveOrigin, Sides, TurnRecord},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SideStats {
	pub thinking: Duration,
	pub illegal_moves: u32,
	pub provider_failures: u32,
	pub fallback_moves: u32,
	pub moves: u32,
}

/// Running per-side totals. Holds nothing that cannot be rebuilt from the
/// turn history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameStats {
	sides: Sides<SideStats>,
}
impl GameStats {
	pub fn new() -> Self {
		GameStats::default()
	}

	pub fn from_history(turns: &[TurnRecord], abandoned: Option<&AbandonedTurn>) -> Self {
		let mut stats = GameStats::new();
		for turn in turns {
			stats.record_turn(turn);
		}
		if let Some(abandoned) = abandoned {
			stats.record_abandoned(abandoned);
		}
		stats
	}

	pub fn record_turn(&mut self, turn: &TurnRecord) {
		let side = &mut self.sides[turn.side];
		side.thinking += turn.elapsed;
		side.illegal_moves += turn.illegal_attempts;
		side.provider_failures += turn.provider_failures;
		side.moves += 1;
		if turn.origin == MoveOrigin::Fallback {
			side.fallback_moves += 1;
		}
	}

	pub fn record_abandoned(&mut self, turn: &AbandonedTurn) {
		let side = &mut self.sides[turn.side];
		side.thinking += turn.elapsed;
		side.illegal_moves += turn.illegal_attempts;
		side.provider_failures += turn.provider_failures;
	}

	pub fn side(&self, color: Color) -> &SideStats {
		&self.sides[color]
	}
	pub fn sides(&self) -> &Sides<SideStats> {
		&self.sides
	}

	/// Material on the board: P=1, N=B=3, R=5, Q=9, king not counted.
	pub fn material(board: &Board) -> Sides<u32> {
		board.material()
	}
}
impl Index<Color> for GameStats {
	type Output = SideStats;
	fn index(&self, index: Color) -> &Self::Output {
		self.side(index)
	}
}
