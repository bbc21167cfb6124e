use std::time::{Duration, Instant};

use log::{info, warn};
use shakmaty::Color;

use crate::{
	board::{uci_notation, Board},
	players::{Decision, Forfeit, Player},
	state::{color_name, AbandonedTurn, FinishReason, GameRecord, GameStatus, ManualCause, Sides, TurnRecord},
	stats::GameStats,
};

const BRIGHT_RED: &str = "\x1b[1;31m";
const YELLOW: &str = "\x1b[1;33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub struct Game {
	board: Board,
	players: Sides<Box<dyn Player>>,
	names: Sides<String>,
	history: Vec<TurnRecord>,
	stats: GameStats,
	status: GameStatus,
	abandoned: Option<AbandonedTurn>,
	max_plies: Option<u32>,
	verbose: bool,
}
impl Game {
	pub fn new(players: Sides<Box<dyn Player>>) -> Self {
		Game::from_board(Board::new(), players)
	}
	pub fn from_board(board: Board, players: Sides<Box<dyn Player>>) -> Self {
		let names = Sides::new(players.white.name(), players.black.name());
		Game {
			board,
			players,
			names,
			history: vec![],
			stats: GameStats::new(),
			status: GameStatus::NotStarted,
			abandoned: None,
			max_plies: None,
			verbose: false,
		}
	}
	pub fn with_max_plies(mut self, max_plies: Option<u32>) -> Self {
		self.max_plies = max_plies;
		self
	}
	/// Prints a transcript of every turn to stdout.
	pub fn set_verbose(&mut self, verbose: bool) {
		self.verbose = verbose;
	}

	pub fn board(&self) -> &Board {
		&self.board
	}
	pub fn names(&self) -> &Sides<String> {
		&self.names
	}
	pub fn history(&self) -> &[TurnRecord] {
		&self.history
	}
	pub fn stats(&self) -> &GameStats {
		&self.stats
	}
	pub fn status(&self) -> GameStatus {
		self.status
	}
	pub fn abandoned(&self) -> Option<&AbandonedTurn> {
		self.abandoned.as_ref()
	}
	pub fn finish_reason(&self) -> Option<FinishReason> {
		match self.status {
			GameStatus::Finished(reason) => Some(reason),
			_ => None,
		}
	}

	/// Plays until the game is over.
	pub fn run(&mut self) -> FinishReason {
		if self.status == GameStatus::NotStarted {
			info!("{} (White) vs {} (Black)", self.names.white, self.names.black);
		}
		loop {
			if let GameStatus::Finished(reason) = self.step() {
				return reason;
			}
		}
	}

	/// Plays at most one half-move.
	pub fn step(&mut self) -> GameStatus {
		if let GameStatus::Finished(_) = self.status {
			return self.status;
		}
		self.status = GameStatus::InProgress;
		if let Some(reason) = self.turn() {
			self.finish(reason);
		}
		self.status
	}

	/// Stops the game from outside; has no effect once it is over.
	pub fn terminate(&mut self) -> FinishReason {
		match self.status {
			GameStatus::Finished(reason) => reason,
			_ => self.finish(FinishReason::Manual(ManualCause::Requested)),
		}
	}

	fn turn(&mut self) -> Option<FinishReason> {
		if let Some(reason) = self.board.termination() {
			return Some(reason);
		}
		if self.max_plies.map_or(false, |max| self.history.len() >= max as usize) {
			return Some(FinishReason::Manual(ManualCause::MoveLimit));
		}

		let side = self.board.turn();
		if self.verbose {
			self.print_turn_header(side);
		}
		let start = Instant::now();
		let decision = self.players[side].choose_move(&self.board);
		let elapsed = start.elapsed();

		match decision {
			Ok(decision) => self.play(side, decision, elapsed),
			Err(Forfeit::Abort { illegal_attempts, provider_failures, model_time }) => {
				if self.verbose {
					println!("\n{}{} ({}) failed to provide a valid move. Game aborted.{}",
						BRIGHT_RED, color_name(side), self.names[side], RESET);
				}
				self.abandon(AbandonedTurn { side, elapsed, model_time, illegal_attempts, provider_failures });
				Some(FinishReason::Abort { side })
			},
			Err(Forfeit::Quit { illegal_attempts }) => {
				info!("{} ({}) left the game", color_name(side), self.names[side]);
				self.abandon(AbandonedTurn {
					side, elapsed, model_time: Duration::ZERO, illegal_attempts, provider_failures: 0,
				});
				Some(FinishReason::Manual(ManualCause::PlayerQuit))
			},
		}
	}

	fn play(&mut self, side: Color, decision: Decision, elapsed: Duration) -> Option<FinishReason> {
		let san = match self.board.push(&decision.mov) {
			Ok(san) => san,
			Err(e) => {
				warn!("{} ({}) chose a move the board rejected: {}", color_name(side), self.names[side], e);
				self.abandon(AbandonedTurn {
					side,
					elapsed,
					model_time: decision.model_time,
					illegal_attempts: decision.illegal_attempts + 1,
					provider_failures: decision.provider_failures,
				});
				return Some(FinishReason::Abort { side });
			},
		};
		let record = TurnRecord {
			ply: self.history.len() as u32,
			side,
			san,
			uci: uci_notation(&decision.mov),
			elapsed,
			model_time: decision.model_time,
			illegal_attempts: decision.illegal_attempts,
			provider_failures: decision.provider_failures,
			origin: decision.origin,
		};
		self.stats.record_turn(&record);
		if self.verbose {
			self.print_turn_result(&record);
		}
		self.history.push(record);
		None
	}

	fn abandon(&mut self, turn: AbandonedTurn) {
		self.stats.record_abandoned(&turn);
		self.abandoned = Some(turn);
	}

	fn finish(&mut self, reason: FinishReason) -> FinishReason {
		self.status = GameStatus::Finished(reason);
		info!("game over after {} plies: {} ({})", self.history.len(), reason.result(), reason);
		if self.verbose {
			self.print_summary(reason);
		}
		reason
	}

	pub fn record(&self) -> GameRecord {
		let reason = self.finish_reason();
		GameRecord {
			white: self.names.white.clone(),
			black: self.names.black.clone(),
			result: reason.map_or("*", |r| r.result()).to_owned(),
			reason,
			turns: self.history.clone(),
			abandoned: self.abandoned.clone(),
		}
	}

	fn print_turn_header(&self, side: Color) {
		let material = self.board.material();
		println!("\n{}", "=".repeat(40));
		println!("{}  Move: {}   |   Player: {} ({}){}", YELLOW, self.board.fullmoves(), color_name(side), self.names[side], RESET);
		println!("{}", "=".repeat(40));
		println!("{}", self.board.ascii());
		println!("FEN: {}", self.board.fen());
		println!("Material: White ({}) - Black ({})", material.white, material.black);
	}

	fn print_turn_result(&self, record: &TurnRecord) {
		let totals = self.stats.side(record.side);
		let name = color_name(record.side);
		println!("\n{}{} plays: {}{}", BOLD, name, record.san, RESET);
		println!("Time for this move: {:.2} seconds", record.elapsed.as_secs_f64());
		if record.model_time > Duration::ZERO {
			println!("  of which waiting on the model: {:.2} seconds", record.model_time.as_secs_f64());
		}
		println!("Total thinking time for {}: {:.2} seconds", name, totals.thinking.as_secs_f64());
		println!("Total illegal moves for {}: {}", name, totals.illegal_moves);
		if record.provider_failures > 0 {
			println!("{}Model call failures this turn: {}{}", BRIGHT_RED, record.provider_failures, RESET);
		}
	}

	fn print_summary(&self, reason: FinishReason) {
		println!("\n{}", "#".repeat(40));
		println!("{}{}GAME OVER{}", " ".repeat(15), BOLD, RESET);
		println!("{}", "#".repeat(40));
		println!("\nResult: {} ({})", reason.result(), reason);
		println!("Final Board:\n{}", self.board.ascii());
		println!("\n--- Final Statistics ---");
		for side in [Color::White, Color::Black] {
			let totals = self.stats.side(side);
			println!("\nPlayer {} ({}):", color_name(side), self.names[side]);
			println!("  Moves played: {}", totals.moves);
			println!("  Total thinking time: {:.2} seconds", totals.thinking.as_secs_f64());
			println!("  Total illegal moves: {}", totals.illegal_moves);
			if totals.provider_failures > 0 {
				println!("  Model call failures: {}", totals.provider_failures);
			}
			if totals.fallback_moves > 0 {
				println!("  Random fallback moves: {}", totals.fallback_moves);
			}
		}
	}
}

#[cfg(test)]
mod test_game {
	use rand::{rngs::StdRng, SeedableRng};
	use shakmaty::Color;

	use super::*;
	use crate::{
		llm::scripted::ScriptedClient,
		negotiate::Negotiator,
		players::{FirstLegalPlayer, LlmPlayer, RandomPlayer, ScriptedPlayer},
		state::{DrawRule, FallbackPolicy, LlmConfig, MoveOrigin},
	};

	fn seats(white: impl Player + 'static, black: impl Player + 'static) -> Sides<Box<dyn Player>> {
		Sides::new(Box::new(white), Box::new(black))
	}

	fn replay(record: &GameRecord) -> Board {
		let mut board = Board::new();
		for turn in &record.turns {
			board.push_san(&turn.san).unwrap();
		}
		board
	}

	fn assert_consistent(game: &Game) {
		let history = game.history();
		assert_eq!(history.len(), game.board().ply());
		for (i, turn) in history.iter().enumerate() {
			assert_eq!(turn.ply as usize, i);
			assert_eq!(turn.side, if i % 2 == 0 { Color::White } else { Color::Black });
		}
		assert_eq!(*game.stats(), GameStats::from_history(history, game.abandoned()));
		assert_eq!(replay(&game.record()).fen(), game.board().fen());
	}

	#[test]
	fn first_legal_selfplay_terminates() {
		let mut game = Game::new(seats(FirstLegalPlayer, FirstLegalPlayer)).with_max_plies(Some(400));
		assert_eq!(game.status(), GameStatus::NotStarted);
		let reason = game.run();
		assert_eq!(game.status(), GameStatus::Finished(reason));
		assert!(!game.history().is_empty());
		match reason {
			FinishReason::Manual(ManualCause::MoveLimit) => assert_eq!(game.history().len(), 400),
			_ => assert_eq!(game.board().termination(), Some(reason)),
		}
		assert_consistent(&game);
	}

	#[test]
	fn random_games_stay_consistent() {
		for seed in 0..5 {
			let mut game = Game::new(seats(
				RandomPlayer::new(StdRng::seed_from_u64(seed)),
				RandomPlayer::new(StdRng::seed_from_u64(seed + 100)),
			)).with_max_plies(Some(150));
			game.run();
			assert_consistent(&game);
		}
	}

	#[test]
	fn fools_mate() {
		let mut game = Game::new(seats(
			ScriptedPlayer::new("white", ["f3", "g4"]),
			ScriptedPlayer::new("black", ["e5", "Qh4#"]),
		));
		assert_eq!(game.run(), FinishReason::Checkmate { winner: Color::Black });
		let record = game.record();
		assert_eq!(record.result, "0-1");
		assert_eq!(record.turns.len(), 4);
		assert_eq!(record.turns[3].san, "Qh4#");
		assert_eq!(record.turns[3].uci, "d8h4");
		assert!(record.abandoned.is_none());
		assert_consistent(&game);
	}

	#[test]
	fn move_limit() {
		let mut game = Game::new(seats(FirstLegalPlayer, FirstLegalPlayer)).with_max_plies(Some(4));
		assert_eq!(game.run(), FinishReason::Manual(ManualCause::MoveLimit));
		assert_eq!(game.history().len(), 4);
		assert_eq!(game.record().result, "*");
	}

	#[test]
	fn threefold_repetition() {
		let shuffle = ["Nf3", "Ng1", "Nf3", "Ng1"];
		let mut game = Game::new(seats(
			ScriptedPlayer::new("white", shuffle),
			ScriptedPlayer::new("black", ["Nf6", "Ng8", "Nf6", "Ng8"]),
		));
		assert_eq!(game.run(), FinishReason::Draw(DrawRule::Repetition));
		assert_eq!(game.history().len(), 8);
	}

	#[test]
	fn abort_stops_negotiation() {
		let config = LlmConfig { max_retries: 1, fallback: FallbackPolicy::Abort, ..LlmConfig::new("gpt-4.1") };
		let client = ScriptedClient::new(["e4", "nonsense", "Ke7", "d4"]);
		let white = LlmPlayer::new(Negotiator::new(client, config));
		let mut game = Game::new(seats(white, FirstLegalPlayer));
		assert_eq!(game.run(), FinishReason::Abort { side: Color::White });
		assert_eq!(game.history().len(), 2);
		let abandoned = game.abandoned().unwrap();
		assert_eq!(abandoned.side, Color::White);
		assert_eq!(abandoned.illegal_attempts, 2);
		assert_eq!(game.stats()[Color::White].illegal_moves, 2);
		assert_eq!(game.stats()[Color::White].moves, 1);
		assert_eq!(game.record().result, "0-1");
		assert_consistent(&game);
		let (white_turn, black_turn) = (&game.history()[0], &game.history()[1]);
		assert!(white_turn.model_time <= white_turn.elapsed);
		assert_eq!(black_turn.model_time, Duration::ZERO);
		assert!(abandoned.model_time <= abandoned.elapsed);

		// finished games do not ask for more moves
		assert_eq!(game.run(), FinishReason::Abort { side: Color::White });
		assert_eq!(game.step(), GameStatus::Finished(FinishReason::Abort { side: Color::White }));
		assert_eq!(game.history().len(), 2);
	}

	#[test]
	fn random_fallback_is_recorded() {
		let config = LlmConfig { max_retries: 0, fallback: FallbackPolicy::Random, ..LlmConfig::new("gpt-4.1") };
		let client = ScriptedClient::new(["I cannot decide"]);
		let white = LlmPlayer::new(Negotiator::new(client, config).with_rng(StdRng::seed_from_u64(9)));
		let mut game = Game::new(seats(white, FirstLegalPlayer)).with_max_plies(Some(1));
		game.run();
		assert_eq!(game.history()[0].origin, MoveOrigin::Fallback);
		assert_eq!(game.stats()[Color::White].fallback_moves, 1);
		assert_eq!(game.stats()[Color::White].illegal_moves, 1);
	}

	#[test]
	fn quitting() {
		let mut game = Game::new(seats(ScriptedPlayer::new("white", ["e4"]), FirstLegalPlayer));
		assert_eq!(game.run(), FinishReason::Manual(ManualCause::PlayerQuit));
		assert_eq!(game.history().len(), 2);
		assert_eq!(game.record().result, "*");
		assert_eq!(game.abandoned().map(|a| a.side), Some(Color::White));
	}

	#[test]
	fn terminate_before_start() {
		let mut game = Game::new(seats(FirstLegalPlayer, FirstLegalPlayer));
		assert_eq!(game.terminate(), FinishReason::Manual(ManualCause::Requested));
		assert_eq!(game.step(), GameStatus::Finished(FinishReason::Manual(ManualCause::Requested)));
		assert!(game.history().is_empty());
	}

	#[test]
	fn stepping() {
		let mut game = Game::new(seats(FirstLegalPlayer, FirstLegalPlayer));
		assert_eq!(game.step(), GameStatus::InProgress);
		assert_eq!(game.step(), GameStatus::InProgress);
		assert_eq!(game.history().len(), 2);
		assert_eq!(game.terminate(), FinishReason::Manual(ManualCause::Requested));
		assert_eq!(game.record().turns.len(), 2);
	}

	#[test]
	fn record_json() {
		let mut game = Game::new(seats(
			ScriptedPlayer::new("white", ["e4", "Bc4", "Qh5", "Qxf7#"]),
			ScriptedPlayer::new("black", ["e5", "Nc6", "Nf6"]),
		));
		assert_eq!(game.run(), FinishReason::Checkmate { winner: Color::White });
		let record = game.record();
		let json = serde_json::to_string_pretty(&record).unwrap();
		let back: GameRecord = serde_json::from_str(&json).unwrap();
		assert_eq!(back, record);
		assert_eq!(replay(&back).fen(), game.board().fen());
	}

	#[test]
	fn custom_start_position() {
		let board = Board::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
		let mut game = Game::from_board(board, seats(ScriptedPlayer::new("white", ["Ra8#"]), FirstLegalPlayer));
		assert_eq!(game.run(), FinishReason::Checkmate { winner: Color::White });
		assert_eq!(game.history().len(), 1);
	}
}
