use shakmaty::{
	fen::Fen,
	san::{San, SanError},
	CastlingMode, Chess, Color, EnPassantMode, File, Move, Piece, Position, Rank, Role, Square,
};

use crate::state::{DrawRule, FinishReason, Sides};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
	#[error("'{0}' is not a move in standard algebraic notation")]
	Unparseable(String),
	#[error("'{0}' is not a legal move in this position")]
	Illegal(String),
	#[error("'{0}' is ambiguous in this position")]
	Ambiguous(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid FEN '{fen}': {reason}")]
pub struct FenError {
	pub fen: String,
	pub reason: String,
}

pub fn piece_value(role: Role) -> u32 {
	match role {
		Role::Pawn => 1,
		Role::Knight | Role::Bishop => 3,
		Role::Rook => 5,
		Role::Queen => 9,
		Role::King => 0,
	}
}

/// Origin and destination squares as a player sees them. Castling moves go
/// from the king's square to its destination, not to the rook.
pub fn move_squares(mov: &Move) -> (Option<Square>, Square) {
	match mov {
		Move::Castle { king, rook } => {
			let file = if rook.file() > king.file() { File::G } else { File::C };
			(Some(*king), Square::from_coords(file, king.rank()))
		},
		_ => (mov.from(), mov.to()),
	}
}

pub fn uci_notation(mov: &Move) -> String {
	let (from, to) = move_squares(mov);
	let mut res = match from {
		Some(from) => format!("{}{}", from, to),
		None => format!("{}@{}", mov.role().upper_char(), to),
	};
	if let Some(promote_to) = mov.promotion() {
		res.push(promote_to.char());
	}
	res
}

/// Accepts the common spellings models produce: `0-0`, `e8Q`, trailing `+`, `#`, `!`, `?`.
pub fn normalize_san(s: &str) -> String {
	let mut s = s.trim().trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?')).to_owned();
	if s == "0-0" || s == "0-0-0" {
		s = s.replace('0', "O");
	}
	let b = s.as_bytes();
	if b.len() >= 3 && matches!(b[b.len() - 1], b'Q' | b'R' | b'B' | b'N') && b[b.len() - 2].is_ascii_digit() {
		s.insert(s.len() - 1, '=');
	}
	s
}

/// The game position plus everything the rules library does not track by
/// itself: the move list, SAN history and repetition keys.
#[derive(Clone, Debug)]
pub struct Board {
	start: Chess,
	pos: Chess,
	moves: Vec<Move>,
	sans: Vec<String>,
	seen: Vec<String>,
}
impl Default for Board {
	fn default() -> Self {
		Board::from_position(Chess::default())
	}
}
impl Board {
	pub fn new() -> Self {
		Board::default()
	}

	pub fn from_fen(fen: &str) -> Result<Board, FenError> {
		let err = |reason: String| FenError { fen: fen.to_owned(), reason };
		let parsed: Fen = fen.parse().map_err(|e| err(format!("{}", e)))?;
		let pos: Chess = parsed.into_position(CastlingMode::Standard).map_err(|e| err(format!("{}", e)))?;
		Ok(Board::from_position(pos))
	}

	fn from_position(pos: Chess) -> Board {
		let key = repetition_key(&pos);
		Board { start: pos.clone(), pos, moves: vec![], sans: vec![], seen: vec![key] }
	}

	/// A fresh board at this board's starting position.
	pub fn restart(&self) -> Board {
		Board::from_position(self.start.clone())
	}

	pub fn position(&self) -> &Chess {
		&self.pos
	}
	pub fn turn(&self) -> Color {
		self.pos.turn()
	}
	pub fn fullmoves(&self) -> u32 {
		self.pos.fullmoves().get()
	}
	pub fn ply(&self) -> usize {
		self.moves.len()
	}
	pub fn moves(&self) -> &[Move] {
		&self.moves
	}
	pub fn san_history(&self) -> &[String] {
		&self.sans
	}
	pub fn last_move(&self) -> Option<&Move> {
		self.moves.last()
	}
	pub fn is_check(&self) -> bool {
		self.pos.is_check()
	}
	pub fn piece_at(&self, square: Square) -> Option<Piece> {
		self.pos.board().piece_at(square)
	}

	pub fn legal_moves(&self) -> Vec<Move> {
		self.pos.legal_moves().into_iter().collect()
	}
	pub fn legal_san(&self) -> Vec<String> {
		self.pos.legal_moves().iter().map(|mov| self.san(mov)).collect()
	}
	pub fn is_legal(&self, mov: &Move) -> bool {
		self.pos.legal_moves().contains(mov)
	}

	/// SAN with check and checkmate suffixes.
	pub fn san(&self, mov: &Move) -> String {
		let mut res = San::from_move(&self.pos, mov).to_string();
		let mut after = self.pos.clone();
		after.play_unchecked(mov);
		if after.is_checkmate() {
			res.push('#');
		} else if after.is_check() {
			res.push('+');
		}
		res
	}

	/// Resolves SAN against the position; coordinate notation (`e2e4`) is
	/// accepted as well since models sometimes answer that way.
	pub fn parse_move(&self, s: &str) -> Result<Move, MoveError> {
		let res = self.parse_san(s);
		if res.is_err() {
			if let Some(mov) = self.parse_uci(s) {
				return Ok(mov);
			}
		}
		res
	}

	fn parse_san(&self, s: &str) -> Result<Move, MoveError> {
		let normalized = normalize_san(s);
		let san: San = normalized.parse().map_err(|_| MoveError::Unparseable(s.to_owned()))?;
		match san.to_move(&self.pos) {
			Ok(mov) => Ok(mov),
			Err(SanError::AmbiguousSan) => Err(MoveError::Ambiguous(s.to_owned())),
			Err(SanError::IllegalSan) => Err(MoveError::Illegal(s.to_owned())),
		}
	}

	fn parse_uci(&self, s: &str) -> Option<Move> {
		let s = s.trim().to_ascii_lowercase();
		if s.len() != 4 && s.len() != 5 {
			return None;
		}
		self.pos.legal_moves().into_iter().find(|mov| uci_notation(mov) == s)
	}

	/// Plays a legal move and returns its SAN.
	pub fn push(&mut self, mov: &Move) -> Result<String, MoveError> {
		if !self.is_legal(mov) {
			return Err(MoveError::Illegal(uci_notation(mov)));
		}
		let san = self.san(mov);
		self.pos.play_unchecked(mov);
		self.moves.push(mov.clone());
		self.sans.push(san.clone());
		self.seen.push(repetition_key(&self.pos));
		Ok(san)
	}

	pub fn push_san(&mut self, s: &str) -> Result<Move, MoveError> {
		let mov = self.parse_move(s)?;
		self.push(&mov)?;
		Ok(mov)
	}

	pub fn repetitions(&self) -> usize {
		let current = self.seen.last();
		self.seen.iter().filter(|key| Some(*key) == current).count()
	}

	pub fn termination(&self) -> Option<FinishReason> {
		if self.pos.is_checkmate() {
			Some(FinishReason::Checkmate { winner: self.pos.turn().other() })
		} else if self.pos.is_stalemate() {
			Some(FinishReason::Stalemate)
		} else if self.pos.is_insufficient_material() {
			Some(FinishReason::Draw(DrawRule::InsufficientMaterial))
		} else if self.pos.halfmoves() >= 100 {
			Some(FinishReason::Draw(DrawRule::FiftyMove))
		} else if self.repetitions() >= 3 {
			Some(FinishReason::Draw(DrawRule::Repetition))
		} else {
			None
		}
	}

	pub fn fen(&self) -> String {
		Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string()
	}

	/// Rank 8 first, `.` for empty squares, uppercase for white.
	pub fn ascii(&self) -> String {
		let mut res = String::new();
		for rank in (0..8u32).rev() {
			for file in 0..8u32 {
				let squ = Square::from_coords(File::new(file), Rank::new(rank));
				let c = self.piece_at(squ).map_or('.', |piece| piece.char());
				res.push(c);
				if file != 7 {
					res.push(' ');
				}
			}
			if rank != 0 {
				res.push('\n');
			}
		}
		res
	}

	pub fn material(&self) -> Sides<u32> {
		let mut sum = Sides::new(0, 0);
		for rank in 0..8u32 {
			for file in 0..8u32 {
				let squ = Square::from_coords(File::new(file), Rank::new(rank));
				if let Some(piece) = self.piece_at(squ) {
					sum[piece.color] += piece_value(piece.role);
				}
			}
		}
		sum
	}

	/// Move history formatted as `1. e4 e5 2. Nf3`.
	pub fn numbered_history(&self) -> String {
		let mut res = String::new();
		let start_black = self.start.turn() == Color::Black;
		let mut number = self.start.fullmoves().get();
		for (i, san) in self.sans.iter().enumerate() {
			let white_to_move = (i % 2 == 0) != start_black;
			if white_to_move {
				if !res.is_empty() {
					res.push(' ');
				}
				res.push_str(&format!("{}. {}", number, san));
			} else {
				if i == 0 {
					res.push_str(&format!("{}... {}", number, san));
				} else {
					res.push(' ');
					res.push_str(san);
				}
				number += 1;
			}
		}
		res
	}
}

fn repetition_key(pos: &Chess) -> String {
	let fen = Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string();
	fen.split(' ').take(4).collect::<Vec<_>>().join(" ")
}
