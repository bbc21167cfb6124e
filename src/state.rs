use std::{fmt, ops::{Index, IndexMut}, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use shakmaty::Color;

pub fn color_name(color: Color) -> &'static str {
	match color {
		Color::White => "White",
		Color::Black => "Black",
	}
}

/// One value per side of the board.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sides<T> {
	pub white: T,
	pub black: T,
}
impl<T> Sides<T> {
	pub fn new(white: T, black: T) -> Self {
		Sides { white, black }
	}
	pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Sides<U> {
		Sides { white: f(self.white), black: f(self.black) }
	}
}
impl<T> Index<Color> for Sides<T> {
	type Output = T;
	fn index(&self, index: Color) -> &Self::Output {
		match index {
			Color::White => &self.white,
			Color::Black => &self.black,
		}
	}
}
impl<T> IndexMut<Color> for Sides<T> {
	fn index_mut(&mut self, index: Color) -> &mut Self::Output {
		match index {
			Color::White => &mut self.white,
			Color::Black => &mut self.black,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputKind {
	Text,
	Image,
}
impl FromStr for InputKind {
	type Err = String;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"text" | "ascii" => Ok(InputKind::Text),
			"image" => Ok(InputKind::Image),
			_ => Err(format!("input must be 'text' or 'image', got '{}'", s)),
		}
	}
}
impl fmt::Display for InputKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", match self {
			InputKind::Text => "text",
			InputKind::Image => "image",
		})
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FallbackPolicy {
	Abort,
	Random,
}
impl FromStr for FallbackPolicy {
	type Err = String;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"abort" => Ok(FallbackPolicy::Abort),
			"random" => Ok(FallbackPolicy::Random),
			_ => Err(format!("on_failure must be 'abort' or 'random', got '{}'", s)),
		}
	}
}
impl fmt::Display for FallbackPolicy {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", match self {
			FallbackPolicy::Abort => "abort",
			FallbackPolicy::Random => "random",
		})
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LlmConfig {
	pub model: String,
	pub input: InputKind,
	/// Re-prompts allowed after the first attempt.
	pub max_retries: u32,
	pub fallback: FallbackPolicy,
}
impl LlmConfig {
	pub const DEFAULT_MAX_RETRIES: u32 = 3;

	pub fn new(model: impl Into<String>) -> Self {
		LlmConfig {
			model: model.into(),
			input: InputKind::Text,
			max_retries: LlmConfig::DEFAULT_MAX_RETRIES,
			fallback: FallbackPolicy::Abort,
		}
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PlayerConfig {
	Llm(LlmConfig),
	Human,
	Random,
	FirstLegal,
}
impl FromStr for PlayerConfig {
	type Err = String;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		match s {
			"" => Err(format!("empty seat description")),
			"human" => Ok(PlayerConfig::Human),
			"random" => Ok(PlayerConfig::Random),
			"first-legal" | "first_legal" => Ok(PlayerConfig::FirstLegal),
			model => Ok(PlayerConfig::Llm(LlmConfig::new(model))),
		}
	}
}
impl fmt::Display for PlayerConfig {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			PlayerConfig::Llm(cfg) => write!(f, "LLM {}", cfg.model),
			PlayerConfig::Human => write!(f, "Human"),
			PlayerConfig::Random => write!(f, "Random"),
			PlayerConfig::FirstLegal => write!(f, "FirstLegal"),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOrigin {
	Model,
	Fallback,
	Human,
	Scripted,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TurnRecord {
	/// Zero-based half-move index.
	pub ply: u32,
	#[serde(with = "color_serde")]
	pub side: Color,
	pub san: String,
	pub uci: String,
	#[serde(with = "duration_secs")]
	pub elapsed: Duration,
	/// Part of `elapsed` spent waiting on model calls.
	#[serde(default, with = "duration_secs")]
	pub model_time: Duration,
	pub illegal_attempts: u32,
	pub provider_failures: u32,
	pub origin: MoveOrigin,
}

/// A turn that ended without a move being played (abort or quit).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AbandonedTurn {
	#[serde(with = "color_serde")]
	pub side: Color,
	#[serde(with = "duration_secs")]
	pub elapsed: Duration,
	#[serde(default, with = "duration_secs")]
	pub model_time: Duration,
	pub illegal_attempts: u32,
	pub provider_failures: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawRule {
	FiftyMove,
	InsufficientMaterial,
	Repetition,
}
impl fmt::Display for DrawRule {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", match self {
			DrawRule::FiftyMove => "fifty-move rule",
			DrawRule::InsufficientMaterial => "insufficient material",
			DrawRule::Repetition => "threefold repetition",
		})
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualCause {
	MoveLimit,
	PlayerQuit,
	Requested,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
	Checkmate {
		#[serde(with = "color_serde")]
		winner: Color,
	},
	Stalemate,
	Draw(DrawRule),
	/// The side could not produce a legal move and its fallback policy was abort.
	Abort {
		#[serde(with = "color_serde")]
		side: Color,
	},
	Manual(ManualCause),
}
impl FinishReason {
	pub fn result(&self) -> &'static str {
		match self {
			FinishReason::Checkmate { winner: Color::White } => "1-0",
			FinishReason::Checkmate { winner: Color::Black } => "0-1",
			FinishReason::Abort { side: Color::White } => "0-1",
			FinishReason::Abort { side: Color::Black } => "1-0",
			FinishReason::Stalemate | FinishReason::Draw(_) => "1/2-1/2",
			FinishReason::Manual(_) => "*",
		}
	}
}
impl fmt::Display for FinishReason {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			FinishReason::Checkmate { winner } => write!(f, "checkmate, {} wins", color_name(*winner)),
			FinishReason::Stalemate => write!(f, "stalemate"),
			FinishReason::Draw(rule) => write!(f, "draw by {}", rule),
			FinishReason::Abort { side } => write!(f, "{} failed to provide a legal move, game aborted", color_name(*side)),
			FinishReason::Manual(ManualCause::MoveLimit) => write!(f, "move limit reached"),
			FinishReason::Manual(ManualCause::PlayerQuit) => write!(f, "player quit"),
			FinishReason::Manual(ManualCause::Requested) => write!(f, "terminated"),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameStatus {
	NotStarted,
	InProgress,
	Finished(FinishReason),
}

/// Everything needed to replay and re-render a finished game.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GameRecord {
	pub white: String,
	pub black: String,
	pub result: String,
	pub reason: Option<FinishReason>,
	pub turns: Vec<TurnRecord>,
	pub abandoned: Option<AbandonedTurn>,
}
impl GameRecord {
	pub fn names(&self) -> Sides<String> {
		Sides::new(self.white.clone(), self.black.clone())
	}
}

mod color_serde {
	use serde::{de::Error, Deserialize, Deserializer, Serializer};
	use shakmaty::Color;

	pub fn serialize<S: Serializer>(color: &Color, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_str(match color {
			Color::White => "white",
			Color::Black => "black",
		})
	}
	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Color, D::Error> {
		let s = String::deserialize(d)?;
		match s.as_str() {
			"white" => Ok(Color::White),
			"black" => Ok(Color::Black),
			_ => Err(D::Error::custom(format!("unknown color '{}'", s))),
		}
	}
}

mod duration_secs {
	use std::time::Duration;

	use serde::{de::Error, Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(dur: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_f64(dur.as_secs_f64())
	}
	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		let secs = f64::deserialize(d)?;
		Duration::try_from_secs_f64(secs).map_err(|e| D::Error::custom(format!("invalid duration {}: {}", secs, e)))
	}
}

#[cfg(test)]
mod test_state {
	use std::time::Duration;

	use shakmaty::Color;

	use super::*;

	#[test]
	fn seat_descriptions() {
		assert_eq!("human".parse::<PlayerConfig>().unwrap(), PlayerConfig::Human);
		assert_eq!("first-legal".parse::<PlayerConfig>().unwrap(), PlayerConfig::FirstLegal);
		match "anthropic/claude-sonnet-4-20250514".parse::<PlayerConfig>().unwrap() {
			PlayerConfig::Llm(cfg) => {
				assert_eq!(cfg.model, "anthropic/claude-sonnet-4-20250514");
				assert_eq!(cfg.input, InputKind::Text);
				assert_eq!(cfg.fallback, FallbackPolicy::Abort);
			},
			other => panic!("unexpected seat {:?}", other),
		}
		assert!("  ".parse::<PlayerConfig>().is_err());
		assert_eq!("ASCII".parse::<InputKind>().unwrap(), InputKind::Text);
		assert!("coin-flip".parse::<FallbackPolicy>().is_err());
	}

	#[test]
	fn sides_index_by_color() {
		let mut sides = Sides::new(1, 2);
		sides[Color::Black] += 10;
		assert_eq!(sides[Color::White], 1);
		assert_eq!(sides[Color::Black], 12);
		assert_eq!(sides.map(|n| n * 2), Sides::new(2, 24));
	}

	#[test]
	fn results() {
		assert_eq!(FinishReason::Checkmate { winner: Color::Black }.result(), "0-1");
		assert_eq!(FinishReason::Abort { side: Color::Black }.result(), "1-0");
		assert_eq!(FinishReason::Draw(DrawRule::Repetition).result(), "1/2-1/2");
		assert_eq!(FinishReason::Manual(ManualCause::MoveLimit).result(), "*");
	}

	#[test]
	fn record_json() {
		let record = GameRecord {
			white: "gpt-4.1".to_owned(),
			black: "Random".to_owned(),
			result: "0-1".to_owned(),
			reason: Some(FinishReason::Abort { side: Color::White }),
			turns: vec![TurnRecord {
				ply: 0, side: Color::White, san: "e4".to_owned(), uci: "e2e4".to_owned(),
				elapsed: Duration::from_millis(1500), model_time: Duration::from_millis(1250),
				illegal_attempts: 1, provider_failures: 0, origin: MoveOrigin::Model,
			}],
			abandoned: Some(AbandonedTurn {
				side: Color::White, elapsed: Duration::from_secs(3), model_time: Duration::from_secs(2),
				illegal_attempts: 4, provider_failures: 1,
			}),
		};
		let json = serde_json::to_string(&record).unwrap();
		assert!(json.contains("\"side\":\"white\""));
		assert!(json.contains("\"elapsed\":1.5"));
		assert!(json.contains("\"model_time\":1.25"));
		let back: GameRecord = serde_json::from_str(&json).unwrap();
		assert_eq!(back, record);
	}

	#[test]
	fn records_without_model_time() {
		let json = r#"{"ply":0,"side":"black","san":"e5","uci":"e7e5","elapsed":0.5,
			"illegal_attempts":0,"provider_failures":0,"origin":"human"}"#;
		let turn: TurnRecord = serde_json::from_str(json).unwrap();
		assert_eq!(turn.model_time, Duration::ZERO);
		assert_eq!(turn.elapsed, Duration::from_millis(500));
	}
}
