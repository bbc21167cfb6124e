use std::{
	io::{BufRead, StdinLock, Stdout, Write},
	time::Duration,
};

use log::{info, warn};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use shakmaty::Move;

use crate::{
	board::Board,
	llm::{supports_vision, ClientSettings, HttpModelClient, ModelClient, ModelError},
	negotiate::Negotiator,
	state::{InputKind, LlmConfig, MoveOrigin, PlayerConfig},
};

const BRIGHT_RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// A move chosen for the side to move.
#[derive(Clone, PartialEq, Debug)]
pub struct Decision {
	pub mov: Move,
	pub illegal_attempts: u32,
	pub provider_failures: u32,
	/// Time spent waiting on the model; zero for other players.
	pub model_time: Duration,
	pub origin: MoveOrigin,
}
impl Decision {
	fn clean(mov: Move, origin: MoveOrigin) -> Self {
		Decision { mov, illegal_attempts: 0, provider_failures: 0, model_time: Duration::ZERO, origin }
	}
}

/// A turn that ends the game without a move.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Forfeit {
	/// No legal move could be obtained and the fallback policy is abort.
	Abort { illegal_attempts: u32, provider_failures: u32, model_time: Duration },
	/// The player left the game.
	Quit { illegal_attempts: u32 },
}

pub trait Player {
	fn name(&self) -> String;
	fn choose_move(&mut self, board: &Board) -> Result<Decision, Forfeit>;
}

pub struct LlmPlayer<C: ModelClient> {
	negotiator: Negotiator<C>,
}
impl<C: ModelClient> LlmPlayer<C> {
	pub fn new(negotiator: Negotiator<C>) -> Self {
		let config = negotiator.config();
		if config.input == InputKind::Image && !supports_vision(&config.model) {
			warn!("{} may not support vision; image prompts will be sent anyway", config.model);
		}
		info!("LLM player {} (input: {}, max retries: {}, on failure: {})",
			config.model, config.input, config.max_retries, config.fallback);
		LlmPlayer { negotiator }
	}
	pub fn negotiator(&self) -> &Negotiator<C> {
		&self.negotiator
	}
}
impl<C: ModelClient> Player for LlmPlayer<C> {
	fn name(&self) -> String {
		self.negotiator.config().model.clone()
	}
	fn choose_move(&mut self, board: &Board) -> Result<Decision, Forfeit> {
		match self.negotiator.negotiate(board) {
			Ok(res) => Ok(Decision {
				mov: res.mov,
				illegal_attempts: res.illegal_attempts,
				provider_failures: res.provider_failures,
				model_time: res.elapsed,
				origin: if res.fallback { MoveOrigin::Fallback } else { MoveOrigin::Model },
			}),
			Err(exhausted) => Err(Forfeit::Abort {
				illegal_attempts: exhausted.illegal_attempts,
				provider_failures: exhausted.provider_failures,
				model_time: exhausted.elapsed,
			}),
		}
	}
}

/// Reads moves from a line-oriented input; `quit` or `resign` leaves the game.
pub struct HumanPlayer<R: BufRead, W: Write> {
	name: String,
	input: R,
	output: W,
}
impl HumanPlayer<StdinLock<'static>, Stdout> {
	pub fn console() -> Self {
		HumanPlayer::new("Human", std::io::stdin().lock(), std::io::stdout())
	}
}
impl<R: BufRead, W: Write> HumanPlayer<R, W> {
	pub fn new(name: impl Into<String>, input: R, output: W) -> Self {
		HumanPlayer { name: name.into(), input, output }
	}
	pub fn output(&self) -> &W {
		&self.output
	}

	fn read_line(&mut self, board: &Board) -> std::io::Result<Option<String>> {
		writeln!(self.output, "\nYour turn. Legal moves: {}", board.legal_san().join(" "))?;
		write!(self.output, "Enter your move in SAN: ")?;
		self.output.flush()?;
		let mut line = String::new();
		if self.input.read_line(&mut line)? == 0 {
			return Ok(None);
		}
		Ok(Some(line.trim().to_owned()))
	}
}
impl<R: BufRead, W: Write> Player for HumanPlayer<R, W> {
	fn name(&self) -> String {
		self.name.clone()
	}
	fn choose_move(&mut self, board: &Board) -> Result<Decision, Forfeit> {
		let mut illegal_attempts = 0;
		loop {
			let line = match self.read_line(board) {
				Ok(Some(line)) => line,
				Ok(None) => return Err(Forfeit::Quit { illegal_attempts }),
				Err(e) => {
					warn!("could not read move: {}", e);
					return Err(Forfeit::Quit { illegal_attempts });
				},
			};
			if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("resign") {
				return Err(Forfeit::Quit { illegal_attempts });
			}
			match board.parse_move(&line) {
				Ok(mov) => return Ok(Decision {
					mov, illegal_attempts, provider_failures: 0, model_time: Duration::ZERO, origin: MoveOrigin::Human,
				}),
				Err(e) => {
					illegal_attempts += 1;
					if let Err(e) = writeln!(self.output, "{}{}. Please try again.{}", BRIGHT_RED, e, RESET) {
						warn!("could not write to the player: {}", e);
						return Err(Forfeit::Quit { illegal_attempts });
					}
				},
			}
		}
	}
}

pub struct RandomPlayer {
	rng: StdRng,
}
impl RandomPlayer {
	pub fn new(rng: StdRng) -> Self {
		RandomPlayer { rng }
	}
}
impl Player for RandomPlayer {
	fn name(&self) -> String {
		"Random".to_string()
	}
	fn choose_move(&mut self, board: &Board) -> Result<Decision, Forfeit> {
		match board.legal_moves().choose(&mut self.rng) {
			Some(mov) => Ok(Decision::clean(mov.clone(), MoveOrigin::Scripted)),
			None => Err(Forfeit::Abort { illegal_attempts: 0, provider_failures: 0, model_time: Duration::ZERO }),
		}
	}
}

/// Always plays the first move in generation order.
pub struct FirstLegalPlayer;
impl Player for FirstLegalPlayer {
	fn name(&self) -> String {
		"FirstLegal".to_string()
	}
	fn choose_move(&mut self, board: &Board) -> Result<Decision, Forfeit> {
		match board.legal_moves().into_iter().next() {
			Some(mov) => Ok(Decision::clean(mov, MoveOrigin::Scripted)),
			None => Err(Forfeit::Abort { illegal_attempts: 0, provider_failures: 0, model_time: Duration::ZERO }),
		}
	}
}

/// Plays a fixed line of SAN moves, then quits.
pub struct ScriptedPlayer {
	name: String,
	moves: Vec<String>,
	next: usize,
}
impl ScriptedPlayer {
	pub fn new<S: Into<String>>(name: impl Into<String>, moves: impl IntoIterator<Item = S>) -> Self {
		ScriptedPlayer { name: name.into(), moves: moves.into_iter().map(Into::into).collect(), next: 0 }
	}
}
impl Player for ScriptedPlayer {
	fn name(&self) -> String {
		self.name.clone()
	}
	fn choose_move(&mut self, board: &Board) -> Result<Decision, Forfeit> {
		let san = match self.moves.get(self.next) {
			Some(san) => san,
			None => return Err(Forfeit::Quit { illegal_attempts: 0 }),
		};
		self.next += 1;
		match board.parse_move(san) {
			Ok(mov) => Ok(Decision::clean(mov, MoveOrigin::Scripted)),
			Err(e) => {
				warn!("{}: scripted move rejected: {}", self.name, e);
				Err(Forfeit::Abort { illegal_attempts: 1, provider_failures: 0, model_time: Duration::ZERO })
			},
		}
	}
}

/// Builds the player for one seat. Each player gets its own generator
/// derived from `rng` so seeded games are reproducible.
pub fn build_player(config: &PlayerConfig, settings: &ClientSettings, image_size: u32, rng: &mut StdRng)
	-> Result<Box<dyn Player>, ModelError>
{
	let seed: u64 = rng.gen();
	Ok(match config {
		PlayerConfig::Llm(llm) => Box::new(llm_player(llm, settings, image_size, StdRng::seed_from_u64(seed))?),
		PlayerConfig::Human => Box::new(HumanPlayer::console()),
		PlayerConfig::Random => Box::new(RandomPlayer::new(StdRng::seed_from_u64(seed))),
		PlayerConfig::FirstLegal => Box::new(FirstLegalPlayer),
	})
}

fn llm_player(config: &LlmConfig, settings: &ClientSettings, image_size: u32, rng: StdRng)
	-> Result<LlmPlayer<HttpModelClient>, ModelError>
{
	let client = HttpModelClient::new(settings.clone())?;
	let negotiator = Negotiator::new(client, config.clone())
		.with_image_size(image_size)
		.with_rng(rng);
	Ok(LlmPlayer::new(negotiator))
}
