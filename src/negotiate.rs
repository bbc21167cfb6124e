use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use shakmaty::Move;

use crate::{
	board::{Board, MoveError},
	extract::{CandidateExtractor, RegexExtractor},
	llm::{ChatMessage, ModelClient, ModelError},
	render::board_png,
	state::{color_name, FallbackPolicy, InputKind, LlmConfig},
};

const FORMAT_RULES: &str = "**Output Format Rules:**
- DO NOT include any explanations, commentary, or conversational text (e.g., \"The best move is...\").
- DO NOT use markdown, code blocks, or quotation marks.
- Your response must be a single, plain text string representing the move.

**Examples of CORRECT output:**
e4
Nf3
Bxg7
O-O
a8=Q

**Examples of INCORRECT output:**
The best move is e4.
\"Nf3\"
`Bxg7`
";

const PREAMBLE: &str = "You are a specialized chess move execution engine. Your output is parsed directly by a computer program. It is critical that you follow the output format precisely. Any deviation will result in a system error.";

fn system_prompt(input: InputKind) -> String {
	let instructions = match input {
		InputKind::Text => "**Instructions:**
1.  Analyze the position provided in the user prompt (FEN, history, etc.).
2.  Determine the single best move.
3.  Your response MUST BE ONLY the move in Standard Algebraic Notation (SAN).",
		InputKind::Image => "**Instructions:**
1.  Analyze the chess board position shown in the image provided.
2.  Consider the game context (FEN, move history) provided in the text.
3.  Determine the single best move for your color.
4.  Your response MUST BE ONLY the move in Standard Algebraic Notation (SAN).",
	};
	format!("{}\n\n{}\n\n{}", PREAMBLE, instructions, FORMAT_RULES)
}

/// Why one attempt did not produce a legal move.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AttemptError {
	/// Holds the trimmed answer.
	#[error("no move in standard algebraic notation was found in '{0}'")]
	Unparseable(String),
	#[error(transparent)]
	Illegal(#[from] MoveError),
	#[error("model call failed: {0}")]
	Provider(#[from] ModelError),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Negotiated {
	pub mov: Move,
	pub san: String,
	pub elapsed: Duration,
	pub illegal_attempts: u32,
	pub provider_failures: u32,
	/// Picked at random after the attempts ran out.
	pub fallback: bool,
}

#[derive(thiserror::Error, Clone, PartialEq, Debug)]
#[error("no legal move after {attempts} attempts")]
pub struct Exhausted {
	pub attempts: u32,
	pub elapsed: Duration,
	pub illegal_attempts: u32,
	pub provider_failures: u32,
	pub last_error: Option<AttemptError>,
}

/// Asks a model for a move until it names a legal one or the attempts run out.
pub struct Negotiator<C: ModelClient> {
	client: C,
	extractor: Box<dyn CandidateExtractor>,
	config: LlmConfig,
	image_size: u32,
	rng: StdRng,
}
impl<C: ModelClient> Negotiator<C> {
	pub const DEFAULT_IMAGE_SIZE: u32 = 400;

	pub fn new(client: C, config: LlmConfig) -> Self {
		Negotiator {
			client,
			extractor: Box::new(RegexExtractor::new()),
			config,
			image_size: Self::DEFAULT_IMAGE_SIZE,
			rng: StdRng::from_entropy(),
		}
	}
	pub fn with_extractor(mut self, extractor: impl CandidateExtractor + 'static) -> Self {
		self.extractor = Box::new(extractor);
		self
	}
	pub fn with_image_size(mut self, size: u32) -> Self {
		self.image_size = size;
		self
	}
	pub fn with_rng(mut self, rng: StdRng) -> Self {
		self.rng = rng;
		self
	}

	pub fn config(&self) -> &LlmConfig {
		&self.config
	}
	pub fn client(&self) -> &C {
		&self.client
	}

	fn board_image(&self, board: &Board) -> Option<Vec<u8>> {
		match board_png(board, self.image_size) {
			Ok(png) => Some(png),
			Err(e) => {
				warn!("failed to render board image, falling back to ASCII: {}", e);
				None
			},
		}
	}

	fn initial_prompt(&self, board: &Board) -> ChatMessage {
		let history = board.numbered_history();
		let mut text = format!("You are playing as {}.\n\nCurrent board state (FEN):\n{}\n\nMove history:\n{}\n\n",
			color_name(board.turn()),
			board.fen(),
			if history.is_empty() { "No moves yet." } else { history.as_str() });
		if self.config.input == InputKind::Image {
			if let Some(png) = self.board_image(board) {
				text.push_str("Please analyze the board position shown in the image.");
				return ChatMessage::user(text).with_png(png);
			}
		}
		text.push_str(&format!("ASCII Board:\n{}\n", board.ascii()));
		ChatMessage::user(text)
	}

	fn feedback(&self, board: &Board, error: &AttemptError) -> ChatMessage {
		let problem = match error {
			AttemptError::Illegal(MoveError::Ambiguous(c)) => format!("Your previous move '{}' was ambiguous.", c),
			AttemptError::Illegal(MoveError::Illegal(c)) => format!("Your previous move '{}' was illegal.", c),
			AttemptError::Illegal(MoveError::Unparseable(c)) => format!("Your previous move '{}' could not be understood.", c),
			AttemptError::Unparseable(answer) if answer.is_empty() => "Your previous answer was empty.".to_owned(),
			AttemptError::Unparseable(answer) => format!("Your previous answer '{}' did not contain a move.", answer),
			AttemptError::Provider(_) => "Your previous answer could not be received.".to_owned(),
		};
		let mut text = format!("{}\nThe current board state is FEN: {}.\n\
			You must adhere to the output format rules and provide a move from the following list of legal moves: [{}]",
			problem, board.fen(), board.legal_san().join(", "));
		if self.config.input == InputKind::Image {
			if let Some(png) = self.board_image(board) {
				text.push_str("\n\nPlease refer to the updated board image.");
				return ChatMessage::user(text).with_png(png);
			}
		}
		ChatMessage::user(text)
	}

	/// First candidate that is legal; otherwise the error of the first one.
	fn select(&self, board: &Board, answer: &str) -> Result<Move, AttemptError> {
		let mut first_error = None;
		for candidate in self.extractor.candidates(answer) {
			match board.parse_move(&candidate) {
				Ok(mov) => return Ok(mov),
				Err(e) => {
					debug!("rejected candidate '{}': {}", candidate, e);
					first_error.get_or_insert(e);
				},
			}
		}
		Err(match first_error {
			Some(e) => AttemptError::Illegal(e),
			None => AttemptError::Unparseable(answer.trim().to_owned()),
		})
	}

	pub fn negotiate(&mut self, board: &Board) -> Result<Negotiated, Exhausted> {
		let model = self.config.model.clone();
		let side = color_name(board.turn());
		let attempts = 1 + self.config.max_retries;
		let mut messages = vec![ChatMessage::system(system_prompt(self.config.input)), self.initial_prompt(board)];

		let mut elapsed = Duration::ZERO;
		let mut illegal_attempts = 0;
		let mut provider_failures = 0;
		let mut last_error = None;
		for attempt in 1..=attempts {
			let start = Instant::now();
			let res = self.client.complete(&model, &messages);
			elapsed += start.elapsed();

			let answer = match res {
				Ok(answer) => answer,
				Err(ModelError::EmptyResponse) => String::new(),
				Err(e) => {
					provider_failures += 1;
					warn!("{} ({}): model call failed (attempt {}/{}): {}", side, model, attempt, attempts, e);
					last_error = Some(AttemptError::Provider(e));
					continue;
				},
			};

			match self.select(board, &answer) {
				Ok(mov) => {
					let san = board.san(&mov);
					debug!("{} ({}) played {} on attempt {}", side, model, san, attempt);
					return Ok(Negotiated { mov, san, elapsed, illegal_attempts, provider_failures, fallback: false });
				},
				Err(e) => {
					illegal_attempts += 1;
					warn!("{} ({}) gave an unusable answer (attempt {}/{}): {}", side, model, attempt, attempts, e);
					if !answer.trim().is_empty() {
						messages.push(ChatMessage::assistant(answer));
					}
					messages.push(self.feedback(board, &e));
					last_error = Some(e);
				},
			}
		}

		warn!("{} ({}) failed to provide a legal move after {} attempts", side, model, attempts);
		if self.config.fallback == FallbackPolicy::Random {
			let legal = board.legal_moves();
			if let Some(mov) = legal.choose(&mut self.rng) {
				let san = board.san(mov);
				info!("{} falls back to random move {}", side, san);
				return Ok(Negotiated {
					mov: mov.clone(), san, elapsed, illegal_attempts, provider_failures, fallback: true,
				});
			}
		}
		Err(Exhausted { attempts, elapsed, illegal_attempts, provider_failures, last_error })
	}
}
