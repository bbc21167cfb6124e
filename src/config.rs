use std::{path::{Path, PathBuf}, time::Duration};

use log::info;
use toml::{Table, Value};

use crate::{
	llm::{ClientSettings, Provider},
	render::RenderSettings,
	state::{LlmConfig, PlayerConfig, Sides},
};

pub const DEFAULT_CONFIG_FILE: &str = "arena_config.toml";

#[derive(Clone, PartialEq, Debug)]
pub struct RenderConfig {
	pub enabled: bool,
	pub settings: RenderSettings,
	pub output_dir: PathBuf,
}
impl Default for RenderConfig {
	fn default() -> Self {
		RenderConfig { enabled: true, settings: RenderSettings::default(), output_dir: PathBuf::from(".") }
	}
}

#[derive(Clone, PartialEq, Debug)]
pub struct ArenaConfig {
	pub players: Sides<PlayerConfig>,
	pub max_plies: Option<u32>,
	pub verbose: bool,
	pub seed: Option<u64>,
	pub render: RenderConfig,
	pub client: ClientSettings,
}
impl Default for ArenaConfig {
	fn default() -> Self {
		ArenaConfig {
			players: Sides::new(
				PlayerConfig::Llm(LlmConfig::new("gemini/gemini-2.0-flash")),
				PlayerConfig::Llm(LlmConfig::new("gpt-4.1")),
			),
			max_plies: None,
			verbose: true,
			seed: None,
			render: RenderConfig::default(),
			client: ClientSettings::default(),
		}
	}
}

/// Typed access to one `[section]` of the file, with error messages that
/// name the file and the key.
struct Section<'a> {
	file: &'a str,
	name: &'a str,
	table: Option<&'a Table>,
}
impl<'a> Section<'a> {
	fn new(file: &'a str, config: &'a Table, name: &'a str) -> Result<Self, String> {
		let table = match config.get(name) {
			None => None,
			Some(Value::Table(table)) => Some(table),
			Some(_) => return Err(format!("{}: {} is not a table", file, name)),
		};
		Ok(Section { file, name, table })
	}

	fn get(&self, key: &str) -> Option<&'a Value> {
		self.table.and_then(|table| table.get(key))
	}
	fn err(&self, key: &str, problem: &str) -> String {
		format!("{}: {}.{} {}", self.file, self.name, key, problem)
	}

	fn integer(&self, key: &str) -> Result<Option<i64>, String> {
		match self.get(key) {
			None => Ok(None),
			Some(Value::Integer(val)) => Ok(Some(*val)),
			Some(_) => Err(self.err(key, "is not an integer")),
		}
	}
	fn positive(&self, key: &str) -> Result<Option<u32>, String> {
		match self.integer(key)? {
			None => Ok(None),
			Some(val) if val > 0 && val <= u32::MAX as i64 => Ok(Some(val as u32)),
			Some(_) => Err(self.err(key, "is not a positive integer")),
		}
	}
	fn non_negative(&self, key: &str) -> Result<Option<u32>, String> {
		match self.integer(key)? {
			None => Ok(None),
			Some(val) if val >= 0 && val <= u32::MAX as i64 => Ok(Some(val as u32)),
			Some(_) => Err(self.err(key, "is negative")),
		}
	}
	fn float(&self, key: &str) -> Result<Option<f64>, String> {
		match self.get(key) {
			None => Ok(None),
			Some(Value::Float(val)) => Ok(Some(*val)),
			Some(Value::Integer(val)) => Ok(Some(*val as f64)),
			Some(_) => Err(self.err(key, "is not a number")),
		}
	}
	fn seconds(&self, key: &str) -> Result<Option<Duration>, String> {
		match self.float(key)? {
			None => Ok(None),
			Some(secs) => Duration::try_from_secs_f64(secs)
				.map(Some)
				.map_err(|_| self.err(key, "is not a valid number of seconds")),
		}
	}
	fn string(&self, key: &str) -> Result<Option<&'a str>, String> {
		match self.get(key) {
			None => Ok(None),
			Some(Value::String(val)) => Ok(Some(val.as_str())),
			Some(_) => Err(self.err(key, "is not a string")),
		}
	}
	fn boolean(&self, key: &str) -> Result<Option<bool>, String> {
		match self.get(key) {
			None => Ok(None),
			Some(Value::Boolean(val)) => Ok(Some(*val)),
			Some(_) => Err(self.err(key, "is not a boolean")),
		}
	}
	fn parsed<T: std::str::FromStr<Err = String>>(&self, key: &str) -> Result<Option<T>, String> {
		match self.string(key)? {
			None => Ok(None),
			Some(val) => val.parse().map(Some).map_err(|e| format!("{}: {}.{}: {}", self.file, self.name, key, e)),
		}
	}
}

fn load_seat(file: &str, config: &Table, name: &str, default: PlayerConfig) -> Result<PlayerConfig, String> {
	let section = Section::new(file, config, name)?;
	let mut seat = section.parsed::<PlayerConfig>("player")?.unwrap_or(default);

	let input = section.parsed("input")?;
	let max_retries = section.non_negative("max_retries")?;
	let fallback = section.parsed("on_failure")?;
	match &mut seat {
		PlayerConfig::Llm(llm) => {
			if let Some(input) = input {
				llm.input = input;
			}
			if let Some(max_retries) = max_retries {
				llm.max_retries = max_retries;
			}
			if let Some(fallback) = fallback {
				llm.fallback = fallback;
			}
		},
		other => {
			if input.is_some() || max_retries.is_some() || fallback.is_some() {
				return Err(format!("{}: {} is {}, model options do not apply", file, name, other));
			}
		},
	}
	Ok(seat)
}

fn load_client(file: &str, config: &Table) -> Result<ClientSettings, String> {
	let section = Section::new(file, config, "llm")?;
	let mut client = ClientSettings::default();
	if let Some(max_tokens) = section.positive("max_tokens")? {
		client.max_tokens = max_tokens;
	}
	if let Some(temperature) = section.float("temperature")? {
		if !(0.0..=2.0).contains(&temperature) {
			return Err(section.err("temperature", "is not in [0, 2]"));
		}
		client.temperature = temperature as f32;
	}
	if let Some(timeout) = section.seconds("request_timeout_secs")? {
		client.request_timeout = timeout;
	}
	if let Some(wait) = section.seconds("rate_limit_wait_secs")? {
		client.rate_limit_wait = wait;
	}
	if let Some(waits) = section.non_negative("max_rate_limit_waits")? {
		client.max_rate_limit_waits = waits;
	}
	for provider in Provider::ALL {
		let key = format!("{}_base_url", provider.prefix());
		if let Some(url) = section.string(&key)? {
			client.base_urls.insert(provider, url.to_owned());
		}
	}
	Ok(client)
}

fn load_render(file: &str, config: &Table) -> Result<RenderConfig, String> {
	let section = Section::new(file, config, "render")?;
	let mut render = RenderConfig::default();
	if let Some(enabled) = section.boolean("enabled")? {
		render.enabled = enabled;
	}
	if let Some(size) = section.positive("board_size")? {
		if size % 8 != 0 {
			return Err(section.err("board_size", "is not a multiple of 8"));
		}
		render.settings.board_size = size;
	}
	if let Some(fps) = section.positive("fps")? {
		render.settings.fps = fps;
	}
	if let Some(hold) = section.seconds("final_hold_secs")? {
		render.settings.final_hold = hold;
	}
	if let Some(speed) = section.integer("gif_speed")? {
		if !(1..=30).contains(&speed) {
			return Err(section.err("gif_speed", "is not in [1, 30]"));
		}
		render.settings.gif_speed = speed as i32;
	}
	if let Some(dir) = section.string("output_dir")? {
		render.output_dir = PathBuf::from(dir);
	}
	Ok(render)
}

/// Reads the configuration from TOML text. Missing keys keep their defaults.
pub fn parse_config(text: &str, file: &str) -> Result<ArenaConfig, String> {
	let config = text.parse::<Table>()
		.map_err(|e| format!("{}: invalid syntax: {}", file, e))?;
	let defaults = ArenaConfig::default();

	let game = Section::new(file, &config, "game")?;
	let max_plies = game.positive("max_plies")?;
	let verbose = game.boolean("verbose")?.unwrap_or(defaults.verbose);
	let seed = match game.integer("seed")? {
		Some(seed) if seed < 0 => return Err(game.err("seed", "is negative")),
		seed => seed.map(|s| s as u64),
	};

	Ok(ArenaConfig {
		players: Sides::new(
			load_seat(file, &config, "white", defaults.players.white)?,
			load_seat(file, &config, "black", defaults.players.black)?,
		),
		max_plies,
		verbose,
		seed,
		render: load_render(file, &config)?,
		client: load_client(file, &config)?,
	})
}

/// Loads `path`. A missing file gives the defaults unless `required` is set.
pub fn load_config(path: &Path, required: bool) -> Result<ArenaConfig, String> {
	let file = path.display().to_string();
	match std::fs::read_to_string(path) {
		Ok(text) => parse_config(&text, &file),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
			info!("{} not found, using default settings", file);
			Ok(ArenaConfig::default())
		},
		Err(e) => Err(format!("could not read {}: {}", file, e)),
	}
}
