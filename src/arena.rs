use std::path::PathBuf;

use arenalib::{
	config::{load_config, DEFAULT_CONFIG_FILE},
	game::Game,
	output::save_game,
	players::build_player,
	state::{PlayerConfig, Sides},
};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};

const BRIGHT_RED: &str = "\x1b[1;31m";
const YELLOW: &str = "\x1b[1;33m";
const RESET: &str = "\x1b[0m";

/// Plays one game of chess between two configured seats.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
	/// Configuration file (defaults apply if the default file is missing)
	#[arg(long)]
	config: Option<PathBuf>,

	/// White seat: human, random, first-legal or a model identifier
	#[arg(long)]
	white: Option<PlayerConfig>,

	/// Black seat: human, random, first-legal or a model identifier
	#[arg(long)]
	black: Option<PlayerConfig>,

	/// End the game after this many half-moves
	#[arg(long)]
	max_plies: Option<u32>,

	/// Skip the GIF; only the JSON record is written
	#[arg(long)]
	no_render: bool,

	/// Directory for the GIF and JSON record
	#[arg(long)]
	output_dir: Option<PathBuf>,

	/// Seed for random players and random fallbacks
	#[arg(long)]
	seed: Option<u64>,
}

fn main() {
	let _ = dotenvy::dotenv();
	env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
	let cli = Cli::parse();

	if let Err(err) = || -> Result<(), String> {
		let mut config = match &cli.config {
			Some(path) => load_config(path, true)?,
			None => load_config(DEFAULT_CONFIG_FILE.as_ref(), false)?,
		};
		if let Some(white) = cli.white.clone() {
			config.players.white = white;
		}
		if let Some(black) = cli.black.clone() {
			config.players.black = black;
		}
		if cli.max_plies.is_some() {
			config.max_plies = cli.max_plies;
		}
		if cli.no_render {
			config.render.enabled = false;
		}
		if let Some(dir) = cli.output_dir.clone() {
			config.render.output_dir = dir;
		}

		println!("{YELLOW}LLM Chess Arena{RESET}: {} vs {}", config.players.white, config.players.black);

		let mut rng = match cli.seed.or(config.seed) {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		};
		let image_size = config.render.settings.board_size;
		let players = Sides::new(
			build_player(&config.players.white, &config.client, image_size, &mut rng).map_err(|e| format!("white: {}", e))?,
			build_player(&config.players.black, &config.client, image_size, &mut rng).map_err(|e| format!("black: {}", e))?,
		);

		let mut game = Game::new(players).with_max_plies(config.max_plies);
		game.set_verbose(config.verbose);
		let reason = game.run();
		println!("\n{YELLOW}Result:{RESET} {} ({})", reason.result(), reason);

		let saved = save_game(&game.record(), &config.render).map_err(|e| format!("{}", e))?;
		println!("Game record: {}", saved.record.display());
		if let Some((gif, summary)) = saved.animation {
			println!("Animation: {} ({} frames)", gif.display(), summary.frames);
		}
		Ok(())
	}() {
		eprintln!("{BRIGHT_RED}error:{RESET} {}", err);
		std::process::exit(1);
	}
}
