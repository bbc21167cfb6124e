use std::path::PathBuf;

use arenalib::{
	config::RenderConfig,
	game::Game,
	output::save_game,
	players::{FirstLegalPlayer, Player, RandomPlayer},
	state::Sides,
};
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};

const BRIGHT_RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// Offline game between scripted seats; needs no API keys.
///
/// Both sides play the first legal move unless a seed is given, in which
/// case both play seeded random moves.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
	/// End the game after this many half-moves
	#[arg(long, default_value_t = 400)]
	max_plies: u32,

	/// Directory for the GIF and JSON record
	#[arg(long, default_value = ".")]
	output_dir: PathBuf,

	/// Play seeded random moves instead of first legal moves
	#[arg(long)]
	seed: Option<u64>,

	/// Skip the GIF; only the JSON record is written
	#[arg(long)]
	no_render: bool,
}

fn main() {
	env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
	let cli = Cli::parse();

	let players: Sides<Box<dyn Player>> = match cli.seed {
		Some(seed) => {
			let mut rng = StdRng::seed_from_u64(seed);
			Sides::new(
				Box::new(RandomPlayer::new(StdRng::seed_from_u64(rng.gen()))),
				Box::new(RandomPlayer::new(StdRng::seed_from_u64(rng.gen()))),
			)
		},
		None => Sides::new(Box::new(FirstLegalPlayer), Box::new(FirstLegalPlayer)),
	};
	let mut game = Game::new(players).with_max_plies(Some(cli.max_plies));
	let reason = game.run();
	let stats = game.stats();
	println!("{} plies, {} ({})", game.history().len(), reason.result(), reason);
	println!("final position: {}", game.board().fen());
	println!("thinking time: white {:.3}s, black {:.3}s",
		stats.sides().white.thinking.as_secs_f64(), stats.sides().black.thinking.as_secs_f64());

	let render = RenderConfig { enabled: !cli.no_render, output_dir: cli.output_dir, ..RenderConfig::default() };
	match save_game(&game.record(), &render) {
		Ok(saved) => {
			println!("record: {}", saved.record.display());
			if let Some((gif, _)) = saved.animation {
				println!("animation: {}", gif.display());
			}
		},
		Err(err) => {
			eprintln!("{BRIGHT_RED}error:{RESET} {}", err);
			std::process::exit(1);
		},
	}
}
