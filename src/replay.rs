use std::path::PathBuf;

use arenalib::{
	config::{load_config, DEFAULT_CONFIG_FILE},
	output::read_record,
	render::Renderer,
};
use clap::Parser;

const BRIGHT_RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// Re-renders the animation of a saved game record.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
	/// JSON game record written by `arena` or `selfplay`
	record: PathBuf,

	/// GIF to write (defaults to the record path with a .gif extension)
	#[arg(long)]
	output: Option<PathBuf>,
}

fn main() {
	env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
	let cli = Cli::parse();

	if let Err(err) = || -> Result<(), String> {
		let config = load_config(DEFAULT_CONFIG_FILE.as_ref(), false)?;
		let record = read_record(&cli.record).map_err(|e| format!("{}", e))?;
		let output = cli.output.clone().unwrap_or_else(|| cli.record.with_extension("gif"));
		let summary = Renderer::new(config.render.settings)
			.render_record(&record, &output)
			.map_err(|e| format!("{}", e))?;
		println!("{} vs {}: {} ({} turns)", record.white, record.black, record.result, record.turns.len());
		println!("wrote {} frames to {}", summary.frames, output.display());
		Ok(())
	}() {
		eprintln!("{BRIGHT_RED}error:{RESET} {}", err);
		std::process::exit(1);
	}
}
