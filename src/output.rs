use std::{
	fs::File,
	io::{BufReader, BufWriter},
	path::{Path, PathBuf},
};

use chrono::Local;
use log::{info, warn};

use crate::{
	config::RenderConfig,
	render::{RenderSummary, Renderer, ReplayError},
	state::GameRecord,
};

/// `game_YYYYMMDD-HHMMSS`, local time.
pub fn timestamp_stem() -> String {
	format!("game_{}", Local::now().format("%Y%m%d-%H%M%S"))
}

fn io_error(path: &Path, source: std::io::Error) -> ReplayError {
	ReplayError::Io { path: path.display().to_string(), source }
}

pub fn write_record(record: &GameRecord, path: &Path) -> Result<(), ReplayError> {
	let file = File::create(path).map_err(|e| io_error(path, e))?;
	serde_json::to_writer_pretty(BufWriter::new(file), record).map_err(|e| io_error(path, e.into()))
}

pub fn read_record(path: &Path) -> Result<GameRecord, ReplayError> {
	let path_str = || path.display().to_string();
	let file = File::open(path).map_err(|source| ReplayError::Read { path: path_str(), source })?;
	serde_json::from_reader(BufReader::new(file)).map_err(|source| ReplayError::Record { path: path_str(), source })
}

#[derive(Debug)]
pub struct SavedGame {
	pub record: PathBuf,
	pub animation: Option<(PathBuf, RenderSummary)>,
}

/// Writes the JSON record and, if rendering is enabled, the GIF next to it.
/// A failed GIF is logged; the record is still kept.
pub fn save_game(record: &GameRecord, render: &RenderConfig) -> Result<SavedGame, ReplayError> {
	std::fs::create_dir_all(&render.output_dir).map_err(|e| io_error(&render.output_dir, e))?;
	let stem = render.output_dir.join(timestamp_stem());
	let record_path = stem.with_extension("json");
	write_record(record, &record_path)?;
	info!("game record written to {}", record_path.display());

	let animation = if render.enabled {
		let gif_path = stem.with_extension("gif");
		match Renderer::new(render.settings.clone()).render_record(record, &gif_path) {
			Ok(summary) => Some((gif_path, summary)),
			Err(e) => {
				warn!("could not render animation: {}", e);
				None
			},
		}
	} else {
		None
	};
	Ok(SavedGame { record: record_path, animation })
}
