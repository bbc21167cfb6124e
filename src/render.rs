use std::{
	fs::File,
	io::{BufWriter, Cursor},
	path::Path,
	time::Duration,
};

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{
	codecs::gif::{GifEncoder, Repeat},
	imageops, Delay, ImageFormat, Rgba, RgbaImage,
};
use log::{info, warn};
use shakmaty::{Color, File as BoardFile, Rank, Role, Square};

use crate::{
	board::{move_squares, Board, MoveError},
	state::{color_name, GameRecord, Sides, TurnRecord},
	stats::GameStats,
};

const GLYPH_SIZE: u32 = 8;
const TEXT_SCALE: u32 = 2;
const LINE_HEIGHT: u32 = GLYPH_SIZE * TEXT_SCALE + 4;
const PADDING: u32 = 10;
const HEADER_HEIGHT: u32 = 4 * LINE_HEIGHT + PADDING;
const FOOTER_HEIGHT: u32 = 2 * LINE_HEIGHT + PADDING;
const MIN_CANVAS_WIDTH: u32 = 256;

const BACKGROUND: Rgba<u8> = Rgba([0x2c, 0x2f, 0x33, 0xff]);
const TEXT: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const TEXT_SUBTLE: Rgba<u8> = Rgba([0xbb, 0xbb, 0xbb, 0xff]);
const TEXT_WARNING: Rgba<u8> = Rgba([0xff, 0xc8, 0x57, 0xff]);
pub const LIGHT_SQUARE: Rgba<u8> = Rgba([0xf0, 0xd9, 0xb5, 0xff]);
pub const DARK_SQUARE: Rgba<u8> = Rgba([0xb5, 0x88, 0x63, 0xff]);

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
	#[error("board size {0} is not a positive multiple of 8")]
	BoardSize(u32),
	#[error("no glyph for '{0}'")]
	MissingGlyph(char),
	#[error("failed to encode image: {0}")]
	Encode(#[from] image::ImageError),
	#[error("{0}")]
	Other(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
	#[error("turn {ply} ({san}) does not replay: {source}")]
	Move {
		ply: u32,
		san: String,
		#[source]
		source: MoveError,
	},
	#[error("could not write {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error("could not read {path}: {source}")]
	Read {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error("{path} is not a valid game record: {source}")]
	Record {
		path: String,
		#[source]
		source: serde_json::Error,
	},
	#[error("failed to encode GIF: {0}")]
	Encode(#[from] image::ImageError),
	#[error("no frames to encode")]
	Empty,
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32, a: f32) -> Rgba<u8> {
	let s = s.clamp(0.0, 1.0);
	let v = v.clamp(0.0, 1.0);
	let h2 = (h.rem_euclid(1.0)) * 6.0;
	let c = v * s;
	let x = c * (1.0 - (h2 % 2.0 - 1.0).abs());
	let m = v - c;
	let (r1, g1, b1) = if h2 < 1.0 {
		(c, x, 0.0)
	} else if h2 < 2.0 {
		(x, c, 0.0)
	} else if h2 < 3.0 {
		(0.0, c, x)
	} else if h2 < 4.0 {
		(0.0, x, c)
	} else if h2 < 5.0 {
		(x, 0.0, c)
	} else {
		(c, 0.0, x)
	};
	Rgba([
		((r1 + m) * 255.0).round() as u8,
		((g1 + m) * 255.0).round() as u8,
		((b1 + m) * 255.0).round() as u8,
		(a.clamp(0.0, 1.0) * 255.0).round() as u8,
	])
}

fn blend(base: Rgba<u8>, over: Rgba<u8>) -> Rgba<u8> {
	let a = over.0[3] as u32;
	let mix = |b: u8, o: u8| ((b as u32 * (255 - a) + o as u32 * a) / 255) as u8;
	Rgba([mix(base.0[0], over.0[0]), mix(base.0[1], over.0[1]), mix(base.0[2], over.0[2]), 0xff])
}

fn fill_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
	let x_end = (x + w).min(img.width());
	let y_end = (y + h).min(img.height());
	for py in y..y_end {
		for px in x..x_end {
			img.put_pixel(px, py, color);
		}
	}
}

/// Draws a glyph scaled by `scale`; returns false if the font lacks it.
fn draw_glyph(img: &mut RgbaImage, x: i64, y: i64, scale: u32, c: char, color: Rgba<u8>) -> bool {
	let glyph = match BASIC_FONTS.get(c) {
		Some(glyph) => glyph,
		None => return false,
	};
	for (row, bits) in glyph.iter().enumerate() {
		for col in 0..8 {
			if bits & (1 << col) == 0 {
				continue;
			}
			for dy in 0..scale as i64 {
				for dx in 0..scale as i64 {
					let px = x + col as i64 * scale as i64 + dx;
					let py = y + row as i64 * scale as i64 + dy;
					if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
						img.put_pixel(px as u32, py as u32, color);
					}
				}
			}
		}
	}
	true
}

fn draw_text(img: &mut RgbaImage, x: u32, y: u32, scale: u32, text: &str, color: Rgba<u8>) {
	let mut cx = x as i64;
	for c in text.chars() {
		if !draw_glyph(img, cx, y as i64, scale, c, color) {
			draw_glyph(img, cx, y as i64, scale, '?', color);
		}
		cx += (GLYPH_SIZE * scale) as i64;
	}
}

fn format_secs(d: Duration) -> String {
	format!("{:.2}s", d.as_secs_f64())
}

/// Turns a position into pixels. Boards are square, `size` pixels wide.
pub trait BoardRasterizer {
	fn rasterize(&self, board: &Board, size: u32) -> Result<RgbaImage, RenderError>;
}

/// Flat squares with letter glyphs for pieces.
pub struct TileRasterizer {
	pub light: Rgba<u8>,
	pub dark: Rgba<u8>,
	pub last_move: Rgba<u8>,
	pub check: Rgba<u8>,
	pub coordinates: bool,
}
impl Default for TileRasterizer {
	fn default() -> Self {
		TileRasterizer {
			light: LIGHT_SQUARE,
			dark: DARK_SQUARE,
			last_move: hsv_to_rgb(0.15, 0.8, 0.95, 0.5),
			check: hsv_to_rgb(0.0, 0.9, 0.9, 0.6),
			coordinates: true,
		}
	}
}
impl TileRasterizer {
	fn piece_letter(role: Role) -> char {
		role.upper_char()
	}
}
impl BoardRasterizer for TileRasterizer {
	fn rasterize(&self, board: &Board, size: u32) -> Result<RgbaImage, RenderError> {
		if size == 0 || size % 8 != 0 {
			return Err(RenderError::BoardSize(size));
		}
		let tile = size / 8;
		let mut img = RgbaImage::new(size, size);

		let highlighted = board.last_move().map(move_squares);
		let checked_king = if board.is_check() {
			let turn = board.turn();
			(0..64u32).map(|i| Square::from_coords(BoardFile::new(i % 8), Rank::new(i / 8)))
				.find(|squ| board.piece_at(*squ).map_or(false, |p| p.color == turn && p.role == Role::King))
		} else {
			None
		};

		let piece_scale = (tile * 3 / 4 / GLYPH_SIZE).max(1);
		let glyph_px = GLYPH_SIZE * piece_scale;
		for rank in 0..8u32 {
			for file in 0..8u32 {
				let squ = Square::from_coords(BoardFile::new(file), Rank::new(rank));
				let x = file * tile;
				let y = (7 - rank) * tile;
				let mut color = if (file + rank) % 2 == 1 { self.light } else { self.dark };
				if let Some((from, to)) = highlighted {
					if from == Some(squ) || to == squ {
						color = blend(color, self.last_move);
					}
				}
				if checked_king == Some(squ) {
					color = blend(color, self.check);
				}
				fill_rect(&mut img, x, y, tile, tile, color);

				if let Some(piece) = board.piece_at(squ) {
					let letter = TileRasterizer::piece_letter(piece.role);
					let (fill, outline) = match piece.color {
						Color::White => (Rgba([0xff, 0xff, 0xff, 0xff]), Rgba([0x10, 0x10, 0x10, 0xff])),
						Color::Black => (Rgba([0x10, 0x10, 0x10, 0xff]), Rgba([0xf8, 0xf8, 0xf8, 0xff])),
					};
					// glyphs wider than the tile are clipped, not centred
					let inset = (tile as i64 - glyph_px as i64).max(0) / 2;
					let gx = x as i64 + inset;
					let gy = y as i64 + inset;
					for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
						draw_glyph(&mut img, gx + dx, gy + dy, piece_scale, letter, outline);
					}
					if !draw_glyph(&mut img, gx, gy, piece_scale, letter, fill) {
						return Err(RenderError::MissingGlyph(letter));
					}
				}

				if self.coordinates && tile >= 2 * GLYPH_SIZE {
					let ink = if (file + rank) % 2 == 1 { self.dark } else { self.light };
					if file == 0 {
						draw_glyph(&mut img, (x + 1) as i64, (y + 1) as i64, 1, char::from(b'1' + rank as u8), ink);
					}
					if rank == 0 {
						draw_glyph(&mut img, (x + tile - GLYPH_SIZE - 1) as i64, (y + tile - GLYPH_SIZE - 1) as i64, 1,
							char::from(b'a' + file as u8), ink);
					}
				}
			}
		}
		Ok(img)
	}
}

/// PNG of the current position with the last move highlighted, for image prompts.
pub fn board_png(board: &Board, size: u32) -> Result<Vec<u8>, RenderError> {
	let img = TileRasterizer::default().rasterize(board, size)?;
	let mut buf = Cursor::new(Vec::new());
	img.write_to(&mut buf, ImageFormat::Png)?;
	Ok(buf.into_inner())
}

/// Position and cumulative statistics after `ply` half-moves.
#[derive(Clone, Debug)]
pub struct Snapshot {
	pub ply: usize,
	pub board: Board,
	pub stats: GameStats,
	pub last_san: Option<String>,
	pub label: Option<String>,
}

pub fn snapshots(start: &Board, record: &GameRecord) -> Result<Vec<Snapshot>, ReplayError> {
	let mut board = start.restart();
	let mut stats = GameStats::new();
	let mut res = Vec::with_capacity(record.turns.len() + 1);
	res.push(snapshot(&board, &stats, None));
	for turn in &record.turns {
		replay_turn(&mut board, turn)?;
		stats.record_turn(turn);
		res.push(snapshot(&board, &stats, Some(turn.san.clone())));
	}
	if let Some(last) = res.last_mut() {
		if let Some(abandoned) = &record.abandoned {
			last.stats.record_abandoned(abandoned);
		}
		if last.board.termination().is_none() {
			if let Some(reason) = &record.reason {
				last.label = Some(format!("{}", reason));
			}
		}
	}
	Ok(res)
}

fn replay_turn(board: &mut Board, turn: &TurnRecord) -> Result<(), ReplayError> {
	match board.push_san(&turn.san) {
		Ok(_) => Ok(()),
		Err(err) => board.push_san(&turn.uci).map(|_| ()).map_err(|_| ReplayError::Move {
			ply: turn.ply,
			san: turn.san.clone(),
			source: err,
		}),
	}
}

fn snapshot(board: &Board, stats: &GameStats, last_san: Option<String>) -> Snapshot {
	let label = match board.termination() {
		Some(reason) => Some(format!("{}", reason)),
		None if board.is_check() => Some("check".to_owned()),
		None => None,
	};
	Snapshot { ply: board.ply(), board: board.clone(), stats: stats.clone(), last_san, label }
}

/// A rendered frame, or a text-only stand-in when rasterization failed.
#[derive(Debug)]
pub enum Frame {
	Rendered(RgbaImage),
	Degraded {
		image: RgbaImage,
		error: RenderError,
	},
}
impl Frame {
	pub fn image(&self) -> &RgbaImage {
		match self {
			Frame::Rendered(image) | Frame::Degraded { image, .. } => image,
		}
	}
	pub fn into_image(self) -> RgbaImage {
		match self {
			Frame::Rendered(image) | Frame::Degraded { image, .. } => image,
		}
	}
	pub fn is_degraded(&self) -> bool {
		matches!(self, Frame::Degraded { .. })
	}
}

#[derive(Clone, PartialEq, Debug)]
pub struct RenderSettings {
	pub board_size: u32,
	pub fps: u32,
	pub final_hold: Duration,
	/// 1 (best, slowest) to 30 (fastest).
	pub gif_speed: i32,
}
impl Default for RenderSettings {
	fn default() -> Self {
		RenderSettings { board_size: 400, fps: 2, final_hold: Duration::from_secs(4), gif_speed: 10 }
	}
}
impl RenderSettings {
	pub fn frame_delay(&self) -> Duration {
		Duration::from_millis(1000 / self.fps.max(1) as u64)
	}
	fn canvas_width(&self) -> u32 {
		self.board_size.max(MIN_CANVAS_WIDTH)
	}
	fn canvas_height(&self) -> u32 {
		HEADER_HEIGHT + self.canvas_width() + FOOTER_HEIGHT
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RenderSummary {
	pub frames: usize,
	pub degraded: usize,
}

pub struct Renderer<R: BoardRasterizer = TileRasterizer> {
	rasterizer: R,
	settings: RenderSettings,
}
impl Renderer<TileRasterizer> {
	pub fn new(settings: RenderSettings) -> Self {
		Renderer::with_rasterizer(TileRasterizer::default(), settings)
	}
}
impl<R: BoardRasterizer> Renderer<R> {
	pub fn with_rasterizer(rasterizer: R, settings: RenderSettings) -> Self {
		Renderer { rasterizer, settings }
	}

	pub fn settings(&self) -> &RenderSettings {
		&self.settings
	}

	fn draw_panels(&self, canvas: &mut RgbaImage, names: &Sides<String>, snap: &Snapshot) {
		let material = snap.board.material();
		let mut y = PADDING / 2;
		for color in [Color::White, Color::Black] {
			let side = snap.stats.side(color);
			draw_text(canvas, PADDING, y, TEXT_SCALE, &format!("{}: {}", color_name(color), names[color]), TEXT);
			y += LINE_HEIGHT;
			let line = format!("Time {} | Illegal {} | Mat {}", format_secs(side.thinking), side.illegal_moves, material[color]);
			draw_text(canvas, PADDING, y, 1, &line, TEXT_SUBTLE);
			y += LINE_HEIGHT;
		}

		let footer_y = HEADER_HEIGHT + self.settings.canvas_width() + PADDING / 2;
		let mut status = format!("Move {} | Turn: {}", snap.board.fullmoves(), color_name(snap.board.turn()));
		if let Some(san) = &snap.last_san {
			status.push_str(&format!(" | Last: {}", san));
		}
		draw_text(canvas, PADDING, footer_y, TEXT_SCALE, &status, TEXT);
		if let Some(label) = &snap.label {
			draw_text(canvas, PADDING, footer_y + LINE_HEIGHT, 1, label, TEXT_WARNING);
		}
	}

	fn degraded_board(&self, canvas: &mut RgbaImage, snap: &Snapshot, error: &RenderError) {
		let mut y = HEADER_HEIGHT + PADDING;
		for line in snap.board.ascii().lines() {
			draw_text(canvas, PADDING, y, TEXT_SCALE, line, TEXT);
			y += LINE_HEIGHT;
		}
		y += LINE_HEIGHT;
		draw_text(canvas, PADDING, y, 1, &format!("render failed: {}", error), TEXT_WARNING);
	}

	pub fn frame(&self, names: &Sides<String>, snap: &Snapshot) -> Frame {
		let width = self.settings.canvas_width();
		let mut canvas = RgbaImage::from_pixel(width, self.settings.canvas_height(), BACKGROUND);
		self.draw_panels(&mut canvas, names, snap);
		match self.rasterizer.rasterize(&snap.board, self.settings.board_size) {
			Ok(board_img) => {
				let x = (width - board_img.width().min(width)) / 2;
				imageops::overlay(&mut canvas, &board_img, x as i64, HEADER_HEIGHT as i64);
				Frame::Rendered(canvas)
			},
			Err(error) => {
				warn!("ply {}: board rasterization failed, using text frame: {}", snap.ply, error);
				self.degraded_board(&mut canvas, snap, &error);
				Frame::Degraded { image: canvas, error }
			},
		}
	}

	pub fn frames(&self, record: &GameRecord) -> Result<Vec<Frame>, ReplayError> {
		let names = record.names();
		let snaps = snapshots(&Board::new(), record)?;
		Ok(snaps.iter().map(|snap| self.frame(&names, snap)).collect())
	}

	/// Every frame shows for one frame period; the last one is held longer.
	pub fn write_gif(&self, frames: Vec<Frame>, path: &Path) -> Result<RenderSummary, ReplayError> {
		if frames.is_empty() {
			return Err(ReplayError::Empty);
		}
		let io_err = |source| ReplayError::Io { path: path.display().to_string(), source };
		let file = File::create(path).map_err(io_err)?;
		let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), self.settings.gif_speed.clamp(1, 30));
		encoder.set_repeat(Repeat::Infinite)?;

		let summary = RenderSummary {
			frames: frames.len(),
			degraded: frames.iter().filter(|f| f.is_degraded()).count(),
		};
		let last = frames.len() - 1;
		for (i, frame) in frames.into_iter().enumerate() {
			let delay = if i == last { self.settings.final_hold } else { self.settings.frame_delay() };
			encoder.encode_frame(image::Frame::from_parts(frame.into_image(), 0, 0,
				Delay::from_saturating_duration(delay)))?;
		}
		drop(encoder);
		Ok(summary)
	}

	pub fn render_record(&self, record: &GameRecord, path: &Path) -> Result<RenderSummary, ReplayError> {
		let frames = self.frames(record)?;
		info!("encoding {} frames into {}", frames.len(), path.display());
		let summary = self.write_gif(frames, path)?;
		if summary.degraded > 0 {
			warn!("{} of {} frames fell back to text", summary.degraded, summary.frames);
		}
		Ok(summary)
	}
}

#[cfg(test)]
mod test_render {
	use std::time::Duration;

	use shakmaty::Color;

	use super::*;
	use crate::state::{FinishReason, MoveOrigin};

	fn record(line: &str) -> GameRecord {
		let mut board = Board::new();
		let mut turns = vec![];
		for (ply, san) in line.split_ascii_whitespace().enumerate() {
			let side = board.turn();
			let mov = board.push_san(san).unwrap();
			turns.push(TurnRecord {
				ply: ply as u32,
				side,
				san: board.san_history()[ply].clone(),
				uci: crate::board::uci_notation(&mov),
				elapsed: Duration::from_millis(250 * (ply as u64 + 1)),
				model_time: Duration::from_millis(200 * (ply as u64 + 1)),
				illegal_attempts: (ply % 3) as u32,
				provider_failures: 0,
				origin: MoveOrigin::Model,
			});
		}
		GameRecord {
			white: "gpt-4.1".to_owned(),
			black: "gemini/gemini-2.0-flash".to_owned(),
			result: board.termination().map_or("*", |r| r.result()).to_owned(),
			reason: board.termination(),
			turns,
			abandoned: None,
		}
	}

	fn small() -> RenderSettings {
		RenderSettings { board_size: 64, fps: 4, final_hold: Duration::from_secs(1), gif_speed: 30 }
	}

	fn temp_path(name: &str) -> std::path::PathBuf {
		std::env::temp_dir().join(format!("arena-{}-{}.gif", name, std::process::id()))
	}

	struct BrokenRasterizer;
	impl BoardRasterizer for BrokenRasterizer {
		fn rasterize(&self, _board: &Board, _size: u32) -> Result<RgbaImage, RenderError> {
			Err(RenderError::Other("no display".to_owned()))
		}
	}

	#[test]
	fn snapshots_track_history() {
		let rec = record("f3 e5 g4 Qh4#");
		let snaps = snapshots(&Board::new(), &rec).unwrap();
		assert_eq!(snaps.len(), rec.turns.len() + 1);
		assert_eq!(snaps[0].ply, 0);
		assert!(snaps[0].last_san.is_none());
		assert_eq!(snaps[2].stats, GameStats::from_history(&rec.turns[..2], None));
		let last = snaps.last().unwrap();
		assert_eq!(last.stats, GameStats::from_history(&rec.turns, None));
		assert_eq!(last.last_san.as_deref(), Some("Qh4#"));
		assert_eq!(last.label.as_deref(), Some("checkmate, Black wins"));
	}

	#[test]
	fn abort_label_on_final_frame() {
		let mut rec = record("e4 e5");
		rec.reason = Some(FinishReason::Abort { side: Color::White });
		let snaps = snapshots(&Board::new(), &rec).unwrap();
		assert!(snaps.last().unwrap().label.as_deref().unwrap().contains("White failed"));
		assert!(snaps[1].label.is_none());
	}

	#[test]
	fn corrupt_history_is_reported() {
		let mut rec = record("e4 e5");
		rec.turns[1].san = "Ke3".to_owned();
		rec.turns[1].uci = "e8e6".to_owned();
		match snapshots(&Board::new(), &rec) {
			Err(ReplayError::Move { ply, .. }) => assert_eq!(ply, 1),
			other => panic!("unexpected {:?}", other.map(|s| s.len())),
		}
	}

	#[test]
	fn last_move_is_highlighted() {
		let mut board = Board::new();
		board.push_san("e4").unwrap();
		let raster = TileRasterizer::default();
		let img = raster.rasterize(&board, 400).unwrap();
		let tile = 50;
		// top-left corner of e2, f3 and a8 (file, rank from white's side)
		let corner = |file: u32, rank: u32| *img.get_pixel(file * tile + 3, (7 - rank) * tile + 3);
		assert_ne!(corner(4, 1), LIGHT_SQUARE);
		assert_eq!(corner(5, 2), LIGHT_SQUARE);
		assert_eq!(corner(4, 3), blend(LIGHT_SQUARE, raster.last_move));
	}

	#[test]
	fn rejects_odd_board_size() {
		assert!(matches!(TileRasterizer::default().rasterize(&Board::new(), 60), Err(RenderError::BoardSize(60))));
	}

	#[test]
	fn small_boards() {
		let mut board = Board::new();
		board.push_san("e4").unwrap();
		for size in [8, 16, 56, 64, 128] {
			let img = TileRasterizer::default().rasterize(&board, size).unwrap();
			assert_eq!(img.dimensions(), (size, size));
		}
		for size in [16, 48] {
			let png = board_png(&board, size).unwrap();
			assert_eq!(&png[..4], b"\x89PNG");
		}
	}

	#[test]
	fn png_for_prompts() {
		let png = board_png(&Board::new(), 64).unwrap();
		assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
	}

	#[test]
	fn frames_share_dimensions() {
		let rec = record("e4 e5 Nf3");
		let renderer = Renderer::new(small());
		let frames = renderer.frames(&rec).unwrap();
		assert_eq!(frames.len(), 4);
		assert!(frames.iter().all(|f| !f.is_degraded()));
		let dims = frames[0].image().dimensions();
		assert!(frames.iter().all(|f| f.image().dimensions() == dims));
	}

	#[test]
	fn rasterizer_failure_degrades_frames() {
		let rec = record("d4 d5");
		let renderer = Renderer::with_rasterizer(BrokenRasterizer, small());
		let frames = renderer.frames(&rec).unwrap();
		assert_eq!(frames.len(), 3);
		assert!(frames.iter().all(|f| f.is_degraded()));

		let path = temp_path("degraded");
		let summary = renderer.write_gif(frames, &path).unwrap();
		assert_eq!(summary, RenderSummary { frames: 3, degraded: 3 });
		assert!(std::fs::metadata(&path).unwrap().len() > 0);
		std::fs::remove_file(&path).unwrap();
	}

	#[test]
	fn writes_gif() {
		let rec = record("f3 e5 g4 Qh4#");
		let path = temp_path("mate");
		let summary = Renderer::new(small()).render_record(&rec, &path).unwrap();
		assert_eq!(summary, RenderSummary { frames: 5, degraded: 0 });
		let bytes = std::fs::read(&path).unwrap();
		assert_eq!(&bytes[..6], b"GIF89a");
		std::fs::remove_file(&path).unwrap();
	}

	#[test]
	fn empty_gif_is_an_error() {
		let renderer = Renderer::new(small());
		assert!(matches!(renderer.write_gif(vec![], &temp_path("empty")), Err(ReplayError::Empty)));
	}

	#[test]
	fn colours() {
		assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0, 1.0), Rgba([255, 0, 0, 255]));
		assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0, 0.0), Rgba([0, 255, 0, 0]));
		assert_eq!(blend(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 0])), Rgba([0, 0, 0, 255]));
	}
}
