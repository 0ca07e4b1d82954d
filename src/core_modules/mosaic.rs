// THEORY:
// The `MosaicComposer` turns the snapshot sequences of all detected events into one
// multi-frame image for visual verification. Every event gets a square tile on a
// near-square grid; frame `f` of the mosaic shows frame `f` of every snapshot, so
// playing the mosaic shows all eclosions happening side by side.
//
// Key architectural principles:
// 1.  **Layout as Pure Math**: `MosaicLayout` and `grid_cell` decide where tile `i`
//     goes without touching pixels. Tile placement and label drawing both ask the
//     same function, so a tile and its label can never disagree.
// 2.  **Near-Square Grid**: `cols = ceil(sqrt(n))` and `rows = ceil(n / cols)`,
//     which always leaves room for every tile.
// 3.  **Uniform Sequences**: All snapshot sequences must have the same number of
//     frames, which becomes the mosaic's frame count.

use crate::core_modules::analyzer::SnapshotSequence;
use crate::core_modules::glyphs;
use crate::error::{EclosionError, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};

const LABEL_OFFSET: u32 = 4;
const LABEL_VALUE: u8 = 255;

/// Maps a 0-based tile index to its `(row, col)` cell on a `rows` x `cols` grid,
/// filling rows left to right.
///
/// This is the integer form of `row = ceil((i + 1) / rows / (cols / rows)) - 1`,
/// `col = i mod cols`: the two divisions by `rows` cancel, leaving
/// `ceil((i + 1) / cols) - 1 = i / cols`.
pub fn grid_cell(tile_index: usize, rows: usize, cols: usize) -> (usize, usize) {
    debug_assert!(cols > 0 && tile_index < rows * cols);
    (tile_index / cols, tile_index % cols)
}

/// Grid geometry for `count` tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicLayout {
    pub count: usize,
    pub cols: usize,
    pub rows: usize,
    pub tile_size: u32,
    pub margin: u32,
}

impl MosaicLayout {
    /// `None` when there is nothing to lay out.
    pub fn new(count: usize, tile_size: u32, margin: u32) -> Option<Self> {
        if count == 0 {
            return None;
        }
        let mut cols = (count as f64).sqrt().ceil() as usize;
        while cols * cols < count {
            cols += 1;
        }
        while cols > 1 && (cols - 1) * (cols - 1) >= count {
            cols -= 1;
        }
        let rows = count.div_ceil(cols);
        Some(Self {
            count,
            cols,
            rows,
            tile_size,
            margin,
        })
    }

    pub fn width(&self) -> u32 {
        self.cols as u32 * self.tile_size + (self.cols as u32 + 1) * self.margin
    }

    pub fn height(&self) -> u32 {
        self.rows as u32 * self.tile_size + (self.rows as u32 + 1) * self.margin
    }

    pub fn cell(&self, tile_index: usize) -> (usize, usize) {
        grid_cell(tile_index, self.rows, self.cols)
    }

    /// Top-left pixel of tile `tile_index`.
    pub fn tile_origin(&self, tile_index: usize) -> (u32, u32) {
        let (row, col) = self.cell(tile_index);
        let along = |coord: usize| coord as u32 * self.tile_size + (coord as u32 + 1) * self.margin;
        (along(col), along(row))
    }
}

/// A text label burned into one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLabel {
    pub text: String,
    /// Left edge of the text.
    pub x: u32,
    /// Text baseline.
    pub baseline: u32,
}

/// The composited, labeled frames.
#[derive(Debug, Clone)]
pub struct Mosaic {
    pub layout: MosaicLayout,
    pub frames: Vec<GrayImage>,
    pub labels: Vec<TileLabel>,
}

/// Mosaic appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub tile_size: u32,
    pub font_size: u32,
    pub margin: u32,
    /// Prefix of the saved file name, `Hatching_{run_code}_{title}`.
    pub run_code: String,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            tile_size: 64,
            font_size: 10,
            margin: 2,
            run_code: "new".into(),
        }
    }
}

pub struct MosaicComposer {
    tile_size: u32,
    font_size: u32,
    margin: u32,
}

impl MosaicComposer {
    pub fn new(config: &MosaicConfig) -> Self {
        Self {
            tile_size: config.tile_size,
            font_size: config.font_size,
            margin: config.margin,
        }
    }

    pub fn compose(&self, sequences: &[SnapshotSequence]) -> Result<Mosaic> {
        let layout = MosaicLayout::new(sequences.len(), self.tile_size, self.margin)
            .ok_or(EclosionError::NoEvents)?;

        let frame_count = sequences[0].frames.len();
        if let Some(odd) = sequences.iter().find(|s| s.frames.len() != frame_count) {
            return Err(EclosionError::Mosaic(format!(
                "snapshot of object {} has {} frames, expected {}",
                odd.object_id,
                odd.frames.len(),
                frame_count
            )));
        }

        let labels: Vec<TileLabel> = sequences
            .iter()
            .enumerate()
            .map(|(i, sequence)| {
                let (x, y) = layout.tile_origin(i);
                TileLabel {
                    text: sequence.object_id.to_string(),
                    x: x + LABEL_OFFSET,
                    baseline: y + LABEL_OFFSET + self.font_size,
                }
            })
            .collect();

        let scale = glyphs::scale_for(self.font_size);
        let mut frames = Vec::with_capacity(frame_count);
        for f in 0..frame_count {
            let mut canvas = GrayImage::new(layout.width(), layout.height());
            for (i, sequence) in sequences.iter().enumerate() {
                let origin = layout.tile_origin(i);
                self.insert_tile(&mut canvas, &sequence.frames[f], origin);
            }
            for label in &labels {
                glyphs::draw_text(
                    &mut canvas,
                    &label.text,
                    label.x as i64,
                    label.baseline as i64,
                    scale,
                    LABEL_VALUE,
                );
            }
            frames.push(canvas);
        }

        Ok(Mosaic {
            layout,
            frames,
            labels,
        })
    }

    /// Copies `tile` onto `canvas` at `origin`, cut to the tile footprint.
    fn insert_tile(&self, canvas: &mut GrayImage, tile: &GrayImage, origin: (u32, u32)) {
        let width = tile.width().min(self.tile_size);
        let height = tile.height().min(self.tile_size);
        for y in 0..height {
            for x in 0..width {
                let (cx, cy) = (origin.0 + x, origin.1 + y);
                if cx < canvas.width() && cy < canvas.height() {
                    canvas.put_pixel(cx, cy, *tile.get_pixel(x, y));
                }
            }
        }
    }
}
