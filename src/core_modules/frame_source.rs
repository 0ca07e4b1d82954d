// THEORY:
// The `FrameSource` is the detector's only window onto pixel data. Everything the
// later stages need from the stack goes through this trait: how many frames exist,
// what a frame is called, the brightness statistic of a region on a frame, the
// region's centroid, and cropped runs of frames for snapshots.
//
// Key architectural principles:
// 1.  **No Ambient Cursor**: There is no "active slice". Every call names the frame
//     it is about, so analysis code never depends on hidden state left behind by
//     an earlier call.
// 2.  **1-Based Frames**: Frames are numbered from 1, matching the labels users see
//     in the stack and the frame numbers written to the CSV.
// 3.  **Swappable Backend**: `ImageStack` keeps every frame decoded in memory.
//     Anything else that can answer the same questions (a lazily decoded file,
//     a camera archive) can implement the trait and be analyzed unchanged.

use crate::core_modules::region::region::{BrightnessStatistic, Region};
use crate::error::{EclosionError, Result};
use image::{GrayImage, Luma};
use std::ops::RangeInclusive;

/// One element of an image stack.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based position in the stack.
    pub index: usize,
    /// Human readable label, usually the file the frame was read from.
    pub label: Option<String>,
    pub image: GrayImage,
}

/// A square crop window in frame coordinates. May extend past the frame edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: i64,
    pub y: i64,
    pub size: u32,
}

impl CropWindow {
    /// A window of side `size` whose centre is `(cx, cy)`.
    pub fn centered_on(cx: u32, cy: u32, size: u32) -> Self {
        let half = (size / 2) as i64;
        Self {
            x: cx as i64 - half,
            y: cy as i64 - half,
            size,
        }
    }
}

/// Supplies frames of a stack and per-region measurements on them.
pub trait FrameSource {
    fn frame_count(&self) -> usize;

    /// The frame at 1-based `index`.
    fn frame(&self, index: usize) -> Result<&Frame>;

    fn frame_label(&self, index: usize) -> Option<String> {
        self.frame(index).ok().and_then(|f| f.label.clone())
    }

    fn region_statistic(
        &self,
        region: &Region,
        frame: usize,
        statistic: BrightnessStatistic,
    ) -> Result<f64> {
        let values = region
            .sample(&self.frame(frame)?.image)
            .ok_or_else(|| EclosionError::Unmeasurable {
                frame,
                reason: "region lies outside the frame".into(),
            })?;
        statistic
            .compute(&values)
            .ok_or_else(|| EclosionError::Unmeasurable {
                frame,
                reason: "region is empty".into(),
            })
    }

    fn region_centroid(&self, region: &Region, frame: usize) -> Result<(f64, f64)> {
        let image = &self.frame(frame)?.image;
        if region.area() == 0 || !region.fits_within(image.width(), image.height()) {
            return Err(EclosionError::Unmeasurable {
                frame,
                reason: "region lies outside the frame".into(),
            });
        }
        Ok(region.centroid())
    }

    /// Crops `window` out of every frame in `frames`. Frame numbers outside the stack
    /// and pixels outside a frame come back black, so the result always holds one
    /// `size` x `size` image per requested frame.
    fn extract_subsequence(
        &self,
        window: CropWindow,
        frames: RangeInclusive<i64>,
    ) -> Result<Vec<GrayImage>> {
        let count = self.frame_count() as i64;
        let mut crops = Vec::new();
        for index in frames {
            let mut crop = GrayImage::new(window.size, window.size);
            if (1..=count).contains(&index) {
                let source = &self.frame(index as usize)?.image;
                copy_window(source, window, &mut crop);
            }
            crops.push(crop);
        }
        Ok(crops)
    }
}

fn copy_window(source: &GrayImage, window: CropWindow, target: &mut GrayImage) {
    for (dx, dy, pixel) in target.enumerate_pixels_mut() {
        let sx = window.x + dx as i64;
        let sy = window.y + dy as i64;
        if sx >= 0 && sy >= 0 && (sx as u32) < source.width() && (sy as u32) < source.height() {
            *pixel = *source.get_pixel(sx as u32, sy as u32);
        } else {
            *pixel = Luma([0]);
        }
    }
}

/// An image stack held entirely in memory.
#[derive(Debug, Clone)]
pub struct ImageStack {
    title: String,
    frames: Vec<Frame>,
}

impl ImageStack {
    /// Builds a stack from decoded frames. Frames are numbered in the given order.
    pub fn new(title: impl Into<String>, images: Vec<(Option<String>, GrayImage)>) -> Result<Self> {
        if images.is_empty() {
            return Err(EclosionError::EmptyStack);
        }
        let frames = images
            .into_iter()
            .enumerate()
            .map(|(i, (label, image))| Frame {
                index: i + 1,
                label,
                image,
            })
            .collect();
        Ok(Self {
            title: title.into(),
            frames,
        })
    }

    /// A stack of unlabeled frames.
    pub fn from_images(title: impl Into<String>, images: Vec<GrayImage>) -> Result<Self> {
        Self::new(title, images.into_iter().map(|image| (None, image)).collect())
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl FrameSource for ImageStack {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Result<&Frame> {
        index
            .checked_sub(1)
            .and_then(|i| self.frames.get(i))
            .ok_or(EclosionError::FrameOutOfRange {
                index,
                count: self.frames.len(),
            })
    }
}
