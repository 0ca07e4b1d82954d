// THEORY:
// The `ObjectDetector` decides which pupae the run will follow. It segments a single
// reference frame (chosen when every pupa has settled and is clearly visible),
// learns what a "normal" pupa size is from the objects it found, and keeps only the
// objects of that size.
//
// Key architectural principles:
// 1.  **Self-Calibration**: Pupa area in pixels depends on camera resolution and
//     optics, so the accepted size range is derived from the median observed area
//     scaled by two factors. The median keeps a few merged clusters or specks from
//     dragging the estimate around. Both bounds are rounded up.
// 2.  **Explicit Override**: When the optics are known, a fixed `[min, max]` range
//     can be supplied instead.
// 3.  **View, Not Copy**: Filtering returns object ids. The regions themselves stay
//     owned by the candidate list.

use crate::core_modules::frame_source::FrameSource;
use crate::core_modules::particle_analyzer::particle_analyzer::ParticleAnalyzer;
use crate::core_modules::particle_analyzer::{CandidateObject, Segmenter};
use crate::error::{EclosionError, Result};
use log::{debug, info};

/// Inclusive pixel-area acceptance range for pupae.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeRange {
    pub min_area: f64,
    pub max_area: f64,
}

impl SizeRange {
    /// Validates the range. A degenerate range is a configuration error and is never
    /// corrected silently.
    pub fn new(min_area: f64, max_area: f64) -> Result<Self> {
        if !(max_area > 0.0) || !(min_area >= 0.0) || min_area > max_area {
            return Err(EclosionError::config(format!(
                "degenerate size range [{min_area}, {max_area}]"
            )));
        }
        Ok(Self { min_area, max_area })
    }

    pub fn contains(&self, area: f64) -> bool {
        area >= self.min_area && area <= self.max_area
    }
}

/// Median of `values`. Odd count: the middle element of the sorted values. Even
/// count: the mean of the two middle elements, rounded half away from zero.
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let m = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[m])
    } else {
        Some(((sorted[m - 1] + sorted[m]) / 2.0).round())
    }
}

/// Derives the accepted area range from the observed areas:
/// `ceil(median * min_factor)` to `ceil(median * max_factor)`.
pub fn autocalibrate_size_range(
    areas: &[f64],
    min_factor: f64,
    max_factor: f64,
) -> Result<SizeRange> {
    let median_area = median(areas).ok_or(EclosionError::NoObjectsFound)?;
    let range = SizeRange::new(
        (median_area * min_factor).ceil(),
        (median_area * max_factor).ceil(),
    )?;
    info!("Expected minimum pupa area: {}", range.min_area);
    info!("Expected maximum pupa area: {}", range.max_area);
    Ok(range)
}

/// Ids of the candidates whose area lies inside `range`, in candidate order.
pub fn filter_valid(candidates: &[CandidateObject], range: SizeRange) -> Vec<usize> {
    candidates
        .iter()
        .filter(|c| range.contains(c.area))
        .map(|c| c.id)
        .collect()
}

/// Segments the reference frame and selects pupa-sized objects.
pub struct ObjectDetector<S: Segmenter = ParticleAnalyzer> {
    segmenter: S,
    threshold: u8,
}

impl<S: Segmenter> ObjectDetector<S> {
    pub fn new(segmenter: S, threshold: u8) -> Self {
        Self {
            segmenter,
            threshold,
        }
    }

    /// All candidate objects on `reference_frame` (1-based).
    pub fn detect_candidates(
        &self,
        source: &impl FrameSource,
        reference_frame: usize,
    ) -> Result<Vec<CandidateObject>> {
        let frame = source.frame(reference_frame)?;
        let candidates = self.segmenter.segment(&frame.image, self.threshold);
        debug!(
            "{} candidate objects on frame {} (threshold {})",
            candidates.len(),
            reference_frame,
            self.threshold
        );
        Ok(candidates)
    }
}
