// THEORY:
// The `TimeSeriesAnalyzer` is the heart of the detector. For every pupa that
// survived size filtering it builds a brightness series over the scan window,
// looks for the step that marks eclosion and turns an accepted step into an
// `EclosionEvent` plus a short snapshot sequence for visual checking.
//
// Key architectural principles:
// 1.  **One Object at a Time**: Each object's series is built, classified and
//     dropped before the next object starts. No state crosses objects, which is
//     what lets `ParallelAnalyzer` run `analyze_object` concurrently.
// 2.  **Failure Isolation**: A region that cannot be measured on some frame only
//     costs that object. It is logged and recorded as skipped and the run moves
//     on. Faults of the frame source itself still abort the run.
// 3.  **Auditable Rejections**: Candidates discarded by error correction are kept
//     in the report, not just printed, so a user can check what was thrown away.
// 4.  **Ordered Output**: Events are reported in object-processing order, which is
//     ascending object id.

use crate::core_modules::frame_source::{CropWindow, FrameSource};
use crate::core_modules::particle_analyzer::CandidateObject;
use crate::core_modules::region::region::BrightnessStatistic;
use crate::core_modules::time_series::{self, ErrorCorrection, TransitionOutcome};
use crate::error::{EclosionError, Result};
use image::GrayImage;
use log::{debug, info, warn};

/// A detected eclosion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EclosionEvent {
    /// Label of the frame the transition was detected on.
    pub frame_label: Option<String>,
    /// Absolute, 1-based frame number.
    pub frame_nr: usize,
    pub object_id: usize,
    pub x: u32,
    pub y: u32,
}

/// A candidate transition discarded by error correction.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedTransition {
    pub object_id: usize,
    pub frame_nr: usize,
    pub x: u32,
    pub y: u32,
    pub delta_error: f64,
}

/// An object the analyzer could not measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedObject {
    pub object_id: usize,
    pub reason: String,
}

/// Cropped frames around one event, `2 * snapshot_window + 1` of them.
#[derive(Debug, Clone)]
pub struct SnapshotSequence {
    pub object_id: usize,
    pub frame_nr: usize,
    pub frames: Vec<GrayImage>,
}

/// Result of analyzing a single object.
#[derive(Debug, Clone)]
pub enum ObjectOutcome {
    NoTransition,
    Eclosed(EclosionEvent, SnapshotSequence),
    Rejected(RejectedTransition),
    Skipped(SkippedObject),
}

/// Everything the analyzer learned about the valid objects.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub events: Vec<EclosionEvent>,
    /// One sequence per event, in the same order.
    pub snapshots: Vec<SnapshotSequence>,
    pub rejected: Vec<RejectedTransition>,
    pub skipped: Vec<SkippedObject>,
    /// Number of objects analyzed, including skipped ones.
    pub analyzed: usize,
}

impl AnalysisReport {
    /// Collects per-object outcomes, already in object order.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = ObjectOutcome>) -> Self {
        let mut report = AnalysisReport::default();
        for outcome in outcomes {
            report.analyzed += 1;
            match outcome {
                ObjectOutcome::NoTransition => {}
                ObjectOutcome::Eclosed(event, snapshot) => {
                    report.events.push(event);
                    report.snapshots.push(snapshot);
                }
                ObjectOutcome::Rejected(rejected) => report.rejected.push(rejected),
                ObjectOutcome::Skipped(skipped) => report.skipped.push(skipped),
            }
        }
        report
    }
}

/// Tunable parameters of the time-series stage.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// First frame of the scan window (1-based, inclusive).
    pub block_start: usize,
    /// Last frame of the scan window (inclusive). Clamped to the stack length.
    pub block_end: usize,
    pub diff_threshold: f64,
    pub statistic: BrightnessStatistic,
    pub error_correction: ErrorCorrection,
    /// Frames before and after an event included in its snapshot.
    pub snapshot_window: usize,
    /// Side of the square snapshot crop in pixels.
    pub snapshot_size: u32,
}

pub struct TimeSeriesAnalyzer {
    config: AnalysisConfig,
}

impl TimeSeriesAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// The frames actually scanned on `source`, or `None` if the window misses the
    /// stack entirely.
    pub fn scan_window(&self, source: &(impl FrameSource + ?Sized)) -> Option<(usize, usize)> {
        let count = source.frame_count();
        let start = self.config.block_start.max(1);
        let end = self.config.block_end.min(count);
        (start <= end).then_some((start, end))
    }

    /// Warns once per run when the scan window reaches past the stack. Returns true
    /// if the window gets clamped.
    pub fn check_window(&self, source: &(impl FrameSource + ?Sized)) -> bool {
        let count = source.frame_count();
        let clamped = self.config.block_end > count;
        if clamped {
            warn!(
                "scan window ends at frame {} but the stack has {} frames, clamping",
                self.config.block_end, count
            );
        }
        clamped
    }

    /// Analyzes every object in `valid_ids` sequentially.
    pub fn analyze(
        &self,
        source: &impl FrameSource,
        candidates: &[CandidateObject],
        valid_ids: &[usize],
    ) -> Result<AnalysisReport> {
        self.check_window(source);

        let mut outcomes = Vec::with_capacity(valid_ids.len());
        for &id in valid_ids {
            let outcome = match candidates.iter().find(|c| c.id == id) {
                Some(object) => self.analyze_object(source, object)?,
                None => ObjectOutcome::Skipped(SkippedObject {
                    object_id: id,
                    reason: "unknown object id".into(),
                }),
            };
            if let ObjectOutcome::Skipped(skipped) = &outcome {
                warn!("object {} skipped: {}", skipped.object_id, skipped.reason);
            }
            outcomes.push(outcome);
        }
        Ok(AnalysisReport::from_outcomes(outcomes))
    }

    /// Measures and classifies one object. Measurement failures become
    /// `ObjectOutcome::Skipped`; frame source faults are returned as errors.
    pub fn analyze_object(
        &self,
        source: &(impl FrameSource + ?Sized),
        object: &CandidateObject,
    ) -> Result<ObjectOutcome> {
        match self.try_analyze_object(source, object) {
            Err(EclosionError::Unmeasurable { frame, reason }) => {
                let failure = EclosionError::MeasurementFailure {
                    object_id: object.id,
                    frame,
                    reason,
                };
                Ok(ObjectOutcome::Skipped(SkippedObject {
                    object_id: object.id,
                    reason: failure.to_string(),
                }))
            }
            other => other,
        }
    }

    fn try_analyze_object(
        &self,
        source: &(impl FrameSource + ?Sized),
        object: &CandidateObject,
    ) -> Result<ObjectOutcome> {
        let Some((start, end)) = self.scan_window(source) else {
            return Ok(ObjectOutcome::Skipped(SkippedObject {
                object_id: object.id,
                reason: format!(
                    "no frames in scan window {}..={}",
                    self.config.block_start, self.config.block_end
                ),
            }));
        };

        let series = (start..=end)
            .map(|frame| source.region_statistic(&object.region, frame, self.config.statistic))
            .collect::<Result<Vec<f64>>>()?;

        let outcome = time_series::classify(
            &series,
            self.config.diff_threshold,
            &self.config.error_correction,
        );

        match outcome {
            TransitionOutcome::NoTransition => Ok(ObjectOutcome::NoTransition),
            TransitionOutcome::Rejected {
                index,
                candidates,
                delta_error,
            } => {
                let frame_nr = start + index;
                log_ambiguity(object.id, candidates, frame_nr);
                let (x, y) = self.location(source, object, frame_nr)?;
                info!("{} Frame: {} X: {} Y: {} - invalid detection", object.id, frame_nr, x, y);
                Ok(ObjectOutcome::Rejected(RejectedTransition {
                    object_id: object.id,
                    frame_nr,
                    x,
                    y,
                    delta_error,
                }))
            }
            TransitionOutcome::Accepted { index, candidates } => {
                let frame_nr = start + index;
                log_ambiguity(object.id, candidates, frame_nr);
                let (x, y) = self.location(source, object, frame_nr)?;
                info!("{} Frame: {} X: {} Y: {}", object.id, frame_nr, x, y);

                let snapshot = self.snapshot(source, object.id, frame_nr, x, y)?;
                let event = EclosionEvent {
                    frame_label: source.frame_label(frame_nr),
                    frame_nr,
                    object_id: object.id,
                    x,
                    y,
                };
                Ok(ObjectOutcome::Eclosed(event, snapshot))
            }
        }
    }

    /// Integer centroid of the object on `frame_nr`.
    fn location(
        &self,
        source: &(impl FrameSource + ?Sized),
        object: &CandidateObject,
        frame_nr: usize,
    ) -> Result<(u32, u32)> {
        let (cx, cy) = source.region_centroid(&object.region, frame_nr)?;
        Ok((cx as u32, cy as u32))
    }

    fn snapshot(
        &self,
        source: &(impl FrameSource + ?Sized),
        object_id: usize,
        frame_nr: usize,
        x: u32,
        y: u32,
    ) -> Result<SnapshotSequence> {
        let window = CropWindow::centered_on(x, y, self.config.snapshot_size);
        let reach = self.config.snapshot_window as i64;
        let centre = frame_nr as i64;
        let frames = source.extract_subsequence(window, centre - reach..=centre + reach)?;
        Ok(SnapshotSequence {
            object_id,
            frame_nr,
            frames,
        })
    }
}

fn log_ambiguity(object_id: usize, candidates: usize, frame_nr: usize) {
    if candidates > 1 {
        debug!(
            "object {object_id}: {candidates} candidate transitions, using the earliest (frame {frame_nr})"
        );
    }
}
