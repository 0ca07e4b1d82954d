// THEORY:
// The `pipeline` module is the top-level API of the detector. It runs the stages
// strictly forward: object detection on the reference frame, size calibration,
// per-object time-series analysis, and finally the artifacts (mosaic and CSV)
// from the complete event list. No stage feeds back into an earlier one.
//
// The result of a run is a `Report`. Finding nothing is a normal outcome and gets
// its own variants instead of an error; only configuration problems and frame
// source faults make `run` fail.

use crate::config::{DetectorConfig, SizeBounds};
use crate::core_modules::analyzer::{AnalysisReport, TimeSeriesAnalyzer};
use crate::core_modules::exporter;
use crate::core_modules::frame_source::FrameSource;
use crate::core_modules::mosaic::MosaicComposer;
use crate::core_modules::object_detector::{
    ObjectDetector, SizeRange, autocalibrate_size_range, filter_valid,
};
use crate::core_modules::particle_analyzer::CandidateObject;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{EclosionError, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

// Re-export key data structures for the public API.
pub use crate::core_modules::analyzer::{EclosionEvent, RejectedTransition, SkippedObject};
pub use crate::core_modules::mosaic::Mosaic;

/// Everything learned about the objects on the reference frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub candidates: Vec<CandidateObject>,
    pub size_range: SizeRange,
    /// Ids of the candidates within `size_range`.
    pub valid_ids: Vec<usize>,
}

/// The data package of a run that found at least one valid object.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub detection: Detection,
    pub analysis: AnalysisReport,
}

/// The outcome of one run.
#[derive(Debug, Clone)]
pub enum Report {
    /// Segmentation found nothing, or nothing of pupa size.
    NoObjectsFound,
    /// Objects were analyzed but none eclosed.
    NoEclosionDetected(RunSummary),
    EclosionDetected(RunSummary),
}

impl Report {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Report::NoObjectsFound => None,
            Report::NoEclosionDetected(summary) | Report::EclosionDetected(summary) => Some(summary),
        }
    }

    pub fn events(&self) -> &[EclosionEvent] {
        self.summary()
            .map(|s| s.analysis.events.as_slice())
            .unwrap_or(&[])
    }
}

/// Paths of the files written for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub mosaic: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

pub struct EclosionPipeline {
    config: DetectorConfig,
}

impl EclosionPipeline {
    /// Validates `config`; an invalid configuration never reaches the stack.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Segments the reference frame and selects valid objects.
    pub fn detect(&self, source: &impl FrameSource) -> Result<Detection> {
        self.config.validate_for(source)?;
        let detector = ObjectDetector::new(self.config.segmenter(), self.config.threshold);
        let candidates = detector.detect_candidates(source, self.config.reference_frame)?;
        if candidates.is_empty() {
            return Err(EclosionError::NoObjectsFound);
        }

        let size_range = match self.config.size_bounds {
            SizeBounds::Auto {
                min_factor,
                max_factor,
            } => {
                info!("Trying to autodetect settings for pupal size...");
                let areas: Vec<f64> = candidates.iter().map(|c| c.area).collect();
                autocalibrate_size_range(&areas, min_factor, max_factor)?
            }
            SizeBounds::Manual { min_area, max_area } => SizeRange::new(min_area, max_area)?,
        };

        let valid_ids = filter_valid(&candidates, size_range);
        info!("{} objects found.", valid_ids.len());
        Ok(Detection {
            candidates,
            size_range,
            valid_ids,
        })
    }

    /// Runs detection and analysis sequentially.
    pub fn run(&self, source: &impl FrameSource) -> Result<Report> {
        info!("Start processing...");
        let detection = match self.detect(source) {
            Ok(detection) => detection,
            Err(EclosionError::NoObjectsFound) => {
                warn!("No objects found on frame {}", self.config.reference_frame);
                return Ok(Report::NoObjectsFound);
            }
            Err(err) => return Err(err),
        };
        if detection.valid_ids.is_empty() {
            warn!("No candidate object lies within the pupa size range");
            return Ok(Report::NoObjectsFound);
        }

        let analyzer = TimeSeriesAnalyzer::new(self.config.analysis());
        let analysis = analyzer.analyze(source, &detection.candidates, &detection.valid_ids)?;
        Ok(Self::report(detection, analysis))
    }

    pub(crate) fn report(detection: Detection, analysis: AnalysisReport) -> Report {
        info!(
            "{} eclosion events, {} rejected, {} skipped",
            analysis.events.len(),
            analysis.rejected.len(),
            analysis.skipped.len()
        );
        let summary = RunSummary {
            detection,
            analysis,
        };
        if summary.analysis.events.is_empty() {
            Report::NoEclosionDetected(summary)
        } else {
            Report::EclosionDetected(summary)
        }
    }

    /// Composes the mosaic for a report. `NoEvents` when nothing eclosed.
    pub fn compose_mosaic(&self, report: &Report) -> Result<Mosaic> {
        let snapshots = report
            .summary()
            .map(|s| s.analysis.snapshots.as_slice())
            .unwrap_or(&[]);
        MosaicComposer::new(&self.config.mosaic).compose(snapshots)
    }

    /// Writes `Hatching_{run_code}_{title}.gif` and `{title}.csv` into `output_dir`.
    /// Without events nothing is written and both paths are `None`.
    pub fn write_artifacts(&self, report: &Report, output_dir: &Path, title: &str) -> Result<Artifacts> {
        let mut artifacts = Artifacts::default();

        info!("Creating mosaic");
        match self.compose_mosaic(report) {
            Ok(mosaic) => {
                let name = image_helper::mosaic_file_name(&self.config.mosaic.run_code, title);
                let path = output_dir.join(name);
                info!("Saving mosaic {}", path.display());
                image_helper::save_mosaic(&path, &mosaic)?;
                artifacts.mosaic = Some(path);
            }
            Err(err) if err.is_nothing_to_do() => info!("No snapshots found!"),
            Err(err) => return Err(err),
        }

        match exporter::save_csv(output_dir, title, report.events()) {
            Ok(path) => artifacts.csv = Some(path),
            Err(err) if err.is_nothing_to_do() => info!("No eclosion events found!"),
            Err(err) => return Err(err),
        }

        info!("Processing complete.");
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame_source::ImageStack;
    use image::{GrayImage, Luma};

    fn blank_stack(frames: usize) -> ImageStack {
        ImageStack::from_images("blank", vec![GrayImage::from_pixel(32, 32, Luma([200])); frames])
            .unwrap()
    }

    fn small_config() -> DetectorConfig {
        DetectorConfig {
            reference_frame: 1,
            block_start: 1,
            block_end: 4,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn invalid_configuration_fails_before_processing() {
        let config = DetectorConfig {
            block_start: 10,
            block_end: 5,
            ..DetectorConfig::default()
        };
        assert!(matches!(EclosionPipeline::new(config), Err(EclosionError::Configuration(_))));
    }

    #[test]
    fn reference_frame_beyond_stack_is_a_configuration_error() {
        let pipeline = EclosionPipeline::new(DetectorConfig::default()).unwrap();
        assert!(matches!(
            pipeline.run(&blank_stack(4)),
            Err(EclosionError::Configuration(_))
        ));
    }

    #[test]
    fn blank_stack_reports_no_objects_and_writes_nothing() {
        let pipeline = EclosionPipeline::new(small_config()).unwrap();
        let report = pipeline.run(&blank_stack(4)).unwrap();
        assert!(matches!(report, Report::NoObjectsFound));
        assert!(report.events().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let artifacts = pipeline.write_artifacts(&report, dir.path(), "blank").unwrap();
        assert_eq!(artifacts, Artifacts::default());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
