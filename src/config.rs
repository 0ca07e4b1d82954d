// THEORY:
// `DetectorConfig` is the whole tunable surface of a run in one serde struct. It
// can be read from a JSON file, every field falls back to its default when
// omitted, and the CLI overrides individual fields on top. The defaults are the
// values that work for a typical pupae plate filmed at moderate resolution.
//
// Validation happens once, before any frame is read: a configuration that cannot
// produce a meaningful run is a `Configuration` error, never silently repaired.

use crate::core_modules::analyzer::AnalysisConfig;
use crate::core_modules::frame_source::FrameSource;
use crate::core_modules::mosaic::MosaicConfig;
use crate::core_modules::object_detector::SizeRange;
use crate::core_modules::particle_analyzer::particle_analyzer::ParticleAnalyzer;
use crate::core_modules::region::region::BrightnessStatistic;
use crate::core_modules::time_series::ErrorCorrection;
use crate::error::{EclosionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the accepted pupa area range is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizeBounds {
    /// Scale the median candidate area by two factors.
    Auto { min_factor: f64, max_factor: f64 },
    /// Fixed range in pixels, for known optics.
    Manual { min_area: f64, max_area: f64 },
}

impl Default for SizeBounds {
    fn default() -> Self {
        SizeBounds::Auto {
            min_factor: 0.5,
            max_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Frame used for segmentation; all pupae should be settled and visible on it.
    pub reference_frame: usize,
    /// Maximum grey value of pupa pixels on the reference frame.
    pub threshold: u8,
    /// Objects smaller than this are never candidates.
    pub min_particle_area: f64,
    /// Ignore objects touching the frame border.
    pub exclude_edge_objects: bool,
    pub size_bounds: SizeBounds,
    pub statistic: BrightnessStatistic,
    /// Minimum brightness increase between consecutive frames that counts as eclosion.
    pub diff_threshold: f64,
    /// First frame of the scan window (inclusive).
    pub block_start: usize,
    /// Last frame of the scan window (inclusive).
    pub block_end: usize,
    pub error_correction: ErrorCorrection,
    /// Frames before and after each event kept in its snapshot.
    pub snapshot_window: usize,
    /// Side of the square snapshot crop in pixels.
    pub snapshot_size: u32,
    pub mosaic: MosaicConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            reference_frame: 101,
            threshold: 90,
            min_particle_area: 10.0,
            exclude_edge_objects: true,
            size_bounds: SizeBounds::default(),
            statistic: BrightnessStatistic::Median,
            diff_threshold: 10.0,
            block_start: 101,
            block_end: 600,
            error_correction: ErrorCorrection::default(),
            snapshot_window: 5,
            snapshot_size: 64,
            mosaic: MosaicConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|err| match err.classify() {
            // Well-formed JSON holding a bad value (unknown statistic, wrong type).
            serde_json::error::Category::Data => EclosionError::config(err.to_string()),
            _ => EclosionError::Json(err),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the configuration on its own, independent of any stack.
    pub fn validate(&self) -> Result<()> {
        if self.reference_frame == 0 {
            return Err(EclosionError::config("reference_frame is 1-based and must be at least 1"));
        }
        if self.block_start == 0 || self.block_start > self.block_end {
            return Err(EclosionError::config(format!(
                "invalid scan window {}..={}",
                self.block_start, self.block_end
            )));
        }
        if !self.diff_threshold.is_finite() {
            return Err(EclosionError::config("diff_threshold must be finite"));
        }
        if !self.error_correction.error_min.is_finite() {
            return Err(EclosionError::config("error_correction.error_min must be finite"));
        }
        if !(self.min_particle_area >= 0.0) {
            return Err(EclosionError::config("min_particle_area must not be negative"));
        }
        match self.size_bounds {
            SizeBounds::Auto {
                min_factor,
                max_factor,
            } => {
                if !(min_factor > 0.0) || !(max_factor >= min_factor) {
                    return Err(EclosionError::config(format!(
                        "degenerate area factors {min_factor}..{max_factor}"
                    )));
                }
            }
            SizeBounds::Manual { min_area, max_area } => {
                SizeRange::new(min_area, max_area)?;
            }
        }
        if self.snapshot_size == 0 || self.mosaic.tile_size == 0 {
            return Err(EclosionError::config("snapshot_size and tile_size must be positive"));
        }
        if self.snapshot_size > self.mosaic.tile_size {
            return Err(EclosionError::config(format!(
                "snapshot_size {} does not fit a mosaic tile of {}",
                self.snapshot_size, self.mosaic.tile_size
            )));
        }
        Ok(())
    }

    /// Checks the settings that depend on the stack being analyzed.
    pub fn validate_for(&self, source: &impl FrameSource) -> Result<()> {
        let count = source.frame_count();
        if self.reference_frame > count {
            return Err(EclosionError::config(format!(
                "reference frame {} is beyond the last frame ({count})",
                self.reference_frame
            )));
        }
        Ok(())
    }

    pub fn segmenter(&self) -> ParticleAnalyzer {
        ParticleAnalyzer {
            min_area: self.min_particle_area,
            exclude_edges: self.exclude_edge_objects,
        }
    }

    pub fn analysis(&self) -> AnalysisConfig {
        AnalysisConfig {
            block_start: self.block_start,
            block_end: self.block_end,
            diff_threshold: self.diff_threshold,
            statistic: self.statistic,
            error_correction: self.error_correction,
            snapshot_window: self.snapshot_window,
            snapshot_size: self.snapshot_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.statistic, BrightnessStatistic::Median);
        assert_eq!(config.error_correction.window, 3);
        assert_eq!(config.mosaic.run_code, "new");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "threshold": 70,
            "statistic": "mean",
            "size_bounds": { "mode": "manual", "min_area": 20, "max_area": 350 },
            "error_correction": { "enabled": false }
        }"#;
        let config: DetectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.threshold, 70);
        assert_eq!(config.statistic, BrightnessStatistic::Mean);
        assert_eq!(
            config.size_bounds,
            SizeBounds::Manual { min_area: 20.0, max_area: 350.0 }
        );
        assert!(!config.error_correction.enabled);
        assert_eq!(config.error_correction.window, 3);
        assert_eq!(config.block_end, 600);
    }

    #[test]
    fn unknown_statistic_is_rejected() {
        let result: std::result::Result<DetectorConfig, _> =
            serde_json::from_str(r#"{ "statistic": "Average" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_statistic_in_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.json");
        std::fs::write(&path, r#"{"statistic":"Average"}"#).unwrap();
        assert!(matches!(
            DetectorConfig::load(&path),
            Err(EclosionError::Configuration(_))
        ));

        std::fs::write(&path, r#"{"statistic": "#).unwrap();
        assert!(matches!(DetectorConfig::load(&path), Err(EclosionError::Json(_))));
    }

    #[test]
    fn snapshot_must_fit_the_mosaic_tile() {
        let mut config = DetectorConfig::default();
        config.snapshot_size = 96;
        config.mosaic.tile_size = 64;
        assert!(matches!(config.validate(), Err(EclosionError::Configuration(_))));

        config.snapshot_size = 64;
        assert!(config.validate().is_ok());
        config.snapshot_size = 32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_round_trip() {
        let config = DetectorConfig::default();
        let text = config.to_json().unwrap();
        let back: DetectorConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn invalid_windows_and_bounds() {
        let mut config = DetectorConfig::default();
        config.block_start = 700;
        assert!(matches!(config.validate(), Err(EclosionError::Configuration(_))));

        let mut config = DetectorConfig::default();
        config.size_bounds = SizeBounds::Manual { min_area: 300.0, max_area: 10.0 };
        assert!(matches!(config.validate(), Err(EclosionError::Configuration(_))));

        let mut config = DetectorConfig::default();
        config.size_bounds = SizeBounds::Auto { min_factor: 0.0, max_factor: 2.0 };
        assert!(matches!(config.validate(), Err(EclosionError::Configuration(_))));

        let mut config = DetectorConfig::default();
        config.reference_frame = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.json");
        std::fs::write(&path, r#"{ "block_start": 5, "block_end": 50 }"#).unwrap();
        let config = DetectorConfig::load(&path).unwrap();
        assert_eq!((config.block_start, config.block_end), (5, 50));
    }
}
