// THEORY:
// This file is the entry point of the `eclosion_detector` library crate.
//
// The detector watches a time-lapse stack of a pupae plate and reports the frame
// at which each pupa ecloses: the dark pupal case suddenly turns into a bright,
// empty one. The public API is the `EclosionPipeline` (and its parallel variant)
// together with `DetectorConfig` and the `Report` it returns. The stages behind it
// live in `core_modules`:
//
//   frame_source -> particle_analyzer -> object_detector -> analyzer -> {mosaic, exporter}
//
// Data only flows forward; no stage reads back from a later one.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::{DetectorConfig, SizeBounds};
pub use core_modules::frame_source::{FrameSource, ImageStack};
pub use core_modules::region::region::BrightnessStatistic;
pub use error::{EclosionError, Result};
pub use pipeline::{EclosionPipeline, Report};
