pub mod analyzer;
pub mod exporter;
pub mod frame_source;
pub mod glyphs;
pub mod mosaic;
pub mod object_detector;
pub mod particle_analyzer;
pub mod region;
pub mod time_series;
pub mod utils;
