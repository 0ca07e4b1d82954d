// Command line runner: analyzes one stack directory and writes the mosaic and the
// CSV next to each other in the output directory.

use anyhow::Context;
use clap::Parser;
use eclosion_detector::{
    BrightnessStatistic, DetectorConfig, EclosionPipeline, Report, SizeBounds,
    core_modules::utils::image_helper::image_helper,
};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Detect pupal eclosion events in a time-lapse image stack
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding one image per frame, ordered by file name
    stack: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the mosaic and the CSV
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Frame used to find the pupae (1-based)
    #[arg(long)]
    reference_frame: Option<usize>,

    /// Maximum grey value of pupa pixels on the reference frame
    #[arg(long)]
    threshold: Option<u8>,

    /// Fixed minimum pupa area in pixels (requires --max-area)
    #[arg(long, requires = "max_area")]
    min_area: Option<f64>,

    /// Fixed maximum pupa area in pixels (requires --min-area)
    #[arg(long, requires = "min_area")]
    max_area: Option<f64>,

    /// Lower area factor relative to the median pupa area
    #[arg(long, conflicts_with = "min_area")]
    min_factor: Option<f64>,

    /// Upper area factor relative to the median pupa area
    #[arg(long, conflicts_with = "max_area")]
    max_factor: Option<f64>,

    /// Brightness statistic: Mean, Median, Mode, Min or Max
    #[arg(long)]
    statistic: Option<BrightnessStatistic>,

    /// Minimum brightness increase between consecutive frames
    #[arg(long)]
    diff_threshold: Option<f64>,

    /// First frame of the scan window
    #[arg(long)]
    block_start: Option<usize>,

    /// Last frame of the scan window
    #[arg(long)]
    block_end: Option<usize>,

    /// Disable rejection of objects passing over pupae
    #[arg(long)]
    no_error_correction: bool,

    /// Frames before and after a candidate checked by error correction
    #[arg(long)]
    error_window: Option<usize>,

    /// Rejection limit of error correction
    #[arg(long, allow_hyphen_values = true)]
    error_min: Option<f64>,

    /// Frames before and after each event kept in the mosaic
    #[arg(long)]
    snapshot_window: Option<usize>,

    /// Side of the square snapshot crop in pixels
    #[arg(long)]
    snapshot_size: Option<u32>,

    /// Side of a mosaic tile in pixels
    #[arg(long)]
    tile_size: Option<u32>,

    /// Height of the tile labels in pixels
    #[arg(long)]
    font_size: Option<u32>,

    /// Run code used in the mosaic file name
    #[arg(long)]
    run_code: Option<String>,

    /// Analyze objects concurrently
    #[arg(long)]
    parallel: bool,

    /// Worker count for --parallel (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn apply(&self, config: &mut DetectorConfig) {
        if let Some(v) = self.reference_frame {
            config.reference_frame = v;
        }
        if let Some(v) = self.threshold {
            config.threshold = v;
        }
        if let (Some(min_area), Some(max_area)) = (self.min_area, self.max_area) {
            config.size_bounds = SizeBounds::Manual { min_area, max_area };
        }
        if self.min_factor.is_some() || self.max_factor.is_some() {
            let (default_min, default_max) = match config.size_bounds {
                SizeBounds::Auto { min_factor, max_factor } => (min_factor, max_factor),
                SizeBounds::Manual { .. } => (0.5, 2.0),
            };
            config.size_bounds = SizeBounds::Auto {
                min_factor: self.min_factor.unwrap_or(default_min),
                max_factor: self.max_factor.unwrap_or(default_max),
            };
        }
        if let Some(v) = self.statistic {
            config.statistic = v;
        }
        if let Some(v) = self.diff_threshold {
            config.diff_threshold = v;
        }
        if let Some(v) = self.block_start {
            config.block_start = v;
        }
        if let Some(v) = self.block_end {
            config.block_end = v;
        }
        if self.no_error_correction {
            config.error_correction.enabled = false;
        }
        if let Some(v) = self.error_window {
            config.error_correction.window = v;
        }
        if let Some(v) = self.error_min {
            config.error_correction.error_min = v;
        }
        if let Some(v) = self.snapshot_window {
            config.snapshot_window = v;
        }
        if let Some(v) = self.snapshot_size {
            config.snapshot_size = v;
        }
        if let Some(v) = self.tile_size {
            config.mosaic.tile_size = v;
        }
        if let Some(v) = self.font_size {
            config.mosaic.font_size = v;
        }
        if let Some(v) = &self.run_code {
            config.mosaic.run_code = v.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DetectorConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    args.apply(&mut config);

    if args.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let pipeline = EclosionPipeline::new(config)?;
    let stack = image_helper::load_stack(&args.stack)
        .with_context(|| format!("loading stack {}", args.stack.display()))?;
    let title = stack.title().to_string();

    let report = if args.parallel {
        let workers = args.workers.unwrap_or_else(num_cpus::get);
        pipeline.run_parallel(Arc::new(stack), workers).await?
    } else {
        pipeline.run(&stack)?
    };

    if let Report::NoObjectsFound = report {
        info!("Nothing to do.");
        return Ok(());
    }

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let artifacts = pipeline.write_artifacts(&report, &args.output, &title)?;
    if let Some(path) = artifacts.csv {
        info!("Events written to {}", path.display());
    }
    if let Some(path) = artifacts.mosaic {
        info!("Mosaic written to {}", path.display());
    }
    Ok(())
}
