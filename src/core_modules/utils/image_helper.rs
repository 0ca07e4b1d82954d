// Disk I/O for image stacks and the mosaic artifact.

pub mod image_helper {
    use crate::core_modules::frame_source::ImageStack;
    use crate::core_modules::mosaic::Mosaic;
    use crate::error::{EclosionError, Result};
    use image::codecs::gif::{GifEncoder, Repeat};
    use image::{Delay, DynamicImage, Frame};
    use log::{debug, info};
    use std::io::BufWriter;
    use std::path::{Path, PathBuf};

    const STACK_EXTENSIONS: [&str; 7] = ["png", "tif", "tiff", "jpg", "jpeg", "bmp", "gif"];
    const MOSAIC_FRAME_DELAY_MS: u32 = 200;

    /// Loads every image in `dir` as one frame, ordered by file name. Frames are
    /// converted to 8-bit luma and labeled with their file name; the stack title is
    /// the directory name.
    pub fn load_stack(dir: &Path) -> Result<ImageStack> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_stack_extension(path))
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(EclosionError::EmptyStack);
        }

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let image = image::open(path)?.to_luma8();
            let label = path.file_name().map(|n| n.to_string_lossy().into_owned());
            frames.push((label, image));
        }

        let title = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stack".to_string());
        info!("Loaded {} frames from {}", frames.len(), dir.display());
        ImageStack::new(title, frames)
    }

    fn has_stack_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| STACK_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
    }

    /// `Hatching_{code}_{title}.gif`
    pub fn mosaic_file_name(code: &str, title: &str) -> String {
        format!("Hatching_{code}_{title}.gif")
    }

    /// Saves the mosaic frames as a looping animated GIF.
    pub fn save_mosaic(path: &Path, mosaic: &Mosaic) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder.set_repeat(Repeat::Infinite)?;
        for frame in &mosaic.frames {
            let rgba = DynamicImage::ImageLuma8(frame.clone()).to_rgba8();
            let delay = Delay::from_numer_denom_ms(MOSAIC_FRAME_DELAY_MS, 1);
            encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
        }
        debug!("Wrote {} mosaic frames to {}", mosaic.frames.len(), path.display());
        Ok(())
    }
}
