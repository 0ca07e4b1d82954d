// THEORY:
// The `ParticleAnalyzer` is the segmentation primitive of the detector. It turns
// one grayscale frame into a list of `CandidateObject`s: connected groups of pixels
// that are at least as dark as a threshold.
//
// Algorithm steps:
// 1.  **Binary Mask**: A pixel belongs to the foreground when `value <= threshold`.
//     Pupae are darker than the background they rest on.
// 2.  **Raster Seeding**: The frame is scanned row by row, left to right. The first
//     unvisited foreground pixel of each object seeds it, so object ids follow the
//     order in which objects are met by the scan.
// 3.  **Region Growing**: From the seed, a flood fill collects every 8-connected
//     foreground neighbour.
// 4.  **Particle Filtering**: Objects smaller than the area floor are dropped, and
//     so are objects that touch the frame border when edge exclusion is on (they
//     are usually cut-off pupae whose brightness cannot be trusted).
// 5.  **Stateless Utility**: Nothing is remembered between calls.

use crate::core_modules::region::region::{Point, Region};
use image::GrayImage;

/// A segmented object on the reference frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateObject {
    /// 1-based identifier, stable for the whole run.
    pub id: usize,
    pub region: Region,
    /// Pixel count.
    pub area: f64,
}

/// Anything that can split a frame into candidate objects.
pub trait Segmenter {
    fn segment(&self, frame: &GrayImage, threshold: u8) -> Vec<CandidateObject>;
}

pub mod particle_analyzer {
    use super::*;

    const NEIGHBOURS: [(i64, i64); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    /// Threshold segmentation with 8-connected component labelling.
    #[derive(Debug, Clone)]
    pub struct ParticleAnalyzer {
        /// Smallest accepted object area in pixels.
        pub min_area: f64,
        /// Drop objects touching the frame border.
        pub exclude_edges: bool,
    }

    impl Default for ParticleAnalyzer {
        fn default() -> Self {
            Self {
                min_area: 10.0,
                exclude_edges: true,
            }
        }
    }

    impl Segmenter for ParticleAnalyzer {
        fn segment(&self, frame: &GrayImage, threshold: u8) -> Vec<CandidateObject> {
            let (width, height) = frame.dimensions();
            let mut visited = vec![false; (width * height) as usize];
            let mut objects = Vec::new();

            for y in 0..height {
                for x in 0..width {
                    let index = (y * width + x) as usize;
                    if visited[index] || frame.get_pixel(x, y).0[0] > threshold {
                        continue;
                    }
                    let pixels = grow_particle(frame, threshold, Point { x, y }, &mut visited);
                    let Some(region) = Region::from_pixels(pixels) else {
                        continue;
                    };

                    let area = region.area() as f64;
                    if area < self.min_area {
                        continue;
                    }
                    if self.exclude_edges && region.touches_border(width, height) {
                        continue;
                    }
                    objects.push(CandidateObject {
                        id: objects.len() + 1,
                        region,
                        area,
                    });
                }
            }

            objects
        }
    }

    /// Flood fill from `seed` over foreground pixels, marking them visited.
    fn grow_particle(
        frame: &GrayImage,
        threshold: u8,
        seed: Point,
        visited: &mut [bool],
    ) -> Vec<Point> {
        let (width, height) = frame.dimensions();
        let mut particle = Vec::new();
        let mut queue = vec![seed];
        visited[(seed.y * width + seed.x) as usize] = true;

        while let Some(current) = queue.pop() {
            particle.push(current);

            for (dx, dy) in NEIGHBOURS {
                let nx = current.x as i64 + dx;
                let ny = current.y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                let index = (ny * width + nx) as usize;
                if !visited[index] && frame.get_pixel(nx, ny).0[0] <= threshold {
                    visited[index] = true;
                    queue.push(Point { x: nx, y: ny });
                }
            }
        }

        particle
    }
}

#[cfg(test)]
mod tests {
    use super::particle_analyzer::ParticleAnalyzer;
    use super::*;
    use image::Luma;

    fn paint(frame: &mut GrayImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
        for py in y..y + h {
            for px in x..x + w {
                frame.put_pixel(px, py, Luma([value]));
            }
        }
    }

    #[test]
    fn finds_dark_objects_in_raster_order() {
        let mut frame = GrayImage::from_pixel(40, 40, Luma([200]));
        paint(&mut frame, 20, 5, 4, 4, 30);
        paint(&mut frame, 5, 20, 5, 5, 30);
        let objects = ParticleAnalyzer::default().segment(&frame, 90);

        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].id, 1);
        assert_eq!(objects[0].area, 16.0);
        assert_eq!(objects[0].region.bounding_box.min, Point { x: 20, y: 5 });
        assert_eq!(objects[1].id, 2);
        assert_eq!(objects[1].area, 25.0);
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let mut frame = GrayImage::from_pixel(20, 20, Luma([200]));
        for i in 0..12 {
            frame.put_pixel(4 + i, 4 + i, Luma([0]));
        }
        let analyzer = ParticleAnalyzer {
            min_area: 1.0,
            exclude_edges: true,
        };
        let objects = analyzer.segment(&frame, 90);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].area, 12.0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut frame = GrayImage::from_pixel(20, 20, Luma([200]));
        paint(&mut frame, 5, 5, 4, 4, 90);
        assert_eq!(ParticleAnalyzer::default().segment(&frame, 90).len(), 1);
        assert!(ParticleAnalyzer::default().segment(&frame, 89).is_empty());
    }

    #[test]
    fn small_and_edge_objects_are_dropped() {
        let mut frame = GrayImage::from_pixel(30, 30, Luma([200]));
        paint(&mut frame, 10, 10, 3, 3, 10);
        paint(&mut frame, 0, 20, 5, 5, 10);
        let analyzer = ParticleAnalyzer::default();
        assert!(analyzer.segment(&frame, 90).is_empty());

        let keep_edges = ParticleAnalyzer {
            min_area: 10.0,
            exclude_edges: false,
        };
        let objects = keep_edges.segment(&frame, 90);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].area, 25.0);
    }
}
