// THEORY:
// The `Region` module is the spatial vocabulary of the detector. A `Region` is the
// exact set of pixels a segmented object occupies on the reference frame, plus its
// bounding box. Pupae are stationary, so the same pixel set is re-used unchanged on
// every later frame: measuring an object over time means sampling this one mask
// against many frames.
//
// Key architectural principles:
// 1.  **Dumb Data Container**: Like the `Point` and `BoundingBox` it is made of, a
//     `Region` only knows how to describe itself (area, centroid, border contact)
//     and how to pull its pixel values out of a frame. It does not know what those
//     values mean.
// 2.  **Histogram Statistics**: `BrightnessStatistic` reduces the sampled values of
//     one region on one frame to a single scalar. All five statistics are computed
//     from a 256-bin histogram, the way 8-bit measurement tools do it, so that the
//     median and mode have well-defined tie behavior.

pub mod region {
    use crate::error::EclosionError;
    use image::GrayImage;
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;

    /// A pixel coordinate on a frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Point {
        pub x: u32,
        pub y: u32,
    }

    /// An axis-aligned, inclusive pixel rectangle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BoundingBox {
        pub min: Point,
        pub max: Point,
    }

    /// The pixel mask of one segmented object.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Region {
        /// Every pixel belonging to the object, in discovery order.
        pub pixels: Vec<Point>,
        pub bounding_box: BoundingBox,
    }

    impl Region {
        /// Builds a region from its pixel list. Returns `None` for an empty list.
        pub fn from_pixels(pixels: Vec<Point>) -> Option<Self> {
            let first = *pixels.first()?;
            let mut min = first;
            let mut max = first;
            for p in &pixels {
                min.x = min.x.min(p.x);
                min.y = min.y.min(p.y);
                max.x = max.x.max(p.x);
                max.y = max.y.max(p.y);
            }
            Some(Self {
                pixels,
                bounding_box: BoundingBox { min, max },
            })
        }

        /// A filled rectangle, mostly useful for synthetic stacks.
        pub fn rectangle(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
            let pixels = (y..y + height)
                .flat_map(|py| (x..x + width).map(move |px| Point { x: px, y: py }))
                .collect();
            Self::from_pixels(pixels)
        }

        pub fn area(&self) -> usize {
            self.pixels.len()
        }

        /// Unweighted centroid using pixel centres, i.e. `(x + 0.5, y + 0.5)`.
        pub fn centroid(&self) -> (f64, f64) {
            let n = self.pixels.len() as f64;
            let (sx, sy) = self.pixels.iter().fold((0.0, 0.0), |(sx, sy), p| {
                (sx + p.x as f64 + 0.5, sy + p.y as f64 + 0.5)
            });
            (sx / n, sy / n)
        }

        pub fn touches_border(&self, width: u32, height: u32) -> bool {
            let bb = &self.bounding_box;
            bb.min.x == 0 || bb.min.y == 0 || bb.max.x + 1 >= width || bb.max.y + 1 >= height
        }

        pub fn fits_within(&self, width: u32, height: u32) -> bool {
            self.bounding_box.max.x < width && self.bounding_box.max.y < height
        }

        /// Reads the region's pixel values from `image`.
        /// Returns `None` if the region does not fit inside the image.
        pub fn sample(&self, image: &GrayImage) -> Option<Vec<u8>> {
            if !self.fits_within(image.width(), image.height()) {
                return None;
            }
            Some(
                self.pixels
                    .iter()
                    .map(|p| image.get_pixel(p.x, p.y).0[0])
                    .collect(),
            )
        }
    }

    /// The per-frame scalar used to summarise a region's brightness.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub enum BrightnessStatistic {
        Mean,
        Median,
        Mode,
        Min,
        Max,
    }

    impl BrightnessStatistic {
        pub const ALL: [BrightnessStatistic; 5] = [
            BrightnessStatistic::Mean,
            BrightnessStatistic::Median,
            BrightnessStatistic::Mode,
            BrightnessStatistic::Min,
            BrightnessStatistic::Max,
        ];

        pub fn name(&self) -> &'static str {
            match self {
                BrightnessStatistic::Mean => "Mean",
                BrightnessStatistic::Median => "Median",
                BrightnessStatistic::Mode => "Mode",
                BrightnessStatistic::Min => "Min",
                BrightnessStatistic::Max => "Max",
            }
        }

        /// Reduces 8-bit samples to one value. `None` when there are no samples.
        pub fn compute(&self, values: &[u8]) -> Option<f64> {
            if values.is_empty() {
                return None;
            }
            let mut histogram = [0usize; 256];
            for &v in values {
                histogram[v as usize] += 1;
            }
            let n = values.len();

            let value = match self {
                BrightnessStatistic::Mean => {
                    values.iter().map(|&v| v as f64).sum::<f64>() / n as f64
                }
                BrightnessStatistic::Median => {
                    // First bin whose cumulative count exceeds half the samples.
                    let half = n as f64 / 2.0;
                    let mut cumulative = 0usize;
                    let mut bin = 0usize;
                    for (i, &count) in histogram.iter().enumerate() {
                        cumulative += count;
                        bin = i;
                        if cumulative as f64 > half {
                            break;
                        }
                    }
                    bin as f64
                }
                BrightnessStatistic::Mode => {
                    let mut best = 0usize;
                    for (i, &count) in histogram.iter().enumerate() {
                        if count > histogram[best] {
                            best = i;
                        }
                    }
                    best as f64
                }
                BrightnessStatistic::Min => histogram.iter().position(|&c| c > 0)? as f64,
                BrightnessStatistic::Max => histogram.iter().rposition(|&c| c > 0)? as f64,
            };
            Some(value)
        }
    }

    impl fmt::Display for BrightnessStatistic {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    impl FromStr for BrightnessStatistic {
        type Err = EclosionError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Self::ALL
                .into_iter()
                .find(|stat| stat.name().eq_ignore_ascii_case(s.trim()))
                .ok_or_else(|| {
                    EclosionError::config(format!(
                        "unknown brightness statistic '{s}' (expected Mean, Median, Mode, Min or Max)"
                    ))
                })
        }
    }

    impl TryFrom<String> for BrightnessStatistic {
        type Error = EclosionError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            value.parse()
        }
    }

    impl From<BrightnessStatistic> for String {
        fn from(stat: BrightnessStatistic) -> Self {
            stat.name().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::region::*;
    use approx::assert_relative_eq;
    use image::{GrayImage, Luma};

    #[test]
    fn rectangle_has_expected_area_and_box() {
        let region = Region::rectangle(3, 4, 5, 2).unwrap();
        assert_eq!(region.area(), 10);
        assert_eq!(region.bounding_box.min, Point { x: 3, y: 4 });
        assert_eq!(region.bounding_box.max, Point { x: 7, y: 5 });
    }

    #[test]
    fn centroid_uses_pixel_centres() {
        let region = Region::rectangle(0, 0, 2, 2).unwrap();
        assert_eq!(region.centroid(), (1.0, 1.0));
    }

    #[test]
    fn centroid_and_mean_of_irregular_region() {
        let corner = Region::from_pixels(vec![
            Point { x: 0, y: 0 },
            Point { x: 1, y: 0 },
            Point { x: 0, y: 1 },
        ])
        .unwrap();
        let (cx, cy) = corner.centroid();
        assert_relative_eq!(cx, 2.5 / 3.0);
        assert_relative_eq!(cy, 2.5 / 3.0);

        let mean = BrightnessStatistic::Mean.compute(&[1, 2, 2]).unwrap();
        assert_relative_eq!(mean, 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn border_contact() {
        assert!(Region::rectangle(0, 5, 2, 2).unwrap().touches_border(20, 20));
        assert!(Region::rectangle(5, 5, 2, 15).unwrap().touches_border(20, 20));
        assert!(!Region::rectangle(5, 5, 2, 2).unwrap().touches_border(20, 20));
    }

    #[test]
    fn sample_fails_outside_the_image() {
        let image = GrayImage::from_pixel(4, 4, Luma([9]));
        assert_eq!(Region::rectangle(1, 1, 2, 2).unwrap().sample(&image), Some(vec![9; 4]));
        assert_eq!(Region::rectangle(3, 3, 2, 2).unwrap().sample(&image), None);
    }

    #[test]
    fn histogram_statistics() {
        let values = [10u8, 20, 20, 30, 90];
        assert_eq!(BrightnessStatistic::Mean.compute(&values), Some(34.0));
        assert_eq!(BrightnessStatistic::Median.compute(&values), Some(20.0));
        assert_eq!(BrightnessStatistic::Mode.compute(&values), Some(20.0));
        assert_eq!(BrightnessStatistic::Min.compute(&values), Some(10.0));
        assert_eq!(BrightnessStatistic::Max.compute(&values), Some(90.0));
        assert_eq!(BrightnessStatistic::Mean.compute(&[]), None);
    }

    #[test]
    fn even_count_median_takes_upper_middle_bin() {
        assert_eq!(BrightnessStatistic::Median.compute(&[10, 20, 30, 40]), Some(30.0));
    }

    #[test]
    fn mode_prefers_lowest_value_on_ties() {
        assert_eq!(BrightnessStatistic::Mode.compute(&[50, 50, 7, 7]), Some(7.0));
    }

    #[test]
    fn statistic_names_parse_case_insensitively() {
        assert_eq!("median".parse::<BrightnessStatistic>().unwrap(), BrightnessStatistic::Median);
        assert_eq!(" MAX ".parse::<BrightnessStatistic>().unwrap(), BrightnessStatistic::Max);
        assert!("average".parse::<BrightnessStatistic>().is_err());
    }
}
