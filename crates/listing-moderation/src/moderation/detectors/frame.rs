use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::mask::Mask;

/// Decoded image prepared for analysis: RGB, HSV and grayscale planes of equal size.
///
/// HSV follows the 8-bit convention used by most vision toolkits: hue in `0..180`,
/// saturation and value in `0..=255`.
#[derive(Debug, Clone)]
pub struct Frame {
    width: usize,
    height: usize,
    hsv: Vec<[u8; 3]>,
    gray: Vec<u8>,
}

impl Frame {
    /// Builds a frame, downscaling so the longest side is at most `max_side` pixels.
    /// A `max_side` of zero disables downscaling.
    pub fn from_rgb(image: &RgbImage, max_side: u32) -> Result<Self, FrameError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FrameError::Empty);
        }

        let longest = width.max(height);
        let resized;
        let source = if max_side > 0 && longest > max_side {
            let scale = f64::from(max_side) / f64::from(longest);
            let target_w = ((f64::from(width) * scale).round() as u32).max(1);
            let target_h = ((f64::from(height) * scale).round() as u32).max(1);
            resized = image::imageops::resize(image, target_w, target_h, FilterType::Triangle);
            &resized
        } else {
            image
        };

        let (width, height) = source.dimensions();
        let mut hsv = Vec::with_capacity((width * height) as usize);
        let mut gray = Vec::with_capacity((width * height) as usize);
        for pixel in source.pixels() {
            let [r, g, b] = pixel.0;
            hsv.push(rgb_to_hsv(r, g, b));
            gray.push(luma(r, g, b));
        }

        Ok(Self {
            width: width as usize,
            height: height as usize,
            hsv,
            gray,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn hsv(&self) -> &[[u8; 3]] {
        &self.hsv
    }

    pub fn gray(&self) -> &[u8] {
        &self.gray
    }

    /// Pixels whose HSV triple falls in any of the ranges.
    pub fn hsv_mask(&self, ranges: &[HsvRange]) -> Mask {
        Mask::from_values(
            self.width,
            self.height,
            self.hsv
                .iter()
                .map(|pixel| ranges.iter().any(|range| range.contains(*pixel))),
        )
    }

    /// Pixels whose grayscale intensity is strictly above `threshold`.
    pub fn gray_above(&self, threshold: u8) -> Mask {
        Mask::from_values(
            self.width,
            self.height,
            self.gray.iter().map(|value| *value > threshold),
        )
    }
}

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, pixel: [u8; 3]) -> bool {
        (0..3).all(|channel| {
            pixel[channel] >= self.lower[channel] && pixel[channel] <= self.upper[channel]
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("image has no pixels")]
    Empty,
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let value = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    value.round().clamp(0.0, 255.0) as u8
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let saturation = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    let hue = (hue / 2.0).round();
    let hue = if hue >= 180.0 { 0.0 } else { hue };
    [hue as u8, saturation.round() as u8, max as u8]
}
