use serde::{Deserialize, Serialize};
use tracing::debug;

use super::frame::HsvRange;
use super::geometry::Contour;
use super::{AssetImage, Detector, DetectorError};

/// Tuning for the fresh-green / dried-brown vegetation signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannabisColorParams {
    pub green_ranges: Vec<HsvRange>,
    pub brown_ranges: Vec<HsvRange>,
    pub corroborated_green_ratio: f32,
    pub corroborated_brown_ratio: f32,
    pub corroborated_score: f32,
    pub dominant_green_ratio: f32,
    pub dominant_green_score: f32,
    pub dominant_brown_ratio: f32,
    pub dominant_brown_score: f32,
    pub ratio_gain: f32,
}

impl Default for CannabisColorParams {
    fn default() -> Self {
        Self {
            green_ranges: vec![
                HsvRange::new([35, 40, 40], [85, 255, 255]),
                HsvRange::new([85, 30, 30], [100, 255, 255]),
            ],
            brown_ranges: vec![
                HsvRange::new([10, 50, 20], [20, 255, 200]),
                HsvRange::new([15, 30, 30], [35, 255, 200]),
            ],
            corroborated_green_ratio: 0.3,
            corroborated_brown_ratio: 0.1,
            corroborated_score: 0.9,
            dominant_green_ratio: 0.5,
            dominant_green_score: 0.7,
            dominant_brown_ratio: 0.3,
            dominant_brown_score: 0.6,
            ratio_gain: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CannabisColorDetector {
    params: CannabisColorParams,
}

impl CannabisColorDetector {
    pub fn new(params: CannabisColorParams) -> Self {
        Self { params }
    }
}

impl Detector for CannabisColorDetector {
    fn name(&self) -> &'static str {
        "cannabis_color"
    }

    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError> {
        let p = &self.params;
        let green = image.frame.hsv_mask(&p.green_ranges).ratio();
        let brown = image.frame.hsv_mask(&p.brown_ranges).ratio();

        let score = if green > p.corroborated_green_ratio && brown > p.corroborated_brown_ratio {
            p.corroborated_score
        } else if green > p.dominant_green_ratio {
            p.dominant_green_score
        } else if brown > p.dominant_brown_ratio {
            p.dominant_brown_score
        } else {
            (green * p.ratio_gain).max(brown * p.ratio_gain)
        };

        Ok(score.min(1.0))
    }
}

/// Tuning for skin-tone exposure, including the topology and surrounding-colour
/// corrections that separate photographs from figurines and illustrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinExposureParams {
    pub skin_ranges: Vec<HsvRange>,
    pub min_ratio: f32,
    pub low_ratio_factor: f32,
    pub large_region_fraction: f64,
    pub scattered_region_count: usize,
    pub scattered_max_large_regions: usize,
    pub scattered_factor: f32,
    pub tiny_region_fraction: f64,
    pub tiny_factor: f32,
    pub surround_window: usize,
    pub vibrant_saturation: u8,
    pub vibrant_ratio: f32,
    pub vibrant_factor: f32,
    pub unnatural_hues: Vec<[u8; 2]>,
    pub unnatural_ratio: f32,
    pub unnatural_factor: f32,
    pub concentrated_min_regions: usize,
    pub concentrated_fraction: f64,
    pub concentrated_factor: f32,
    pub high_ratio: f32,
    pub high_ratio_factor: f32,
    pub max_trace_steps: usize,
}

impl Default for SkinExposureParams {
    fn default() -> Self {
        Self {
            skin_ranges: vec![
                HsvRange::new([0, 20, 70], [20, 150, 255]),
                HsvRange::new([0, 25, 50], [15, 170, 255]),
                HsvRange::new([0, 30, 30], [12, 255, 200]),
            ],
            min_ratio: 0.15,
            low_ratio_factor: 0.3,
            large_region_fraction: 0.05,
            scattered_region_count: 5,
            scattered_max_large_regions: 2,
            scattered_factor: 0.4,
            tiny_region_fraction: 0.02,
            tiny_factor: 0.3,
            surround_window: 15,
            vibrant_saturation: 150,
            vibrant_ratio: 0.3,
            vibrant_factor: 0.5,
            unnatural_hues: vec![[100, 130], [40, 80], [160, 179], [0, 10]],
            unnatural_ratio: 0.2,
            unnatural_factor: 0.3,
            concentrated_min_regions: 2,
            concentrated_fraction: 0.3,
            concentrated_factor: 1.8,
            high_ratio: 0.4,
            high_ratio_factor: 1.5,
            max_trace_steps: 200_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkinExposureDetector {
    params: SkinExposureParams,
}

impl SkinExposureDetector {
    pub fn new(params: SkinExposureParams) -> Self {
        Self { params }
    }

    fn surround_signals(&self, image: &AssetImage<'_>, skin: &super::mask::Mask) -> (bool, bool) {
        let p = &self.params;
        let ring = skin.dilate(p.surround_window).subtract(skin);
        let hsv = image.frame.hsv();

        let mut total = 0usize;
        let mut vibrant = 0usize;
        let mut unnatural = 0usize;
        for (pixel, in_ring) in hsv.iter().zip(ring.values()) {
            if !*in_ring {
                continue;
            }
            total += 1;
            if pixel[1] > p.vibrant_saturation {
                vibrant += 1;
            }
            if p
                .unnatural_hues
                .iter()
                .any(|[low, high]| pixel[0] >= *low && pixel[0] <= *high)
            {
                unnatural += 1;
            }
        }

        if total == 0 {
            return (false, false);
        }
        let total = total as f32;
        (
            vibrant as f32 / total > p.vibrant_ratio,
            unnatural as f32 / total > p.unnatural_ratio,
        )
    }
}

impl Detector for SkinExposureDetector {
    fn name(&self) -> &'static str {
        "skin_exposure"
    }

    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError> {
        let p = &self.params;
        let skin = image.frame.hsv_mask(&p.skin_ranges);
        let mut ratio = skin.ratio();
        if ratio < p.min_ratio {
            return Ok(ratio * p.low_ratio_factor);
        }

        let contours = Contour::external(&skin, p.max_trace_steps);
        if contours.is_empty() {
            return Ok(0.0);
        }

        let total_pixels = image.frame.pixel_count() as f64;
        let areas: Vec<f64> = contours.iter().map(Contour::area).collect();
        let large: Vec<f64> = areas
            .iter()
            .copied()
            .filter(|area| *area > total_pixels * p.large_region_fraction)
            .collect();
        let connected_area: f64 = large.iter().sum();

        let mut adjustments = Vec::new();
        if contours.len() > p.scattered_region_count
            && large.len() < p.scattered_max_large_regions
        {
            ratio *= p.scattered_factor;
            adjustments.push("scattered_regions");
        }

        let mean_area = areas.iter().sum::<f64>() / areas.len() as f64;
        if mean_area < total_pixels * p.tiny_region_fraction {
            ratio *= p.tiny_factor;
            adjustments.push("tiny_regions");
        }

        let (vibrant, unnatural) = self.surround_signals(image, &skin);
        if vibrant {
            ratio *= p.vibrant_factor;
            adjustments.push("vibrant_surround");
        }
        if unnatural {
            ratio *= p.unnatural_factor;
            adjustments.push("unnatural_surround");
        }

        if large.len() >= p.concentrated_min_regions
            && connected_area > total_pixels * p.concentrated_fraction
        {
            ratio *= p.concentrated_factor;
            adjustments.push("concentrated_regions");
        }
        if ratio > p.high_ratio {
            ratio *= p.high_ratio_factor;
            adjustments.push("high_ratio");
        }

        if !adjustments.is_empty() {
            debug!(
                file = image.filename,
                regions = contours.len(),
                large_regions = large.len(),
                ?adjustments,
                "skin exposure adjusted"
            );
        }

        Ok(ratio.clamp(0.0, 1.0))
    }
}

/// Tuning for white powder and bright crystal coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitePowderParams {
    pub white_ranges: Vec<HsvRange>,
    pub crystal_gray: u8,
    pub dominant_white_ratio: f32,
    pub dominant_white_score: f32,
    pub dominant_crystal_ratio: f32,
    pub dominant_crystal_score: f32,
    pub ratio_gain: f32,
}

impl Default for WhitePowderParams {
    fn default() -> Self {
        Self {
            white_ranges: vec![HsvRange::new([0, 0, 200], [180, 30, 255])],
            crystal_gray: 240,
            dominant_white_ratio: 0.4,
            dominant_white_score: 0.8,
            dominant_crystal_ratio: 0.3,
            dominant_crystal_score: 0.6,
            ratio_gain: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WhitePowderDetector {
    params: WhitePowderParams,
}

impl WhitePowderDetector {
    pub fn new(params: WhitePowderParams) -> Self {
        Self { params }
    }
}

impl Detector for WhitePowderDetector {
    fn name(&self) -> &'static str {
        "white_powder"
    }

    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError> {
        let p = &self.params;
        let white = image.frame.hsv_mask(&p.white_ranges).ratio();
        let crystal = image.frame.gray_above(p.crystal_gray).ratio();

        let score = if white > p.dominant_white_ratio {
            p.dominant_white_score
        } else if crystal > p.dominant_crystal_ratio {
            p.dominant_crystal_score
        } else {
            (white * p.ratio_gain).max(crystal * p.ratio_gain)
        };

        Ok(score.min(1.0))
    }
}
