use serde::{Deserialize, Serialize};

use super::geometry::Contour;
use super::mask::Mask;
use super::{AssetImage, Detector, DetectorError};

/// Tuning for the regular-arrangement signal (pills laid out for a photo).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringParams {
    pub blur_size: usize,
    pub blur_sigma: f32,
    pub block_size: usize,
    pub offset: f32,
    pub opening_size: usize,
    pub min_object_area: f64,
    pub min_objects: usize,
    pub max_objects: usize,
    pub cv_ceiling: f64,
    pub gain: f64,
    pub max_trace_steps: usize,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            blur_size: 7,
            blur_sigma: 2.0,
            block_size: 11,
            offset: 2.0,
            opening_size: 3,
            min_object_area: 200.0,
            min_objects: 3,
            max_objects: 64,
            cv_ceiling: 0.5,
            gain: 2.0,
            max_trace_steps: 200_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusteringDetector {
    params: ClusteringParams,
}

impl ClusteringDetector {
    pub fn new(params: ClusteringParams) -> Self {
        Self { params }
    }

    fn foreground(&self, gray: &[u8], width: usize, height: usize) -> Mask {
        let blurred = gaussian_blur(gray, width, height, self.params.blur_size, self.params.blur_sigma);
        let means = local_means(&blurred, width, height, self.params.block_size / 2);
        let offset = self.params.offset;
        Mask::from_values(
            width,
            height,
            blurred
                .iter()
                .zip(means.iter())
                .map(|(value, mean)| *value <= mean - offset),
        )
        .open(self.params.opening_size)
    }

    /// Scores a set of object centroids by the regularity of their spacing.
    pub fn score_centroids(&self, centroids: &[(f64, f64)]) -> Result<f32, DetectorError> {
        let p = &self.params;
        if centroids.len() < p.min_objects {
            return Ok(0.0);
        }

        let mut distances = Vec::with_capacity(centroids.len() * (centroids.len() - 1) / 2);
        for (index, a) in centroids.iter().enumerate() {
            for b in &centroids[index + 1..] {
                distances.push(((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt());
            }
        }

        let n = distances.len() as f64;
        let mean = distances.iter().sum::<f64>() / n;
        if mean <= f64::EPSILON {
            return Err(DetectorError::Numeric(
                "object centroids coincide".to_string(),
            ));
        }
        let std = (distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n).sqrt();
        let cv = std / mean;

        if cv < p.cv_ceiling {
            Ok(((p.cv_ceiling - cv) * p.gain).min(1.0) as f32)
        } else {
            Ok(0.0)
        }
    }
}

impl Detector for ClusteringDetector {
    fn name(&self) -> &'static str {
        "clustering"
    }

    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError> {
        let frame = image.frame;
        let foreground = self.foreground(frame.gray(), frame.width(), frame.height());
        let centroids: Vec<(f64, f64)> = Contour::external(&foreground, self.params.max_trace_steps)
            .iter()
            .filter(|contour| contour.area() >= self.params.min_object_area)
            .filter_map(Contour::centroid)
            .take(self.params.max_objects)
            .collect();
        self.score_centroids(&centroids)
    }
}

fn gaussian_blur(gray: &[u8], width: usize, height: usize, size: usize, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let half = (size / 2) as i64;
    let sigma = if sigma > 0.0 { sigma } else { 1.0 };
    let mut weights: Vec<f32> = (-half..=half)
        .map(|offset| (-((offset * offset) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    weights.iter_mut().for_each(|weight| *weight /= total);

    let clamp = |value: i64, len: usize| value.clamp(0, len as i64 - 1) as usize;

    let mut horizontal = vec![0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            horizontal[y * width + x] = weights
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sx = clamp(x as i64 + k as i64 - half, width);
                    weight * f32::from(gray[y * width + sx])
                })
                .sum();
        }
    }

    let mut out = vec![0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            out[y * width + x] = weights
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sy = clamp(y as i64 + k as i64 - half, height);
                    weight * horizontal[sy * width + x]
                })
                .sum();
        }
    }
    out
}

/// Mean over a `(2r+1)²` window clipped to the image.
fn local_means(values: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let stride = width + 1;
    let mut sums = vec![0f64; stride * (height + 1)];
    for y in 0..height {
        let mut row = 0f64;
        for x in 0..width {
            row += f64::from(values[y * width + x]);
            sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
        }
    }

    let mut means = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let x0 = x.saturating_sub(radius);
            let y0 = y.saturating_sub(radius);
            let x1 = (x + radius + 1).min(width);
            let y1 = (y + radius + 1).min(height);
            let total = sums[y1 * stride + x1] - sums[y0 * stride + x1] - sums[y1 * stride + x0]
                + sums[y0 * stride + x0];
            let area = ((x1 - x0) * (y1 - y0)) as f64;
            means.push((total / area) as f32);
        }
    }
    means
}
