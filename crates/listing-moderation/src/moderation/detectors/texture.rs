use serde::{Deserialize, Serialize};

use super::gabor::{variance, GaborKernel, GaborSpec};
use super::{AssetImage, Detector, DetectorError};

/// Oriented band-pass bank. Fibrous kernels look for dried-leaf texture, the
/// granular kernel for powders; the strongest response variance wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureParams {
    pub fibrous: Vec<GaborSpec>,
    pub granular: Vec<GaborSpec>,
    pub variance_scale: f64,
}

impl Default for TextureParams {
    fn default() -> Self {
        let fibrous = [0.0, 45.0, 90.0, 135.0]
            .into_iter()
            .map(|theta_degrees| GaborSpec {
                size: 21,
                sigma: 5.0,
                theta_degrees,
                wavelength: 2.0 * std::f32::consts::PI * 0.5,
                aspect: 0.5,
            })
            .collect();
        let granular = vec![GaborSpec {
            size: 15,
            sigma: 3.0,
            theta_degrees: 90.0,
            wavelength: 2.0 * std::f32::consts::PI * 0.8,
            aspect: 0.3,
        }];

        Self {
            fibrous,
            granular,
            variance_scale: 10_000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureDetector {
    kernels: Vec<GaborKernel>,
    variance_scale: f64,
}

impl TextureDetector {
    pub fn new(params: TextureParams) -> Self {
        let kernels = params
            .fibrous
            .iter()
            .chain(params.granular.iter())
            .map(GaborKernel::new)
            .collect();
        Self {
            kernels,
            variance_scale: params.variance_scale,
        }
    }
}

impl Detector for TextureDetector {
    fn name(&self) -> &'static str {
        "texture"
    }

    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError> {
        if self.variance_scale <= 0.0 {
            return Err(DetectorError::Misconfigured(
                "texture variance scale must be positive".to_string(),
            ));
        }
        let frame = image.frame;
        let strongest = self
            .kernels
            .iter()
            .map(|kernel| variance(&kernel.respond(frame.gray(), frame.width(), frame.height())))
            .fold(0.0f64, f64::max);

        Ok((strongest / self.variance_scale).min(1.0) as f32)
    }
}
