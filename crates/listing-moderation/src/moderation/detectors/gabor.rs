use serde::{Deserialize, Serialize};

/// Parameters of one real Gabor kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaborSpec {
    pub size: usize,
    pub sigma: f32,
    pub theta_degrees: f32,
    pub wavelength: f32,
    pub aspect: f32,
}

#[derive(Debug, Clone)]
pub struct GaborKernel {
    size: usize,
    weights: Vec<f32>,
}

impl GaborKernel {
    pub fn new(spec: &GaborSpec) -> Self {
        let size = spec.size.max(1) | 1;
        let half = (size / 2) as i64;
        let theta = spec.theta_degrees.to_radians();
        let (sin, cos) = theta.sin_cos();
        let sigma_x = spec.sigma;
        let sigma_y = spec.sigma / spec.aspect.max(f32::EPSILON);
        let ex = -0.5 / (sigma_x * sigma_x);
        let ey = -0.5 / (sigma_y * sigma_y);
        let frequency = 2.0 * std::f32::consts::PI / spec.wavelength.max(f32::EPSILON);

        let mut weights = Vec::with_capacity(size * size);
        for y in (-half..=half).rev() {
            for x in (-half..=half).rev() {
                let (xf, yf) = (x as f32, y as f32);
                let xr = xf * cos + yf * sin;
                let yr = -xf * sin + yf * cos;
                let envelope = (ex * xr * xr + ey * yr * yr).exp();
                weights.push(envelope * (frequency * xr).cos());
            }
        }

        Self { size, weights }
    }

    /// Correlates the kernel with a grayscale plane (reflect-101 borders) and
    /// saturates the response to 8 bits.
    pub fn respond(&self, gray: &[u8], width: usize, height: usize) -> Vec<u8> {
        let half = (self.size / 2) as i64;
        let mut out = Vec::with_capacity(width * height);
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                let mut acc = 0.0f32;
                for ky in 0..self.size as i64 {
                    let sy = reflect_101(y + ky - half, height);
                    let row = sy * width;
                    for kx in 0..self.size as i64 {
                        let sx = reflect_101(x + kx - half, width);
                        let weight = self.weights[(ky * self.size as i64 + kx) as usize];
                        acc += weight * f32::from(gray[row + sx]);
                    }
                }
                out.push(acc.round().clamp(0.0, 255.0) as u8);
            }
        }
        out
    }
}

fn reflect_101(index: i64, len: usize) -> usize {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut value = index.rem_euclid(period);
    if value >= len {
        value = period - value;
    }
    value as usize
}

/// Population variance of an 8-bit plane.
pub fn variance(values: &[u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|v| f64::from(*v)).sum::<f64>() / n;
    values
        .iter()
        .map(|v| {
            let delta = f64::from(*v) - mean;
            delta * delta
        })
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GaborSpec {
        GaborSpec {
            size: 21,
            sigma: 5.0,
            theta_degrees: 0.0,
            wavelength: std::f32::consts::PI,
            aspect: 0.5,
        }
    }

    #[test]
    fn reflect_mirrors_without_repeating_edge() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(2, 5), 2);
    }

    #[test]
    fn uniform_plane_has_zero_variance() {
        let kernel = GaborKernel::new(&spec());
        let response = kernel.respond(&[90u8; 24 * 24], 24, 24);
        assert_eq!(variance(&response), 0.0);
    }

    #[test]
    fn stripes_excite_matching_orientation() {
        let width = 32;
        let gray: Vec<u8> = (0..width * width)
            .map(|index| if (index % width) % 4 < 2 { 0 } else { 255 })
            .collect();
        let response = GaborKernel::new(&spec()).respond(&gray, width, width);
        assert!(variance(&response) > 100.0);
    }
}
