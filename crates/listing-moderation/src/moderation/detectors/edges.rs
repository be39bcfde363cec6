use super::mask::Mask;

/// Canny edge map over an 8-bit grayscale plane using 3×3 Sobel gradients, L1
/// magnitude and hysteresis between `low` and `high`.
pub fn canny(gray: &[u8], width: usize, height: usize, low: f32, high: f32) -> Mask {
    let mut edges = Mask::new(width, height);
    if width < 3 || height < 3 {
        return edges;
    }

    let sample = |x: i64, y: i64| -> f32 {
        let cx = x.clamp(0, width as i64 - 1) as usize;
        let cy = y.clamp(0, height as i64 - 1) as usize;
        f32::from(gray[cy * width + cx])
    };

    let mut gx = vec![0f32; width * height];
    let mut gy = vec![0f32; width * height];
    let mut magnitude = vec![0f32; width * height];
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let dx = (sample(x + 1, y - 1) + 2.0 * sample(x + 1, y) + sample(x + 1, y + 1))
                - (sample(x - 1, y - 1) + 2.0 * sample(x - 1, y) + sample(x - 1, y + 1));
            let dy = (sample(x - 1, y + 1) + 2.0 * sample(x, y + 1) + sample(x + 1, y + 1))
                - (sample(x - 1, y - 1) + 2.0 * sample(x, y - 1) + sample(x + 1, y - 1));
            let index = y as usize * width + x as usize;
            gx[index] = dx;
            gy[index] = dy;
            magnitude[index] = dx.abs() + dy.abs();
        }
    }

    // Non-maximum suppression along the quantised gradient direction.
    let tan_22_5 = 0.414_213_57_f32;
    let mut strength = vec![0u8; width * height];
    let mut stack = Vec::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let index = y * width + x;
            let value = magnitude[index];
            if value <= low {
                continue;
            }
            let (ax, ay) = (gx[index].abs(), gy[index].abs());
            let (before, after) = if ay <= ax * tan_22_5 {
                (magnitude[index - 1], magnitude[index + 1])
            } else if ay >= ax / tan_22_5 {
                (magnitude[index - width], magnitude[index + width])
            } else if (gx[index] > 0.0) == (gy[index] > 0.0) {
                (magnitude[index - width - 1], magnitude[index + width + 1])
            } else {
                (magnitude[index - width + 1], magnitude[index + width - 1])
            };
            if value > before && value >= after {
                if value > high {
                    strength[index] = 2;
                    stack.push((x, y));
                } else {
                    strength[index] = 1;
                }
            }
        }
    }

    // Hysteresis: weak pixels survive when 8-connected to a strong one.
    while let Some((x, y)) = stack.pop() {
        edges.set(x, y, true);
        for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                let index = ny * width + nx;
                if strength[index] == 1 {
                    strength[index] = 2;
                    stack.push((nx, ny));
                }
            }
        }
    }

    edges
}
