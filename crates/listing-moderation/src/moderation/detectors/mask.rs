/// Binary image stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    pub fn from_values(width: usize, height: usize, values: impl IntoIterator<Item = bool>) -> Self {
        let mut data: Vec<bool> = values.into_iter().take(width * height).collect();
        data.resize(width * height, false);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x]
    }

    /// Bounds-checked lookup for signed coordinates; outside pixels read as unset.
    pub fn get_signed(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && self.get(x as usize, y as usize)
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    pub fn values(&self) -> &[bool] {
        &self.data
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|value| **value).count()
    }

    pub fn ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.count() as f32 / self.data.len() as f32
    }

    /// Pixels set in `self` but not in `other`.
    pub fn subtract(&self, other: &Mask) -> Mask {
        Mask::from_values(
            self.width,
            self.height,
            self.data
                .iter()
                .zip(other.data.iter())
                .map(|(left, right)| *left && !*right),
        )
    }

    /// Rectangular dilation with a `size`×`size` window centred on each pixel.
    pub fn dilate(&self, size: usize) -> Mask {
        let table = SummedArea::new(self);
        let radius = size / 2;
        let mut out = Mask::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let (count, _) = table.window(x, y, radius);
                out.data[y * self.width + x] = count > 0;
            }
        }
        out
    }

    /// Rectangular erosion; pixels outside the image count as set.
    pub fn erode(&self, size: usize) -> Mask {
        let table = SummedArea::new(self);
        let radius = size / 2;
        let mut out = Mask::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let (count, area) = table.window(x, y, radius);
                out.data[y * self.width + x] = count == area;
            }
        }
        out
    }

    /// Erosion followed by dilation; removes specks smaller than the window.
    pub fn open(&self, size: usize) -> Mask {
        self.erode(size).dilate(size)
    }
}

/// Integral image over a mask, answering window counts in constant time.
struct SummedArea {
    width: usize,
    height: usize,
    sums: Vec<u32>,
}

impl SummedArea {
    fn new(mask: &Mask) -> Self {
        let stride = mask.width + 1;
        let mut sums = vec![0u32; stride * (mask.height + 1)];
        for y in 0..mask.height {
            let mut row = 0u32;
            for x in 0..mask.width {
                row += u32::from(mask.data[y * mask.width + x]);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self {
            width: mask.width,
            height: mask.height,
            sums,
        }
    }

    /// Set-pixel count and in-bounds area of the window clipped to the image.
    fn window(&self, x: usize, y: usize, radius: usize) -> (u32, u32) {
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        let x1 = (x + radius + 1).min(self.width);
        let y1 = (y + radius + 1).min(self.height);
        let stride = self.width + 1;
        let total = self.sums[y1 * stride + x1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1]
            - self.sums[y1 * stride + x0];
        (total, ((x1 - x0) * (y1 - y0)) as u32)
    }
}
