use std::collections::VecDeque;

use super::mask::Mask;

/// Counter-clockwise 8-neighbourhood starting east (image rows grow downwards).
const DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Closed outer boundary of one 8-connected component.
#[derive(Debug, Clone)]
pub struct Contour {
    points: Vec<(i64, i64)>,
    pixel_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl BoundingBox {
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }
}

impl Contour {
    /// Outer contours of every 8-connected component, in raster order of their
    /// top-left pixel. `max_steps` bounds the trace length of each boundary.
    pub fn external(mask: &Mask, max_steps: usize) -> Vec<Contour> {
        let width = mask.width();
        let height = mask.height();
        let mut visited = vec![false; width * height];
        let mut contours = Vec::new();

        for y in 0..height {
            for x in 0..width {
                if !mask.get(x, y) || visited[y * width + x] {
                    continue;
                }
                let pixel_count = flood(mask, &mut visited, x, y);
                let points = trace(mask, (x as i64, y as i64), max_steps);
                contours.push(Contour {
                    points,
                    pixel_count,
                });
            }
        }

        contours
    }

    pub fn points(&self) -> &[(i64, i64)] {
        &self.points
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// Polygon area enclosed by the boundary (shoelace formula).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Closed boundary length.
    pub fn perimeter(&self) -> f64 {
        closed_length(&self.points)
    }

    /// `4π·area/perimeter²`; 1 for a perfect disc, 0 for degenerate contours.
    pub fn circularity(&self) -> f64 {
        let perimeter = self.perimeter();
        if perimeter <= f64::EPSILON {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area() / (perimeter * perimeter)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let (mut min_x, mut min_y) = (i64::MAX, i64::MAX);
        let (mut max_x, mut max_y) = (i64::MIN, i64::MIN);
        for &(x, y) in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if self.points.is_empty() {
            return BoundingBox {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            };
        }
        BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    /// Area-weighted polygon centroid, or the vertex mean for degenerate polygons.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len();
        let mut signed_area = 0.0;
        let (mut cx, mut cy) = (0.0, 0.0);
        for index in 0..n {
            let (x0, y0) = self.points[index];
            let (x1, y1) = self.points[(index + 1) % n];
            let cross = (x0 * y1 - x1 * y0) as f64;
            signed_area += cross;
            cx += (x0 + x1) as f64 * cross;
            cy += (y0 + y1) as f64 * cross;
        }
        if signed_area.abs() > f64::EPSILON {
            let factor = 1.0 / (3.0 * signed_area);
            return Some((cx * factor, cy * factor));
        }
        let (sum_x, sum_y) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
        Some((sum_x / n as f64, sum_y / n as f64))
    }

    /// Vertex count of the closed Douglas–Peucker approximation with tolerance
    /// `epsilon_ratio × perimeter`.
    pub fn approx_vertex_count(&self, epsilon_ratio: f64) -> usize {
        approximate_closed(&self.points, epsilon_ratio * self.perimeter()).len()
    }
}

fn flood(mask: &Mask, visited: &mut [bool], x: usize, y: usize) -> usize {
    let width = mask.width();
    let mut queue = VecDeque::from([(x, y)]);
    visited[y * width + x] = true;
    let mut count = 0;
    while let Some((cx, cy)) = queue.pop_front() {
        count += 1;
        for (dx, dy) in DIRECTIONS {
            let nx = cx as i64 + dx;
            let ny = cy as i64 + dy;
            if !mask.get_signed(nx, ny) {
                continue;
            }
            let index = ny as usize * width + nx as usize;
            if !visited[index] {
                visited[index] = true;
                queue.push_back((nx as usize, ny as usize));
            }
        }
    }
    count
}

/// Boundary following from the component's top-left pixel.
fn trace(mask: &Mask, start: (i64, i64), max_steps: usize) -> Vec<(i64, i64)> {
    let mut points = vec![start];
    let mut current = start;
    let mut direction = 7usize;

    for _ in 0..max_steps {
        let first = if direction % 2 == 0 {
            (direction + 7) % 8
        } else {
            (direction + 6) % 8
        };

        let next = (0..8).map(|offset| (first + offset) % 8).find_map(|candidate| {
            let (dx, dy) = DIRECTIONS[candidate];
            let point = (current.0 + dx, current.1 + dy);
            mask.get_signed(point.0, point.1)
                .then_some((candidate, point))
        });

        let Some((candidate, point)) = next else {
            break;
        };
        direction = candidate;
        if points.len() >= 2 && current == points[0] && point == points[1] {
            break;
        }
        points.push(point);
        current = point;
    }

    if points.len() > 1 && points.last() == points.first() {
        points.pop();
    }
    points
}

fn polygon_area(points: &[(i64, i64)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|index| {
            let (x0, y0) = points[index];
            let (x1, y1) = points[(index + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum();
    twice.abs() as f64 / 2.0
}

fn distance(a: (i64, i64), b: (i64, i64)) -> f64 {
    let dx = (a.0 - b.0) as f64;
    let dy = (a.1 - b.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

fn closed_length(points: &[(i64, i64)]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|index| distance(points[index], points[(index + 1) % n]))
        .sum()
}

fn approximate_closed(points: &[(i64, i64)], epsilon: f64) -> Vec<(i64, i64)> {
    if points.len() < 3 {
        return points.to_vec();
    }

    // Split the ring at the vertex farthest from the first one and simplify both halves.
    let far = (1..points.len())
        .max_by(|a, b| {
            distance(points[0], points[*a]).total_cmp(&distance(points[0], points[*b]))
        })
        .unwrap_or(1);

    let mut first_half = points[..=far].to_vec();
    let mut second_half = points[far..].to_vec();
    second_half.push(points[0]);

    first_half = simplify(&first_half, epsilon);
    second_half = simplify(&second_half, epsilon);

    first_half.pop();
    second_half.pop();
    first_half.extend(second_half);
    first_half
}

fn simplify(points: &[(i64, i64)], epsilon: f64) -> Vec<(i64, i64)> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let first = points[0];
    let last = points[points.len() - 1];

    let (index, max_distance) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(offset, point)| (offset + 1, segment_distance(*point, first, last)))
        .fold((0, 0.0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });

    if max_distance > epsilon && index > 0 {
        let mut left = simplify(&points[..=index], epsilon);
        let right = simplify(&points[index..], epsilon);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

fn segment_distance(point: (i64, i64), start: (i64, i64), end: (i64, i64)) -> f64 {
    let length = distance(start, end);
    if length <= f64::EPSILON {
        return distance(point, start);
    }
    let cross = (end.0 - start.0) * (start.1 - point.1) - (start.0 - point.0) * (end.1 - start.1);
    cross.abs() as f64 / length
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_rect(width: usize, height: usize, x0: usize, y0: usize, w: usize, h: usize) -> Mask {
        let mut mask = Mask::new(width, height);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.set(x, y, true);
            }
        }
        mask
    }

    fn filled_disc(size: usize, cx: f64, cy: f64, radius: f64) -> Mask {
        let mut mask = Mask::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    #[test]
    fn traces_rectangle_boundary() {
        let mask = filled_rect(20, 20, 5, 4, 10, 6);
        let contours = Contour::external(&mask, 10_000);
        assert_eq!(contours.len(), 1);
        let contour = &contours[0];
        assert_eq!(contour.pixel_count(), 60);
        assert_eq!(contour.area(), 45.0);
        assert_eq!(contour.perimeter(), 28.0);
        assert_eq!(contour.approx_vertex_count(0.02), 4);
        assert_eq!(
            contour.bounding_box(),
            BoundingBox {
                x: 5,
                y: 4,
                width: 10,
                height: 6
            }
        );
    }

    #[test]
    fn disc_is_nearly_circular() {
        let mask = filled_disc(60, 30.0, 30.0, 15.0);
        let contours = Contour::external(&mask, 10_000);
        assert_eq!(contours.len(), 1);
        let circularity = contours[0].circularity();
        assert!(circularity > 0.7 && circularity <= 1.0, "circularity {circularity}");
        let (cx, cy) = contours[0].centroid().expect("centroid");
        assert!((cx - 30.0).abs() < 1.0 && (cy - 30.0).abs() < 1.0);
    }

    #[test]
    fn separates_components() {
        let mut mask = filled_rect(30, 10, 1, 1, 4, 4);
        for y in 1..5 {
            for x in 20..24 {
                mask.set(x, y, true);
            }
        }
        mask.set(10, 8, true);
        let contours = Contour::external(&mask, 10_000);
        assert_eq!(contours.len(), 3);
        assert_eq!(contours[2].points().len(), 1);
        assert_eq!(contours[2].area(), 0.0);
    }
}
