use serde::{Deserialize, Serialize};

use super::edges::canny;
use super::geometry::Contour;
use super::{AssetImage, Detector, DetectorError};

/// Tuning for contour-shape signals: round pills, serrated leaves and bottle or
/// plant silhouettes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeParams {
    pub canny_low: f32,
    pub canny_high: f32,
    pub approx_epsilon_ratio: f64,
    pub pill_min_circularity: f64,
    pub pill_area: [f64; 2],
    pub pill_increment: f32,
    pub leaf_area: [f64; 2],
    pub leaf_min_vertices: usize,
    pub leaf_many: usize,
    pub leaf_many_score: f32,
    pub leaf_some_score: f32,
    pub object_min_area: f64,
    pub bottle_aspect: [f32; 2],
    pub bottle_min_area: f64,
    pub bottle_increment: f32,
    pub plant_min_vertices: usize,
    pub plant_min_area: f64,
    pub plant_increment: f32,
    pub max_trace_steps: usize,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            approx_epsilon_ratio: 0.02,
            pill_min_circularity: 0.7,
            pill_area: [100.0, 2000.0],
            pill_increment: 0.2,
            leaf_area: [500.0, 5000.0],
            leaf_min_vertices: 10,
            leaf_many: 3,
            leaf_many_score: 0.8,
            leaf_some_score: 0.5,
            object_min_area: 1000.0,
            bottle_aspect: [0.2, 0.6],
            bottle_min_area: 5000.0,
            bottle_increment: 0.7,
            plant_min_vertices: 8,
            plant_min_area: 3000.0,
            plant_increment: 0.5,
            max_trace_steps: 200_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShapeDetector {
    params: ShapeParams,
}

impl ShapeDetector {
    pub fn new(params: ShapeParams) -> Self {
        Self { params }
    }

    /// Strongest of the three sub-signals over a set of contours.
    pub fn score_contours(&self, contours: &[Contour]) -> f32 {
        let pills = self.round_pills(contours);
        let leaves = self.serrated_leaves(contours);
        let silhouettes = self.silhouettes(contours);
        pills.max(leaves).max(silhouettes)
    }

    fn round_pills(&self, contours: &[Contour]) -> f32 {
        let p = &self.params;
        let hits = contours
            .iter()
            .filter(|contour| {
                let area = contour.area();
                let circularity = contour.circularity();
                circularity > p.pill_min_circularity
                    && circularity <= 1.0
                    && area > p.pill_area[0]
                    && area < p.pill_area[1]
            })
            .count();
        (hits as f32 * p.pill_increment).min(1.0)
    }

    fn serrated_leaves(&self, contours: &[Contour]) -> f32 {
        let p = &self.params;
        let serrated = contours
            .iter()
            .filter(|contour| {
                let area = contour.area();
                area > p.leaf_area[0]
                    && area < p.leaf_area[1]
                    && contour.approx_vertex_count(p.approx_epsilon_ratio) > p.leaf_min_vertices
            })
            .count();

        if serrated >= p.leaf_many {
            p.leaf_many_score
        } else if serrated >= 1 {
            p.leaf_some_score
        } else {
            0.0
        }
    }

    fn silhouettes(&self, contours: &[Contour]) -> f32 {
        let p = &self.params;
        let mut score = 0.0f32;
        for contour in contours {
            let area = contour.area();
            if area <= p.object_min_area {
                continue;
            }
            let aspect = contour.bounding_box().aspect_ratio();
            if aspect > p.bottle_aspect[0] && aspect < p.bottle_aspect[1] && area > p.bottle_min_area
            {
                score += p.bottle_increment;
            } else if area > p.plant_min_area
                && contour.approx_vertex_count(p.approx_epsilon_ratio) > p.plant_min_vertices
            {
                score += p.plant_increment;
            }
        }
        score.min(1.0)
    }
}

impl Detector for ShapeDetector {
    fn name(&self) -> &'static str {
        "shape"
    }

    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError> {
        let frame = image.frame;
        let edges = canny(
            frame.gray(),
            frame.width(),
            frame.height(),
            self.params.canny_low,
            self.params.canny_high,
        );
        let contours = Contour::external(&edges, self.params.max_trace_steps);
        Ok(self.score_contours(&contours))
    }
}
