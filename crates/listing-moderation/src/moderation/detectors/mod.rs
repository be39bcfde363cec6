//! Heuristic image analysers. Each detector scores one visual or metadata signal in
//! `[0, 1]`; the suite runs them independently and contains their failures.

mod clustering;
mod color;
mod edges;
mod frame;
mod gabor;
mod geometry;
mod mask;
mod metadata;
mod shape;
mod texture;

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use clustering::{ClusteringDetector, ClusteringParams};
pub use color::{
    CannabisColorDetector, CannabisColorParams, SkinExposureDetector, SkinExposureParams,
    WhitePowderDetector, WhitePowderParams,
};
pub use frame::{Frame, FrameError, HsvRange};
pub use gabor::GaborSpec;
pub use geometry::{BoundingBox, Contour};
pub use mask::Mask;
pub use metadata::{FilenameLexicon, LexiconFamily, LexiconMatch, MetadataDetector, TermFamily};
pub use shape::{ShapeDetector, ShapeParams};
pub use texture::{TextureDetector, TextureParams};

/// One decoded asset handed to the detectors.
#[derive(Debug, Clone, Copy)]
pub struct AssetImage<'a> {
    pub filename: &'a str,
    pub frame: &'a Frame,
}

/// Strategy interface implemented by every heuristic.
pub trait Detector: Send + Sync {
    /// Stable key used for fusion weights and score reports.
    fn name(&self) -> &'static str;
    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("numerical failure: {0}")]
    Numeric(String),
    #[error("detector misconfigured: {0}")]
    Misconfigured(String),
    #[error("analysis failed: {0}")]
    Failed(String),
}

/// Named tuning constants for every built-in detector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub cannabis_color: CannabisColorParams,
    pub skin_exposure: SkinExposureParams,
    pub white_powder: WhitePowderParams,
    pub shape: ShapeParams,
    pub texture: TextureParams,
    pub clustering: ClusteringParams,
    pub filename_terms: FilenameLexicon,
}

/// Registered detectors, evaluated in registration order.
pub struct DetectorSuite {
    detectors: Vec<Box<dyn Detector>>,
}

impl std::fmt::Debug for DetectorSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorSuite")
            .field("detectors", &self.names())
            .finish()
    }
}

impl DetectorSuite {
    pub fn empty() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// The full built-in library.
    pub fn standard(params: &DetectorParams, lexicon: Arc<FilenameLexicon>) -> Self {
        Self::empty()
            .with(CannabisColorDetector::new(params.cannabis_color.clone()))
            .with(SkinExposureDetector::new(params.skin_exposure.clone()))
            .with(WhitePowderDetector::new(params.white_powder.clone()))
            .with(ShapeDetector::new(params.shape.clone()))
            .with(TextureDetector::new(params.texture.clone()))
            .with(ClusteringDetector::new(params.clustering.clone()))
            .with(MetadataDetector::new(lexicon))
    }

    pub fn with(mut self, detector: impl Detector + 'static) -> Self {
        self.register(Box::new(detector));
        self
    }

    /// Adds a detector; a detector with the same name replaces the earlier one.
    pub fn register(&mut self, detector: Box<dyn Detector>) {
        self.detectors
            .retain(|existing| existing.name() != detector.name());
        self.detectors.push(detector);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|detector| detector.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Runs every detector. Errors, panics and non-finite results become a score of
    /// zero with a logged cause so one faulty heuristic never aborts the others.
    pub fn score_all(&self, image: &AssetImage<'_>) -> BTreeMap<String, f32> {
        let mut scores = BTreeMap::new();
        for detector in &self.detectors {
            let name = detector.name();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| detector.score(image)));
            let score = match outcome {
                Ok(Ok(value)) if value.is_finite() => value.clamp(0.0, 1.0),
                Ok(Ok(value)) => {
                    warn!(detector = name, file = image.filename, %value, "detector returned a non-finite score");
                    0.0
                }
                Ok(Err(error)) => {
                    warn!(detector = name, file = image.filename, %error, "detector failed");
                    0.0
                }
                Err(payload) => {
                    warn!(
                        detector = name,
                        file = image.filename,
                        cause = panic_message(payload.as_ref()),
                        "detector panicked"
                    );
                    0.0
                }
            };
            scores.insert(name.to_string(), score);
        }
        scores
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
