use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::detectors::{AssetImage, DetectorSuite, FilenameLexicon, Frame};
use super::domain::{Listing, MediaAsset};
use super::fusion::{FusionEngine, FusionOutcome};
use super::repository::MediaStore;
use super::rules::CategoryRuleEngine;

pub const NO_ANALYZABLE_IMAGERY: &str = "no analyzable imagery";

/// Pipeline stage that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    Imagery,
    Filename,
    CategoryRules,
    ImageAnalysis,
    Passed,
}

/// Transient moderation decision consumed by the outcome handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub approved: bool,
    pub reason: String,
    pub confidence: f32,
    pub scores: BTreeMap<String, f32>,
    pub stage: ReviewStage,
}

impl ModerationVerdict {
    fn rejected(stage: ReviewStage, reason: String) -> Self {
        Self {
            approved: false,
            reason,
            confidence: 1.0,
            scores: BTreeMap::new(),
            stage,
        }
    }
}

enum AssetAnalysis<'a> {
    Skipped,
    Analyzed {
        asset: &'a MediaAsset,
        scores: BTreeMap<String, f32>,
        outcome: FusionOutcome,
    },
}

/// Sequences imagery checks, filename screening, category rules and per-asset image
/// analysis into one verdict. Pure with respect to listing state.
pub struct ModerationOrchestrator<S> {
    store: Arc<S>,
    lexicon: Arc<FilenameLexicon>,
    rules: CategoryRuleEngine,
    suite: Arc<DetectorSuite>,
    fusion: FusionEngine,
    max_analysis_side: u32,
}

impl<S> ModerationOrchestrator<S>
where
    S: MediaStore,
{
    pub fn new(
        store: Arc<S>,
        lexicon: Arc<FilenameLexicon>,
        rules: CategoryRuleEngine,
        suite: Arc<DetectorSuite>,
        fusion: FusionEngine,
        max_analysis_side: u32,
    ) -> Self {
        Self {
            store,
            lexicon,
            rules,
            suite,
            fusion,
            max_analysis_side,
        }
    }

    pub fn rules(&self) -> &CategoryRuleEngine {
        &self.rules
    }

    pub fn fusion(&self) -> &FusionEngine {
        &self.fusion
    }

    pub fn review(&self, listing: &Listing, assets: &[MediaAsset]) -> ModerationVerdict {
        let readable: Vec<&MediaAsset> = assets
            .iter()
            .filter(|asset| self.store.exists(&asset.reference))
            .collect();
        if readable.is_empty() {
            debug!(listing_id = %listing.id, assets = assets.len(), "no readable assets");
            return ModerationVerdict::rejected(
                ReviewStage::Imagery,
                NO_ANALYZABLE_IMAGERY.to_string(),
            );
        }

        for asset in assets {
            if let Some(found) = self.lexicon.first_match(&asset.filename_stem()) {
                return ModerationVerdict::rejected(
                    ReviewStage::Filename,
                    format!(
                        "image file '{}' contains a disallowed term: '{}' ({})",
                        asset.filename(),
                        found.term,
                        found.family.label()
                    ),
                );
            }
        }

        let rule_outcome = self.rules.evaluate(listing);
        if !rule_outcome.approved {
            return ModerationVerdict::rejected(ReviewStage::CategoryRules, rule_outcome.reason);
        }

        let analyses: Vec<AssetAnalysis<'_>> = readable
            .par_iter()
            .map(|asset| self.analyze(listing, *asset))
            .collect();

        let mut combined: BTreeMap<String, f32> = BTreeMap::new();
        let mut analyzed = 0usize;
        let mut peak_confidence = 0.0f32;
        for analysis in &analyses {
            let AssetAnalysis::Analyzed {
                asset,
                scores,
                outcome,
            } = analysis
            else {
                continue;
            };
            if !outcome.approved {
                return ModerationVerdict {
                    approved: false,
                    reason: format!(
                        "image '{}' was judged inappropriate ({})",
                        asset.filename(),
                        outcome.explanation
                    ),
                    confidence: outcome.confidence,
                    scores: scores.clone(),
                    stage: ReviewStage::ImageAnalysis,
                };
            }
            analyzed += 1;
            peak_confidence = peak_confidence.max(outcome.confidence);
            for (name, score) in scores {
                let entry = combined.entry(name.clone()).or_insert(0.0);
                *entry = entry.max(*score);
            }
        }

        if analyzed == 0 {
            return ModerationVerdict::rejected(
                ReviewStage::Imagery,
                NO_ANALYZABLE_IMAGERY.to_string(),
            );
        }

        ModerationVerdict {
            approved: true,
            reason: format!("approved after analysing {analyzed} image(s)"),
            confidence: peak_confidence,
            scores: combined,
            stage: ReviewStage::Passed,
        }
    }

    fn analyze<'a>(&self, listing: &Listing, asset: &'a MediaAsset) -> AssetAnalysis<'a> {
        let image = match self.store.read_asset(&asset.reference) {
            Ok(image) => image,
            Err(error) => {
                warn!(listing_id = %listing.id, reference = %asset.reference, %error, "skipping unreadable asset");
                return AssetAnalysis::Skipped;
            }
        };
        let frame = match Frame::from_rgb(&image, self.max_analysis_side) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(listing_id = %listing.id, reference = %asset.reference, %error, "skipping undecodable asset");
                return AssetAnalysis::Skipped;
            }
        };

        let scores = self.suite.score_all(&AssetImage {
            filename: asset.filename(),
            frame: &frame,
        });
        let outcome = self.fusion.fuse(&scores);
        debug!(
            listing_id = %listing.id,
            reference = %asset.reference,
            confidence = outcome.confidence,
            approved = outcome.approved,
            "asset analysed"
        );

        AssetAnalysis::Analyzed {
            asset,
            scores,
            outcome,
        }
    }
}
