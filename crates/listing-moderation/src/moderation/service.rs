use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::detectors::DetectorSuite;
use super::domain::{
    AssetId, Listing, ListingId, ListingStatus, ListingSubmission, MediaAsset, SellerId,
};
use super::fusion::{FusionConfigError, FusionEngine};
use super::orchestrator::{ModerationOrchestrator, ModerationVerdict};
use super::outcome::{OutcomeHandler, OutcomeReport};
use super::policy::{PolicyError, PolicyTable};
use super::repository::{ListingRepository, MediaStore, NotificationSink, RepositoryError};
use super::rules::CategoryRuleEngine;
use super::scheduler::{ReviewScheduler, SchedulerError};
use super::settings::ModerationSettings;

static LISTING_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ASSET_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_listing_id() -> ListingId {
    let id = LISTING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ListingId(format!("lst-{id:06}"))
}

fn next_asset_id() -> AssetId {
    let id = ASSET_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AssetId(format!("ast-{id:06}"))
}

/// Runtime knobs that are not part of the detector tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    pub review_delay: Duration,
    pub sweep_batch: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            review_delay: Duration::seconds(30),
            sweep_batch: 50,
        }
    }
}

/// Counters for one sweep over due listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub approved: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Facade tying intake, scheduling, review and outcomes together.
pub struct ListingModerationService<R, S, N> {
    repository: Arc<R>,
    scheduler: ReviewScheduler<R>,
    orchestrator: ModerationOrchestrator<S>,
    outcomes: OutcomeHandler<R, S, N>,
    sweep_batch: usize,
}

impl<R, S, N> ListingModerationService<R, S, N>
where
    R: ListingRepository + 'static,
    S: MediaStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        repository: Arc<R>,
        store: Arc<S>,
        notifier: Arc<N>,
        settings: &ModerationSettings,
        options: ServiceOptions,
    ) -> Result<Self, ListingServiceError> {
        let lexicon = Arc::new(settings.detectors.filename_terms.clone());
        let suite = DetectorSuite::standard(&settings.detectors, lexicon);
        Self::with_suite(repository, store, notifier, settings, options, suite)
    }

    /// Same as [`Self::new`] with a caller-provided detector suite.
    pub fn with_suite(
        repository: Arc<R>,
        store: Arc<S>,
        notifier: Arc<N>,
        settings: &ModerationSettings,
        options: ServiceOptions,
        suite: DetectorSuite,
    ) -> Result<Self, ListingServiceError> {
        let table = Arc::new(PolicyTable::from_definition(&settings.policies)?);
        let fusion = FusionEngine::new(settings.fusion.clone())?;
        let fallback_category = table.catch_all().name.clone();
        let orchestrator = ModerationOrchestrator::new(
            Arc::clone(&store),
            Arc::new(settings.detectors.filename_terms.clone()),
            CategoryRuleEngine::new(table),
            Arc::new(suite),
            fusion,
            settings.max_analysis_side,
        );

        Ok(Self {
            scheduler: ReviewScheduler::new(Arc::clone(&repository), options.review_delay),
            outcomes: OutcomeHandler::new(
                Arc::clone(&repository),
                store,
                notifier,
                fallback_category,
            ),
            repository,
            orchestrator,
            sweep_batch: options.sweep_batch.max(1),
        })
    }

    pub fn orchestrator(&self) -> &ModerationOrchestrator<S> {
        &self.orchestrator
    }

    pub fn scheduler(&self) -> &ReviewScheduler<R> {
        &self.scheduler
    }

    /// Persists a new pending listing with its assets and schedules its review.
    pub fn submit(
        &self,
        submission: ListingSubmission,
        now: DateTime<Utc>,
    ) -> Result<Listing, ListingServiceError> {
        validate_submission(&submission)?;

        let listing_id = next_listing_id();
        let any_primary = submission.assets.iter().any(|asset| asset.is_primary);
        let assets: Vec<MediaAsset> = submission
            .assets
            .iter()
            .enumerate()
            .map(|(index, asset)| MediaAsset {
                id: next_asset_id(),
                listing_id: listing_id.clone(),
                reference: asset.reference.trim().to_string(),
                is_primary: asset.is_primary || (!any_primary && index == 0),
            })
            .collect();

        let listing = Listing {
            id: listing_id.clone(),
            title: submission.title.trim().to_string(),
            description: submission.description,
            price: submission.price,
            category: submission
                .category
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            seller: submission.seller,
            status: ListingStatus::Pending,
            review_due_at: None,
            manually_suspended: false,
            created_at: now,
        };

        self.repository.insert(listing, assets)?;
        self.scheduler.schedule(&listing_id, now)?;

        let stored = self
            .repository
            .fetch(&listing_id)?
            .ok_or(RepositoryError::NotFound)?;
        info!(listing_id = %stored.id, due_at = ?stored.review_due_at, "listing accepted for review");
        Ok(stored)
    }

    /// Claims a pending listing and runs it through the pipeline. Returns `None`
    /// when another trigger already claimed it or it no longer exists.
    pub fn review_listing(
        &self,
        listing_id: &ListingId,
    ) -> Result<Option<ModerationVerdict>, ListingServiceError> {
        Ok(self
            .review_claimed(listing_id)?
            .map(|(verdict, _)| verdict))
    }

    fn review_claimed(
        &self,
        listing_id: &ListingId,
    ) -> Result<Option<(ModerationVerdict, OutcomeReport)>, ListingServiceError> {
        let claimed = self.repository.transition(
            listing_id,
            ListingStatus::Pending,
            ListingStatus::UnderReview,
        )?;
        if !claimed {
            debug!(listing_id = %listing_id, "review already claimed or listing gone");
            return Ok(None);
        }

        match self.review_under_claim(listing_id) {
            Ok(reviewed) => Ok(Some(reviewed)),
            Err(err) => {
                self.release_claim(listing_id);
                Err(err)
            }
        }
    }

    fn review_under_claim(
        &self,
        listing_id: &ListingId,
    ) -> Result<(ModerationVerdict, OutcomeReport), ListingServiceError> {
        let listing = self
            .repository
            .fetch(listing_id)?
            .ok_or(RepositoryError::NotFound)?;
        let assets = self.repository.assets(listing_id)?;
        let verdict = self.orchestrator.review(&listing, &assets);
        info!(
            listing_id = %listing_id,
            approved = verdict.approved,
            confidence = verdict.confidence,
            stage = ?verdict.stage,
            reason = %verdict.reason,
            "moderation verdict"
        );

        let report = self.outcomes.apply(&listing, &verdict)?;
        Ok((verdict, report))
    }

    /// Hands a failed review back to the queue so the next sweep retries it.
    fn release_claim(&self, listing_id: &ListingId) {
        match self.repository.transition(
            listing_id,
            ListingStatus::UnderReview,
            ListingStatus::Pending,
        ) {
            Ok(true) => warn!(listing_id = %listing_id, "review failed, listing returned to pending"),
            Ok(false) => warn!(listing_id = %listing_id, "review failed after the listing left review"),
            Err(err) => error!(
                listing_id = %listing_id,
                error = %err,
                "review failed and the claim could not be released"
            ),
        }
    }

    /// Reviews every listing due at `now`, up to the configured batch size.
    /// A publish that lost its claim to another writer counts as skipped.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ListingServiceError> {
        let due = self.scheduler.due_listings(now, self.sweep_batch)?;
        let mut report = SweepReport::default();

        for listing in due {
            report.examined += 1;
            match self.review_claimed(&listing.id) {
                Ok(Some((_, OutcomeReport::Superseded))) => report.skipped += 1,
                Ok(Some((verdict, _))) if verdict.approved => report.approved += 1,
                Ok(Some(_)) => report.rejected += 1,
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(listing_id = %listing.id, error = %err, "listing review failed");
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                approved = report.approved,
                rejected = report.rejected,
                skipped = report.skipped,
                failed = report.failed,
                "moderation sweep finished"
            );
        }
        Ok(report)
    }

    pub fn get(&self, listing_id: &ListingId) -> Result<Listing, ListingServiceError> {
        let listing = self
            .repository
            .fetch(listing_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(listing)
    }

    /// Seller-only toggle between `Available` and `Unavailable`.
    ///
    /// `seller` is trusted as given: callers must pass the id of the
    /// authenticated seller, never a value taken from the request body.
    pub fn set_manual_suspension(
        &self,
        listing_id: &ListingId,
        seller: &SellerId,
        suspended: bool,
    ) -> Result<Listing, ListingServiceError> {
        let listing = self.get(listing_id)?;
        if &listing.seller != seller {
            return Err(ListingServiceError::NotOwner);
        }
        if !matches!(
            listing.status,
            ListingStatus::Available | ListingStatus::Unavailable
        ) {
            return Err(ListingServiceError::NotPublished(listing.status));
        }

        let status = if suspended {
            ListingStatus::Unavailable
        } else {
            ListingStatus::Available
        };
        let updated = self
            .repository
            .set_manual_suspension(listing_id, suspended, status)?;
        info!(listing_id = %listing_id, suspended, "manual suspension updated");
        Ok(updated)
    }
}

fn validate_submission(submission: &ListingSubmission) -> Result<(), SubmissionError> {
    if submission.title.trim().is_empty() {
        return Err(SubmissionError::MissingTitle);
    }
    if submission.seller.0.trim().is_empty() {
        return Err(SubmissionError::MissingSeller);
    }
    if submission.price.is_sign_negative() {
        return Err(SubmissionError::NegativePrice);
    }
    if submission
        .assets
        .iter()
        .any(|asset| asset.reference.trim().is_empty())
    {
        return Err(SubmissionError::EmptyAssetReference);
    }
    let primaries = submission
        .assets
        .iter()
        .filter(|asset| asset.is_primary)
        .count();
    if primaries > 1 {
        return Err(SubmissionError::MultiplePrimaryAssets(primaries));
    }
    Ok(())
}

/// Defects in a listing submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("listing title is required")]
    MissingTitle,
    #[error("seller reference is required")]
    MissingSeller,
    #[error("price must not be negative")]
    NegativePrice,
    #[error("asset references must not be blank")]
    EmptyAssetReference,
    #[error("at most one asset may be primary, got {0}")]
    MultiplePrimaryAssets(usize),
}

/// Error raised by the moderation service.
#[derive(Debug, thiserror::Error)]
pub enum ListingServiceError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Fusion(#[from] FusionConfigError),
    #[error("only the seller may change a listing's availability")]
    NotOwner,
    #[error("listing is {} and cannot be suspended or resumed", .0.label())]
    NotPublished(ListingStatus),
}
