use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use image::{Rgb, RgbImage};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::moderation::detectors::{AssetImage, Detector, DetectorError, DetectorSuite};
use crate::moderation::domain::{
    AssetId, AssetSubmission, Listing, ListingId, ListingStatus, ListingSubmission, MediaAsset,
    SellerId,
};
use crate::moderation::fusion::{FusionConfig, FusionEngine};
use crate::moderation::memory::{
    InMemoryListingRepository, InMemoryMediaStore, RecordingNotificationSink,
};
use crate::moderation::orchestrator::ModerationOrchestrator;
use crate::moderation::policy::PolicyTable;
use crate::moderation::repository::{ListingRepository, RepositoryError};
use crate::moderation::rules::CategoryRuleEngine;
use crate::moderation::service::{ListingModerationService, ServiceOptions};
use crate::moderation::settings::ModerationSettings;

pub(super) type MemoryService =
    ListingModerationService<InMemoryListingRepository, InMemoryMediaStore, RecordingNotificationSink>;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn options() -> ServiceOptions {
    ServiceOptions {
        review_delay: Duration::seconds(30),
        sweep_batch: 10,
    }
}

pub(super) fn seller() -> SellerId {
    SellerId("seller-17".to_string())
}

pub(super) fn clean_image() -> RgbImage {
    RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]))
}

pub(super) fn phone_submission(references: &[&str]) -> ListingSubmission {
    ListingSubmission {
        title: "iPhone 13 128GB".to_string(),
        description: "Vendo iPhone 13 en excelente estado, con cargador y caja original. Bateria al 90%."
            .to_string(),
        price: Decimal::from(450_000),
        category: Some("Tecnología".to_string()),
        seller: seller(),
        assets: references
            .iter()
            .map(|reference| AssetSubmission {
                reference: reference.to_string(),
                is_primary: false,
            })
            .collect(),
    }
}

pub(super) fn phone_listing() -> Listing {
    let submission = phone_submission(&[]);
    Listing {
        id: ListingId("lst-test".to_string()),
        title: submission.title,
        description: submission.description,
        price: submission.price,
        category: submission.category,
        seller: submission.seller,
        status: ListingStatus::UnderReview,
        review_due_at: Some(now()),
        manually_suspended: false,
        created_at: now(),
    }
}

pub(super) fn asset(listing: &Listing, index: usize, reference: &str) -> MediaAsset {
    MediaAsset {
        id: AssetId(format!("ast-test-{index}")),
        listing_id: listing.id.clone(),
        reference: reference.to_string(),
        is_primary: index == 0,
    }
}

/// Detector returning a fixed score for file names containing `marker`, counting calls.
#[derive(Clone)]
pub(super) struct ProbeDetector {
    pub(super) marker: &'static str,
    pub(super) hit_score: f32,
    pub(super) calls: Arc<AtomicUsize>,
}

impl ProbeDetector {
    pub(super) fn new(marker: &'static str, hit_score: f32) -> Self {
        Self {
            marker,
            hit_score,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ProbeDetector {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.filename.contains(self.marker) {
            Ok(self.hit_score)
        } else {
            Ok(0.0)
        }
    }
}

/// Settings whose fusion is driven entirely by the `probe` detector.
pub(super) fn probe_settings() -> ModerationSettings {
    let mut weights = BTreeMap::new();
    weights.insert("probe".to_string(), 1.0);
    ModerationSettings {
        fusion: FusionConfig {
            weights,
            high_risk: BTreeMap::new(),
            min_corroborating: 1,
            ..FusionConfig::default()
        },
        ..ModerationSettings::default()
    }
}

pub(super) struct Harness {
    pub(super) service: MemoryService,
    pub(super) repository: Arc<InMemoryListingRepository>,
    pub(super) store: Arc<InMemoryMediaStore>,
    pub(super) notifier: Arc<RecordingNotificationSink>,
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(InMemoryListingRepository::default());
    let store = Arc::new(InMemoryMediaStore::default());
    let notifier = Arc::new(RecordingNotificationSink::default());
    let service = ListingModerationService::new(
        repository.clone(),
        store.clone(),
        notifier.clone(),
        &ModerationSettings::default(),
        options(),
    )
    .expect("default settings are valid");
    Harness {
        service,
        repository,
        store,
        notifier,
    }
}

pub(super) fn probe_harness(probe: ProbeDetector) -> Harness {
    let repository = Arc::new(InMemoryListingRepository::default());
    let store = Arc::new(InMemoryMediaStore::default());
    let notifier = Arc::new(RecordingNotificationSink::default());
    let service = ListingModerationService::with_suite(
        repository.clone(),
        store.clone(),
        notifier.clone(),
        &probe_settings(),
        options(),
        DetectorSuite::empty().with(probe),
    )
    .expect("probe settings are valid");
    Harness {
        service,
        repository,
        store,
        notifier,
    }
}

pub(super) fn probe_orchestrator(
    store: Arc<InMemoryMediaStore>,
    probe: ProbeDetector,
) -> ModerationOrchestrator<InMemoryMediaStore> {
    let settings = probe_settings();
    let table = PolicyTable::from_definition(&settings.policies).expect("standard table compiles");
    ModerationOrchestrator::new(
        store,
        Arc::new(settings.detectors.filename_terms.clone()),
        CategoryRuleEngine::new(Arc::new(table)),
        Arc::new(DetectorSuite::empty().with(probe)),
        FusionEngine::new(settings.fusion).expect("probe fusion is valid"),
        settings.max_analysis_side,
    )
}

/// Repository whose every call fails, for exercising error propagation.
pub(super) struct UnavailableRepository;

impl ListingRepository for UnavailableRepository {
    fn insert(
        &self,
        _listing: Listing,
        _assets: Vec<MediaAsset>,
    ) -> Result<Listing, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn assets(&self, _id: &ListingId) -> Result<Vec<MediaAsset>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn set_review_due(&self, _id: &ListingId, _due: DateTime<Utc>) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn transition(
        &self,
        _id: &ListingId,
        _expected: ListingStatus,
        _next: ListingStatus,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn set_manual_suspension(
        &self,
        _id: &ListingId,
        _suspended: bool,
        _status: ListingStatus,
    ) -> Result<Listing, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn due(&self, _now: DateTime<Utc>, _limit: usize) -> Result<Vec<Listing>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_asset(&self, _id: &AssetId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &ListingId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn reference_shared(
        &self,
        _reference: &str,
        _excluding: &ListingId,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// In-memory repository with switchable faults: a number of failing asset reads,
/// and a competing writer that takes listings out of review right before publish.
#[derive(Default)]
pub(super) struct FlakyRepository {
    pub(super) inner: InMemoryListingRepository,
    asset_failures: AtomicUsize,
    steal_publish: AtomicBool,
}

impl FlakyRepository {
    pub(super) fn fail_asset_reads(&self, times: usize) {
        self.asset_failures.store(times, Ordering::SeqCst);
    }

    pub(super) fn steal_publish(&self, enabled: bool) {
        self.steal_publish.store(enabled, Ordering::SeqCst);
    }
}

impl ListingRepository for FlakyRepository {
    fn insert(&self, listing: Listing, assets: Vec<MediaAsset>) -> Result<Listing, RepositoryError> {
        self.inner.insert(listing, assets)
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn assets(&self, id: &ListingId) -> Result<Vec<MediaAsset>, RepositoryError> {
        let failing = self
            .asset_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RepositoryError::Unavailable("connection reset".to_string()));
        }
        self.inner.assets(id)
    }

    fn set_review_due(&self, id: &ListingId, due: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.inner.set_review_due(id, due)
    }

    fn transition(
        &self,
        id: &ListingId,
        expected: ListingStatus,
        next: ListingStatus,
    ) -> Result<bool, RepositoryError> {
        if self.steal_publish.load(Ordering::SeqCst)
            && expected == ListingStatus::UnderReview
            && next == ListingStatus::Available
        {
            self.inner
                .transition(id, ListingStatus::UnderReview, ListingStatus::Unavailable)?;
        }
        self.inner.transition(id, expected, next)
    }

    fn set_manual_suspension(
        &self,
        id: &ListingId,
        suspended: bool,
        status: ListingStatus,
    ) -> Result<Listing, RepositoryError> {
        self.inner.set_manual_suspension(id, suspended, status)
    }

    fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Listing>, RepositoryError> {
        self.inner.due(now, limit)
    }

    fn delete_asset(&self, id: &AssetId) -> Result<(), RepositoryError> {
        self.inner.delete_asset(id)
    }

    fn delete(&self, id: &ListingId) -> Result<(), RepositoryError> {
        self.inner.delete(id)
    }

    fn reference_shared(
        &self,
        reference: &str,
        excluding: &ListingId,
    ) -> Result<bool, RepositoryError> {
        self.inner.reference_shared(reference, excluding)
    }
}

pub(super) fn flaky_service(
    repository: Arc<FlakyRepository>,
    store: Arc<InMemoryMediaStore>,
) -> ListingModerationService<FlakyRepository, InMemoryMediaStore, RecordingNotificationSink> {
    ListingModerationService::new(
        repository,
        store,
        Arc::new(RecordingNotificationSink::default()),
        &ModerationSettings::default(),
        options(),
    )
    .expect("default settings are valid")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
