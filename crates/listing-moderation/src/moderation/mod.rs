//! Delayed moderation of marketplace listings.
//!
//! A listing is persisted as `pending`, stamped with a review due time, and later
//! claimed by exactly one reviewer. The orchestrator screens imagery presence,
//! image filenames, category rules and per-image detector scores; the outcome
//! handler then publishes the listing or removes it and notifies the seller.

pub mod detectors;
pub mod domain;
pub mod fusion;
pub mod memory;
pub mod orchestrator;
pub mod outcome;
pub mod policy;
pub mod repository;
pub mod router;
pub mod rules;
pub mod scheduler;
pub mod service;
pub mod settings;

#[cfg(test)]
mod tests;

pub use detectors::{
    AssetImage, Detector, DetectorError, DetectorParams, DetectorSuite, FilenameLexicon,
    TermFamily,
};
pub use domain::{
    AssetId, AssetSubmission, Listing, ListingId, ListingStatus, ListingStatusView,
    ListingSubmission, MediaAsset, SellerId,
};
pub use fusion::{FusionConfig, FusionConfigError, FusionEngine, FusionOutcome};
pub use memory::{InMemoryListingRepository, InMemoryMediaStore, RecordingNotificationSink};
pub use orchestrator::{ModerationOrchestrator, ModerationVerdict, ReviewStage, NO_ANALYZABLE_IMAGERY};
pub use outcome::{OutcomeHandler, OutcomeReport};
pub use policy::{CategoryPolicy, PolicyError, PolicyTable, PolicyTableDefinition};
pub use repository::{
    ListingRejectedNotice, ListingRepository, MediaStore, NotificationError, NotificationSink,
    RepositoryError, StorageError,
};
pub use router::moderation_router;
pub use rules::{CategoryRuleEngine, RuleOutcome};
pub use scheduler::{ReviewScheduler, SchedulerError};
pub use service::{
    ListingModerationService, ListingServiceError, ServiceOptions, SubmissionError, SweepReport,
};
pub use settings::{ModerationSettings, SettingsError};
