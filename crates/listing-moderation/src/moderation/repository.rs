use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::domain::{AssetId, Listing, ListingId, ListingStatus, MediaAsset, SellerId};

/// Storage abstraction for listings and their asset records.
pub trait ListingRepository: Send + Sync {
    fn insert(
        &self,
        listing: Listing,
        assets: Vec<MediaAsset>,
    ) -> Result<Listing, RepositoryError>;
    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
    fn assets(&self, id: &ListingId) -> Result<Vec<MediaAsset>, RepositoryError>;
    fn set_review_due(&self, id: &ListingId, due: DateTime<Utc>) -> Result<(), RepositoryError>;
    /// Compare-and-set on the status column. Returns `false` when the stored status
    /// no longer matches `expected` (including when the listing is gone).
    fn transition(
        &self,
        id: &ListingId,
        expected: ListingStatus,
        next: ListingStatus,
    ) -> Result<bool, RepositoryError>;
    fn set_manual_suspension(
        &self,
        id: &ListingId,
        suspended: bool,
        status: ListingStatus,
    ) -> Result<Listing, RepositoryError>;
    fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Listing>, RepositoryError>;
    fn delete_asset(&self, id: &AssetId) -> Result<(), RepositoryError>;
    fn delete(&self, id: &ListingId) -> Result<(), RepositoryError>;
    /// Whether an asset of any listing other than `excluding` points at `reference`.
    fn reference_shared(
        &self,
        reference: &str,
        excluding: &ListingId,
    ) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Binary storage collaborator holding the image content behind asset references.
pub trait MediaStore: Send + Sync {
    fn exists(&self, reference: &str) -> bool;
    fn read_asset(&self, reference: &str) -> Result<RgbImage, StorageError>;
    /// Removes the stored content. `Ok(false)` means there was nothing to remove.
    fn delete_asset(&self, reference: &str) -> Result<bool, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("asset '{0}' not found")]
    Missing(String),
    #[error("asset '{reference}' could not be decoded: {detail}")]
    Decode { reference: String, detail: String },
    #[error("storage io failure for '{reference}': {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outbound notification hook; delivery and retries belong to the sink.
pub trait NotificationSink: Send + Sync {
    fn emit(
        &self,
        recipient: &SellerId,
        notice: ListingRejectedNotice,
    ) -> Result<(), NotificationError>;
}

/// Payload sent to a seller whose listing was removed by moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRejectedNotice {
    pub listing_title: String,
    pub category: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
