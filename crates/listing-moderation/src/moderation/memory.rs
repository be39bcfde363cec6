//! In-process adapters for the collaborator traits, shared by the worker binary and tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use image::RgbImage;

use super::domain::{AssetId, Listing, ListingId, ListingStatus, MediaAsset, SellerId};
use super::repository::{
    ListingRejectedNotice, ListingRepository, MediaStore, NotificationError, NotificationSink,
    RepositoryError, StorageError,
};

#[derive(Debug, Default)]
struct RepositoryState {
    listings: HashMap<ListingId, Listing>,
    assets: BTreeMap<AssetId, MediaAsset>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryListingRepository {
    state: Arc<Mutex<RepositoryState>>,
}

impl InMemoryListingRepository {
    fn lock(&self) -> Result<MutexGuard<'_, RepositoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("listing store lock poisoned".to_string()))
    }

    pub fn listing_count(&self) -> usize {
        self.lock().map(|state| state.listings.len()).unwrap_or(0)
    }

    pub fn asset_count(&self) -> usize {
        self.lock().map(|state| state.assets.len()).unwrap_or(0)
    }
}

impl ListingRepository for InMemoryListingRepository {
    fn insert(
        &self,
        listing: Listing,
        assets: Vec<MediaAsset>,
    ) -> Result<Listing, RepositoryError> {
        let mut state = self.lock()?;
        if state.listings.contains_key(&listing.id) {
            return Err(RepositoryError::Conflict);
        }
        for asset in assets {
            state.assets.insert(asset.id.clone(), asset);
        }
        state.listings.insert(listing.id.clone(), listing.clone());
        Ok(listing)
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        Ok(self.lock()?.listings.get(id).cloned())
    }

    fn assets(&self, id: &ListingId) -> Result<Vec<MediaAsset>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .assets
            .values()
            .filter(|asset| &asset.listing_id == id)
            .cloned()
            .collect())
    }

    fn set_review_due(&self, id: &ListingId, due: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let listing = state.listings.get_mut(id).ok_or(RepositoryError::NotFound)?;
        listing.review_due_at = Some(due);
        Ok(())
    }

    fn transition(
        &self,
        id: &ListingId,
        expected: ListingStatus,
        next: ListingStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        match state.listings.get_mut(id) {
            Some(listing) if listing.status == expected => {
                listing.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_manual_suspension(
        &self,
        id: &ListingId,
        suspended: bool,
        status: ListingStatus,
    ) -> Result<Listing, RepositoryError> {
        let mut state = self.lock()?;
        let listing = state.listings.get_mut(id).ok_or(RepositoryError::NotFound)?;
        listing.manually_suspended = suspended;
        listing.status = status;
        Ok(listing.clone())
    }

    fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Listing>, RepositoryError> {
        let state = self.lock()?;
        let mut due: Vec<Listing> = state
            .listings
            .values()
            .filter(|listing| {
                listing.status == ListingStatus::Pending
                    && listing.review_due_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| a.review_due_at.cmp(&b.review_due_at).then(a.id.cmp(&b.id)));
        due.truncate(limit);
        Ok(due)
    }

    fn delete_asset(&self, id: &AssetId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state
            .assets
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn delete(&self, id: &ListingId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.listings.remove(id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        state.assets.retain(|_, asset| &asset.listing_id != id);
        Ok(())
    }

    fn reference_shared(
        &self,
        reference: &str,
        excluding: &ListingId,
    ) -> Result<bool, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .assets
            .values()
            .any(|asset| asset.reference == reference && &asset.listing_id != excluding))
    }
}

/// Image store keyed by reference, with switches for simulating storage faults.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMediaStore {
    images: Arc<Mutex<HashMap<String, RgbImage>>>,
    corrupt: Arc<Mutex<HashSet<String>>>,
    fail_deletes: Arc<AtomicBool>,
}

impl InMemoryMediaStore {
    pub fn insert(&self, reference: impl Into<String>, image: RgbImage) {
        if let Ok(mut images) = self.images.lock() {
            images.insert(reference.into(), image);
        }
    }

    /// Registers a reference that exists but cannot be decoded.
    pub fn insert_corrupt(&self, reference: impl Into<String>) {
        if let Ok(mut corrupt) = self.corrupt.lock() {
            corrupt.insert(reference.into());
        }
    }

    pub fn fail_deletions(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Release);
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.images
            .lock()
            .map(|images| images.contains_key(reference))
            .unwrap_or(false)
    }
}

impl MediaStore for InMemoryMediaStore {
    fn exists(&self, reference: &str) -> bool {
        let corrupt = self
            .corrupt
            .lock()
            .map(|corrupt| corrupt.contains(reference))
            .unwrap_or(false);
        corrupt || self.contains(reference)
    }

    fn read_asset(&self, reference: &str) -> Result<RgbImage, StorageError> {
        let is_corrupt = self
            .corrupt
            .lock()
            .map(|corrupt| corrupt.contains(reference))
            .unwrap_or(false);
        if is_corrupt {
            return Err(StorageError::Decode {
                reference: reference.to_string(),
                detail: "truncated image data".to_string(),
            });
        }

        self.images
            .lock()
            .ok()
            .and_then(|images| images.get(reference).cloned())
            .ok_or_else(|| StorageError::Missing(reference.to_string()))
    }

    fn delete_asset(&self, reference: &str) -> Result<bool, StorageError> {
        if self.fail_deletes.load(Ordering::Acquire) {
            return Err(StorageError::Io {
                reference: reference.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }

        let removed_image = self
            .images
            .lock()
            .map(|mut images| images.remove(reference).is_some())
            .unwrap_or(false);
        let removed_corrupt = self
            .corrupt
            .lock()
            .map(|mut corrupt| corrupt.remove(reference))
            .unwrap_or(false);
        Ok(removed_image || removed_corrupt)
    }
}

/// Sink that records every emitted notice for later assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotificationSink {
    events: Arc<Mutex<Vec<(SellerId, ListingRejectedNotice)>>>,
}

impl RecordingNotificationSink {
    pub fn events(&self) -> Vec<(SellerId, ListingRejectedNotice)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn emit(
        &self,
        recipient: &SellerId,
        notice: ListingRejectedNotice,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            recipient = %recipient,
            title = %notice.listing_title,
            reason = %notice.reason,
            "listing rejection notice emitted"
        );
        let mut events = self
            .events
            .lock()
            .map_err(|_| NotificationError::Transport("notice log lock poisoned".to_string()))?;
        events.push((recipient.clone(), notice));
        Ok(())
    }
}
