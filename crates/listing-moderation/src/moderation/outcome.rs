use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{Listing, ListingStatus};
use super::orchestrator::ModerationVerdict;
use super::repository::{
    ListingRejectedNotice, ListingRepository, MediaStore, NotificationSink, RepositoryError,
};

/// Side effects applied for one verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeReport {
    Published,
    /// The claim was no longer held when publishing; nothing changed.
    Superseded,
    Removed {
        assets_removed: usize,
        storage_failures: usize,
        /// Content kept because another listing still references it.
        shared_retained: usize,
        notified: bool,
    },
}

/// Applies terminal transitions: publish on approval, ordered destructive cleanup
/// plus seller notification on rejection.
pub struct OutcomeHandler<R, S, N> {
    repository: Arc<R>,
    store: Arc<S>,
    notifier: Arc<N>,
    fallback_category: String,
}

impl<R, S, N> OutcomeHandler<R, S, N>
where
    R: ListingRepository,
    S: MediaStore,
    N: NotificationSink,
{
    pub fn new(
        repository: Arc<R>,
        store: Arc<S>,
        notifier: Arc<N>,
        fallback_category: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            store,
            notifier,
            fallback_category: fallback_category.into(),
        }
    }

    pub fn apply(
        &self,
        listing: &Listing,
        verdict: &ModerationVerdict,
    ) -> Result<OutcomeReport, RepositoryError> {
        if verdict.approved {
            self.publish(listing)
        } else {
            self.remove(listing, verdict)
        }
    }

    fn publish(&self, listing: &Listing) -> Result<OutcomeReport, RepositoryError> {
        let published = self.repository.transition(
            &listing.id,
            ListingStatus::UnderReview,
            ListingStatus::Available,
        )?;
        if published {
            info!(listing_id = %listing.id, "listing published");
            Ok(OutcomeReport::Published)
        } else {
            warn!(listing_id = %listing.id, "listing left review state before it could be published");
            Ok(OutcomeReport::Superseded)
        }
    }

    fn remove(
        &self,
        listing: &Listing,
        verdict: &ModerationVerdict,
    ) -> Result<OutcomeReport, RepositoryError> {
        let recipient = listing.seller.clone();
        let notice = ListingRejectedNotice {
            listing_title: listing.title.clone(),
            category: listing
                .category
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| self.fallback_category.clone()),
            reason: verdict.reason.clone(),
        };

        let assets = self.repository.assets(&listing.id)?;
        let mut assets_removed = 0;
        let mut storage_failures = 0;
        let mut shared_retained = 0;
        for asset in &assets {
            if self.repository.reference_shared(&asset.reference, &listing.id)? {
                shared_retained += 1;
                debug!(listing_id = %listing.id, reference = %asset.reference, "asset content shared with another listing, kept");
            } else {
                match self.store.delete_asset(&asset.reference) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(reference = %asset.reference, "asset content already absent");
                    }
                    Err(error) => {
                        storage_failures += 1;
                        warn!(listing_id = %listing.id, reference = %asset.reference, %error, "failed to delete asset content");
                    }
                }
            }
            match self.repository.delete_asset(&asset.id) {
                Ok(()) => assets_removed += 1,
                Err(RepositoryError::NotFound) => {}
                Err(other) => return Err(other),
            }
        }

        match self.repository.delete(&listing.id) {
            Ok(()) | Err(RepositoryError::NotFound) => {}
            Err(other) => return Err(other),
        }

        let notified = match self.notifier.emit(&recipient, notice) {
            Ok(()) => true,
            Err(error) => {
                warn!(listing_id = %listing.id, recipient = %recipient, %error, "failed to emit rejection notice");
                false
            }
        };

        info!(
            listing_id = %listing.id,
            reason = %verdict.reason,
            assets_removed,
            storage_failures,
            shared_retained,
            "listing removed"
        );

        Ok(OutcomeReport::Removed {
            assets_removed,
            storage_failures,
            shared_retained,
            notified,
        })
    }
}
