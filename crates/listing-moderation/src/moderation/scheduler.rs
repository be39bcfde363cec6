use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::domain::{Listing, ListingId, ListingStatus};
use super::repository::{ListingRepository, RepositoryError};

/// Stamps due times on pending listings and answers which ones are ready.
pub struct ReviewScheduler<R> {
    repository: Arc<R>,
    delay: Duration,
}

impl<R> ReviewScheduler<R>
where
    R: ListingRepository,
{
    pub fn new(repository: Arc<R>, delay: Duration) -> Self {
        Self { repository, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sets `review_due_at = now + delay` on a pending listing. A listing that
    /// already carries a due time keeps it, so repeated calls never push the
    /// review back or queue a second one.
    pub fn schedule(
        &self,
        listing_id: &ListingId,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        let listing = self
            .repository
            .fetch(listing_id)?
            .ok_or_else(|| SchedulerError::UnknownListing(listing_id.clone()))?;

        if listing.status != ListingStatus::Pending {
            return Err(SchedulerError::NotPending {
                listing_id: listing_id.clone(),
                status: listing.status,
            });
        }

        if let Some(existing) = listing.review_due_at {
            debug!(listing_id = %listing_id, due_at = %existing, "review already scheduled");
            return Ok(existing);
        }

        let due = now + self.delay;
        self.repository.set_review_due(listing_id, due)?;
        debug!(listing_id = %listing_id, due_at = %due, "review scheduled");
        Ok(due)
    }

    /// Pending listings whose due time has passed, oldest first.
    pub fn due_listings(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Listing>, SchedulerError> {
        Ok(self.repository.due(now, limit)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("listing {0} does not exist")]
    UnknownListing(ListingId),
    #[error("listing {listing_id} is {} and cannot be scheduled", .status.label())]
    NotPending {
        listing_id: ListingId,
        status: ListingStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
