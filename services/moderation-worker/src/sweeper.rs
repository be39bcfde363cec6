use chrono::Utc;
use listing_moderation::moderation::repository::{
    ListingRepository, MediaStore, NotificationSink,
};
use listing_moderation::moderation::ListingModerationService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, warn};

/// Periodically reviews listings whose delay has elapsed. Each sweep runs on the
/// blocking pool because image analysis is CPU bound.
pub(crate) fn spawn_sweeper<R, S, N>(
    service: Arc<ListingModerationService<R, S, N>>,
    period: Duration,
) -> JoinHandle<()>
where
    R: ListingRepository + 'static,
    S: MediaStore + 'static,
    N: NotificationSink + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let service = Arc::clone(&service);
            match tokio::task::spawn_blocking(move || service.sweep(Utc::now())).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "moderation sweep failed"),
                Err(join_error) => error!(error = %join_error, "moderation sweep task aborted"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use listing_moderation::moderation::{
        AssetSubmission, InMemoryListingRepository, InMemoryMediaStore, ListingStatus,
        ListingSubmission, ModerationSettings, RecordingNotificationSink, SellerId,
        ServiceOptions,
    };
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn sweeper_publishes_due_listings() {
        let store = Arc::new(InMemoryMediaStore::default());
        store.insert("uploads/front.jpg", RgbImage::from_pixel(64, 64, Rgb([128, 128, 128])));
        let service = Arc::new(
            ListingModerationService::new(
                Arc::new(InMemoryListingRepository::default()),
                store,
                Arc::new(RecordingNotificationSink::default()),
                &ModerationSettings::default(),
                ServiceOptions {
                    review_delay: chrono::Duration::zero(),
                    sweep_batch: 10,
                },
            )
            .expect("default settings are valid"),
        );
        let listing = service
            .submit(
                ListingSubmission {
                    title: "iPhone 13 128GB".to_string(),
                    description: "Vendo iPhone 13 en excelente estado, con cargador y caja original."
                        .to_string(),
                    price: Decimal::from(450_000),
                    category: Some("Tecnología".to_string()),
                    seller: SellerId("seller-17".to_string()),
                    assets: vec![AssetSubmission {
                        reference: "uploads/front.jpg".to_string(),
                        is_primary: true,
                    }],
                },
                Utc::now(),
            )
            .expect("submission accepted");

        let handle = spawn_sweeper(Arc::clone(&service), Duration::from_millis(10));
        let mut status = ListingStatus::Pending;
        for _ in 0..200 {
            status = service.get(&listing.id).expect("listing kept").status;
            if status == ListingStatus::Available {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(status, ListingStatus::Available);
    }
}
