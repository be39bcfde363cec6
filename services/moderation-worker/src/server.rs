use crate::cli::ServeArgs;
use crate::infra::{AppState, FsMediaStore, LoggingNotificationSink};
use crate::routes::with_operational_routes;
use crate::sweeper::spawn_sweeper;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use listing_moderation::config::AppConfig;
use listing_moderation::error::AppError;
use listing_moderation::moderation::{InMemoryListingRepository, ListingModerationService};
use listing_moderation::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let settings = config.moderation.settings()?;
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryListingRepository::default());
    let store = Arc::new(FsMediaStore::new(config.moderation.media_root.clone()));
    let notifier = Arc::new(LoggingNotificationSink);
    let service = Arc::new(ListingModerationService::new(
        repository,
        store,
        notifier,
        &settings,
        config.moderation.service_options(),
    )?);

    let sweeper = spawn_sweeper(Arc::clone(&service), config.moderation.sweep_interval());

    let app = with_operational_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        review_delay_secs = config.moderation.review_delay_secs,
        sweep_interval_secs = config.moderation.sweep_interval_secs,
        media_root = %config.moderation.media_root.display(),
        "listing moderation worker ready"
    );

    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;
    Ok(())
}
