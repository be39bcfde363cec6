use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{ListingId, ListingStatusView, ListingSubmission, SellerId};
use super::repository::{ListingRepository, MediaStore, NotificationSink, RepositoryError};
use super::scheduler::SchedulerError;
use super::service::{ListingModerationService, ListingServiceError};

/// Router builder exposing listing intake, status, suspension and sweep endpoints.
pub fn moderation_router<R, S, N>(service: Arc<ListingModerationService<R, S, N>>) -> Router
where
    R: ListingRepository + 'static,
    S: MediaStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/api/v1/listings", post(submit_handler::<R, S, N>))
        .route(
            "/api/v1/listings/:listing_id",
            get(status_handler::<R, S, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/suspension",
            put(suspension_handler::<R, S, N>),
        )
        .route("/api/v1/moderation/sweep", post(sweep_handler::<R, S, N>))
        .with_state(service)
}

/// Body of the suspension toggle. `seller` is taken at face value; deployments
/// must put this route behind authentication that pins it to the caller.
#[derive(Debug, Deserialize)]
pub(crate) struct SuspensionRequest {
    seller: SellerId,
    suspended: bool,
}

pub(crate) async fn submit_handler<R, S, N>(
    State(service): State<Arc<ListingModerationService<R, S, N>>>,
    axum::Json(submission): axum::Json<ListingSubmission>,
) -> Response
where
    R: ListingRepository + 'static,
    S: MediaStore + 'static,
    N: NotificationSink + 'static,
{
    match service.submit(submission, Utc::now()) {
        Ok(listing) => {
            let view = ListingStatusView::from(&listing);
            (StatusCode::ACCEPTED, axum::Json(view)).into_response()
        }
        Err(other) => error_response(other),
    }
}

pub(crate) async fn status_handler<R, S, N>(
    State(service): State<Arc<ListingModerationService<R, S, N>>>,
    Path(listing_id): Path<String>,
) -> Response
where
    R: ListingRepository + 'static,
    S: MediaStore + 'static,
    N: NotificationSink + 'static,
{
    let id = ListingId(listing_id);
    match service.get(&id) {
        Ok(listing) => {
            let view = ListingStatusView::from(&listing);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(ListingServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "listing_id": id.0,
                "error": "listing not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => error_response(other),
    }
}

pub(crate) async fn suspension_handler<R, S, N>(
    State(service): State<Arc<ListingModerationService<R, S, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<SuspensionRequest>,
) -> Response
where
    R: ListingRepository + 'static,
    S: MediaStore + 'static,
    N: NotificationSink + 'static,
{
    let id = ListingId(listing_id);
    match service.set_manual_suspension(&id, &request.seller, request.suspended) {
        Ok(listing) => {
            let view = ListingStatusView::from(&listing);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(other) => error_response(other),
    }
}

pub(crate) async fn sweep_handler<R, S, N>(
    State(service): State<Arc<ListingModerationService<R, S, N>>>,
) -> Response
where
    R: ListingRepository + 'static,
    S: MediaStore + 'static,
    N: NotificationSink + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || service.sweep(Utc::now())).await;
    match outcome {
        Ok(Ok(report)) => (StatusCode::OK, axum::Json(report)).into_response(),
        Ok(Err(other)) => error_response(other),
        Err(join_error) => {
            error!(error = %join_error, "sweep task aborted");
            let payload = json!({
                "error": "sweep task aborted",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn error_response(error: ListingServiceError) -> Response {
    let status = match &error {
        ListingServiceError::Submission(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ListingServiceError::Repository(RepositoryError::NotFound)
        | ListingServiceError::Scheduler(SchedulerError::UnknownListing(_)) => {
            StatusCode::NOT_FOUND
        }
        ListingServiceError::Repository(RepositoryError::Conflict)
        | ListingServiceError::NotPublished(_) => StatusCode::CONFLICT,
        ListingServiceError::NotOwner => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
