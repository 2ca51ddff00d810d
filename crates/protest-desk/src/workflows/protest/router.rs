use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::service::ProtestReviewService;
use super::status::ProtestStatus;
use crate::error::AppError;
use crate::store::DataStore;
use crate::workflows::run_blocking;

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    pub(crate) status: String,
}

/// Administrator endpoints for moving a protest through its appeal.
pub fn protest_router<S>(service: Arc<ProtestReviewService<S>>) -> Router
where
    S: DataStore + ?Sized + 'static,
{
    Router::new()
        .route(
            "/api/v1/protests/:protest_id/actions",
            get(actions_handler::<S>),
        )
        .route(
            "/api/v1/protests/:protest_id/status",
            post(status_handler::<S>),
        )
        .route(
            "/api/v1/protests/:protest_id/accept",
            post(accept_handler::<S>),
        )
        .route(
            "/api/v1/protests/:protest_id/reject",
            post(reject_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn actions_handler<S>(
    State(service): State<Arc<ProtestReviewService<S>>>,
    Path(protest_id): Path<String>,
) -> Response
where
    S: DataStore + ?Sized + 'static,
{
    let outcome = match run_blocking(move || service.review_actions(&protest_id)).await {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };
    match outcome {
        Ok(actions) => (StatusCode::OK, axum::Json(actions)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn status_handler<S>(
    State(service): State<Arc<ProtestReviewService<S>>>,
    Path(protest_id): Path<String>,
    axum::Json(change): axum::Json<StatusChange>,
) -> Response
where
    S: DataStore + ?Sized + 'static,
{
    let Some(next) = ProtestStatus::parse(&change.status) else {
        let payload = json!({ "error": format!("unknown status '{}'", change.status) });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    };

    let outcome = match run_blocking(move || service.set_status(&protest_id, next)).await {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };
    match outcome {
        Ok(protest) => (StatusCode::OK, axum::Json(protest)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn accept_handler<S>(
    State(service): State<Arc<ProtestReviewService<S>>>,
    Path(protest_id): Path<String>,
) -> Response
where
    S: DataStore + ?Sized + 'static,
{
    let outcome = match run_blocking(move || service.accept_offer(&protest_id)).await {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };
    match outcome {
        Ok(resolution) => (StatusCode::OK, axum::Json(resolution)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn reject_handler<S>(
    State(service): State<Arc<ProtestReviewService<S>>>,
    Path(protest_id): Path<String>,
) -> Response
where
    S: DataStore + ?Sized + 'static,
{
    let outcome = match run_blocking(move || service.reject_offer(&protest_id)).await {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };
    match outcome {
        Ok(protest) => (StatusCode::OK, axum::Json(protest)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}
