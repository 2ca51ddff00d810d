use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::DeletionError;
use super::service::CustomerDeletion;
use crate::gateways::IdentityProvider;
use crate::store::DataStore;
use crate::workflows::run_blocking;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeleteParams {
    #[serde(default)]
    pub(crate) display_name: Option<String>,
}

/// Administrator endpoints for removing a customer.
pub fn deletion_router<S, I>(service: Arc<CustomerDeletion<S, I>>) -> Router
where
    S: DataStore + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    Router::new()
        .route(
            "/api/v1/customers/:user_id",
            delete(delete_handler::<S, I>),
        )
        .route(
            "/api/v1/customers/:user_id/footprint",
            get(footprint_handler::<S, I>),
        )
        .with_state(service)
}

pub(crate) async fn delete_handler<S, I>(
    State(service): State<Arc<CustomerDeletion<S, I>>>,
    Path(user_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response
where
    S: DataStore + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    let outcome = run_blocking(move || {
        service.delete_customer(&user_id, params.display_name.as_deref())
    })
    .await;
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };
    match outcome {
        Ok(report) => {
            let summary = report.summary();
            let payload = json!({
                "summary": summary,
                "report": report,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn footprint_handler<S, I>(
    State(service): State<Arc<CustomerDeletion<S, I>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: DataStore + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    let outcome = match run_blocking(move || service.discover(&user_id)).await {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };
    match outcome {
        Ok(footprint) => (StatusCode::OK, axum::Json(footprint)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: DeletionError) -> Response {
    let payload = match &err {
        DeletionError::Step {
            table,
            completed,
            compensation,
            ..
        } => json!({
            "error": err.to_string(),
            "table": table,
            "completed": completed,
            "compensation": compensation,
        }),
        DeletionError::Discovery { stage, .. } => json!({
            "error": err.to_string(),
            "stage": stage,
        }),
        DeletionError::Schema(_) => json!({
            "error": err.to_string(),
        }),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
