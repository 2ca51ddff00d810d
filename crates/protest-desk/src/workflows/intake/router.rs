use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;

use super::domain::{IntakeError, IntakePayload, IntakeRejection};
use super::service::IntakeWorkflow;
use crate::gateways::{IdentityProvider, JobDispatcher};
use crate::store::DataStore;
use crate::workflows::run_blocking;

/// Router exposing the public intake form endpoint.
pub fn intake_router<S, I, J>(workflow: Arc<IntakeWorkflow<S, I, J>>) -> Router
where
    S: DataStore + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
    J: JobDispatcher + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/intake", post(submit_handler::<S, I, J>))
        .with_state(workflow)
}

pub(crate) async fn submit_handler<S, I, J>(
    State(workflow): State<Arc<IntakeWorkflow<S, I, J>>>,
    axum::Json(payload): axum::Json<IntakePayload>,
) -> Response
where
    S: DataStore + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
    J: JobDispatcher + ?Sized + 'static,
{
    let outcome = match run_blocking(move || workflow.submit(payload)).await {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };
    match outcome {
        Ok(receipt) => (StatusCode::CREATED, axum::Json(receipt)).into_response(),
        Err(IntakeError::Rejected(rejection)) => {
            let status = match rejection {
                IntakeRejection::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::CONFLICT,
            };
            let payload = json!({
                "error": rejection.to_string(),
                "code": rejection.code(),
            });
            (status, axum::Json(payload)).into_response()
        }
        Err(IntakeError::Step {
            step,
            source,
            compensation,
        }) => {
            let payload = json!({
                "error": source.to_string(),
                "step": step,
                "compensation": compensation,
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
