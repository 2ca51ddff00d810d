pub mod deletion;
pub mod graph;
pub mod intake;
pub mod protest;
pub mod saga;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Run a synchronous store-bound call on the blocking pool so SQLite I/O never
/// stalls a runtime worker. A panicked or cancelled task becomes a 500.
pub(crate) async fn run_blocking<F, T>(job: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|err| {
        tracing::error!(error = %err, "workflow task did not complete");
        let payload = json!({ "error": "workflow task did not complete" });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
    })
}
