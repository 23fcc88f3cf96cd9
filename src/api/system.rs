use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::state::AppContext;

/// Runs the boot-time reconciliation pass on demand, e.g. after an
/// operator restarts the container runtime without restarting this
/// process.
pub async fn reconcile(State(ctx): State<AppContext>) -> impl IntoResponse {
    match ctx.reconciler.reconcile().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => e.into_response(),
    }
}
