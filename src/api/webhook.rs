use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::AppContext;

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    skipped: bool,
    message: String,
}

fn skipped(message: impl Into<String>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(WebhookResponse {
            skipped: true,
            message: message.into(),
        }),
    )
}

/// The only entry point that triggers a deploy from outside the control
/// API. The secret is the URL path segment itself, not a header or
/// signature, so matching it is the entire authentication story.
pub async fn receive_webhook(
    State(ctx): State<AppContext>,
    Path(secret): Path<String>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let project = match ctx.project_repo.find_by_webhook_secret(&secret).await {
        Ok(Some(p)) => p,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => return e.into_response(),
    };

    let event_type = headers
        .get("x-event-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if event_type != "push" {
        info!(project_id = %project.id, event_type, "webhook event type not actionable, skipping");
        return skipped(format!("event type '{}' does not trigger a deploy", event_type))
            .into_response();
    }

    let payload: WebhookPayload = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(_) => return skipped("unrecognized payload").into_response(),
    };

    let branch = payload
        .git_ref
        .as_deref()
        .and_then(|r| r.strip_prefix("refs/heads/"));

    let Some(branch) = branch else {
        return skipped("payload ref is not a branch push").into_response();
    };

    if branch != project.branch {
        info!(
            project_id = %project.id,
            pushed_branch = branch,
            tracked_branch = %project.branch,
            "webhook branch mismatch, skipping"
        );
        return skipped(format!(
            "pushed branch '{}' does not match tracked branch '{}'",
            branch, project.branch
        ))
        .into_response();
    }

    let orchestrator = ctx.orchestrator.clone();
    let project_id = project.id.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.deploy(&project_id).await {
            warn!(project_id = %project_id, error = %e, "webhook-triggered deploy failed");
        }
    });

    (
        StatusCode::OK,
        Json(WebhookResponse {
            skipped: false,
            message: "deploy triggered".to_string(),
        }),
    )
        .into_response()
}
