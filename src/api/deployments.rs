use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::VersionGateError;
use crate::state::AppContext;

pub fn deployments_routes() -> Router<AppContext> {
    Router::new().route("/", get(list_deployments))
}

pub fn deploy_routes() -> Router<AppContext> {
    Router::new().route("/", post(deploy))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDeploymentsQuery {
    project_id: Option<String>,
}

async fn list_deployments(
    State(ctx): State<AppContext>,
    Query(params): Query<ListDeploymentsQuery>,
) -> impl IntoResponse {
    let Some(project_id) = params.project_id else {
        return VersionGateError::Validation("projectId query parameter is required".to_string())
            .into_response();
    };

    match ctx.deployment_repo.find_all_for_project(&project_id).await {
        Ok(deployments) => (StatusCode::OK, Json(deployments)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployRequest {
    project_id: String,
}

#[derive(Debug, Serialize)]
struct DeployResponse {
    deployment: crate::db::models::Deployment,
    message: String,
}

async fn deploy(State(ctx): State<AppContext>, Json(req): Json<DeployRequest>) -> impl IntoResponse {
    match ctx.orchestrator.deploy(&req.project_id).await {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(DeployResponse {
                deployment: outcome.deployment,
                message: outcome.message,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(project_id = %req.project_id, error = %e, "deploy failed");
            e.into_response()
        }
    }
}
