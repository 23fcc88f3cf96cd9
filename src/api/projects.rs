use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;

use crate::db::models::{Color, CreateProject, EnvMap};
use crate::error::{Result, VersionGateError};
use crate::state::AppContext;

pub fn projects_routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/{id}", get(get_project).patch(update_project).delete(delete_project))
        .route("/{id}/env", patch(update_env))
        .route("/{id}/rollback", post(rollback_project))
        .route("/{id}/cancel-deploy", post(cancel_deploy))
        .route("/{id}/logs", get(project_logs))
        .route("/{id}/metrics", get(project_metrics))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectRequest {
    name: String,
    repo_url: String,
    branch: String,
    #[serde(default = "default_build_context")]
    build_context: String,
    app_port: i64,
    #[serde(default = "default_health_path")]
    health_path: String,
    #[serde(default)]
    env: EnvMap,
}

fn default_build_context() -> String {
    ".".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(VersionGateError::Validation(
            "name must be lowercase alphanumeric-hyphen, 1-64 chars".to_string(),
        ))
    }
}

fn validate_repo_url(url: &str) -> Result<()> {
    if url.starts_with("https://") {
        Ok(())
    } else {
        Err(VersionGateError::Validation(
            "repoUrl must use https".to_string(),
        ))
    }
}

fn validate_branch(branch: &str) -> Result<()> {
    if branch.is_empty() {
        Err(VersionGateError::Validation(
            "branch must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}

fn validate_port(app_port: i64) -> Result<()> {
    if (1..=65535).contains(&app_port) {
        Ok(())
    } else {
        Err(VersionGateError::Validation(
            "appPort must be between 1 and 65535".to_string(),
        ))
    }
}

fn validate_env(env: &EnvMap) -> Result<()> {
    if env.keys().any(|k| k.is_empty()) {
        Err(VersionGateError::Validation(
            "env var names must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}

async fn list_projects(State(ctx): State<AppContext>) -> impl IntoResponse {
    match ctx.project_repo.find_all().await {
        Ok(projects) => (StatusCode::OK, Json(projects)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_project(State(ctx): State<AppContext>, Path(id): Path<String>) -> impl IntoResponse {
    match ctx.project_repo.find_by_id(&id).await {
        Ok(Some(project)) => (StatusCode::OK, Json(project)).into_response(),
        Ok(None) => VersionGateError::NotFound(id).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn create_project(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_name(&req.name) {
        return e.into_response();
    }
    if let Err(e) = validate_repo_url(&req.repo_url) {
        return e.into_response();
    }
    if let Err(e) = validate_branch(&req.branch) {
        return e.into_response();
    }
    if let Err(e) = validate_port(req.app_port) {
        return e.into_response();
    }
    if let Err(e) = validate_env(&req.env) {
        return e.into_response();
    }

    let create = CreateProject {
        name: req.name,
        repo_url: req.repo_url,
        branch: req.branch,
        build_context: req.build_context,
        app_port: req.app_port,
        health_path: req.health_path,
        env: req.env,
    };

    match ctx.project_repo.create(create).await {
        Ok(project) => (StatusCode::CREATED, Json(project)).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to create project");
            e.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProjectRequest {
    repo_url: Option<String>,
    branch: Option<String>,
    build_context: Option<String>,
    app_port: Option<i64>,
    health_path: Option<String>,
}

async fn update_project(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> impl IntoResponse {
    let mut project = match ctx.project_repo.find_by_id(&id).await {
        Ok(Some(p)) => p,
        Ok(None) => return VersionGateError::NotFound(id).into_response(),
        Err(e) => return e.into_response(),
    };

    if let Some(repo_url) = req.repo_url {
        if let Err(e) = validate_repo_url(&repo_url) {
            return e.into_response();
        }
        project.repo_url = repo_url;
    }
    if let Some(branch) = req.branch {
        if let Err(e) = validate_branch(&branch) {
            return e.into_response();
        }
        project.branch = branch;
    }
    if let Some(build_context) = req.build_context {
        project.build_context = build_context;
    }
    if let Some(app_port) = req.app_port {
        if let Err(e) = validate_port(app_port) {
            return e.into_response();
        }
        project.app_port = app_port;
    }
    if let Some(health_path) = req.health_path {
        project.health_path = health_path;
    }

    match ctx.project_repo.update(&id, project).await {
        Ok(project) => (StatusCode::OK, Json(project)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn update_env(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(env): Json<EnvMap>,
) -> impl IntoResponse {
    if let Err(e) = validate_env(&env) {
        return e.into_response();
    }

    let mut project = match ctx.project_repo.find_by_id(&id).await {
        Ok(Some(p)) => p,
        Ok(None) => return VersionGateError::NotFound(id).into_response(),
        Err(e) => return e.into_response(),
    };
    project.env = env;

    match ctx.project_repo.update(&id, project).await {
        Ok(project) => (StatusCode::OK, Json(project)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn delete_project(State(ctx): State<AppContext>, Path(id): Path<String>) -> impl IntoResponse {
    let project = match ctx.project_repo.find_by_id(&id).await {
        Ok(Some(p)) => p,
        Ok(None) => return VersionGateError::NotFound(id).into_response(),
        Err(e) => return e.into_response(),
    };

    for color in [Color::Blue, Color::Green] {
        let name = project.container_name(color);
        ctx.container_runtime.stop_container(&name).await;
        ctx.container_runtime.remove_container(&name).await;
    }

    match ctx.project_repo.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn rollback_project(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ctx.rollback_engine.rollback(&id).await {
        Ok(deployment) => (StatusCode::OK, Json(deployment)).into_response(),
        Err(e) => {
            warn!(project_id = %id, error = %e, "rollback failed");
            e.into_response()
        }
    }
}

async fn cancel_deploy(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ctx.orchestrator.cancel(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// The deployment whose container currently owns traffic, or the one
/// mid-flight if a deploy is running. Logs/metrics always target this one.
async fn current_container_name(ctx: &AppContext, project_id: &str) -> Result<String> {
    if let Some(d) = ctx.deployment_repo.find_active_for_project(project_id).await? {
        return Ok(d.container_name);
    }
    if let Some(d) = ctx
        .deployment_repo
        .find_deploying_for_project(project_id)
        .await?
    {
        return Ok(d.container_name);
    }
    Err(VersionGateError::NotFound(format!(
        "no deployment for project {}",
        project_id
    )))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    #[serde(default = "default_tail_lines")]
    tail: usize,
}

fn default_tail_lines() -> usize {
    200
}

async fn project_logs(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(params): Query<LogsQuery>,
) -> impl IntoResponse {
    let container_name = match current_container_name(&ctx, &id).await {
        Ok(name) => name,
        Err(e) => return e.into_response(),
    };

    match ctx.container_runtime.get_logs(&container_name, params.tail).await {
        Ok(logs) => (StatusCode::OK, logs).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn project_metrics(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let container_name = match current_container_name(&ctx, &id).await {
        Ok(name) => name,
        Err(e) => return e.into_response(),
    };

    match ctx.container_runtime.get_stats(&container_name).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => e.into_response(),
    }
}
