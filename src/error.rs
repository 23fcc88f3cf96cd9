use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error taxonomy for the deployment core. Conceptual kinds from the
/// design map onto a single enum so the HTTP boundary has one place to
/// translate errors into status codes, and pipeline code has one type to
/// thread through `?`.
#[derive(Debug, thiserror::Error)]
pub enum VersionGateError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("deployment already in progress for this project")]
    Conflict,

    #[error("source fetch failed: {0}")]
    SourceFetch(String),

    #[error("image build failed: {0}")]
    ImageBuild(String),

    #[error("container launch failed: {0}")]
    ContainerLaunch(String),

    #[error("health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("traffic switch failed: {0}")]
    TrafficSwitch(String),

    #[error("could not detect a project runtime to containerize")]
    UndetectableProjectType,

    #[error("deployment error: {0}")]
    Deployment(String),

    #[error("rollback validation failed: {0}")]
    RollbackValidationFailed(String),

    #[error("no active deployment for project")]
    NoActiveDeployment,

    #[error("no previous deployment to roll back to")]
    NoPreviousDeployment,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl VersionGateError {
    fn kind(&self) -> &'static str {
        match self {
            VersionGateError::Validation(_) => "ValidationError",
            VersionGateError::NotFound(_) => "NotFoundError",
            VersionGateError::Conflict => "ConflictError",
            VersionGateError::SourceFetch(_) => "DeploymentError",
            VersionGateError::ImageBuild(_) => "DeploymentError",
            VersionGateError::ContainerLaunch(_) => "DeploymentError",
            VersionGateError::HealthCheckFailed(_) => "DeploymentError",
            VersionGateError::TrafficSwitch(_) => "DeploymentError",
            VersionGateError::UndetectableProjectType => "DeploymentError",
            VersionGateError::Deployment(_) => "DeploymentError",
            VersionGateError::RollbackValidationFailed(_) => "RollbackValidationFailed",
            VersionGateError::NoActiveDeployment => "NoActiveDeployment",
            VersionGateError::NoPreviousDeployment => "NoPreviousDeployment",
            VersionGateError::Internal(_) => "InternalError",
            VersionGateError::Database(_) => "InternalError",
            VersionGateError::Serialization(_) => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            VersionGateError::Validation(_) => StatusCode::BAD_REQUEST,
            VersionGateError::NotFound(_) => StatusCode::NOT_FOUND,
            VersionGateError::Conflict => StatusCode::CONFLICT,
            VersionGateError::NoActiveDeployment | VersionGateError::NoPreviousDeployment => {
                StatusCode::BAD_REQUEST
            }
            VersionGateError::SourceFetch(_)
            | VersionGateError::ImageBuild(_)
            | VersionGateError::ContainerLaunch(_)
            | VersionGateError::HealthCheckFailed(_)
            | VersionGateError::TrafficSwitch(_)
            | VersionGateError::UndetectableProjectType
            | VersionGateError::Deployment(_)
            | VersionGateError::RollbackValidationFailed(_)
            | VersionGateError::Internal(_)
            | VersionGateError::Database(_)
            | VersionGateError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Folds the external-command-surfacing variants into the umbrella
    /// `DeploymentError` message stored verbatim on a deployment record.
    pub fn as_deployment_message(&self) -> String {
        self.to_string()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    code: Option<String>,
}

impl IntoResponse for VersionGateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            code: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, VersionGateError>;
