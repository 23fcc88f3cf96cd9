use serde::{Deserialize, Serialize};

use crate::db::models::DeploymentStatus;

/// Internal events emitted as the pipeline, rollback engine, and watcher
/// progress. Nothing in the core depends on a subscriber existing; this
/// is purely an optional observation channel for status polling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "deployment_status")]
    DeploymentStatus {
        project_id: String,
        deployment_id: String,
        status: DeploymentStatus,
        timestamp: String,
    },

    #[serde(rename = "health_check")]
    HealthCheck {
        project_id: String,
        deployment_id: String,
        attempt: usize,
        max_attempts: usize,
        ok: bool,
        timestamp: String,
    },

    #[serde(rename = "container_status")]
    ContainerStatus {
        project_id: String,
        deployment_id: String,
        running: bool,
        timestamp: String,
    },

    #[serde(rename = "error")]
    Error {
        project_id: Option<String>,
        deployment_id: Option<String>,
        message: String,
        timestamp: String,
    },
}

impl Event {
    pub fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    pub fn deployment_status(
        project_id: String,
        deployment_id: String,
        status: DeploymentStatus,
    ) -> Self {
        Event::DeploymentStatus {
            project_id,
            deployment_id,
            status,
            timestamp: Self::now(),
        }
    }

    pub fn health_check(
        project_id: String,
        deployment_id: String,
        attempt: usize,
        max_attempts: usize,
        ok: bool,
    ) -> Self {
        Event::HealthCheck {
            project_id,
            deployment_id,
            attempt,
            max_attempts,
            ok,
            timestamp: Self::now(),
        }
    }

    pub fn container_status(project_id: String, deployment_id: String, running: bool) -> Self {
        Event::ContainerStatus {
            project_id,
            deployment_id,
            running,
            timestamp: Self::now(),
        }
    }

    pub fn error(project_id: Option<String>, deployment_id: Option<String>, message: String) -> Self {
        Event::Error {
            project_id,
            deployment_id,
            message,
            timestamp: Self::now(),
        }
    }
}
