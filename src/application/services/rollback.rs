use std::sync::Arc;
use tracing::info;

use crate::application::events::{BroadcastEventBus, EventBus};
use crate::application::ports::container_runtime::ContainerRuntime;
use crate::application::ports::health_probe::HealthProbe;
use crate::application::ports::repositories::{DeploymentRepository, ProjectRepository};
use crate::application::ports::traffic_switcher::TrafficSwitcher;
use crate::application::services::validator::DeploymentValidator;
use crate::db::models::{Deployment, DeploymentStatus};
use crate::error::{Result, VersionGateError};
use crate::events::Event;

/// Restores the previous generation's container in place of the current
/// ACTIVE one. Does not take a deploy lock: a rollback restarts an image
/// that already built successfully, it never builds.
pub struct RollbackEngine {
    project_repo: Arc<dyn ProjectRepository>,
    deployment_repo: Arc<dyn DeploymentRepository>,
    container_runtime: Arc<dyn ContainerRuntime>,
    traffic_switcher: Arc<dyn TrafficSwitcher>,
    validator: DeploymentValidator,
    event_bus: BroadcastEventBus,
    docker_network: String,
}

impl RollbackEngine {
    pub fn new(
        project_repo: Arc<dyn ProjectRepository>,
        deployment_repo: Arc<dyn DeploymentRepository>,
        container_runtime: Arc<dyn ContainerRuntime>,
        traffic_switcher: Arc<dyn TrafficSwitcher>,
        health_probe: Arc<dyn HealthProbe>,
        event_bus: BroadcastEventBus,
        docker_network: String,
    ) -> Self {
        let validator = DeploymentValidator::new(container_runtime.clone(), health_probe);
        Self {
            project_repo,
            deployment_repo,
            container_runtime,
            traffic_switcher,
            validator,
            event_bus,
            docker_network,
        }
    }

    pub async fn rollback(&self, project_id: &str) -> Result<Deployment> {
        let project = self
            .project_repo
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| VersionGateError::NotFound(project_id.to_string()))?;

        let current = self
            .deployment_repo
            .find_active_for_project(project_id)
            .await?
            .ok_or(VersionGateError::NoActiveDeployment)?;

        let previous = self
            .deployment_repo
            .find_previous_for_project(project_id, current.version)
            .await?
            .ok_or(VersionGateError::NoPreviousDeployment)?;

        self.container_runtime.stop_container(&previous.container_name).await;
        self.container_runtime.remove_container(&previous.container_name).await;
        self.container_runtime.free_host_port(previous.port).await;

        self.container_runtime
            .run_container(
                &previous.container_name,
                &previous.image_tag,
                previous.port,
                project.app_port,
                &self.docker_network,
                &project.env,
            )
            .await?;

        let base_url = format!("http://127.0.0.1:{}", previous.port);
        let outcome = self
            .validator
            .validate(&base_url, &project.health_path, &previous.container_name)
            .await;
        if !outcome.ok {
            self.container_runtime.stop_container(&previous.container_name).await;
            self.container_runtime.remove_container(&previous.container_name).await;
            return Err(VersionGateError::RollbackValidationFailed(
                outcome.error.unwrap_or_else(|| "health check failed".to_string()),
            ));
        }

        self.traffic_switcher.point_upstream_at(previous.port).await?;

        self.container_runtime.stop_container(&current.container_name).await;
        self.container_runtime.remove_container(&current.container_name).await;

        self.deployment_repo
            .update_status(&previous.id, DeploymentStatus::Active, None)
            .await?;
        self.deployment_repo
            .update_status(&current.id, DeploymentStatus::RolledBack, None)
            .await?;

        self.event_bus
            .emit(Event::deployment_status(
                project_id.to_string(),
                previous.id.clone(),
                DeploymentStatus::Active,
            ))
            .await;

        info!(project_id, restored = %previous.id, replaced = %current.id, "rollback complete");

        self.deployment_repo
            .find_by_id(&previous.id)
            .await?
            .ok_or_else(|| VersionGateError::NotFound(previous.id.clone()))
    }
}
