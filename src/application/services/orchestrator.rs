use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::application::events::{BroadcastEventBus, EventBus};
use crate::application::ports::container_runtime::ContainerRuntime;
use crate::application::ports::health_probe::HealthProbe;
use crate::application::ports::repositories::{DeploymentRepository, ProjectRepository};
use crate::application::ports::source_fetcher::SourceFetcher;
use crate::application::ports::traffic_switcher::TrafficSwitcher;
use crate::application::services::dockerfile_synth::DockerfileSynthesizer;
use crate::application::services::locks::{DeployLocks, LockGuard};
use crate::application::services::validator::DeploymentValidator;
use crate::db::models::{Color, Deployment, DeploymentStatus};
use crate::error::{Result, VersionGateError};
use crate::events::Event;

pub struct DeployOutcome {
    pub deployment: Deployment,
    pub message: String,
}

/// The pipeline state machine: per-project lock, cancellation
/// checkpoints, image/container lifecycle, traffic switch, retire of the
/// previous generation.
pub struct DeploymentOrchestrator {
    project_repo: Arc<dyn ProjectRepository>,
    deployment_repo: Arc<dyn DeploymentRepository>,
    source_fetcher: Arc<dyn SourceFetcher>,
    container_runtime: Arc<dyn ContainerRuntime>,
    traffic_switcher: Arc<dyn TrafficSwitcher>,
    synthesizer: DockerfileSynthesizer,
    validator: DeploymentValidator,
    event_bus: BroadcastEventBus,
    locks: Arc<DeployLocks>,
    docker_network: String,
}

impl DeploymentOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_repo: Arc<dyn ProjectRepository>,
        deployment_repo: Arc<dyn DeploymentRepository>,
        source_fetcher: Arc<dyn SourceFetcher>,
        container_runtime: Arc<dyn ContainerRuntime>,
        traffic_switcher: Arc<dyn TrafficSwitcher>,
        health_probe: Arc<dyn HealthProbe>,
        event_bus: BroadcastEventBus,
        locks: Arc<DeployLocks>,
        docker_network: String,
    ) -> Self {
        let validator = DeploymentValidator::new(container_runtime.clone(), health_probe);
        Self {
            project_repo,
            deployment_repo,
            source_fetcher,
            container_runtime,
            traffic_switcher,
            synthesizer: DockerfileSynthesizer::new(),
            validator,
            event_bus,
            locks,
            docker_network,
        }
    }

    pub fn locks(&self) -> Arc<DeployLocks> {
        self.locks.clone()
    }

    pub async fn deploy(&self, project_id: &str) -> Result<DeployOutcome> {
        let guard = LockGuard::acquire(&self.locks, project_id)
            .ok_or(VersionGateError::Conflict)?;

        match self.run_pipeline(project_id).await {
            Ok(outcome) => Ok(outcome),
            Err((deployment_id, err)) => {
                if let Some(id) = deployment_id {
                    self.deployment_repo
                        .update_status(
                            &id,
                            DeploymentStatus::Failed,
                            Some(err.as_deployment_message()),
                        )
                        .await
                        .ok();
                    self.event_bus
                        .emit(Event::deployment_status(
                            project_id.to_string(),
                            id,
                            DeploymentStatus::Failed,
                        ))
                        .await;
                }
                drop(guard);
                Err(err)
            }
        }
    }

    /// Returns `Err((Some(deployment_id), err))` once a DEPLOYING record
    /// exists, so the caller can flip it to FAILED; `Err((None, err))`
    /// for failures before that point.
    async fn run_pipeline(
        &self,
        project_id: &str,
    ) -> std::result::Result<DeployOutcome, (Option<String>, VersionGateError)> {
        let project = self
            .project_repo
            .find_by_id(project_id)
            .await
            .map_err(|e| (None, e))?
            .ok_or_else(|| (None, VersionGateError::NotFound(project_id.to_string())))?;

        // Step 1: prepare source.
        self.source_fetcher
            .prepare_source(&project)
            .await
            .map_err(|e| (None, e))?;
        self.checkpoint(project_id, None)?;

        let build_context = self
            .synthesizer
            .synthesize(
                std::path::Path::new(&project.local_path),
                &project.build_context,
            )
            .await
            .map_err(|e| (None, e))?;

        // Step 2: determine slot.
        let active = self
            .deployment_repo
            .find_active_for_project(project_id)
            .await
            .map_err(|e| (None, e))?;
        let color = active.as_ref().map(|d| d.color.opposite()).unwrap_or(Color::Blue);
        let port = project.port_for(color);
        let container_name = project.container_name(color);
        let image_tag = format!("versiongate-{}:{}", project.name, Utc::now().timestamp_millis());
        let version = self
            .deployment_repo
            .next_version_for_project(project_id)
            .await
            .map_err(|e| (None, e))?;

        // Step 3: persist DEPLOYING record.
        let now = Utc::now();
        let deployment = Deployment {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            version,
            color,
            port,
            container_name: container_name.clone(),
            image_tag: image_tag.clone(),
            status: DeploymentStatus::Deploying,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        let deployment = self
            .deployment_repo
            .create(deployment)
            .await
            .map_err(|e| (None, e))?;
        let deployment_id = deployment.id.clone();

        let result = self
            .execute_from_build(&project, &deployment, &build_context, active)
            .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err((Some(deployment_id), e)),
        }
    }

    async fn execute_from_build(
        &self,
        project: &crate::db::models::Project,
        deployment: &Deployment,
        build_context: &std::path::Path,
        previous_active: Option<Deployment>,
    ) -> Result<DeployOutcome> {
        // Step 4: build image.
        self.container_runtime
            .build_image(&deployment.image_tag, build_context)
            .await?;
        self.checkpoint(&project.id, Some(deployment))?;

        // Step 5: launch container.
        self.container_runtime.stop_container(&deployment.container_name).await;
        self.container_runtime.remove_container(&deployment.container_name).await;
        self.container_runtime.free_host_port(deployment.port).await;

        self.container_runtime
            .run_container(
                &deployment.container_name,
                &deployment.image_tag,
                deployment.port,
                project.app_port,
                &self.docker_network,
                &project.env,
            )
            .await?;
        self.checkpoint(&project.id, Some(deployment))?;

        let base_url = format!("http://127.0.0.1:{}", deployment.port);
        let outcome = self
            .validator
            .validate(&base_url, &project.health_path, &deployment.container_name)
            .await;
        if !outcome.ok {
            return Err(VersionGateError::HealthCheckFailed(
                outcome.error.unwrap_or_else(|| "health check failed".to_string()),
            ));
        }

        // Step 6: switch traffic.
        self.traffic_switcher.point_upstream_at(deployment.port).await?;

        // Step 7: promote and retire.
        self.deployment_repo
            .update_status(&deployment.id, DeploymentStatus::Active, None)
            .await?;
        self.event_bus
            .emit(Event::deployment_status(
                project.id.clone(),
                deployment.id.clone(),
                DeploymentStatus::Active,
            ))
            .await;

        if let Some(previous) = previous_active {
            self.container_runtime.stop_container(&previous.container_name).await;
            self.container_runtime.remove_container(&previous.container_name).await;
            self.deployment_repo
                .update_status(&previous.id, DeploymentStatus::RolledBack, None)
                .await
                .ok();
        }

        Ok(DeployOutcome {
            deployment: self
                .deployment_repo
                .find_by_id(&deployment.id)
                .await?
                .unwrap_or_else(|| deployment.clone()),
            message: "deployment succeeded".to_string(),
        })
    }

    fn checkpoint(&self, project_id: &str, _deployment: Option<&Deployment>) -> Result<()> {
        if self.locks.is_cancel_requested(project_id) {
            return Err(VersionGateError::Deployment("Cancelled by user".to_string()));
        }
        Ok(())
    }

    pub async fn cancel(&self, project_id: &str) -> Result<()> {
        let deploying = self
            .deployment_repo
            .find_deploying_for_project(project_id)
            .await?;

        let Some(deploying) = deploying else {
            return Ok(());
        };

        if self.locks.is_locked(project_id) {
            self.locks.request_cancel(project_id);
        }

        self.container_runtime.stop_container(&deploying.container_name).await;
        self.container_runtime.remove_container(&deploying.container_name).await;

        self.deployment_repo
            .update_status(
                &deploying.id,
                DeploymentStatus::Failed,
                Some("Cancelled by user".to_string()),
            )
            .await?;

        self.locks.release(project_id);

        info!(project_id, deployment = %deploying.id, "deployment cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{
        make_deployment, make_project, FakeContainerRuntime, FakeDeploymentRepository,
        FakeHealthProbe, FakeProjectRepository, FakeSourceFetcher, FakeTrafficSwitcher,
    };

    fn make_orchestrator(
        project_repo: Arc<FakeProjectRepository>,
        deployment_repo: Arc<FakeDeploymentRepository>,
        container_runtime: Arc<FakeContainerRuntime>,
    ) -> DeploymentOrchestrator {
        make_orchestrator_with_probe(
            project_repo,
            deployment_repo,
            container_runtime,
            Arc::new(FakeHealthProbe::new()),
        )
    }

    fn make_orchestrator_with_probe(
        project_repo: Arc<FakeProjectRepository>,
        deployment_repo: Arc<FakeDeploymentRepository>,
        container_runtime: Arc<FakeContainerRuntime>,
        health_probe: Arc<FakeHealthProbe>,
    ) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(
            project_repo,
            deployment_repo,
            Arc::new(FakeSourceFetcher),
            container_runtime,
            Arc::new(FakeTrafficSwitcher::default()),
            health_probe,
            crate::application::events::BroadcastEventBus::new_default(),
            Arc::new(DeployLocks::new()),
            "versiongate-net".to_string(),
        )
    }

    #[tokio::test]
    async fn deploy_of_unknown_project_is_not_found() {
        let orchestrator = make_orchestrator(
            Arc::new(FakeProjectRepository::new()),
            Arc::new(FakeDeploymentRepository::new()),
            Arc::new(FakeContainerRuntime::new()),
        );

        let err = orchestrator.deploy("missing").await.unwrap_err();
        assert!(matches!(err, VersionGateError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_deploy_on_same_project_is_rejected() {
        let locks = Arc::new(DeployLocks::new());
        let _guard = LockGuard::acquire(&locks, "p1").unwrap();

        let project_repo = Arc::new(FakeProjectRepository::new());
        project_repo.insert(make_project("p1", "demo", "main"));
        let orchestrator = DeploymentOrchestrator::new(
            project_repo,
            Arc::new(FakeDeploymentRepository::new()),
            Arc::new(FakeSourceFetcher),
            Arc::new(FakeContainerRuntime::new()),
            Arc::new(FakeTrafficSwitcher::default()),
            Arc::new(FakeHealthProbe::new()),
            crate::application::events::BroadcastEventBus::new_default(),
            locks.clone(),
            "versiongate-net".to_string(),
        );

        let err = orchestrator.deploy("p1").await.unwrap_err();
        assert!(matches!(err, VersionGateError::Conflict));
    }

    #[tokio::test]
    async fn cancel_with_no_deploying_record_is_a_noop() {
        let orchestrator = make_orchestrator(
            Arc::new(FakeProjectRepository::new()),
            Arc::new(FakeDeploymentRepository::new()),
            Arc::new(FakeContainerRuntime::new()),
        );

        orchestrator.cancel("p1").await.unwrap();
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "versiongate-orchestrator-test-{}",
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn successful_deploy_activates_and_switches_traffic() {
        let dir = tempdir();
        tokio::fs::write(dir.join("requirements.txt"), "flask\n").await.unwrap();

        let mut project = make_project("p1", "demo", "main");
        project.local_path = dir.to_string_lossy().to_string();
        let project_repo = Arc::new(FakeProjectRepository::new());
        project_repo.insert(project.clone());

        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        let traffic_switcher = Arc::new(FakeTrafficSwitcher::default());
        let probe = Arc::new(FakeHealthProbe::new());
        probe.push_success(10.0);

        let orchestrator = DeploymentOrchestrator::new(
            project_repo,
            deployment_repo,
            Arc::new(FakeSourceFetcher),
            container_runtime,
            traffic_switcher.clone(),
            probe,
            crate::application::events::BroadcastEventBus::new_default(),
            Arc::new(DeployLocks::new()),
            "versiongate-net".to_string(),
        );

        let outcome = orchestrator.deploy("p1").await.unwrap();

        assert_eq!(outcome.deployment.status, DeploymentStatus::Active);
        assert_eq!(outcome.deployment.color, Color::Blue);
        assert_eq!(outcome.deployment.port, project.base_port);
        assert_eq!(
            traffic_switcher.last_port.lock().unwrap().unwrap(),
            project.base_port
        );

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn second_deploy_alternates_color_and_retires_previous() {
        let dir = tempdir();
        tokio::fs::write(dir.join("requirements.txt"), "flask\n").await.unwrap();

        let mut project = make_project("p1", "demo", "main");
        project.local_path = dir.to_string_lossy().to_string();
        let project_repo = Arc::new(FakeProjectRepository::new());
        project_repo.insert(project.clone());

        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        let traffic_switcher = Arc::new(FakeTrafficSwitcher::default());
        let probe = Arc::new(FakeHealthProbe::new());
        probe.push_success(10.0);
        probe.push_success(12.0);

        let orchestrator = DeploymentOrchestrator::new(
            project_repo,
            deployment_repo.clone(),
            Arc::new(FakeSourceFetcher),
            container_runtime,
            traffic_switcher.clone(),
            probe,
            crate::application::events::BroadcastEventBus::new_default(),
            Arc::new(DeployLocks::new()),
            "versiongate-net".to_string(),
        );

        let first = orchestrator.deploy("p1").await.unwrap();
        assert_eq!(first.deployment.color, Color::Blue);
        assert_eq!(first.deployment.port, project.base_port);

        let second = orchestrator.deploy("p1").await.unwrap();
        assert_eq!(second.deployment.color, Color::Green);
        assert_eq!(second.deployment.port, project.base_port + 1);
        assert_eq!(
            traffic_switcher.last_port.lock().unwrap().unwrap(),
            project.base_port + 1
        );

        let snapshot = deployment_repo.snapshot();
        let retired = snapshot.iter().find(|d| d.id == first.deployment.id).unwrap();
        assert_eq!(retired.status, DeploymentStatus::RolledBack);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn cancel_stops_container_and_marks_failed() {
        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let deployment = make_deployment(
            "d1",
            "p1",
            1,
            crate::db::models::Color::Blue,
            DeploymentStatus::Deploying,
        );
        let container_name = deployment.container_name.clone();
        deployment_repo.insert(deployment);
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        container_runtime.set_running(&container_name, true);

        let orchestrator =
            make_orchestrator(Arc::new(FakeProjectRepository::new()), deployment_repo.clone(), container_runtime.clone());

        orchestrator.cancel("p1").await.unwrap();

        assert_eq!(deployment_repo.snapshot()[0].status, DeploymentStatus::Failed);
        assert!(!container_runtime.inspect_running(&container_name).await);
    }
}
