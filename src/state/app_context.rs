use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::events::{BroadcastEventBus, EventBus};
use crate::application::ports::container_runtime::ContainerRuntime;
use crate::application::ports::health_probe::HealthProbe;
use crate::application::ports::process_runner::ProcessRunner;
use crate::application::ports::repositories::{DeploymentRepository, ProjectRepository};
use crate::application::ports::source_fetcher::SourceFetcher;
use crate::application::ports::traffic_switcher::TrafficSwitcher;
use crate::application::services::{
    ContainerWatcher, DeployLocks, DeploymentOrchestrator, Reconciler, RollbackEngine,
};
use crate::config::Config;
use crate::events::Event;
use crate::infrastructure::database::{SqliteDeploymentRepository, SqliteProjectRepository};
use crate::infrastructure::docker::BollardContainerRuntime;
use crate::infrastructure::git::GitSourceFetcher;
use crate::infrastructure::http::ReqwestHealthProbe;
use crate::infrastructure::process::TokioProcessRunner;
use crate::infrastructure::proxy::FileTrafficSwitcher;

/// Dependency-injection container assembled once at boot. Every control
/// API handler reaches the core through this, never by touching
/// `SqlitePool` or the Docker client directly.
#[derive(Clone)]
pub struct AppContext {
    pub project_repo: Arc<dyn ProjectRepository>,
    pub deployment_repo: Arc<dyn DeploymentRepository>,
    pub container_runtime: Arc<dyn ContainerRuntime>,

    pub orchestrator: Arc<DeploymentOrchestrator>,
    pub rollback_engine: Arc<RollbackEngine>,
    pub reconciler: Arc<Reconciler>,
    pub watcher: Arc<ContainerWatcher>,

    pub event_bus: BroadcastEventBus,
    pub config: Arc<Config>,
}

impl AppContext {
    pub async fn new(pool: SqlitePool, config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let project_repo: Arc<dyn ProjectRepository> = Arc::new(SqliteProjectRepository::new(
            pool.clone(),
            config.projects_root_path.clone(),
        ));
        let deployment_repo: Arc<dyn DeploymentRepository> =
            Arc::new(SqliteDeploymentRepository::new(pool.clone()));

        let process_runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());
        let container_runtime: Arc<dyn ContainerRuntime> =
            Arc::new(BollardContainerRuntime::connect(process_runner.clone())?);
        let source_fetcher: Arc<dyn SourceFetcher> =
            Arc::new(GitSourceFetcher::new(process_runner.clone()));
        let traffic_switcher: Arc<dyn TrafficSwitcher> = Arc::new(FileTrafficSwitcher::new(
            config.nginx_config_path.clone(),
            process_runner.clone(),
        ));

        let health_probe: Arc<dyn HealthProbe> = Arc::new(ReqwestHealthProbe::new());
        let event_bus = BroadcastEventBus::new_default();
        let locks = Arc::new(DeployLocks::new());

        let orchestrator = Arc::new(DeploymentOrchestrator::new(
            project_repo.clone(),
            deployment_repo.clone(),
            source_fetcher,
            container_runtime.clone(),
            traffic_switcher.clone(),
            health_probe.clone(),
            event_bus.clone(),
            locks,
            config.docker_network.clone(),
        ));

        let rollback_engine = Arc::new(RollbackEngine::new(
            project_repo.clone(),
            deployment_repo.clone(),
            container_runtime.clone(),
            traffic_switcher,
            health_probe,
            event_bus.clone(),
            config.docker_network.clone(),
        ));

        let reconciler = Arc::new(Reconciler::new(
            deployment_repo.clone(),
            container_runtime.clone(),
        ));

        let watcher = Arc::new(ContainerWatcher::new(
            deployment_repo.clone(),
            container_runtime.clone(),
            event_bus.clone(),
        ));

        Ok(Self {
            project_repo,
            deployment_repo,
            container_runtime,
            orchestrator,
            rollback_engine,
            reconciler,
            watcher,
            event_bus,
            config,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe()
    }
}
