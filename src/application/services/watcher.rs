use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::application::events::{BroadcastEventBus, EventBus};
use crate::application::ports::container_runtime::ContainerRuntime;
use crate::application::ports::repositories::DeploymentRepository;
use crate::db::models::DeploymentStatus;
use crate::events::Event;

const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Background poll over every ACTIVE deployment, flipping one to FAILED
/// the moment its container is no longer running. A single re-entrancy
/// guard skips a tick outright if the previous one is still in flight,
/// rather than queueing or overlapping ticks.
pub struct ContainerWatcher {
    deployment_repo: Arc<dyn DeploymentRepository>,
    container_runtime: Arc<dyn ContainerRuntime>,
    event_bus: BroadcastEventBus,
    tick_running: AtomicBool,
}

impl ContainerWatcher {
    pub fn new(
        deployment_repo: Arc<dyn DeploymentRepository>,
        container_runtime: Arc<dyn ContainerRuntime>,
        event_bus: BroadcastEventBus,
    ) -> Self {
        Self {
            deployment_repo,
            container_runtime,
            event_bus,
            tick_running: AtomicBool::new(false),
        }
    }

    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.tick().await; // first tick fires immediately; skip it
        loop {
            interval.tick().await;
            self.clone().tick().await;
        }
    }

    async fn tick(self: Arc<Self>) {
        if self
            .tick_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("watcher tick skipped, previous tick still running");
            return;
        }

        let active = match self.deployment_repo.find_all_active_with_projects().await {
            Ok(active) => active,
            Err(e) => {
                error!(error = %e, "watcher could not read active deployments, aborting tick");
                self.tick_running.store(false, Ordering::SeqCst);
                return;
            }
        };

        for (deployment, project) in active {
            let running = self
                .container_runtime
                .inspect_running(&deployment.container_name)
                .await;
            if running {
                continue;
            }

            warn!(deployment = %deployment.id, project = %project.name, "active container not running");
            if let Err(e) = self
                .deployment_repo
                .update_status(
                    &deployment.id,
                    DeploymentStatus::Failed,
                    Some("Container stopped".to_string()),
                )
                .await
            {
                error!(deployment = %deployment.id, error = %e, "failed to mark deployment FAILED");
                continue;
            }

            self.event_bus
                .emit(Event::container_status(
                    project.id.clone(),
                    deployment.id.clone(),
                    false,
                ))
                .await;
        }

        self.tick_running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::BroadcastEventBus;
    use crate::application::services::test_support::{
        make_deployment, make_project, FakeContainerRuntime, FakeDeploymentRepository,
    };
    use crate::db::models::Color;

    #[tokio::test]
    async fn stopped_active_container_flips_to_failed_and_emits() {
        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        let deployment = make_deployment("d1", "p1", 1, Color::Blue, DeploymentStatus::Active);
        deployment_repo.insert(deployment);
        deployment_repo.link_project(make_project("p1", "demo", "main"));
        // container_runtime never saw this container start, so inspect_running is false

        let event_bus = BroadcastEventBus::new_default();
        let mut rx = event_bus.subscribe();
        let watcher = Arc::new(ContainerWatcher::new(
            deployment_repo.clone(),
            container_runtime,
            event_bus,
        ));

        watcher.clone().tick().await;

        assert_eq!(deployment_repo.snapshot()[0].status, DeploymentStatus::Failed);
        let event = rx.try_recv().expect("watcher should emit a status event");
        match event {
            Event::ContainerStatus { running, .. } => assert!(!running),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn running_active_container_is_untouched() {
        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        let deployment = make_deployment("d1", "p1", 1, Color::Blue, DeploymentStatus::Active);
        container_runtime.set_running(&deployment.container_name, true);
        deployment_repo.insert(deployment);
        deployment_repo.link_project(make_project("p1", "demo", "main"));

        let watcher = Arc::new(ContainerWatcher::new(
            deployment_repo.clone(),
            container_runtime,
            BroadcastEventBus::new_default(),
        ));

        watcher.clone().tick().await;

        assert_eq!(deployment_repo.snapshot()[0].status, DeploymentStatus::Active);
    }

    #[tokio::test]
    async fn reentrant_tick_is_skipped() {
        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        let watcher = Arc::new(ContainerWatcher::new(
            deployment_repo,
            container_runtime,
            BroadcastEventBus::new_default(),
        ));

        watcher.tick_running.store(true, Ordering::SeqCst);
        // Should return immediately without panicking or clearing the flag's owner.
        watcher.clone().tick().await;
        assert!(watcher.tick_running.load(Ordering::SeqCst));
    }
}
