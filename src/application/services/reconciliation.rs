use std::sync::Arc;
use tracing::{info, warn};

use crate::application::ports::container_runtime::ContainerRuntime;
use crate::application::ports::repositories::DeploymentRepository;
use crate::db::models::DeploymentStatus;
use crate::error::Result;

#[derive(Debug, Default, serde::Serialize)]
pub struct ReconciliationReport {
    pub deploying_fixed: usize,
    pub active_invalidated: usize,
}

/// One-shot pass run at boot: a process that died mid-deploy leaves a
/// DEPLOYING row nothing will ever finish, and a host reboot can leave
/// an ACTIVE row pointing at a container that no longer exists. Both are
/// flipped to FAILED so the control API and operators see a consistent
/// state instead of a deployment stuck "in progress" forever.
pub struct Reconciler {
    deployment_repo: Arc<dyn DeploymentRepository>,
    container_runtime: Arc<dyn ContainerRuntime>,
}

impl Reconciler {
    pub fn new(
        deployment_repo: Arc<dyn DeploymentRepository>,
        container_runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            deployment_repo,
            container_runtime,
        }
    }

    pub async fn reconcile(&self) -> Result<ReconciliationReport> {
        let mut report = ReconciliationReport::default();

        let deploying = self.deployment_repo.find_all_deploying().await?;
        for d in deploying {
            self.deployment_repo
                .update_status(
                    &d.id,
                    DeploymentStatus::Failed,
                    Some("Process crashed mid-deploy".to_string()),
                )
                .await?;
            report.deploying_fixed += 1;
            warn!(deployment = %d.id, "reconciled stale DEPLOYING record");
        }

        let active = self.deployment_repo.find_all_active_with_projects().await?;
        for (d, _project) in active {
            if !self.container_runtime.inspect_running(&d.container_name).await {
                self.deployment_repo
                    .update_status(
                        &d.id,
                        DeploymentStatus::Failed,
                        Some("Container not running at boot".to_string()),
                    )
                    .await?;
                report.active_invalidated += 1;
                warn!(deployment = %d.id, "reconciled ACTIVE record with no running container");
            }
        }

        info!(
            deploying_fixed = report.deploying_fixed,
            active_invalidated = report.active_invalidated,
            "boot reconciliation complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{
        make_deployment, make_project, FakeContainerRuntime, FakeDeploymentRepository,
    };
    use crate::db::models::Color;

    #[tokio::test]
    async fn stale_deploying_record_is_failed() {
        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        deployment_repo.insert(make_deployment(
            "d1",
            "p1",
            1,
            Color::Blue,
            DeploymentStatus::Deploying,
        ));

        let reconciler = Reconciler::new(deployment_repo.clone(), container_runtime);
        let report = reconciler.reconcile().await.unwrap();

        assert_eq!(report.deploying_fixed, 1);
        assert_eq!(report.active_invalidated, 0);
        let stored = deployment_repo.snapshot();
        assert_eq!(stored[0].status, DeploymentStatus::Failed);
        assert_eq!(
            stored[0].error_message.as_deref(),
            Some("Process crashed mid-deploy")
        );
    }

    #[tokio::test]
    async fn active_with_no_running_container_is_invalidated() {
        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        let deployment = make_deployment("d1", "p1", 1, Color::Blue, DeploymentStatus::Active);
        let container_name = deployment.container_name.clone();
        deployment_repo.insert(deployment);
        deployment_repo.link_project(make_project("p1", "demo", "main"));
        // container never started, so inspect_running defaults to false
        let _ = &container_name;

        let reconciler = Reconciler::new(deployment_repo.clone(), container_runtime);
        let report = reconciler.reconcile().await.unwrap();

        assert_eq!(report.active_invalidated, 1);
        assert_eq!(deployment_repo.snapshot()[0].status, DeploymentStatus::Failed);
    }

    #[tokio::test]
    async fn active_with_running_container_is_left_alone() {
        let deployment_repo = Arc::new(FakeDeploymentRepository::new());
        let container_runtime = Arc::new(FakeContainerRuntime::new());
        let deployment = make_deployment("d1", "p1", 1, Color::Blue, DeploymentStatus::Active);
        container_runtime.set_running(&deployment.container_name, true);
        deployment_repo.insert(deployment);
        deployment_repo.link_project(make_project("p1", "demo", "main"));

        let reconciler = Reconciler::new(deployment_repo.clone(), container_runtime);
        let report = reconciler.reconcile().await.unwrap();

        assert_eq!(report.active_invalidated, 0);
        assert_eq!(deployment_repo.snapshot()[0].status, DeploymentStatus::Active);
    }
}
