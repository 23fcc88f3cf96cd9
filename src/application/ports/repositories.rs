use async_trait::async_trait;

use crate::db::models::{CreateProject, Deployment, DeploymentStatus, Project};
use crate::error::Result;

/// Persistence for projects. The only allowed mutation path for project
/// fields; the orchestrator never writes SQL directly.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: CreateProject) -> Result<Project>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Project>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Project>>;
    async fn find_by_webhook_secret(&self, secret: &str) -> Result<Option<Project>>;
    async fn find_all(&self) -> Result<Vec<Project>>;
    async fn update(&self, id: &str, project: Project) -> Result<Project>;
    async fn delete(&self, id: &str) -> Result<()>;

    /// Next available base port, starting at `start_at`, stepping by 2 so
    /// the BLUE/GREEN pair never overlaps another project's pair.
    async fn next_base_port(&self, start_at: i64) -> Result<i64>;
}

/// Persistence for deployments. The orchestrator, rollback engine,
/// watcher, and reconciliation pass are the only writers of status.
#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    async fn create(&self, deployment: Deployment) -> Result<Deployment>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Deployment>>;
    async fn find_active_for_project(&self, project_id: &str) -> Result<Option<Deployment>>;
    async fn find_deploying_for_project(&self, project_id: &str) -> Result<Option<Deployment>>;

    /// Most recent ROLLED_BACK deployment with `version < current_version`,
    /// ordered by version descending.
    async fn find_previous_for_project(
        &self,
        project_id: &str,
        current_version: i64,
    ) -> Result<Option<Deployment>>;

    async fn find_all_for_project(&self, project_id: &str) -> Result<Vec<Deployment>>;
    async fn find_all_deploying(&self) -> Result<Vec<Deployment>>;
    async fn find_all_active_with_projects(&self) -> Result<Vec<(Deployment, Project)>>;
    async fn next_version_for_project(&self, project_id: &str) -> Result<i64>;

    async fn update_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        error_message: Option<String>,
    ) -> Result<()>;
}
