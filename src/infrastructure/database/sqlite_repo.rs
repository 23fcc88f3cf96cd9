use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::application::ports::repositories::{DeploymentRepository, ProjectRepository};
use crate::db::models::{CreateProject, Deployment, DeploymentStatus, Project};
use crate::error::Result;

#[derive(Clone)]
pub struct SqliteProjectRepository {
    pool: SqlitePool,
    projects_root: String,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool, projects_root: String) -> Self {
        Self { pool, projects_root }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, project: CreateProject) -> Result<Project> {
        let id = uuid::Uuid::new_v4().to_string();
        let webhook_secret = {
            use rand::RngCore;
            let mut bytes = [0u8; 24];
            rand::thread_rng().fill_bytes(&mut bytes);
            hex::encode(bytes)
        };
        let base_port = self.next_base_port(3100).await?;
        let local_path = format!("{}/{}", self.projects_root.trim_end_matches('/'), id);
        let now = Utc::now();
        let env_json = serde_json::to_string(&project.env)?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, name, repo_url, branch, build_context, local_path,
                app_port, health_path, base_port, webhook_secret, env,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&project.name)
        .bind(&project.repo_url)
        .bind(&project.branch)
        .bind(&project.build_context)
        .bind(&local_path)
        .bind(project.app_port)
        .bind(&project.health_path)
        .bind(base_port)
        .bind(&webhook_secret)
        .bind(&env_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| crate::error::VersionGateError::NotFound(id))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn find_by_webhook_secret(&self, secret: &str) -> Result<Option<Project>> {
        let project =
            sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE webhook_secret = ?")
                .bind(secret)
                .fetch_optional(&self.pool)
                .await?;
        Ok(project)
    }

    async fn find_all(&self) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(projects)
    }

    async fn update(&self, id: &str, project: Project) -> Result<Project> {
        let env_json = serde_json::to_string(&project.env)?;
        sqlx::query(
            r#"
            UPDATE projects SET
                name = ?, repo_url = ?, branch = ?, build_context = ?,
                app_port = ?, health_path = ?, env = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&project.name)
        .bind(&project.repo_url)
        .bind(&project.branch)
        .bind(&project.build_context)
        .bind(project.app_port)
        .bind(&project.health_path)
        .bind(&env_json)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| crate::error::VersionGateError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn next_base_port(&self, start_at: i64) -> Result<i64> {
        let max_base_port: Option<i64> =
            sqlx::query_scalar("SELECT MAX(base_port) FROM projects")
                .fetch_one(&self.pool)
                .await?;
        Ok(match max_base_port {
            Some(port) => port + 2,
            None => start_at,
        })
    }
}

#[derive(Clone)]
pub struct SqliteDeploymentRepository {
    pool: SqlitePool,
}

impl SqliteDeploymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeploymentRepository for SqliteDeploymentRepository {
    async fn create(&self, deployment: Deployment) -> Result<Deployment> {
        sqlx::query(
            r#"
            INSERT INTO deployments (
                id, project_id, version, color, port, container_name,
                image_tag, status, error_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&deployment.id)
        .bind(&deployment.project_id)
        .bind(deployment.version)
        .bind(deployment.color)
        .bind(deployment.port)
        .bind(&deployment.container_name)
        .bind(&deployment.image_tag)
        .bind(deployment.status)
        .bind(&deployment.error_message)
        .bind(deployment.created_at)
        .bind(deployment.updated_at)
        .execute(&self.pool)
        .await?;

        self.find_by_id(&deployment.id)
            .await?
            .ok_or_else(|| crate::error::VersionGateError::NotFound(deployment.id))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Deployment>> {
        let deployment =
            sqlx::query_as::<_, Deployment>("SELECT * FROM deployments WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(deployment)
    }

    async fn find_active_for_project(&self, project_id: &str) -> Result<Option<Deployment>> {
        let deployment = sqlx::query_as::<_, Deployment>(
            "SELECT * FROM deployments WHERE project_id = ? AND status = 'ACTIVE' LIMIT 1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deployment)
    }

    async fn find_deploying_for_project(&self, project_id: &str) -> Result<Option<Deployment>> {
        let deployment = sqlx::query_as::<_, Deployment>(
            "SELECT * FROM deployments WHERE project_id = ? AND status = 'DEPLOYING' LIMIT 1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deployment)
    }

    async fn find_previous_for_project(
        &self,
        project_id: &str,
        current_version: i64,
    ) -> Result<Option<Deployment>> {
        let deployment = sqlx::query_as::<_, Deployment>(
            r#"
            SELECT * FROM deployments
            WHERE project_id = ? AND status = 'ROLLED_BACK' AND version < ?
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .bind(current_version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deployment)
    }

    async fn find_all_for_project(&self, project_id: &str) -> Result<Vec<Deployment>> {
        let deployments = sqlx::query_as::<_, Deployment>(
            "SELECT * FROM deployments WHERE project_id = ? ORDER BY version DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(deployments)
    }

    async fn find_all_deploying(&self) -> Result<Vec<Deployment>> {
        let deployments = sqlx::query_as::<_, Deployment>(
            "SELECT * FROM deployments WHERE status = 'DEPLOYING'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(deployments)
    }

    async fn find_all_active_with_projects(&self) -> Result<Vec<(Deployment, Project)>> {
        let deployments = sqlx::query_as::<_, Deployment>(
            "SELECT * FROM deployments WHERE status = 'ACTIVE'",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut pairs = Vec::with_capacity(deployments.len());
        for deployment in deployments {
            let project =
                sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
                    .bind(&deployment.project_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if let Some(project) = project {
                pairs.push((deployment, project));
            }
        }
        Ok(pairs)
    }

    async fn next_version_for_project(&self, project_id: &str) -> Result<i64> {
        let max_version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM deployments WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(max_version.unwrap_or(0) + 1)
    }

    async fn update_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE deployments SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
