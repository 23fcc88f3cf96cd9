use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::ports::container_runtime::{ContainerRuntime, ContainerStats};
use crate::application::ports::health_probe::{HealthProbe, ProbeResult};
use crate::application::ports::repositories::{DeploymentRepository, ProjectRepository};
use crate::application::ports::source_fetcher::SourceFetcher;
use crate::application::ports::traffic_switcher::TrafficSwitcher;
use crate::db::models::{Color, CreateProject, Deployment, DeploymentStatus, Project};
use crate::error::{Result, VersionGateError};

/// In-memory fakes for the port traits, used by the service-level unit
/// tests in this module. Mirrors the real adapters' observable behavior
/// (idempotent stop/remove, `inspect_running` false for anything never
/// started) without touching Docker, git, or the filesystem.
pub fn make_project(id: &str, name: &str, branch: &str) -> Project {
    let now = Utc::now();
    Project {
        id: id.to_string(),
        name: name.to_string(),
        repo_url: "https://example.com/repo.git".to_string(),
        branch: branch.to_string(),
        build_context: ".".to_string(),
        local_path: format!("/var/versiongate/projects/{}", id),
        app_port: 8080,
        health_path: "/health".to_string(),
        base_port: 4000,
        webhook_secret: "secret".to_string(),
        env: BTreeMap::new(),
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct FakeProjectRepository {
    projects: Mutex<HashMap<String, Project>>,
}

impl FakeProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project: Project) {
        self.projects
            .lock()
            .unwrap()
            .insert(project.id.clone(), project);
    }
}

#[async_trait]
impl ProjectRepository for FakeProjectRepository {
    async fn create(&self, _project: CreateProject) -> Result<Project> {
        unimplemented!("not exercised by these tests")
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.projects.lock().unwrap().get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn find_by_webhook_secret(&self, secret: &str) -> Result<Option<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .find(|p| p.webhook_secret == secret)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Project>> {
        Ok(self.projects.lock().unwrap().values().cloned().collect())
    }

    async fn update(&self, id: &str, project: Project) -> Result<Project> {
        self.projects
            .lock()
            .unwrap()
            .insert(id.to_string(), project.clone());
        Ok(project)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.projects.lock().unwrap().remove(id);
        Ok(())
    }

    async fn next_base_port(&self, start_at: i64) -> Result<i64> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .map(|p| p.base_port + 2)
            .max()
            .unwrap_or(start_at))
    }
}

#[derive(Default)]
pub struct FakeDeploymentRepository {
    deployments: Mutex<Vec<Deployment>>,
    projects: Mutex<HashMap<String, Project>>,
}

impl FakeDeploymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, deployment: Deployment) {
        self.deployments.lock().unwrap().push(deployment);
    }

    pub fn snapshot(&self) -> Vec<Deployment> {
        self.deployments.lock().unwrap().clone()
    }

    /// Registers the project a deployment belongs to, so
    /// `find_all_active_with_projects` can join them the way the real
    /// SQL-backed repository does.
    pub fn link_project(&self, project: Project) {
        self.projects
            .lock()
            .unwrap()
            .insert(project.id.clone(), project);
    }
}

#[async_trait]
impl DeploymentRepository for FakeDeploymentRepository {
    async fn create(&self, deployment: Deployment) -> Result<Deployment> {
        self.deployments.lock().unwrap().push(deployment.clone());
        Ok(deployment)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Deployment>> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn find_active_for_project(&self, project_id: &str) -> Result<Option<Deployment>> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.project_id == project_id && d.status == DeploymentStatus::Active)
            .cloned())
    }

    async fn find_deploying_for_project(&self, project_id: &str) -> Result<Option<Deployment>> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.project_id == project_id && d.status == DeploymentStatus::Deploying)
            .cloned())
    }

    async fn find_previous_for_project(
        &self,
        project_id: &str,
        current_version: i64,
    ) -> Result<Option<Deployment>> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| {
                d.project_id == project_id
                    && d.status == DeploymentStatus::RolledBack
                    && d.version < current_version
            })
            .max_by_key(|d| d.version)
            .cloned())
    }

    async fn find_all_for_project(&self, project_id: &str) -> Result<Vec<Deployment>> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn find_all_deploying(&self) -> Result<Vec<Deployment>> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.status == DeploymentStatus::Deploying)
            .cloned()
            .collect())
    }

    async fn find_all_active_with_projects(&self) -> Result<Vec<(Deployment, Project)>> {
        let projects = self.projects.lock().unwrap();
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.status == DeploymentStatus::Active)
            .filter_map(|d| projects.get(&d.project_id).map(|p| (d.clone(), p.clone())))
            .collect())
    }

    async fn next_version_for_project(&self, project_id: &str) -> Result<i64> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.project_id == project_id)
            .map(|d| d.version)
            .max()
            .unwrap_or(0)
            + 1)
    }

    async fn update_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let mut deployments = self.deployments.lock().unwrap();
        if let Some(d) = deployments.iter_mut().find(|d| d.id == id) {
            d.status = status;
            d.error_message = error_message;
            d.updated_at = Utc::now();
        }
        Ok(())
    }
}

pub fn make_deployment(
    id: &str,
    project_id: &str,
    version: i64,
    color: Color,
    status: DeploymentStatus,
) -> Deployment {
    let now = Utc::now();
    Deployment {
        id: id.to_string(),
        project_id: project_id.to_string(),
        version,
        color,
        port: 4000,
        container_name: format!("{}-{}", project_id, color.lower()),
        image_tag: format!("versiongate-{}:{}", project_id, version),
        status,
        error_message: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct FakeContainerRuntime {
    running: Mutex<HashMap<String, bool>>,
    pub fail_build: Mutex<bool>,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, name: &str, running: bool) {
        self.running
            .lock()
            .unwrap()
            .insert(name.to_string(), running);
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn build_image(&self, _tag: &str, _context_dir: &std::path::Path) -> Result<()> {
        if *self.fail_build.lock().unwrap() {
            return Err(VersionGateError::ImageBuild("fake build failure".to_string()));
        }
        Ok(())
    }

    async fn run_container(
        &self,
        name: &str,
        _tag: &str,
        _host_port: i64,
        _container_port: i64,
        _network_name: &str,
        _env: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.set_running(name, true);
        Ok(())
    }

    async fn stop_container(&self, name: &str) {
        self.set_running(name, false);
    }

    async fn remove_container(&self, name: &str) {
        self.running.lock().unwrap().remove(name);
    }

    async fn inspect_running(&self, name: &str) -> bool {
        *self.running.lock().unwrap().get(name).unwrap_or(&false)
    }

    async fn get_logs(&self, _name: &str, _tail_lines: usize) -> Result<String> {
        Ok(String::new())
    }

    async fn get_stats(&self, _name: &str) -> Result<ContainerStats> {
        Ok(ContainerStats {
            cpu_pct: 0.0,
            mem_used_bytes: 0,
            mem_limit_bytes: 0,
            mem_pct: 0.0,
            net_in: 0,
            net_out: 0,
            pids: 0,
        })
    }

    async fn free_host_port(&self, _port: i64) {}
}

pub struct FakeSourceFetcher;

#[async_trait]
impl SourceFetcher for FakeSourceFetcher {
    async fn prepare_source(&self, _project: &Project) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTrafficSwitcher {
    pub last_port: Mutex<Option<i64>>,
}

#[async_trait]
impl TrafficSwitcher for FakeTrafficSwitcher {
    async fn point_upstream_at(&self, host_port: i64) -> Result<()> {
        *self.last_port.lock().unwrap() = Some(host_port);
        Ok(())
    }
}

enum FakeProbeResponse {
    Success(f64),
    Failure,
}

/// Queue of canned responses for `DeploymentValidator`'s HTTP attempts.
/// Once the queue drains, further calls fail, matching a container that
/// never comes healthy rather than panicking the test.
#[derive(Default)]
pub struct FakeHealthProbe {
    responses: Mutex<VecDeque<FakeProbeResponse>>,
    calls: Mutex<usize>,
}

impl FakeHealthProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_success(&self, latency_ms: f64) {
        self.responses
            .lock()
            .unwrap()
            .push_back(FakeProbeResponse::Success(latency_ms));
    }

    pub fn push_failure(&self) {
        self.responses.lock().unwrap().push_back(FakeProbeResponse::Failure);
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl HealthProbe for FakeHealthProbe {
    async fn probe(&self, _url: &str) -> std::result::Result<ProbeResult, String> {
        *self.calls.lock().unwrap() += 1;
        match self.responses.lock().unwrap().pop_front() {
            Some(FakeProbeResponse::Success(latency_ms)) => Ok(ProbeResult {
                success: true,
                latency_ms,
            }),
            Some(FakeProbeResponse::Failure) | None => Err("simulated probe failure".to_string()),
        }
    }
}
