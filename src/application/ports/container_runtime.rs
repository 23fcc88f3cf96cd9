use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerStats {
    pub cpu_pct: f64,
    pub mem_used_bytes: u64,
    pub mem_limit_bytes: u64,
    pub mem_pct: f64,
    pub net_in: u64,
    pub net_out: u64,
    pub pids: u64,
}

/// Thin, testable wrappers around the process runner for each external
/// tool the pipeline touches. Each method is a single call with a fixed
/// argument vector; no business logic lives here.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn build_image(&self, tag: &str, context_dir: &std::path::Path) -> Result<()>;

    async fn run_container(
        &self,
        name: &str,
        tag: &str,
        host_port: i64,
        container_port: i64,
        network_name: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Idempotent; absence of the container is not an error.
    async fn stop_container(&self, name: &str);

    /// Idempotent; absence of the container is not an error.
    async fn remove_container(&self, name: &str);

    /// True iff the container exists and is reported as running. Any
    /// failure (including "no such container") is treated as not running.
    async fn inspect_running(&self, name: &str) -> bool;

    async fn get_logs(&self, name: &str, tail_lines: usize) -> Result<String>;

    async fn get_stats(&self, name: &str) -> Result<ContainerStats>;

    /// Stops/removes whatever container currently binds `port`, so a
    /// stale binding does not block the next launch with "port already
    /// allocated".
    async fn free_host_port(&self, port: i64);
}
