use async_trait::async_trait;
use bollard::container::{
    Config, InspectContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StopContainerOptions,
};
use bollard::models::{PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::ports::container_runtime::{ContainerRuntime, ContainerStats};
use crate::application::ports::process_runner::{ProcessRunner, RunOptions};
use crate::error::{Result, VersionGateError};

/// Container lifecycle operations against the local Docker daemon. Built
/// directly from `bollard`, the same way the Docker-facing code this
/// project grew out of wraps every container operation.
pub struct BollardContainerRuntime {
    docker: Docker,
    process_runner: Arc<dyn ProcessRunner>,
}

impl BollardContainerRuntime {
    pub fn connect(process_runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| VersionGateError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            docker,
            process_runner,
        })
    }
}

#[async_trait]
impl ContainerRuntime for BollardContainerRuntime {
    async fn build_image(&self, tag: &str, context_dir: &Path) -> Result<()> {
        info!(tag, ?context_dir, "building image");
        let context = context_dir.to_string_lossy().to_string();
        let output = self
            .process_runner
            .run(
                "docker",
                &["build", "-t", tag, &context],
                RunOptions {
                    timeout_ms: Some(30 * 60 * 1000),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| VersionGateError::ImageBuild(e.combined_output))?;

        if output.exit_code != 0 {
            return Err(VersionGateError::ImageBuild(output.combined_output));
        }
        Ok(())
    }

    async fn run_container(
        &self,
        name: &str,
        tag: &str,
        host_port: i64,
        container_port: i64,
        network_name: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        let container_port_key = format!("{}/tcp", container_port);

        let mut port_bindings = std::collections::HashMap::new();
        port_bindings.insert(
            container_port_key.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(host_port.to_string()),
            }]),
        );

        let mut exposed_ports = std::collections::HashMap::new();
        exposed_ports.insert(container_port_key, std::collections::HashMap::new());

        let env_list: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();

        let config = Config {
            image: Some(tag.to_string()),
            env: Some(env_list),
            exposed_ports: Some(exposed_ports),
            host_config: Some(bollard::models::HostConfig {
                port_bindings: Some(port_bindings),
                restart_policy: Some(RestartPolicy {
                    name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                    ..Default::default()
                }),
                network_mode: Some(network_name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container(
                Some(bollard::container::CreateContainerOptions {
                    name: name.to_string(),
                    ..Default::default()
                }),
                config,
            )
            .await
            .map_err(|e| VersionGateError::ContainerLaunch(e.to_string()))?;

        self.docker
            .start_container(
                &container.id,
                None::<bollard::container::StartContainerOptions<String>>,
            )
            .await
            .map_err(|e| {
                VersionGateError::ContainerLaunch(format!(
                    "failed to start container {}: {}",
                    name, e
                ))
            })?;

        Ok(())
    }

    async fn stop_container(&self, name: &str) {
        if let Err(e) = self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: 10 }))
            .await
        {
            warn!(name, error = %e, "stop_container failed (may already be stopped)");
        }
    }

    async fn remove_container(&self, name: &str) {
        if let Err(e) = self
            .docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            warn!(name, error = %e, "remove_container failed (may already be removed)");
        }
    }

    async fn inspect_running(&self, name: &str) -> bool {
        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => info.state.and_then(|s| s.running).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn get_logs(&self, name: &str, tail_lines: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail_lines.to_string(),
            timestamps: true,
            ..Default::default()
        };

        let mut stream = self.docker.logs(name, Some(options));
        let mut lines = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message } | LogOutput::StdErr { message }) => {
                    lines.push(String::from_utf8_lossy(&message).to_string());
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(name, error = %e, "error reading container logs");
                    break;
                }
            }
        }
        Ok(lines.join(""))
    }

    async fn get_stats(&self, name: &str) -> Result<ContainerStats> {
        let mut stream = self.docker.stats(
            name,
            Some(bollard::container::StatsOptions {
                stream: false,
                ..Default::default()
            }),
        );

        let stats = stream
            .next()
            .await
            .ok_or_else(|| VersionGateError::NotFound(format!("no stats for {}", name)))?
            .map_err(|e| VersionGateError::Internal(anyhow::anyhow!(e)))?;

        let cpu_delta = stats.cpu_stats.cpu_usage.total_usage as f64
            - stats.precpu_stats.cpu_usage.total_usage as f64;
        let system_delta = stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
            - stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
        let online_cpus = stats.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;
        let cpu_pct = if system_delta > 0.0 && cpu_delta > 0.0 {
            (cpu_delta / system_delta) * online_cpus * 100.0
        } else {
            0.0
        };

        let mem_used = stats.memory_stats.usage.unwrap_or(0);
        let mem_limit = stats.memory_stats.limit.unwrap_or(1).max(1);
        let mem_pct = (mem_used as f64 / mem_limit as f64) * 100.0;

        let (net_in, net_out) = stats
            .networks
            .as_ref()
            .map(|nets| {
                nets.values().fold((0u64, 0u64), |(rx, tx), n| {
                    (rx + n.rx_bytes, tx + n.tx_bytes)
                })
            })
            .unwrap_or((0, 0));

        let pids = stats.pids_stats.current.unwrap_or(0);

        Ok(ContainerStats {
            cpu_pct,
            mem_used_bytes: mem_used,
            mem_limit_bytes: mem_limit,
            mem_pct,
            net_in,
            net_out,
            pids,
        })
    }

    async fn free_host_port(&self, port: i64) {
        let containers = match self
            .docker
            .list_containers(None::<ListContainersOptions<String>>)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(port, error = %e, "could not list containers to free port");
                return;
            }
        };

        let published = format!(":{}", port);
        for c in containers {
            let binds_port = c
                .ports
                .unwrap_or_default()
                .iter()
                .any(|p| p.public_port.map(|pp| pp as i64) == Some(port));
            if binds_port {
                if let Some(id) = c.id {
                    warn!(port, container = %id, binding = %published, "freeing stale port binding");
                    self.stop_container(&id).await;
                    self.remove_container(&id).await;
                }
            }
        }
    }
}
