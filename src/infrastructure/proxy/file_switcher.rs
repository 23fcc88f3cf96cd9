use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::application::ports::process_runner::{ProcessRunner, RunOptions};
use crate::application::ports::traffic_switcher::TrafficSwitcher;
use crate::error::{Result, VersionGateError};
use std::sync::Arc;

/// Rewrites the nginx upstream file and reloads the proxy, with a
/// temp-write / backup / atomic-rename protocol so a crash mid-switch
/// never leaves a half-written config file.
pub struct FileTrafficSwitcher {
    config_path: String,
    reload_command: (String, Vec<String>),
    process_runner: Arc<dyn ProcessRunner>,
}

impl FileTrafficSwitcher {
    pub fn new(config_path: String, process_runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            config_path,
            reload_command: ("nginx".to_string(), vec!["-s".to_string(), "reload".to_string()]),
            process_runner,
        }
    }
}

#[async_trait]
impl TrafficSwitcher for FileTrafficSwitcher {
    async fn point_upstream_at(&self, host_port: i64) -> Result<()> {
        let content = format!(
            "upstream versiongate_backend {{\n  server 127.0.0.1:{};\n}}\n",
            host_port
        );

        let tmp_path = format!("{}.tmp", self.config_path);
        let bak_path = format!("{}.bak", self.config_path);

        let mut tmp_file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| VersionGateError::TrafficSwitch(format!("write temp config: {}", e)))?;
        tmp_file
            .write_all(content.as_bytes())
            .await
            .map_err(|e| VersionGateError::TrafficSwitch(format!("write temp config: {}", e)))?;
        tmp_file
            .flush()
            .await
            .map_err(|e| VersionGateError::TrafficSwitch(format!("flush temp config: {}", e)))?;

        let had_existing = fs::metadata(&self.config_path).await.is_ok();
        if had_existing {
            if let Err(e) = fs::copy(&self.config_path, &bak_path).await {
                warn!(error = %e, "failed to back up existing upstream config");
            }
        }

        fs::rename(&tmp_path, &self.config_path)
            .await
            .map_err(|e| VersionGateError::TrafficSwitch(format!("rename config into place: {}", e)))?;

        let (cmd, args) = &self.reload_command;
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let reload = self
            .process_runner
            .run(cmd, &arg_refs, RunOptions::default())
            .await;

        match reload {
            Ok(output) if output.exit_code == 0 => {
                info!(host_port, "traffic switched");
                Ok(())
            }
            Ok(output) => {
                self.restore_backup(had_existing, &bak_path).await;
                Err(VersionGateError::TrafficSwitch(output.combined_output))
            }
            Err(e) => {
                self.restore_backup(had_existing, &bak_path).await;
                Err(VersionGateError::TrafficSwitch(e.combined_output))
            }
        }
    }
}

impl FileTrafficSwitcher {
    async fn restore_backup(&self, had_existing: bool, bak_path: &str) {
        if !had_existing {
            return;
        }
        match fs::copy(bak_path, &self.config_path).await {
            Ok(_) => info!("restored previous upstream config after failed reload"),
            Err(e) => warn!(error = %e, "failed to restore upstream config backup"),
        }
    }
}
