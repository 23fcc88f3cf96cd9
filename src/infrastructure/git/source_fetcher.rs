use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::application::ports::process_runner::{ProcessRunner, RunOptions};
use crate::application::ports::source_fetcher::SourceFetcher;
use crate::db::models::Project;
use crate::error::{Result, VersionGateError};

pub struct GitSourceFetcher {
    process_runner: Arc<dyn ProcessRunner>,
}

impl GitSourceFetcher {
    pub fn new(process_runner: Arc<dyn ProcessRunner>) -> Self {
        Self { process_runner }
    }
}

#[async_trait]
impl SourceFetcher for GitSourceFetcher {
    async fn prepare_source(&self, project: &Project) -> Result<()> {
        if !project.repo_url.starts_with("https://") {
            return Err(VersionGateError::SourceFetch(format!(
                "repo URL must use https: {}",
                project.repo_url
            )));
        }

        let dir = Path::new(&project.local_path);
        let is_repo = dir.join(".git").exists();

        if !is_repo {
            info!(project = %project.name, "cloning repository");
            tokio::fs::create_dir_all(dir.parent().unwrap_or(Path::new("/")))
                .await
                .ok();
            let dir_str = dir.to_string_lossy().to_string();
            let output = self
                .process_runner
                .run(
                    "git",
                    &[
                        "clone",
                        "--branch",
                        &project.branch,
                        "--single-branch",
                        &project.repo_url,
                        &dir_str,
                    ],
                    RunOptions::default(),
                )
                .await
                .map_err(|e| VersionGateError::SourceFetch(e.combined_output))?;
            if output.exit_code != 0 {
                return Err(VersionGateError::SourceFetch(output.combined_output));
            }
        } else {
            info!(project = %project.name, "fetching and resetting repository");
            let origin_branch = format!("origin/{}", project.branch);

            let fetch = self
                .process_runner
                .run_in(dir, "git", &["fetch", "origin"], RunOptions::default())
                .await
                .map_err(|e| VersionGateError::SourceFetch(e.combined_output))?;
            if fetch.exit_code != 0 {
                return Err(VersionGateError::SourceFetch(fetch.combined_output));
            }

            let reset = self
                .process_runner
                .run_in(
                    dir,
                    "git",
                    &["reset", "--hard", &origin_branch],
                    RunOptions::default(),
                )
                .await
                .map_err(|e| VersionGateError::SourceFetch(e.combined_output))?;
            if reset.exit_code != 0 {
                return Err(VersionGateError::SourceFetch(reset.combined_output));
            }
        }

        Ok(())
    }
}
