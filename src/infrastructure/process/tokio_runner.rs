use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::application::ports::process_runner::{ExecError, ProcessOutput, ProcessRunner, RunOptions};

/// Launches external programs via `tokio::process::Command`, the same
/// primitive the git-checkout and commit-hash steps already use, wrapped
/// once so every caller gets the same timeout/size-limit enforcement.
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        TokioProcessRunner
    }

    async fn exec(
        &self,
        dir: Option<&Path>,
        command: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<ProcessOutput, ExecError> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let command_line = format!("{} {}", command, args.join(" "));

        let child = cmd.spawn().map_err(|e| ExecError {
            command: command_line.clone(),
            combined_output: format!("failed to spawn: {}", e),
        })?;

        let run = async move {
            let output = child.wait_with_output().await.map_err(|e| ExecError {
                command: command_line.clone(),
                combined_output: format!("failed to wait for process: {}", e),
            })?;

            let mut combined = Vec::with_capacity(output.stdout.len() + output.stderr.len());
            combined.extend_from_slice(&output.stdout);
            combined.extend_from_slice(&output.stderr);
            if combined.len() > options.max_output_bytes {
                let start = combined.len() - options.max_output_bytes;
                combined = combined[start..].to_vec();
            }
            let combined_output = String::from_utf8_lossy(&combined).to_string();
            let exit_code = output.status.code().unwrap_or(-1);

            if output.status.success() {
                Ok(ProcessOutput {
                    combined_output,
                    exit_code,
                })
            } else {
                Err(ExecError {
                    command: command_line,
                    combined_output,
                })
            }
        };

        match options.timeout_ms {
            Some(ms) => timeout(Duration::from_millis(ms), run)
                .await
                .map_err(|_| ExecError {
                    command: format!("{} {}", command, args.join(" ")),
                    combined_output: "timed out".to_string(),
                })?,
            None => run.await,
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<ProcessOutput, ExecError> {
        self.exec(None, command, args, options).await
    }

    async fn run_in(
        &self,
        dir: &Path,
        command: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<ProcessOutput, ExecError> {
        self.exec(Some(dir), command, args, options).await
    }
}
