use async_trait::async_trait;

/// Output of an external process, combined stdout+stderr in the order the
/// child wrote it, preserved verbatim so build/tool failures surface to
/// callers without re-interpretation.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub combined_output: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub timeout_ms: Option<u64>,
    pub max_output_bytes: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            timeout_ms: None,
            max_output_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("command {command} failed: {combined_output}")]
pub struct ExecError {
    pub command: String,
    pub combined_output: String,
}

/// Launches external programs with arguments passed without shell
/// interpretation, capturing combined output and enforcing timeout/size
/// limits. Every other adapter (container runtime, source fetcher) is a
/// thin wrapper around this.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<ProcessOutput, ExecError>;

    async fn run_in(
        &self,
        dir: &std::path::Path,
        command: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<ProcessOutput, ExecError>;
}
