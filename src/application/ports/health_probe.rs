use async_trait::async_trait;

/// Outcome of one health-endpoint GET: whether the response was a
/// success/redirect status and how long it took.
pub struct ProbeResult {
    pub success: bool,
    pub latency_ms: f64,
}

/// Single HTTP attempt against a deployed container's health endpoint.
/// Kept behind a trait, rather than a `reqwest::Client` field directly
/// on `DeploymentValidator`, so the retry/latency policy can be tested
/// without opening a real socket.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResult, String>;
}
