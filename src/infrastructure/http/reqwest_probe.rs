use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::health_probe::{HealthProbe, ProbeResult};
use crate::infrastructure::logging::Timer;

const HEALTH_TIMEOUT_MS: u64 = 5000;

pub struct ReqwestHealthProbe {
    client: reqwest::Client,
}

impl ReqwestHealthProbe {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(HEALTH_TIMEOUT_MS))
            .build()
            .expect("reqwest client builds");
        Self { client }
    }
}

impl Default for ReqwestHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for ReqwestHealthProbe {
    async fn probe(&self, url: &str) -> Result<ProbeResult, String> {
        let timer = Timer::start();
        let response = self.client.get(url).send().await;
        let latency_ms = timer.elapsed_ms();

        match response {
            Ok(resp) => Ok(ProbeResult {
                success: resp.status().is_success() || resp.status().is_redirection(),
                latency_ms,
            }),
            Err(e) => Err(e.to_string()),
        }
    }
}
