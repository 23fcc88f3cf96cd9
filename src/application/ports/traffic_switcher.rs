use async_trait::async_trait;

use crate::error::Result;

/// Rewrites the reverse-proxy upstream file to point at the given host
/// port and reloads the proxy. Implementations must be crash-safe: a
/// failed switch must leave the previous upstream intact or clearly
/// report the inconsistency, never a half-written config file.
#[async_trait]
pub trait TrafficSwitcher: Send + Sync {
    async fn point_upstream_at(&self, host_port: i64) -> Result<()>;
}
