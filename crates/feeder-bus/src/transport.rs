//! Transport seam: one real implementation, one silent no-op.

use std::time::Duration;

use serde_json::Value;
use tracing::info;

/// How long `recv` pauses before reporting "nothing" in degraded mode, so
/// callers can poll without spinning.
pub(crate) const DEGRADED_POLL: Duration = Duration::from_secs(1);

/// Raw pub/sub transport. Implementations must be usable through `&self`;
/// keep mutable state behind interior mutability.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Establish the subscription. Never fails the caller; an unreachable
    /// transport logs and stays degraded.
    async fn start(&self);

    /// Tear down the subscription, letting in-flight work settle.
    async fn stop(&self);

    /// Send one payload to the channel.
    async fn publish(&self, payload: &Value) -> anyhow::Result<()>;

    /// Next inbound message, or None after a bounded wait.
    async fn recv(&self) -> Option<Value>;
}

/// Transport used when no bus is configured: publishes go to the log,
/// receives idle. The rest of the system runs unchanged.
pub struct NoopTransport;

#[async_trait::async_trait]
impl Transport for NoopTransport {
    async fn start(&self) {}

    async fn stop(&self) {}

    async fn publish(&self, payload: &Value) -> anyhow::Result<()> {
        info!("[no-op publish] {payload}");
        Ok(())
    }

    async fn recv(&self) -> Option<Value> {
        tokio::time::sleep(DEGRADED_POLL).await;
        None
    }
}
