//! feeder-bus: publish/subscribe channel with graceful degradation.
//!
//! The transport is selected once at construction: a configured URL gets the
//! WebSocket transport, anything else gets the silent no-op transport. Call
//! sites never branch on availability — publish always succeeds from the
//! caller's point of view, and `next_command` simply yields nothing while
//! degraded.

pub mod testing;
pub mod transport;
mod ws;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use feeder_config::BusSettings;

pub use transport::{NoopTransport, Transport};
pub use ws::WsTransport;

/// The pub/sub channel facade used by every other component.
pub struct Bus {
    transport: Arc<dyn Transport>,
}

impl Bus {
    /// Pick the transport from settings: WebSocket when a URL is configured,
    /// no-op otherwise.
    pub fn from_settings(settings: &BusSettings) -> Self {
        match &settings.url {
            Some(url) => {
                info!(channel = %settings.channel, "Using WebSocket bus transport");
                Self::with_transport(Arc::new(WsTransport::new(url.clone(), settings)))
            }
            None => {
                warn!("No bus URL configured; using no-op transport");
                Self::with_transport(Arc::new(NoopTransport))
            }
        }
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Establish the subscription. Never raises.
    pub async fn start(&self) {
        self.transport.start().await;
    }

    /// Tear down the subscription. No-op if never started.
    pub async fn stop(&self) {
        self.transport.stop().await;
    }

    /// Send a payload to the channel. Delivery errors are logged and
    /// swallowed; publish never fails the caller.
    pub async fn publish(&self, payload: Value) {
        if let Err(e) = self.transport.publish(&payload).await {
            error!("Bus publish error: {e:#}");
        }
    }

    /// Wait for the next command-typed message. Non-command or malformed
    /// messages are logged and reported as absent so the caller just
    /// retries; a degraded transport reports absent after a bounded pause.
    pub async fn next_command(&self) -> Option<Value> {
        let msg = self.transport.recv().await?;
        match msg.get("type").and_then(Value::as_str) {
            Some("command") => Some(msg),
            Some(other) => {
                debug!(msg_type = other, "Ignoring non-command message");
                None
            }
            None => {
                warn!("Inbound message without a type field");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serde_json::json;

    use super::*;
    use crate::testing::MemoryTransport;

    struct FailingTransport;

    #[async_trait::async_trait]
    impl Transport for FailingTransport {
        async fn start(&self) {}
        async fn stop(&self) {}
        async fn publish(&self, _payload: &Value) -> anyhow::Result<()> {
            anyhow::bail!("delivery failed")
        }
        async fn recv(&self) -> Option<Value> {
            None
        }
    }

    #[tokio::test]
    async fn test_noop_publish_never_fails() {
        let bus = Bus::with_transport(Arc::new(NoopTransport));
        bus.start().await;
        bus.publish(json!({"type": "event", "code": "FEED_DISPENSED"}))
            .await;
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_noop_next_command_absent_after_bounded_wait() {
        let bus = Bus::with_transport(Arc::new(NoopTransport));
        let started = Instant::now();
        assert!(bus.next_command().await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(900));
        // And again, without throwing.
        assert!(bus.next_command().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_swallows_transport_errors() {
        let bus = Bus::with_transport(Arc::new(FailingTransport));
        bus.publish(json!({"type": "ack"})).await;
    }

    #[tokio::test]
    async fn test_next_command_filters_on_type() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push_inbound(json!({"type": "telemetry", "sensors": {}}));
        transport.push_inbound(json!({"no_type": true}));
        transport.push_inbound(json!({"type": "command", "command": "feedNow"}));
        let bus = Bus::with_transport(transport);

        assert!(bus.next_command().await.is_none());
        assert!(bus.next_command().await.is_none());
        let msg = bus.next_command().await.expect("command expected");
        assert_eq!(msg["command"], "feedNow");
    }
}
