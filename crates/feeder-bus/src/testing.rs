//! In-memory transport for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use crate::transport::Transport;

/// Scriptable [`Transport`]: feeds queued inbound messages and records
/// everything published.
#[derive(Default)]
pub struct MemoryTransport {
    inbound: Mutex<VecDeque<Value>>,
    published: Mutex<Vec<Value>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for a later `recv`.
    pub fn push_inbound(&self, msg: Value) {
        self.inbound.lock().unwrap().push_back(msg);
    }

    /// Everything published so far.
    pub fn published(&self) -> Vec<Value> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn start(&self) {}

    async fn stop(&self) {}

    async fn publish(&self, payload: &Value) -> anyhow::Result<()> {
        self.published.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn recv(&self) -> Option<Value> {
        let msg = self.inbound.lock().unwrap().pop_front();
        if msg.is_none() {
            // Short pause so empty-queue polling in tests doesn't spin.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        msg
    }
}
