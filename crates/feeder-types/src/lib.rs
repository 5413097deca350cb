//! feeder-types: bus message model shared across the workspace.
//!
//! Every payload on the bus is a JSON object with a mandatory `type`
//! discriminator: `command`, `ack`, `event`, or `telemetry`. Commands are
//! decoded by the router; this crate owns the outbound shapes.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// RFC3339 timestamp in device-local time, used in telemetry and events.
pub fn now_iso() -> String {
    Local::now().to_rfc3339()
}

/// Outcome of a handled command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

impl AckStatus {
    fn as_str(self) -> &'static str {
        match self {
            AckStatus::Ok => "ok",
            AckStatus::Error => "error",
        }
    }
}

/// Direct reply to a single inbound command. Exactly one ack is produced
/// per received command, correlated by command name.
#[derive(Debug, Clone)]
pub struct Ack {
    pub command: String,
    pub status: AckStatus,
    pub extra: Map<String, Value>,
}

impl Ack {
    pub fn ok(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            status: AckStatus::Ok,
            extra: Map::new(),
        }
    }

    pub fn error(command: impl Into<String>, message: impl Into<String>) -> Self {
        let mut ack = Self {
            command: command.into(),
            status: AckStatus::Error,
            extra: Map::new(),
        };
        ack.extra.insert("error".into(), Value::String(message.into()));
        ack
    }

    /// Attach an extra field (echoed job, id, jobs list).
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn into_payload(self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String("ack".into()));
        obj.insert("command".into(), Value::String(self.command));
        obj.insert("status".into(), Value::String(self.status.as_str().into()));
        obj.extend(self.extra);
        Value::Object(obj)
    }
}

/// Severity of an unsolicited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    fn as_str(self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warn => "warn",
            EventLevel::Error => "error",
        }
    }
}

/// Unsolicited notification describing something that happened
/// asynchronously (a fire, an alarm transition). Events are not replies;
/// nothing awaits them.
#[derive(Debug, Clone)]
pub struct Event {
    pub level: EventLevel,
    pub code: String,
    pub msg: String,
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn new(level: EventLevel, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            level,
            code: code.into(),
            msg: msg.into(),
            extra: Map::new(),
        }
    }

    pub fn info(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(EventLevel::Info, code, msg)
    }

    pub fn warn(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(EventLevel::Warn, code, msg)
    }

    pub fn error(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(EventLevel::Error, code, msg)
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn into_payload(self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String("event".into()));
        obj.insert("level".into(), Value::String(self.level.as_str().into()));
        obj.insert("code".into(), Value::String(self.code));
        obj.insert("msg".into(), Value::String(self.msg));
        obj.extend(self.extra);
        Value::Object(obj)
    }
}

/// Build a telemetry payload for the given device and sensor readings.
pub fn telemetry(device_id: &str, sensors: Value) -> Value {
    json!({
        "type": "telemetry",
        "ts": now_iso(),
        "device_id": device_id,
        "sensors": sensors,
    })
}
