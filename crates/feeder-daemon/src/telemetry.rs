//! Periodic environment telemetry. Best-effort: a failed sensor read just
//! produces a sparser payload.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::info;

use feeder_bus::Bus;
use feeder_config::Settings;
use feeder_hw::ClimateSensor;
use feeder_types::telemetry;

pub struct TelemetryService {
    bus: Arc<Bus>,
    sensor: Arc<dyn ClimateSensor>,
    device_id: String,
    interval: Duration,
}

impl TelemetryService {
    pub fn new(settings: &Settings, bus: Arc<Bus>, sensor: Arc<dyn ClimateSensor>) -> Self {
        Self {
            bus,
            sensor,
            device_id: settings.device.id.clone(),
            interval: Duration::from_millis(settings.device.poll_interval_ms),
        }
    }

    async fn tick(&self) {
        let (temperature, humidity) = self.sensor.read();
        let mut environment = Map::new();
        if let Some(t) = temperature {
            environment.insert("temperature_c".into(), json!(t));
        }
        if let Some(h) = humidity {
            environment.insert("humidity_pct".into(), json!(h));
        }
        let payload = telemetry(
            &self.device_id,
            json!({ "environment": Value::Object(environment) }),
        );
        self.bus.publish(payload).await;
    }

    pub async fn run(&self, cancel: CancellationToken) {
        info!("Telemetry service started");
        loop {
            self.tick().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Telemetry service stopped");
    }
}
