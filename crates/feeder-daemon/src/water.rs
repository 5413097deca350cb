//! Water-level monitoring: telemetry plus a latched low-water alarm.
//!
//! The alarm uses hysteresis — on below `min_water_level_pct`, off at
//! `threshold_clear_pct` (default low + 5) — so a level hovering at the
//! threshold doesn't chatter.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use feeder_bus::Bus;
use feeder_config::Settings;
use feeder_hw::{AlarmLine, WaterLevelSensor};
use feeder_types::{Event, now_iso, telemetry};

pub struct WaterLevelService {
    bus: Arc<Bus>,
    sensor: Arc<dyn WaterLevelSensor>,
    alarm: AlarmLine,
    device_id: String,
    enabled: bool,
    interval: Duration,
    threshold_low: f64,
    threshold_clear: f64,
}

impl WaterLevelService {
    pub fn new(settings: &Settings, bus: Arc<Bus>, sensor: Arc<dyn WaterLevelSensor>) -> Self {
        let cfg = &settings.sensors.water_level;
        let threshold_low = settings.thresholds.min_water_level_pct;
        Self {
            bus,
            sensor,
            alarm: AlarmLine::new(settings.pins.buzzer_led),
            device_id: settings.device.id.clone(),
            enabled: cfg.enabled,
            interval: Duration::from_millis(cfg.poll_interval_ms),
            threshold_low,
            threshold_clear: cfg.threshold_clear_pct.unwrap_or(threshold_low + 5.0),
        }
    }

    async fn tick(&self) {
        let reading = self.sensor.read_pct();

        if let Some(level) = reading.level_pct {
            if !self.alarm.is_on() && level < self.threshold_low {
                self.alarm.set(true);
                self.bus
                    .publish(
                        Event::warn("WATER_LOW", "Water level below threshold")
                            .with("ts", json!(now_iso()))
                            .with("device_id", json!(self.device_id))
                            .with("reading", reading.to_json())
                            .with("threshold_low", json!(self.threshold_low))
                            .into_payload(),
                    )
                    .await;
            } else if self.alarm.is_on() && level >= self.threshold_clear {
                self.alarm.set(false);
                self.bus
                    .publish(
                        Event::info("WATER_OK", "Water level recovered")
                            .with("ts", json!(now_iso()))
                            .with("device_id", json!(self.device_id))
                            .with("reading", reading.to_json())
                            .with("threshold_clear", json!(self.threshold_clear))
                            .into_payload(),
                    )
                    .await;
            }
        }

        self.bus
            .publish(telemetry(
                &self.device_id,
                json!({ "water": reading.to_json() }),
            ))
            .await;
    }

    pub async fn run(&self, cancel: CancellationToken) {
        if !self.enabled {
            info!("Water level service disabled; not starting");
            return;
        }
        info!("Water level service started");
        loop {
            self.tick().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Water level service stopped");
    }
}
