//! Analog water-level sensor (ADS1115-class ADC).

use serde_json::{Value, json};

/// One water-level sample. Absent fields mean the read failed.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct WaterReading {
    pub raw: Option<u32>,
    pub voltage: Option<f64>,
    pub level_pct: Option<f64>,
}

impl WaterReading {
    pub fn to_json(&self) -> Value {
        json!({
            "raw": self.raw,
            "voltage": self.voltage,
            "level_pct": self.level_pct,
        })
    }
}

pub trait WaterLevelSensor: Send + Sync {
    fn read_pct(&self) -> WaterReading;
}

/// Mid-scale constant reading for environments without hardware.
pub struct MockWaterSensor {
    min_adc: u32,
    max_adc: u32,
}

impl MockWaterSensor {
    pub fn new(min_adc: u32, max_adc: u32) -> Self {
        Self { min_adc, max_adc }
    }
}

impl WaterLevelSensor for MockWaterSensor {
    fn read_pct(&self) -> WaterReading {
        let raw = 32768;
        WaterReading {
            raw: Some(raw),
            voltage: Some(2.048),
            level_pct: Some(scale_pct(raw, self.min_adc, self.max_adc)),
        }
    }
}

/// Map a raw ADC count onto 0..=100% of the configured span, clamped.
pub fn scale_pct(raw: u32, min_adc: u32, max_adc: u32) -> f64 {
    let span = max_adc.saturating_sub(min_adc).max(1);
    let pct = (raw.saturating_sub(min_adc)) as f64 / span as f64 * 100.0;
    (pct.clamp(0.0, 100.0) * 10.0).round() / 10.0
}
