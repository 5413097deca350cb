//! Temperature/humidity sensor (DHT22-class).

use rand::Rng;

pub trait ClimateSensor: Send + Sync {
    /// (temperature °C, relative humidity %). Transient read errors yield
    /// absent values, never a panic.
    fn read(&self) -> (Option<f64>, Option<f64>);
}

/// Plausible jittered readings for environments without hardware.
pub struct MockClimateSensor;

impl ClimateSensor for MockClimateSensor {
    fn read(&self) -> (Option<f64>, Option<f64>) {
        let mut rng = rand::rng();
        let temp = round1(rng.random_range(20.0..28.0));
        let humidity = round1(rng.random_range(35.0..60.0));
        (Some(temp), Some(humidity))
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_readings_are_in_range() {
        let sensor = MockClimateSensor;
        for _ in 0..50 {
            let (t, h) = sensor.read();
            let t = t.unwrap();
            let h = h.unwrap();
            assert!((20.0..=28.0).contains(&t));
            assert!((35.0..=60.0).contains(&h));
        }
    }
}
