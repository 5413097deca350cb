//! Bounded-angle servo abstraction (SG90-class horn on a GPIO pin).

use std::time::Duration;

use tracing::debug;

/// Settle time after a mock move; a real driver waits for the horn.
const SETTLE: Duration = Duration::from_millis(50);

#[async_trait::async_trait]
pub trait Servo: Send + Sync {
    /// Move to `angle` degrees (clamped to 0..=180) and settle.
    async fn move_to(&self, angle: f64) -> anyhow::Result<()>;
}

/// Servo stand-in for environments without hardware.
pub struct MockServo {
    pin: u8,
}

impl MockServo {
    pub fn new(pin: u8) -> Self {
        Self { pin }
    }
}

#[async_trait::async_trait]
impl Servo for MockServo {
    async fn move_to(&self, angle: f64) -> anyhow::Result<()> {
        let angle = angle.clamp(0.0, 180.0);
        debug!(pin = self.pin, angle, "Servo move");
        tokio::time::sleep(SETTLE).await;
        Ok(())
    }
}
