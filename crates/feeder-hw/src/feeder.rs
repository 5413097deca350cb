//! The feed actuator: one bounded dispense motion.

use std::sync::Arc;

use tracing::info;

use crate::servo::Servo;

pub struct Feeder {
    servo: Arc<dyn Servo>,
}

impl Feeder {
    pub fn new(servo: Arc<dyn Servo>) -> Self {
        Self { servo }
    }

    /// Dispense one small portion: sweep 0 → 90 → 0. Returns once the
    /// motion completes, or propagates the actuator failure.
    pub async fn dispense_small(&self) -> anyhow::Result<()> {
        info!("Feeder: dispensing");
        self.servo.move_to(0.0).await?;
        self.servo.move_to(90.0).await?;
        self.servo.move_to(0.0).await?;
        info!("Feeder: done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::servo::MockServo;

    struct CountingServo(AtomicU32);

    #[async_trait::async_trait]
    impl Servo for CountingServo {
        async fn move_to(&self, _angle: f64) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispense_is_a_bounded_sweep() {
        let servo = Arc::new(CountingServo(AtomicU32::new(0)));
        let feeder = Feeder::new(servo.clone());
        feeder.dispense_small().await.unwrap();
        assert_eq!(servo.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dispense_with_mock_servo_completes() {
        let feeder = Feeder::new(Arc::new(MockServo::new(12)));
        feeder.dispense_small().await.unwrap();
    }
}
