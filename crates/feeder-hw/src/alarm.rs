//! Latched alarm output. Buzzer and LED share one line on the device.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

pub struct AlarmLine {
    pin: u8,
    on: AtomicBool,
}

impl AlarmLine {
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            on: AtomicBool::new(false),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Drive the line; only transitions are logged.
    pub fn set(&self, on: bool) {
        let was = self.on.swap(on, Ordering::SeqCst);
        if on && !was {
            info!(pin = self.pin, "WATER ALERT: buzzer/LED ON");
        } else if !on && was {
            info!(pin = self.pin, "WATER ALERT: buzzer/LED OFF");
        }
    }
}
