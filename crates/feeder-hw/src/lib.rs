//! feeder-hw: actuator and sensor collaborators.
//!
//! The core never talks to hardware directly; it goes through the traits in
//! this crate. Real GPIO/I2C drivers plug in behind the same seams — this
//! repo ships the mock implementations used off-device and in tests.

pub mod alarm;
pub mod climate;
pub mod feeder;
pub mod servo;
pub mod water;

pub use alarm::AlarmLine;
pub use climate::{ClimateSensor, MockClimateSensor};
pub use feeder::Feeder;
pub use servo::{MockServo, Servo};
pub use water::{MockWaterSensor, WaterLevelSensor, WaterReading};
