//! feeder-config: TOML settings for the feeder daemon.
//!
//! Settings live in `config/settings.toml`, with `config/settings.local.toml`
//! taking precedence when present. String values of the form `env:NAME` are
//! replaced by the environment variable `NAME` at load time so secrets stay
//! out of the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SEARCH_PATHS: &[&str] = &["config/settings.local.toml", "config/settings.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("No settings file found at {}", .0.display())]
    NoConfigFound(PathBuf),
}

/// Device identity and global behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_device_id")]
    pub id: String,
    /// Run sensors/actuators in mock mode (no hardware access).
    #[serde(default)]
    pub mock_mode: bool,
    /// Telemetry poll interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_device_id() -> String {
    "pi-feeder-01".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            id: default_device_id(),
            mock_mode: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Pub/sub transport settings. No `url` means the bus runs with the
/// silent no-op transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe_key: Option<String>,
    /// Client identity on the channel; defaults to the device id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "smart-feeder-main".to_string()
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            url: None,
            publish_key: None,
            subscribe_key: None,
            uuid: None,
            channel: default_channel(),
        }
    }
}

/// GPIO pin assignments (BCM numbering).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinSettings {
    #[serde(default = "default_servo_feed")]
    pub servo_feed: u8,
    #[serde(default = "default_dht22_data")]
    pub dht22_data: u8,
    #[serde(default = "default_buzzer_led")]
    pub buzzer_led: u8,
}

fn default_servo_feed() -> u8 {
    12
}

fn default_dht22_data() -> u8 {
    4
}

fn default_buzzer_led() -> u8 {
    26
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            servo_feed: default_servo_feed(),
            dht22_data: default_dht22_data(),
            buzzer_led: default_buzzer_led(),
        }
    }
}

/// Alarm thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSettings {
    #[serde(default = "default_min_water_level_pct")]
    pub min_water_level_pct: f64,
}

fn default_min_water_level_pct() -> f64 {
    30.0
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            min_water_level_pct: default_min_water_level_pct(),
        }
    }
}

/// Analog water-level sensor settings (ADS1115 on I2C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterLevelSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Alarm clears when the level rises to this value; defaults to
    /// `min_water_level_pct + 5` (hysteresis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_clear_pct: Option<f64>,
    #[serde(default = "default_adc_channel")]
    pub channel: String,
    #[serde(default = "default_i2c_addr")]
    pub i2c_addr: u16,
    #[serde(default = "default_gain")]
    pub gain: u8,
    #[serde(default)]
    pub min_adc: u32,
    #[serde(default = "default_max_adc")]
    pub max_adc: u32,
}

fn default_adc_channel() -> String {
    "A3".to_string()
}

fn default_i2c_addr() -> u16 {
    0x48
}

fn default_gain() -> u8 {
    1
}

fn default_max_adc() -> u32 {
    65535
}

impl Default for WaterLevelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: default_poll_interval_ms(),
            threshold_clear_pct: None,
            channel: default_adc_channel(),
            i2c_addr: default_i2c_addr(),
            gain: default_gain(),
            min_adc: 0,
            max_adc: default_max_adc(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorSettings {
    #[serde(default)]
    pub water_level: WaterLevelSettings,
}

/// Top-level feederd settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub bus: BusSettings,
    #[serde(default)]
    pub pins: PinSettings,
    #[serde(default)]
    pub thresholds: ThresholdSettings,
    #[serde(default)]
    pub sensors: SensorSettings,
    /// Durable schedule store, rewritten in full on every mutation.
    #[serde(default = "default_schedule_path")]
    pub schedule_path: PathBuf,
}

fn default_schedule_path() -> PathBuf {
    PathBuf::from("data/schedules.json")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: DeviceSettings::default(),
            bus: BusSettings::default(),
            pins: PinSettings::default(),
            thresholds: ThresholdSettings::default(),
            sensors: SensorSettings::default(),
            schedule_path: default_schedule_path(),
        }
    }
}

/// Replace `env:NAME` string values with the environment variable `NAME`.
/// Recurses through tables and arrays; non-matching strings pass through.
fn resolve_env(value: toml::Value) -> Result<toml::Value, ConfigError> {
    match value {
        toml::Value::String(s) => match s.strip_prefix("env:") {
            Some(name) if is_env_name(name) => std::env::var(name)
                .map(toml::Value::String)
                .map_err(|_| ConfigError::MissingEnv(name.to_string())),
            _ => Ok(toml::Value::String(s)),
        },
        toml::Value::Table(table) => table
            .into_iter()
            .map(|(k, v)| Ok((k, resolve_env(v)?)))
            .collect::<Result<_, ConfigError>>()
            .map(toml::Value::Table),
        toml::Value::Array(items) => items
            .into_iter()
            .map(resolve_env)
            .collect::<Result<_, ConfigError>>()
            .map(toml::Value::Array),
        other => Ok(other),
    }
}

fn is_env_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Load settings from an explicit path, or from the default search path
/// when none is given. A missing file is `ConfigError::NoConfigFound` so an
/// operator typo never starts the daemon on defaults. Loads `.env` first if
/// present.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    if let Some(path) = path {
        return load_settings_from(path);
    }
    for candidate in SEARCH_PATHS {
        let candidate = Path::new(candidate);
        if candidate.exists() {
            return load_settings_from(candidate);
        }
    }
    Err(ConfigError::NoConfigFound(PathBuf::from(SEARCH_PATHS[1])))
}

/// Load settings from a specific path.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NoConfigFound(path.to_path_buf()));
    }
    tracing::debug!("Loading settings from {}", path.display());
    let raw = std::fs::read_to_string(path)?;
    let value: toml::Value = raw.parse()?;
    let resolved = resolve_env(value)?;
    let settings: Settings = resolved.try_into()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_error() {
        let err = load_settings_from(Path::new("/nonexistent/settings.toml")).unwrap_err();
        assert!(
            matches!(err, ConfigError::NoConfigFound(ref p) if p == Path::new("/nonexistent/settings.toml"))
        );
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.device.id, "pi-feeder-01");
        assert_eq!(settings.bus.channel, "smart-feeder-main");
        assert!(settings.bus.url.is_none());
        assert_eq!(settings.schedule_path, PathBuf::from("data/schedules.json"));
    }

    #[test]
    fn test_parse_full_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
            schedule_path = "data/test-schedules.json"

            [device]
            id = "bench-feeder"
            mock_mode = true
            poll_interval_ms = 500

            [bus]
            channel = "bench-channel"

            [sensors.water_level]
            enabled = true
            min_adc = 100
            max_adc = 5000
            "#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.device.id, "bench-feeder");
        assert!(settings.device.mock_mode);
        assert_eq!(settings.bus.channel, "bench-channel");
        assert!(settings.sensors.water_level.enabled);
        assert_eq!(settings.sensors.water_level.max_adc, 5000);
        // Untouched tables keep their defaults.
        assert_eq!(settings.pins.servo_feed, 12);
        assert_eq!(settings.thresholds.min_water_level_pct, 30.0);
    }

    #[test]
    fn test_env_indirection() {
        // SAFETY: tests in this module that read the environment use
        // distinct variable names.
        unsafe { std::env::set_var("FEEDER_TEST_SUB_KEY", "sub-123") };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
            [bus]
            url = "wss://bus.example/feeder"
            subscribe_key = "env:FEEDER_TEST_SUB_KEY"
            "#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.bus.subscribe_key.as_deref(), Some("sub-123"));
    }

    #[test]
    fn test_missing_env_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
            [bus]
            publish_key = "env:FEEDER_TEST_NO_SUCH_VAR"
            "#,
        )
        .unwrap();

        let err = load_settings_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(name) if name == "FEEDER_TEST_NO_SUCH_VAR"));
    }

    #[test]
    fn test_non_matching_env_string_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
            [device]
            id = "env:lowercase-is-not-a-ref"
            "#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.device.id, "env:lowercase-is-not-a-ref");
    }
}
