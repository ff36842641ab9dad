//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `hausbus.toml` in the working directory (or the file named by
//! `HAUSBUS_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use serde::Deserialize;

use hausbus_domain::address::I2cAddress;
use hausbus_domain::board::BoardKind;
use hausbus_domain::id::DeviceId;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Engine clock settings.
    pub clock: ClockConfig,
    /// Worker pool settings.
    pub scheduler: SchedulerConfig,
    /// I/O boards and their polling.
    pub hardware: HardwareConfig,
    /// Fixed sunrise and sunset.
    pub daylight: DaylightConfig,
    /// Defaults of the installed automations.
    pub automation: AutomationConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Period of the engine tick.
    pub tick_interval_ms: u64,
    /// Offset of local time from UTC, used for time-of-day conditions.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of workers executing due schedules.
    pub workers: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Period of the input board polls.
    pub poll_interval_ms: u64,
    /// A poll slower than this is logged as a warning.
    pub poll_duration_warning_ms: u64,
    pub boards: Vec<BoardConfig>,
}

/// One board on the I2C bus.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    pub id: DeviceId,
    pub kind: BoardKind,
    pub address: I2cAddress,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DaylightConfig {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Delay before a light turned on by motion or a button turns off again.
    pub turn_off_after_secs: u64,
}

impl Config {
    /// Load configuration from `hausbus.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or when the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HAUSBUS_CONFIG").unwrap_or_else(|_| "hausbus.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides looked up through `var`, in increasing precedence.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HAUSBUS_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("HAUSBUS_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("HAUSBUS_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("HAUSBUS_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.clock.tick_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "clock.tick_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.clock.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Validation(format!(
                "clock.utc_offset_minutes {} is not within a day",
                self.clock.utc_offset_minutes
            )));
        }
        if self.scheduler.workers == 0 {
            return Err(ConfigError::Validation(
                "scheduler.workers must be at least 1".to_string(),
            ));
        }
        if self.hardware.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "hardware.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        let mut addresses = HashSet::new();
        for board in &self.hardware.boards {
            if !ids.insert(&board.id) {
                return Err(ConfigError::Validation(format!("board '{}' is listed twice", board.id)));
            }
            if board.address.value() > 0x7F || !addresses.insert(board.address) {
                return Err(ConfigError::Validation(format!(
                    "board '{}' has an invalid or shared address {}",
                    board.id, board.address
                )));
            }
        }
        if self.daylight.sunrise >= self.daylight.sunset {
            return Err(ConfigError::Validation(
                "daylight.sunrise must be before daylight.sunset".to_string(),
            ));
        }
        if self.automation.turn_off_after_secs == 0 {
            return Err(ConfigError::Validation(
                "automation.turn_off_after_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.clock.tick_interval_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.hardware.poll_interval_ms)
    }

    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clock.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// The configured board with `id`.
    #[must_use]
    pub fn board(&self, id: &str) -> Option<&BoardConfig> {
        self.hardware.boards.iter().find(|board| board.id.as_str() == id)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hausbusd=info,hausbus_app=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            utc_offset_minutes: 0,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            poll_duration_warning_ms: 25,
            boards: default_boards(),
        }
    }
}

fn default_boards() -> Vec<BoardConfig> {
    let board = |id: &str, kind, address| {
        DeviceId::new(id).ok().map(|id| BoardConfig {
            id,
            kind,
            address: I2cAddress::new(address),
        })
    };
    [
        board("hallway.inputs", BoardKind::Hspe16InputOnly, 0x20),
        board("hallway.relays", BoardKind::Hsrel5, 0x38),
    ]
    .into_iter()
    .flatten()
    .collect()
}

impl Default for DaylightConfig {
    fn default() -> Self {
        Self {
            sunrise: NaiveTime::from_hms_opt(6, 30, 0).unwrap_or(NaiveTime::MIN),
            sunset: NaiveTime::from_hms_opt(20, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            turn_off_after_secs: 60,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
        assert_eq!(config.scheduler.workers, 4);
        assert_eq!(config.hardware.boards.len(), 2);
        assert_eq!(config.automation.turn_off_after_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.hardware.boards.len(), 2);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [logging]
            filter = 'debug'

            [clock]
            tick_interval_ms = 100
            utc_offset_minutes = 120

            [scheduler]
            workers = 2

            [hardware]
            poll_interval_ms = 20
            poll_duration_warning_ms = 10

            [[hardware.boards]]
            id = 'cellar.relays'
            kind = 'hsrel5'
            address = 0x21

            [daylight]
            sunrise = '07:00:00'
            sunset = '19:15:00'

            [automation]
            turn_off_after_secs = 90
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.clock.tick_interval_ms, 100);
        assert_eq!(config.utc_offset(), FixedOffset::east_opt(7200).unwrap());
        assert_eq!(config.scheduler.workers, 2);
        assert_eq!(config.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.hardware.boards.len(), 1);
        let board = config.board("cellar.relays").unwrap();
        assert_eq!(board.kind, BoardKind::Hsrel5);
        assert_eq!(board.address, I2cAddress::new(0x21));
        assert_eq!(config.daylight.sunset, NaiveTime::from_hms_opt(19, 15, 0).unwrap());
        assert_eq!(config.automation.turn_off_after_secs, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    // ── Overrides ──

    #[test]
    fn should_override_host_and_port_from_env() {
        let mut config = Config::default();

        config.apply_overrides(env(&[("HAUSBUS_HOST", "127.0.0.1"), ("HAUSBUS_PORT", "8080")]));

        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn should_prefer_bind_over_host_and_port() {
        let mut config = Config::default();

        config.apply_overrides(env(&[("HAUSBUS_PORT", "8080"), ("HAUSBUS_BIND", "10.0.0.2:4000")]));

        assert_eq!(config.bind_addr(), "10.0.0.2:4000");
    }

    #[test]
    fn should_prefer_rust_log_over_hausbus_log() {
        let mut config = Config::default();

        config.apply_overrides(env(&[("HAUSBUS_LOG", "warn"), ("RUST_LOG", "trace")]));

        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_ignore_unparsable_port() {
        let mut config = Config::default();

        config.apply_overrides(env(&[("HAUSBUS_PORT", "many")]));

        assert_eq!(config.server.port, 3000);
    }

    // ── Validation ──

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_workers() {
        let mut config = Config::default();
        config.scheduler.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_offset_beyond_one_day() {
        let mut config = Config::default();
        config.clock.utc_offset_minutes = -24 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_duplicate_board_address() {
        let mut config = Config::default();
        let mut twin = config.hardware.boards[0].clone();
        twin.id = DeviceId::new("twin").unwrap();
        config.hardware.boards.push(twin);

        let err = config.validate().unwrap_err();

        assert!(err.to_string().contains("twin"));
    }

    #[test]
    fn should_reject_sunset_before_sunrise() {
        let mut config = Config::default();
        config.daylight.sunset = NaiveTime::from_hms_opt(5, 0, 0).unwrap();
        assert!(config.validate().is_err());
    }
}
