//! # Configuration Management
//!
//! This module handles loading, parsing and validating the daemon's startup
//! configuration from `status-display.toml`. It is read once before the control
//! loop starts; nothing in the hot loop touches the file again.
//!
//! A missing file is not an error: the defaults describe a stock Raspberry Pi
//! wiring (OLED at 0x3C on `/dev/i2c-1`, buttons on GPIO 27 and 17). A file that
//! exists but cannot be read, parsed or validated is fatal.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Configuration file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_PATH: &str = "status-display.toml";

/// Errors that stop the daemon before the control loop is entered.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or has the wrong shape
    #[error("invalid config format: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parse but violate a startup invariant
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration loaded from status-display.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// OLED panel transport and contrast
    pub display: DisplayConfig,
    /// Button wiring and debounce timing
    pub buttons: ButtonConfig,
    /// Render cadence and per-source budgets
    pub timing: TimingConfig,
    /// Filesystem reported on the storage screen
    pub storage: StorageConfig,
    /// CPU temperature sensor location
    pub temperature: TemperatureConfig,
    /// Power-off command
    pub shutdown: ShutdownConfig,
}

/// Panel contrast presets, mapped onto the SSD1306 brightness levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Brightness {
    Dimmest,
    Dim,
    #[default]
    Normal,
    Bright,
    Brightest,
}

/// OLED panel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// I2C character device the panel hangs off
    pub i2c_bus: String,
    /// 7-bit I2C address (0x3C or 0x3D on common modules)
    pub address: u8,
    /// Contrast preset
    pub brightness: Brightness,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            i2c_bus: "/dev/i2c-1".to_string(),
            address: 0x3C,
            brightness: Brightness::Normal,
        }
    }
}

/// Button wiring. Lines are BCM offsets on the GPIO character device.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ButtonConfig {
    pub gpio_chip: String,
    /// Cycles to the next screen (GPIO27, physical pin 13)
    pub navigate_line: u32,
    /// Starts the power-off sequence (GPIO17, physical pin 11)
    pub shutdown_line: u32,
    /// How long a level must stay active before it counts as a press
    pub debounce_ms: u64,
    /// Raw level sampling period
    pub scan_ms: u64,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            gpio_chip: "/dev/gpiochip0".to_string(),
            navigate_line: 27,
            shutdown_line: 17,
            debounce_ms: 50,
            scan_ms: 10,
        }
    }
}

/// Loop cadence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum interval between two rendered frames
    pub render_tick_ms: u64,
    /// Network screen refresh period (interface state changes slowly)
    pub network_refresh_ms: u64,
    /// Storage screen refresh period
    pub storage_refresh_ms: u64,
    /// How long the "shutting down" notice stays up before power-off
    pub shutdown_notice_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            render_tick_ms: 1_000,
            network_refresh_ms: 10_000,
            storage_refresh_ms: 30_000,
            shutdown_notice_ms: 3_000,
        }
    }
}

impl TimingConfig {
    pub fn render_tick(&self) -> Duration {
        Duration::from_millis(self.render_tick_ms)
    }

    pub fn shutdown_notice(&self) -> Duration {
        Duration::from_millis(self.shutdown_notice_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mount_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mount_path: PathBuf::from("/"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemperatureConfig {
    /// sysfs file holding the SoC temperature in millidegrees Celsius
    pub sysfs_path: PathBuf,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            sysfs_path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
        }
    }
}

/// Power-off command. Needs a NOPASSWD sudoers entry when the daemon is not root.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub command: Vec<String>,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            command: ["sudo", "/sbin/shutdown", "-h", "now"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from status-display.toml in the working directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load and validate configuration from the specified path.
    /// Falls back to the defaults only when the file does not exist.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str::<Config>(&contents)?;
                info!(path = %path.display(), "loaded configuration");
                config
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the startup invariants the control loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        let b = &self.buttons;

        if t.render_tick_ms == 0 {
            return Err(invalid("timing.render_tick_ms must be positive"));
        }
        if b.scan_ms == 0 {
            return Err(invalid("buttons.scan_ms must be positive"));
        }
        // A press must never be missed while a frame is being drawn.
        if b.scan_ms >= t.render_tick_ms {
            return Err(invalid(format!(
                "buttons.scan_ms ({}) must be smaller than timing.render_tick_ms ({})",
                b.scan_ms, t.render_tick_ms
            )));
        }
        if b.debounce_ms == 0 {
            return Err(invalid("buttons.debounce_ms must be positive"));
        }
        for (name, value) in [
            ("network_refresh_ms", t.network_refresh_ms),
            ("storage_refresh_ms", t.storage_refresh_ms),
        ] {
            if value < t.render_tick_ms {
                return Err(invalid(format!(
                    "timing.{name} ({value}) is shorter than timing.render_tick_ms ({})",
                    t.render_tick_ms
                )));
            }
        }
        if b.navigate_line == b.shutdown_line {
            return Err(invalid(format!(
                "navigate and shutdown buttons share GPIO line {}",
                b.navigate_line
            )));
        }
        if self.shutdown.command.is_empty() || self.shutdown.command[0].trim().is_empty() {
            return Err(invalid("shutdown.command must name a program"));
        }
        if self.storage.mount_path.as_os_str().is_empty() {
            return Err(invalid("storage.mount_path must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.address, 0x3C);
        assert_eq!(config.display.i2c_bus, "/dev/i2c-1");
        assert_eq!(config.buttons.navigate_line, 27);
        assert_eq!(config.buttons.shutdown_line, 17);
        assert_eq!(config.timing.render_tick_ms, 1_000);
        assert_eq!(config.storage.mount_path, PathBuf::from("/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.display.address, parsed.display.address);
        assert_eq!(config.shutdown.command, parsed.shutdown.command);
        assert_eq!(config.display.brightness, parsed.display.brightness);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path").unwrap();
        // Should fallback to default
        assert_eq!(config.buttons.shutdown_line, 17);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"
[display]
address = 0x3D
brightness = "dim"

[storage]
mount_path = "/mnt/data"
"#,
        );
        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.display.address, 0x3D);
        assert_eq!(config.display.brightness, Brightness::Dim);
        assert_eq!(config.storage.mount_path, PathBuf::from("/mnt/data"));
        assert_eq!(config.display.i2c_bus, "/dev/i2c-1");
        assert_eq!(config.timing.render_tick_ms, 1_000);
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let file = write_config("[timing\nrender_tick_ms = ");
        assert!(matches!(
            Config::load_from_path(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_read_budget_is_not_configurable() {
        let file = write_config("[timing]\nsource_timeout_ms = 1\nrender_tick_ms = 2000\n");
        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.timing.render_tick_ms, 2_000);
        let toml_str = toml::to_string(&config).unwrap();
        assert!(!toml_str.contains("source_timeout"));
    }

    #[test]
    fn test_zero_tick_rejected() {
        let file = write_config("[timing]\nrender_tick_ms = 0\n");
        assert!(matches!(
            Config::load_from_path(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_scan_must_be_finer_than_tick() {
        let mut config = Config::default();
        config.buttons.scan_ms = config.timing.render_tick_ms;
        assert!(config.validate().is_err());

        config.buttons.scan_ms = config.timing.render_tick_ms - 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refresh_shorter_than_tick_rejected() {
        let mut config = Config::default();
        config.timing.storage_refresh_ms = 500;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage_refresh_ms"));
    }

    #[test]
    fn test_shared_button_line_rejected() {
        let mut config = Config::default();
        config.buttons.navigate_line = config.buttons.shutdown_line;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_shutdown_command_rejected() {
        let mut config = Config::default();
        config.shutdown.command.clear();
        assert!(config.validate().is_err());
    }
}
