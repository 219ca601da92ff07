//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values take the defaults
//! of a stock AR.Drone 2.0 reachable at `192.168.1.1`.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::{DroneError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub drone: DroneConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub navdata: NavDataConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub device_config: DeviceConfigConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Drone addressing
#[derive(Debug, Deserialize, Clone)]
pub struct DroneConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_at_port")]
    pub at_port: u16,

    #[serde(default = "default_navdata_port")]
    pub navdata_port: u16,

    #[serde(default = "default_video_port")]
    pub video_port: u16,

    #[serde(default = "default_control_port")]
    pub control_port: u16,
}

/// Command scheduler timing
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// NavData listener settings
#[derive(Debug, Deserialize, Clone)]
pub struct NavDataConfig {
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Video relay settings
#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Device configuration retrieval
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfigConfig {
    #[serde(default = "default_device_config_timeout_ms")]
    pub timeout_ms: u64,
}

/// Telemetry recording
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Diagnostic log output
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file; stdout only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_address() -> String { "192.168.1.1".to_string() }
fn default_at_port() -> u16 { 5556 }
fn default_navdata_port() -> u16 { 5554 }
fn default_video_port() -> u16 { 5555 }
fn default_control_port() -> u16 { 5559 }

fn default_interval_ms() -> u64 { 30 }

fn default_recv_timeout_ms() -> u64 { 1000 }
fn default_buffer_size() -> usize { 4096 }

fn default_channel_capacity() -> usize { 16 }

fn default_device_config_timeout_ms() -> u64 { 2000 }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            at_port: default_at_port(),
            navdata_port: default_navdata_port(),
            video_port: default_video_port(),
            control_port: default_control_port(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for NavDataConfig {
    fn default() -> Self {
        Self {
            recv_timeout_ms: default_recv_timeout_ms(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for DeviceConfigConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_device_config_timeout_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

impl DroneConfig {
    /// Drone IP address
    ///
    /// # Errors
    ///
    /// Returns error if `address` is not an IP address
    pub fn ip(&self) -> Result<IpAddr> {
        self.address.parse().map_err(|_| {
            DroneError::Config(toml::de::Error::custom(format!(
                "drone address '{}' is not an IP address",
                self.address
            )))
        })
    }

    /// Socket address of the drone on `port`
    pub fn endpoint(&self, port: u16) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.ip()?, port))
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl NavDataConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ardrone_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        self.drone.ip()?;

        let ports = [
            ("at_port", self.drone.at_port),
            ("navdata_port", self.drone.navdata_port),
            ("video_port", self.drone.video_port),
            ("control_port", self.drone.control_port),
        ];
        for (name, port) in ports {
            if port == 0 {
                return Err(invalid(format!("{} cannot be 0", name)));
            }
        }

        if self.scheduler.interval_ms == 0 || self.scheduler.interval_ms > 1000 {
            return Err(invalid("scheduler interval_ms must be between 1 and 1000"));
        }

        if self.navdata.recv_timeout_ms == 0 || self.navdata.recv_timeout_ms > 60000 {
            return Err(invalid("navdata recv_timeout_ms must be between 1 and 60000"));
        }

        // Largest frame carries every option once
        if self.navdata.buffer_size < 512 || self.navdata.buffer_size > 65535 {
            return Err(invalid("navdata buffer_size must be between 512 and 65535"));
        }

        if self.video.channel_capacity == 0 {
            return Err(invalid("video channel_capacity must be greater than 0"));
        }

        if self.device_config.timeout_ms == 0 || self.device_config.timeout_ms > 60000 {
            return Err(invalid("device_config timeout_ms must be between 1 and 60000"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        if let Some(dir) = &self.logging.file_dir {
            if dir.is_empty() {
                return Err(invalid("logging file_dir cannot be empty"));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl std::fmt::Display) -> DroneError {
    DroneError::Config(toml::de::Error::custom(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.drone.at_port, 5556);
        assert_eq!(config.drone.navdata_port, 5554);
        assert_eq!(config.scheduler.interval(), Duration::from_millis(30));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.drone.address, "192.168.1.1");
        assert_eq!(config.navdata.buffer_size, 4096);
        assert!(!config.video.enabled);
        assert!(config.logging.file_dir.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[drone]
address = "10.0.0.7"
at_port = 7000

[scheduler]
interval_ms = 50

[telemetry]
enabled = true
log_dir = "/tmp/flights"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.drone.at_port, 7000);
        assert_eq!(config.drone.navdata_port, 5554);
        assert_eq!(
            config.drone.endpoint(config.drone.at_port).unwrap(),
            "10.0.0.7:7000".parse().unwrap()
        );
        assert_eq!(config.scheduler.interval_ms, 50);
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load("/nonexistent/ardrone.toml");
        assert!(matches!(result, Err(DroneError::Io(_))));
    }

    #[test]
    fn test_invalid_address() {
        let result = Config::from_toml("[drone]\naddress = \"drone.local\"\n");
        assert!(matches!(result, Err(DroneError::Config(_))));
    }

    #[test]
    fn test_invalid_interval() {
        let mut config = Config::default();
        config.scheduler.interval_ms = 0;
        assert!(config.validate().is_err());

        config.scheduler.interval_ms = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_port() {
        let mut config = Config::default();
        config.drone.control_port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("control_port cannot be 0"));
    }

    #[test]
    fn test_invalid_buffer_size() {
        let mut config = Config::default();
        config.navdata.buffer_size = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_telemetry_requires_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());

        config.telemetry.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[scheduler\ninterval_ms = 30");
        assert!(matches!(result, Err(DroneError::Config(_))));
    }

    #[test]
    fn test_shipped_default_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.drone.address, "192.168.1.1");
        assert_eq!(config.scheduler.interval_ms, 30);
        assert_eq!(config.telemetry.log_interval_ms, 100);
        assert!(config.logging.file_dir.is_none());
    }
}
