//! Configuration loading using Figment.
//!
//! Settings are loaded from:
//! 1. a TOML file (`config/awc_logger.toml` by default)
//! 2. environment variables prefixed with `AWC_LOGGER_`, using `__` as the
//!    nesting separator (e.g. `AWC_LOGGER_LOGGING__LEVEL=debug`)
//!
//! Device ids are matched case-insensitively. Environment keys arrive
//! lowercased, so an all-lowercase device entry is folded onto the entry whose
//! id differs only by case: `AWC_LOGGER_DEVICES__AWC1__HOST` overrides the host
//! of `[devices.AWC1]`. Any other pair of ids differing only by case is
//! rejected.
//!
//! # Example
//! ```no_run
//! use awc_logger::config::Settings;
//!
//! let settings = Settings::load()?;
//! for device in settings.devices() {
//!     println!("{} -> {}", device.id, device.address());
//! }
//! # Ok::<(), awc_logger::LoggerError>(())
//! ```

use crate::backoff::BackoffPolicy;
use crate::device::Device;
use crate::error::{AppResult, LoggerError};
use crate::logging::OutputFormat;
use crate::recorder::{PatternNamer, RotationPolicy};
use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Value},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/awc_logger.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "AWC_LOGGER_";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Console logging
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Where and how segments are written
    #[serde(default)]
    pub storage: StorageConfig,
    /// Segment rotation window
    #[serde(default)]
    pub rotation: RotationPolicy,
    /// Reconnect delay bounds
    #[serde(default)]
    pub backoff: BackoffPolicy,
    /// Socket timeouts
    #[serde(default)]
    pub link: LinkConfig,
    /// Devices keyed by identifier
    pub devices: BTreeMap<String, DeviceConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Console output format
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: OutputFormat::default(),
        }
    }
}

/// Segment storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Output directory for segment files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Filename pattern with `{date}` and `{device}` placeholders
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,
    /// chrono strftime format substituted for `{date}` (UTC)
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_pattern: default_file_pattern(),
            date_format: default_date_format(),
        }
    }
}

/// Socket timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum silence between two lines in seconds (0 = wait forever)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl LinkConfig {
    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout, or `None` when disabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }
}

/// Device endpoint in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Hostname or IP address
    pub host: String,
    /// Telnet port
    #[serde(default = "default_port")]
    pub port: u16,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_file_pattern() -> String {
    "{date}_{device}.log".to_string()
}

fn default_date_format() -> String {
    "%Y%m%d_%H%M%S".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    120
}

fn default_port() -> u16 {
    23
}

impl Settings {
    /// Load configuration from the default file and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path, then validate it
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Parse configuration from a TOML string, then validate it
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        Self::from_figment(Figment::from(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> AppResult<Self> {
        let mut merged: Dict = figment.extract()?;
        fold_device_ids(&mut merged);
        let settings: Settings = Figment::from(Serialized::defaults(merged)).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |msg: String| Err(LoggerError::Configuration(msg));

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        if self.devices.is_empty() {
            return invalid("No devices configured".to_string());
        }
        let mut lowered: BTreeMap<String, &String> = BTreeMap::new();
        for id in self.devices.keys() {
            if let Some(other) = lowered.insert(id.to_ascii_lowercase(), id) {
                return invalid(format!(
                    "Device ids '{}' and '{}' differ only by case",
                    other, id
                ));
            }
        }
        for (id, device) in &self.devices {
            if id.trim().is_empty() {
                return invalid("Device identifiers must not be empty".to_string());
            }
            if device.host.trim().is_empty() {
                return invalid(format!("Device '{}' has an empty host", id));
            }
            if device.port == 0 {
                return invalid(format!("Device '{}' has invalid port 0", id));
            }
        }

        if self.rotation.interval == 0 {
            return invalid("Rotation interval must be at least 1".to_string());
        }

        let pattern = &self.storage.file_pattern;
        if !pattern.contains("{date}") {
            return invalid(format!(
                "File pattern '{}' must contain a {{date}} placeholder",
                pattern
            ));
        }
        if self.devices.len() > 1 && !pattern.contains("{device}") {
            return invalid(format!(
                "File pattern '{}' must contain a {{device}} placeholder when several devices are configured",
                pattern
            ));
        }
        if pattern.contains('/') || pattern.contains('\\') {
            return invalid(format!(
                "File pattern '{}' must be a file name, not a path",
                pattern
            ));
        }

        let date_format = &self.storage.date_format;
        if date_format.is_empty()
            || StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error))
        {
            return invalid(format!("Invalid date format '{}'", date_format));
        }

        self.backoff.validate().map_err(LoggerError::Configuration)?;

        Ok(())
    }

    /// All configured devices, ordered by identifier
    pub fn devices(&self) -> Vec<Device> {
        self.devices
            .iter()
            .map(|(id, cfg)| Device::new(id.as_str(), cfg.host.clone(), cfg.port))
            .collect()
    }

    /// Keep only the listed devices. An empty selection keeps all of them.
    pub fn select_devices(mut self, ids: &[String]) -> AppResult<Self> {
        if ids.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = ids.iter().find(|id| !self.devices.contains_key(*id)) {
            return Err(LoggerError::Configuration(format!(
                "Unknown device '{}'",
                unknown
            )));
        }
        self.devices.retain(|id, _| ids.contains(id));
        Ok(self)
    }

    /// Segment namer built from the storage settings
    pub fn namer(&self) -> PatternNamer {
        PatternNamer::new(
            self.storage.output_dir.clone(),
            self.storage.file_pattern.clone(),
            self.storage.date_format.clone(),
        )
    }
}

/// Fold all-lowercase device entries (as produced by environment overrides)
/// onto the entry whose id differs only by case.
fn fold_device_ids(config: &mut Dict) {
    let Some(Value::Dict(_, devices)) = config.get_mut("devices") else {
        return;
    };

    let lowercase: Vec<String> = devices
        .keys()
        .filter(|id| !id.chars().any(|c| c.is_ascii_uppercase()))
        .cloned()
        .collect();
    for id in lowercase {
        let Some(target) = devices
            .keys()
            .find(|other| *other != &id && other.eq_ignore_ascii_case(&id))
            .cloned()
        else {
            continue;
        };
        if let Some(overrides) = devices.remove(&id) {
            if let Some(base) = devices.get_mut(&target) {
                merge_value(base, overrides);
            }
        }
    }
}

fn merge_value(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Dict(_, base), Value::Dict(_, overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
