//! Device configuration for ratgdo tools.
//!
//! A TOML file of named devices plus timing defaults, overridable through
//! `RATGDO_`-prefixed environment variables, translated into
//! `ratgdo_core::DeviceAddress` / `StreamConfig`. ratgdo-core itself never
//! reads files.
//!
//! ```toml
//! [defaults]
//! watchdog_secs = 20
//! retry_secs = 10
//!
//! [devices.garage]
//! host = "10.0.0.5"
//! display_name = "Garage Door"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ratgdo_core::{DeviceAddress, StreamConfig, config::DEFAULT_KEEPALIVE_EVENT, config::DEFAULT_PORT};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no device named '{name}' in config")]
    UnknownDevice { name: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Global timing defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named devices.
    #[serde(default)]
    pub devices: BTreeMap<String, Device>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Seconds without a keepalive before the stream is cycled.
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,

    /// Seconds to wait after a failed connect.
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Event name that counts as a keepalive.
    #[serde(default = "default_keepalive_event")]
    pub keepalive_event: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            watchdog_secs: default_watchdog_secs(),
            retry_secs: default_retry_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            keepalive_event: default_keepalive_event(),
        }
    }
}

impl Defaults {
    /// Timing for a device with no overrides of its own.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            watchdog_window: Duration::from_secs(self.watchdog_secs),
            retry_delay: Duration::from_secs(self.retry_secs),
            keepalive_event: self.keepalive_event.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

fn default_watchdog_secs() -> u64 {
    20
}
fn default_retry_secs() -> u64 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_keepalive_event() -> String {
    DEFAULT_KEEPALIVE_EVENT.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

/// One controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Device {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Name shown to people; defaults to the config key.
    pub display_name: Option<String>,

    /// Override `defaults.watchdog_secs`.
    pub watchdog_secs: Option<u64>,

    /// Override `defaults.retry_secs`.
    pub retry_secs: Option<u64>,
}

impl Device {
    pub fn address(&self) -> DeviceAddress {
        DeviceAddress::new(self.host.clone(), self.port)
    }

    /// `display_name`, falling back to the device's key.
    pub fn label<'a>(&'a self, name: &'a str) -> &'a str {
        self.display_name.as_deref().unwrap_or(name)
    }
}

impl Config {
    pub fn device(&self, name: &str) -> Result<&Device, ConfigError> {
        self.devices.get(name).ok_or_else(|| ConfigError::UnknownDevice {
            name: name.into(),
        })
    }

    /// Timing for one device: its overrides on top of `[defaults]`.
    pub fn stream_config(&self, device: &Device) -> StreamConfig {
        let mut stream = self.defaults.stream_config();
        if let Some(secs) = device.watchdog_secs {
            stream.watchdog_window = Duration::from_secs(secs);
        }
        if let Some(secs) = device.retry_secs {
            stream.retry_delay = Duration::from_secs(secs);
        }
        stream
    }

    /// Reject empty hosts, zero ports and zero timings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |field: String, value: u64| {
            if value == 0 {
                Err(ConfigError::Validation {
                    field,
                    reason: "must be greater than zero".into(),
                })
            } else {
                Ok(())
            }
        };

        positive("defaults.watchdog_secs".into(), self.defaults.watchdog_secs)?;
        positive("defaults.retry_secs".into(), self.defaults.retry_secs)?;
        positive(
            "defaults.connect_timeout_secs".into(),
            self.defaults.connect_timeout_secs,
        )?;

        if self.defaults.keepalive_event.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "defaults.keepalive_event".into(),
                reason: "must not be empty".into(),
            });
        }

        for (name, device) in &self.devices {
            if device.host.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("devices.{name}.host"),
                    reason: "must not be empty".into(),
                });
            }
            if device.port == 0 {
                return Err(ConfigError::Validation {
                    field: format!("devices.{name}.port"),
                    reason: "must not be zero".into(),
                });
            }
            if let Some(secs) = device.watchdog_secs {
                positive(format!("devices.{name}.watchdog_secs"), secs)?;
            }
            if let Some(secs) = device.retry_secs {
                positive(format!("devices.{name}.retry_secs"), secs)?;
            }
        }

        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "ratgdo", "ratgdo").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ratgdo");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Nested keys use a double underscore in env vars, e.g.
/// `RATGDO_DEFAULTS__WATCHDOG_SECS=30`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RATGDO_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert!(config.devices.is_empty());
        assert_eq!(config.defaults.watchdog_secs, 20);
    }

    #[test]
    fn loads_devices_and_defaults() {
        let file = write_config(
            r#"
            [defaults]
            retry_secs = 5

            [devices.garage]
            host = "10.0.0.5"
            display_name = "Garage Door"

            [devices.barn]
            host = "barn.local"
            port = 8080
            watchdog_secs = 45
            "#,
        );

        let config = load_config_from(file.path()).unwrap();

        let garage = config.device("garage").unwrap();
        assert_eq!(garage.address(), DeviceAddress::new("10.0.0.5", 80));
        assert_eq!(garage.label("garage"), "Garage Door");

        let barn = config.device("barn").unwrap();
        assert_eq!(barn.address(), DeviceAddress::new("barn.local", 8080));
        assert_eq!(barn.label("barn"), "barn");

        let stream = config.stream_config(barn);
        assert_eq!(stream.watchdog_window, Duration::from_secs(45));
        assert_eq!(stream.retry_delay, Duration::from_secs(5));
        assert_eq!(stream.keepalive_event, "ping");
        assert_eq!(stream.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn unknown_device_is_an_error() {
        let config = Config::default();
        assert!(matches!(
            config.device("nope"),
            Err(ConfigError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn rejects_empty_host() {
        let file = write_config(
            r#"
            [devices.garage]
            host = " "
            "#,
        );

        let err = load_config_from(file.path()).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "devices.garage.host"),
            "got {err:?}"
        );
    }

    #[test]
    fn rejects_zero_timing() {
        let file = write_config(
            r#"
            [defaults]
            watchdog_secs = 0
            "#,
        );

        assert!(matches!(
            load_config_from(file.path()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_a_load_error() {
        let file = write_config("[devices.garage\nhost = ");
        assert!(matches!(
            load_config_from(file.path()),
            Err(ConfigError::Figment(_))
        ));
    }
}
