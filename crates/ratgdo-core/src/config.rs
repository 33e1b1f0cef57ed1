// ── Runtime connection configuration ──
//
// These types describe *where* a device lives and *how* to keep its event
// stream alive. They never touch disk: the CLI (or any other collaborator)
// builds them, typically from ratgdo-config, and hands them in.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::CoreError;

/// Port the ESPHome web server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 80;

/// Event name the device uses for its heartbeat.
pub const DEFAULT_KEEPALIVE_EVENT: &str = "ping";

// ── DeviceAddress ────────────────────────────────────────────────────

/// Network location of one controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `http://{host}:{port}/`
    pub fn base_url(&self) -> Result<Url, CoreError> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        Url::parse(&format!("http://{host}:{}/", self.port)).map_err(|e| CoreError::Config {
            message: format!("invalid device address '{self}': {e}"),
        })
    }

    /// `http://{host}:{port}/events`
    pub fn events_url(&self) -> Result<Url, CoreError> {
        self.base_url()?
            .join("events")
            .map_err(|e| CoreError::Config {
                message: format!("invalid device address '{self}': {e}"),
            })
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host.trim_matches(['[', ']']), self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parses `host`, `host:port`, `[v6]` or `[v6]:port`.
impl FromStr for DeviceAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &str| CoreError::Config {
            message: format!("invalid device address '{s}': {reason}"),
        };

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| invalid("unclosed '['"))?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => return Err(invalid("unexpected text after ']'")),
            }
        } else {
            match s.split_once(':') {
                Some((host, port)) if !port.contains(':') => (host, Some(port)),
                // No port, or a bare IPv6 literal
                _ => (s, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }

        let port = match port {
            Some(p) => p.parse().map_err(|_| invalid("port is not a number"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self::new(host, port))
    }
}

// ── StreamConfig ─────────────────────────────────────────────────────

/// Timing and protocol knobs shared by discovery and live clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// How long a connected stream may go without a keepalive event.
    pub watchdog_window: Duration,
    /// Pause after a failed connect before the next attempt.
    pub retry_delay: Duration,
    /// The only event name that resets the watchdog.
    pub keepalive_event: String,
    /// Upper bound on the TCP connect. Never applied to the stream body.
    pub connect_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            watchdog_window: Duration::from_secs(20),
            retry_delay: Duration::from_secs(10),
            keepalive_event: DEFAULT_KEEPALIVE_EVENT.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl StreamConfig {
    /// HTTP client settings for this stream's connections.
    pub fn transport(&self) -> ratgdo_api::TransportConfig {
        ratgdo_api::TransportConfig {
            connect_timeout: self.connect_timeout,
            ..ratgdo_api::TransportConfig::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn events_url_uses_host_and_port() {
        let addr = DeviceAddress::new("10.0.0.5", 8080);
        assert_eq!(addr.events_url().unwrap().as_str(), "http://10.0.0.5:8080/events");
        assert_eq!(addr.base_url().unwrap().as_str(), "http://10.0.0.5:8080/");
    }

    #[test]
    fn events_url_brackets_ipv6() {
        let addr = DeviceAddress::new("fe80::1", 80);
        let url = addr.events_url().unwrap();
        assert_eq!(url.as_str(), "http://[fe80::1]/events");
        assert_eq!(url.port_or_known_default(), Some(80));
    }

    #[test]
    fn parse_host_only_defaults_port() {
        let addr: DeviceAddress = "garage.local".parse().unwrap();
        assert_eq!(addr, DeviceAddress::new("garage.local", DEFAULT_PORT));
    }

    #[test]
    fn parse_host_and_port() {
        let addr: DeviceAddress = "10.0.0.5:8080".parse().unwrap();
        assert_eq!(addr, DeviceAddress::new("10.0.0.5", 8080));
        assert_eq!(addr.to_string(), "10.0.0.5:8080");
    }

    #[test]
    fn parse_bracketed_ipv6() {
        let addr: DeviceAddress = "[fe80::1]:81".parse().unwrap();
        assert_eq!(addr, DeviceAddress::new("fe80::1", 81));
        assert_eq!(addr.to_string(), "[fe80::1]:81");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<DeviceAddress>().is_err());
        assert!("host:notaport".parse::<DeviceAddress>().is_err());
        assert!("[fe80::1".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn default_timings() {
        let config = StreamConfig::default();
        assert_eq!(config.watchdog_window, Duration::from_secs(20));
        assert_eq!(config.retry_delay, Duration::from_secs(10));
        assert_eq!(config.keepalive_event, "ping");
    }
}
