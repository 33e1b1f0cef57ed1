//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ratgdo_config::ConfigError;
use ratgdo_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(ratgdo::connection_failed),
        help(
            "Check that the device is powered and reachable on the network.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Event stream failed: {reason}")]
    #[diagnostic(code(ratgdo::stream))]
    Stream { reason: String },

    #[error("Device sent data that could not be used: {message}")]
    #[diagnostic(
        code(ratgdo::device_data),
        help("Rerun with -vv to see the raw events.")
    )]
    DeviceData { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s waiting for {what}")]
    #[diagnostic(
        code(ratgdo::timeout),
        help("Increase the limit with --timeout / --wait, or check the device's network link.")
    )]
    Timeout { what: String, seconds: u64 },

    // ── Device selection ─────────────────────────────────────────────
    #[error("No device selected")]
    #[diagnostic(
        code(ratgdo::no_device),
        help(
            "Pass --host <HOST[:PORT]>, or add a [devices.<name>] entry to\n\
             {path}"
        )
    )]
    NoDevice { path: String },

    #[error("Several devices are configured; pick one")]
    #[diagnostic(
        code(ratgdo::ambiguous_device),
        help("Use --device with one of: {available}")
    )]
    AmbiguousDevice { available: String },

    #[error("Device '{name}' not found in configuration")]
    #[diagnostic(
        code(ratgdo::device_not_found),
        help("Configured devices: {available}\nRun: ratgdo devices")
    )]
    DeviceNotFound { name: String, available: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ratgdo::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(ratgdo::config), help("Check the config file and RATGDO_* variables."))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(ratgdo::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Stream { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::NoDevice { .. } | Self::AmbiguousDevice { .. } | Self::Validation { .. } => {
                exit_code::USAGE
            }
            Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::Stream { reason } => CliError::Stream { reason },

            CoreError::Closed => CliError::Stream {
                reason: "client closed before an answer arrived".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "device address".into(),
                reason: message,
            },

            err @ (CoreError::Decode { .. }
            | CoreError::Corroboration { .. }
            | CoreError::InvariantViolation { .. }) => CliError::DeviceData {
                message: err.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_failures_use_connection_exit_code() {
        let err: CliError = CoreError::ConnectionFailed {
            url: "http://10.0.0.5:80/events".into(),
            reason: "refused".into(),
        }
        .into();

        assert!(matches!(err, CliError::ConnectionFailed { .. }));
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn device_data_errors_are_general() {
        let err: CliError = CoreError::InvariantViolation {
            message: "operation unknown".into(),
        }
        .into();

        assert!(matches!(err, CliError::DeviceData { .. }));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn selection_errors_are_usage_errors() {
        let err = CliError::AmbiguousDevice {
            available: "barn, garage".into(),
        };
        assert_eq!(err.exit_code(), exit_code::USAGE);

        let err: CliError = ConfigError::Validation {
            field: "devices.garage.host".into(),
            reason: "must not be empty".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn timeouts_have_their_own_exit_code() {
        let err = CliError::Timeout {
            what: "a heartbeat".into(),
            seconds: 60,
        };
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);
        assert_eq!(err.to_string(), "Timed out after 60s waiting for a heartbeat");
    }
}
