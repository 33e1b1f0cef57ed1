// ── Core error types ──
//
// Failures a collaborator can observe from ratgdo-core. Transport details
// (reqwest errors, HTTP statuses) are folded into connection/stream
// variants by the `From<ratgdo_api::Error>` impl below.
//
// Only `InvariantViolation` (from `target_door_state`) and `Config`
// (bad address) ever reach a caller. Everything else is produced inside a
// client's actor, logged, and recovered from.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// The event stream could not be established. Retried after a delay.
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// An established event stream failed. Reconnected immediately.
    #[error("Event stream error: {reason}")]
    Stream { reason: String },

    /// The client was closed.
    #[error("Client closed")]
    Closed,

    // ── Payload errors ───────────────────────────────────────────────
    /// An event payload did not have the expected shape.
    #[error("Cannot decode '{event}' event: {reason}")]
    Decode { event: String, reason: String },

    /// Two fields that must agree did not (firmware `value` vs `state`).
    #[error("Mismatched values: value={value:?}, state={state:?}")]
    Corroboration { value: String, state: String },

    // ── Query errors ─────────────────────────────────────────────────
    /// The snapshot cannot answer the query without guessing.
    #[error("Invariant violated: {message}")]
    InvariantViolation { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn decode(event: &str, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            event: event.to_owned(),
            reason: reason.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ratgdo_api::Error> for CoreError {
    fn from(err: ratgdo_api::Error) -> Self {
        let before_open = err.is_connect();
        match err {
            ratgdo_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ratgdo_api::Error::ClientBuild(message) => CoreError::Config { message },
            ratgdo_api::Error::HttpStatus { status, url } => CoreError::ConnectionFailed {
                url,
                reason: format!("HTTP {status}"),
            },
            ratgdo_api::Error::Transport(e) if before_open => {
                CoreError::ConnectionFailed {
                    url: e
                        .url()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "<unknown>".into()),
                    reason: e.to_string(),
                }
            }
            other => CoreError::Stream {
                reason: other.to_string(),
            },
        }
    }
}
