use thiserror::Error;

/// Top-level error type for the `ratgdo-api` crate.
///
/// Covers every transport-level failure: building the HTTP client,
/// establishing the event stream, reading it, and sending door commands.
/// `ratgdo-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Event stream ────────────────────────────────────────────────
    /// The device answered the event-stream request with a non-success status.
    #[error("Event stream rejected (HTTP {status}) at {url}")]
    HttpStatus { status: u16, url: String },

    /// The device closed an established event stream.
    #[error("Event stream ended")]
    StreamEnded,
}

impl Error {
    /// Returns `true` if the error happened before the stream was established,
    /// as opposed to an established stream failing later.
    pub fn is_connect(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::HttpStatus { .. } | Self::InvalidUrl(_) | Self::ClientBuild(_) => true,
            Self::StreamEnded => false,
        }
    }
}
