// Shared transport configuration for building reqwest::Client instances.
//
// The event-stream connector and the command client share the connect
// timeout and user agent through this module. Only the command client gets
// a whole-request timeout: the event stream is meant to stay open forever.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("ratgdo-rs/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Upper bound on a whole request/response cycle (commands only).
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a client for long-lived event streams.
    ///
    /// No overall timeout is set, since reqwest applies it to the body too
    /// and would cut the stream. Liveness is the watchdog's job.
    pub fn build_stream_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    /// Build a client for one-shot requests such as door commands.
    pub fn build_command_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }
}
