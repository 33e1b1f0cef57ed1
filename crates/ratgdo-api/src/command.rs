// Door command endpoint
//
// `POST /cover/door/{open|close}` with an empty body. The device answers
// immediately and reports the resulting motion on the event stream, so the
// response body carries nothing of interest.

use std::fmt;

use tracing::debug;
use url::Url;

use crate::error::Error;

/// A motion request for the door cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorCommand {
    Open,
    Close,
}

impl DoorCommand {
    /// Path segment the device's web server expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for DoorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thin HTTP client for the device's command endpoints.
#[derive(Debug, Clone)]
pub struct CommandClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CommandClient {
    /// `base_url` is the device root, e.g. `http://10.0.0.5:80/`.
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/cover/door/{command}`
    pub fn command_url(&self, command: DoorCommand) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("cover/door/{command}"))?)
    }

    /// Send the command and wait for the HTTP status.
    pub async fn send(&self, command: DoorCommand) -> Result<(), Error> {
        let url = self.command_url(command)?;
        debug!("POST {}", url);

        self.http
            .post(url)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Send the command without waiting for the outcome.
    ///
    /// Failures are logged; the caller learns about the door's motion from
    /// the event stream, not from this call.
    pub fn send_detached(&self, command: DoorCommand) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send(command).await {
                tracing::warn!(error = %e, %command, "door command failed");
            }
        });
    }
}
