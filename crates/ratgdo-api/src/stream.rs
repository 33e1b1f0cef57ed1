//! Long-lived event-stream connection with idempotent close.
//!
//! [`Connector::open`] starts a background reader for one stream and returns
//! a [`StreamHandle`] that yields [`Notification`]s in order:
//!
//! - [`Notification::Opened`] once the device accepted the request
//! - [`Notification::Event`] per decoded server-push event
//! - [`Notification::Error`] when connecting fails or the stream breaks
//!
//! # Example
//!
//! ```rust,ignore
//! use ratgdo_api::stream::{Connector, HttpConnector, Notification};
//! use url::Url;
//!
//! let connector = HttpConnector::new(reqwest::Client::new());
//! let mut handle = connector.open(&Url::parse("http://10.0.0.5/events")?);
//!
//! while let Some(note) = handle.next().await {
//!     if let Notification::Event(event) = note {
//!         println!("{}: {}", event.name, event.data);
//!     }
//! }
//!
//! handle.close();
//! ```

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::sse::{SseDecoder, SseEvent};

// ── Notification channel capacity ────────────────────────────────────

const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

// ── Notification ─────────────────────────────────────────────────────

/// Something that happened on one underlying connection.
#[derive(Debug)]
pub enum Notification {
    Opened,
    Error(Error),
    Event(SseEvent),
}

// ── StreamHandle ─────────────────────────────────────────────────────

/// Exclusive handle to one underlying event-stream connection.
///
/// Dropping the handle closes it.
#[derive(Debug)]
pub struct StreamHandle {
    rx: mpsc::Receiver<Notification>,
    cancel: CancellationToken,
    closed: bool,
}

impl StreamHandle {
    /// Wrap the receiving end of a reader task.
    ///
    /// `cancel` must stop the reader. Connectors other than
    /// [`HttpConnector`] (test doubles, alternative transports) use this.
    pub fn new(rx: mpsc::Receiver<Notification>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            cancel,
            closed: false,
        }
    }

    /// Next notification, or `None` once the handle is closed or the
    /// reader has gone away.
    pub async fn next(&mut self) -> Option<Notification> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Release the connection. Safe to call any number of times; no
    /// notification is delivered after the first call returns.
    pub fn close(&mut self) {
        if self.closed {
            tracing::debug!("event stream already closed");
            return;
        }
        self.closed = true;
        self.cancel.cancel();
        self.rx.close();
        tracing::debug!("event stream closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Opens event-stream connections.
///
/// `open` must not block: the handshake happens in the background and is
/// reported through the handle.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, url: &Url) -> StreamHandle;
}

/// Connector backed by a `reqwest` streaming GET.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
}

impl HttpConnector {
    /// `http` should be built with
    /// [`TransportConfig::build_stream_client`](crate::transport::TransportConfig::build_stream_client)
    /// so that it carries no whole-request timeout.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Connector for HttpConnector {
    fn open(&self, url: &Url) -> StreamHandle {
        let (tx, rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let http = self.http.clone();
        let url = url.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = task_cancel.cancelled() => {}
                () = read_stream(http, url, tx) => {}
            }
        });

        StreamHandle::new(rx, cancel)
    }
}

// ── Reader task ──────────────────────────────────────────────────────

/// GET the stream, announce the open, then decode chunks until it breaks.
///
/// Exactly one `Error` is sent on failure; nothing follows it.
async fn read_stream(http: reqwest::Client, url: Url, tx: mpsc::Sender<Notification>) {
    tracing::debug!(url = %url, "opening event stream");

    let response = match http
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(Notification::Error(Error::Transport(e))).await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let _ = tx
            .send(Notification::Error(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }))
            .await;
        return;
    }

    if tx.send(Notification::Opened).await.is_err() {
        return;
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Notification::Error(Error::Transport(e))).await;
                return;
            }
        };

        for event in decoder.feed(&chunk) {
            if tx.send(Notification::Event(event)).await.is_err() {
                // Handle closed or dropped.
                return;
            }
        }
    }

    let _ = tx.send(Notification::Error(Error::StreamEnded)).await;
}

// ── Tests ────────────────────────────────────────────────────────────
