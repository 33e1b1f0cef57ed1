// ── Reconnect engine ──
//
// The actor that owns one client's connection. Runs as a single task, so
// state transitions, watchdog expiry and dispatch for that client are
// serialized by construction.
//
//   Disconnected ─▶ Connecting ─opened─▶ Connected ─┬─ stream error ─▶ Disconnected ─▶ Connecting
//        ▲              │                           ├─ watchdog expiry ─┘
//        └─ retry delay ┘ connect failure           └─ terminate / close ─▶ ShuttingDown ─▶ Terminated

use std::sync::Arc;

use parking_lot::ReentrantMutex;
use ratgdo_api::{Connector, Notification, SseEvent, StreamHandle};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{ConnectionState, Dispatch, EventDispatcher};
use crate::config::StreamConfig;
use crate::error::CoreError;
use crate::watchdog::LivenessWatchdog;

/// Why one connection attempt or session ended.
#[derive(Debug)]
enum SessionEnd {
    ConnectFailed(ratgdo_api::Error),
    HandshakeTimeout,
    StreamFailed(ratgdo_api::Error),
    Stale,
    Terminate,
    Cancelled,
}

pub(super) struct Engine<D> {
    pub(super) url: Url,
    pub(super) config: StreamConfig,
    pub(super) connector: Arc<dyn Connector>,
    pub(super) dispatcher: D,
    pub(super) watchdog: LivenessWatchdog,
    pub(super) state: watch::Sender<ConnectionState>,
    pub(super) cancel: CancellationToken,
    pub(super) gate: Arc<ReentrantMutex<()>>,
}

impl<D: EventDispatcher> Engine<D> {
    pub(super) async fn run(mut self) {
        loop {
            match self.session().await {
                SessionEnd::ConnectFailed(e) => {
                    let err = CoreError::from(e);
                    self.connect_failed(&err).await;
                }
                SessionEnd::HandshakeTimeout => {
                    let err = CoreError::ConnectionFailed {
                        url: self.url.to_string(),
                        reason: format!(
                            "no response within {}s",
                            self.config.watchdog_window.as_secs()
                        ),
                    };
                    self.connect_failed(&err).await;
                }
                SessionEnd::StreamFailed(e) => {
                    let err = CoreError::from(e);
                    warn!(
                        error = %err,
                        last_log = self.dispatcher.diagnostic().unwrap_or_default(),
                        "connection error, reinitializing"
                    );
                }
                SessionEnd::Stale => {
                    info!(
                        window_secs = self.config.watchdog_window.as_secs(),
                        "no keepalive within window; timeout forced reconnect"
                    );
                }
                SessionEnd::Terminate | SessionEnd::Cancelled => break,
            }

            if self.cancel.is_cancelled() {
                break;
            }
        }

        self.set_state(ConnectionState::ShuttingDown);
        self.cancel.cancel();
        self.set_state(ConnectionState::Terminated);
        debug!("client terminated");
    }

    /// Log a connect failure, then wait out the retry delay.
    async fn connect_failed(&mut self, err: &CoreError) {
        warn!(
            error = %err,
            last_log = self.dispatcher.diagnostic().unwrap_or_default(),
            delay_ms = u64::try_from(self.config.retry_delay.as_millis()).unwrap_or(u64::MAX),
            "failed to connect to event stream; retrying"
        );

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {}
            () = tokio::time::sleep(self.config.retry_delay) => {}
        }
    }

    /// One connect attempt and, if it opens, the whole connected session.
    async fn session(&mut self) -> SessionEnd {
        self.set_state(ConnectionState::Connecting);
        let mut handle = self.connector.open(&self.url);

        let end = match self.await_open(&mut handle).await {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                info!(url = %self.url, "connection to device initialized");
                self.watchdog.arm();

                let end = self.pump(&mut handle).await;

                // Disarm before the close so a late expiry cannot start a
                // second reconnect.
                self.watchdog.disarm();
                end
            }
            Err(end) => end,
        };

        handle.close();
        if !matches!(end, SessionEnd::Terminate | SessionEnd::Cancelled) {
            self.set_state(ConnectionState::Disconnected);
        }
        end
    }

    /// Wait for the connector to report the stream open.
    ///
    /// The handshake is bounded by the watchdog window.
    async fn await_open(&mut self, handle: &mut StreamHandle) -> Result<(), SessionEnd> {
        let deadline = tokio::time::sleep(self.config.watchdog_window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(SessionEnd::Cancelled),
                () = &mut deadline => return Err(SessionEnd::HandshakeTimeout),
                note = handle.next() => match note {
                    Some(Notification::Opened) => return Ok(()),
                    Some(Notification::Error(e)) => return Err(SessionEnd::ConnectFailed(e)),
                    Some(Notification::Event(event)) => {
                        debug!(event = %event.name, "event before open; ignoring");
                    }
                    None => return Err(SessionEnd::ConnectFailed(ratgdo_api::Error::StreamEnded)),
                },
            }
        }
    }

    /// Drive an open stream until it breaks, goes stale, or is told to stop.
    async fn pump(&mut self, handle: &mut StreamHandle) -> SessionEnd {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return SessionEnd::Cancelled,
                () = self.watchdog.expired() => return SessionEnd::Stale,
                note = handle.next() => match note {
                    Some(Notification::Event(event)) => {
                        if event.name == self.config.keepalive_event {
                            self.watchdog.arm();
                        }
                        match self.dispatch(&event) {
                            Some(Dispatch::Continue) => {}
                            Some(Dispatch::Terminate) => return SessionEnd::Terminate,
                            None => return SessionEnd::Cancelled,
                        }
                    }
                    Some(Notification::Opened) => {
                        debug!("already connected; ignoring duplicate open");
                    }
                    Some(Notification::Error(e)) => return SessionEnd::StreamFailed(e),
                    None => return SessionEnd::StreamFailed(ratgdo_api::Error::StreamEnded),
                },
            }
        }
    }

    /// Hand one event to the dispatcher under the gate.
    ///
    /// `None` means the client was closed and the event was dropped.
    fn dispatch(&mut self, event: &SseEvent) -> Option<Dispatch> {
        let _gate = self.gate.lock();
        if self.cancel.is_cancelled() {
            return None;
        }

        match self.dispatcher.dispatch(event) {
            Ok(next) => Some(next),
            Err(e) => {
                error!(event = %event.name, error = %e, "failed to handle event");
                Some(Dispatch::Continue)
            }
        }
    }

    /// Publish a transition. After close only the terminal states get through.
    ///
    /// Checked inside the channel's write lock: `close()` publishes
    /// `ShuttingDown` from another thread and must never be overwritten.
    fn set_state(&self, next: ConnectionState) {
        let cancel = &self.cancel;
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if !next.is_terminal() && (current.is_terminal() || cancel.is_cancelled()) {
                return false;
            }
            debug!(from = %current, to = %next, "connection state");
            *current = next;
            true
        });
    }
}
