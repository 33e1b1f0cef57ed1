// ── Reconnecting stream client ──
//
// One supervised event-stream session per device, retried forever until
// the dispatcher asks to stop or the owner calls `close()`. Discovery and
// live-state clients are both this client with a different dispatcher.

mod engine;

use std::sync::Arc;

use parking_lot::ReentrantMutex;
use ratgdo_api::{Connector, SseEvent};
use strum::Display;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug};

use crate::config::{DeviceAddress, StreamConfig};
use crate::error::CoreError;
use crate::watchdog::LivenessWatchdog;

use self::engine::Engine;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of a client, observable by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
    Terminated,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Terminated)
    }
}

// ── EventDispatcher ──────────────────────────────────────────────────

/// What the client should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    /// Close the stream and never reconnect.
    Terminate,
}

/// Handles every event of an open stream.
///
/// Called from the client's actor, one event at a time. Errors are logged
/// by the client and the stream stays up.
pub trait EventDispatcher: Send + 'static {
    fn dispatch(&mut self, event: &SseEvent) -> Result<Dispatch, CoreError>;

    /// Extra context attached to connection-error log lines.
    fn diagnostic(&self) -> Option<&str> {
        None
    }
}

// ── ReconnectingStreamClient ─────────────────────────────────────────

/// Handle to a running client. Cheap to clone.
///
/// The client is not stopped when handles are dropped; call
/// [`close`](Self::close).
#[derive(Clone)]
pub struct ReconnectingStreamClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    address: DeviceAddress,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    /// Held while dispatching and while closing, so no dispatch runs after
    /// `close()` returns. Reentrant so a dispatcher may close its own client.
    gate: Arc<ReentrantMutex<()>>,
}

impl ReconnectingStreamClient {
    /// Start the client on the current tokio runtime.
    ///
    /// `span` is the caller's logger; the actor logs inside it.
    pub fn spawn<D: EventDispatcher>(
        address: DeviceAddress,
        config: StreamConfig,
        connector: Arc<dyn Connector>,
        dispatcher: D,
        span: Span,
    ) -> Result<Self, CoreError> {
        let url = address.events_url()?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();
        let gate = Arc::new(ReentrantMutex::new(()));

        let engine = Engine {
            url,
            watchdog: LivenessWatchdog::new(config.watchdog_window),
            config,
            connector,
            dispatcher,
            state: state.clone(),
            cancel: cancel.clone(),
            gate: Arc::clone(&gate),
        };
        tokio::spawn(engine.run().instrument(span));

        Ok(Self {
            inner: Arc::new(ClientInner {
                address,
                state,
                cancel,
                gate,
            }),
        })
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.inner.address
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Stop the client. Safe from any state and any number of times.
    ///
    /// Pending retry and watchdog timers become inert, and no dispatch
    /// happens after this returns.
    pub fn close(&self) {
        let _gate = self.inner.gate.lock();
        if self.inner.cancel.is_cancelled() {
            debug!(address = %self.inner.address, "client already closed");
            return;
        }

        self.inner.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = ConnectionState::ShuttingDown;
            true
        });
        self.inner.cancel.cancel();
        debug!(address = %self.inner.address, "client closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Wait until the actor has finished.
    pub async fn terminated(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `self`, so this only returns on Terminated.
        let _ = rx.wait_for(|s| *s == ConnectionState::Terminated).await;
    }
}

impl std::fmt::Debug for ReconnectingStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingStreamClient")
            .field("address", &self.inner.address)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
