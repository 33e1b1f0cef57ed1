// Scripted in-memory connector for driving clients in tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ratgdo_api::{Connector, Notification, SseEvent, StreamHandle};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::ConnectionState;

/// Every `open()` creates a [`FakeSession`] the test picks up with
/// [`next_session`](Self::next_session) and scripts by hand.
#[derive(Clone)]
pub(crate) struct FakeConnector {
    inner: Arc<FakeInner>,
}

struct FakeInner {
    opens: AtomicUsize,
    sessions_tx: mpsc::UnboundedSender<FakeSession>,
    sessions_rx: Mutex<mpsc::UnboundedReceiver<FakeSession>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        let (sessions_tx, sessions_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(FakeInner {
                opens: AtomicUsize::new(0),
                sessions_tx,
                sessions_rx: Mutex::new(sessions_rx),
            }),
        }
    }

    /// Wait for the client's next connect attempt.
    pub(crate) async fn next_session(&self) -> FakeSession {
        self.inner
            .sessions_rx
            .lock()
            .await
            .recv()
            .await
            .expect("connector dropped")
    }

    /// Number of connect attempts so far.
    pub(crate) fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn open(&self, url: &Url) -> StreamHandle {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let _ = self.inner.sessions_tx.send(FakeSession {
            url: url.clone(),
            tx,
            cancel: cancel.clone(),
        });
        StreamHandle::new(rx, cancel)
    }
}

/// The device side of one fake connection.
pub(crate) struct FakeSession {
    pub(crate) url: Url,
    tx: mpsc::Sender<Notification>,
    cancel: CancellationToken,
}

impl FakeSession {
    pub(crate) async fn open(&self) {
        let _ = self.tx.send(Notification::Opened).await;
    }

    pub(crate) async fn event(&self, name: &str, data: &str) {
        let _ = self
            .tx
            .send(Notification::Event(SseEvent::new(name, data)))
            .await;
    }

    pub(crate) async fn fail(&self, error: ratgdo_api::Error) {
        let _ = self.tx.send(Notification::Error(error)).await;
    }

    /// Whether the client has closed its end.
    pub(crate) fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub(crate) async fn wait_for_state(rx: &watch::Receiver<ConnectionState>, target: ConnectionState) {
    let mut rx = rx.clone();
    rx.wait_for(|s| *s == target)
        .await
        .expect("state channel closed");
}
