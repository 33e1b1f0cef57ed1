// ── Reactive state stream ──
//
// Subscription to a live client's `DeviceState` snapshot.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::DeviceState;

/// Point-in-time snapshot plus change notification.
pub struct StateStream {
    current: DeviceState,
    receiver: watch::Receiver<DeviceState>,
}

impl StateStream {
    /// Only changes after this call count as `changed()`.
    pub(crate) fn new(mut receiver: watch::Receiver<DeviceState>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &DeviceState {
        &self.current
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the client's actor has gone away.
    pub async fn changed(&mut self) -> Option<DeviceState> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// Yields the current snapshot first, then one per change.
    pub fn into_stream(self) -> StateWatchStream {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StateWatchStream {
    inner: WatchStream<DeviceState>,
}

impl Stream for StateWatchStream {
    type Item = DeviceState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
