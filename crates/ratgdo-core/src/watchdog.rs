// ── Liveness watchdog ──
//
// Restartable one-shot countdown owned by a client's actor. Instead of a
// callback, the owner awaits `expired()` inside its `select!`; dropping out
// of the select (or disarming) makes a pending expiry inert.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

#[derive(Debug)]
pub struct LivenessWatchdog {
    window: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl LivenessWatchdog {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Start the countdown, replacing any pending one.
    pub fn arm(&mut self) {
        let at = Instant::now() + self.window;
        match self.deadline.as_mut() {
            Some(sleep) => sleep.as_mut().reset(at),
            None => self.deadline = Some(Box::pin(tokio::time::sleep_until(at))),
        }
    }

    /// Cancel the pending countdown, if any.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the armed window elapses; never resolves while disarmed.
    ///
    /// Cancel-safe. Firing disarms the watchdog.
    pub async fn expired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => future::pending().await,
        }
    }
}
