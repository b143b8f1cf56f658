//! Per-session end-of-session signal shared by the sender, the receiver and
//! the supervisor.

use std::sync::Arc;
use tokio::sync::watch;

/// What ended the session. Only the first trigger is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// This side typed `QUIT`.
    LocalQuit,
    /// The peer sent `QUIT`.
    RemoteQuit,
    /// The connection dropped without a `QUIT`.
    Disconnected,
}

/// Write-once flag: false until the first [`trigger`](Self::trigger), true
/// forever after.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    state: Arc<watch::Sender<Option<ShutdownCause>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// Marks the session as ending. Returns `true` if this call set the
    /// token, `false` if it was already set.
    pub fn trigger(&self, cause: ShutdownCause) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(cause);
            true
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn cause(&self) -> Option<ShutdownCause> {
        *self.state.borrow()
    }

    /// Waits until the token is set and returns the recorded cause.
    pub async fn triggered(&self) -> ShutdownCause {
        let mut rx = self.state.subscribe();
        loop {
            if let Some(cause) = *rx.borrow_and_update() {
                return cause;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
