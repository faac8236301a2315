// packages/engine/src/simulation/timer.rs
//! Cancellable deferred actions
//!
//! A [`DeferredAction`] runs a future after a delay on the tokio runtime.
//! Cancelling it before the delay elapses guarantees the future never
//! starts; cancelling it while the future runs aborts it at its next await.
//! Disarming only prevents the start and lets a running future finish.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Handle to a scheduled action
#[derive(Debug)]
pub struct DeferredAction {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl DeferredAction {
    /// Run `action` once `delay` has elapsed
    pub fn schedule<F>(delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = child.cancelled() => {
                    trace!("Deferred action cancelled before firing");
                }
                _ = tokio::time::sleep(delay) => {
                    action.await;
                }
            }
        });

        Self { token, handle }
    }

    /// Run `action` right away, still cancellable through the handle
    pub fn spawn<F>(action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::schedule(Duration::ZERO, action)
    }

    /// Prevent the action from firing and abort it if it is already running
    pub fn cancel(&self) {
        self.token.cancel();
        self.handle.abort();
    }

    /// Cancel and wait until the task has fully wound down
    pub async fn cancel_and_wait(self) {
        self.cancel();
        let _ = self.handle.await;
    }

    /// Prevent the action from firing, then wait for it to wind down
    ///
    /// An action that has already fired runs to completion.
    pub async fn disarm(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }

    /// Wait for the action to run to completion (or be cancelled elsewhere)
    pub async fn join(self) {
        let _ = self.handle.await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
