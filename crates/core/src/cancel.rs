//! Cooperative cancellation shared by a job and everything it calls.
//!
//! A [`CancelToken`] is cloned into external-process calls and provider
//! stream consumers. Cancelling any clone is observed by all of them.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Why a token was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// Someone asked for the job to stop.
    Requested,
    /// The configured job deadline elapsed.
    Timeout(Duration),
    /// The engine is shutting down.
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "cancelled by request"),
            CancelReason::Timeout(d) => write!(f, "timed out after {}s", d.as_secs()),
            CancelReason::Shutdown => write!(f, "cancelled by engine shutdown"),
        }
    }
}

/// Cloneable cancellation signal.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
    rx: watch::Receiver<Option<CancelReason>>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("reason", &self.reason())
            .finish()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Cancel with [`CancelReason::Requested`].
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Requested);
    }

    /// Cancel with an explicit reason. The first reason wins.
    pub fn cancel_with(&self, reason: CancelReason) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = Some(reason);
                true
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.rx.borrow().clone()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if rx.borrow_and_update().is_some() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender is owned by every clone, so this only happens at teardown.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Runs `fut` unless the token fires first. The future is dropped on cancellation,
    /// which kills child processes spawned with `kill_on_drop`.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_observe_cancel() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.reason(), Some(CancelReason::Requested));
        clone.cancelled().await;
    }

    #[tokio::test]
    async fn test_first_reason_wins() {
        let token = CancelToken::new();
        token.cancel_with(CancelReason::Timeout(Duration::from_secs(5)));
        token.cancel_with(CancelReason::Shutdown);
        assert_eq!(
            token.reason(),
            Some(CancelReason::Timeout(Duration::from_secs(5)))
        );
        assert_eq!(token.reason().unwrap().to_string(), "timed out after 5s");
    }

    #[tokio::test]
    async fn test_run_until_cancelled_drops_future() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter
                .run_until_cancelled(tokio::time::sleep(Duration::from_secs(60)))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("cancellation should unwind promptly")
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_run_until_cancelled_completes() {
        let token = CancelToken::new();
        let out = token.run_until_cancelled(async { 42 }).await;
        assert_eq!(out, Some(42));
    }
}
