use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative cancellation flag shared between a controller and long-running tasks.
///
/// Clones observe the same flag. Tasks poll [`CancelToken::is_cancelled`] at safe
/// points, or await [`CancelToken::cancelled`] to be woken once cancellation happens.
/// Cancellation is one-way; a cancelled token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token has been cancelled. Returns immediately if it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
