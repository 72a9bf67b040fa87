//! Cancellation of in-flight session I/O.

use std::sync::Arc;
use tokio::sync::watch;

/// Cancels whatever network operation its session is running.
///
/// Cloneable and usable from any task. Once fired, the in-flight operation
/// and every later one fail with [`Error::Aborted`](crate::Error::Aborted)
/// until the session is reset.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    pub(crate) const fn new(tx: Arc<watch::Sender<bool>>) -> Self {
        Self { tx }
    }

    /// Fires the abort.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true if the abort has fired and not been cleared.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}
