use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token for cooperative cancellation of a background run.
///
/// Uses AtomicBools internally. Clone is cheap and shares state, so the
/// runner keeps one clone and the work function receives another.
///
/// Once requested, a token stays requested.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    requested: AtomicBool,
    /// Set when a read of `is_requested()` returned true.
    observed: AtomicBool,
}

impl CancellationToken {
    /// Create a new cancellation token (not requested).
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    ///
    /// Idempotent, callable from any thread, also after the work has returned.
    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_requested(&self) -> bool {
        let requested = self.inner.requested.load(Ordering::SeqCst);
        if requested {
            self.inner.observed.store(true, Ordering::SeqCst);
        }
        requested
    }

    /// Whether the work ever saw the request through `is_requested()`.
    pub fn was_observed(&self) -> bool {
        self.inner.observed.load(Ordering::SeqCst)
    }
}
