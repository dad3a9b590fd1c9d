//! Cancellation context threaded into loaders.
//!
//! Engine operations never observe cancellation; only the loading path does.
//! A [`Context`] is a cheap cloneable token; [`Context::cancellable`] pairs it
//! with a [`CancelHandle`] that flips the shared flag. A context with no
//! handle ([`Context::background`]) can never be cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation token passed to cache loaders.
///
/// # Example
///
/// ```
/// use polycache::context::Context;
///
/// let (ctx, cancel) = Context::cancellable();
/// assert!(!ctx.is_cancelled());
/// cancel.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    flag: Option<Arc<AtomicBool>>,
}

impl Context {
    /// Returns a context that is never cancelled.
    pub fn background() -> Self {
        Self { flag: None }
    }

    /// Returns a context plus the handle that cancels it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            Self {
                flag: Some(Arc::clone(&flag)),
            },
            CancelHandle { flag },
        )
    }

    /// Returns `true` once the paired [`CancelHandle`] has fired.
    pub fn is_cancelled(&self) -> bool {
        self.flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}

/// Handle that cancels the [`Context`] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Marks the paired context as cancelled. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_cancelled() {
        let ctx = Context::background();
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_to_clones() {
        let (ctx, cancel) = Context::cancellable();
        let other = ctx.clone();
        cancel.cancel();
        assert!(ctx.is_cancelled());
        assert!(other.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let (ctx, cancel) = Context::cancellable();
        cancel.cancel();
        cancel.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn cancel_crosses_threads() {
        let (ctx, cancel) = Context::cancellable();
        let handle = std::thread::spawn(move || cancel.cancel());
        handle.join().unwrap();
        assert!(ctx.is_cancelled());
    }
}
