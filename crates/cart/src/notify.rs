//! User-facing notices.
//!
//! The cart reports rejected and failed operations as fire-and-forget
//! notices; how they are shown (toast, terminal line, log) is up to the
//! [`Notifier`] the store was built with.

use std::sync::{Mutex, PoisonError};

/// A message for the shopper.
///
/// Every notice reports a rejected or failed operation and is shown as an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Sink for notices. Must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Emits notices as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        tracing::warn!(message = %notice.message, "Cart notice");
    }
}

/// Collects notices until drained.
#[derive(Debug, Default)]
pub struct BufferedNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl BufferedNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every notice collected so far.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copy of the collected notices, leaving them in place.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for BufferedNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}
