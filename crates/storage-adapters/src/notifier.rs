use std::sync::{Mutex, PoisonError};

use domains::{Notice, Notifier};
use tracing::{info, warn};

/// Writes notices to the log. Failures go out at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::Failure { .. } => warn!(notice = %notice, "notice"),
            _ => info!(notice = %notice, "notice"),
        }
    }
}

/// Keeps every notice in order, for assertions.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    seen: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(notice);
    }
}
