// ABOUTME: Single-slot mailbox holding the most recent heartbeat reason.
// ABOUTME: Posts overwrite the slot; the heartbeat drains it once per tick.

use std::sync::{Arc, Mutex};

/// Latest-value cell shared between keep-alive callers and the heartbeat loop.
///
/// Posting replaces whatever is pending, so a burst of requests between two
/// ticks collapses into the last reason. Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct ReasonMailbox {
    slot: Arc<Mutex<Option<String>>>,
}

impl ReasonMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reason`, returning the reason it replaced, if any.
    pub fn post(&self, reason: impl Into<String>) -> Option<String> {
        self.slot
            .lock()
            .expect("lock poisoned")
            .replace(reason.into())
    }

    /// Drain the pending reason.
    pub fn take(&self) -> Option<String> {
        self.slot.lock().expect("lock poisoned").take()
    }

    /// Drain the pending reason, falling back to `default`.
    pub fn take_or(&self, default: &str) -> String {
        self.take().unwrap_or_else(|| default.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().expect("lock poisoned").is_none()
    }
}
