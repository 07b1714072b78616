//! Notification Sink
//!
//! Every monitor publishes into a shared sink; one dispatcher drains it.
//! `drain()` swaps the whole queue out under the lock, so an entry is handed
//! out exactly once even while monitors keep appending.
//!
//! Created: 2026-10-18

use crate::types::Channel;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Destination for rendered notifications
pub trait NotificationSink: Send + Sync {
    /// Queue `text` for delivery on `channel`. Must not block on delivery.
    fn publish(&self, channel: Channel, text: String);
}

/// A notification waiting for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: Channel,
    pub text: String,
}

/// Thread-safe FIFO sink shared between monitors and the dispatcher
#[derive(Debug, Default, Clone)]
pub struct QueuedSink {
    queue: Arc<Mutex<VecDeque<Notification>>>,
}

impl QueuedSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        // A panic while holding the lock cannot leave the deque half-written
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove and return every queued notification in publish order
    pub fn drain(&self) -> Vec<Notification> {
        let drained = std::mem::take(&mut *self.lock());
        Vec::from(drained)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl NotificationSink for QueuedSink {
    fn publish(&self, channel: Channel, text: String) {
        debug!("Queued {} notification ({} bytes)", channel, text.len());
        self.lock().push_back(Notification { channel, text });
    }
}
