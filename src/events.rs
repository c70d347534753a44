//! Injected event sink shared by every component that reports status
//!
//! The log keeps an append-only history of human-readable lines and broadcasts the typed
//! [`Event`] to subscribers. Both are updated under one lock, so the history order and
//! the broadcast order agree even when many tasks emit concurrently.

use crate::types::Event;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Capacity of the broadcast channel; slow subscribers see `Lagged` past this
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Append-only event log with broadcast fan-out
#[derive(Clone, Debug)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    messages: Mutex<Vec<String>>,
    event_tx: broadcast::Sender<Event>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(EventLogInner {
                messages: Mutex::new(Vec::new()),
                event_tx,
            }),
        }
    }

    /// Record an event and broadcast it to subscribers
    pub fn emit(&self, event: Event) {
        let line = event.to_string();
        tracing::debug!(event = %line, "status");

        // A poisoned lock only means another emitter panicked mid-push; the Vec is still valid.
        let mut messages = match self.inner.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(line);
        // No subscribers is fine
        self.inner.event_tx.send(event).ok();
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.event_tx.subscribe()
    }

    /// Snapshot of every line logged so far, in emission order
    pub fn messages(&self) -> Vec<String> {
        match self.inner.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
