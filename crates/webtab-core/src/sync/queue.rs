//! Debounced, coalescing queue of pending remote writes.
//!
//! Every local write enqueues an intent keyed by `set_<key>` or
//! `remove_<key>`. Re-enqueuing the same queue key replaces the pending
//! value in place, so a burst of writes to one key collapses into a single
//! remote request carrying the latest value. Intents are applied in the order
//! their queue key first entered the queue.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::storage::{GistStore, GistTransport};

/// Quiet period after the latest enqueue before the queue is flushed
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(2000);

/// A pending remote change
#[derive(Debug, Clone, PartialEq)]
pub enum SyncIntent {
    Set { key: String, value: Value },
    Remove { key: String },
}

impl SyncIntent {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self::Set {
            key: key.into(),
            value,
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }

    /// Coalescing key: `set_<key>` or `remove_<key>`
    pub fn queue_key(&self) -> String {
        match self {
            Self::Set { key, .. } => format!("set_{key}"),
            Self::Remove { key } => format!("remove_{key}"),
        }
    }

    /// Storage key the intent applies to
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Remove { key } => key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

/// Trailing-edge debounce timer as an explicit state machine.
///
/// Every `trigger` pushes the deadline to `now + quiet_period`; the timer
/// fires once, at the last deadline.
#[derive(Debug)]
pub struct Debouncer {
    quiet_period: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub const fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            state: DebounceState::Idle,
        }
    }

    pub const fn state(&self) -> DebounceState {
        self.state
    }

    pub const fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending { deadline } => Some(deadline),
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.state = DebounceState::Pending {
            deadline: now + self.quiet_period,
        };
    }

    /// Fire and return to idle when the deadline has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }
}

/// Outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Intents the remote accepted
    pub applied: usize,
    /// Intents that failed; they are dropped, not retried
    pub failed: usize,
}

impl FlushReport {
    pub const fn is_empty(&self) -> bool {
        self.applied == 0 && self.failed == 0
    }
}

struct QueueState {
    pending: IndexMap<String, SyncIntent>,
    debounce: Debouncer,
}

/// Pending remote changes plus the debounce timer that schedules them.
pub struct SyncQueue {
    state: Mutex<QueueState>,
    wake: Notify,
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::with_interval(DEBOUNCE_INTERVAL)
    }

    pub fn with_interval(quiet_period: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: IndexMap::new(),
                debounce: Debouncer::new(quiet_period),
            }),
            wake: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace an intent and restart the debounce timer
    pub fn enqueue(&self, intent: SyncIntent) {
        {
            let mut state = self.lock();
            let queue_key = intent.queue_key();
            tracing::debug!("Queued {} for remote sync", queue_key);
            // Replacing keeps the original position
            state.pending.insert(queue_key, intent);
            state.debounce.trigger(Instant::now());
        }
        self.wake.notify_one();
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Queue keys in flush order
    pub fn pending_keys(&self) -> Vec<String> {
        self.lock().pending.keys().cloned().collect()
    }

    pub fn debounce_state(&self) -> DebounceState {
        self.lock().debounce.state()
    }

    /// Atomically take every pending intent, leaving the queue empty
    pub fn drain(&self) -> Vec<SyncIntent> {
        let mut state = self.lock();
        state.debounce.cancel();
        std::mem::take(&mut state.pending).into_values().collect()
    }

    /// Drop every pending intent and cancel the timer; returns how many were dropped
    pub fn discard(&self) -> usize {
        let discarded = self.drain().len();
        if discarded > 0 {
            tracing::info!("Discarded {} queued change(s)", discarded);
        }
        discarded
    }

    /// Resolve once the quiet period after the latest enqueue has elapsed
    pub async fn wait_until_due(&self) {
        loop {
            let deadline = self.lock().debounce.deadline();
            match deadline {
                None => self.wake.notified().await,
                Some(deadline) => {
                    tokio::time::sleep_until(deadline).await;
                    if self.lock().debounce.fire_if_due(Instant::now()) {
                        return;
                    }
                }
            }
        }
    }

    /// Apply every pending intent to `remote`, in queue order.
    ///
    /// Failed intents are logged and dropped.
    pub async fn flush<T: GistTransport>(&self, remote: &GistStore<T>) -> FlushReport {
        let intents = self.drain();
        let mut report = FlushReport::default();
        if intents.is_empty() {
            return report;
        }

        tracing::info!("Flushing {} queued change(s) to gist", intents.len());
        for intent in intents {
            let accepted = match &intent {
                SyncIntent::Set { key, value } => remote.write_file(key, value).await.is_some(),
                SyncIntent::Remove { key } => remote.delete_file(key).await,
            };

            if accepted {
                tracing::debug!("Synced {}", intent.queue_key());
                report.applied += 1;
            } else {
                tracing::warn!("Dropped {} after a failed remote write", intent.queue_key());
                report.failed += 1;
            }
        }
        report
    }
}
