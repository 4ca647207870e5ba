//! Bounded history of Hugo output with live fan-out to subscribers.
//!
//! The history and the subscriber registry sit behind two separate locks and
//! are never held at the same time. Delivery to subscribers uses `try_send`,
//! so a slow or vanished viewer loses entries instead of stalling the output
//! readers.

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

/// Where a log line came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumIs,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LogOrigin {
    Stdout,
    Stderr,
    /// Lifecycle narration written by the manager itself.
    System,
}

/// One timestamped line of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Local>,
    pub message: String,
    #[serde(rename = "type")]
    pub origin: LogOrigin,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, origin: LogOrigin) -> Self {
        Self {
            time: Local::now(),
            message: message.into(),
            origin,
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(message, LogOrigin::System)
    }
}

pub type SubscriptionId = u64;

/// Receiving end of a live log subscription.
///
/// The stream ends once the subscription is removed from its [`LogBuffer`],
/// after any entries already queued have been drained.
#[derive(Debug)]
pub struct LogSubscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<LogEntry>,
}

impl LogSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<LogEntry> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LogEntry> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> ReceiverStream<LogEntry> {
        ReceiverStream::new(self.rx)
    }
}

#[derive(Debug)]
pub struct LogBuffer {
    entries: RwLock<VecDeque<LogEntry>>,
    capacity: usize,
    subscribers: RwLock<IndexMap<SubscriptionId, mpsc::Sender<LogEntry>>>,
    subscriber_capacity: usize,
    next_id: AtomicU64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize, subscriber_capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            subscribers: RwLock::new(IndexMap::new()),
            subscriber_capacity: subscriber_capacity.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Record an entry and offer it to every current subscriber.
    pub fn append(&self, entry: LogEntry) {
        {
            let mut entries = self.write_entries();
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        let mut closed = vec![];
        {
            let subscribers = self.read_subscribers();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(entry.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        trace!("log subscriber {id} is lagging, dropping entry");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.write_subscribers();
            for id in closed {
                debug!("pruning closed log subscriber {id}");
                subscribers.shift_remove(&id);
            }
        }
    }

    /// Copy of the most recent `limit` entries, oldest first. A `limit` of 0
    /// returns everything.
    pub fn snapshot(&self, limit: usize) -> Vec<LogEntry> {
        let entries = self.read_entries();
        let limit = if limit == 0 || limit > entries.len() {
            entries.len()
        } else {
            limit
        };
        entries
            .iter()
            .skip(entries.len() - limit)
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> LogSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        self.write_subscribers().insert(id, tx);
        debug!("log subscriber {id} registered");
        LogSubscription { id, rx }
    }

    /// Remove a subscription, closing its channel. Returns false if it was
    /// already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.write_subscribers().shift_remove(&id).is_some();
        if removed {
            debug!("log subscriber {id} removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.read_subscribers().len()
    }

    pub fn close_subscribers(&self) {
        let mut subscribers = self.write_subscribers();
        if !subscribers.is_empty() {
            debug!("closing {} log subscribers", subscribers.len());
        }
        subscribers.clear();
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, VecDeque<LogEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, VecDeque<LogEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_subscribers(
        &self,
    ) -> RwLockReadGuard<'_, IndexMap<SubscriptionId, mpsc::Sender<LogEntry>>> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_subscribers(
        &self,
    ) -> RwLockWriteGuard<'_, IndexMap<SubscriptionId, mpsc::Sender<LogEntry>>> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }
}
