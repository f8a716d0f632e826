//! Time-expiring registry of generations for polling and subscription.
//!
//! The parser holds no state across generations; this store is the only
//! shared structure, owned by the service layer.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::parser::{DirectiveEvent, EventSink, GenerationResult};

/// Capacity of each generation's live event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Lifecycle of a stored generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl GenerationStatus {
    /// Whether the generation can still change.
    #[must_use]
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

/// Snapshot of one generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: Uuid,
    pub prompt: String,
    pub status: GenerationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub events: Vec<DirectiveEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct Entry {
    record: GenerationRecord,
    /// Live channel; `None` once the generation finished.
    events_tx: Option<broadcast::Sender<DirectiveEvent>>,
    cancel: CancellationToken,
}

/// Keyed store of generations with retention-based eviction.
pub struct GenerationStore {
    entries: RwLock<HashMap<Uuid, Entry>>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl std::fmt::Debug for GenerationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationStore")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl GenerationStore {
    /// Create a store using wall-clock time.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self::with_clock(retention, Arc::new(SystemClock))
    }

    /// Create a store with an injected clock.
    #[must_use]
    pub fn with_clock(retention: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            retention,
        }
    }

    /// Register a new running generation.
    ///
    /// Returns its id and the token that aborts it.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn create(&self, prompt: &str) -> (Uuid, CancellationToken) {
        let id = Uuid::new_v4();
        let now = self.clock.now();
        let cancel = CancellationToken::new();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let entry = Entry {
            record: GenerationRecord {
                id,
                prompt: prompt.to_string(),
                status: GenerationStatus::Running,
                created_at: now,
                updated_at: now,
                events: Vec::new(),
                result: None,
                error: None,
            },
            events_tx: Some(events_tx),
            cancel: cancel.clone(),
        };
        self.entries
            .write()
            .expect("RwLock poisoned")
            .insert(id, entry);
        tracing::debug!(%id, "Generation registered");
        (id, cancel)
    }

    /// Append an event to a running generation and publish it.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn record_event(&self, id: Uuid, event: DirectiveEvent) {
        let now = self.clock.now();
        let mut entries = self.entries.write().expect("RwLock poisoned");
        let Some(entry) = entries.get_mut(&id) else {
            tracing::debug!(%id, "Event for unknown generation dropped");
            return;
        };
        if !entry.record.status.is_running() {
            return;
        }
        entry.record.updated_at = now;
        entry.record.events.push(event.clone());
        if let Some(tx) = &entry.events_tx {
            // No subscribers is fine; the event is kept for polling.
            let _ = tx.send(event);
        }
    }

    /// Mark a generation completed with its result.
    pub fn complete(&self, id: Uuid, result: GenerationResult) {
        self.finish(id, GenerationStatus::Completed, |record| {
            record.result = Some(result);
        });
    }

    /// Mark a generation failed.
    pub fn fail(&self, id: Uuid, error: String) {
        self.finish(id, GenerationStatus::Failed, |record| {
            record.error = Some(error);
        });
    }

    /// Abort a running generation. Returns false if it is unknown or
    /// already finished.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn cancel(&self, id: Uuid) -> bool {
        let cancel = {
            let entries = self.entries.read().expect("RwLock poisoned");
            match entries.get(&id) {
                Some(entry) if entry.record.status.is_running() => entry.cancel.clone(),
                _ => return false,
            }
        };
        cancel.cancel();
        self.finish(id, GenerationStatus::Cancelled, |_| {});
        tracing::info!(%id, "Generation cancelled");
        true
    }

    /// Snapshot of a generation.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<GenerationRecord> {
        self.entries
            .read()
            .expect("RwLock poisoned")
            .get(&id)
            .map(|entry| entry.record.clone())
    }

    /// Events so far plus a receiver for those still to come.
    ///
    /// The snapshot and the subscription are taken atomically, so no event
    /// is missed or seen twice. The receiver is `None` if the generation
    /// already finished.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn subscribe(
        &self,
        id: Uuid,
    ) -> Option<(
        GenerationRecord,
        Option<broadcast::Receiver<DirectiveEvent>>,
    )> {
        let entries = self.entries.read().expect("RwLock poisoned");
        entries.get(&id).map(|entry| {
            let rx = entry.events_tx.as_ref().map(broadcast::Sender::subscribe);
            (entry.record.clone(), rx)
        })
    }

    /// Evict generations not updated within the retention window.
    ///
    /// Returns the number evicted. An evicted generation that is still
    /// running is cancelled.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().expect("RwLock poisoned");
        let before = entries.len();
        entries.retain(|id, entry| {
            let expired = (now - entry.record.updated_at)
                .to_std()
                .is_ok_and(|age| age > self.retention);
            if expired {
                tracing::debug!(%id, "Evicting expired generation");
                entry.cancel.cancel();
            }
            !expired
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = entries.len(), "Swept generation store");
        }
        evicted
    }

    /// Number of stored generations.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("RwLock poisoned").len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn finish(&self, id: Uuid, status: GenerationStatus, update: impl FnOnce(&mut GenerationRecord)) {
        let now = self.clock.now();
        let mut entries = self.entries.write().expect("RwLock poisoned");
        let Some(entry) = entries.get_mut(&id) else {
            return;
        };
        if !entry.record.status.is_running() {
            return;
        }
        entry.record.status = status;
        entry.record.updated_at = now;
        update(&mut entry.record);
        // Dropping the sender ends live subscriptions.
        entry.events_tx = None;
    }
}

/// Event sink that records into a [`GenerationStore`].
#[derive(Debug, Clone)]
pub struct RecordingSink {
    store: Arc<GenerationStore>,
    id: Uuid,
}

impl RecordingSink {
    #[must_use]
    pub fn new(store: Arc<GenerationStore>, id: Uuid) -> Self {
        Self { store, id }
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: DirectiveEvent) {
        self.store.record_event(self.id, event);
    }
}
