//! Durable FIFO queue of score submissions awaiting remote acceptance.

use std::{collections::VecDeque, sync::Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::dao::kv::KvHandle;

/// Current on-disk schema version of the persisted queue record.
const QUEUE_SCHEMA_VERSION: u32 = 1;

/// A score submission that failed its immediate attempt and is waiting to be
/// replayed by the queue processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    /// Named score track the backend ranks independently.
    pub stat: String,
    /// Score value achieved for that stat.
    pub score: i64,
    /// Length of the game session that produced the score, in seconds.
    pub session_length_secs: u64,
    /// Wall-clock unix timestamp taken when the item was enqueued.
    pub enqueued_at_unix: i64,
}

/// Versioned wrapper persisted as a whole on every queue mutation.
#[derive(Debug, Serialize, Deserialize)]
struct QueueRecord {
    version: u32,
    items: Vec<ScoreSubmission>,
}

/// Ordered, durable store of pending submissions.
///
/// The in-memory deque and the persisted record are re-synchronized on every
/// mutation, so no stale persisted state survives a completed session. Items
/// are removed only after the backend confirms acceptance (at-least-once).
pub struct PersistentQueue {
    kv: KvHandle,
    key: String,
    items: Mutex<VecDeque<ScoreSubmission>>,
    notify: Notify,
}

impl PersistentQueue {
    /// Load the queue persisted under `key`, starting empty when nothing is
    /// stored or the record carries an unknown schema version.
    pub fn load(kv: KvHandle, key: impl Into<String>) -> Self {
        let key = key.into();
        let items = match kv.get_json::<QueueRecord>(&key) {
            Some(record) if record.version == QUEUE_SCHEMA_VERSION => {
                debug!(pending = record.items.len(), "restored pending submission queue");
                VecDeque::from(record.items)
            }
            Some(record) => {
                warn!(
                    version = record.version,
                    supported = QUEUE_SCHEMA_VERSION,
                    "unknown queue schema version; starting with an empty queue"
                );
                VecDeque::new()
            }
            None => VecDeque::new(),
        };

        Self {
            kv,
            key,
            items: Mutex::new(items),
            notify: Notify::new(),
        }
    }

    /// Append a submission and persist the full queue, then wake the processor.
    pub fn enqueue(&self, submission: ScoreSubmission) {
        {
            let mut items = self.items.lock().unwrap();
            items.push_back(submission);
            self.persist(&items);
        }
        self.notify.notify_one();
    }

    /// Clone the head item without removing it; ownership of the stored record
    /// stays with the queue until [`PersistentQueue::pop_front`].
    pub fn peek_front(&self) -> Option<ScoreSubmission> {
        self.items.lock().unwrap().front().cloned()
    }

    /// Remove the head item after confirmed remote acceptance and persist.
    pub fn pop_front(&self) -> Option<ScoreSubmission> {
        let mut items = self.items.lock().unwrap();
        let popped = items.pop_front();
        if popped.is_some() {
            self.persist(&items);
        }
        popped
    }

    /// Number of pending submissions.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Whether no submission is pending.
    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Wait until [`PersistentQueue::enqueue`] signals a new item.
    pub async fn wait_for_item(&self) {
        self.notify.notified().await;
    }

    fn persist(&self, items: &VecDeque<ScoreSubmission>) {
        let record = QueueRecord {
            version: QUEUE_SCHEMA_VERSION,
            items: items.iter().cloned().collect(),
        };
        self.kv.set_json(&self.key, &record);
    }
}
