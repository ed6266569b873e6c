//! Persistence port (4.J): an optional durability boundary. Absent, the
//! broker runs purely in memory and state is lost at restart (§6).

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::model::{Message, QueueDescription, SubscriptionDescription, TopicDescription};

/// A serializable view of every entity and message collection (§6
/// "Persisted state layout"). Lock state is deliberately omitted: leases
/// are volatile and their messages are returned to the backlog on
/// restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub queues: HashMap<String, QueueDescription>,
    pub topics: HashMap<String, TopicDescription>,
    /// Keyed by `"<topic>/<subscription>"`.
    pub subscriptions: HashMap<String, SubscriptionDescription>,
    /// Keyed by `"queue_<name>"` / `"subscription_<topic>_<name>"`.
    pub backlogs: HashMap<String, Vec<Message>>,
    /// Keyed the same way, with a `_dead_letter_` infix (§6).
    pub dead_letters: HashMap<String, Vec<Message>>,
}

/// One state-changing call, logged for idempotent replay keyed on the
/// message UUID (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MutationRecord {
    QueueCreated { name: String },
    QueueUpdated { name: String },
    QueueDeleted { name: String },
    TopicCreated { name: String },
    TopicUpdated { name: String },
    TopicDeleted { name: String },
    SubscriptionCreated { topic: String, name: String },
    SubscriptionUpdated { topic: String, name: String },
    SubscriptionDeleted { topic: String, name: String },
    RuleAdded { topic: String, subscription: String, rule: String },
    RuleUpdated { topic: String, subscription: String, rule: String },
    RuleDeleted { topic: String, subscription: String, rule: String },
    MessageSent { queue: String, message_id: String },
    MessagePublished { topic: String, message_id: String },
    MessageCompleted { entity: String, message_id: String },
    MessageAbandoned { entity: String, message_id: String },
    MessageDeadLettered { entity: String, message_id: String, reason: String },
}

pub trait PersistenceSink: Send + Sync {
    fn save_snapshot(&self, snapshot: &Snapshot);
    fn append_log(&self, record: MutationRecord);
    /// Returns the last saved snapshot, or `None` on a cold start.
    fn restore(&self) -> Option<Snapshot>;
}

/// Keeps the log and latest snapshot in memory. Proves the trait
/// boundary; nothing here survives process exit.
#[derive(Default)]
pub struct InMemoryPersistence {
    snapshot: Mutex<Option<Snapshot>>,
    log: Mutex<Vec<MutationRecord>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_len(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

impl PersistenceSink for InMemoryPersistence {
    fn save_snapshot(&self, snapshot: &Snapshot) {
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
    }

    fn append_log(&self, record: MutationRecord) {
        self.log.lock().unwrap().push(record);
    }

    fn restore(&self) -> Option<Snapshot> {
        self.snapshot.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_restores_nothing() {
        let p = InMemoryPersistence::new();
        assert!(p.restore().is_none());
    }

    #[test]
    fn save_then_restore_round_trips() {
        let p = InMemoryPersistence::new();
        let mut snap = Snapshot::default();
        snap.queues.insert(
            "orders".into(),
            QueueDescription {
                name: "orders".into(),
                properties: Default::default(),
                runtime: Default::default(),
            },
        );
        p.save_snapshot(&snap);
        let restored = p.restore().unwrap();
        assert!(restored.queues.contains_key("orders"));
    }

    #[test]
    fn append_log_accumulates() {
        let p = InMemoryPersistence::new();
        p.append_log(MutationRecord::QueueCreated { name: "a".into() });
        p.append_log(MutationRecord::QueueDeleted { name: "a".into() });
        assert_eq!(p.log_len(), 2);
    }
}
