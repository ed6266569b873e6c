//! Entity Store (component C): the three name-keyed maps (queues, topics,
//! subscriptions) plus quota enforcement. No locking of its own — it lives
//! inside the broker's single `std::sync::Mutex` (§5).

use std::collections::HashMap;
use std::time::SystemTime;

use crate::backlog::Backlog;
use crate::dead_letter::DeadLetterSink;
use crate::error::{BrokerError, Result};
use crate::lock_table::LockTable;
use crate::model::{
    QueueDescription, QueueProperties, RuleDescription, SubscriptionDescription,
    SubscriptionProperties, TopicDescription, TopicProperties, DEFAULT_RULE_NAME,
};
use crate::name;

/// Per-queue state: description plus its backlog, lock table, dead letters.
pub struct QueueEntry {
    pub description: QueueDescription,
    pub backlog: Backlog,
    pub locks: LockTable,
    pub dead_letters: DeadLetterSink,
}

/// Per-subscription state, keyed by (topic_name, subscription_name).
pub struct SubscriptionEntry {
    pub description: SubscriptionDescription,
    pub backlog: Backlog,
    pub locks: LockTable,
    pub dead_letters: DeadLetterSink,
}

pub struct TopicEntry {
    pub description: TopicDescription,
}

/// Quota ceilings enforced by the store (§3 [ADDED] size ceilings).
#[derive(Debug, Clone, Copy)]
pub struct Quotas {
    pub max_queues: usize,
    pub max_topics: usize,
    pub max_subscriptions_per_topic: usize,
    pub max_rules_per_subscription: usize,
}

impl Default for Quotas {
    fn default() -> Self {
        Self {
            max_queues: 10_000,
            max_topics: 10_000,
            max_subscriptions_per_topic: 2_000,
            max_rules_per_subscription: 2_000,
        }
    }
}

#[derive(Default)]
pub struct Store {
    queues: HashMap<String, QueueEntry>,
    topics: HashMap<String, TopicEntry>,
    subscriptions: HashMap<(String, String), SubscriptionEntry>,
    /// Creation order of subscription keys, per topic (4.H: fan-out visits
    /// subscriptions in creation order, distinct from the by-name sort
    /// `list_subscriptions` uses for the management listing).
    subscription_order: Vec<(String, String)>,
    quotas: Quotas,
}

impl Store {
    pub fn new(quotas: Quotas) -> Self {
        Self {
            queues: HashMap::new(),
            topics: HashMap::new(),
            subscriptions: HashMap::new(),
            subscription_order: Vec::new(),
            quotas,
        }
    }

    /// Subscription keys under `topic_name` in creation order (4.H).
    pub fn subscription_keys_in_order(&self, topic_name: &str) -> Vec<(String, String)> {
        self.subscription_order
            .iter()
            .filter(|(t, _)| t == topic_name)
            .cloned()
            .collect()
    }

    // ───────────────────────────── Queues ─────────────────────────────

    pub fn create_queue(&mut self, name: &str, properties: QueueProperties) -> Result<()> {
        name::validate_queue(name)?;
        if self.queues.contains_key(name) {
            return Err(BrokerError::EntityAlreadyExists(name.to_string()));
        }
        if self.queues.len() >= self.quotas.max_queues {
            return Err(BrokerError::QuotaExceeded(format!(
                "max_queues ({}) reached",
                self.quotas.max_queues
            )));
        }
        self.queues.insert(
            name.to_string(),
            QueueEntry {
                description: QueueDescription {
                    name: name.to_string(),
                    properties,
                    runtime: Default::default(),
                },
                backlog: Backlog::new(),
                locks: LockTable::new(),
                dead_letters: DeadLetterSink::new(),
            },
        );
        Ok(())
    }

    pub fn get_queue(&self, name: &str) -> Result<&QueueDescription> {
        self.queue_entry(name).map(|e| &e.description)
    }

    pub fn list_queues(&self) -> Vec<&QueueDescription> {
        let mut v: Vec<_> = self.queues.values().map(|e| &e.description).collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }

    pub fn update_queue(&mut self, name: &str, properties: QueueProperties) -> Result<()> {
        let entry = self.queue_entry_mut(name)?;
        entry.description.properties = properties;
        Ok(())
    }

    pub fn delete_queue(&mut self, name: &str) -> Result<()> {
        self.queues
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BrokerError::EntityNotFound(name.to_string()))
    }

    pub fn queue_entry(&self, name: &str) -> Result<&QueueEntry> {
        self.queues
            .get(name)
            .ok_or_else(|| BrokerError::EntityNotFound(name.to_string()))
    }

    pub fn queue_entry_mut(&mut self, name: &str) -> Result<&mut QueueEntry> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| BrokerError::EntityNotFound(name.to_string()))
    }

    // ───────────────────────────── Topics ─────────────────────────────

    pub fn create_topic(&mut self, name: &str, properties: TopicProperties) -> Result<()> {
        name::validate_topic(name)?;
        if self.topics.contains_key(name) {
            return Err(BrokerError::EntityAlreadyExists(name.to_string()));
        }
        if self.topics.len() >= self.quotas.max_topics {
            return Err(BrokerError::QuotaExceeded(format!(
                "max_topics ({}) reached",
                self.quotas.max_topics
            )));
        }
        self.topics.insert(
            name.to_string(),
            TopicEntry {
                description: TopicDescription {
                    name: name.to_string(),
                    properties,
                    runtime: Default::default(),
                },
            },
        );
        Ok(())
    }

    pub fn get_topic(&self, name: &str) -> Result<&TopicDescription> {
        self.topics
            .get(name)
            .map(|e| &e.description)
            .ok_or_else(|| BrokerError::EntityNotFound(name.to_string()))
    }

    pub fn list_topics(&self) -> Vec<&TopicDescription> {
        let mut v: Vec<_> = self.topics.values().map(|e| &e.description).collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }

    pub fn update_topic(&mut self, name: &str, properties: TopicProperties) -> Result<()> {
        let entry = self
            .topics
            .get_mut(name)
            .ok_or_else(|| BrokerError::EntityNotFound(name.to_string()))?;
        entry.description.properties = properties;
        Ok(())
    }

    pub fn topic_entry_mut(&mut self, name: &str) -> Result<&mut TopicEntry> {
        self.topics
            .get_mut(name)
            .ok_or_else(|| BrokerError::EntityNotFound(name.to_string()))
    }

    /// Deletes the topic and cascades to every one of its subscriptions
    /// (and their backlogs, locks, dead letters) — spec.md §4.C.
    pub fn delete_topic(&mut self, name: &str) -> Result<()> {
        if self.topics.remove(name).is_none() {
            return Err(BrokerError::EntityNotFound(name.to_string()));
        }
        self.subscriptions.retain(|(topic, _), _| topic != name);
        self.subscription_order.retain(|(topic, _)| topic != name);
        Ok(())
    }

    // ───────────────────────────── Subscriptions ─────────────────────────────

    pub fn create_subscription(
        &mut self,
        topic_name: &str,
        sub_name: &str,
        properties: SubscriptionProperties,
        now: SystemTime,
    ) -> Result<()> {
        self.get_topic(topic_name)?;
        name::validate_subscription(sub_name)?;
        let key = (topic_name.to_string(), sub_name.to_string());
        if self.subscriptions.contains_key(&key) {
            return Err(BrokerError::EntityAlreadyExists(sub_name.to_string()));
        }
        let count = self
            .subscriptions
            .keys()
            .filter(|(t, _)| t == topic_name)
            .count();
        if count >= self.quotas.max_subscriptions_per_topic {
            return Err(BrokerError::QuotaExceeded(format!(
                "max_subscriptions_per_topic ({}) reached for topic '{}'",
                self.quotas.max_subscriptions_per_topic, topic_name
            )));
        }
        self.subscription_order.push(key.clone());
        self.subscriptions.insert(
            key,
            SubscriptionEntry {
                description: SubscriptionDescription {
                    topic_name: topic_name.to_string(),
                    name: sub_name.to_string(),
                    properties,
                    runtime: Default::default(),
                    rules: vec![RuleDescription {
                        name: DEFAULT_RULE_NAME.to_string(),
                        filter: crate::model::Filter::True,
                        created_at: now,
                    }],
                },
                backlog: Backlog::new(),
                locks: LockTable::new(),
                dead_letters: DeadLetterSink::new(),
            },
        );
        Ok(())
    }

    pub fn get_subscription(&self, topic_name: &str, sub_name: &str) -> Result<&SubscriptionDescription> {
        self.subscription_entry(topic_name, sub_name).map(|e| &e.description)
    }

    pub fn list_subscriptions(&self, topic_name: &str) -> Vec<&SubscriptionDescription> {
        let mut v: Vec<_> = self
            .subscriptions
            .iter()
            .filter(|((t, _), _)| t == topic_name)
            .map(|(_, e)| &e.description)
            .collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }

    pub fn update_subscription(
        &mut self,
        topic_name: &str,
        sub_name: &str,
        properties: SubscriptionProperties,
    ) -> Result<()> {
        let entry = self.subscription_entry_mut(topic_name, sub_name)?;
        entry.description.properties = properties;
        Ok(())
    }

    pub fn delete_subscription(&mut self, topic_name: &str, sub_name: &str) -> Result<()> {
        let key = (topic_name.to_string(), sub_name.to_string());
        self.subscriptions
            .remove(&key)
            .ok_or_else(|| BrokerError::EntityNotFound(sub_name.to_string()))?;
        self.subscription_order.retain(|k| k != &key);
        Ok(())
    }

    pub fn subscription_entry(&self, topic_name: &str, sub_name: &str) -> Result<&SubscriptionEntry> {
        self.subscriptions
            .get(&(topic_name.to_string(), sub_name.to_string()))
            .ok_or_else(|| BrokerError::EntityNotFound(sub_name.to_string()))
    }

    pub fn subscription_entry_mut(
        &mut self,
        topic_name: &str,
        sub_name: &str,
    ) -> Result<&mut SubscriptionEntry> {
        self.subscriptions
            .get_mut(&(topic_name.to_string(), sub_name.to_string()))
            .ok_or_else(|| BrokerError::EntityNotFound(sub_name.to_string()))
    }


    // ───────────────────────────── Rules ─────────────────────────────

    pub fn add_rule(
        &mut self,
        topic_name: &str,
        sub_name: &str,
        rule: RuleDescription,
    ) -> Result<()> {
        name::validate_rule(&rule.name)?;
        let max_rules = self.quotas.max_rules_per_subscription;
        let entry = self.subscription_entry_mut(topic_name, sub_name)?;
        if entry.description.rules.iter().any(|r| r.name == rule.name) {
            return Err(BrokerError::RuleAlreadyExists(rule.name));
        }
        if entry.description.rules.len() >= max_rules {
            return Err(BrokerError::QuotaExceeded(format!(
                "max_rules_per_subscription ({}) reached",
                max_rules
            )));
        }
        entry.description.rules.push(rule);
        Ok(())
    }

    pub fn update_rule(
        &mut self,
        topic_name: &str,
        sub_name: &str,
        rule_name: &str,
        filter: crate::model::Filter,
    ) -> Result<()> {
        let entry = self.subscription_entry_mut(topic_name, sub_name)?;
        let rule = entry
            .description
            .rules
            .iter_mut()
            .find(|r| r.name == rule_name)
            .ok_or_else(|| BrokerError::RuleNotFound(rule_name.to_string()))?;
        rule.filter = filter;
        Ok(())
    }

    pub fn delete_rule(&mut self, topic_name: &str, sub_name: &str, rule_name: &str) -> Result<()> {
        let entry = self.subscription_entry_mut(topic_name, sub_name)?;
        let before = entry.description.rules.len();
        entry.description.rules.retain(|r| r.name != rule_name);
        if entry.description.rules.len() == before {
            return Err(BrokerError::RuleNotFound(rule_name.to_string()));
        }
        Ok(())
    }

    pub fn list_rules(&self, topic_name: &str, sub_name: &str) -> Result<&[RuleDescription]> {
        self.get_subscription(topic_name, sub_name).map(|s| s.rules.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_delete_queue_round_trip() {
        let mut store = Store::new(Quotas::default());
        store.create_queue("orders", QueueProperties::default()).unwrap();
        assert!(store.get_queue("orders").is_ok());
        store.delete_queue("orders").unwrap();
        assert!(matches!(store.get_queue("orders"), Err(BrokerError::EntityNotFound(_))));
    }

    #[test]
    fn duplicate_queue_name_rejected() {
        let mut store = Store::new(Quotas::default());
        store.create_queue("orders", QueueProperties::default()).unwrap();
        let err = store.create_queue("orders", QueueProperties::default()).unwrap_err();
        assert!(matches!(err, BrokerError::EntityAlreadyExists(_)));
    }

    #[test]
    fn queue_quota_enforced() {
        let mut store = Store::new(Quotas {
            max_queues: 1,
            ..Quotas::default()
        });
        store.create_queue("a", QueueProperties::default()).unwrap();
        let err = store.create_queue("b", QueueProperties::default()).unwrap_err();
        assert!(matches!(err, BrokerError::QuotaExceeded(_)));
    }

    #[test]
    fn subscription_requires_existing_topic() {
        let mut store = Store::new(Quotas::default());
        let err = store
            .create_subscription("nope", "sub", SubscriptionProperties::default(), SystemTime::now())
            .unwrap_err();
        assert!(matches!(err, BrokerError::EntityNotFound(_)));
    }

    #[test]
    fn new_subscription_gets_default_rule() {
        let mut store = Store::new(Quotas::default());
        store.create_topic("t", TopicProperties::default()).unwrap();
        store
            .create_subscription("t", "s", SubscriptionProperties::default(), SystemTime::now())
            .unwrap();
        let sub = store.get_subscription("t", "s").unwrap();
        assert_eq!(sub.rules.len(), 1);
        assert_eq!(sub.rules[0].name, DEFAULT_RULE_NAME);
    }

    #[test]
    fn delete_topic_cascades_to_subscriptions() {
        let mut store = Store::new(Quotas::default());
        store.create_topic("t", TopicProperties::default()).unwrap();
        store
            .create_subscription("t", "s", SubscriptionProperties::default(), SystemTime::now())
            .unwrap();
        store.delete_topic("t").unwrap();
        assert!(matches!(
            store.get_subscription("t", "s"),
            Err(BrokerError::EntityNotFound(_))
        ));
    }

    #[test]
    fn subscription_order_reflects_creation_sequence() {
        let mut store = Store::new(Quotas::default());
        store.create_topic("t", TopicProperties::default()).unwrap();
        store
            .create_subscription("t", "second", SubscriptionProperties::default(), SystemTime::now())
            .unwrap();
        store
            .create_subscription("t", "first", SubscriptionProperties::default(), SystemTime::now())
            .unwrap();
        let order = store.subscription_keys_in_order("t");
        assert_eq!(order, vec![
            ("t".to_string(), "second".to_string()),
            ("t".to_string(), "first".to_string()),
        ]);
    }

    #[test]
    fn rule_crud_and_duplicate_rejected() {
        let mut store = Store::new(Quotas::default());
        store.create_topic("t", TopicProperties::default()).unwrap();
        store
            .create_subscription("t", "s", SubscriptionProperties::default(), SystemTime::now())
            .unwrap();
        store
            .add_rule(
                "t",
                "s",
                RuleDescription {
                    name: "r1".into(),
                    filter: crate::model::Filter::True,
                    created_at: SystemTime::now(),
                },
            )
            .unwrap();
        let err = store
            .add_rule(
                "t",
                "s",
                RuleDescription {
                    name: "r1".into(),
                    filter: crate::model::Filter::True,
                    created_at: SystemTime::now(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, BrokerError::RuleAlreadyExists(_)));
        store.delete_rule("t", "s", "r1").unwrap();
        assert!(matches!(
            store.delete_rule("t", "s", "r1"),
            Err(BrokerError::RuleNotFound(_))
        ));
    }
}
