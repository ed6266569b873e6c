//! Broker façade (component K, [ADDED]): the single type that owns the
//! entity store and wires the lifecycle engine, fan-out router, and
//! ports together behind one mutex (§5). This is glue, not new
//! engineering surface — every method below just validates, takes the
//! lock, delegates to `store`/`lifecycle`/`fanout`, and reports.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::lifecycle::{queue as lc_queue, subscription as lc_sub};
use crate::model::{
    Message, QueueDescription, QueueProperties, ReceiveMode, RuleDescription, SendRequest,
    SubscriptionDescription, SubscriptionProperties, TopicDescription, TopicProperties,
};
use crate::ports::persistence::{MutationRecord, PersistenceSink};
use crate::ports::{AuditEvent, AuditSink, Logger, LogRecord, MetricsSink, NoopRateLimiter, NullAuditSink, RateLimitDecision, RateLimiter, TracingLogger};
use crate::ports::InMemoryMetrics;
use crate::store::Store;
use crate::{fanout, model};

pub struct Broker {
    state: Mutex<Store>,
    config: BrokerConfig,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<dyn MetricsSink>,
    persistence: Option<Arc<dyn PersistenceSink>>,
    rate_limiter: Arc<dyn RateLimiter>,
    logger: Arc<dyn Logger>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self::with_ports(
            config,
            Arc::new(NullAuditSink),
            Arc::new(InMemoryMetrics::new()),
            None,
            Arc::new(NoopRateLimiter),
            Arc::new(TracingLogger),
        )
    }

    pub fn with_ports(
        config: BrokerConfig,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<dyn MetricsSink>,
        persistence: Option<Arc<dyn PersistenceSink>>,
        rate_limiter: Arc<dyn RateLimiter>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let quotas = config.quotas();
        Self {
            state: Mutex::new(Store::new(quotas)),
            config,
            audit,
            metrics,
            persistence,
            rate_limiter,
            logger,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn admit(&self, entity_name: &str) -> Result<()> {
        match self.rate_limiter.check(entity_name) {
            RateLimitDecision::Allow => Ok(()),
            RateLimitDecision::RetryAfter(d) => Err(BrokerError::QuotaExceeded(format!(
                "rate limited, retry after {:?}",
                d
            ))),
        }
    }

    fn report(&self, operation: &str, entity_type: &str, entity_name: &str, outcome: &str) {
        self.logger.log(LogRecord {
            operation: operation.to_string(),
            entity_type: entity_type.to_string(),
            entity_name: entity_name.to_string(),
            outcome: outcome.to_string(),
        });
        self.audit.record(AuditEvent {
            event_type: operation.to_string(),
            entity_type: entity_type.to_string(),
            entity_name: entity_name.to_string(),
            user: None,
            timestamp: self.now(),
            version: 1,
            fields: Default::default(),
        });
        self.metrics.incr_counter(
            &format!("{operation}_total"),
            &[("entity_type", entity_type), ("outcome", outcome)],
        );
    }

    /// Appends one mutation record to the persistence log, if a
    /// persistence sink is configured (§6 "Persisted state layout").
    fn persist(&self, record: MutationRecord) {
        if let Some(persistence) = &self.persistence {
            persistence.append_log(record);
        }
    }

    // ───────────────────────────── Queues ─────────────────────────────

    pub fn create_queue(&self, name: &str, properties: QueueProperties) -> Result<QueueDescription> {
        self.admit(name)?;
        let mut store = self.state.lock().unwrap();
        store.create_queue(name, properties)?;
        let description = store.get_queue(name)?.clone();
        drop(store);
        self.report("create", "queue", name, "ok");
        self.persist(MutationRecord::QueueCreated { name: name.into() });
        Ok(description)
    }

    pub fn get_queue(&self, name: &str) -> Result<QueueDescription> {
        self.state.lock().unwrap().get_queue(name).map(|d| d.clone())
    }

    pub fn list_queues(&self) -> Vec<QueueDescription> {
        self.state.lock().unwrap().list_queues().into_iter().cloned().collect()
    }

    pub fn update_queue(&self, name: &str, properties: QueueProperties) -> Result<QueueDescription> {
        let mut store = self.state.lock().unwrap();
        store.update_queue(name, properties)?;
        let description = store.get_queue(name)?.clone();
        drop(store);
        self.report("update", "queue", name, "ok");
        self.persist(MutationRecord::QueueUpdated { name: name.into() });
        Ok(description)
    }

    pub fn delete_queue(&self, name: &str) -> Result<()> {
        self.state.lock().unwrap().delete_queue(name)?;
        self.report("delete", "queue", name, "ok");
        self.persist(MutationRecord::QueueDeleted { name: name.into() });
        Ok(())
    }

    // ───────────────────────────── Topics ─────────────────────────────

    pub fn create_topic(&self, name: &str, properties: TopicProperties) -> Result<TopicDescription> {
        self.admit(name)?;
        let mut store = self.state.lock().unwrap();
        store.create_topic(name, properties)?;
        let description = store.get_topic(name)?.clone();
        drop(store);
        self.report("create", "topic", name, "ok");
        self.persist(MutationRecord::TopicCreated { name: name.into() });
        Ok(description)
    }

    pub fn get_topic(&self, name: &str) -> Result<TopicDescription> {
        self.state.lock().unwrap().get_topic(name).map(|d| d.clone())
    }

    pub fn list_topics(&self) -> Vec<TopicDescription> {
        self.state.lock().unwrap().list_topics().into_iter().cloned().collect()
    }

    pub fn update_topic(&self, name: &str, properties: TopicProperties) -> Result<TopicDescription> {
        let mut store = self.state.lock().unwrap();
        store.update_topic(name, properties)?;
        let description = store.get_topic(name)?.clone();
        drop(store);
        self.report("update", "topic", name, "ok");
        self.persist(MutationRecord::TopicUpdated { name: name.into() });
        Ok(description)
    }

    pub fn delete_topic(&self, name: &str) -> Result<()> {
        self.state.lock().unwrap().delete_topic(name)?;
        self.report("delete", "topic", name, "ok");
        self.persist(MutationRecord::TopicDeleted { name: name.into() });
        Ok(())
    }

    // ───────────────────────────── Subscriptions ─────────────────────────────

    pub fn create_subscription(
        &self,
        topic_name: &str,
        sub_name: &str,
        properties: SubscriptionProperties,
    ) -> Result<SubscriptionDescription> {
        self.admit(sub_name)?;
        let now = self.now();
        let mut store = self.state.lock().unwrap();
        store.create_subscription(topic_name, sub_name, properties, now)?;
        let description = store.get_subscription(topic_name, sub_name)?.clone();
        drop(store);
        self.report("create", "subscription", sub_name, "ok");
        self.persist(MutationRecord::SubscriptionCreated {
            topic: topic_name.into(),
            name: sub_name.into(),
        });
        Ok(description)
    }

    pub fn get_subscription(&self, topic_name: &str, sub_name: &str) -> Result<SubscriptionDescription> {
        self.state
            .lock()
            .unwrap()
            .get_subscription(topic_name, sub_name)
            .map(|d| d.clone())
    }

    pub fn list_subscriptions(&self, topic_name: &str) -> Vec<SubscriptionDescription> {
        self.state
            .lock()
            .unwrap()
            .list_subscriptions(topic_name)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn update_subscription(
        &self,
        topic_name: &str,
        sub_name: &str,
        properties: SubscriptionProperties,
    ) -> Result<SubscriptionDescription> {
        let mut store = self.state.lock().unwrap();
        store.update_subscription(topic_name, sub_name, properties)?;
        let description = store.get_subscription(topic_name, sub_name)?.clone();
        drop(store);
        self.report("update", "subscription", sub_name, "ok");
        self.persist(MutationRecord::SubscriptionUpdated {
            topic: topic_name.into(),
            name: sub_name.into(),
        });
        Ok(description)
    }

    pub fn delete_subscription(&self, topic_name: &str, sub_name: &str) -> Result<()> {
        self.state.lock().unwrap().delete_subscription(topic_name, sub_name)?;
        self.report("delete", "subscription", sub_name, "ok");
        self.persist(MutationRecord::SubscriptionDeleted {
            topic: topic_name.into(),
            name: sub_name.into(),
        });
        Ok(())
    }

    // ───────────────────────────── Rules ─────────────────────────────

    pub fn add_rule(&self, topic_name: &str, sub_name: &str, rule: RuleDescription) -> Result<()> {
        let rule_name = rule.name.clone();
        self.state.lock().unwrap().add_rule(topic_name, sub_name, rule)?;
        self.report("add_rule", "subscription", sub_name, "ok");
        self.persist(MutationRecord::RuleAdded {
            topic: topic_name.into(),
            subscription: sub_name.into(),
            rule: rule_name,
        });
        Ok(())
    }

    pub fn update_rule(
        &self,
        topic_name: &str,
        sub_name: &str,
        rule_name: &str,
        filter: model::Filter,
    ) -> Result<()> {
        self.state.lock().unwrap().update_rule(topic_name, sub_name, rule_name, filter)?;
        self.report("update_rule", "subscription", sub_name, "ok");
        self.persist(MutationRecord::RuleUpdated {
            topic: topic_name.into(),
            subscription: sub_name.into(),
            rule: rule_name.into(),
        });
        Ok(())
    }

    pub fn delete_rule(&self, topic_name: &str, sub_name: &str, rule_name: &str) -> Result<()> {
        self.state.lock().unwrap().delete_rule(topic_name, sub_name, rule_name)?;
        self.report("delete_rule", "subscription", sub_name, "ok");
        self.persist(MutationRecord::RuleDeleted {
            topic: topic_name.into(),
            subscription: sub_name.into(),
            rule: rule_name.into(),
        });
        Ok(())
    }

    pub fn list_rules(&self, topic_name: &str, sub_name: &str) -> Result<Vec<RuleDescription>> {
        self.state
            .lock()
            .unwrap()
            .list_rules(topic_name, sub_name)
            .map(|r| r.to_vec())
    }

    // ───────────────────────────── Messaging: queues ─────────────────────────────

    pub fn send(&self, queue_name: &str, request: SendRequest) -> Result<Message> {
        self.admit(queue_name)?;
        let now = self.now();
        let max_bytes = self.config.max_message_bytes;
        let sent = lc_queue::send(&mut self.state.lock().unwrap(), queue_name, request, now, max_bytes)?;
        self.report("send", "queue", queue_name, "ok");
        self.persist(MutationRecord::MessageSent {
            queue: queue_name.into(),
            message_id: sent.message_id.clone(),
        });
        Ok(sent)
    }

    pub fn receive(&self, queue_name: &str, mode: ReceiveMode, max: usize) -> Result<Vec<Message>> {
        let now = self.now();
        let received = lc_queue::receive(&mut self.state.lock().unwrap(), queue_name, mode, max, now)?;
        self.report("receive", "queue", queue_name, "ok");
        Ok(received)
    }

    pub fn complete(&self, queue_name: &str, token: Uuid) -> Result<Message> {
        let now = self.now();
        let result = lc_queue::complete(&mut self.state.lock().unwrap(), queue_name, &token, now);
        self.report("complete", "queue", queue_name, outcome_of(&result));
        if let Ok(message) = &result {
            self.persist(MutationRecord::MessageCompleted {
                entity: queue_name.into(),
                message_id: message.message_id.clone(),
            });
        }
        result
    }

    pub fn abandon(&self, queue_name: &str, token: Uuid) -> Result<()> {
        let now = self.now();
        let mut store = self.state.lock().unwrap();
        let message_id = store
            .queue_entry(queue_name)
            .ok()
            .and_then(|e| e.locks.peek(&token))
            .map(|m| m.message_id.clone());
        let result = lc_queue::abandon(&mut store, queue_name, &token, now);
        drop(store);
        self.report("abandon", "queue", queue_name, outcome_of(&result));
        if result.is_ok() {
            if let Some(message_id) = message_id {
                self.persist(MutationRecord::MessageAbandoned { entity: queue_name.into(), message_id });
            }
        }
        result
    }

    pub fn dead_letter(
        &self,
        queue_name: &str,
        token: Uuid,
        reason: String,
        description: Option<String>,
    ) -> Result<()> {
        let now = self.now();
        let mut store = self.state.lock().unwrap();
        let message_id = store
            .queue_entry(queue_name)
            .ok()
            .and_then(|e| e.locks.peek(&token))
            .map(|m| m.message_id.clone());
        let result = lc_queue::dead_letter(&mut store, queue_name, &token, reason.clone(), description, now);
        drop(store);
        self.report("dead_letter", "queue", queue_name, outcome_of(&result));
        if result.is_ok() {
            if let Some(message_id) = message_id {
                self.persist(MutationRecord::MessageDeadLettered { entity: queue_name.into(), message_id, reason });
            }
        }
        result
    }

    pub fn renew_lock(&self, queue_name: &str, token: Uuid) -> Result<SystemTime> {
        let now = self.now();
        let result = lc_queue::renew_lock(&mut self.state.lock().unwrap(), queue_name, &token, now);
        self.report("renew_lock", "queue", queue_name, outcome_of(&result));
        result
    }

    pub fn list_dead_letter_queue(&self, queue_name: &str) -> Result<Vec<Message>> {
        let store = self.state.lock().unwrap();
        let entry = store.queue_entry(queue_name)?;
        Ok(entry.dead_letters.iter().cloned().collect())
    }

    // ───────────────────────────── Messaging: topics/subscriptions ─────────────────────────────

    pub fn publish(&self, topic_name: &str, request: SendRequest) -> Result<Message> {
        self.admit(topic_name)?;
        let now = self.now();
        let max_bytes = self.config.max_message_bytes;
        let published = fanout::publish(
            &mut self.state.lock().unwrap(),
            topic_name,
            request,
            now,
            max_bytes,
            self.audit.as_ref(),
        )?;
        self.report("publish", "topic", topic_name, "ok");
        self.persist(MutationRecord::MessagePublished {
            topic: topic_name.into(),
            message_id: published.message_id.clone(),
        });
        Ok(published)
    }

    pub fn receive_from_subscription(
        &self,
        topic_name: &str,
        sub_name: &str,
        mode: ReceiveMode,
        max: usize,
    ) -> Result<Vec<Message>> {
        let now = self.now();
        let received = lc_sub::receive(&mut self.state.lock().unwrap(), topic_name, sub_name, mode, max, now)?;
        self.report("receive", "subscription", sub_name, "ok");
        Ok(received)
    }

    pub fn complete_subscription(&self, topic_name: &str, sub_name: &str, token: Uuid) -> Result<Message> {
        let now = self.now();
        let result = lc_sub::complete(&mut self.state.lock().unwrap(), topic_name, sub_name, &token, now);
        self.report("complete", "subscription", sub_name, outcome_of(&result));
        if let Ok(message) = &result {
            self.persist(MutationRecord::MessageCompleted {
                entity: format!("{topic_name}/{sub_name}"),
                message_id: message.message_id.clone(),
            });
        }
        result
    }

    pub fn abandon_subscription(&self, topic_name: &str, sub_name: &str, token: Uuid) -> Result<()> {
        let now = self.now();
        let mut store = self.state.lock().unwrap();
        let message_id = store
            .subscription_entry(topic_name, sub_name)
            .ok()
            .and_then(|e| e.locks.peek(&token))
            .map(|m| m.message_id.clone());
        let result = lc_sub::abandon(&mut store, topic_name, sub_name, &token, now);
        drop(store);
        self.report("abandon", "subscription", sub_name, outcome_of(&result));
        if result.is_ok() {
            if let Some(message_id) = message_id {
                self.persist(MutationRecord::MessageAbandoned {
                    entity: format!("{topic_name}/{sub_name}"),
                    message_id,
                });
            }
        }
        result
    }

    pub fn dead_letter_subscription(
        &self,
        topic_name: &str,
        sub_name: &str,
        token: Uuid,
        reason: String,
        description: Option<String>,
    ) -> Result<()> {
        let now = self.now();
        let mut store = self.state.lock().unwrap();
        let message_id = store
            .subscription_entry(topic_name, sub_name)
            .ok()
            .and_then(|e| e.locks.peek(&token))
            .map(|m| m.message_id.clone());
        let result = lc_sub::dead_letter(&mut store, topic_name, sub_name, &token, reason.clone(), description, now);
        drop(store);
        self.report("dead_letter", "subscription", sub_name, outcome_of(&result));
        if result.is_ok() {
            if let Some(message_id) = message_id {
                self.persist(MutationRecord::MessageDeadLettered {
                    entity: format!("{topic_name}/{sub_name}"),
                    message_id,
                    reason,
                });
            }
        }
        result
    }

    pub fn renew_lock_subscription(&self, topic_name: &str, sub_name: &str, token: Uuid) -> Result<SystemTime> {
        let now = self.now();
        let result = lc_sub::renew_lock(&mut self.state.lock().unwrap(), topic_name, sub_name, &token, now);
        self.report("renew_lock", "subscription", sub_name, outcome_of(&result));
        result
    }

    pub fn list_dead_letter_subscription(&self, topic_name: &str, sub_name: &str) -> Result<Vec<Message>> {
        let store = self.state.lock().unwrap();
        let entry = store.subscription_entry(topic_name, sub_name)?;
        Ok(entry.dead_letters.iter().cloned().collect())
    }

    // ───────────────────────────── Maintenance (4.I) ─────────────────────────────

    /// One pass: sweep every entity's expired leases and refresh runtime
    /// gauges. Called by the background task and safe to call directly
    /// (e.g. from tests) since it never suspends.
    pub fn run_maintenance_pass(&self) {
        let now = self.now();
        let mut store = self.state.lock().unwrap();

        let queue_names: Vec<String> = store.list_queues().iter().map(|q| q.name.clone()).collect();
        for name in &queue_names {
            let _ = lc_queue::sweep(&mut store, name, now);
            if let Ok(entry) = store.queue_entry_mut(name) {
                entry.description.runtime.active_message_count = entry.backlog.len() as u64 - entry.backlog.scheduled_count(now) as u64;
                entry.description.runtime.scheduled_message_count = entry.backlog.scheduled_count(now) as u64;
                entry.description.runtime.locked_message_count = entry.locks.len() as u64;
                entry.description.runtime.dead_letter_message_count = entry.dead_letters.len() as u64;
                entry.description.runtime.size_in_bytes = entry.backlog.total_bytes();
            }
        }

        let topic_names: Vec<String> = store.list_topics().iter().map(|t| t.name.clone()).collect();
        for topic_name in &topic_names {
            let sub_keys = store.subscription_keys_in_order(topic_name);
            let mut topic_scheduled = 0u64;
            for (topic, sub) in &sub_keys {
                let _ = lc_sub::sweep(&mut store, topic, sub, now);
                if let Ok(entry) = store.subscription_entry_mut(topic, sub) {
                    entry.description.runtime.active_message_count = entry.backlog.len() as u64 - entry.backlog.scheduled_count(now) as u64;
                    entry.description.runtime.scheduled_message_count = entry.backlog.scheduled_count(now) as u64;
                    entry.description.runtime.locked_message_count = entry.locks.len() as u64;
                    entry.description.runtime.dead_letter_message_count = entry.dead_letters.len() as u64;
                    topic_scheduled += entry.backlog.scheduled_count(now) as u64;
                }
            }
            if let Ok(entry) = store.topic_entry_mut(topic_name) {
                entry.description.runtime.subscription_count = sub_keys.len() as u64;
                entry.description.runtime.scheduled_message_count = topic_scheduled;
            }
        }

        self.metrics.set_gauge("queues_total", queue_names.len() as f64, &[]);
        self.metrics.set_gauge("topics_total", topic_names.len() as f64, &[]);
    }
}

fn outcome_of<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_send_receive_complete_round_trip() {
        let broker = Broker::new(BrokerConfig::default());
        broker.create_queue("orders", QueueProperties::default()).unwrap();
        broker
            .send("orders", SendRequest { body: b"A".to_vec(), ..Default::default() })
            .unwrap();

        let received = broker.receive("orders", ReceiveMode::PeekLock, 1).unwrap();
        assert_eq!(received.len(), 1);
        let token = received[0].lock_token.unwrap();
        broker.complete("orders", token).unwrap();

        let again = broker.receive("orders", ReceiveMode::PeekLock, 1).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn maintenance_pass_refreshes_gauges() {
        let broker = Broker::new(BrokerConfig::default());
        broker.create_queue("orders", QueueProperties::default()).unwrap();
        broker
            .send("orders", SendRequest { body: b"A".to_vec(), ..Default::default() })
            .unwrap();
        broker.run_maintenance_pass();
        let q = broker.get_queue("orders").unwrap();
        assert_eq!(q.runtime.active_message_count, 1);
    }

    #[test]
    fn maintenance_pass_refreshes_topic_runtime_counters() {
        let broker = Broker::new(BrokerConfig::default());
        broker.create_topic("t", TopicProperties::default()).unwrap();
        broker.create_subscription("t", "s1", SubscriptionProperties::default()).unwrap();
        broker.create_subscription("t", "s2", SubscriptionProperties::default()).unwrap();
        broker.run_maintenance_pass();
        let t = broker.get_topic("t").unwrap();
        assert_eq!(t.runtime.subscription_count, 2);
        assert_eq!(t.runtime.scheduled_message_count, 0);
    }

    #[test]
    fn publish_and_receive_from_subscription() {
        let broker = Broker::new(BrokerConfig::default());
        broker.create_topic("t", TopicProperties::default()).unwrap();
        broker
            .create_subscription("t", "s", SubscriptionProperties::default())
            .unwrap();
        broker
            .publish("t", SendRequest { body: b"hi".to_vec(), ..Default::default() })
            .unwrap();
        let msgs = broker
            .receive_from_subscription("t", "s", ReceiveMode::ReceiveAndDelete, 10)
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].body, b"hi");
    }
}
