//! Fan-out Router (component H): turns one topic publish into zero or
//! more per-subscription backlog appends (4.H). Runs entirely under the
//! store's mutex; no suspension anywhere in this path (§5).

use std::collections::HashMap;
use std::time::SystemTime;

use crate::error::{BrokerError, Result};
use crate::filter;
use crate::model::{Message, SendRequest};
use crate::ports::{AuditEvent, AuditSink};
use crate::store::Store;

/// Publish `request` to `topic_name`. Returns the broker's view of the
/// published message; its `sequence_number` is 0 since each matching
/// subscription assigns its own independent sequence (spec.md 4.G
/// `publish`). Emits one `filter_evaluated` audit event per subscription
/// examined and one aggregate `fan_out` event carrying how many of the
/// topic's subscriptions matched out of the total (4.H step 4).
pub fn publish(
    store: &mut Store,
    topic_name: &str,
    request: SendRequest,
    now: SystemTime,
    max_message_bytes: usize,
    audit: &dyn AuditSink,
) -> Result<Message> {
    let topic = store.get_topic(topic_name)?;
    let default_ttl = topic.properties.default_message_time_to_live;
    let published = Message::from_request(request, default_ttl, now);
    let size = published.size_bytes();
    if size > max_message_bytes {
        return Err(BrokerError::MessageTooLarge {
            size,
            limit: max_message_bytes,
        });
    }

    let sub_keys = store.subscription_keys_in_order(topic_name);
    let total = sub_keys.len();
    let mut matched = 0usize;
    for (topic_name, sub_name) in &sub_keys {
        let entry = store.subscription_entry_mut(topic_name, sub_name)?;
        let is_match = filter::any_rule_matches(&entry.description.rules, &published);
        audit.record(AuditEvent {
            event_type: "filter_evaluated".to_string(),
            entity_type: "subscription".to_string(),
            entity_name: sub_name.clone(),
            user: None,
            timestamp: now,
            version: 1,
            fields: HashMap::from([
                ("topic".to_string(), topic_name.clone()),
                ("matched".to_string(), is_match.to_string()),
            ]),
        });
        if is_match {
            matched += 1;
            let clone = published.clone_for_subscription();
            entry.backlog.push(clone, now);
        }
    }

    audit.record(AuditEvent {
        event_type: "fan_out".to_string(),
        entity_type: "topic".to_string(),
        entity_name: topic_name.to_string(),
        user: None,
        timestamp: now,
        version: 1,
        fields: HashMap::from([
            ("matched".to_string(), matched.to_string()),
            ("total".to_string(), total.to_string()),
        ]),
    });

    Ok(published)
}
