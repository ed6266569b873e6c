//! Subscription-facing lifecycle operations (4.G, the symmetric analog
//! of `queue.rs`). Subscriptions never accept `send`/`publish` directly
//! — messages arrive only via the fan-out router (4.H).

use std::time::SystemTime;

use uuid::Uuid;

use crate::error::Result;
use crate::lifecycle::common::EntityHandle;
use crate::model::{Message, ReceiveMode};
use crate::store::{Store, SubscriptionEntry};

fn handle(entry: &mut SubscriptionEntry) -> EntityHandle<'_> {
    EntityHandle {
        backlog: &mut entry.backlog,
        locks: &mut entry.locks,
        dead_letters: &mut entry.dead_letters,
        lock_duration: entry.description.properties.lock_duration,
        max_delivery_count: entry.description.properties.max_delivery_count,
    }
}

pub fn receive(
    store: &mut Store,
    topic_name: &str,
    sub_name: &str,
    mode: ReceiveMode,
    max: usize,
    now: SystemTime,
) -> Result<Vec<Message>> {
    let entry = store.subscription_entry_mut(topic_name, sub_name)?;
    let mut h = handle(entry);
    Ok(match mode {
        ReceiveMode::PeekLock => h.receive_peek_lock(max, now),
        ReceiveMode::ReceiveAndDelete => h.receive_and_delete(max, now),
    })
}

pub fn complete(
    store: &mut Store,
    topic_name: &str,
    sub_name: &str,
    token: &Uuid,
    now: SystemTime,
) -> Result<Message> {
    handle(store.subscription_entry_mut(topic_name, sub_name)?).complete(token, now)
}

pub fn abandon(
    store: &mut Store,
    topic_name: &str,
    sub_name: &str,
    token: &Uuid,
    now: SystemTime,
) -> Result<()> {
    handle(store.subscription_entry_mut(topic_name, sub_name)?).abandon(token, now)
}

pub fn dead_letter(
    store: &mut Store,
    topic_name: &str,
    sub_name: &str,
    token: &Uuid,
    reason: String,
    description: Option<String>,
    now: SystemTime,
) -> Result<()> {
    handle(store.subscription_entry_mut(topic_name, sub_name)?).dead_letter(token, reason, description, now)
}

pub fn renew_lock(
    store: &mut Store,
    topic_name: &str,
    sub_name: &str,
    token: &Uuid,
    now: SystemTime,
) -> Result<SystemTime> {
    handle(store.subscription_entry_mut(topic_name, sub_name)?).renew_lock(token, now)
}

pub fn sweep(store: &mut Store, topic_name: &str, sub_name: &str, now: SystemTime) -> Result<()> {
    handle(store.subscription_entry_mut(topic_name, sub_name)?).sweep_expired(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SubscriptionProperties, TopicProperties};
    use crate::store::Quotas;

    #[test]
    fn receive_and_delete_empties_backlog() {
        let mut store = Store::new(Quotas::default());
        store.create_topic("t", TopicProperties::default()).unwrap();
        let now = SystemTime::now();
        store
            .create_subscription("t", "s", SubscriptionProperties::default(), now)
            .unwrap();
        crate::fanout::publish(
            &mut store,
            "t",
            crate::model::SendRequest {
                body: b"hello".to_vec(),
                ..Default::default()
            },
            now,
            256 * 1024,
        )
        .unwrap();

        let received = receive(&mut store, "t", "s", ReceiveMode::ReceiveAndDelete, 10, now).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, b"hello");
        let again = receive(&mut store, "t", "s", ReceiveMode::ReceiveAndDelete, 10, now).unwrap();
        assert!(again.is_empty());
    }
}
