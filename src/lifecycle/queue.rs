//! Queue-facing lifecycle operations (4.G). Thin adapters from `Store`
//! entries onto the shared [`EntityHandle`] machinery in `common.rs`.

use std::time::SystemTime;

use uuid::Uuid;

use crate::error::{BrokerError, Result};
use crate::lifecycle::common::EntityHandle;
use crate::model::{Message, ReceiveMode, SendRequest};
use crate::store::{QueueEntry, Store};

fn handle(entry: &mut QueueEntry) -> EntityHandle<'_> {
    EntityHandle {
        backlog: &mut entry.backlog,
        locks: &mut entry.locks,
        dead_letters: &mut entry.dead_letters,
        lock_duration: entry.description.properties.lock_duration,
        max_delivery_count: entry.description.properties.max_delivery_count,
    }
}

pub fn send(
    store: &mut Store,
    queue_name: &str,
    request: SendRequest,
    now: SystemTime,
    max_message_bytes: usize,
) -> Result<Message> {
    let entry = store.queue_entry_mut(queue_name)?;
    let default_ttl = entry.description.properties.default_message_time_to_live;
    let message = Message::from_request(request, default_ttl, now);
    let size = message.size_bytes();
    if size > max_message_bytes {
        return Err(BrokerError::MessageTooLarge {
            size,
            limit: max_message_bytes,
        });
    }
    Ok(handle(entry).send(message, now))
}

pub fn receive(
    store: &mut Store,
    queue_name: &str,
    mode: ReceiveMode,
    max: usize,
    now: SystemTime,
) -> Result<Vec<Message>> {
    let entry = store.queue_entry_mut(queue_name)?;
    let mut h = handle(entry);
    Ok(match mode {
        ReceiveMode::PeekLock => h.receive_peek_lock(max, now),
        ReceiveMode::ReceiveAndDelete => h.receive_and_delete(max, now),
    })
}

pub fn complete(store: &mut Store, queue_name: &str, token: &Uuid, now: SystemTime) -> Result<Message> {
    handle(store.queue_entry_mut(queue_name)?).complete(token, now)
}

pub fn abandon(store: &mut Store, queue_name: &str, token: &Uuid, now: SystemTime) -> Result<()> {
    handle(store.queue_entry_mut(queue_name)?).abandon(token, now)
}

pub fn dead_letter(
    store: &mut Store,
    queue_name: &str,
    token: &Uuid,
    reason: String,
    description: Option<String>,
    now: SystemTime,
) -> Result<()> {
    handle(store.queue_entry_mut(queue_name)?).dead_letter(token, reason, description, now)
}

pub fn renew_lock(store: &mut Store, queue_name: &str, token: &Uuid, now: SystemTime) -> Result<SystemTime> {
    handle(store.queue_entry_mut(queue_name)?).renew_lock(token, now)
}

/// Opportunistic lease-expiry reclamation (4.I calls this per queue).
pub fn sweep(store: &mut Store, queue_name: &str, now: SystemTime) -> Result<()> {
    handle(store.queue_entry_mut(queue_name)?).sweep_expired(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Quotas;

    fn send_req(body: &str) -> SendRequest {
        SendRequest {
            body: body.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn round_trip_send_receive_and_delete() {
        let mut store = Store::new(Quotas::default());
        store
            .create_queue("orders", crate::model::QueueProperties::default())
            .unwrap();
        let now = SystemTime::now();
        let sent = send(&mut store, "orders", send_req("A"), now, 256 * 1024).unwrap();

        let received = receive(&mut store, "orders", ReceiveMode::ReceiveAndDelete, 10, now).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message_id, sent.message_id);
        assert_eq!(received[0].body, b"A");
    }

    #[test]
    fn message_too_large_is_rejected() {
        let mut store = Store::new(Quotas::default());
        store
            .create_queue("orders", crate::model::QueueProperties::default())
            .unwrap();
        let now = SystemTime::now();
        let big = send_req(&"x".repeat(100));
        let err = send(&mut store, "orders", big, now, 10).unwrap_err();
        assert!(matches!(err, BrokerError::MessageTooLarge { .. }));
    }

    #[test]
    fn send_to_missing_queue_is_entity_not_found() {
        let mut store = Store::new(Quotas::default());
        let now = SystemTime::now();
        let err = send(&mut store, "nope", send_req("A"), now, 1024).unwrap_err();
        assert!(matches!(err, BrokerError::EntityNotFound(_)));
    }
}
