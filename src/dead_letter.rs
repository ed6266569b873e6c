//! Dead-letter sink (component F): append-only terminal collection of
//! messages that could not be delivered. Read-only aside from appends;
//! there is no resubmission path (spec §4.F, Non-goals).

use std::collections::VecDeque;
use std::time::SystemTime;

use crate::model::Message;

#[derive(Debug, Default)]
pub struct DeadLetterSink {
    messages: VecDeque<Message>,
}

impl DeadLetterSink {
    pub fn new() -> Self {
        Self {
            messages: VecDeque::new(),
        }
    }

    /// Stamp `message` with a reason/description and append it.
    pub fn append(&mut self, mut message: Message, reason: String, description: Option<String>, now: SystemTime) {
        message.dead_letter_reason = Some(reason);
        message.dead_letter_description = description;
        message.is_dead_lettered = true;
        message.is_locked = false;
        message.lock_token = None;
        message.lock_expiry = None;
        message.enqueued_time = now;
        self.messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn get_by_message_id(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.message_id == message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SendRequest;
    use std::time::Duration;

    fn msg() -> Message {
        Message::from_request(SendRequest::default(), Duration::from_secs(60), SystemTime::now())
    }

    #[test]
    fn append_stamps_reason_and_clears_lock_state() {
        let mut sink = DeadLetterSink::new();
        let mut m = msg();
        m.is_locked = true;
        m.lock_token = Some(uuid::Uuid::new_v4());
        sink.append(m, "MaxDeliveryCountExceeded".into(), Some("too many tries".into()), SystemTime::now());

        let stored = sink.iter().next().unwrap();
        assert_eq!(stored.dead_letter_reason.as_deref(), Some("MaxDeliveryCountExceeded"));
        assert_eq!(stored.dead_letter_description.as_deref(), Some("too many tries"));
        assert!(stored.is_dead_lettered);
        assert!(!stored.is_locked);
        assert!(stored.lock_token.is_none());
    }

    #[test]
    fn lookup_by_message_id() {
        let mut sink = DeadLetterSink::new();
        let m = msg();
        let id = m.message_id.clone();
        sink.append(m, "reason".into(), None, SystemTime::now());
        assert!(sink.get_by_message_id(&id).is_some());
        assert!(sink.get_by_message_id("nope").is_none());
    }

    #[test]
    fn append_preserves_order() {
        let mut sink = DeadLetterSink::new();
        sink.append(msg(), "r1".into(), None, SystemTime::now());
        sink.append(msg(), "r2".into(), None, SystemTime::now());
        let reasons: Vec<_> = sink.iter().map(|m| m.dead_letter_reason.clone().unwrap()).collect();
        assert_eq!(reasons, vec!["r1", "r2"]);
    }
}
