//! Correlation filter evaluation (4.B): logical AND over optional equality
//! constraints.

use crate::model::{CorrelationFilter, Message};

pub fn evaluate(filter: &CorrelationFilter, message: &Message) -> bool {
    let system_ok = check(&filter.correlation_id, &message.correlation_id)
        && check(&filter.content_type, &message.content_type)
        && check(&filter.label, &message.label)
        && check(&filter.message_id, &Some(message.message_id.clone()))
        && check(&filter.reply_to, &message.reply_to)
        && check(&filter.session_id, &message.session_id)
        && check(&filter.to, &message.to);

    if !system_ok {
        return false;
    }

    filter.properties.iter().all(|(key, expected)| {
        message
            .user_properties
            .get(key)
            .is_some_and(|actual| actual == expected)
    })
}

/// An absent constraint is unconstrained (always satisfied). A present
/// constraint requires the field to be present and equal.
fn check(constraint: &Option<String>, field: &Option<String>) -> bool {
    match constraint {
        None => true,
        Some(expected) => field.as_deref() == Some(expected.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{Duration, SystemTime};

    fn base_message() -> Message {
        Message {
            message_id: "m1".into(),
            session_id: None,
            correlation_id: Some("corr-1".into()),
            content_type: Some("application/json".into()),
            label: Some("order".into()),
            to: None,
            reply_to: None,
            time_to_live: Duration::from_secs(60),
            scheduled_enqueue_time: None,
            user_properties: HashMap::from([("priority".to_string(), "high".to_string())]),
            body: vec![],
            enqueued_time: SystemTime::now(),
            sequence_number: 1,
            delivery_count: 0,
            lock_token: None,
            lock_expiry: None,
            dead_letter_reason: None,
            dead_letter_description: None,
            is_locked: false,
            is_dead_lettered: false,
        }
    }

    #[test]
    fn unconstrained_matches_everything() {
        let filter = CorrelationFilter::default();
        assert!(evaluate(&filter, &base_message()));
    }

    #[test]
    fn matches_on_system_field() {
        let mut filter = CorrelationFilter::default();
        filter.correlation_id = Some("corr-1".into());
        assert!(evaluate(&filter, &base_message()));

        filter.correlation_id = Some("corr-2".into());
        assert!(!evaluate(&filter, &base_message()));
    }

    #[test]
    fn matches_on_user_property() {
        let mut filter = CorrelationFilter::default();
        filter.properties.insert("priority".into(), "high".into());
        assert!(evaluate(&filter, &base_message()));

        filter.properties.insert("priority".into(), "low".into());
        assert!(!evaluate(&filter, &base_message()));
    }

    #[test]
    fn missing_property_fails() {
        let mut filter = CorrelationFilter::default();
        filter.properties.insert("color".into(), "red".into());
        assert!(!evaluate(&filter, &base_message()));
    }

    #[test]
    fn all_constraints_must_hold() {
        let mut filter = CorrelationFilter::default();
        filter.correlation_id = Some("corr-1".into());
        filter.label = Some("shipment".into());
        assert!(!evaluate(&filter, &base_message()));
    }
}
