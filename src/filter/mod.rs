//! Filter evaluator (component B): decides whether a rule matches a
//! message. Dispatches on the tagged `Filter` union; no runtime
//! inheritance (§9 Design Note).

mod correlation;
mod sql;

use crate::model::{Filter, Message, RuleDescription};

pub fn evaluate(filter: &Filter, message: &Message) -> bool {
    match filter {
        Filter::True => true,
        Filter::False => false,
        Filter::Correlation(c) => correlation::evaluate(c, message),
        Filter::Sql { expression } => sql::evaluate(expression, message),
    }
}

/// Whether any rule in `rules` matches `message`. A subscription with no
/// rules behaves as if it had a single always-true rule (spec §4.B).
/// Rule order is preserved and evaluation short-circuits on first match.
pub fn any_rule_matches(rules: &[RuleDescription], message: &Message) -> bool {
    if rules.is_empty() {
        return true;
    }
    rules.iter().any(|rule| evaluate(&rule.filter, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CorrelationFilter, DEFAULT_RULE_NAME};
    use std::collections::HashMap;
    use std::time::{Duration, SystemTime};

    fn message() -> Message {
        Message {
            message_id: "m1".into(),
            session_id: None,
            correlation_id: Some("c1".into()),
            content_type: None,
            label: None,
            to: None,
            reply_to: None,
            time_to_live: Duration::from_secs(60),
            scheduled_enqueue_time: None,
            user_properties: HashMap::new(),
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
    fn empty_rule_list_matches_all() {
        assert!(any_rule_matches(&[], &message()));
    }

    #[test]
    fn first_match_wins_non_match_falls_through() {
        let rules = vec![
            RuleDescription {
                name: "r1".into(),
                filter: Filter::False,
                created_at: SystemTime::now(),
            },
            RuleDescription {
                name: "r2".into(),
                filter: Filter::Correlation(CorrelationFilter {
                    correlation_id: Some("c1".into()),
                    ..Default::default()
                }),
                created_at: SystemTime::now(),
            },
        ];
        assert!(any_rule_matches(&rules, &message()));
    }

    #[test]
    fn default_rule_is_always_true() {
        let rules = vec![RuleDescription {
            name: DEFAULT_RULE_NAME.into(),
            filter: Filter::True,
            created_at: SystemTime::now(),
        }];
        assert!(any_rule_matches(&rules, &message()));
    }
}
