mod eval;
mod lexer;
mod parser;

use crate::model::Message;

/// Parse and evaluate a SQL-subset expression against a message.
/// Total: any tokenizer or parser failure yields `false` (spec §4.B).
pub fn evaluate(expression: &str, message: &Message) -> bool {
    let tokens = match lexer::tokenize(expression) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let ast = match parser::parse(&tokens) {
        Ok(a) => a,
        Err(_) => return false,
    };
    eval::evaluate(&ast, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{Duration, SystemTime};

    fn message(label: &str, props: &[(&str, &str)]) -> Message {
        Message {
            message_id: "m1".into(),
            session_id: None,
            correlation_id: None,
            content_type: None,
            label: Some(label.to_string()),
            to: None,
            reply_to: None,
            time_to_live: Duration::from_secs(60),
            scheduled_enqueue_time: None,
            user_properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
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
    fn garbage_input_yields_false_not_panic() {
        let msg = message("order", &[]);
        assert!(!evaluate("this is not sql", &msg));
    }

    #[test]
    fn valid_expression_evaluates() {
        let msg = message("order", &[("qty", "150")]);
        assert!(evaluate("sys.Label = 'order' AND qty > 100", &msg));
    }
}
