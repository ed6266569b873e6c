//! Entity name validator (component A). Pure and stateless: no entity
//! store access, no I/O.

use crate::error::{BrokerError, Result};

const SPECIAL_CHARS: [char; 3] = ['-', '_', '.'];

fn is_special(c: char) -> bool {
    SPECIAL_CHARS.contains(&c)
}

fn validate(name: &str, min_len: usize, max_len: usize) -> Result<()> {
    let invalid = |reason: &str| {
        Err(BrokerError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    let len = name.chars().count();
    if len < min_len || len > max_len {
        return invalid(&format!("length must be between {min_len} and {max_len}"));
    }

    let chars: Vec<char> = name.chars().collect();
    if !chars.iter().all(|&c| c.is_ascii_alphanumeric() || is_special(c)) {
        return invalid("only alphanumeric characters, '-', '_', and '.' are allowed");
    }

    if !chars[0].is_ascii_alphanumeric() {
        return invalid("must start with an alphanumeric character");
    }
    if !chars[chars.len() - 1].is_ascii_alphanumeric() {
        return invalid("must end with an alphanumeric character");
    }

    if chars.windows(2).any(|w| is_special(w[0]) && is_special(w[1])) {
        return invalid("must not contain two consecutive special characters");
    }

    Ok(())
}

/// Queue names: 1-260 chars.
pub fn validate_queue(name: &str) -> Result<()> {
    validate(name, 1, 260)
}

/// Topic names: 1-260 chars.
pub fn validate_topic(name: &str) -> Result<()> {
    validate(name, 1, 260)
}

/// Subscription names: 1-260 chars.
pub fn validate_subscription(name: &str) -> Result<()> {
    validate(name, 1, 260)
}

/// Rule names: 1-50 chars, same character policy.
pub fn validate_rule(name: &str) -> Result<()> {
    validate(name, 1, 50)
}
