//! Lifecycle Engine (component G): send / receive / complete / abandon /
//! dead_letter / renew_lock for both queues and subscriptions, built on
//! the shared lease machinery in `common`.

pub mod common;
pub mod queue;
pub mod subscription;
