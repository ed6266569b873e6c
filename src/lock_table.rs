//! Lock Table (component E): per-entity map from lock token to leased
//! message + deadline.

use std::collections::HashMap;
use std::time::SystemTime;

use uuid::Uuid;

use crate::model::Message;

struct Lease {
    message: Message,
    deadline: SystemTime,
}

#[derive(Default)]
pub struct LockTable {
    leases: HashMap<Uuid, Lease>,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            leases: HashMap::new(),
        }
    }

    /// Grant a fresh lease, stamping the message with its token and
    /// expiry deadline, and return the minted token.
    pub fn grant(&mut self, mut message: Message, now: SystemTime, lock_duration: std::time::Duration) -> Uuid {
        let token = Uuid::new_v4();
        let deadline = now + lock_duration;
        message.lock_token = Some(token);
        message.lock_expiry = Some(deadline);
        message.is_locked = true;
        self.leases.insert(token, Lease { message, deadline });
        token
    }

    pub fn contains(&self, token: &Uuid) -> bool {
        self.leases.contains_key(token)
    }

    pub fn peek(&self, token: &Uuid) -> Option<&Message> {
        self.leases.get(token).map(|l| &l.message)
    }

    pub fn deadline(&self, token: &Uuid) -> Option<SystemTime> {
        self.leases.get(token).map(|l| l.deadline)
    }

    /// Remove and return the leased message (used by complete/abandon/
    /// dead-letter to take ownership before re-routing it).
    pub fn take(&mut self, token: &Uuid) -> Option<Message> {
        self.leases.remove(token).map(|l| l.message)
    }

    /// Extend an existing lease's deadline, returning the new deadline.
    pub fn renew(&mut self, token: &Uuid, now: SystemTime, lock_duration: std::time::Duration) -> Option<SystemTime> {
        let lease = self.leases.get_mut(token)?;
        let deadline = now + lock_duration;
        lease.deadline = deadline;
        lease.message.lock_expiry = Some(deadline);
        Some(deadline)
    }

    /// Tokens whose lease deadline is strictly before `now`.
    pub fn expired_tokens(&self, now: SystemTime) -> Vec<Uuid> {
        self.leases
            .iter()
            .filter(|(_, lease)| lease.deadline < now)
            .map(|(token, _)| *token)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}
