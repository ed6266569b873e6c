//! Shared lease/delivery-count machinery (4.G) used identically by the
//! queue and subscription lifecycle surfaces. An `EntityHandle` borrows
//! one entity's backlog, lock table, and dead-letter sink for the
//! duration of a single operation; all of it runs under the store's
//! mutex, so these methods are plain synchronous functions (§5).

use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::backlog::Backlog;
use crate::dead_letter::DeadLetterSink;
use crate::error::{BrokerError, Result};
use crate::lock_table::LockTable;
use crate::model::Message;

pub struct EntityHandle<'a> {
    pub backlog: &'a mut Backlog,
    pub locks: &'a mut LockTable,
    pub dead_letters: &'a mut DeadLetterSink,
    pub lock_duration: Duration,
    pub max_delivery_count: u32,
}

pub const MAX_DELIVERY_COUNT_EXCEEDED: &str = "MaxDeliveryCountExceeded";

impl EntityHandle<'_> {
    pub fn send(&mut self, message: Message, now: SystemTime) -> Message {
        self.backlog.push(message, now).clone()
    }

    /// Reclaim every lease whose deadline has passed, routing each as if
    /// abandoned (spec.md 4.G "Lock expiry sweep"). Idempotent: a token
    /// already reclaimed is simply absent from the lock table.
    pub fn sweep_expired(&mut self, now: SystemTime) {
        for token in self.locks.expired_tokens(now) {
            self.reclaim(&token, now);
        }
    }

    pub fn receive_peek_lock(&mut self, max: usize, now: SystemTime) -> Vec<Message> {
        self.sweep_expired(now);
        let mut out = Vec::with_capacity(max);
        while out.len() < max {
            let Some(mut message) = self.backlog.pop_head(now) else {
                break;
            };
            message.delivery_count += 1;
            if message.delivery_count > self.max_delivery_count {
                self.dead_letters
                    .append(message, MAX_DELIVERY_COUNT_EXCEEDED.to_string(), None, now);
                continue;
            }
            let token = self.locks.grant(message, now, self.lock_duration);
            out.push(self.locks.peek(&token).expect("just granted").clone());
        }
        out
    }

    pub fn receive_and_delete(&mut self, max: usize, now: SystemTime) -> Vec<Message> {
        self.sweep_expired(now);
        let mut out = Vec::with_capacity(max);
        while out.len() < max {
            match self.backlog.pop_head(now) {
                Some(message) => out.push(message),
                None => break,
            }
        }
        out
    }

    /// complete(entity, token): removes the message outright on success.
    pub fn complete(&mut self, token: &Uuid, now: SystemTime) -> Result<Message> {
        self.check_lease(token, now)?;
        Ok(self.locks.take(token).expect("checked active"))
    }

    /// abandon(entity, token): clears lock state and either dead-letters
    /// or re-enqueues at the tail, per delivery count.
    pub fn abandon(&mut self, token: &Uuid, now: SystemTime) -> Result<()> {
        self.check_lease(token, now)?;
        self.reclaim(token, now);
        Ok(())
    }

    pub fn dead_letter(
        &mut self,
        token: &Uuid,
        reason: String,
        description: Option<String>,
        now: SystemTime,
    ) -> Result<()> {
        self.check_lease(token, now)?;
        let message = self.locks.take(token).expect("checked active");
        self.dead_letters.append(message, reason, description, now);
        Ok(())
    }

    pub fn renew_lock(&mut self, token: &Uuid, now: SystemTime) -> Result<SystemTime> {
        self.check_lease(token, now)?;
        Ok(self
            .locks
            .renew(token, now, self.lock_duration)
            .expect("checked active"))
    }

    /// Looks up `token`. Unknown tokens are `MessageLockLost`. A token
    /// whose deadline has already passed is reclaimed via the abandon
    /// path (as if the sweep had already run) and also reported as
    /// `MessageLockLost` (spec.md 4.G complete/abandon "same lookup and
    /// expiry semantics").
    fn check_lease(&mut self, token: &Uuid, now: SystemTime) -> Result<()> {
        let deadline = self.locks.deadline(token).ok_or(BrokerError::MessageLockLost)?;
        if deadline < now {
            self.reclaim(token, now);
            return Err(BrokerError::MessageLockLost);
        }
        Ok(())
    }

    /// Remove the lease and route the message to backlog-tail or
    /// dead-letter depending on delivery count. Shared by abandon,
    /// expired-lease reclamation, and the sweep.
    fn reclaim(&mut self, token: &Uuid, now: SystemTime) {
        let Some(mut message) = self.locks.take(token) else {
            return;
        };
        message.is_locked = false;
        message.lock_token = None;
        message.lock_expiry = None;
        if message.delivery_count >= self.max_delivery_count {
            self.dead_letters
                .append(message, MAX_DELIVERY_COUNT_EXCEEDED.to_string(), None, now);
        } else {
            self.backlog.push_back_existing(message);
        }
    }
}
