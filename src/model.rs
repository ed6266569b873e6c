//! Entities, messages, and request/response payloads (§3).
//!
//! Shapes are adapted from the teacher's `client/models.rs` REST-client
//! view of these same entities, but these are the broker's own canonical
//! records rather than deserialized feed fragments.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ──────────────────────────── Queues ────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueProperties {
    #[serde(default = "defaults::max_size_megabytes")]
    pub max_size_in_megabytes: i64,
    #[serde(default = "defaults::message_ttl")]
    pub default_message_time_to_live: Duration,
    #[serde(default = "defaults::lock_duration")]
    pub lock_duration: Duration,
    #[serde(default)]
    pub requires_session: bool,
    #[serde(default)]
    pub requires_duplicate_detection: bool,
    #[serde(default = "defaults::true_")]
    pub dead_lettering_on_message_expiration: bool,
    #[serde(default = "defaults::max_delivery_count")]
    pub max_delivery_count: u32,
}

impl Default for QueueProperties {
    fn default() -> Self {
        Self {
            max_size_in_megabytes: defaults::max_size_megabytes(),
            default_message_time_to_live: defaults::message_ttl(),
            lock_duration: defaults::lock_duration(),
            requires_session: false,
            requires_duplicate_detection: false,
            dead_lettering_on_message_expiration: true,
            max_delivery_count: defaults::max_delivery_count(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueRuntimeInfo {
    pub active_message_count: u64,
    pub dead_letter_message_count: u64,
    pub scheduled_message_count: u64,
    pub locked_message_count: u64,
    pub size_in_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDescription {
    pub name: String,
    pub properties: QueueProperties,
    #[serde(skip)]
    pub runtime: QueueRuntimeInfo,
}

// ──────────────────────────── Topics ────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopicProperties {
    #[serde(default = "defaults::max_size_megabytes")]
    pub max_size_in_megabytes: i64,
    #[serde(default = "defaults::message_ttl")]
    pub default_message_time_to_live: Duration,
    #[serde(default)]
    pub requires_duplicate_detection: bool,
    #[serde(default)]
    pub support_ordering: bool,
}

impl Default for TopicProperties {
    fn default() -> Self {
        Self {
            max_size_in_megabytes: defaults::max_size_megabytes(),
            default_message_time_to_live: defaults::message_ttl(),
            requires_duplicate_detection: false,
            support_ordering: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopicRuntimeInfo {
    pub subscription_count: u64,
    pub scheduled_message_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDescription {
    pub name: String,
    pub properties: TopicProperties,
    #[serde(skip)]
    pub runtime: TopicRuntimeInfo,
}

// ──────────────────────────── Subscriptions ────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionProperties {
    #[serde(default = "defaults::lock_duration")]
    pub lock_duration: Duration,
    #[serde(default)]
    pub requires_session: bool,
    #[serde(default = "defaults::message_ttl")]
    pub default_message_time_to_live: Duration,
    #[serde(default = "defaults::true_")]
    pub dead_lettering_on_message_expiration: bool,
    #[serde(default = "defaults::max_delivery_count")]
    pub max_delivery_count: u32,
    #[serde(default)]
    pub auto_delete_on_idle: Option<Duration>,
    #[serde(default)]
    pub forward_to: Option<String>,
}

impl Default for SubscriptionProperties {
    fn default() -> Self {
        Self {
            lock_duration: defaults::lock_duration(),
            requires_session: false,
            default_message_time_to_live: defaults::message_ttl(),
            dead_lettering_on_message_expiration: true,
            max_delivery_count: defaults::max_delivery_count(),
            auto_delete_on_idle: None,
            forward_to: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionRuntimeInfo {
    pub active_message_count: u64,
    pub dead_letter_message_count: u64,
    pub scheduled_message_count: u64,
    pub locked_message_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDescription {
    pub topic_name: String,
    pub name: String,
    pub properties: SubscriptionProperties,
    #[serde(skip)]
    pub runtime: SubscriptionRuntimeInfo,
    /// Ordered list of rules; stable iteration order = insertion order (4.B).
    pub rules: Vec<RuleDescription>,
}

pub const DEFAULT_RULE_NAME: &str = "$Default";

// ──────────────────────────── Rules & Filters ────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDescription {
    pub name: String,
    pub filter: Filter,
    pub created_at: SystemTime,
}

/// Tagged union of the three filter flavours (4.B, §6 wire discriminants).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Filter {
    #[serde(rename = "TrueFilter")]
    True,
    #[serde(rename = "FalseFilter")]
    False,
    #[serde(rename = "CorrelationFilter")]
    Correlation(CorrelationFilter),
    #[serde(rename = "SqlFilter")]
    Sql { expression: String },
}

impl Default for Filter {
    fn default() -> Self {
        Filter::True
    }
}

/// Equality constraints over named system fields plus a map of user
/// property constraints. `None` means unconstrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CorrelationFilter {
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

// ──────────────────────────── Messages ────────────────────────────

/// Caller-supplied payload for `send`/`publish`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendRequest {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub session_id: Option<String>,
    pub label: Option<String>,
    pub to: Option<String>,
    pub reply_to: Option<String>,
    pub time_to_live: Option<Duration>,
    pub scheduled_enqueue_time: Option<SystemTime>,
    #[serde(default)]
    pub user_properties: HashMap<String, String>,
}

/// The broker's canonical, fully-populated message record (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
    pub content_type: Option<String>,
    pub label: Option<String>,
    pub to: Option<String>,
    pub reply_to: Option<String>,
    pub time_to_live: Duration,
    pub scheduled_enqueue_time: Option<SystemTime>,
    pub user_properties: HashMap<String, String>,
    pub body: Vec<u8>,

    // Broker-assigned
    pub enqueued_time: SystemTime,
    pub sequence_number: u64,
    pub delivery_count: u32,
    pub lock_token: Option<Uuid>,
    pub lock_expiry: Option<SystemTime>,
    pub dead_letter_reason: Option<String>,
    pub dead_letter_description: Option<String>,
    pub is_locked: bool,
    pub is_dead_lettered: bool,
}

impl Message {
    /// Build a fresh broker record from a caller's send request. Sequence
    /// number is assigned by the backlog on append, not here.
    pub fn from_request(req: SendRequest, default_ttl: Duration, now: SystemTime) -> Self {
        let message_id = req.message_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            message_id,
            session_id: req.session_id,
            correlation_id: req.correlation_id,
            content_type: req.content_type,
            label: req.label,
            to: req.to,
            reply_to: req.reply_to,
            time_to_live: req.time_to_live.unwrap_or(default_ttl),
            scheduled_enqueue_time: req.scheduled_enqueue_time,
            user_properties: req.user_properties,
            body: req.body,
            enqueued_time: now,
            sequence_number: 0,
            delivery_count: 0,
            lock_token: None,
            lock_expiry: None,
            dead_letter_reason: None,
            dead_letter_description: None,
            is_locked: false,
            is_dead_lettered: false,
        }
    }

    /// Deep copy for fan-out: same content, fresh per-subscription sequencing
    /// and delivery state (§3 relationships: "cloned per matching subscription").
    pub fn clone_for_subscription(&self) -> Self {
        Self {
            message_id: self.message_id.clone(),
            session_id: self.session_id.clone(),
            correlation_id: self.correlation_id.clone(),
            content_type: self.content_type.clone(),
            label: self.label.clone(),
            to: self.to.clone(),
            reply_to: self.reply_to.clone(),
            time_to_live: self.time_to_live,
            scheduled_enqueue_time: self.scheduled_enqueue_time,
            user_properties: self.user_properties.clone(),
            body: self.body.clone(),
            enqueued_time: self.enqueued_time,
            sequence_number: 0,
            delivery_count: 0,
            lock_token: None,
            lock_expiry: None,
            dead_letter_reason: None,
            dead_letter_description: None,
            is_locked: false,
            is_dead_lettered: false,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.body.len()
            + self
                .user_properties
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

/// Receive mode (§4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    PeekLock,
    ReceiveAndDelete,
}

pub mod defaults {
    use std::time::Duration;

    pub fn lock_duration() -> Duration {
        Duration::from_secs(60)
    }

    pub fn message_ttl() -> Duration {
        Duration::from_secs(14 * 24 * 3600)
    }

    pub fn max_delivery_count() -> u32 {
        10
    }

    pub fn max_size_megabytes() -> i64 {
        1024
    }

    pub fn true_() -> bool {
        true
    }
}
