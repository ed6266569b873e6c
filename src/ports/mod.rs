//! Ports (component J): narrow traits the core consumes for audit,
//! metrics, rate-limiting, and structured logging, each with one
//! in-memory reference implementation. Mirrors the narrow
//! `ManagementClient`/`DataPlaneClient` split in the teacher's client
//! module — small interfaces, one production implementation, easy fakes
//! for tests.

pub mod persistence;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// One structured business event, independent of `tracing`'s operational
/// log (SPEC_FULL §1 [ADDED] Logging).
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    pub entity_type: String,
    pub entity_name: String,
    pub user: Option<String>,
    pub timestamp: SystemTime,
    pub version: u32,
    pub fields: HashMap<String, String>,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Discards every event. The default when no audit backend is wired.
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Counters, histograms, and gauges, labeled by entity type/name and
/// operation (4.J).
pub trait MetricsSink: Send + Sync {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]);
    fn observe_histogram(&self, name: &str, value_ms: f64, labels: &[(&str, &str)]);
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

#[derive(Debug, Default)]
struct MetricsState {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
}

/// Captures every observation for later inspection; used in tests and as
/// the default when no external metrics backend is configured.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    state: Mutex<MetricsState>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.state.lock().unwrap().counters.get(name).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.state.lock().unwrap().gauges.get(name).copied()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn incr_counter(&self, name: &str, _labels: &[(&str, &str)]) {
        *self.state.lock().unwrap().counters.entry(name.to_string()).or_insert(0) += 1;
    }

    fn observe_histogram(&self, _name: &str, _value_ms: f64, _labels: &[(&str, &str)]) {
        // Reference implementation does not retain histogram buckets.
    }

    fn set_gauge(&self, name: &str, value: f64, _labels: &[(&str, &str)]) {
        self.state.lock().unwrap().gauges.insert(name.to_string(), value);
    }
}

/// Outcome of a rate-limit check (4.J).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitDecision {
    Allow,
    RetryAfter(Duration),
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, entity_name: &str) -> RateLimitDecision;
}

/// Always allows. The default when no rate limiting is configured.
#[derive(Debug, Default)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _entity_name: &str) -> RateLimitDecision {
        RateLimitDecision::Allow
    }
}

/// One structured log line, distinct from `tracing`'s developer-facing
/// log (SPEC_FULL §4 [ADDED]).
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub operation: String,
    pub entity_type: String,
    pub entity_name: String,
    pub outcome: String,
}

pub trait Logger: Send + Sync {
    fn log(&self, record: LogRecord);
}

/// Forwards structured records onto `tracing` at debug level. The
/// default logger: most deployments don't need a second event stream.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, record: LogRecord) {
        tracing::debug!(
            operation = %record.operation,
            entity_type = %record.entity_type,
            entity_name = %record.entity_name,
            outcome = %record.outcome,
            "lifecycle event"
        );
    }
}
