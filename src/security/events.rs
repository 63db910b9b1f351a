//! Bounded security-event log.
//!
//! Every recorded event is also emitted via `tracing::info!` as a JSON blob
//! in the `audit` field, so the trail survives in log aggregators after the
//! in-memory ring has evicted it.
//!
//! | Event | When |
//! |-------|------|
//! | `key.set` | A protection key was accepted |
//! | `key.generated` | A runtime key was generated |
//! | `key.rejected` | A candidate key failed the policy |
//! | `key.cleared` | The runtime key was removed |
//! | `policy.updated` | The protection policy changed |

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::protection::KeySource;

/// Events kept in memory; older ones are evicted first
pub const MAX_SECURITY_EVENTS: usize = 100;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SecurityEventKind {
    /// A protection key was accepted
    #[serde(rename = "key.set")]
    KeySet,
    /// A runtime key was generated
    #[serde(rename = "key.generated")]
    KeyGenerated,
    /// A candidate key failed the policy
    #[serde(rename = "key.rejected")]
    KeyRejected,
    /// The runtime key was removed
    #[serde(rename = "key.cleared")]
    KeyCleared,
    /// The protection policy changed
    #[serde(rename = "policy.updated")]
    PolicyUpdated,
}

/// One entry of the audit trail. Never carries a raw key.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    /// Event type
    pub kind: SecurityEventKind,
    /// When it was recorded
    pub timestamp: DateTime<Utc>,
    /// Key source involved
    pub source: KeySource,
    /// Hash of the key involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_hash: Option<String>,
    /// Extra non-secret context
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl SecurityEvent {
    /// New event stamped now
    #[must_use]
    pub fn new(kind: SecurityEventKind, source: KeySource) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            source,
            key_hash: None,
            details: Map::new(),
        }
    }

    /// Attach a key hash
    #[must_use]
    pub fn key_hash(mut self, hash: impl Into<String>) -> Self {
        self.key_hash = Some(hash.into());
        self
    }

    /// Attach a detail field
    #[must_use]
    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Fixed-capacity ring of recent events
#[derive(Debug)]
pub struct SecurityEventLog {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl Default for SecurityEventLog {
    fn default() -> Self {
        Self::with_capacity(MAX_SECURITY_EVENTS)
    }
}

impl SecurityEventLog {
    /// Log holding at most `capacity` events
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an event, evicting the oldest when full, and emit it
    pub fn record(&self, event: SecurityEvent) {
        emit(&event);
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// All retained events, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<SecurityEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// The newest `limit` events, oldest first
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<SecurityEvent> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    /// Number of retained events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Emit an event as a structured audit line
pub fn emit(event: &SecurityEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "security audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize security event"),
    }
}
