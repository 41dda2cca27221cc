//! EventLog - audit events raised by the engine
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: activation / proxy / cache / resolution levels
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since log creation (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All possible audit events
///
/// Uses Arc<str> for scope/target fields so emitting is a refcount bump.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // ACTIVATION LEVEL
    // ═══════════════════════════════════════════
    /// Interception hook installed on the scope
    ActivationEntered { scope: Arc<str>, activation: u64 },
    /// Previous hook restored; `clean` tells whether the rewrite ran
    ActivationExited {
        scope: Arc<str>,
        activation: u64,
        clean: bool,
    },
    /// Engine unavailable; the block binds eagerly
    EagerFallback { scope: Arc<str>, reason: String },

    // ═══════════════════════════════════════════
    // PROXY / SCOPE LEVEL
    // ═══════════════════════════════════════════
    ProxyCreated {
        scope: Arc<str>,
        target: Arc<str>,
        attributes: Vec<String>,
        source: String,
    },
    /// Raw proxies converted to intercepting entries
    ScopeRewritten {
        scope: Arc<str>,
        aliases: Vec<String>,
    },

    // ═══════════════════════════════════════════
    // ARTIFACT CACHE
    // ═══════════════════════════════════════════
    PlaceholderSeeded { target: Arc<str>, activation: u64 },
    PlaceholderEvicted { target: Arc<str>, activation: u64 },

    // ═══════════════════════════════════════════
    // RESOLUTION
    // ═══════════════════════════════════════════
    ResolutionStarted { target: Arc<str>, aliases: usize },
    ResolutionFailed { target: Arc<str>, error: String },
    /// Resolution failed and the configured fallback was bound instead
    FallbackUsed { target: Arc<str>, error: String },
    AliasBound {
        scope: Arc<str>,
        alias: String,
        target: Arc<str>,
    },
    /// Alias removed after a failed resolution
    AliasUnbound {
        scope: Arc<str>,
        alias: String,
        target: Arc<str>,
    },
}

impl EventKind {
    /// Extract the deferred target if the event is about one
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::ProxyCreated { target, .. }
            | Self::PlaceholderSeeded { target, .. }
            | Self::PlaceholderEvicted { target, .. }
            | Self::ResolutionStarted { target, .. }
            | Self::ResolutionFailed { target, .. }
            | Self::FallbackUsed { target, .. }
            | Self::AliasBound { target, .. }
            | Self::AliasUnbound { target, .. } => Some(target),
            Self::ActivationEntered { .. }
            | Self::ActivationExited { .. }
            | Self::EagerFallback { .. }
            | Self::ScopeRewritten { .. } => None,
        }
    }

    /// Check if this is an activation-level event
    pub fn is_activation_event(&self) -> bool {
        matches!(
            self,
            Self::ActivationEntered { .. }
                | Self::ActivationExited { .. }
                | Self::EagerFallback { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned - use `with_events` for zero-copy access)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds read lock for duration of callback - keep it short.
    pub fn with_events<T>(&self, f: impl FnOnce(&[Event]) -> T) -> T {
        f(&self.events.read())
    }

    /// Events about one deferred target
    pub fn filter_target(&self, target: &str) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.target() == Some(target))
                .cloned()
                .collect()
        })
    }

    /// Count events matching a predicate (no allocation)
    pub fn count(&self, predicate: impl Fn(&EventKind) -> bool) -> usize {
        self.with_events(|events| events.iter().filter(|e| predicate(&e.kind)).count())
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        self.with_events(|events| serde_json::to_value(events).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}
