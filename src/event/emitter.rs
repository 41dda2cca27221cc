//! EventEmitter Trait - abstraction for event emission
//!
//! Real EventLog when auditing, NoopEmitter otherwise.

use super::log::{EventKind, EventLog};

/// Trait for emitting audit events
pub trait EventEmitter: Send + Sync {
    /// Emit an event and return its ID
    fn emit(&self, kind: EventKind) -> u64;
}

impl EventEmitter for EventLog {
    fn emit(&self, kind: EventKind) -> u64 {
        EventLog::emit(self, kind)
    }
}

/// No-op emitter (zero allocation, always returns 0)
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _kind: EventKind) -> u64 {
        0
    }
}
