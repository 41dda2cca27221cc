//! Event Module - audit trail for deferred binding
//!
//! Key types:
//! - `Event`: Envelope with id + timestamp + kind
//! - `EventKind`: activation, proxy, rewrite and resolution events
//! - `EventLog`: Thread-safe, append-only log
//! - `EventEmitter`: Trait for dependency injection
//! - `NoopEmitter`: Zero-cost no-op for tests and production defaults

mod emitter;
mod log;

pub use emitter::{EventEmitter, NoopEmitter};
pub use log::{Event, EventKind, EventLog};
