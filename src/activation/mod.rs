//! Activation Module - entering and leaving deferred-binding blocks
//!
//! - `hook`: `BindingHook` trait, `EagerHook` (default), `DeferringHook` (interception)
//! - `controller`: `Activation` state machine (enter / exit / rewrite)
//!
//! Nested activations on one scope stack their hooks. Requests are routed to
//! the hook of the activation named by their context, and each exit unlinks
//! only its own hook, so exits may happen in any order.

mod controller;
mod hook;

pub use controller::{Activation, ActivationOptions, ActivationState, ExitOutcome, ExitReport};
pub use hook::{BindingHook, DeferringHook, EagerHook};
