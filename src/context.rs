//! Resolution Context - task-scoped engine state
//!
//! Every lookup, binding statement and resolution receives a
//! [`ResolutionContext`] explicitly. The context is a `Copy` value: entering an
//! activation or starting a resolution produces a new copy, so two tasks never
//! observe each other's state.
//!
//! The two flags are mutually exclusive:
//! - `activation` is set while binding statements are being intercepted
//! - `resolving` is set while a proxy is being resolved and auto-bound

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{DeferError, Result};

static NEXT_ACTIVATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivationId(u64);

impl ActivationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ACTIVATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Task-scoped engine state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    activation: Option<ActivationId>,
    resolving: bool,
}

impl ResolutionContext {
    /// Idle context: no activation, no resolution
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_activation_open(&self) -> bool {
        self.activation.is_some()
    }

    /// The innermost open activation, if any
    pub fn activation(&self) -> Option<ActivationId> {
        self.activation
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub fn is_idle(&self) -> bool {
        !self.is_activation_open() && !self.resolving
    }

    /// Copy of this context with `id` as the open activation
    pub(crate) fn entering(&self, id: ActivationId) -> Result<Self> {
        if self.resolving {
            return Err(DeferError::ActivationDuringResolution);
        }
        let next = Self {
            activation: Some(id),
            resolving: false,
        };
        next.check();
        Ok(next)
    }

    /// Copy of this context with the resolving flag set
    pub(crate) fn resolving(&self, target: &str) -> Result<Self> {
        if self.is_activation_open() {
            return Err(DeferError::ResolveInsideActivation {
                target: target.to_string(),
            });
        }
        let next = Self {
            activation: None,
            resolving: true,
        };
        next.check();
        Ok(next)
    }

    fn check(&self) {
        debug_assert!(
            !(self.is_activation_open() && self.resolving),
            "activation-open and resolving are mutually exclusive"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_idle() {
        let ctx = ResolutionContext::new();
        assert!(ctx.is_idle());
        assert_eq!(ctx.activation(), None);
    }

    #[test]
    fn activation_ids_are_unique() {
        let a = ActivationId::next();
        let b = ActivationId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn entering_copies_instead_of_mutating() {
        let base = ResolutionContext::new();
        let id = ActivationId::next();
        let active = base.entering(id).unwrap();

        assert!(base.is_idle());
        assert_eq!(active.activation(), Some(id));
        assert!(!active.is_resolving());
    }

    #[test]
    fn nested_entering_replaces_activation() {
        let outer = ActivationId::next();
        let inner = ActivationId::next();
        let ctx = ResolutionContext::new()
            .entering(outer)
            .unwrap()
            .entering(inner)
            .unwrap();
        assert_eq!(ctx.activation(), Some(inner));
    }

    #[test]
    fn cannot_enter_while_resolving() {
        let resolving = ResolutionContext::new().resolving("pkg").unwrap();
        let err = resolving.entering(ActivationId::next()).unwrap_err();
        assert!(matches!(err, DeferError::ActivationDuringResolution));
    }

    #[test]
    fn cannot_resolve_while_activation_open() {
        let active = ResolutionContext::new()
            .entering(ActivationId::next())
            .unwrap();
        let err = active.resolving("pkg").unwrap_err();
        assert!(matches!(err, DeferError::ResolveInsideActivation { .. }));
    }

    #[test]
    fn flags_never_both_set() {
        let idle = ResolutionContext::new();
        let active = idle.entering(ActivationId::next()).unwrap();
        let resolving = idle.resolving("x").unwrap();
        for ctx in [idle, active, resolving] {
            assert!(!(ctx.is_activation_open() && ctx.is_resolving()));
        }
    }
}
