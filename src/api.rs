//! Public API - begin/end deferred binding blocks
//!
//! ```text
//! begin_deferred_binding(scope, ctx, prevent_fallback)
//!         │
//!         ├── engine usable ──► ActivationHandle::Deferred (hook installed)
//!         │
//!         └── disabled / opaque scope
//!                 ├── prevent_fallback = true  ──► EagerFallbackPrevented
//!                 └── prevent_fallback = false ──► ActivationHandle::Eager
//!                                                  (one-time warning)
//! ```
//!
//! The free functions use a process-wide [`Binder`] configured from the
//! environment (`DEFERBIND_DISABLE`, `DEFERBIND_NO_WARN`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::{debug, warn};

use crate::activation::{Activation, ActivationOptions, ExitOutcome, ExitReport};
use crate::binding::{SourceLocation, Statement};
use crate::config::EngineConfig;
use crate::context::ResolutionContext;
use crate::error::{DeferError, Result};
use crate::event::EventKind;
use crate::scope::Scope;

static GLOBAL_BINDER: Lazy<Binder> = Lazy::new(|| Binder::new(EngineConfig::from_env()));

/// Error context attached to type-only bindings
const TYPE_BINDING_CONTEXT: &str = "type-only binding";

/// An open deferred-binding block (or its eager stand-in)
#[derive(Debug)]
pub enum ActivationHandle {
    Deferred(Activation),
    /// No interception: statements bind eagerly
    Eager { scope: Scope, ctx: ResolutionContext },
}

impl ActivationHandle {
    pub fn is_deferred(&self) -> bool {
        matches!(self, ActivationHandle::Deferred(_))
    }

    pub fn scope(&self) -> &Scope {
        match self {
            ActivationHandle::Deferred(activation) => activation.scope(),
            ActivationHandle::Eager { scope, .. } => scope,
        }
    }

    /// Context to pass to statements inside the block
    pub fn context(&self) -> Result<ResolutionContext> {
        match self {
            ActivationHandle::Deferred(activation) => activation.context(),
            ActivationHandle::Eager { ctx, .. } => Ok(*ctx),
        }
    }

    #[track_caller]
    pub fn execute(&self, statement: &Statement) -> Result<()> {
        let location = SourceLocation::caller();
        let ctx = self.context()?;
        self.scope().execute_at(&ctx, statement, location)
    }

    #[track_caller]
    pub fn execute_str(&self, statement: &str) -> Result<()> {
        let location = SourceLocation::caller();
        let statement: Statement = statement.parse()?;
        let ctx = self.context()?;
        self.scope().execute_at(&ctx, &statement, location)
    }

    /// Close the block; None for eager blocks
    pub fn exit(&mut self, outcome: ExitOutcome) -> Result<Option<ExitReport>> {
        match self {
            ActivationHandle::Deferred(activation) => activation.exit(outcome).map(Some),
            ActivationHandle::Eager { .. } => Ok(None),
        }
    }
}

/// Entry point holding engine configuration
#[derive(Debug)]
pub struct Binder {
    config: EngineConfig,
    warned: AtomicBool,
}

impl Binder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            warned: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a deferred-binding block on `scope`
    pub fn begin(
        &self,
        scope: &Scope,
        ctx: &ResolutionContext,
        prevent_fallback: bool,
    ) -> Result<ActivationHandle> {
        self.open(scope, ctx, prevent_fallback, ActivationOptions::default())
    }

    /// Like [`begin`](Self::begin), but a false condition yields a plain
    /// eager block without any capability check
    pub fn begin_if(
        &self,
        condition: bool,
        scope: &Scope,
        ctx: &ResolutionContext,
        prevent_fallback: bool,
    ) -> Result<ActivationHandle> {
        if !condition {
            return Ok(ActivationHandle::Eager {
                scope: scope.clone(),
                ctx: *ctx,
            });
        }
        self.begin(scope, ctx, prevent_fallback)
    }

    /// Deferred block whose failed resolutions yield `default` instead of an error
    ///
    /// Binding eagerly would raise the very errors the default is meant to
    /// absorb, so a disabled engine or opaque scope is `EagerFallbackPrevented`.
    pub fn type_binding(
        &self,
        scope: &Scope,
        ctx: &ResolutionContext,
        default: Value,
    ) -> Result<ActivationHandle> {
        let options =
            ActivationOptions::with_fallback(Arc::new(default)).error_context(TYPE_BINDING_CONTEXT);
        self.open(scope, ctx, true, options)
    }

    /// Run `f` inside a block: clean exit on `Ok`, abnormal exit on `Err`
    pub fn scoped<T>(
        &self,
        scope: &Scope,
        ctx: &ResolutionContext,
        prevent_fallback: bool,
        f: impl FnOnce(&ActivationHandle) -> Result<T>,
    ) -> Result<T> {
        let mut handle = self.begin(scope, ctx, prevent_fallback)?;
        match f(&handle) {
            Ok(value) => {
                handle.exit(ExitOutcome::Clean)?;
                Ok(value)
            }
            Err(err) => {
                handle.exit(ExitOutcome::Abnormal)?;
                Err(err)
            }
        }
    }

    fn open(
        &self,
        scope: &Scope,
        ctx: &ResolutionContext,
        prevent_fallback: bool,
        options: ActivationOptions,
    ) -> Result<ActivationHandle> {
        if let Some(reason) = self.unavailable(scope) {
            if prevent_fallback {
                return Err(DeferError::EagerFallbackPrevented {
                    scope: scope.name().to_string(),
                });
            }
            self.warn_once(scope, reason);
            scope.resolver().emit(EventKind::EagerFallback {
                scope: Arc::clone(scope.name()),
                reason: reason.to_string(),
            });
            return Ok(ActivationHandle::Eager {
                scope: scope.clone(),
                ctx: *ctx,
            });
        }

        let mut activation = Activation::new(scope.clone(), *ctx, options);
        activation.enter()?;
        Ok(ActivationHandle::Deferred(activation))
    }

    fn unavailable(&self, scope: &Scope) -> Option<&'static str> {
        if self.config.disable {
            Some("deferred binding is disabled")
        } else if !scope.supports_interception() {
            Some("scope does not support binding interception")
        } else {
            None
        }
    }

    fn warn_once(&self, scope: &Scope, reason: &str) {
        if self.config.no_warn || self.warned.swap(true, Ordering::Relaxed) {
            debug!(scope = %scope.name(), reason, "binding eagerly");
            return;
        }
        warn!(
            scope = %scope.name(),
            "{reason}; binding eagerly (set DEFERBIND_NO_WARN to silence)"
        );
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Process-wide binder (configured from the environment on first use)
pub fn global_binder() -> &'static Binder {
    &GLOBAL_BINDER
}

pub fn begin_deferred_binding(
    scope: &Scope,
    ctx: &ResolutionContext,
    prevent_fallback: bool,
) -> Result<ActivationHandle> {
    global_binder().begin(scope, ctx, prevent_fallback)
}

pub fn begin_deferred_binding_if(
    condition: bool,
    scope: &Scope,
    ctx: &ResolutionContext,
    prevent_fallback: bool,
) -> Result<ActivationHandle> {
    global_binder().begin_if(condition, scope, ctx, prevent_fallback)
}

pub fn deferred_type_binding(
    scope: &Scope,
    ctx: &ResolutionContext,
    default: Value,
) -> Result<ActivationHandle> {
    global_binder().type_binding(scope, ctx, default)
}

/// Clean exit of a block opened by one of the `begin_*` functions
pub fn end_deferred_binding(mut handle: ActivationHandle) -> Result<Option<ExitReport>> {
    handle.exit(ExitOutcome::Clean)
}

pub fn with_deferred_binding<T>(
    scope: &Scope,
    ctx: &ResolutionContext,
    prevent_fallback: bool,
    f: impl FnOnce(&ActivationHandle) -> Result<T>,
) -> Result<T> {
    global_binder().scoped(scope, ctx, prevent_fallback, f)
}
