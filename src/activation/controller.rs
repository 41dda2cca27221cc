//! Activation Controller - scoped interception of binding statements
//!
//! State machine (per activation):
//! ```text
//!          enter()               exit(Clean)
//!  Idle ─────────────► Active ─────────────► Rewritten
//!   ▲                    │
//!   └────exit(Abnormal)──┘
//! ```
//! Entering while `Active` or `Rewritten` is a usage error. Every exit
//! unlinks this activation's hook from the scope (wherever it sits in the
//! stack) and evicts the cache placeholders this activation seeded. A clean
//! exit rewrites only the proxies this activation handed out.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::binding::{SourceLocation, Statement};
use crate::context::{ActivationId, ResolutionContext};
use crate::error::{DeferError, Result};
use crate::event::EventKind;
use crate::loader::Artifact;
use crate::scope::{rewrite_owned, RewriteReport, Scope};

use super::hook::DeferringHook;

/// Per-activation proxy configuration
#[derive(Debug, Clone, Default)]
pub struct ActivationOptions {
    /// Substituted when resolution fails (the failure is swallowed)
    pub fallback: Option<Artifact>,
    /// Appended to resolution error messages
    pub error_context: Option<String>,
}

impl ActivationOptions {
    pub fn with_fallback(fallback: Artifact) -> Self {
        Self {
            fallback: Some(fallback),
            error_context: None,
        }
    }

    pub fn error_context(mut self, context: impl Into<String>) -> Self {
        self.error_context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    Idle,
    /// Interception hook installed
    Active,
    /// Clean exit done; proxies converted to deferred entries
    Rewritten,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    Clean,
    /// The block failed; no rewrite
    Abnormal,
}

/// What an exit did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitReport {
    pub activation: ActivationId,
    pub outcome: ExitOutcome,
    /// None after an abnormal exit
    pub rewrite: Option<RewriteReport>,
    /// Placeholders removed from the artifact cache
    pub evicted: Vec<String>,
}

/// One scoped period of deferred binding on one scope
pub struct Activation {
    id: ActivationId,
    scope: Scope,
    base: ResolutionContext,
    options: ActivationOptions,
    state: ActivationState,
    context: Option<ResolutionContext>,
    installed: Option<Arc<DeferringHook>>,
}

impl Activation {
    /// New idle activation; `ctx` is the caller's context
    pub fn new(scope: Scope, ctx: ResolutionContext, options: ActivationOptions) -> Self {
        Self {
            id: ActivationId::next(),
            scope,
            base: ctx,
            options,
            state: ActivationState::Idle,
            context: None,
            installed: None,
        }
    }

    pub fn id(&self) -> ActivationId {
        self.id
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn options(&self) -> &ActivationOptions {
        &self.options
    }

    /// Context to pass to statements while active
    pub fn context(&self) -> Result<ResolutionContext> {
        self.context.ok_or(DeferError::ActivationNotActive {
            activation: self.id.get(),
        })
    }

    /// Install the interception hook
    #[instrument(skip(self), fields(activation = %self.id, scope = %self.scope.name()))]
    pub fn enter(&mut self) -> Result<ResolutionContext> {
        if self.state != ActivationState::Idle {
            return Err(DeferError::ActivationReentered {
                activation: self.id.get(),
            });
        }
        if !self.scope.supports_interception() {
            return Err(DeferError::EagerFallbackPrevented {
                scope: self.scope.name().to_string(),
            });
        }
        let ctx = self.base.entering(self.id)?;

        let hook = Arc::new(DeferringHook::new(self.id, self.options.clone()));
        self.scope.push_hook(hook.clone());
        self.installed = Some(hook);
        self.context = Some(ctx);
        self.state = ActivationState::Active;

        debug!("activation entered");
        self.scope.resolver().emit(EventKind::ActivationEntered {
            scope: Arc::clone(self.scope.name()),
            activation: self.id.get(),
        });
        Ok(ctx)
    }

    /// Execute a binding statement inside this activation
    #[track_caller]
    pub fn execute(&self, statement: &Statement) -> Result<()> {
        let location = SourceLocation::caller();
        let ctx = self.context()?;
        self.scope.execute_at(&ctx, statement, location)
    }

    /// Parse and execute a textual binding statement
    #[track_caller]
    pub fn execute_str(&self, statement: &str) -> Result<()> {
        let location = SourceLocation::caller();
        let statement: Statement = statement.parse()?;
        let ctx = self.context()?;
        self.scope.execute_at(&ctx, &statement, location)
    }

    /// Unlink this activation's hook; rewrite its proxies on a clean outcome
    #[instrument(skip(self), fields(activation = %self.id, scope = %self.scope.name()))]
    pub fn exit(&mut self, outcome: ExitOutcome) -> Result<ExitReport> {
        let Some(hook) = self.installed.take() else {
            return Err(DeferError::ActivationNotActive {
                activation: self.id.get(),
            });
        };

        match self.scope.remove_hook(self.id) {
            Some(true) => {}
            Some(false) => warn!("activation exited before its inner activations"),
            None => warn!("activation hook was already gone from the scope"),
        }
        self.context = None;

        let cache = self.scope.resolver().cache();
        let mut evicted = Vec::new();
        for target in hook.take_seeded() {
            if cache.evict_placeholder(&target, self.id) {
                self.scope.resolver().emit(EventKind::PlaceholderEvicted {
                    target: Arc::clone(&target),
                    activation: self.id.get(),
                });
                evicted.push(target.to_string());
            }
        }

        let rewritten = match outcome {
            ExitOutcome::Clean => {
                self.state = ActivationState::Rewritten;
                Some(rewrite_owned(&self.scope, &hook.proxy_ids()))
            }
            ExitOutcome::Abnormal => {
                self.state = ActivationState::Idle;
                None
            }
        };

        debug!(?outcome, evicted = evicted.len(), "activation exited");
        self.scope.resolver().emit(EventKind::ActivationExited {
            scope: Arc::clone(self.scope.name()),
            activation: self.id.get(),
            clean: outcome == ExitOutcome::Clean,
        });

        Ok(ExitReport {
            activation: self.id,
            outcome,
            rewrite: rewritten,
            evicted,
        })
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        if self.state == ActivationState::Active {
            let _ = self.exit(ExitOutcome::Abnormal);
        }
    }
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation")
            .field("id", &self.id)
            .field("scope", self.scope.name())
            .field("state", &self.state)
            .finish()
    }
}
