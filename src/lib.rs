//! deferbind - deferred binding engine
//!
//! Binding statements (`import pkg`, `from pkg.sub import member as m`)
//! executed inside an activation bind proxies instead of artifacts. The
//! artifact is produced on first genuine use and every alias is rebound to it.
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         PUBLIC API                           │
//! │  api/         begin / end / with_deferred_binding, Binder    │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  activation/  enter, intercept, exit, rewrite                │
//! │  binding/     Statement, BindingRequest, Proxy, autobind     │
//! │  scope/       Scope (name → Slot), InterceptingKey, rewrite  │
//! │  record/      record types and lazy members                  │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  loader/      Loader trait, ArtifactCache, Resolver          │
//! │  event/       Audit trail (EventLog, EventKind)              │
//! │  tracker/     Weak registry of live proxies                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`api`] | Entry points, eager fallback, env-driven configuration |
//! | [`activation`] | Activation state machine and binding hooks |
//! | [`binding`] | Binding statements, proxies, alias propagation |
//! | [`scope`] | Symbol tables with deferred entries |
//! | [`record`] | Record types rejecting deferred members, lazy members |
//! | [`loader`] | Artifact production and the process-wide cache |
//! | [`context`] | Explicit resolution context (activation / resolving) |
//! | [`event`] | Event sourcing for audit trail |
//! | [`config`] | `DEFERBIND_DISABLE` / `DEFERBIND_NO_WARN`, TOML config |
//! | [`error`] | Error types with fix suggestions |

// ═══════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════
pub mod api;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - Binding, activation, scopes
// ═══════════════════════════════════════════════════════════════
pub mod activation;
pub mod binding;
pub mod record;
pub mod scope;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - Loading, events, tracking
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod loader;
pub mod tracker;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Context, errors, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod context;
pub mod error;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod test_fixtures;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Entry points
pub use api::{
    begin_deferred_binding, begin_deferred_binding_if, deferred_type_binding,
    end_deferred_binding, global_binder, with_deferred_binding, ActivationHandle, Binder,
};

// Error types
pub use error::{DeferError, ErrorKind, FixSuggestion, LoadError, ResolutionError, Result};

// Config types
pub use config::{EngineConfig, ENV_DISABLE, ENV_NO_WARN};

// Context
pub use context::{ActivationId, ResolutionContext};

// Activation types
pub use activation::{
    Activation, ActivationOptions, ActivationState, BindingHook, ExitOutcome, ExitReport,
};

// Binding types
pub use binding::{
    AttributeChain, BindingRequest, FromPosition, ImportName, Proxy, ProxyId, SourceLocation,
    Statement, WeakProxy,
};

// Scope types
pub use scope::{
    rewrite, rewrite_owned, Bound, InterceptingKey, LazyCell, RewriteReport, Scope, Slot,
};

// Record types
pub use record::{LazyMember, RecordInstance, RecordType};

// Loader types
pub use loader::{Artifact, ArtifactCache, CacheEntry, Loader, Resolver};

// Event types
pub use event::{Event, EventEmitter, EventKind, EventLog, NoopEmitter};

pub use tracker::ProxyTracker;
