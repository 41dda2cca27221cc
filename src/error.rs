// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Deferbind Error Types with Error Codes
//!
//! Error code ranges:
//! - DEFER-010-019: Usage errors (fatal, never retried)
//! - DEFER-020-029: Resolution errors (surfaced at first use)
//! - DEFER-030-039: Capability errors
//! - DEFER-040-049: Configuration errors

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::binding::SourceLocation;

pub type Result<T> = std::result::Result<T, DeferError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Coarse error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misuse of the engine; fatal
    Usage,
    /// The deferred target could not be produced
    Resolution,
    /// The host scope cannot support deferral
    Capability,
    /// Configuration could not be read
    Config,
}

/// Failure reported by a [`Loader`](crate::loader::Loader).
///
/// Clone so a proxy can replay the same failure on every later call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("no artifact named '{path}'")]
    NotFound { path: String },

    #[error("cannot bind name '{name}' from '{module}' ({location})")]
    MissingMember {
        name: String,
        module: String,
        location: String,
    },

    #[error("loading '{path}' failed: {reason}")]
    Failed { path: String, reason: String },
}

impl LoadError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn failed(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Failed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the artifact simply does not exist (as opposed to existing but failing)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A load failure decorated with the site of the deferred binding statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    /// Dotted target plus attribute chain, e.g. `pkg.sub.member`
    pub target: String,
    /// The loader's original failure
    pub cause: LoadError,
    /// Where the deferred binding statement was written
    pub location: SourceLocation,
    /// Extra caller-provided context
    pub context: Option<String>,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (caused by deferred binding at {})",
            self.cause, self.location
        )?;
        if let Some(context) = &self.context {
            write!(f, " [{context}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
pub enum DeferError {
    // ═══════════════════════════════════════════
    // USAGE ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[DEFER-010] Activation {activation} entered twice")]
    #[diagnostic(
        code(deferbind::activation_reentered),
        help("Create a new activation for every deferred block")
    )]
    ActivationReentered { activation: u64 },

    #[error("[DEFER-011] Activation {activation} is not active")]
    #[diagnostic(code(deferbind::activation_not_active))]
    ActivationNotActive { activation: u64 },

    #[error("[DEFER-012] binding context not supported: cannot bind deferred '{target}' as member '{member}' of record '{record}'")]
    #[diagnostic(
        code(deferbind::unsupported_binding_context),
        help("Bind the name at scope level, or attach it lazily to a live instance")
    )]
    UnsupportedBindingContext {
        record: String,
        member: String,
        target: String,
    },

    #[error("[DEFER-013] Wildcard deferred binding from '{path}' is not supported")]
    #[diagnostic(
        code(deferbind::wildcard_binding),
        help("List the names to bind explicitly")
    )]
    WildcardBinding { path: String },

    #[error("[DEFER-014] Cannot open an activation while a resolution is in progress")]
    #[diagnostic(code(deferbind::activation_during_resolution))]
    ActivationDuringResolution,

    #[error("[DEFER-015] Cannot resolve '{target}' inside an open activation")]
    #[diagnostic(
        code(deferbind::resolve_inside_activation),
        help("Use the name after the deferred block has exited")
    )]
    ResolveInsideActivation { target: String },

    #[error("[DEFER-016] Invalid binding statement '{statement}': {reason}")]
    #[diagnostic(
        code(deferbind::invalid_statement),
        help("Use 'import a.b [as x]' or 'from a.b import x [as y], ...'")
    )]
    InvalidStatement { statement: String, reason: String },

    // ═══════════════════════════════════════════
    // RESOLUTION ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[DEFER-020] {0}")]
    #[diagnostic(code(deferbind::resolution_failed))]
    Resolution(#[from] ResolutionError),

    #[error("[DEFER-021] Circular resolution of '{target}'")]
    #[diagnostic(
        code(deferbind::circular_resolution),
        help("The loader for this target reads the target itself; break the cycle")
    )]
    CircularResolution { target: String },

    #[error("[DEFER-022] Name '{name}' is not bound in '{scope}'")]
    #[diagnostic(code(deferbind::name_not_found))]
    NameNotFound { name: String, scope: String },

    // ═══════════════════════════════════════════
    // CAPABILITY ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[DEFER-030] cannot default to eager mode in '{scope}'")]
    #[diagnostic(
        code(deferbind::eager_fallback_prevented),
        help("Pass prevent_fallback = false to accept eager binding on this host")
    )]
    EagerFallbackPrevented { scope: String },

    // ═══════════════════════════════════════════
    // CONFIGURATION ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[DEFER-040] Configuration error: {reason}")]
    #[diagnostic(code(deferbind::config_error))]
    ConfigError { reason: String },
}

impl DeferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ActivationReentered { .. }
            | Self::ActivationNotActive { .. }
            | Self::UnsupportedBindingContext { .. }
            | Self::WildcardBinding { .. }
            | Self::ActivationDuringResolution
            | Self::ResolveInsideActivation { .. }
            | Self::InvalidStatement { .. } => ErrorKind::Usage,
            Self::Resolution(_) | Self::CircularResolution { .. } | Self::NameNotFound { .. } => {
                ErrorKind::Resolution
            }
            Self::EagerFallbackPrevented { .. } => ErrorKind::Capability,
            Self::ConfigError { .. } => ErrorKind::Config,
        }
    }

    pub fn is_usage(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }
}

impl FixSuggestion for DeferError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            DeferError::ActivationReentered { .. } => {
                Some("Each activation is single-use; create a new one")
            }
            DeferError::ActivationNotActive { .. } => Some("Call enter() before exit()"),
            DeferError::UnsupportedBindingContext { .. } => {
                Some("Use RecordInstance::attach_lazy on a live instance instead")
            }
            DeferError::WildcardBinding { .. } => Some("Replace '*' with explicit names"),
            DeferError::ActivationDuringResolution => {
                Some("Open activations from top-level code, not from a loader")
            }
            DeferError::ResolveInsideActivation { .. } => {
                Some("Move the use of the name after the deferred block")
            }
            DeferError::InvalidStatement { .. } => {
                Some("Check the statement syntax: import a.b as x")
            }
            DeferError::Resolution(_) => {
                Some("Check the target path exists, or configure a fallback value")
            }
            DeferError::CircularResolution { .. } => {
                Some("Do not use a deferred name from the loader that produces it")
            }
            DeferError::NameNotFound { .. } => Some("Bind the name before reading it"),
            DeferError::EagerFallbackPrevented { .. } => {
                Some("Set prevent_fallback = false or unset DEFERBIND_DISABLE")
            }
            DeferError::ConfigError { .. } => Some("Check the TOML syntax of the config file"),
        }
    }
}
