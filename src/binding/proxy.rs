//! Proxy - the stand-in value handed out while a binding is deferred
//!
//! A proxy wraps one [`BindingRequest`] plus optional fallback and error
//! context. Lifecycle:
//! ```text
//! created (hook) ──attribute()──► derived proxy (chain + 1)
//!      │
//!      └──resolve()──► Resolved(value) | Failed(error) | Fallback(value)
//!                         │ cached, replayed on every later call
//!                         └──► auto-bind (or unbind on failure)
//! ```

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::ReentrantMutex;
use tracing::{debug, instrument};

use crate::context::ResolutionContext;
use crate::error::{DeferError, ResolutionError, Result};
use crate::event::EventKind;
use crate::loader::{Artifact, Resolver};

use super::autobind;
use super::request::BindingRequest;

static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique proxy identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(u64);

impl ProxyId {
    fn next() -> Self {
        Self(NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

struct ProxyInner {
    id: ProxyId,
    request: BindingRequest,
    fallback: Option<Artifact>,
    error_context: Option<String>,
    resolver: Arc<Resolver>,
    // Reentrant so a loader that reads its own target back on the same
    // thread is reported as circular instead of deadlocking.
    in_flight: ReentrantMutex<Cell<bool>>,
    /// Written once, after production; read without the lock
    outcome: OnceCell<std::result::Result<Artifact, ResolutionError>>,
}

/// Cheap-clone handle to a deferred value
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

impl Proxy {
    pub(crate) fn new(
        request: BindingRequest,
        fallback: Option<Artifact>,
        error_context: Option<String>,
        resolver: Arc<Resolver>,
    ) -> Self {
        let proxy = Self {
            inner: Arc::new(ProxyInner {
                id: ProxyId::next(),
                request,
                fallback,
                error_context,
                resolver,
                in_flight: ReentrantMutex::new(Cell::new(false)),
                outcome: OnceCell::new(),
            }),
        };
        if let Some(tracker) = proxy.inner.resolver.tracker() {
            tracker.track_proxy(&proxy);
        }
        proxy
    }

    pub fn id(&self) -> ProxyId {
        self.inner.id
    }

    pub fn request(&self) -> &BindingRequest {
        &self.inner.request
    }

    pub fn target_path(&self) -> &str {
        self.inner.request.target_path()
    }

    pub fn qualified_name(&self) -> String {
        self.inner.request.qualified_name()
    }

    pub fn fallback(&self) -> Option<&Artifact> {
        self.inner.fallback.as_ref()
    }

    pub fn error_context(&self) -> Option<&str> {
        self.inner.error_context.as_deref()
    }

    /// Aliases recorded so far (sorted)
    pub fn aliases(&self) -> Vec<String> {
        self.inner.request.declared_aliases()
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.inner.resolver
    }

    /// True once an outcome (success, fallback or failure) is cached
    pub fn is_resolved(&self) -> bool {
        self.inner.outcome.get().is_some()
    }

    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakProxy {
        WeakProxy(Arc::downgrade(&self.inner))
    }

    /// Proxy for `self.name`, without resolving anything
    ///
    /// `name` equal to the last component of the target (a package that
    /// re-exports itself) yields `self`.
    pub fn attribute(&self, name: &str) -> Proxy {
        let request = &self.inner.request;
        if request.attribute_chain().is_empty() && last_component(request.target_path()) == name {
            return self.clone();
        }
        let derived = Proxy::new(
            request.extended(name),
            self.inner.fallback.clone(),
            self.inner.error_context.clone(),
            Arc::clone(&self.inner.resolver),
        );
        debug!(target_path = %derived.qualified_name(), "derived proxy");
        derived
    }

    /// Produce the real value (once) and auto-bind every alias
    ///
    /// Refused while an activation is open in `ctx`. The outcome is cached:
    /// later calls replay the same value or the same error.
    #[instrument(name = "proxy_resolve", skip_all, fields(path = %self.qualified_name()))]
    pub fn resolve(&self, ctx: &ResolutionContext) -> Result<Artifact> {
        let resolving = ctx.resolving(&self.qualified_name())?;

        if let Some(outcome) = self.inner.outcome.get() {
            return outcome.clone().map_err(DeferError::from);
        }

        let in_flight = self.inner.in_flight.lock();
        // Another thread may have finished while we waited
        if let Some(outcome) = self.inner.outcome.get() {
            return outcome.clone().map_err(DeferError::from);
        }
        if in_flight.get() {
            return Err(DeferError::CircularResolution {
                target: self.qualified_name(),
            });
        }
        in_flight.set(true);
        let outcome = self.produce(&resolving);
        in_flight.set(false);

        self.inner
            .outcome
            .get_or_init(|| outcome)
            .clone()
            .map_err(DeferError::from)
    }

    fn produce(&self, ctx: &ResolutionContext) -> std::result::Result<Artifact, ResolutionError> {
        let request = &self.inner.request;
        let resolver = &self.inner.resolver;
        resolver.emit(EventKind::ResolutionStarted {
            target: Arc::clone(request.target_path()),
            aliases: request.declared_aliases().len(),
        });

        match resolver.resolve(request.target_path(), request.attribute_chain(), ctx) {
            Ok(artifact) => {
                autobind::bind(self, &artifact, ctx);
                Ok(artifact)
            }
            Err(cause) => {
                let error = ResolutionError {
                    target: request.qualified_name(),
                    cause,
                    location: request.source_location().clone(),
                    context: self.inner.error_context.clone(),
                };
                match &self.inner.fallback {
                    Some(fallback) => {
                        debug!(error = %error, "resolution failed, using fallback");
                        resolver.emit(EventKind::FallbackUsed {
                            target: Arc::clone(request.target_path()),
                            error: error.to_string(),
                        });
                        autobind::bind(self, fallback, ctx);
                        Ok(Arc::clone(fallback))
                    }
                    None => {
                        resolver.emit(EventKind::ResolutionFailed {
                            target: Arc::clone(request.target_path()),
                            error: error.to_string(),
                        });
                        autobind::unbind(self, ctx);
                        Err(error)
                    }
                }
            }
        }
    }
}

impl fmt::Display for Proxy {
    /// Simulated statement: `<import pkg ("f", line 3)>`,
    /// `<from pkg.sub import member, ... ("f", line 4)>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request = &self.inner.request;
        let location = request.source_location();
        match request.attribute_chain().split_last() {
            None => write!(f, "<import {} ({location})>", request.target_path()),
            Some((item, parents)) => {
                f.write_str("<from ")?;
                f.write_str(request.target_path())?;
                for parent in parents {
                    write!(f, ".{parent}")?;
                }
                f.write_str(" import ")?;
                let position = request.from_position();
                if position.is_some_and(|p| !p.is_first()) {
                    f.write_str("..., ")?;
                }
                f.write_str(item)?;
                if position.is_some_and(|p| !p.is_last()) {
                    f.write_str(", ...")?;
                }
                write!(f, " ({location})>")
            }
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.inner.id)
            .field("target", &self.qualified_name())
            .field("aliases", &self.aliases())
            .field("has_fallback", &self.inner.fallback.is_some())
            .finish()
    }
}

/// Non-owning proxy handle (used by the tracker)
#[derive(Clone)]
pub struct WeakProxy(Weak<ProxyInner>);

impl WeakProxy {
    pub fn upgrade(&self) -> Option<Proxy> {
        self.0.upgrade().map(|inner| Proxy { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

fn last_component(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
