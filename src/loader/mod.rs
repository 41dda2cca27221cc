//! Loader Module - the artifact-producing collaborator and the engine's resolver
//!
//! - `Loader`: external "produce the artifact at this dotted path" primitive
//! - `ArtifactCache`: process-wide resolved-artifact cache
//! - `Resolver`: cache-first loading plus attribute-chain walking
//!
//! Attribute walking follows the usual `from a.b import x` rules:
//! 1. If the artifact has a member `x`, use it.
//! 2. Otherwise try to load the sub-artifact `a.b.x`.
//! 3. If that does not exist either, fail with `MissingMember`.

mod cache;

pub use cache::{ArtifactCache, CacheEntry};

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::context::ResolutionContext;
use crate::error::LoadError;
use crate::event::{EventEmitter, EventKind, NoopEmitter};
use crate::tracker::ProxyTracker;

/// A resolved value. Identity is `Arc::ptr_eq`.
pub type Artifact = Arc<Value>;

/// Produces artifacts by dotted path
///
/// The context is forwarded so a loader that reads back into a scope sees the
/// reentrancy guard of the resolution that invoked it.
pub trait Loader: Send + Sync {
    fn load(&self, path: &str, ctx: &ResolutionContext) -> Result<Value, LoadError>;
}

impl<F> Loader for F
where
    F: Fn(&str, &ResolutionContext) -> Result<Value, LoadError> + Send + Sync,
{
    fn load(&self, path: &str, ctx: &ResolutionContext) -> Result<Value, LoadError> {
        self(path, ctx)
    }
}

/// Engine-side resolution: loader + cache + audit events
pub struct Resolver {
    loader: Arc<dyn Loader>,
    cache: ArtifactCache,
    events: Arc<dyn EventEmitter>,
    tracker: Option<Arc<ProxyTracker>>,
}

impl Resolver {
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        Self {
            loader,
            cache: ArtifactCache::new(),
            events: Arc::new(NoopEmitter),
            tracker: None,
        }
    }

    /// Share an existing cache (typically the host's process-wide one)
    pub fn with_cache(mut self, cache: ArtifactCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventEmitter>) -> Self {
        self.events = events;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<ProxyTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn tracker(&self) -> Option<&Arc<ProxyTracker>> {
        self.tracker.as_ref()
    }

    pub(crate) fn emit(&self, kind: EventKind) {
        self.events.emit(kind);
    }

    /// Load one artifact, cache first
    ///
    /// Only successful loads are cached; a failure leaves no entry behind.
    pub fn load_module(&self, path: &str, ctx: &ResolutionContext) -> Result<Artifact, LoadError> {
        if let Some(artifact) = self.cache.get(path) {
            trace!(path, "artifact cache hit");
            return Ok(artifact);
        }
        debug!(path, "loading artifact");
        match self.loader.load(path, ctx) {
            Ok(value) => Ok(self.cache.insert(path, Arc::new(value))),
            Err(err) => {
                self.cache.discard_unresolved(path);
                Err(err)
            }
        }
    }

    /// Load `target` and walk `chain` through its members
    pub fn resolve(
        &self,
        target: &str,
        chain: &[Arc<str>],
        ctx: &ResolutionContext,
    ) -> Result<Artifact, LoadError> {
        let mut current = self.load_module(target, ctx)?;
        let mut module_path = target.to_string();

        for attr in chain {
            current = match current.get(attr.as_ref()) {
                Some(member) => Arc::new(member.clone()),
                None => self.load_submodule(&current, &module_path, attr, ctx)?,
            };
            module_path.push('.');
            module_path.push_str(attr);
        }

        Ok(current)
    }

    fn load_submodule(
        &self,
        parent: &Value,
        module_path: &str,
        attr: &str,
        ctx: &ResolutionContext,
    ) -> Result<Artifact, LoadError> {
        let candidate = format!("{module_path}.{attr}");
        match self.load_module(&candidate, ctx) {
            Ok(artifact) => Ok(artifact),
            Err(err) if err.is_not_found() => Err(LoadError::MissingMember {
                name: attr.to_string(),
                module: module_path.to_string(),
                location: parent
                    .get("__file__")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown location")
                    .to_string(),
            }),
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cache", &self.cache.len())
            .field("tracking", &self.tracker.is_some())
            .finish()
    }
}
