//! Binding Hooks - what a scope does with a binding request
//!
//! - `EagerHook`: resolve now (the default)
//! - `DeferringHook`: hand out proxies, installed by an activation
//!
//! A scope keeps a stack of deferring hooks, one per open activation, and
//! dispatches each request to the hook of the activation named by the
//! request's context. Requests no open activation owns bind eagerly.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::binding::{BindingRequest, Proxy, ProxyId};
use crate::context::{ActivationId, ResolutionContext};
use crate::error::{ResolutionError, Result};
use crate::event::EventKind;
use crate::scope::{Bound, Scope};

use super::controller::ActivationOptions;

/// Turns a binding request into a bound value or proxy
pub trait BindingHook: Send + Sync {
    fn bind(&self, scope: &Scope, request: BindingRequest, ctx: &ResolutionContext)
        -> Result<Bound>;

    /// Activation that installed this hook (None for eager hooks)
    fn activation(&self) -> Option<ActivationId> {
        None
    }
}

/// Resolve immediately through the scope's resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct EagerHook;

impl BindingHook for EagerHook {
    fn bind(
        &self,
        scope: &Scope,
        request: BindingRequest,
        ctx: &ResolutionContext,
    ) -> Result<Bound> {
        let artifact = scope
            .resolver()
            .resolve(request.target_path(), request.attribute_chain(), ctx)
            .map_err(|cause| ResolutionError {
                target: request.qualified_name(),
                cause,
                location: request.source_location().clone(),
                context: None,
            })?;
        Ok(Bound::Value(artifact))
    }
}

type ProxyKey = (Arc<str>, Vec<Arc<str>>);

/// Interception hook of one activation
pub struct DeferringHook {
    activation: ActivationId,
    options: ActivationOptions,
    proxies: Mutex<FxHashMap<ProxyKey, Proxy>>,
    seeded: Mutex<Vec<Arc<str>>>,
}

impl DeferringHook {
    pub(crate) fn new(activation: ActivationId, options: ActivationOptions) -> Self {
        Self {
            activation,
            options,
            proxies: Mutex::new(FxHashMap::default()),
            seeded: Mutex::new(Vec::new()),
        }
    }

    /// Cache placeholders this hook created (drained on exit)
    pub(crate) fn take_seeded(&self) -> Vec<Arc<str>> {
        std::mem::take(&mut *self.seeded.lock())
    }

    /// Number of distinct proxies handed out
    pub fn proxy_count(&self) -> usize {
        self.proxies.lock().len()
    }

    /// Identities of the proxies handed out (what this activation may rewrite)
    pub(crate) fn proxy_ids(&self) -> FxHashSet<ProxyId> {
        self.proxies.lock().values().map(Proxy::id).collect()
    }
}

impl BindingHook for DeferringHook {
    fn bind(
        &self,
        scope: &Scope,
        request: BindingRequest,
        ctx: &ResolutionContext,
    ) -> Result<Bound> {
        // Requests from other tasks (or from resolutions) are not ours
        if ctx.activation() != Some(self.activation) {
            return EagerHook.bind(scope, request, ctx);
        }

        let resolver = scope.resolver();
        let target = Arc::clone(request.target_path());
        if resolver.cache().is_resolved(&target) {
            debug!(path = %target, "already resolved, binding eagerly");
            return EagerHook.bind(scope, request, ctx);
        }

        if resolver.cache().seed_placeholder(&target, self.activation) {
            self.seeded.lock().push(Arc::clone(&target));
            resolver.emit(EventKind::PlaceholderSeeded {
                target: Arc::clone(&target),
                activation: self.activation.get(),
            });
        }

        let key: ProxyKey = (Arc::clone(&target), request.attribute_chain().to_vec());
        let mut proxies = self.proxies.lock();
        if let Some(existing) = proxies.get(&key) {
            return Ok(Bound::Proxy(existing.clone()));
        }

        let attributes = request
            .attribute_chain()
            .iter()
            .map(|a| a.to_string())
            .collect();
        let source = request.source_location().to_string();
        let proxy = Proxy::new(
            request,
            self.options.fallback.clone(),
            self.options.error_context.clone(),
            Arc::clone(resolver),
        );
        resolver.emit(EventKind::ProxyCreated {
            scope: Arc::clone(scope.name()),
            target,
            attributes,
            source,
        });
        proxies.insert(key, proxy.clone());
        Ok(Bound::Proxy(proxy))
    }

    fn activation(&self) -> Option<ActivationId> {
        Some(self.activation)
    }
}
