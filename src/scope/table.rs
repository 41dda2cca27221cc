//! Scope - named symbol table with lazy cells
//!
//! Entries are plain values, raw proxies (between binding and rewrite) or
//! deferred cells. Reading a deferred cell is what triggers resolution.
//!
//! Lock discipline: the table lock is never held while a proxy resolves.
//! Lookups clone the slot out, drop the guard, then resolve; write-backs
//! re-check that the entry is still the one that was read.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::activation::{BindingHook, EagerHook};
use crate::binding::{BindingRequest, Proxy, ProxyId, SourceLocation, Statement};
use crate::context::{ActivationId, ResolutionContext};
use crate::error::{DeferError, Result};
use crate::loader::{Artifact, Resolver};

/// What a lookup hands back
#[derive(Debug, Clone)]
pub enum Bound {
    Value(Artifact),
    Proxy(Proxy),
}

impl Bound {
    pub fn as_value(&self) -> Option<&Artifact> {
        match self {
            Bound::Value(value) => Some(value),
            Bound::Proxy(_) => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Bound::Proxy(proxy) => Some(proxy),
            Bound::Value(_) => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Bound::Proxy(_))
    }

    /// Force to a value (resolving a proxy)
    pub fn into_value(self, ctx: &ResolutionContext) -> Result<Artifact> {
        match self {
            Bound::Value(value) => Ok(value),
            Bound::Proxy(proxy) => proxy.resolve(ctx),
        }
    }
}

impl From<Artifact> for Bound {
    fn from(value: Artifact) -> Self {
        Bound::Value(value)
    }
}

impl From<serde_json::Value> for Bound {
    fn from(value: serde_json::Value) -> Self {
        Bound::Value(Arc::new(value))
    }
}

impl From<Proxy> for Bound {
    fn from(proxy: Proxy) -> Self {
        Bound::Proxy(proxy)
    }
}

/// One table entry
#[derive(Debug, Clone)]
pub enum Slot {
    Value(Artifact),
    /// Bound during an activation, not yet rewritten
    Proxy(Proxy),
    /// Rewritten: resolves on first read
    Deferred(Arc<InterceptingKey>),
}

impl Slot {
    pub fn as_value(&self) -> Option<&Artifact> {
        match self {
            Slot::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Proxy behind a raw or deferred entry
    pub fn proxy(&self) -> Option<&Proxy> {
        match self {
            Slot::Value(_) => None,
            Slot::Proxy(proxy) => Some(proxy),
            Slot::Deferred(key) => Some(key.owner()),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Slot::Deferred(_))
    }

    fn refers_to(&self, id: ProxyId) -> bool {
        self.proxy().is_some_and(|p| p.id() == id)
    }
}

impl From<Bound> for Slot {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::Value(value) => Slot::Value(value),
            Bound::Proxy(proxy) => Slot::Proxy(proxy),
        }
    }
}

/// A value cell that produces its value on first access
pub trait LazyCell: Send + Sync {
    fn get(&self, ctx: &ResolutionContext) -> Result<Bound>;
    fn is_resolved(&self) -> bool;
}

/// Deferred scope entry: name + owning proxy + resolved flag
pub struct InterceptingKey {
    name: String,
    owner: Proxy,
    resolved: AtomicBool,
}

impl InterceptingKey {
    pub(crate) fn new(name: impl Into<String>, owner: Proxy) -> Self {
        let name = name.into();
        owner.request().add_alias(name.clone());
        Self {
            name,
            owner,
            resolved: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Proxy {
        &self.owner
    }

    /// Plain-name equality (what the host lookup compares against)
    pub fn matches(&self, name: &str) -> bool {
        self.name == name
    }
}

impl LazyCell for InterceptingKey {
    /// Resolve the owner proxy unless a resolution or activation is in
    /// progress, in which case the proxy itself is handed back.
    fn get(&self, ctx: &ResolutionContext) -> Result<Bound> {
        if ctx.is_resolving() || ctx.is_activation_open() {
            return Ok(Bound::Proxy(self.owner.clone()));
        }
        let value = self.owner.resolve(ctx)?;
        self.resolved.store(true, Ordering::Release);
        Ok(Bound::Value(value))
    }

    fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }
}

impl fmt::Debug for InterceptingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptingKey")
            .field("name", &self.name)
            .field("owner", &self.owner.id())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

pub(crate) struct ScopeInner {
    name: Arc<str>,
    table: RwLock<IndexMap<String, Slot>>,
    /// Hooks of the open activations, innermost last
    hooks: RwLock<Vec<Arc<dyn BindingHook>>>,
    resolver: Arc<Resolver>,
    introspectable: bool,
}

/// Cheap-clone handle to a named symbol table
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Scope that supports deferred binding
    pub fn new(name: impl Into<Arc<str>>, resolver: Arc<Resolver>) -> Self {
        Self::build(name.into(), resolver, true)
    }

    /// Scope without interception support; activations degrade to eager binding
    pub fn opaque(name: impl Into<Arc<str>>, resolver: Arc<Resolver>) -> Self {
        Self::build(name.into(), resolver, false)
    }

    fn build(name: Arc<str>, resolver: Arc<Resolver>, introspectable: bool) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name,
                table: RwLock::new(IndexMap::new()),
                hooks: RwLock::new(Vec::new()),
                resolver,
                introspectable,
            }),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.inner.name
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.inner.resolver
    }

    pub fn supports_interception(&self) -> bool {
        self.inner.introspectable
    }

    pub fn downgrade(&self) -> WeakScope {
        WeakScope(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ═══════════════════════════════════════════════════════════════
    // Binding hooks
    // ═══════════════════════════════════════════════════════════════

    /// Hook of the activation open in `ctx`, or the eager hook
    pub(crate) fn hook_for(&self, ctx: &ResolutionContext) -> Arc<dyn BindingHook> {
        let Some(id) = ctx.activation() else {
            return Arc::new(EagerHook);
        };
        self.inner
            .hooks
            .read()
            .iter()
            .rev()
            .find(|hook| hook.activation() == Some(id))
            .cloned()
            .unwrap_or_else(|| Arc::new(EagerHook))
    }

    pub(crate) fn push_hook(&self, hook: Arc<dyn BindingHook>) {
        self.inner.hooks.write().push(hook);
    }

    /// Unlink the hook of `activation` wherever it sits in the stack
    ///
    /// Returns `Some(true)` when it was the innermost hook, `Some(false)`
    /// when inner activations were still open, None when not installed.
    pub(crate) fn remove_hook(&self, activation: ActivationId) -> Option<bool> {
        let mut hooks = self.inner.hooks.write();
        let index = hooks
            .iter()
            .rposition(|hook| hook.activation() == Some(activation))?;
        hooks.remove(index);
        Some(index == hooks.len())
    }

    /// True while any activation's interception hook is installed
    pub fn is_intercepting(&self) -> bool {
        !self.inner.hooks.read().is_empty()
    }

    // ═══════════════════════════════════════════════════════════════
    // Lookup
    // ═══════════════════════════════════════════════════════════════

    /// Ordinary name lookup
    ///
    /// A deferred entry resolves here (once) unless `ctx` is resolving or
    /// has an activation open; then the proxy is returned untouched.
    pub fn get(&self, name: &str, ctx: &ResolutionContext) -> Result<Bound> {
        let slot = self.slot(name).ok_or_else(|| self.not_found(name))?;
        match slot {
            Slot::Value(value) => Ok(Bound::Value(value)),
            Slot::Proxy(proxy) => Ok(Bound::Proxy(proxy)),
            Slot::Deferred(key) => {
                let bound = key.get(ctx)?;
                if let Bound::Value(value) = &bound {
                    self.settle(name, &key, value);
                }
                Ok(bound)
            }
        }
    }

    /// Genuine use: like [`get`](Self::get) but raw proxies are forced too
    pub fn value(&self, name: &str, ctx: &ResolutionContext) -> Result<Artifact> {
        match self.get(name, ctx)? {
            Bound::Value(value) => Ok(value),
            Bound::Proxy(proxy) => {
                if proxy.request().is_owned_by(self) {
                    proxy.request().add_alias(name);
                }
                proxy.resolve(ctx)
            }
        }
    }

    /// Raw entry, without triggering anything
    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.inner.table.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.table.read().contains_key(name)
    }

    /// All names in binding order
    pub fn names(&self) -> Vec<String> {
        self.inner.table.read().keys().cloned().collect()
    }

    /// Names bound to plain values
    pub fn plain_names(&self) -> Vec<String> {
        self.collect_names(|slot| matches!(slot, Slot::Value(_)))
    }

    /// Names bound to raw proxies or deferred entries
    pub fn deferred_names(&self) -> Vec<String> {
        self.collect_names(|slot| !matches!(slot, Slot::Value(_)))
    }

    pub fn len(&self) -> usize {
        self.inner.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_names(&self, keep: impl Fn(&Slot) -> bool) -> Vec<String> {
        self.inner
            .table
            .read()
            .iter()
            .filter(|(_, slot)| keep(slot))
            .map(|(name, _)| name.clone())
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════
    // Mutation
    // ═══════════════════════════════════════════════════════════════

    /// Plain assignment (overrides whatever was bound)
    pub fn set(&self, name: impl Into<String>, bound: impl Into<Bound>) {
        let bound = bound.into();
        self.inner.table.write().insert(name.into(), bound.into());
    }

    pub fn remove(&self, name: &str) -> Option<Slot> {
        self.inner.table.write().shift_remove(name)
    }

    /// Execute a binding statement through the installed hook
    ///
    /// Wildcard statements are rejected before anything is bound.
    #[track_caller]
    pub fn execute(&self, ctx: &ResolutionContext, statement: &Statement) -> Result<()> {
        self.execute_at(ctx, statement, SourceLocation::caller())
    }

    pub(crate) fn execute_at(
        &self,
        ctx: &ResolutionContext,
        statement: &Statement,
        location: SourceLocation,
    ) -> Result<()> {
        if statement.is_wildcard() {
            return Err(DeferError::WildcardBinding {
                path: statement.path().to_string(),
            });
        }
        debug!(scope = %self.inner.name, statement = %statement, "executing");
        let hook = self.hook_for(ctx);
        for planned in statement.plan() {
            let request =
                BindingRequest::new(planned.target, planned.chain, self, location.clone())
                    .with_position(planned.position);
            let bound = hook.bind(self, request, ctx)?;
            debug!(name = %planned.name, deferred = bound.is_proxy(), "bound");
            self.set(planned.name, bound);
        }
        Ok(())
    }

    /// Swap raw proxies accepted by `keep` for deferred entries; returns the
    /// rewritten names
    pub(crate) fn convert_raw_proxies(&self, keep: impl Fn(&Proxy) -> bool) -> Vec<String> {
        let mut table = self.inner.table.write();
        let mut rewritten = Vec::new();
        for (name, slot) in table.iter_mut() {
            let Slot::Proxy(proxy) = slot else { continue };
            if !keep(proxy) {
                continue;
            }
            let key = Arc::new(InterceptingKey::new(name.clone(), proxy.clone()));
            if let Some(tracker) = self.inner.resolver.tracker() {
                tracker.track_key(&key);
            }
            *slot = Slot::Deferred(key);
            rewritten.push(name.clone());
        }
        rewritten
    }

    /// Replace (Some) or remove (None) `name` if it still refers to proxy `id`
    pub(crate) fn replace_bound_to(
        &self,
        name: &str,
        id: ProxyId,
        replacement: Option<Artifact>,
    ) -> bool {
        let mut table = self.inner.table.write();
        if !table.get(name).is_some_and(|slot| slot.refers_to(id)) {
            return false;
        }
        match replacement {
            Some(value) => {
                if let Some(slot) = table.get_mut(name) {
                    *slot = Slot::Value(value);
                }
            }
            None => {
                table.shift_remove(name);
            }
        }
        true
    }

    /// After a deferred read resolved: make `name` plain if it still holds `key`
    fn settle(&self, name: &str, key: &Arc<InterceptingKey>, value: &Artifact) {
        let mut table = self.inner.table.write();
        if let Some(slot) = table.get_mut(name) {
            if matches!(slot, Slot::Deferred(current) if Arc::ptr_eq(current, key)) {
                *slot = Slot::Value(Arc::clone(value));
            }
        }
    }

    fn not_found(&self, name: &str) -> DeferError {
        DeferError::NameNotFound {
            name: name.to_string(),
            scope: self.inner.name.to_string(),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("names", &self.names())
            .field("introspectable", &self.inner.introspectable)
            .finish()
    }
}

/// Non-owning scope handle held by binding requests
#[derive(Clone)]
pub struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(|inner| Scope { inner })
    }

    pub(crate) fn points_to(&self, scope: &Scope) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&scope.inner))
    }
}

impl fmt::Debug for WeakScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakScope")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::sample_loader;
    use serde_json::json;

    fn scope() -> Scope {
        let resolver = Arc::new(Resolver::new(Arc::new(sample_loader())));
        Scope::new("app", resolver)
    }

    #[test]
    fn set_get_remove_plain_values() {
        let scope = scope();
        let ctx = ResolutionContext::new();
        scope.set("answer", json!(42));

        let bound = scope.get("answer", &ctx).unwrap();
        assert_eq!(**bound.as_value().unwrap(), json!(42));
        assert!(scope.remove("answer").is_some());

        let err = scope.get("answer", &ctx).unwrap_err();
        assert!(matches!(err, DeferError::NameNotFound { .. }));
    }

    #[test]
    fn names_keep_binding_order() {
        let scope = scope();
        scope.set("b", json!(1));
        scope.set("a", json!(2));
        scope.set("c", json!(3));
        scope.remove("a");
        assert_eq!(scope.names(), vec!["b", "c"]);
    }

    #[test]
    fn eager_execute_binds_values() {
        let scope = scope();
        let ctx = ResolutionContext::new();
        scope
            .execute(&ctx, &"from pkg.sub import member as m".parse().unwrap())
            .unwrap();

        assert_eq!(scope.plain_names(), vec!["m"]);
        assert_eq!(scope.value("m", &ctx).unwrap()["name"], "member");
    }

    #[test]
    fn eager_execute_reports_statement_site() {
        let scope = scope();
        let err = scope
            .execute(&ResolutionContext::new(), &Statement::import("missing"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("table.rs"), "{err}");
    }

    #[test]
    fn wildcard_rejected_without_mutation() {
        let scope = scope();
        let err = scope
            .execute(
                &ResolutionContext::new(),
                &Statement::from_import("pkg", ["*"]),
            )
            .unwrap_err();
        assert!(matches!(err, DeferError::WildcardBinding { .. }));
        assert!(scope.is_empty());
    }

    #[test]
    fn weak_scope_points_to_origin() {
        let scope = scope();
        let other = scope.clone();
        let weak = scope.downgrade();
        assert!(weak.points_to(&other));
        assert!(weak.upgrade().unwrap().ptr_eq(&scope));
    }

    #[test]
    fn new_scope_is_not_intercepting() {
        let scope = scope();
        assert!(!scope.is_intercepting());
        assert!(scope.supports_interception());
    }
}
