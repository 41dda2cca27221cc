//! Auto-Binder - write a resolved value back to every alias of a proxy
//!
//! An alias is only touched while its scope still maps it to the proxy
//! (raw or behind an intercepting entry). Names the caller deleted or
//! reassigned in the meantime are left alone.

use std::sync::Arc;

use tracing::trace;

use crate::context::ResolutionContext;
use crate::event::EventKind;
use crate::loader::Artifact;

use super::proxy::Proxy;

/// Replace every alias still bound to `proxy` with `value`
///
/// Returns the aliases that were rewritten.
pub fn bind(proxy: &Proxy, value: &Artifact, ctx: &ResolutionContext) -> Vec<String> {
    debug_assert!(ctx.is_resolving(), "auto-binding outside a resolution");
    let Some(scope) = proxy.request().owning_scope() else {
        return Vec::new();
    };

    let mut bound = Vec::new();
    for alias in proxy.aliases() {
        if scope.replace_bound_to(&alias, proxy.id(), Some(Arc::clone(value))) {
            trace!(alias = %alias, "alias bound");
            proxy.resolver().emit(EventKind::AliasBound {
                scope: Arc::clone(scope.name()),
                alias: alias.clone(),
                target: Arc::clone(proxy.request().target_path()),
            });
            bound.push(alias);
        }
    }
    bound
}

/// Remove every alias still bound to `proxy` (failed resolution, no fallback)
pub fn unbind(proxy: &Proxy, ctx: &ResolutionContext) -> Vec<String> {
    debug_assert!(ctx.is_resolving(), "auto-unbinding outside a resolution");
    let Some(scope) = proxy.request().owning_scope() else {
        return Vec::new();
    };

    let mut removed = Vec::new();
    for alias in proxy.aliases() {
        if scope.replace_bound_to(&alias, proxy.id(), None) {
            proxy.resolver().emit(EventKind::AliasUnbound {
                scope: Arc::clone(scope.name()),
                alias: alias.clone(),
                target: Arc::clone(proxy.request().target_path()),
            });
            removed.push(alias);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{AttributeChain, BindingRequest, SourceLocation};
    use crate::loader::Resolver;
    use crate::scope::{Bound, Scope};
    use crate::test_fixtures::sample_loader;
    use serde_json::json;

    fn setup() -> (Scope, Proxy) {
        let resolver = Arc::new(Resolver::new(Arc::new(sample_loader())));
        let scope = Scope::new("app", Arc::clone(&resolver));
        let request = BindingRequest::new(
            "pkg",
            AttributeChain::new(),
            &scope,
            SourceLocation::new("src/app.rs", 1),
        );
        let proxy = Proxy::new(request, None, None, resolver);
        (scope, proxy)
    }

    fn resolving() -> ResolutionContext {
        ResolutionContext::new().resolving("pkg").unwrap()
    }

    #[test]
    fn bind_replaces_aliases_still_pointing_at_proxy() {
        let (scope, proxy) = setup();
        scope.set("x", Bound::Proxy(proxy.clone()));
        scope.set("y", Bound::Proxy(proxy.clone()));
        proxy.request().add_alias("x");
        proxy.request().add_alias("y");

        let value = Arc::new(json!({"v": 1}));
        let bound = bind(&proxy, &value, &resolving());

        assert_eq!(bound, vec!["x", "y"]);
        for name in ["x", "y"] {
            let slot = scope.slot(name).unwrap();
            assert!(matches!(slot.as_value(), Some(v) if Arc::ptr_eq(v, &value)));
        }
    }

    #[test]
    fn bind_respects_reassigned_and_deleted_aliases() {
        let (scope, proxy) = setup();
        scope.set("kept", Bound::Proxy(proxy.clone()));
        scope.set("reassigned", Bound::Value(Arc::new(json!("mine"))));
        for alias in ["kept", "reassigned", "deleted"] {
            proxy.request().add_alias(alias);
        }

        let bound = bind(&proxy, &Arc::new(json!(1)), &resolving());

        assert_eq!(bound, vec!["kept"]);
        assert_eq!(
            scope.slot("reassigned").unwrap().as_value().map(|v| v.as_ref().clone()),
            Some(json!("mine"))
        );
        assert!(!scope.contains("deleted"));
    }

    #[test]
    fn unbind_removes_only_proxy_aliases() {
        let (scope, proxy) = setup();
        scope.set("x", Bound::Proxy(proxy.clone()));
        scope.set("other", Bound::Value(Arc::new(json!(2))));
        proxy.request().add_alias("x");
        proxy.request().add_alias("other");

        let removed = unbind(&proxy, &resolving());

        assert_eq!(removed, vec!["x"]);
        assert!(!scope.contains("x"));
        assert!(scope.contains("other"));
    }

    #[test]
    fn dropped_scope_is_a_no_op() {
        let (scope, proxy) = setup();
        proxy.request().add_alias("x");
        drop(scope);
        assert!(bind(&proxy, &Arc::new(json!(1)), &resolving()).is_empty());
    }
}
