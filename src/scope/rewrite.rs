//! Scope Rewriter - turn raw proxies into self-resolving entries
//!
//! Runs once per clean activation exit. Every entry still holding a raw
//! proxy becomes a deferred entry and its name is recorded as an alias of
//! the proxy. Already-deferred entries and plain values are left alone, so
//! rewriting twice changes nothing.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use crate::binding::{Proxy, ProxyId};
use crate::event::EventKind;

use super::table::Scope;

/// What one rewrite pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    /// Names converted to deferred entries, in table order
    pub rewritten: Vec<String>,
}

impl RewriteReport {
    pub fn is_empty(&self) -> bool {
        self.rewritten.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rewritten.len()
    }
}

/// Convert every raw proxy in `scope` into a deferred entry
pub fn rewrite(scope: &Scope) -> RewriteReport {
    rewrite_where(scope, |_| true)
}

/// Convert only the raw proxies whose identity is in `owned`
///
/// Used on activation exit, so proxies of another still-open activation on
/// the same scope stay raw.
pub fn rewrite_owned(scope: &Scope, owned: &FxHashSet<ProxyId>) -> RewriteReport {
    rewrite_where(scope, |proxy| owned.contains(&proxy.id()))
}

fn rewrite_where(scope: &Scope, keep: impl Fn(&Proxy) -> bool) -> RewriteReport {
    let rewritten = scope.convert_raw_proxies(keep);
    if !rewritten.is_empty() {
        debug!(scope = %scope.name(), count = rewritten.len(), "scope rewritten");
        scope.resolver().emit(EventKind::ScopeRewritten {
            scope: Arc::clone(scope.name()),
            aliases: rewritten.clone(),
        });
    }
    RewriteReport { rewritten }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{AttributeChain, BindingRequest, SourceLocation};
    use crate::context::ResolutionContext;
    use crate::loader::Resolver;
    use crate::scope::{Bound, LazyCell, Slot};
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
        (scope.clone(), Proxy::new(request, None, None, resolver))
    }

    #[test]
    fn rewrite_converts_raw_proxies_and_records_aliases() {
        let (scope, proxy) = setup();
        scope.set("plain", json!(1));
        scope.set("pkg", Bound::Proxy(proxy.clone()));
        scope.set("alias", Bound::Proxy(proxy.clone()));

        let report = rewrite(&scope);

        assert_eq!(report.rewritten, vec!["pkg", "alias"]);
        assert_eq!(proxy.aliases(), vec!["alias", "pkg"]);
        assert!(scope.slot("pkg").unwrap().is_deferred());
        assert!(!scope.slot("plain").unwrap().is_deferred());
    }

    #[test]
    fn rewrite_is_idempotent() {
        let (scope, proxy) = setup();
        scope.set("pkg", Bound::Proxy(proxy.clone()));

        let first = rewrite(&scope);
        let Some(Slot::Deferred(key)) = scope.slot("pkg") else {
            panic!("expected deferred entry");
        };
        let second = rewrite(&scope);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        let Some(Slot::Deferred(again)) = scope.slot("pkg") else {
            panic!("expected deferred entry");
        };
        assert!(Arc::ptr_eq(&key, &again));
        assert!(!key.is_resolved());
    }

    #[test]
    fn rewrite_owned_leaves_foreign_proxies_raw() {
        let (scope, mine) = setup();
        let request = BindingRequest::new(
            "json",
            AttributeChain::new(),
            &scope,
            SourceLocation::new("src/app.rs", 2),
        );
        let foreign = Proxy::new(request, None, None, Arc::clone(scope.resolver()));
        scope.set("pkg", Bound::Proxy(mine.clone()));
        scope.set("json", Bound::Proxy(foreign));

        let owned: FxHashSet<ProxyId> = [mine.id()].into_iter().collect();
        let report = rewrite_owned(&scope, &owned);

        assert_eq!(report.rewritten, vec!["pkg"]);
        assert!(matches!(scope.slot("json"), Some(Slot::Proxy(_))));
    }

    #[test]
    fn reading_rewritten_entry_resolves_once() {
        let (scope, proxy) = setup();
        scope.set("pkg", Bound::Proxy(proxy));
        rewrite(&scope);

        let ctx = ResolutionContext::new();
        let value = scope.value("pkg", &ctx).unwrap();
        assert_eq!(value["VALUE"], 1);
        assert_eq!(scope.plain_names(), vec!["pkg"]);
        assert!(scope.deferred_names().is_empty());
    }
}
