//! Public API Tests
//!
//! Free functions on the global binder, assuming the engine is enabled
//! (neither `DEFERBIND_DISABLE` nor `DEFERBIND_NO_WARN` set).

mod common;

use std::sync::Arc;

use common::Harness;
use deferbind::{
    begin_deferred_binding, begin_deferred_binding_if, deferred_type_binding,
    end_deferred_binding, with_deferred_binding, DeferError, ResolutionContext, Slot,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_begin_end_round() {
    let h = Harness::new();
    let scope = h.scope("app");

    let handle = begin_deferred_binding(&scope, &ResolutionContext::new(), true).unwrap();
    assert!(handle.is_deferred());
    handle.execute_str("import pkg").unwrap();

    let report = end_deferred_binding(handle).unwrap().unwrap();
    assert_eq!(report.rewrite.unwrap().rewritten, vec!["pkg"]);
    assert!(matches!(scope.slot("pkg"), Some(Slot::Deferred(_))));
}

#[test]
fn test_begin_if_true_defers() {
    let h = Harness::new();
    let scope = h.scope("app");

    let handle = begin_deferred_binding_if(true, &scope, &ResolutionContext::new(), true).unwrap();
    handle.execute_str("from json import dumps").unwrap();
    end_deferred_binding(handle).unwrap();

    assert_eq!(scope.deferred_names(), vec!["dumps"]);
    assert_eq!(h.loader.total_calls(), 0);
}

#[test]
fn test_with_deferred_binding_propagates_block_error() {
    let h = Harness::new();
    let scope = h.scope("app");

    let err = with_deferred_binding(&scope, &ResolutionContext::new(), true, |handle| {
        handle.execute_str("import pkg")?;
        handle.execute_str("import 2bad")
    })
    .unwrap_err();

    assert!(matches!(err, DeferError::InvalidStatement { .. }));
    assert!(!scope.is_intercepting());
    assert!(matches!(scope.slot("pkg"), Some(Slot::Proxy(_))));
}

#[test]
fn test_type_binding_substitutes_default_for_unknown_target() {
    let h = Harness::new();
    let scope = h.scope("annotations");
    let ctx = ResolutionContext::new();

    let handle = deferred_type_binding(&scope, &ctx, json!("Any")).unwrap();
    handle.execute_str("from typeshed import StrPath").unwrap();
    handle.execute_str("from pkg.sub import member").unwrap();
    end_deferred_binding(handle).unwrap();

    assert_eq!(*scope.value("StrPath", &ctx).unwrap(), json!("Any"));
    assert_eq!(scope.value("member", &ctx).unwrap()["name"], "member");
}

#[test]
fn test_end_reports_evicted_placeholders() {
    let h = Harness::new();
    let scope = h.scope("app");
    let handle = begin_deferred_binding(&scope, &ResolutionContext::new(), true).unwrap();
    handle.execute_str("import pkg").unwrap();
    assert!(h.resolver.cache().contains("pkg"));

    let report = end_deferred_binding(handle).unwrap().unwrap();
    assert_eq!(report.evicted, vec!["pkg"]);
    assert!(h.resolver.cache().is_empty());

    let pkg = scope.value("pkg", &ResolutionContext::new()).unwrap();
    assert!(Arc::ptr_eq(
        &pkg,
        &h.resolver.cache().get("pkg").unwrap()
    ));
}
