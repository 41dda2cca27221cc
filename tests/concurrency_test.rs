//! Concurrent Activation Tests
//!
//! Independent scopes on independent tasks run activations at the same
//! time; each task carries its own resolution context.

mod common;

use std::sync::Arc;

use common::Harness;
use deferbind::{Activation, ActivationOptions, ExitOutcome, ResolutionContext, Scope, Slot};
use serde_json::json;

fn bind_and_read(scope: Scope) -> deferbind::Result<(Scope, deferbind::Artifact)> {
    let mut act = Activation::new(
        scope.clone(),
        ResolutionContext::new(),
        ActivationOptions::default(),
    );
    act.enter()?;
    act.execute_str("import pkg")?;
    act.execute_str("from pkg.sub import member as m")?;
    act.exit(ExitOutcome::Clean)?;

    let m = scope.value("m", &ResolutionContext::new())?;
    Ok((scope, m))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_activations_on_private_resolvers() {
    let harnesses: Vec<Harness> = (0..8).map(|_| Harness::new()).collect();

    let handles: Vec<_> = harnesses
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let scope = h.scope(&format!("task{i}"));
            tokio::spawn(async move { bind_and_read(scope) })
        })
        .collect();

    for handle in handles {
        let (scope, m) = handle.await.unwrap().unwrap();
        assert_eq!(m["name"], "member");
        assert!(matches!(scope.slot("pkg"), Some(Slot::Deferred(_))));
        assert!(!scope.is_intercepting());
    }

    for h in &harnesses {
        assert_eq!(h.loader.call_count("pkg.sub"), 1);
        assert_eq!(h.loader.call_count("pkg"), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_activations_on_shared_resolver() {
    let h = Harness::new();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let scope = h.scope(&format!("task{i}"));
            tokio::spawn(async move { bind_and_read(scope) })
        })
        .collect();

    for handle in handles {
        let (scope, m) = handle.await.unwrap().unwrap();
        assert_eq!(m["name"], "member");
        assert_eq!(scope.value("pkg", &ResolutionContext::new()).unwrap()["VALUE"], 1);
    }

    // Every placeholder was evicted or replaced by a real artifact
    for path in h.resolver.cache().paths() {
        assert!(h.resolver.cache().is_resolved(&path), "{path}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_deferred_name_resolves_to_one_value() {
    let h = Harness::new();
    let scope = h.scope("shared");
    let mut act = Activation::new(
        scope.clone(),
        ResolutionContext::new(),
        ActivationOptions::default(),
    );
    act.enter().unwrap();
    act.execute_str("import json as codec").unwrap();
    act.exit(ExitOutcome::Clean).unwrap();

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let scope = scope.clone();
            tokio::spawn(async move { scope.value("codec", &ResolutionContext::new()) })
        })
        .collect();

    let mut values = Vec::new();
    for reader in readers {
        values.push(reader.await.unwrap().unwrap());
    }

    assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(values[0]["dumps"], json!({ "kind": "function", "name": "dumps" }));
    assert_eq!(h.loader.call_count("json"), 1);
}
