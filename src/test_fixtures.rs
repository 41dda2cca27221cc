//! Test Fixtures for deferbind
//!
//! In-memory loader and a small sample package tree, so tests do not
//! scatter artifact literals everywhere.
//!
//! # Usage
//!
//! ```rust,ignore
//! use deferbind::test_fixtures::*;
//!
//! let loader = Arc::new(sample_loader());
//! let scope = Scope::new("app", Arc::new(Resolver::new(loader.clone())));
//! // ... bind and read names ...
//! assert_eq!(loader.call_count("pkg.sub"), 1);
//! ```

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};

use crate::context::ResolutionContext;
use crate::error::LoadError;
use crate::loader::Loader;

// ═══════════════════════════════════════════════════════════════════════════
// SAMPLE PACKAGE TREE
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level package
pub const PKG: &str = "pkg";

/// Submodule with a `member` function and a `CONST`
pub const PKG_SUB: &str = "pkg.sub";

/// Nested submodule (only reachable by loading it)
pub const PKG_SUB_DEEP: &str = "pkg.sub.deep";

/// A second, unrelated top-level module
pub const JSON_MODULE: &str = "json";

/// Path no loader knows about
pub const MISSING: &str = "missing";

// ═══════════════════════════════════════════════════════════════════════════
// STATIC LOADER
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory loader that counts invocations per path
#[derive(Debug, Default)]
pub struct StaticLoader {
    artifacts: FxHashMap<String, Value>,
    failing: FxHashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact
    pub fn with(mut self, path: impl Into<String>, artifact: Value) -> Self {
        self.artifacts.insert(path.into(), artifact);
        self
    }

    /// Register a path that exists but fails to load
    pub fn failing(mut self, path: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failing.insert(path.into(), reason.into());
        self
    }

    /// Every path loaded, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|p| *p == path).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Loader for StaticLoader {
    fn load(&self, path: &str, _ctx: &ResolutionContext) -> Result<Value, LoadError> {
        self.calls.lock().push(path.to_string());
        if let Some(reason) = self.failing.get(path) {
            return Err(LoadError::failed(path, reason));
        }
        self.artifacts
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::not_found(path))
    }
}

/// Loader populated with the sample package tree
pub fn sample_loader() -> StaticLoader {
    StaticLoader::new()
        .with(
            PKG,
            json!({
                "__file__": "/site/pkg/__init__.json",
                "version": "1.0",
                "VALUE": 1,
            }),
        )
        .with(
            PKG_SUB,
            json!({
                "__file__": "/site/pkg/sub.json",
                "member": { "kind": "function", "name": "member" },
                "other": { "kind": "function", "name": "other" },
                "CONST": 42,
            }),
        )
        .with(
            PKG_SUB_DEEP,
            json!({
                "__file__": "/site/pkg/sub/deep.json",
                "leaf": true,
            }),
        )
        .with(
            JSON_MODULE,
            json!({
                "dumps": { "kind": "function", "name": "dumps" },
                "loads": { "kind": "function", "name": "loads" },
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_loader_counts_calls() {
        let loader = sample_loader();
        let ctx = ResolutionContext::new();
        loader.load(PKG, &ctx).unwrap();
        loader.load(PKG, &ctx).unwrap();
        let _ = loader.load(MISSING, &ctx);

        assert_eq!(loader.call_count(PKG), 2);
        assert_eq!(loader.total_calls(), 3);
        assert_eq!(loader.calls().last().map(String::as_str), Some(MISSING));
    }

    #[test]
    fn static_loader_failures() {
        let loader = StaticLoader::new().failing("broken", "syntax error");
        let ctx = ResolutionContext::new();
        assert!(matches!(
            loader.load("broken", &ctx),
            Err(LoadError::Failed { .. })
        ));
        assert!(loader.load("nothing", &ctx).unwrap_err().is_not_found());
    }
}
