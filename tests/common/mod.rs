//! Test fixtures and helpers

#![allow(dead_code)]

use std::sync::{Arc, Once};

use deferbind::test_fixtures::{sample_loader, StaticLoader};
use deferbind::{EventLog, ProxyTracker, Resolver, Scope};

static TRACING: Once = Once::new();

/// Route engine logs to the test writer (`RUST_LOG=deferbind=debug`)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Everything a scenario needs to observe the engine
pub struct Harness {
    pub loader: Arc<StaticLoader>,
    pub events: EventLog,
    pub tracker: Arc<ProxyTracker>,
    pub resolver: Arc<Resolver>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_loader(sample_loader())
    }

    pub fn with_loader(loader: StaticLoader) -> Self {
        init_tracing();
        let loader = Arc::new(loader);
        let events = EventLog::new();
        let tracker = Arc::new(ProxyTracker::new());
        let resolver = Resolver::new(loader.clone())
            .with_events(Arc::new(events.clone()))
            .with_tracker(Arc::clone(&tracker));
        Self {
            loader,
            events,
            tracker,
            resolver: Arc::new(resolver),
        }
    }

    pub fn scope(&self, name: &str) -> Scope {
        Scope::new(name, Arc::clone(&self.resolver))
    }

    pub fn opaque_scope(&self, name: &str) -> Scope {
        Scope::opaque(name, Arc::clone(&self.resolver))
    }
}
