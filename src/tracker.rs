//! Proxy Tracker - weak registry of proxies and deferred entries
//!
//! A debugging/test aid: attach one to a `Resolver` and every proxy and
//! intercepting key created through it is recorded without being kept
//! alive. After the owning scopes are dropped `live_proxies()` and
//! `live_keys()` should fall back to zero.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::binding::{Proxy, WeakProxy};
use crate::scope::InterceptingKey;

#[derive(Default)]
pub struct ProxyTracker {
    proxies: Mutex<Vec<WeakProxy>>,
    keys: Mutex<Vec<Weak<InterceptingKey>>>,
}

impl ProxyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track_proxy(&self, proxy: &Proxy) {
        let mut proxies = self.proxies.lock();
        proxies.retain(WeakProxy::is_alive);
        proxies.push(proxy.downgrade());
    }

    pub(crate) fn track_key(&self, key: &Arc<InterceptingKey>) {
        let mut keys = self.keys.lock();
        keys.retain(|k| k.strong_count() > 0);
        keys.push(Arc::downgrade(key));
    }

    /// Proxies still referenced somewhere
    pub fn live_proxies(&self) -> Vec<Proxy> {
        self.proxies
            .lock()
            .iter()
            .filter_map(WeakProxy::upgrade)
            .collect()
    }

    /// Intercepting keys still referenced somewhere
    pub fn live_keys(&self) -> Vec<Arc<InterceptingKey>> {
        self.keys.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn live_proxy_count(&self) -> usize {
        self.proxies.lock().iter().filter(|p| p.is_alive()).count()
    }

    pub fn live_key_count(&self) -> usize {
        self.keys
            .lock()
            .iter()
            .filter(|k| k.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for ProxyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyTracker")
            .field("live_proxies", &self.live_proxy_count())
            .field("live_keys", &self.live_key_count())
            .finish()
    }
}
