//! ArtifactCache - process-wide resolved-artifact cache with DashMap
//!
//! Answers "is this name already resolved?" for the engine. Entries are either
//! a produced artifact or a placeholder seeded by an activation while it defers
//! a target. Placeholders are only ever evicted by the activation that seeded
//! them; produced artifacts are never evicted by the engine.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::context::ActivationId;

use super::Artifact;

/// One cache slot
#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// Produced by the loader
    Ready(Artifact),
    /// Reserved by a deferring activation; nothing has been loaded
    Placeholder(ActivationId),
}

impl CacheEntry {
    pub fn is_ready(&self) -> bool {
        matches!(self, CacheEntry::Ready(_))
    }
}

/// Thread-safe artifact cache (lock-free reads)
///
/// Uses Arc<str> keys so the same path string can be shared with events.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCache {
    entries: Arc<DashMap<Arc<str>, CacheEntry>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a produced artifact (placeholders are not artifacts)
    pub fn get(&self, path: &str) -> Option<Artifact> {
        self.entries.get(path).and_then(|entry| match entry.value() {
            CacheEntry::Ready(artifact) => Some(Arc::clone(artifact)),
            CacheEntry::Placeholder(_) => None,
        })
    }

    /// Raw entry, placeholders included
    pub fn entry(&self, path: &str) -> Option<CacheEntry> {
        self.entries.get(path).map(|e| e.value().clone())
    }

    pub fn is_resolved(&self, path: &str) -> bool {
        self.entries.get(path).is_some_and(|e| e.is_ready())
    }

    /// Store a produced artifact, replacing any placeholder
    pub fn insert(&self, path: &str, artifact: Artifact) -> Artifact {
        self.entries
            .insert(Arc::from(path), CacheEntry::Ready(Arc::clone(&artifact)));
        artifact
    }

    /// Reserve `path` for a deferring activation
    ///
    /// Returns false when the path is already present (ready or reserved);
    /// the existing entry is left untouched.
    pub fn seed_placeholder(&self, path: &str, activation: ActivationId) -> bool {
        match self.entries.entry(Arc::from(path)) {
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::Placeholder(activation));
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Remove the placeholder `activation` seeded for `path`
    ///
    /// Ready entries and other activations' placeholders are never removed.
    pub fn evict_placeholder(&self, path: &str, activation: ActivationId) -> bool {
        self.entries
            .remove_if(path, |_, entry| {
                matches!(entry, CacheEntry::Placeholder(owner) if *owner == activation)
            })
            .is_some()
    }

    /// Drop whatever non-ready entry sits at `path` (after a failed load)
    pub fn discard_unresolved(&self, path: &str) -> bool {
        self.entries
            .remove_if(path, |_, entry| !entry.is_ready())
            .is_some()
    }

    /// Host-side invalidation of any entry
    pub fn remove(&self, path: &str) -> Option<CacheEntry> {
        self.entries.remove(path).map(|(_, entry)| entry)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// All cached paths (unordered)
    pub fn paths(&self) -> Vec<Arc<str>> {
        self.entries.iter().map(|e| Arc::clone(e.key())).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
