//! Derived-Data Cache
//!
//! Memoizes derived values keyed by entity and kind. Each entry remembers the
//! design revision it was captured at and is only served while the design is
//! still at that revision.

use std::collections::HashMap;

use rg_proto::EntityId;
use tracing::trace;

use crate::derived::{DerivedKind, DerivedValue};

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped by explicit invalidation
    pub invalidations: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    revision: u64,
    value: DerivedValue,
}

/// Revision-keyed cache of derived data
#[derive(Debug, Default)]
pub struct DerivedCache {
    entries: HashMap<(EntityId, DerivedKind), CacheEntry>,
    stats: CacheStats,
}

impl DerivedCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, if it was captured at `current_revision`
    ///
    /// An entry from any other revision is dropped and counts as a miss.
    pub fn lookup(
        &mut self,
        id: &EntityId,
        kind: DerivedKind,
        current_revision: u64,
    ) -> Option<DerivedValue> {
        let key = (id.clone(), kind);
        match self.entries.get(&key) {
            Some(entry) if entry.revision == current_revision => {
                self.stats.hits += 1;
                trace!("Cache hit {} {} @{}", kind, id, current_revision);
                Some(entry.value.clone())
            }
            Some(entry) => {
                trace!(
                    "Cache entry {} {} @{} superseded by @{}",
                    kind, id, entry.revision, current_revision
                );
                self.entries.remove(&key);
                self.stats.misses += 1;
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store a value captured at `revision`
    pub fn store(&mut self, id: &EntityId, kind: DerivedKind, revision: u64, value: DerivedValue) {
        self.entries
            .insert((id.clone(), kind), CacheEntry { revision, value });
    }

    /// Whether any entry (of any revision) exists for the entity and kind
    pub fn contains(&self, id: &EntityId, kind: DerivedKind) -> bool {
        self.entries.contains_key(&(id.clone(), kind))
    }

    /// Drop every entry of an entity; returns how many were dropped
    pub fn invalidate(&mut self, id: &EntityId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _), _| entry_id != id);
        let dropped = before - self.entries.len();
        self.stats.invalidations += dropped as u64;
        dropped
    }

    /// Drop every entry of all given entities
    pub fn invalidate_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a EntityId>) -> usize {
        ids.into_iter().map(|id| self.invalidate(id)).sum()
    }

    /// Drop the entries of a closed design's entities
    pub fn evict_design(&mut self, ids: &[EntityId]) -> usize {
        let dropped = self.invalidate_all(ids);
        trace!("Evicted {} cache entries", dropped);
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
