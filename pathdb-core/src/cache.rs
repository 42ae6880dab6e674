//! Bounded most-recently-used cache of adjacency sets.
//!
//! The budget is a weight rather than an entry count: an entry weighs as much
//! as the number of edge ids it holds (at least one). Overflow evicts the
//! least recently used entries a batch at a time.

use lru::LruCache;
use tracing::trace;

use crate::record::EdgeSet;

/// Entries dropped per eviction round once the budget is exceeded.
const EVICT_BATCH: usize = 10;

pub const DEFAULT_ADJACENCY_BUDGET: usize = 1024 * 1024;

#[derive(Debug)]
pub struct AdjacencyCache {
    entries: LruCache<String, EdgeSet>,
    weight: usize,
    budget: usize,
}

fn weigh(set: &EdgeSet) -> usize {
    set.len().max(1)
}

impl AdjacencyCache {
    pub fn new(budget: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            weight: 0,
            budget,
        }
    }

    /// Looks up the set for `node`, marking it as most recently used.
    pub fn get(&mut self, node: &str) -> Option<&EdgeSet> {
        self.entries.get(node)
    }

    /// Stores the current set for `node`, replacing any previous entry.
    pub fn insert(&mut self, node: String, set: EdgeSet) {
        self.weight += weigh(&set);
        if let Some(previous) = self.entries.put(node, set) {
            self.weight -= weigh(&previous);
        }
        if self.weight > self.budget {
            self.evict_batch();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.weight = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn weight(&self) -> usize {
        self.weight
    }

    fn evict_batch(&mut self) {
        let mut evicted = 0;
        while evicted < EVICT_BATCH {
            match self.entries.pop_lru() {
                Some((_, set)) => {
                    self.weight -= weigh(&set);
                    evicted += 1;
                }
                None => break,
            }
        }
        trace!(evicted, weight = self.weight, "adjacency_cache.evict");
    }
}
