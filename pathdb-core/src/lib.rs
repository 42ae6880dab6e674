//! pathdb core: an embedded property graph over redb, queried with path
//! patterns such as `select (id="A")-[e]->(b) return e, b`.

pub mod cache;
mod codec;
mod error;
pub mod query;
pub mod record;
pub mod storage;

use std::path::{Path, PathBuf};

pub use cache::{AdjacencyCache, DEFAULT_ADJACENCY_BUDGET};
pub use error::{Error, RecordKind, Result};
pub use query::cache::DEFAULT_PLAN_CACHE_CAPACITY;
pub use query::{Binding, MatchIterator, QueryPlan};
pub use record::{Edge, EdgeSet, Node, Properties, Value};
pub use storage::disk::{DirectedGraph, RedbGraph, UndirectedGraph};
pub use storage::{Directed, GraphStore, IndexLayout, Undirected};

/// redb page cache size used unless overridden.
pub const DEFAULT_BACKEND_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Store configuration used when opening an instance.
#[derive(Debug, Clone)]
pub struct Options {
    path: PathBuf,
    adjacency_cache_budget: usize,
    plan_cache_capacity: usize,
    backend_cache_bytes: usize,
}

impl Options {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            adjacency_cache_budget: DEFAULT_ADJACENCY_BUDGET,
            plan_cache_capacity: DEFAULT_PLAN_CACHE_CAPACITY,
            backend_cache_bytes: DEFAULT_BACKEND_CACHE_BYTES,
        }
    }

    /// Total weight (summed adjacency-set sizes) kept per index cache.
    pub fn with_adjacency_cache_budget(mut self, budget: usize) -> Self {
        self.adjacency_cache_budget = budget;
        self
    }

    pub fn with_plan_cache_capacity(mut self, capacity: usize) -> Self {
        self.plan_cache_capacity = capacity;
        self
    }

    pub fn with_backend_cache_bytes(mut self, bytes: usize) -> Self {
        self.backend_cache_bytes = bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn adjacency_cache_budget(&self) -> usize {
        self.adjacency_cache_budget
    }

    pub fn plan_cache_capacity(&self) -> usize {
        self.plan_cache_capacity
    }

    pub fn backend_cache_bytes(&self) -> usize {
        self.backend_cache_bytes
    }
}
