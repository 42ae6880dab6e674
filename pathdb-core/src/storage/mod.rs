use std::sync::Arc;

use crate::Result;
use crate::query::{MatchIterator, QueryPlan};
use crate::record::{Edge, EdgeSet, Node};

mod batch;
pub mod disk;
pub mod schema;

/// Adjacency direction of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Out,
    In,
}

/// Compile-time choice of how edges are indexed.
///
/// A directed store keeps separate out- and in-indexes; an undirected store
/// folds both into one index per node.
pub trait IndexLayout: 'static {
    const NAME: &'static str;
    const DIRECTED: bool;

    /// Index holding edges that end at a node.
    fn incoming() -> Side;
}

#[derive(Debug, Clone, Copy)]
pub struct Directed;

#[derive(Debug, Clone, Copy)]
pub struct Undirected;

impl IndexLayout for Directed {
    const NAME: &'static str = "directed";
    const DIRECTED: bool = true;

    fn incoming() -> Side {
        Side::In
    }
}

impl IndexLayout for Undirected {
    const NAME: &'static str = "undirected";
    const DIRECTED: bool = false;

    fn incoming() -> Side {
        Side::Out
    }
}

const SCAN_CHUNK: usize = 256;

/// CRUD and query surface of a graph store.
///
/// This is everything a client algorithm may rely on; it never needs the
/// underlying key layout.
pub trait GraphStore {
    fn set_node(&mut self, node: &Node) -> Result<()>;
    fn set_nodes_bundle(&mut self, nodes: &[Node]) -> Result<()>;
    fn set_edge(&mut self, edge: &Edge) -> Result<()>;
    fn set_edges_bundle(&mut self, edges: &[Edge]) -> Result<()>;

    /// Deletes the node and, in the same commit, every incident edge.
    fn remove_node(&mut self, id: &str) -> Result<()>;
    /// Deletes the edge; a missing edge is not an error.
    fn remove_edge(&mut self, id: &str) -> Result<()>;

    fn get_node(&self, id: &str) -> Result<Node>;
    fn get_edge(&self, id: &str) -> Result<Edge>;
    fn contains_node(&self, id: &str) -> Result<bool>;
    fn contains_edge(&self, id: &str) -> Result<bool>;

    fn out_edges(&self, id: &str) -> Result<EdgeSet>;
    fn in_edges(&self, id: &str) -> Result<EdgeSet>;

    fn is_directed(&self) -> bool;

    /// Up to `limit` node ids in key order, strictly after `after`.
    fn node_ids_after(&self, after: Option<&str>, limit: usize) -> Result<Vec<String>>;
    /// Up to `limit` edge ids in key order, strictly after `after`.
    fn edge_ids_after(&self, after: Option<&str>, limit: usize) -> Result<Vec<String>>;

    /// Parsed and planned form of `text`.
    fn plan(&self, text: &str) -> Result<Arc<QueryPlan>>;

    /// Purges every stored key and resets all caches.
    fn destroy(&mut self) -> Result<()>;

    fn query(&self, text: &str) -> Result<MatchIterator<'_, Self>>
    where
        Self: Sized,
    {
        let plan = self.plan(text)?;
        MatchIterator::new(self, plan)
    }

    /// The past-the-end iterator every exhausted query compares equal to.
    fn end(&self) -> MatchIterator<'_, Self>
    where
        Self: Sized,
    {
        MatchIterator::end(self)
    }

    fn node_count(&self) -> Result<usize> {
        count_ids(|after| self.node_ids_after(after, SCAN_CHUNK))
    }

    fn edge_count(&self) -> Result<usize> {
        count_ids(|after| self.edge_ids_after(after, SCAN_CHUNK))
    }
}

fn count_ids<F>(mut next_chunk: F) -> Result<usize>
where
    F: FnMut(Option<&str>) -> Result<Vec<String>>,
{
    let mut total = 0;
    let mut last: Option<String> = None;
    loop {
        let chunk = next_chunk(last.as_deref())?;
        total += chunk.len();
        if chunk.len() < SCAN_CHUNK {
            return Ok(total);
        }
        last = chunk.into_iter().last();
    }
}
