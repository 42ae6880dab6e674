use std::cell::RefCell;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::ops::Bound;
use std::sync::Arc;

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::Options;
use crate::cache::AdjacencyCache;
use crate::codec;
use crate::error::{Error, Result};
use crate::query::QueryPlan;
use crate::query::cache::PlanCache;
use crate::record::{Edge, EdgeSet, Node};
use crate::storage::batch::{GraphTable, IndexBatch, index_key};
use crate::storage::schema::{
    EDGE_DATA_SUFFIX, META_LAYOUT, NODE_DATA_SUFFIX, TABLE_GRAPH, TABLE_META, edge_key, node_key,
    strip_suffix, with_suffix,
};
use crate::storage::{Directed, GraphStore, IndexLayout, Side, Undirected};

pub type DirectedGraph = RedbGraph<Directed>;
pub type UndirectedGraph = RedbGraph<Undirected>;

/// Property graph persisted in a single redb file.
///
/// Adjacency sets are cached per index side; an undirected store only ever
/// touches the outgoing side.
#[derive(Debug)]
pub struct RedbGraph<L: IndexLayout> {
    db: Database,
    options: Options,
    out_cache: RefCell<AdjacencyCache>,
    in_cache: RefCell<AdjacencyCache>,
    plans: RefCell<PlanCache>,
    _layout: PhantomData<L>,
}

impl<L: IndexLayout> RedbGraph<L> {
    pub fn open(options: Options) -> Result<Self> {
        let db = open_database(&options)?;
        init_tables::<L>(&db)?;
        info!(
            path = %options.path().display(),
            layout = L::NAME,
            "graph.open"
        );
        Ok(Self {
            out_cache: RefCell::new(AdjacencyCache::new(options.adjacency_cache_budget())),
            in_cache: RefCell::new(AdjacencyCache::new(options.adjacency_cache_budget())),
            plans: RefCell::new(PlanCache::new(options.plan_cache_capacity())),
            db,
            options,
            _layout: PhantomData,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn cache(&self, side: Side) -> &RefCell<AdjacencyCache> {
        match side {
            Side::Out => &self.out_cache,
            Side::In => &self.in_cache,
        }
    }

    fn read_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TABLE_GRAPH)?;
        let value = match table.get(key)? {
            Some(bytes) => Some(codec::decode(bytes.value())?),
            None => None,
        };
        Ok(value)
    }

    fn contains_key(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TABLE_GRAPH)?;
        let found = table.get(key)?.is_some();
        Ok(found)
    }

    fn adjacency(&self, side: Side, node: &str) -> Result<EdgeSet> {
        if let Some(set) = self.cache(side).borrow_mut().get(node) {
            return Ok(set.clone());
        }
        let set: EdgeSet = self
            .read_value(&index_key(side, node))?
            .unwrap_or_default();
        self.cache(side)
            .borrow_mut()
            .insert(node.to_owned(), set.clone());
        Ok(set)
    }

    /// Pending set for `node`, read from the cache or the open write table.
    fn staged<'b>(
        &self,
        batch: &'b mut IndexBatch,
        table: &GraphTable<'_>,
        side: Side,
        node: &str,
    ) -> Result<&'b mut EdgeSet> {
        batch.entry(side, node, || {
            if let Some(set) = self.cache(side).borrow_mut().get(node) {
                return Ok(set.clone());
            }
            Ok(read_in(table, &index_key(side, node))?.unwrap_or_default())
        })
    }

    fn link(&self, batch: &mut IndexBatch, table: &GraphTable<'_>, edge: &Edge) -> Result<()> {
        self.staged(batch, table, Side::Out, &edge.from)?
            .insert(edge.id.clone());
        self.staged(batch, table, L::incoming(), &edge.to)?
            .insert(edge.id.clone());
        Ok(())
    }

    fn unlink(&self, batch: &mut IndexBatch, table: &GraphTable<'_>, edge: &Edge) -> Result<()> {
        self.staged(batch, table, Side::Out, &edge.from)?
            .remove(&edge.id);
        self.staged(batch, table, L::incoming(), &edge.to)?
            .remove(&edge.id);
        Ok(())
    }

    /// Writes one edge record and moves its id between endpoint indexes.
    fn stage_edge(
        &self,
        batch: &mut IndexBatch,
        table: &mut GraphTable<'_>,
        edge: &Edge,
    ) -> Result<()> {
        let key = edge_key(&edge.id);
        if let Some(previous) = read_in::<Edge>(table, &key)?
            && (previous.from != edge.from || previous.to != edge.to)
        {
            self.unlink(batch, table, &previous)?;
        }
        let bytes = codec::encode(edge)?;
        table.insert(key.as_str(), bytes.as_slice())?;
        self.link(batch, table, edge)
    }

    fn write_edges(&self, edges: &[Edge]) -> Result<()> {
        let txn = self.db.begin_write()?;
        let mut batch = IndexBatch::default();
        {
            let mut table = txn.open_table(TABLE_GRAPH)?;
            for edge in edges {
                self.stage_edge(&mut batch, &mut table, edge)?;
            }
            batch.flush(&mut table)?;
        }
        commit_or_abort(txn, "set_edges");
        debug!(
            edges = edges.len(),
            index_sets = batch.len(),
            "graph.set_edges"
        );
        self.write_through(batch);
        Ok(())
    }

    fn write_nodes(&self, nodes: &[Node]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TABLE_GRAPH)?;
            for node in nodes {
                let bytes = codec::encode(node)?;
                table.insert(node_key(&node.id).as_str(), bytes.as_slice())?;
            }
        }
        commit_or_abort(txn, "set_nodes");
        debug!(nodes = nodes.len(), "graph.set_nodes");
        Ok(())
    }

    fn write_through(&self, batch: IndexBatch) {
        for (side, node, set) in batch.into_entries() {
            self.cache(side).borrow_mut().insert(node, set);
        }
    }

    fn scan_ids(&self, suffix: &str, after: Option<&str>, limit: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if limit == 0 {
            return Ok(ids);
        }
        let start_key = after.map(|id| with_suffix(id, suffix));
        let start = match &start_key {
            Some(key) => Bound::Excluded(key.as_str()),
            None => Bound::Unbounded,
        };

        let txn = self.db.begin_read()?;
        let table = txn.open_table(TABLE_GRAPH)?;
        for entry in table.range::<&str>((start, Bound::Unbounded))? {
            let (key, _) = entry?;
            if let Some(id) = strip_suffix(key.value(), suffix) {
                ids.push(id.to_owned());
                if ids.len() == limit {
                    break;
                }
            }
        }
        Ok(ids)
    }
}

impl<L: IndexLayout> GraphStore for RedbGraph<L> {
    fn set_node(&mut self, node: &Node) -> Result<()> {
        self.write_nodes(std::slice::from_ref(node))
    }

    fn set_nodes_bundle(&mut self, nodes: &[Node]) -> Result<()> {
        self.write_nodes(nodes)
    }

    fn set_edge(&mut self, edge: &Edge) -> Result<()> {
        self.write_edges(std::slice::from_ref(edge))
    }

    fn set_edges_bundle(&mut self, edges: &[Edge]) -> Result<()> {
        self.write_edges(edges)
    }

    fn remove_node(&mut self, id: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        let mut batch = IndexBatch::default();
        let mut removed_edges = 0usize;
        {
            let mut table = txn.open_table(TABLE_GRAPH)?;
            table.remove(node_key(id).as_str())?;

            // Emptied sets are flushed as deletions of the victim's index keys.
            let mut incident = std::mem::take(self.staged(&mut batch, &table, Side::Out, id)?);
            if L::DIRECTED {
                incident.append(self.staged(&mut batch, &table, Side::In, id)?);
            }

            for edge_id in &incident {
                let key = edge_key(edge_id);
                let Some(edge) = read_in::<Edge>(&table, &key)? else {
                    warn!(node = id, edge = %edge_id, "graph.remove_node.dangling_edge");
                    continue;
                };
                table.remove(key.as_str())?;
                self.unlink(&mut batch, &table, &edge)?;
                removed_edges += 1;
            }
            batch.flush(&mut table)?;
        }
        commit_or_abort(txn, "remove_node");
        debug!(node = id, removed_edges, "graph.remove_node");
        self.write_through(batch);
        Ok(())
    }

    fn remove_edge(&mut self, id: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        let mut batch = IndexBatch::default();
        {
            let mut table = txn.open_table(TABLE_GRAPH)?;
            let key = edge_key(id);
            let Some(edge) = read_in::<Edge>(&table, &key)? else {
                return Ok(());
            };
            table.remove(key.as_str())?;
            self.unlink(&mut batch, &table, &edge)?;
            batch.flush(&mut table)?;
        }
        commit_or_abort(txn, "remove_edge");
        debug!(edge = id, "graph.remove_edge");
        self.write_through(batch);
        Ok(())
    }

    fn get_node(&self, id: &str) -> Result<Node> {
        self.read_value(&node_key(id))?
            .ok_or_else(|| Error::node_not_found(id))
    }

    fn get_edge(&self, id: &str) -> Result<Edge> {
        self.read_value(&edge_key(id))?
            .ok_or_else(|| Error::edge_not_found(id))
    }

    fn contains_node(&self, id: &str) -> Result<bool> {
        self.contains_key(&node_key(id))
    }

    fn contains_edge(&self, id: &str) -> Result<bool> {
        self.contains_key(&edge_key(id))
    }

    fn out_edges(&self, id: &str) -> Result<EdgeSet> {
        self.adjacency(Side::Out, id)
    }

    fn in_edges(&self, id: &str) -> Result<EdgeSet> {
        self.adjacency(L::incoming(), id)
    }

    fn is_directed(&self) -> bool {
        L::DIRECTED
    }

    fn node_ids_after(&self, after: Option<&str>, limit: usize) -> Result<Vec<String>> {
        self.scan_ids(NODE_DATA_SUFFIX, after, limit)
    }

    fn edge_ids_after(&self, after: Option<&str>, limit: usize) -> Result<Vec<String>> {
        self.scan_ids(EDGE_DATA_SUFFIX, after, limit)
    }

    fn plan(&self, text: &str) -> Result<Arc<QueryPlan>> {
        self.plans.borrow_mut().get_or_compile(text)
    }

    fn destroy(&mut self) -> Result<()> {
        // The file lock is only released once the old handle is dropped.
        let placeholder = Database::builder().create_with_backend(InMemoryBackend::new())?;
        drop(std::mem::replace(&mut self.db, placeholder));

        match std::fs::remove_file(self.options.path()) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        self.db = open_database(&self.options)?;
        init_tables::<L>(&self.db)?;
        self.out_cache.borrow_mut().clear();
        self.in_cache.borrow_mut().clear();
        self.plans.borrow_mut().clear();
        info!(path = %self.options.path().display(), "graph.destroy");
        Ok(())
    }
}

fn open_database(options: &Options) -> Result<Database> {
    Database::builder()
        .set_cache_size(options.backend_cache_bytes())
        .create(options.path())
        .map_err(|e| Error::BackendFatal(format!("{}: {e}", options.path().display())))
}

/// Creates the tables and records the layout, or checks it on reopen.
fn init_tables<L: IndexLayout>(db: &Database) -> Result<()> {
    let txn = db.begin_write()?;
    {
        let _ = txn.open_table(TABLE_GRAPH)?;
        let mut meta = txn.open_table(TABLE_META)?;
        let stored = meta.get(META_LAYOUT)?.map(|v| v.value().to_owned());
        match stored {
            Some(stored) if stored != L::NAME => {
                return Err(Error::LayoutMismatch {
                    stored,
                    requested: L::NAME,
                });
            }
            Some(_) => {}
            None => {
                meta.insert(META_LAYOUT, L::NAME)?;
            }
        }
    }
    txn.commit()
        .map_err(|e| Error::BackendFatal(format!("initialising tables: {e}")))
}

fn read_in<T: DeserializeOwned>(table: &GraphTable<'_>, key: &str) -> Result<Option<T>> {
    let value = match table.get(key)? {
        Some(bytes) => Some(codec::decode(bytes.value())?),
        None => None,
    };
    Ok(value)
}

/// A write that cannot be committed leaves no sane state to continue from.
fn commit_or_abort(txn: WriteTransaction, op: &'static str) {
    if let Err(err) = txn.commit() {
        error!(op, error = %err, "graph.commit_failed");
        std::process::abort();
    }
}
