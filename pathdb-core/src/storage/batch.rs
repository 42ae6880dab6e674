//! Adjacency sets touched by one write transaction.
//!
//! Every set is loaded once, mutated in memory, written back to the table
//! right before commit and handed to the caches only after the commit went
//! through. Reads inside the batch therefore see the batch's own changes.

use indexmap::IndexMap;
use indexmap::map::Entry;
use redb::Table;

use crate::codec;
use crate::error::Result;
use crate::record::EdgeSet;
use crate::storage::Side;
use crate::storage::schema::{in_key, out_key};

pub(crate) type GraphTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

pub(crate) fn index_key(side: Side, node: &str) -> String {
    match side {
        Side::Out => out_key(node),
        Side::In => in_key(node),
    }
}

#[derive(Debug, Default)]
pub(crate) struct IndexBatch {
    pending: IndexMap<(Side, String), EdgeSet>,
}

impl IndexBatch {
    /// The pending set for `node`, loaded through `load` on first touch.
    pub(crate) fn entry<F>(&mut self, side: Side, node: &str, load: F) -> Result<&mut EdgeSet>
    where
        F: FnOnce() -> Result<EdgeSet>,
    {
        match self.pending.entry((side, node.to_owned())) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => Ok(slot.insert(load()?)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Writes every pending set into `table`. Empty sets drop their key.
    pub(crate) fn flush(&self, table: &mut GraphTable<'_>) -> Result<()> {
        for ((side, node), set) in &self.pending {
            let key = index_key(*side, node);
            if set.is_empty() {
                table.remove(key.as_str())?;
            } else {
                let bytes = codec::encode(set)?;
                table.insert(key.as_str(), bytes.as_slice())?;
            }
        }
        Ok(())
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = (Side, String, EdgeSet)> {
        self.pending
            .into_iter()
            .map(|((side, node), set)| (side, node, set))
    }
}
