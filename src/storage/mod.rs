// # Block Directory
//
// Maps table names to the storage blocks that back them. The transaction
// core treats this as an external collaborator: a worker asks which block
// addresses a command touches and locks exactly those. Tables are stored
// as runs of contiguous blocks, so the directory answers in extents and
// flattens them on demand.

use crate::common::BlockAddress;
use crate::error::DbError;
use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A contiguous, inclusive range of block addresses backing part of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub from: BlockAddress,
    pub to: BlockAddress,
}

impl Extent {
    pub fn new(from: BlockAddress, to: BlockAddress) -> Self {
        Self { from, to }
    }

    /// Number of blocks covered by this extent.
    pub fn len(&self) -> usize {
        if self.to < self.from {
            0
        } else {
            (self.to - self.from + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves table names to the storage blocks a command must lock.
pub trait BlockDirectory: Send + Sync {
    /// Returns the extents backing `table`.
    fn extents(&self, table: &str) -> Result<Vec<Extent>>;

    /// Returns every block address backing `table`, in extent order.
    fn block_addresses(&self, table: &str) -> Result<Vec<BlockAddress>> {
        let extents = self.extents(table)?;
        let mut addresses = Vec::new();
        for extent in extents {
            addresses.extend(extent.from..=extent.to);
        }
        Ok(addresses)
    }
}

/// In-memory block directory.
///
/// Backs tests and benchmarks; a disk-based engine would derive extents
/// from its segment headers instead.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    tables: RwLock<HashMap<String, Vec<Extent>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Registers the extents backing `table`, replacing any previous set.
    pub fn register_table(&self, table: &str, extents: Vec<Extent>) {
        self.tables.write().insert(table.to_string(), extents);
    }
}

impl BlockDirectory for InMemoryDirectory {
    fn extents(&self, table: &str) -> Result<Vec<Extent>> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("table '{}'", table)))
    }
}
