//! Backing-store access trait and the shared, lock-guarded wrapper.

use std::io;
use std::sync::Mutex;

use bag_common::{BagError, BagResult};

use crate::records::{decode_descriptors, decode_nodes, NodePair, RefinementDescriptor};

/// Raw access to the two flat arrays behind the variable-resolution layer.
///
/// Implementations read rectangular windows of the per-cell descriptor array
/// and contiguous runs of the node array as raw bytes; decoding happens in
/// [`SharedStore`]. Chunk sizes report the backing layout's natural access
/// granularity, or 0 (or `(0, 0)`) when unknown.
pub trait RefinementStore: Send {
    /// Read `rows` x `cols` descriptor records starting at (row, col),
    /// row-major.
    fn read_descriptor_window(
        &mut self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> io::Result<Vec<u8>>;

    /// Read `count` node records starting at `start`.
    fn read_node_run(&mut self, start: usize, count: usize) -> io::Result<Vec<u8>>;

    /// Natural (rows, cols) chunking of the descriptor array.
    fn descriptor_chunk(&self) -> (usize, usize);

    /// Natural chunking of the node array, in records.
    fn node_chunk(&self) -> usize;

    /// Total length of the node array, in records.
    fn node_count(&self) -> usize;
}

/// Serialized, typed access to a [`RefinementStore`].
///
/// The backing handle is not assumed reentrant, so every read goes through
/// one coarse mutex. The lock is held only for the store call itself, never
/// during interpolation or statistic math. Chunk sizes and the node count
/// are snapshotted at construction and readable without the lock.
pub struct SharedStore {
    inner: Mutex<Box<dyn RefinementStore>>,
    node_count: usize,
    descriptor_chunk: (usize, usize),
    node_chunk: usize,
}

impl SharedStore {
    pub fn new(store: Box<dyn RefinementStore>) -> Self {
        let node_count = store.node_count();
        let descriptor_chunk = store.descriptor_chunk();
        let node_chunk = store.node_chunk();
        Self {
            inner: Mutex::new(store),
            node_count,
            descriptor_chunk,
            node_chunk,
        }
    }

    /// Total length of the node array, in records.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Natural (rows, cols) chunking of the descriptor array; (0, 0) when
    /// the backing store reports none.
    pub fn descriptor_chunk(&self) -> (usize, usize) {
        self.descriptor_chunk
    }

    /// Natural chunking of the node array; 0 when the backing store reports
    /// none.
    pub fn node_chunk(&self) -> usize {
        self.node_chunk
    }

    /// Fetch and decode a rectangular window of the descriptor array.
    pub fn descriptor_window(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> BagResult<Vec<RefinementDescriptor>> {
        let raw = {
            let mut guard = self.lock()?;
            guard.read_descriptor_window(row, col, rows, cols)?
        };
        let records = decode_descriptors(&raw)?;
        if records.len() != rows * cols {
            return Err(BagError::decode(format!(
                "descriptor window at ({row}, {col}): expected {} records, got {}",
                rows * cols,
                records.len()
            )));
        }
        Ok(records)
    }

    /// Fetch and decode a contiguous run of the node array.
    pub fn node_run(&self, start: usize, count: usize) -> BagResult<Vec<NodePair>> {
        let raw = {
            let mut guard = self.lock()?;
            guard.read_node_run(start, count)?
        };
        let records = decode_nodes(&raw)?;
        if records.len() != count {
            return Err(BagError::decode(format!(
                "node run at {start}: expected {count} records, got {}",
                records.len()
            )));
        }
        Ok(records)
    }

    fn lock(&self) -> BagResult<std::sync::MutexGuard<'_, Box<dyn RefinementStore>>> {
        self.inner
            .lock()
            .map_err(|_| BagError::storage("backing store lock poisoned"))
    }
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("node_count", &self.node_count)
            .field("descriptor_chunk", &self.descriptor_chunk)
            .field("node_chunk", &self.node_chunk)
            .finish()
    }
}
