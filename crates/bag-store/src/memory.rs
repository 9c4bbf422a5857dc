//! In-memory reference backend.
//!
//! Holds the dense descriptor grid and node array directly; reads are
//! encoded to the on-disk byte layout so every access exercises the same
//! decode path as a real backing store. Tests use the shared [`ReadStats`]
//! and failure switch to observe and perturb the read path.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::records::{encode_descriptors, encode_nodes, NodePair, RefinementDescriptor};
use crate::store::RefinementStore;

/// Backing-read counters, shared with whoever built the store.
#[derive(Debug, Default, Clone)]
pub struct ReadStats {
    descriptor_windows: Arc<AtomicU64>,
    node_runs: Arc<AtomicU64>,
}

impl ReadStats {
    pub fn descriptor_windows(&self) -> u64 {
        self.descriptor_windows.load(Ordering::Relaxed)
    }

    pub fn node_runs(&self) -> u64 {
        self.node_runs.load(Ordering::Relaxed)
    }
}

/// In-memory [`RefinementStore`] over a dense low-resolution descriptor grid
/// and a flat node array.
#[derive(Debug)]
pub struct MemoryStore {
    grid_width: usize,
    grid_height: usize,
    descriptors: Vec<RefinementDescriptor>,
    nodes: Vec<NodePair>,
    descriptor_chunk: (usize, usize),
    node_chunk: usize,
    stats: ReadStats,
    fail_node_reads: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create a store over an unpopulated `grid_width` x `grid_height`
    /// descriptor grid with an empty node array.
    pub fn new(grid_width: usize, grid_height: usize) -> Self {
        Self {
            grid_width,
            grid_height,
            descriptors: vec![RefinementDescriptor::default(); grid_width * grid_height],
            nodes: Vec::new(),
            descriptor_chunk: (0, 0),
            node_chunk: 0,
            stats: ReadStats::default(),
            fail_node_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the descriptor of cell (row, col); row 0 is the southernmost row.
    pub fn set_descriptor(&mut self, row: usize, col: usize, descriptor: RefinementDescriptor) {
        self.descriptors[row * self.grid_width + col] = descriptor;
    }

    /// Append nodes to the flat array, returning the start index of the run.
    pub fn push_nodes(&mut self, nodes: &[NodePair]) -> u32 {
        let start = self.nodes.len() as u32;
        self.nodes.extend_from_slice(nodes);
        start
    }

    /// Advertise natural chunk sizes; 0 / (0, 0) means "unknown".
    pub fn set_chunk_sizes(&mut self, descriptor_chunk: (usize, usize), node_chunk: usize) {
        self.descriptor_chunk = descriptor_chunk;
        self.node_chunk = node_chunk;
    }

    /// Counters of backing reads, usable after the store is boxed away.
    pub fn stats(&self) -> ReadStats {
        self.stats.clone()
    }

    /// Switch that makes every subsequent node read fail with an I/O error.
    pub fn fail_node_reads_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_node_reads)
    }
}

impl RefinementStore for MemoryStore {
    fn read_descriptor_window(
        &mut self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> io::Result<Vec<u8>> {
        if row + rows > self.grid_height || col + cols > self.grid_width {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "descriptor window ({row}+{rows}, {col}+{cols}) outside \
                     {}x{} grid",
                    self.grid_height, self.grid_width
                ),
            ));
        }
        self.stats
            .descriptor_windows
            .fetch_add(1, Ordering::Relaxed);
        let mut window = Vec::with_capacity(rows * cols);
        for r in row..row + rows {
            let base = r * self.grid_width + col;
            window.extend_from_slice(&self.descriptors[base..base + cols]);
        }
        Ok(encode_descriptors(&window))
    }

    fn read_node_run(&mut self, start: usize, count: usize) -> io::Result<Vec<u8>> {
        if self.fail_node_reads.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "injected node read failure",
            ));
        }
        if start + count > self.nodes.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "node run {start}+{count} outside array of {}",
                    self.nodes.len()
                ),
            ));
        }
        self.stats.node_runs.fetch_add(1, Ordering::Relaxed);
        Ok(encode_nodes(&self.nodes[start..start + count]))
    }

    fn descriptor_chunk(&self) -> (usize, usize) {
        self.descriptor_chunk
    }

    fn node_chunk(&self) -> usize {
        self.node_chunk
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
