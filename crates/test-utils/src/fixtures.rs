//! Synthetic two-level grid datasets over the in-memory backing store.

use bag_common::{BoundingBox, LowResGrid};
use bag_store::{MemoryStore, NodePair, ReadStats, RefinementDescriptor};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Builder for a low-resolution grid plus backing descriptor/node arrays.
///
/// Cell rows are indexed south to north, matching the descriptor array.
/// Node slices are given in storage order: south row first, west to east.
#[derive(Debug)]
pub struct FixtureDataset {
    grid: LowResGrid,
    store: MemoryStore,
}

impl FixtureDataset {
    pub fn new(width: usize, height: usize, bounds: BoundingBox) -> Self {
        Self {
            grid: LowResGrid::new(width, height, bounds),
            store: MemoryStore::new(width, height),
        }
    }

    /// Populate cell (row, col) with a supergrid of the given nodes.
    ///
    /// Panics if the node slice does not match `width * height`.
    pub fn add_supergrid(
        &mut self,
        row: usize,
        col: usize,
        width: u32,
        height: u32,
        res: (f32, f32),
        sw: (f32, f32),
        nodes: &[NodePair],
    ) -> &mut Self {
        assert_eq!(
            nodes.len(),
            (width * height) as usize,
            "node slice must match supergrid dimensions"
        );
        let index = self.store.push_nodes(nodes);
        self.store.set_descriptor(
            row,
            col,
            RefinementDescriptor {
                index,
                width,
                height,
                res_x: res.0,
                res_y: res.1,
                sw_x: sw.0,
                sw_y: sw.1,
            },
        );
        self
    }

    /// [`add_supergrid`](Self::add_supergrid) from depth values alone;
    /// uncertainty is `depth / 10`.
    pub fn add_supergrid_depths(
        &mut self,
        row: usize,
        col: usize,
        width: u32,
        height: u32,
        res: (f32, f32),
        sw: (f32, f32),
        depths: &[f32],
    ) -> &mut Self {
        let nodes: Vec<NodePair> = depths
            .iter()
            .map(|&d| NodePair::new(d, d / 10.0))
            .collect();
        self.add_supergrid(row, col, width, height, res, sw, &nodes)
    }

    /// Install a descriptor verbatim, without pushing nodes. For tests that
    /// feed malformed metadata through validation.
    pub fn add_raw_descriptor(
        &mut self,
        row: usize,
        col: usize,
        descriptor: RefinementDescriptor,
    ) -> &mut Self {
        self.store.set_descriptor(row, col, descriptor);
        self
    }

    /// Append nodes not owned by any descriptor, growing the flat array.
    pub fn pad_nodes(&mut self, count: usize) -> &mut Self {
        self.store.push_nodes(&vec![NodePair::default(); count]);
        self
    }

    /// Advertise natural chunk sizes; 0 / (0, 0) means "unknown".
    pub fn set_chunk_sizes(
        &mut self,
        descriptor_chunk: (usize, usize),
        node_chunk: usize,
    ) -> &mut Self {
        self.store.set_chunk_sizes(descriptor_chunk, node_chunk);
        self
    }

    /// Counters of backing reads, valid after `into_parts`.
    pub fn stats(&self) -> ReadStats {
        self.store.stats()
    }

    /// Switch that makes subsequent node reads fail, valid after
    /// `into_parts`.
    pub fn fail_node_reads_handle(&self) -> Arc<AtomicBool> {
        self.store.fail_node_reads_handle()
    }

    pub fn grid(&self) -> LowResGrid {
        self.grid
    }

    pub fn into_parts(self) -> (LowResGrid, MemoryStore) {
        (self.grid, self.store)
    }
}

/// A `count`-node slice of one constant depth/uncertainty pair.
pub fn uniform_nodes(count: usize, depth: f32, uncertainty: f32) -> Vec<NodePair> {
    vec![NodePair::new(depth, uncertainty); count]
}
