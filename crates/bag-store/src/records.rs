//! Typed on-disk record layouts and the byte-window decode step.
//!
//! All arithmetic downstream of this module works on typed records; raw
//! bytes never leave the read boundary.

use bag_common::{BagError, BagResult};
use bytemuck::{Pod, Zeroable};

/// Size in bytes of one descriptor record (3 u32 + 4 f32).
pub const DESCRIPTOR_RECORD_SIZE: usize = std::mem::size_of::<RefinementDescriptor>();

/// Size in bytes of one node record (2 f32).
pub const NODE_RECORD_SIZE: usize = std::mem::size_of::<NodePair>();

/// Descriptor of one low-resolution cell's supergrid.
///
/// `width == 0` marks an unpopulated cell; every other field is then
/// meaningless. Offsets are in node-center convention, relative to the
/// south-west corner of the owning low-resolution cell.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct RefinementDescriptor {
    /// Offset of this supergrid's first node in the flat node array.
    pub index: u32,
    /// Node-grid width.
    pub width: u32,
    /// Node-grid height.
    pub height: u32,
    /// Node spacing in X, georeferenced units.
    pub res_x: f32,
    /// Node spacing in Y, georeferenced units.
    pub res_y: f32,
    /// X offset of the south-west node from the cell's south-west corner.
    pub sw_x: f32,
    /// Y offset of the south-west node from the cell's south-west corner.
    pub sw_y: f32,
}

impl RefinementDescriptor {
    pub fn is_populated(&self) -> bool {
        self.width > 0
    }

    /// Total node count of the supergrid.
    pub fn node_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// The coarser of the two node spacings; resolution filters apply to
    /// this value.
    pub fn max_resolution(&self) -> f32 {
        self.res_x.max(self.res_y)
    }
}

/// One supergrid node: a depth and its uncertainty.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct NodePair {
    pub depth: f32,
    pub uncertainty: f32,
}

impl NodePair {
    pub fn new(depth: f32, uncertainty: f32) -> Self {
        Self { depth, uncertainty }
    }

    /// Whether this node carries no sample, per the configured sentinel.
    pub fn is_nodata(&self, nodata: f32) -> bool {
        self.depth == nodata
    }
}

/// Decode a raw byte window of the descriptor array.
pub fn decode_descriptors(raw: &[u8]) -> BagResult<Vec<RefinementDescriptor>> {
    if raw.len() % DESCRIPTOR_RECORD_SIZE != 0 {
        return Err(BagError::decode(format!(
            "descriptor window of {} bytes is not a multiple of {} bytes",
            raw.len(),
            DESCRIPTOR_RECORD_SIZE
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(raw))
}

/// Decode a raw byte run of the node array.
pub fn decode_nodes(raw: &[u8]) -> BagResult<Vec<NodePair>> {
    if raw.len() % NODE_RECORD_SIZE != 0 {
        return Err(BagError::decode(format!(
            "node run of {} bytes is not a multiple of {} bytes",
            raw.len(),
            NODE_RECORD_SIZE
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(raw))
}

/// Encode descriptor records back to their on-disk byte layout.
pub fn encode_descriptors(records: &[RefinementDescriptor]) -> Vec<u8> {
    bytemuck::cast_slice(records).to_vec()
}

/// Encode node records back to their on-disk byte layout.
pub fn encode_nodes(records: &[NodePair]) -> Vec<u8> {
    bytemuck::cast_slice(records).to_vec()
}
