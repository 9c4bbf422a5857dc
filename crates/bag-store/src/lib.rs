//! Read boundary for the variable-resolution bathymetry layer.
//!
//! The backing format stores two flat arrays: a per-cell descriptor array
//! (one record per low-resolution cell) and a node array (one depth /
//! uncertainty pair per supergrid node). This crate turns raw byte windows
//! of those arrays into typed records, serializes access to the
//! non-reentrant backing handle behind a single mutex, and provides the
//! chunked LRU read-through cache over the node array.

pub mod memory;
pub mod records;
pub mod store;
pub mod value_cache;

pub use memory::{MemoryStore, ReadStats};
pub use records::{
    decode_descriptors, decode_nodes, NodePair, RefinementDescriptor, DESCRIPTOR_RECORD_SIZE,
    NODE_RECORD_SIZE,
};
pub use store::{RefinementStore, SharedStore};
pub use value_cache::{ValueCache, ValueCacheStats, DEFAULT_NODE_CHUNK};
