//! Variable-resolution bathymetric grid access engine.
//!
//! The backing format stores a coarse low-resolution index grid whose cells
//! each optionally own a variable-size, variable-resolution refinement grid
//! ("supergrid") of depth/uncertainty node pairs. This crate turns that
//! two-level representation into three kinds of raster views:
//!
//! - [`SupergridBand`] — one supergrid's own raster;
//! - [`MosaicBand`] — a fixed-resolution mosaic combining overlapping
//!   supergrid nodes per output cell with a configurable statistic;
//! - [`InterpolationBand`] — a continuously interpolated fixed-resolution
//!   surface blending neighboring supergrid nodes across cell boundaries.
//!
//! [`VarResDataset`] owns the validated [`RefinementCatalog`] and the node
//! cache and hands out bands and power-of-two [`OverviewLevel`]s that share
//! them.

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod interpolate;
pub mod mosaic;
pub mod overview;
pub mod supergrid;

pub use catalog::{RefinementCatalog, SupergridInfo};
pub use config::{
    CatalogOptions, OpenOptions, PopulationStrategy, ResolutionFilter, ResolutionStrategy,
};
pub use dataset::VarResDataset;
pub use interpolate::{InterpolationBand, SurfaceBlock};
pub use mosaic::{MosaicBand, MosaicBlock};
pub use overview::{OverviewBuilder, OverviewKind, OverviewLevel};
pub use supergrid::SupergridBand;
