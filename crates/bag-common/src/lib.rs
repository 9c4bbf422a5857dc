//! Shared geometry and error types for the bag-varres workspace.

pub mod bbox;
pub mod error;
pub mod geo;
pub mod raster;

pub use bbox::BoundingBox;
pub use error::{BagError, BagResult};
pub use geo::{GeoTransform, LowResGrid};
pub use raster::{BlockWindow, RasterGeometry};
