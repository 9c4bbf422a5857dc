//! Error types for variable-resolution grid access.

use thiserror::Error;

/// Result type alias using BagError.
pub type BagResult<T> = Result<T, BagError>;

/// Primary error type for the variable-resolution grid engine.
#[derive(Debug, Error)]
pub enum BagError {
    // === Descriptor validation (open-time) ===
    #[error("incorrect resolution for supergrid ({row}, {col})")]
    InvalidSupergridResolution { row: usize, col: usize },

    #[error("incorrect index / dimensions for supergrid ({row}, {col})")]
    SupergridIndexOutOfRange { row: usize, col: usize },

    #[error(
        "incorrect bounds for supergrid ({row}, {col}): {sw_x}, {sw_y}, {far_x}, {far_y}"
    )]
    SupergridBoundsOutOfCell {
        row: usize,
        col: usize,
        sw_x: f64,
        sw_y: f64,
        far_x: f64,
        far_y: f64,
    },

    // === Resource limits (open-time) ===
    #[error(
        "catalog of refinement grids has reached {limit} entries; \
         raise CatalogOptions::max_cells to allow more"
    )]
    CatalogFull { limit: usize },

    #[error("no valid supergrids")]
    NoValidSupergrids,

    // === Configuration ===
    #[error("invalid resolution: {res_x} x {res_y}")]
    InvalidResolution { res_x: f64, res_y: f64 },

    #[error("invalid raster dimension ({width:.1} x {height:.1})")]
    InvalidRasterDimension { width: f64, height: f64 },

    #[error("invalid resolution filter: min {min} must be below max {max}")]
    InvalidResolutionFilter { min: f64, max: f64 },

    // === Read path ===
    #[error("node index {index} outside refinement array of {total} nodes")]
    NodeIndexOutOfRange { index: usize, total: usize },

    #[error("block ({block_x}, {block_y}) outside the raster")]
    BlockOutOfRange { block_x: usize, block_y: usize },

    #[error("no refinement grid for cell ({row}, {col})")]
    NoSupergridAt { row: usize, col: usize },

    #[error("malformed record window: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl BagError {
    /// Create a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a Decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// True for errors raised while validating on-disk metadata at open time.
    pub fn is_open_time(&self) -> bool {
        matches!(
            self,
            BagError::InvalidSupergridResolution { .. }
                | BagError::SupergridIndexOutOfRange { .. }
                | BagError::SupergridBoundsOutOfCell { .. }
                | BagError::CatalogFull { .. }
                | BagError::NoValidSupergrids
        )
    }
}

impl From<std::io::Error> for BagError {
    fn from(err: std::io::Error) -> Self {
        BagError::Storage(err.to_string())
    }
}
