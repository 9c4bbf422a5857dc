//! Power-of-two overview chain over the mosaic / interpolated raster.

use std::sync::Arc;

use bag_common::{GeoTransform, RasterGeometry};

use crate::dataset::VarResDataset;
use crate::interpolate::InterpolationBand;
use crate::mosaic::MosaicBand;

// Smallest overview dimension when the low-res terminal level is not
// eligible.
const MIN_OVERVIEW_SIZE: usize = 256;

/// What an overview level is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewKind {
    /// The base raster decimated by a power-of-two factor.
    Derived { factor: u32 },
    /// The low-resolution grid itself, already materialized by the backing
    /// format at this geometry.
    LowRes,
}

/// One overview level: the base dataset at a coarser output geometry.
///
/// Levels share the parent's catalog and node cache through the dataset
/// `Arc`; only the geometry differs.
#[derive(Debug)]
pub struct OverviewLevel {
    dataset: Arc<VarResDataset>,
    geometry: RasterGeometry,
    kind: OverviewKind,
}

impl OverviewLevel {
    pub fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    pub fn kind(&self) -> OverviewKind {
        self.kind
    }

    /// Mosaic view at this level's geometry.
    pub fn mosaic_band(&self) -> MosaicBand {
        MosaicBand::new(Arc::clone(&self.dataset), self.geometry)
    }

    /// Interpolated surface view at this level's geometry.
    pub fn interpolation_band(&self) -> InterpolationBand {
        InterpolationBand::new(Arc::clone(&self.dataset), self.geometry)
    }
}

/// Derives the overview chain for a dataset.
///
/// Factors run 2, 4, 8, ... while both dimensions stay at or above the
/// minimum overview size. When the base raster is strictly finer than the
/// low-resolution grid in both axes and the dataset carries depth and
/// uncertainty bands, the chain ends with the low-resolution grid itself
/// and the minimum size shrinks to one past its smaller dimension.
#[derive(Debug)]
pub struct OverviewBuilder {
    dataset: Arc<VarResDataset>,
}

impl OverviewBuilder {
    pub fn new(dataset: Arc<VarResDataset>) -> Self {
        Self { dataset }
    }

    pub fn build(&self) -> Vec<OverviewLevel> {
        let geometry = self.dataset.geometry();
        let grid = self.dataset.grid();
        let two_band = !self.dataset.population().is_single_band();
        let low_res_terminal =
            geometry.width > grid.width && geometry.height > grid.height && two_band;
        let min_size = if low_res_terminal {
            1 + grid.width.min(grid.height)
        } else {
            MIN_OVERVIEW_SIZE
        };

        let mut levels = Vec::new();
        let mut factor = 2usize;
        while geometry.width / factor >= min_size && geometry.height / factor >= min_size {
            levels.push(OverviewLevel {
                dataset: Arc::clone(&self.dataset),
                geometry: geometry.scaled_to(geometry.width / factor, geometry.height / factor),
                kind: OverviewKind::Derived {
                    factor: factor as u32,
                },
            });
            factor *= 2;
        }

        if low_res_terminal {
            let transform = GeoTransform::new(
                grid.bounds.min_x,
                grid.cell_size_x(),
                grid.bounds.max_y,
                -grid.cell_size_y(),
            );
            levels.push(OverviewLevel {
                dataset: Arc::clone(&self.dataset),
                geometry: RasterGeometry {
                    width: grid.width,
                    height: grid.height,
                    transform,
                    block_width: geometry.block_width.min(grid.width).max(1),
                    block_height: geometry.block_height.min(grid.height).max(1),
                },
                kind: OverviewKind::LowRes,
            });
        }
        levels
    }
}
