//! Raster view over one populated cell's refinement grid.

use std::sync::Arc;

use bag_common::{BagError, BagResult, GeoTransform, RasterGeometry};
use bag_store::{NodePair, RefinementDescriptor};

use crate::dataset::VarResDataset;

/// One supergrid as a north-up raster, one node row per block.
///
/// Node storage is south-up, so raster row `r` reads node row
/// `height - 1 - r`. Rows are fetched straight from the shared store, not
/// through the node cache: a row is read once per request and caching whole
/// chunks would only evict mosaic/interpolation state.
#[derive(Debug)]
pub struct SupergridBand {
    dataset: Arc<VarResDataset>,
    descriptor: RefinementDescriptor,
    geometry: RasterGeometry,
}

impl SupergridBand {
    pub(crate) fn new(dataset: Arc<VarResDataset>, row: usize, col: usize) -> BagResult<Self> {
        let descriptor = *dataset
            .catalog()
            .get(row, col)
            .ok_or(BagError::NoSupergridAt { row, col })?;
        let grid = dataset.grid();
        let res_x = descriptor.res_x as f64;
        let res_y = descriptor.res_y as f64;
        let (cell_min_x, cell_min_y) = grid.cell_min(row, col);
        // Corner convention: node centers inset by half a spacing.
        let min_x = cell_min_x + descriptor.sw_x as f64 - res_x / 2.0;
        let min_y = cell_min_y + descriptor.sw_y as f64 - res_y / 2.0;
        let width = descriptor.width as usize;
        let height = descriptor.height as usize;
        let geometry = RasterGeometry {
            width,
            height,
            transform: GeoTransform::new(min_x, res_x, min_y + height as f64 * res_y, -res_y),
            block_width: width,
            block_height: 1,
        };
        Ok(Self {
            dataset,
            descriptor,
            geometry,
        })
    }

    pub fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    pub fn descriptor(&self) -> &RefinementDescriptor {
        &self.descriptor
    }

    /// Read one raster row of node pairs, west to east.
    pub fn read_row(&self, row: usize) -> BagResult<Vec<NodePair>> {
        if row >= self.geometry.height {
            return Err(BagError::BlockOutOfRange {
                block_x: 0,
                block_y: row,
            });
        }
        let node_row = self.geometry.height - 1 - row;
        let start = self.descriptor.index as usize + node_row * self.geometry.width;
        self.dataset
            .shared_store()
            .node_run(start, self.geometry.width)
    }
}
