//! Fixed-resolution mosaic of supergrid nodes.

use std::sync::Arc;

use bag_common::{BagError, BagResult, RasterGeometry};

use crate::config::PopulationStrategy;
use crate::dataset::VarResDataset;

/// One mosaic block; the variant follows the population strategy.
///
/// Buffers span the full block; pixels outside the valid window and pixels
/// no node mapped to stay at the nodata value (or zero for counts/mask).
#[derive(Debug, Clone, PartialEq)]
pub enum MosaicBlock {
    Pairs {
        depth: Vec<f32>,
        uncertainty: Vec<f32>,
    },
    Counts(Vec<u32>),
    Mask(Vec<u8>),
}

/// Mosaic view: each output pixel combines the supergrid nodes snapping to
/// it under the configured population strategy.
#[derive(Debug)]
pub struct MosaicBand {
    dataset: Arc<VarResDataset>,
    geometry: RasterGeometry,
    population: PopulationStrategy,
}

impl MosaicBand {
    pub(crate) fn new(dataset: Arc<VarResDataset>, geometry: RasterGeometry) -> Self {
        let population = dataset.population();
        Self {
            dataset,
            geometry,
            population,
        }
    }

    pub fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    pub fn population(&self) -> PopulationStrategy {
        self.population
    }

    /// Rasterize one block.
    ///
    /// Low-resolution cells are visited row-major (south first) and nodes
    /// within a cell row-major as well, so overlapping contributions combine
    /// in a fixed order and repeated reads are byte-identical.
    pub fn read_block(&self, block_x: usize, block_y: usize) -> BagResult<MosaicBlock> {
        let window = self
            .geometry
            .block_window(block_x, block_y)
            .ok_or(BagError::BlockOutOfRange { block_x, block_y })?;
        let len = self.geometry.block_len();
        let nodata = self.dataset.nodata();

        let mut depth = Vec::new();
        let mut uncertainty = Vec::new();
        let mut counts = Vec::new();
        let mut mask = Vec::new();
        match self.population {
            PopulationStrategy::Count => counts = vec![0u32; len],
            PopulationStrategy::Mask => mask = vec![0u8; len],
            PopulationStrategy::Mean => {
                depth = vec![nodata; len];
                uncertainty = vec![nodata; len];
                counts = vec![0u32; len];
            }
            PopulationStrategy::Max | PopulationStrategy::Min => {
                depth = vec![nodata; len];
                uncertainty = vec![nodata; len];
            }
        }

        let extent = self.geometry.block_extent(&window);
        let px = self.geometry.transform.pixel_size_x;
        let py = self.geometry.transform.pixel_size_y;
        let grid = self.dataset.grid();
        let catalog = self.dataset.catalog();

        if let Some((min_row, min_col, max_row, max_col)) = grid.cell_range(&extent, 0.0) {
            for row in min_row..=max_row {
                for col in min_col..=max_col {
                    let Some(descriptor) = catalog.get(row, col) else {
                        continue;
                    };
                    let res_x = descriptor.res_x as f64;
                    let res_y = descriptor.res_y as f64;
                    let (cell_min_x, cell_min_y) = grid.cell_min(row, col);
                    // Node-center bounds of the supergrid.
                    let min_x = cell_min_x + descriptor.sw_x as f64;
                    let min_y = cell_min_y + descriptor.sw_y as f64;
                    let max_x = min_x + (descriptor.width - 1) as f64 * res_x;
                    let max_y = min_y + (descriptor.height - 1) as f64 * res_y;

                    let inter_min_x = extent.min_x.max(min_x);
                    let inter_min_y = extent.min_y.max(min_y);
                    let inter_max_x = extent.max_x.min(max_x);
                    let inter_max_y = extent.max_y.min(max_y);
                    if inter_min_x > inter_max_x || inter_min_y > inter_max_y {
                        continue;
                    }

                    let last_x = descriptor.width as i64 - 1;
                    let last_y = descriptor.height as i64 - 1;
                    let min_src_x = (((inter_min_x - min_x) / res_x) as i64).max(0);
                    let min_src_y = (((inter_min_y - min_y) / res_y) as i64).max(0);
                    // ceil absorbs numerical imprecision at the far edge.
                    let max_src_x = ((((inter_max_x - min_x) / res_x).ceil()) as i64).min(last_x);
                    let max_src_y = ((((inter_max_y - min_y) / res_y).ceil()) as i64).min(last_y);

                    for src_y in min_src_y..=max_src_y {
                        let node_y = min_y + src_y as f64 * res_y;
                        let target_y = ((extent.max_y - node_y) / -py).floor() as i64;
                        if target_y < 0 || target_y >= window.valid_height as i64 {
                            continue;
                        }
                        let row_base = target_y as usize * self.geometry.block_width;
                        let index_base =
                            descriptor.index as usize + src_y as usize * descriptor.width as usize;

                        for src_x in min_src_x..=max_src_x {
                            let node_x = min_x + src_x as f64 * res_x;
                            let target_x = ((node_x - extent.min_x) / px).floor() as i64;
                            if target_x < 0 || target_x >= window.valid_width as i64 {
                                continue;
                            }
                            let offset = row_base + target_x as usize;

                            match self.population {
                                PopulationStrategy::Mask => {
                                    mask[offset] = 255;
                                }
                                PopulationStrategy::Count => {
                                    counts[offset] += 1;
                                }
                                _ => {
                                    let pair = self.dataset.node(index_base + src_x as usize)?;
                                    if pair.is_nodata(nodata) {
                                        continue;
                                    }
                                    match self.population {
                                        PopulationStrategy::Mean => {
                                            if counts[offset] == 0 {
                                                depth[offset] = pair.depth;
                                            } else {
                                                depth[offset] += pair.depth;
                                            }
                                            counts[offset] += 1;
                                            if uncertainty[offset] == nodata
                                                || pair.uncertainty > uncertainty[offset]
                                            {
                                                uncertainty[offset] = pair.uncertainty;
                                            }
                                        }
                                        PopulationStrategy::Max => {
                                            if depth[offset] == nodata
                                                || pair.depth > depth[offset]
                                            {
                                                depth[offset] = pair.depth;
                                                uncertainty[offset] = pair.uncertainty;
                                            }
                                        }
                                        PopulationStrategy::Min => {
                                            if depth[offset] == nodata
                                                || pair.depth < depth[offset]
                                            {
                                                depth[offset] = pair.depth;
                                                uncertainty[offset] = pair.uncertainty;
                                            }
                                        }
                                        _ => unreachable!(),
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(match self.population {
            PopulationStrategy::Count => MosaicBlock::Counts(counts),
            PopulationStrategy::Mask => MosaicBlock::Mask(mask),
            PopulationStrategy::Mean => {
                for i in 0..len {
                    if counts[i] > 0 {
                        depth[i] /= counts[i] as f32;
                    }
                }
                MosaicBlock::Pairs { depth, uncertainty }
            }
            _ => MosaicBlock::Pairs { depth, uncertainty },
        })
    }
}
