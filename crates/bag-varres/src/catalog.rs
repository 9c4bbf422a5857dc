//! Chunked scan and validation of the per-cell refinement descriptors.

use std::collections::{HashMap, HashSet};

use bag_common::{BagError, BagResult, BoundingBox, LowResGrid};
use bag_store::{RefinementDescriptor, SharedStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CatalogOptions, ResolutionFilter, ResolutionStrategy};

// Far-corner validation allows the last node to overhang its cell by a tenth
// of a node spacing.
const FAR_CORNER_TOLERANCE: f64 = 0.1;

// Descriptor rows per scan request when the store reports no natural
// chunking, bounded by roughly 10M records per request.
const FALLBACK_SCAN_RECORDS: usize = 10 * 1024 * 1024;

/// Listing entry for one populated cell, for external subdataset discovery.
///
/// `bounds` uses corner convention: the node-center bounds expanded by half a
/// node spacing on every side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupergridInfo {
    pub row: usize,
    pub col: usize,
    pub width: u32,
    pub height: u32,
    pub res_x: f32,
    pub res_y: f32,
    pub bounds: BoundingBox,
}

#[derive(Debug, Default, Clone, Copy)]
struct ResolutionStats {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    sum_x: f64,
    sum_y: f64,
    count: usize,
}

impl ResolutionStats {
    fn record(&mut self, res_x: f64, res_y: f64) {
        if self.count == 0 {
            self.min_x = res_x;
            self.min_y = res_y;
            self.max_x = res_x;
            self.max_y = res_y;
        } else {
            self.min_x = self.min_x.min(res_x);
            self.min_y = self.min_y.min(res_y);
            self.max_x = self.max_x.max(res_x);
            self.max_y = self.max_y.max(res_y);
        }
        self.sum_x += res_x;
        self.sum_y += res_y;
        self.count += 1;
    }
}

/// The sparse map of populated, validated refinement-grid descriptors.
///
/// Built once at dataset open by scanning the descriptor array in chunks,
/// then read-only for the dataset's lifetime. Cells excluded by the window,
/// explicit-cell, or resolution-filter restrictions are never inserted, so
/// every consumer sees the same restricted set.
#[derive(Debug)]
pub struct RefinementCatalog {
    grid: LowResGrid,
    cells: HashMap<usize, RefinementDescriptor>,
    infos: Vec<SupergridInfo>,
    stats: ResolutionStats,
    filter: ResolutionFilter,
    restricted: bool,
}

impl RefinementCatalog {
    /// Scan the descriptor array and build the catalog.
    ///
    /// Fails on the first malformed descriptor among the selected cells, or
    /// when the kept-cell count would exceed `options.max_cells`.
    pub fn scan(
        grid: LowResGrid,
        store: &SharedStore,
        options: &CatalogOptions,
    ) -> BagResult<Self> {
        options.resolution_filter.validate()?;
        let mut catalog = Self {
            grid,
            cells: HashMap::new(),
            infos: Vec::new(),
            stats: ResolutionStats::default(),
            filter: options.resolution_filter,
            restricted: !options.is_unrestricted(),
        };
        if grid.is_empty() {
            return Ok(catalog);
        }

        let Some((min_row, min_col, max_row, max_col)) = scan_range(&grid, options) else {
            return Ok(catalog);
        };
        let explicit: Option<HashSet<(usize, usize)>> = options
            .cells
            .as_ref()
            .map(|cells| cells.iter().copied().collect());

        let (mut chunk_rows, mut chunk_cols) = store.descriptor_chunk();
        if chunk_rows == 0 || chunk_cols == 0 {
            chunk_cols = grid.width;
            chunk_rows = (FALLBACK_SCAN_RECORDS / grid.width).clamp(1, grid.height);
        }
        chunk_rows = chunk_rows.min(grid.height);
        chunk_cols = chunk_cols.min(grid.width);

        // Visit only the chunk-aligned blocks overlapping the selected range.
        let mut row = (min_row / chunk_rows) * chunk_rows;
        while row <= max_row {
            let rows = chunk_rows.min(grid.height - row);
            let mut col = (min_col / chunk_cols) * chunk_cols;
            while col <= max_col {
                let cols = chunk_cols.min(grid.width - col);
                let block = store.descriptor_window(row, col, rows, cols)?;
                debug!(row, col, rows, cols, "scanned descriptor chunk");
                for r in 0..rows {
                    for c in 0..cols {
                        let cell_row = row + r;
                        let cell_col = col + c;
                        if cell_row < min_row
                            || cell_row > max_row
                            || cell_col < min_col
                            || cell_col > max_col
                        {
                            continue;
                        }
                        if let Some(set) = &explicit {
                            if !set.contains(&(cell_row, cell_col)) {
                                continue;
                            }
                        }
                        let descriptor = block[r * cols + c];
                        if !descriptor.is_populated() {
                            continue;
                        }
                        catalog.validate(cell_row, cell_col, &descriptor, store.node_count())?;
                        if !options.resolution_filter.passes(descriptor.max_resolution()) {
                            continue;
                        }
                        if catalog.cells.len() >= options.max_cells {
                            return Err(BagError::CatalogFull {
                                limit: options.max_cells,
                            });
                        }
                        catalog.insert(cell_row, cell_col, descriptor);
                    }
                }
                col += cols;
            }
            row += rows;
        }
        debug!(cells = catalog.cells.len(), "catalog scan complete");
        Ok(catalog)
    }

    fn validate(
        &self,
        row: usize,
        col: usize,
        descriptor: &RefinementDescriptor,
        total_nodes: usize,
    ) -> BagResult<()> {
        if !(descriptor.res_x > 0.0 && descriptor.res_y > 0.0) {
            return Err(BagError::InvalidSupergridResolution { row, col });
        }
        if descriptor.index as u64 + descriptor.node_count() > total_nodes as u64 {
            return Err(BagError::SupergridIndexOutOfRange { row, col });
        }
        let res_x = descriptor.res_x as f64;
        let res_y = descriptor.res_y as f64;
        let sw_x = descriptor.sw_x as f64;
        let sw_y = descriptor.sw_y as f64;
        let span_x = (descriptor.width as f64 - 1.0 - FAR_CORNER_TOLERANCE) * res_x;
        let span_y = (descriptor.height as f64 - 1.0 - FAR_CORNER_TOLERANCE) * res_y;
        if sw_x < 0.0
            || sw_y < 0.0
            || sw_x + span_x > self.grid.cell_size_x()
            || sw_y + span_y > self.grid.cell_size_y()
        {
            return Err(BagError::SupergridBoundsOutOfCell {
                row,
                col,
                sw_x,
                sw_y,
                far_x: sw_x + (descriptor.width as f64 - 1.0) * res_x,
                far_y: sw_y + (descriptor.height as f64 - 1.0) * res_y,
            });
        }
        Ok(())
    }

    fn insert(&mut self, row: usize, col: usize, descriptor: RefinementDescriptor) {
        let res_x = descriptor.res_x as f64;
        let res_y = descriptor.res_y as f64;
        let (cell_min_x, cell_min_y) = self.grid.cell_min(row, col);
        let min_x = cell_min_x + descriptor.sw_x as f64 - res_x / 2.0;
        let min_y = cell_min_y + descriptor.sw_y as f64 - res_y / 2.0;
        self.infos.push(SupergridInfo {
            row,
            col,
            width: descriptor.width,
            height: descriptor.height,
            res_x: descriptor.res_x,
            res_y: descriptor.res_y,
            bounds: BoundingBox::new(
                min_x,
                min_y,
                min_x + descriptor.width as f64 * res_x,
                min_y + descriptor.height as f64 * res_y,
            ),
        });
        self.stats.record(res_x, res_y);
        self.cells
            .insert(self.grid.flat_index(row, col), descriptor);
    }

    /// Descriptor of cell (row, col), if populated and kept.
    pub fn get(&self, row: usize, col: usize) -> Option<&RefinementDescriptor> {
        if row >= self.grid.height || col >= self.grid.width {
            return None;
        }
        self.cells.get(&self.grid.flat_index(row, col))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn grid(&self) -> &LowResGrid {
        &self.grid
    }

    pub fn filter(&self) -> ResolutionFilter {
        self.filter
    }

    /// Whether a window, explicit-cell list, or resolution filter excluded
    /// any part of the grid.
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// Listing of kept cells, in scan (row-major, south-first) order.
    pub fn supergrids(&self) -> &[SupergridInfo] {
        &self.infos
    }

    /// Output cell size derived from the kept cells' resolutions.
    pub fn resolution_for(&self, strategy: ResolutionStrategy) -> BagResult<(f64, f64)> {
        if self.stats.count == 0 {
            return Err(BagError::NoValidSupergrids);
        }
        Ok(match strategy {
            ResolutionStrategy::Min => (self.stats.min_x, self.stats.min_y),
            ResolutionStrategy::Max => (self.stats.max_x, self.stats.max_y),
            ResolutionStrategy::Mean => (
                self.stats.sum_x / self.stats.count as f64,
                self.stats.sum_y / self.stats.count as f64,
            ),
        })
    }

    /// Mean node spacing over the kept cells.
    pub fn mean_resolution(&self) -> BagResult<(f64, f64)> {
        self.resolution_for(ResolutionStrategy::Mean)
    }
}

fn scan_range(
    grid: &LowResGrid,
    options: &CatalogOptions,
) -> Option<(usize, usize, usize, usize)> {
    let (mut min_row, mut min_col, mut max_row, mut max_col) =
        (0, 0, grid.height - 1, grid.width - 1);
    if let Some(window) = &options.window {
        let (r0, c0, r1, c1) = grid.cell_range(window, 0.0)?;
        min_row = min_row.max(r0);
        min_col = min_col.max(c0);
        max_row = max_row.min(r1);
        max_col = max_col.min(c1);
    }
    if let Some(cells) = &options.cells {
        let rows: Vec<usize> = cells.iter().map(|c| c.0).collect();
        let cols: Vec<usize> = cells.iter().map(|c| c.1).collect();
        min_row = min_row.max(*rows.iter().min()?);
        min_col = min_col.max(*cols.iter().min()?);
        max_row = max_row.min(*rows.iter().max()?);
        max_col = max_col.min(*cols.iter().max()?);
    }
    if min_row > max_row || min_col > max_col {
        return None;
    }
    Some((min_row, min_col, max_row, max_col))
}
