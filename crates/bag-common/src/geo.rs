//! Georeferencing primitives for the two-level grid model.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// North-up affine transform relating pixel coordinates to georeferenced
/// coordinates.
///
/// `origin_x`/`origin_y` locate the outer north-west corner of pixel (0, 0);
/// `pixel_size_x` is positive, `pixel_size_y` negative (rows run north to
/// south).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_size_x: f64,
    pub origin_y: f64,
    pub pixel_size_y: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, pixel_size_x: f64, origin_y: f64, pixel_size_y: f64) -> Self {
        Self {
            origin_x,
            pixel_size_x,
            origin_y,
            pixel_size_y,
        }
    }

    /// Georeferenced coordinate of a (possibly fractional) pixel position.
    pub fn apply(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.origin_x + px * self.pixel_size_x,
            self.origin_y + py * self.pixel_size_y,
        )
    }

    /// Georeferenced coordinate of the center of pixel (x, y).
    pub fn pixel_center(&self, x: usize, y: usize) -> (f64, f64) {
        self.apply(x as f64 + 0.5, y as f64 + 0.5)
    }
}

/// The coarse low-resolution index grid whose cells each may own one
/// supergrid.
///
/// Cell rows are indexed south to north (row 0 is the southernmost row),
/// matching the on-disk descriptor array; this is the opposite of raster row
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowResGrid {
    pub width: usize,
    pub height: usize,
    pub bounds: BoundingBox,
}

impl LowResGrid {
    pub fn new(width: usize, height: usize, bounds: BoundingBox) -> Self {
        Self {
            width,
            height,
            bounds,
        }
    }

    /// Cell size in X, in georeferenced units.
    pub fn cell_size_x(&self) -> f64 {
        self.bounds.width() / self.width as f64
    }

    /// Cell size in Y, in georeferenced units.
    pub fn cell_size_y(&self) -> f64 {
        self.bounds.height() / self.height as f64
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Flat descriptor-array index of cell (row, col).
    pub fn flat_index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// Georeferenced coordinate of the south-west corner of cell (row, col).
    pub fn cell_min(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.bounds.min_x + col as f64 * self.cell_size_x(),
            self.bounds.min_y + row as f64 * self.cell_size_y(),
        )
    }

    /// (row, col) of the cell containing a georeferenced point, unclamped.
    ///
    /// Results may be negative or beyond the grid for points outside the
    /// bounds; callers clamp or reject as appropriate.
    pub fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        let col = ((x - self.bounds.min_x) / self.cell_size_x()).floor() as i64;
        let row = ((y - self.bounds.min_y) / self.cell_size_y()).floor() as i64;
        (row, col)
    }

    /// Range of cell indices (inclusive) intersecting a georeferenced extent,
    /// clamped to the grid. None when the extent misses the grid entirely.
    pub fn cell_range(
        &self,
        extent: &BoundingBox,
        margin_cells: f64,
    ) -> Option<(usize, usize, usize, usize)> {
        let res_x = self.cell_size_x();
        let res_y = self.cell_size_y();
        let margin_x = margin_cells * res_x;
        let margin_y = margin_cells * res_y;
        let min_col = ((extent.min_x - self.bounds.min_x - margin_x) / res_x) as i64;
        let min_row = ((extent.min_y - self.bounds.min_y - margin_y) / res_y) as i64;
        let max_col = ((extent.max_x - self.bounds.min_x + margin_x) / res_x) as i64;
        let max_row = ((extent.max_y - self.bounds.min_y + margin_y) / res_y) as i64;
        if max_col < 0
            || max_row < 0
            || min_col >= self.width as i64
            || min_row >= self.height as i64
        {
            return None;
        }
        let min_col = min_col.max(0) as usize;
        let min_row = min_row.max(0) as usize;
        let max_col = (max_col as usize).min(self.width - 1);
        let max_row = (max_row as usize).min(self.height - 1);
        Some((min_row, min_col, max_row, max_col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_lookup() {
        let grid = LowResGrid::new(4, 2, BoundingBox::new(0.0, 0.0, 40.0, 20.0));
        assert_eq!(grid.cell_size_x(), 10.0);
        assert_eq!(grid.cell_size_y(), 10.0);
        assert_eq!(grid.cell_of(5.0, 5.0), (0, 0));
        assert_eq!(grid.cell_of(35.0, 15.0), (1, 3));
        assert_eq!(grid.cell_of(-1.0, 5.0), (0, -1));
        assert_eq!(grid.cell_min(1, 2), (20.0, 10.0));
    }

    #[test]
    fn test_cell_range_clamps() {
        let grid = LowResGrid::new(4, 2, BoundingBox::new(0.0, 0.0, 40.0, 20.0));
        let range = grid
            .cell_range(&BoundingBox::new(-5.0, -5.0, 15.0, 50.0), 0.0)
            .unwrap();
        assert_eq!(range, (0, 0, 1, 1));

        assert!(grid
            .cell_range(&BoundingBox::new(100.0, 100.0, 110.0, 110.0), 0.0)
            .is_none());
    }
}
