//! Output raster geometry and block layout.

use crate::{BagError, BagResult, BoundingBox, GeoTransform};
use serde::{Deserialize, Serialize};

/// Geometry of a fixed-resolution output raster, tiled into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterGeometry {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub block_width: usize,
    pub block_height: usize,
}

/// One block of a raster, with the valid (non-padding) region clamped to the
/// raster edge. Output buffers always span the full block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    pub block_x: usize,
    pub block_y: usize,
    /// Pixel offset of the block's first column.
    pub x0: usize,
    /// Pixel offset of the block's first row.
    pub y0: usize,
    /// Number of valid columns in this block.
    pub valid_width: usize,
    /// Number of valid rows in this block.
    pub valid_height: usize,
}

impl RasterGeometry {
    /// Derive an output raster from a georeferenced extent and cell size.
    ///
    /// The north edge is placed so the southern edge lands exactly on
    /// `bounds.min_y`.
    pub fn from_bounds(
        bounds: BoundingBox,
        res_x: f64,
        res_y: f64,
        block_size: usize,
    ) -> BagResult<Self> {
        if res_x <= 0.0 || res_y <= 0.0 {
            return Err(BagError::InvalidResolution { res_x, res_y });
        }
        let fwidth = bounds.width() / res_x;
        let fheight = bounds.height() / res_y;
        if fwidth <= 1.0 || fheight <= 1.0 || fwidth > i32::MAX as f64 || fheight > i32::MAX as f64
        {
            return Err(BagError::InvalidRasterDimension {
                width: fwidth,
                height: fheight,
            });
        }
        let width = (fwidth + 0.5) as usize;
        let height = (fheight + 0.5) as usize;
        let transform = GeoTransform::new(
            bounds.min_x,
            res_x,
            bounds.min_y + height as f64 * res_y,
            -res_y,
        );
        Ok(Self {
            width,
            height,
            transform,
            block_width: block_size.min(width).max(1),
            block_height: block_size.min(height).max(1),
        })
    }

    /// Number of block columns.
    pub fn blocks_x(&self) -> usize {
        self.width.div_ceil(self.block_width)
    }

    /// Number of block rows.
    pub fn blocks_y(&self) -> usize {
        self.height.div_ceil(self.block_height)
    }

    /// Pixel count of one block buffer.
    pub fn block_len(&self) -> usize {
        self.block_width * self.block_height
    }

    /// Window of block (block_x, block_y), or None when outside the raster.
    pub fn block_window(&self, block_x: usize, block_y: usize) -> Option<BlockWindow> {
        if block_x >= self.blocks_x() || block_y >= self.blocks_y() {
            return None;
        }
        let x0 = block_x * self.block_width;
        let y0 = block_y * self.block_height;
        Some(BlockWindow {
            block_x,
            block_y,
            x0,
            y0,
            valid_width: self.block_width.min(self.width - x0),
            valid_height: self.block_height.min(self.height - y0),
        })
    }

    /// Georeferenced extent of a block's valid region.
    pub fn block_extent(&self, window: &BlockWindow) -> BoundingBox {
        let t = &self.transform;
        let min_x = t.origin_x + window.x0 as f64 * t.pixel_size_x;
        let max_x = min_x + window.valid_width as f64 * t.pixel_size_x;
        let max_y = t.origin_y + window.y0 as f64 * t.pixel_size_y;
        let min_y = max_y + window.valid_height as f64 * t.pixel_size_y;
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    /// Full georeferenced extent of the raster.
    pub fn extent(&self) -> BoundingBox {
        let t = &self.transform;
        BoundingBox::new(
            t.origin_x,
            t.origin_y + self.height as f64 * t.pixel_size_y,
            t.origin_x + self.width as f64 * t.pixel_size_x,
            t.origin_y,
        )
    }

    /// Same extent at new pixel dimensions; pixel sizes scale by the exact
    /// old/new dimension ratio.
    pub fn scaled_to(&self, width: usize, height: usize) -> RasterGeometry {
        let t = &self.transform;
        RasterGeometry {
            width,
            height,
            transform: GeoTransform::new(
                t.origin_x,
                t.pixel_size_x * self.width as f64 / width as f64,
                t.origin_y,
                t.pixel_size_y * self.height as f64 / height as f64,
            ),
            block_width: self.block_width.min(width).max(1),
            block_height: self.block_height.min(height).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bounds() {
        let geom =
            RasterGeometry::from_bounds(BoundingBox::new(0.0, 0.0, 100.0, 50.0), 10.0, 10.0, 256)
                .unwrap();
        assert_eq!(geom.width, 10);
        assert_eq!(geom.height, 5);
        assert_eq!(geom.transform.origin_x, 0.0);
        assert_eq!(geom.transform.origin_y, 50.0);
        assert_eq!(geom.transform.pixel_size_y, -10.0);
        assert_eq!(geom.block_width, 10);
        assert_eq!(geom.block_height, 5);
    }

    #[test]
    fn test_from_bounds_rejects_bad_resolution() {
        let bounds = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
        assert!(matches!(
            RasterGeometry::from_bounds(bounds, 0.0, 10.0, 256),
            Err(BagError::InvalidResolution { .. })
        ));
        assert!(matches!(
            RasterGeometry::from_bounds(bounds, 200.0, 200.0, 256),
            Err(BagError::InvalidRasterDimension { .. })
        ));
    }

    #[test]
    fn test_block_windows_clamp_at_edges() {
        let mut geom =
            RasterGeometry::from_bounds(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 1.0, 1.0, 256)
                .unwrap();
        geom.block_width = 64;
        geom.block_height = 64;
        assert_eq!(geom.blocks_x(), 2);
        assert_eq!(geom.blocks_y(), 2);

        let last = geom.block_window(1, 1).unwrap();
        assert_eq!(last.x0, 64);
        assert_eq!(last.valid_width, 36);
        assert_eq!(last.valid_height, 36);
        assert!(geom.block_window(2, 0).is_none());

        let extent = geom.block_extent(&geom.block_window(0, 0).unwrap());
        assert_eq!(extent.min_x, 0.0);
        assert_eq!(extent.max_x, 64.0);
        assert_eq!(extent.max_y, 100.0);
        assert_eq!(extent.min_y, 36.0);
    }

    #[test]
    fn test_scaled_to_preserves_extent() {
        let geom =
            RasterGeometry::from_bounds(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 1.0, 1.0, 256)
                .unwrap();
        let ovr = geom.scaled_to(50, 50);
        assert_eq!(ovr.transform.pixel_size_x, 2.0);
        assert_eq!(ovr.transform.pixel_size_y, -2.0);
        assert_eq!(ovr.extent(), geom.extent());
    }
}
