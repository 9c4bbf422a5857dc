//! Read-only configuration supplied at dataset-open time.

use bag_common::{BagError, BagResult, BoundingBox};
use serde::{Deserialize, Serialize};

/// Depth value marking an absent sample, used when the caller supplies none.
pub const DEFAULT_NODATA: f32 = 1_000_000.0;

/// Default block size of the derived rasters, in pixels per axis.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Default upper bound on catalog entries.
pub const DEFAULT_MAX_CATALOG_CELLS: usize = 50_000_000;

/// Default node-cache budget, in chunks.
pub const DEFAULT_CACHE_CHUNKS: usize = 64;

/// Statistic combining overlapping supergrid nodes into one mosaic pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationStrategy {
    /// Keep the largest depth seen for the pixel.
    #[default]
    Max,
    /// Keep the smallest depth seen for the pixel.
    Min,
    /// Average the depths; carry the largest contributing uncertainty.
    Mean,
    /// Count the nodes mapping to the pixel.
    Count,
    /// Byte coverage mask, 255 where any node maps to the pixel.
    Mask,
}

impl PopulationStrategy {
    /// Count and mask rasters carry one band instead of depth + uncertainty.
    pub fn is_single_band(&self) -> bool {
        matches!(self, PopulationStrategy::Count | PopulationStrategy::Mask)
    }
}

/// How to pick the default output cell size from the catalog's supergrid
/// resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// Finest resolution over all catalog cells.
    #[default]
    Min,
    /// Coarsest resolution over all catalog cells.
    Max,
    /// Mean resolution over all catalog cells.
    Mean,
}

/// Node-spacing band restricting which supergrids contribute.
///
/// A supergrid passes when `min < max(res_x, res_y) <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionFilter {
    pub min: f64,
    pub max: f64,
}

impl Default for ResolutionFilter {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: f64::INFINITY,
        }
    }
}

impl ResolutionFilter {
    pub fn validate(&self) -> BagResult<()> {
        if !(self.min < self.max) {
            return Err(BagError::InvalidResolutionFilter {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn passes(&self, resolution: f32) -> bool {
        let r = resolution as f64;
        r > self.min && r <= self.max
    }

    pub fn is_unbounded(&self) -> bool {
        self.min <= 0.0 && self.max.is_infinite()
    }
}

/// Restrictions applied while building the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    /// Only keep cells intersecting this extent.
    pub window: Option<BoundingBox>,
    /// Only keep these (row, col) cells.
    pub cells: Option<Vec<(usize, usize)>>,
    pub resolution_filter: ResolutionFilter,
    /// Abort the scan once this many cells have been kept.
    pub max_cells: usize,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            window: None,
            cells: None,
            resolution_filter: ResolutionFilter::default(),
            max_cells: DEFAULT_MAX_CATALOG_CELLS,
        }
    }
}

impl CatalogOptions {
    /// Whether the options leave the catalog covering every populated cell.
    pub fn is_unrestricted(&self) -> bool {
        self.window.is_none() && self.cells.is_none() && self.resolution_filter.is_unbounded()
    }
}

/// Everything a [`VarResDataset`](crate::VarResDataset) needs at open time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Output raster extent; the low-resolution grid's bounds when `None`.
    pub bounds: Option<BoundingBox>,
    /// Output cell size (x, y); derived via `resolution_strategy` when
    /// `None`.
    pub resolution: Option<(f64, f64)>,
    pub resolution_strategy: ResolutionStrategy,
    pub population: PopulationStrategy,
    pub catalog: CatalogOptions,
    pub nodata: f32,
    pub block_size: usize,
    /// Node-cache budget, in chunks.
    pub cache_chunks: usize,
    /// Depth (min, max) hint carried by the backing format, if any.
    pub depth_range: Option<(f32, f32)>,
    /// Uncertainty (min, max) hint carried by the backing format, if any.
    pub uncertainty_range: Option<(f32, f32)>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            bounds: None,
            resolution: None,
            resolution_strategy: ResolutionStrategy::default(),
            population: PopulationStrategy::default(),
            catalog: CatalogOptions::default(),
            nodata: DEFAULT_NODATA,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_chunks: DEFAULT_CACHE_CHUNKS,
            depth_range: None,
            uncertainty_range: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&PopulationStrategy::Mean).unwrap(),
            "\"mean\""
        );
        assert_eq!(
            serde_json::to_string(&ResolutionStrategy::Max).unwrap(),
            "\"max\""
        );
        let round: PopulationStrategy = serde_json::from_str("\"mask\"").unwrap();
        assert_eq!(round, PopulationStrategy::Mask);
    }

    #[test]
    fn test_open_options_round_trip_with_defaults() {
        let options: OpenOptions = serde_json::from_str("{\"nodata\": -9999.0}").unwrap();
        assert_eq!(options.nodata, -9999.0);
        assert_eq!(options.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(options.population, PopulationStrategy::Max);

        let json = serde_json::to_string(&options).unwrap();
        let back: OpenOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }

    #[test]
    fn test_resolution_filter_band_is_half_open() {
        let filter = ResolutionFilter { min: 2.0, max: 8.0 };
        assert!(filter.validate().is_ok());
        assert!(!filter.passes(2.0));
        assert!(filter.passes(2.5));
        assert!(filter.passes(8.0));
        assert!(!filter.passes(8.5));
    }

    #[test]
    fn test_resolution_filter_rejects_inverted_band() {
        let filter = ResolutionFilter { min: 8.0, max: 2.0 };
        assert!(matches!(
            filter.validate(),
            Err(BagError::InvalidResolutionFilter { .. })
        ));
    }
}
