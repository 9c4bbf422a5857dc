//! Shared ownership root for the catalog, cache, and derived views.

use std::sync::Arc;

use bag_common::{BagError, BagResult, LowResGrid, RasterGeometry};
use bag_store::{NodePair, RefinementStore, SharedStore, ValueCache, ValueCacheStats};
use tracing::debug;

use crate::catalog::{RefinementCatalog, SupergridInfo};
use crate::config::{OpenOptions, PopulationStrategy};
use crate::interpolate::InterpolationBand;
use crate::mosaic::MosaicBand;
use crate::overview::{OverviewBuilder, OverviewLevel};
use crate::supergrid::SupergridBand;

/// An opened variable-resolution dataset.
///
/// Owns the validated catalog, the shared backing-store handle, and the node
/// cache. Bands and overview levels hold an `Arc` to this and never copy
/// catalog or cache.
#[derive(Debug)]
pub struct VarResDataset {
    grid: LowResGrid,
    catalog: RefinementCatalog,
    store: Arc<SharedStore>,
    cache: ValueCache,
    geometry: RasterGeometry,
    nodata: f32,
    population: PopulationStrategy,
    depth_range: Option<(f32, f32)>,
    uncertainty_range: Option<(f32, f32)>,
}

impl VarResDataset {
    /// Scan the catalog, derive the output geometry, and wire up the cache.
    ///
    /// Fails on malformed descriptors, an over-full catalog, an empty
    /// catalog, or a degenerate output geometry.
    pub fn open(
        grid: LowResGrid,
        store: Box<dyn RefinementStore>,
        options: OpenOptions,
    ) -> BagResult<Arc<Self>> {
        let store = Arc::new(SharedStore::new(store));
        let catalog = RefinementCatalog::scan(grid, &store, &options.catalog)?;
        if catalog.is_empty() {
            return Err(BagError::NoValidSupergrids);
        }
        let (res_x, res_y) = match options.resolution {
            Some(resolution) => resolution,
            None => catalog.resolution_for(options.resolution_strategy)?,
        };
        let bounds = options.bounds.unwrap_or(grid.bounds);
        let geometry = RasterGeometry::from_bounds(bounds, res_x, res_y, options.block_size)?;
        let cache = ValueCache::new(Arc::clone(&store), options.cache_chunks);
        debug!(
            width = geometry.width,
            height = geometry.height,
            cells = catalog.len(),
            "opened variable-resolution dataset"
        );
        Ok(Arc::new(Self {
            grid,
            catalog,
            store,
            cache,
            geometry,
            nodata: options.nodata,
            population: options.population,
            depth_range: options.depth_range,
            uncertainty_range: options.uncertainty_range,
        }))
    }

    pub fn grid(&self) -> &LowResGrid {
        &self.grid
    }

    pub fn catalog(&self) -> &RefinementCatalog {
        &self.catalog
    }

    /// Geometry of the full-resolution mosaic / interpolated raster.
    pub fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    pub fn population(&self) -> PopulationStrategy {
        self.population
    }

    /// Whether any populated cell survived the catalog restrictions.
    pub fn has_supergrids(&self) -> bool {
        !self.catalog.is_empty()
    }

    /// Listing of kept supergrids for external discovery.
    pub fn supergrids(&self) -> &[SupergridInfo] {
        self.catalog.supergrids()
    }

    /// Depth (min, max) hint, only when the catalog covers the full extent.
    pub fn depth_range(&self) -> Option<(f32, f32)> {
        if self.catalog.is_restricted() {
            return None;
        }
        self.depth_range
    }

    /// Uncertainty (min, max) hint, only when the catalog covers the full
    /// extent.
    pub fn uncertainty_range(&self) -> Option<(f32, f32)> {
        if self.catalog.is_restricted() {
            return None;
        }
        self.uncertainty_range
    }

    pub fn cache_stats(&self) -> ValueCacheStats {
        self.cache.stats()
    }

    /// Mosaic view at the dataset's own geometry, using the configured
    /// population strategy.
    pub fn mosaic_band(self: &Arc<Self>) -> MosaicBand {
        MosaicBand::new(Arc::clone(self), self.geometry)
    }

    /// Interpolated surface view at the dataset's own geometry.
    pub fn interpolation_band(self: &Arc<Self>) -> InterpolationBand {
        InterpolationBand::new(Arc::clone(self), self.geometry)
    }

    /// Raster view over one populated cell's supergrid.
    pub fn supergrid_band(self: &Arc<Self>, row: usize, col: usize) -> BagResult<SupergridBand> {
        SupergridBand::new(Arc::clone(self), row, col)
    }

    /// Power-of-two overview chain sharing this dataset's catalog and cache.
    pub fn overviews(self: &Arc<Self>) -> Vec<OverviewLevel> {
        OverviewBuilder::new(Arc::clone(self)).build()
    }

    pub(crate) fn node(&self, index: usize) -> BagResult<NodePair> {
        self.cache.get(index)
    }

    pub(crate) fn shared_store(&self) -> &SharedStore {
        &self.store
    }
}
