//! Continuously interpolated surface over the refinement grids.
//!
//! Each output pixel is estimated from the supergrid owning its center:
//! bilinear interpolation when the surrounding 2x2 node neighborhood is
//! fully valid and interior to one supergrid, barycentric interpolation of
//! the 3 valid corners when exactly one is missing, and near edges and
//! corners a probe into the adjacent supergrids followed by nearest-3
//! barycentric interpolation with an inverse-distance-weighting fallback.
//! Every rung is a pure function returning `Option`; the first success wins.

use std::sync::Arc;

use bag_common::{BagError, BagResult, RasterGeometry};

use crate::dataset::VarResDataset;

// Triangles with a smaller barycentric denominator are degenerate.
const DEGENERATE_DENOMINATOR: f64 = 1e-5;

/// One interpolated block: full-block depth and uncertainty buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceBlock {
    pub depth: Vec<f32>,
    pub uncertainty: Vec<f32>,
}

/// A candidate source node gathered near an edge or corner.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x: f64,
    y: f64,
    depth: f32,
    uncertainty: f32,
}

/// Interpolated surface view of the dataset.
#[derive(Debug)]
pub struct InterpolationBand {
    dataset: Arc<VarResDataset>,
    geometry: RasterGeometry,
}

impl InterpolationBand {
    pub(crate) fn new(dataset: Arc<VarResDataset>, geometry: RasterGeometry) -> Self {
        Self { dataset, geometry }
    }

    pub fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    /// Interpolate one block.
    ///
    /// The estimate at a pixel depends only on geometry, so repeated reads
    /// are byte-identical.
    pub fn read_block(&self, block_x: usize, block_y: usize) -> BagResult<SurfaceBlock> {
        let window = self
            .geometry
            .block_window(block_x, block_y)
            .ok_or(BagError::BlockOutOfRange { block_x, block_y })?;
        let len = self.geometry.block_len();
        let nodata = self.dataset.nodata();
        let mut block = SurfaceBlock {
            depth: vec![nodata; len],
            uncertainty: vec![nodata; len],
        };

        let extent = self.geometry.block_extent(&window);
        let px = self.geometry.transform.pixel_size_x;
        let py = self.geometry.transform.pixel_size_y;
        let grid = self.dataset.grid();
        let catalog = self.dataset.catalog();

        // One low-res cell of margin so edge probes stay in range when the
        // block boundary aligns with a cell boundary.
        let Some((min_row, min_col, max_row, max_col)) = grid.cell_range(&extent, 1.0) else {
            return Ok(block);
        };
        let max_dist_sq = sq(0.5 * grid.cell_size_x().max(grid.cell_size_y()));
        // Keeps IDW weights finite when a source node coincides with the
        // target point.
        let eps = sq(px.min(-py) / 10.0);

        let mut candidates: Vec<Candidate> = Vec::new();
        for y in 0..window.valid_height {
            let target_y = extent.max_y + (y as f64 + 0.5) * py;
            for x in 0..window.valid_width {
                let target_x = extent.min_x + (x as f64 + 0.5) * px;
                let (cell_row, cell_col) = grid.cell_of(target_x, target_y);
                if cell_row < min_row as i64
                    || cell_row > max_row as i64
                    || cell_col < min_col as i64
                    || cell_col > max_col as i64
                {
                    continue;
                }
                let (cell_row, cell_col) = (cell_row as usize, cell_col as usize);
                let Some(descriptor) = catalog.get(cell_row, cell_col) else {
                    continue;
                };

                let res_x = descriptor.res_x as f64;
                let res_y = descriptor.res_y as f64;
                let (cell_min_x, cell_min_y) = grid.cell_min(cell_row, cell_col);
                let origin_x = cell_min_x + descriptor.sw_x as f64;
                let origin_y = cell_min_y + descriptor.sw_y as f64;
                let node_x = ((target_x - origin_x) / res_x).floor() as i64;
                let node_y = ((target_y - origin_y) / res_y).floor() as i64;

                let offset = y * self.geometry.block_width + x;
                if node_x >= 0
                    && node_x < descriptor.width as i64 - 1
                    && node_y >= 0
                    && node_y < descriptor.height as i64 - 1
                {
                    // Interior to a single supergrid.
                    let alpha_x = (target_x - origin_x) / res_x - node_x as f64;
                    let alpha_y = (target_y - origin_y) / res_y - node_y as f64;
                    let base = descriptor.index as usize
                        + node_y as usize * descriptor.width as usize
                        + node_x as usize;

                    let mut depths = [[0f32; 2]; 2];
                    let mut uncertainties = [[0f32; 2]; 2];
                    let mut invalid = 0usize;
                    for j in 0..2 {
                        for i in 0..2 {
                            let pair =
                                self.dataset.node(base + j * descriptor.width as usize + i)?;
                            depths[j][i] = pair.depth;
                            uncertainties[j][i] = pair.uncertainty;
                            if pair.is_nodata(nodata) {
                                invalid += 1;
                            }
                        }
                    }

                    if invalid == 0 {
                        block.depth[offset] = bilinear(alpha_x, alpha_y, &depths);
                        block.uncertainty[offset] = bilinear(alpha_x, alpha_y, &uncertainties);
                    } else if invalid == 1 {
                        let mut xs = [0f64; 3];
                        let mut ys = [0f64; 3];
                        let mut ds = [0f32; 3];
                        let mut us = [0f32; 3];
                        let mut idx = 0;
                        for j in 0..2 {
                            for i in 0..2 {
                                if depths[j][i] != nodata {
                                    xs[idx] = i as f64;
                                    ys[idx] = j as f64;
                                    ds[idx] = depths[j][i];
                                    us[idx] = uncertainties[j][i];
                                    idx += 1;
                                }
                            }
                        }
                        if let Some(weights) = barycentric_weights(alpha_x, alpha_y, &xs, &ys) {
                            block.depth[offset] = weighted(&weights, &ds);
                            block.uncertainty[offset] = weighted(&weights, &us);
                        }
                    }
                    // 2+ invalid corners: the pixel stays at nodata.
                } else {
                    // Edge or corner of the owning supergrid.
                    candidates.clear();
                    self.gather_closest(&mut candidates, target_x, target_y, cell_row, cell_col)?;

                    let at_left = node_x < 0 && cell_col > 0;
                    let at_right =
                        node_x >= descriptor.width as i64 - 1 && cell_col + 1 < grid.width;
                    let at_bottom = node_y < 0 && cell_row > 0;
                    let at_top =
                        node_y >= descriptor.height as i64 - 1 && cell_row + 1 < grid.height;
                    let x_shift: i64 = if at_left {
                        -1
                    } else if at_right {
                        1
                    } else {
                        0
                    };
                    let y_shift: i64 = if at_bottom {
                        -1
                    } else if at_top {
                        1
                    } else {
                        0
                    };
                    if x_shift != 0 {
                        let col = (cell_col as i64 + x_shift) as usize;
                        self.gather_closest(&mut candidates, target_x, target_y, cell_row, col)?;
                        if y_shift != 0 {
                            let row = (cell_row as i64 + y_shift) as usize;
                            self.gather_closest(&mut candidates, target_x, target_y, row, col)?;
                        }
                    }
                    if y_shift != 0 {
                        let row = (cell_row as i64 + y_shift) as usize;
                        self.gather_closest(
                            &mut candidates,
                            target_x,
                            target_y,
                            row,
                            cell_col,
                        )?;
                    }

                    candidates
                        .retain(|c| sq(c.x - target_x) + sq(c.y - target_y) <= max_dist_sq);

                    if let Some((depth, uncertainty)) =
                        estimate_from_candidates(&mut candidates, target_x, target_y, nodata, eps)
                    {
                        block.depth[offset] = depth;
                        block.uncertainty[offset] = uncertainty;
                    }
                }
            }
        }
        Ok(block)
    }

    /// Push the node nearest to the target in cell (row, col)'s supergrid,
    /// clamped to its bounds, plus its in-range neighbors toward the target
    /// in x and y.
    fn gather_closest(
        &self,
        candidates: &mut Vec<Candidate>,
        target_x: f64,
        target_y: f64,
        row: usize,
        col: usize,
    ) -> BagResult<()> {
        let Some(descriptor) = self.dataset.catalog().get(row, col) else {
            return Ok(());
        };
        let res_x = descriptor.res_x as f64;
        let res_y = descriptor.res_y as f64;
        let (cell_min_x, cell_min_y) = self.dataset.grid().cell_min(row, col);
        let origin_x = cell_min_x + descriptor.sw_x as f64;
        let origin_y = cell_min_y + descriptor.sw_y as f64;
        let node_x = ((target_x - origin_x) / res_x).floor() as i64;
        let node_y = ((target_y - origin_y) / res_y).floor() as i64;
        let clamped_x = node_x.clamp(0, descriptor.width as i64 - 1);
        let clamped_y = node_y.clamp(0, descriptor.height as i64 - 1);

        let mut push = |ix: i64, iy: i64| -> BagResult<()> {
            let index = descriptor.index as usize
                + iy as usize * descriptor.width as usize
                + ix as usize;
            let pair = self.dataset.node(index)?;
            candidates.push(Candidate {
                x: origin_x + ix as f64 * res_x,
                y: origin_y + iy as f64 * res_y,
                depth: pair.depth,
                uncertainty: pair.uncertainty,
            });
            Ok(())
        };

        push(clamped_x, clamped_y)?;
        if node_y >= 0 && node_y < descriptor.height as i64 - 1 {
            push(clamped_x, node_y + 1)?;
        }
        if node_x >= 0 && node_x < descriptor.width as i64 - 1 {
            push(node_x + 1, clamped_y)?;
        }
        Ok(())
    }
}

fn sq(v: f64) -> f64 {
    v * v
}

/// Bilinear estimate from a fully valid 2x2 neighborhood.
fn bilinear(alpha_x: f64, alpha_y: f64, v: &[[f32; 2]; 2]) -> f32 {
    ((1.0 - alpha_y) * ((1.0 - alpha_x) * v[0][0] as f64 + alpha_x * v[0][1] as f64)
        + alpha_y * ((1.0 - alpha_x) * v[1][0] as f64 + alpha_x * v[1][1] as f64)) as f32
}

/// Barycentric weights of (x, y) in the triangle (xs, ys).
///
/// None when the triangle is degenerate or the point lies outside it; both
/// select the next rung of the fallback ladder.
fn barycentric_weights(x: f64, y: f64, xs: &[f64; 3], ys: &[f64; 3]) -> Option<[f64; 3]> {
    let denom = (ys[1] - ys[2]) * (xs[0] - xs[2]) + (xs[2] - xs[1]) * (ys[0] - ys[2]);
    if denom.abs() < DEGENERATE_DENOMINATOR {
        return None;
    }
    let dx = x - xs[2];
    let dy = y - ys[2];
    let w0 = ((ys[1] - ys[2]) * dx + (xs[2] - xs[1]) * dy) / denom;
    let w1 = ((ys[2] - ys[0]) * dx + (xs[0] - xs[2]) * dy) / denom;
    let w2 = 1.0 - w0 - w1;
    let inside = (0.0..=1.0).contains(&w0) && (0.0..=1.0).contains(&w1) && (0.0..=1.0).contains(&w2);
    inside.then_some([w0, w1, w2])
}

fn weighted(weights: &[f64; 3], values: &[f32; 3]) -> f32 {
    (weights[0] * values[0] as f64 + weights[1] * values[1] as f64 + weights[2] * values[2] as f64)
        as f32
}

/// Edge-path estimate: nearest-3 barycentric, then inverse-distance
/// weighting over all valid candidates.
///
/// The candidate list is sorted by distance in place. The IDW rung only
/// runs when the 3 nearest candidates are valid but the target falls
/// outside (or degenerates) their triangle, and needs at least 3 valid
/// contributors.
fn estimate_from_candidates(
    candidates: &mut [Candidate],
    x: f64,
    y: f64,
    nodata: f32,
    eps: f64,
) -> Option<(f32, f32)> {
    if candidates.len() < 3 {
        return None;
    }
    candidates.sort_by(|a, b| {
        let da = sq(a.x - x) + sq(a.y - y);
        let db = sq(b.x - x) + sq(b.y - y);
        da.total_cmp(&db)
    });

    let nearest = &candidates[..3];
    if nearest.iter().any(|c| c.depth == nodata) {
        return None;
    }
    let xs = [nearest[0].x, nearest[1].x, nearest[2].x];
    let ys = [nearest[0].y, nearest[1].y, nearest[2].y];
    if let Some(weights) = barycentric_weights(x, y, &xs, &ys) {
        let ds = [nearest[0].depth, nearest[1].depth, nearest[2].depth];
        let us = [
            nearest[0].uncertainty,
            nearest[1].uncertainty,
            nearest[2].uncertainty,
        ];
        return Some((weighted(&weights, &ds), weighted(&weights, &us)));
    }

    inverse_distance(candidates, x, y, nodata, eps)
}

fn inverse_distance(
    candidates: &[Candidate],
    x: f64,
    y: f64,
    nodata: f32,
    eps: f64,
) -> Option<(f32, f32)> {
    let mut valid = 0usize;
    let mut total_depth = 0f64;
    let mut total_uncertainty = 0f64;
    let mut total_weight = 0f64;
    for c in candidates {
        if c.depth == nodata {
            continue;
        }
        valid += 1;
        let weight = 1.0 / (sq(c.x - x) + sq(c.y - y) + eps);
        total_depth += weight * c.depth as f64;
        total_uncertainty += weight * c.uncertainty as f64;
        total_weight += weight;
    }
    if valid < 3 {
        return None;
    }
    Some((
        (total_depth / total_weight) as f32,
        (total_uncertainty / total_weight) as f32,
    ))
}
