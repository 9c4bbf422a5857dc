use std::sync::atomic::Ordering;
use std::sync::Arc;

use bag_common::{BagError, BoundingBox};
use bag_varres::{MosaicBlock, OpenOptions, PopulationStrategy, VarResDataset};
use test_utils::{assert_approx_eq, FixtureDataset};

/// 2x2 grid of 8-unit cells; only the south-west cell is populated, with a
/// 2x2 supergrid whose nodes all snap to output pixel (row 1, col 0) at an
/// 8-unit output resolution.
fn one_cell_fixture() -> FixtureDataset {
    let mut fixture = FixtureDataset::new(2, 2, BoundingBox::new(0.0, 0.0, 16.0, 16.0));
    fixture.add_supergrid_depths(0, 0, 2, 2, (4.0, 4.0), (2.0, 2.0), &[1.0, 2.0, 3.0, 4.0]);
    fixture
}

fn open_with(fixture: FixtureDataset, population: PopulationStrategy) -> Arc<VarResDataset> {
    let (grid, store) = fixture.into_parts();
    let options = OpenOptions {
        resolution: Some((8.0, 8.0)),
        population,
        ..OpenOptions::default()
    };
    VarResDataset::open(grid, Box::new(store), options).unwrap()
}

fn pairs(block: MosaicBlock) -> (Vec<f32>, Vec<f32>) {
    match block {
        MosaicBlock::Pairs { depth, uncertainty } => (depth, uncertainty),
        other => panic!("expected depth/uncertainty block, got {other:?}"),
    }
}

#[test]
fn test_max_keeps_largest_depth() {
    let dataset = open_with(one_cell_fixture(), PopulationStrategy::Max);
    let nodata = dataset.nodata();
    let (depth, uncertainty) = pairs(dataset.mosaic_band().read_block(0, 0).unwrap());

    // Raster row 1, col 0 covers the populated cell.
    assert_eq!(depth[2], 4.0);
    assert_approx_eq!(uncertainty[2], 0.4, 1e-6);
    assert_eq!(depth[0], nodata);
    assert_eq!(depth[1], nodata);
    assert_eq!(depth[3], nodata);
}

#[test]
fn test_min_keeps_smallest_depth() {
    let dataset = open_with(one_cell_fixture(), PopulationStrategy::Min);
    let (depth, uncertainty) = pairs(dataset.mosaic_band().read_block(0, 0).unwrap());
    assert_eq!(depth[2], 1.0);
    assert_approx_eq!(uncertainty[2], 0.1, 1e-6);
}

#[test]
fn test_mean_averages_depth_and_carries_max_uncertainty() {
    let dataset = open_with(one_cell_fixture(), PopulationStrategy::Mean);
    let (depth, uncertainty) = pairs(dataset.mosaic_band().read_block(0, 0).unwrap());
    assert_eq!(depth[2], 2.5);
    assert_approx_eq!(uncertainty[2], 0.4, 1e-6);
}

#[test]
fn test_count_counts_nodes_per_pixel() {
    let dataset = open_with(one_cell_fixture(), PopulationStrategy::Count);
    let MosaicBlock::Counts(counts) = dataset.mosaic_band().read_block(0, 0).unwrap() else {
        panic!("expected counts block");
    };
    assert_eq!(counts, vec![0, 0, 4, 0]);
}

#[test]
fn test_mask_flags_covered_pixels() {
    let dataset = open_with(one_cell_fixture(), PopulationStrategy::Mask);
    let MosaicBlock::Mask(mask) = dataset.mosaic_band().read_block(0, 0).unwrap() else {
        panic!("expected mask block");
    };
    assert_eq!(mask, vec![0, 0, 255, 0]);
}

#[test]
fn test_repeated_reads_are_byte_identical() {
    let dataset = open_with(one_cell_fixture(), PopulationStrategy::Mean);
    let band = dataset.mosaic_band();
    let first = band.read_block(0, 0).unwrap();
    let second = band.read_block(0, 0).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_nodata_nodes_are_skipped() {
    let mut fixture = FixtureDataset::new(2, 2, BoundingBox::new(0.0, 0.0, 16.0, 16.0));
    let nodata = OpenOptions::default().nodata;
    fixture.add_supergrid_depths(0, 0, 2, 2, (4.0, 4.0), (2.0, 2.0), &[1.0, nodata, 3.0, nodata]);

    let dataset = open_with(fixture, PopulationStrategy::Max);
    let (depth, _) = pairs(dataset.mosaic_band().read_block(0, 0).unwrap());
    assert_eq!(depth[2], 3.0);

    let dataset = open_with(
        {
            let mut fixture = FixtureDataset::new(2, 2, BoundingBox::new(0.0, 0.0, 16.0, 16.0));
            fixture.add_supergrid_depths(0, 0, 2, 2, (4.0, 4.0), (2.0, 2.0), &[nodata; 4]);
            fixture
        },
        PopulationStrategy::Max,
    );
    let (depth, _) = pairs(dataset.mosaic_band().read_block(0, 0).unwrap());
    assert_eq!(depth[2], dataset.nodata());
}

#[test]
fn test_two_supergrids_combine_deterministically() {
    // Both cells land nodes on the same output pixel; row-major cell order
    // fixes the combination order.
    let mut fixture = FixtureDataset::new(2, 2, BoundingBox::new(0.0, 0.0, 16.0, 16.0));
    fixture.add_supergrid_depths(0, 0, 1, 1, (4.0, 4.0), (7.0, 7.0), &[5.0]);
    fixture.add_supergrid_depths(1, 0, 1, 1, (4.0, 4.0), (7.0, 0.5), &[9.0]);

    let (grid, store) = fixture.into_parts();
    let options = OpenOptions {
        resolution: Some((8.0, 8.0)),
        bounds: Some(BoundingBox::new(0.0, 4.0, 16.0, 20.0)),
        population: PopulationStrategy::Max,
        ..OpenOptions::default()
    };
    let dataset = VarResDataset::open(grid, Box::new(store), options).unwrap();
    let (depth, _) = pairs(dataset.mosaic_band().read_block(0, 0).unwrap());
    // Both nodes (y = 7.0 and y = 8.5) fall in the pixel spanning y 4..12.
    assert_eq!(depth[2], 9.0);
}

#[test]
fn test_node_read_failure_aborts_block() {
    let fixture = one_cell_fixture();
    let fail = fixture.fail_node_reads_handle();
    let dataset = open_with(fixture, PopulationStrategy::Max);

    fail.store(true, Ordering::Relaxed);
    assert!(matches!(
        dataset.mosaic_band().read_block(0, 0),
        Err(BagError::Storage(_))
    ));

    // Mask population never touches node values, so it still succeeds.
    let fixture = one_cell_fixture();
    let fail = fixture.fail_node_reads_handle();
    let dataset = open_with(fixture, PopulationStrategy::Mask);
    fail.store(true, Ordering::Relaxed);
    assert!(dataset.mosaic_band().read_block(0, 0).is_ok());
}

#[test]
fn test_block_outside_raster_is_an_error() {
    let dataset = open_with(one_cell_fixture(), PopulationStrategy::Max);
    assert!(matches!(
        dataset.mosaic_band().read_block(5, 0),
        Err(BagError::BlockOutOfRange {
            block_x: 5,
            block_y: 0
        })
    ));
}
