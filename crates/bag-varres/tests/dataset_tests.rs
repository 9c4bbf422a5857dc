use std::sync::Arc;

use bag_common::{BagError, BoundingBox};
use bag_store::NodePair;
use bag_varres::{
    OpenOptions, OverviewKind, PopulationStrategy, ResolutionStrategy, VarResDataset,
};
use test_utils::FixtureDataset;

fn open(fixture: FixtureDataset, options: OpenOptions) -> Arc<VarResDataset> {
    let (grid, store) = fixture.into_parts();
    VarResDataset::open(grid, Box::new(store), options).unwrap()
}

#[test]
fn test_open_fails_without_supergrids() {
    let fixture = FixtureDataset::new(2, 2, BoundingBox::new(0.0, 0.0, 16.0, 16.0));
    let (grid, store) = fixture.into_parts();
    assert!(matches!(
        VarResDataset::open(grid, Box::new(store), OpenOptions::default()),
        Err(BagError::NoValidSupergrids)
    ));
}

#[test]
fn test_default_geometry_uses_finest_resolution() {
    let mut fixture = FixtureDataset::new(2, 1, BoundingBox::new(0.0, 0.0, 16.0, 8.0));
    fixture.add_supergrid_depths(0, 0, 2, 2, (2.0, 2.0), (1.0, 1.0), &[1.0; 4]);
    fixture.add_supergrid_depths(0, 1, 2, 2, (4.0, 4.0), (1.0, 1.0), &[2.0; 4]);

    let dataset = open(fixture, OpenOptions::default());
    let geometry = dataset.geometry();
    assert_eq!((geometry.width, geometry.height), (8, 4));
    assert_eq!(geometry.transform.pixel_size_x, 2.0);
    assert_eq!(geometry.transform.origin_y, 8.0);
}

#[test]
fn test_mean_resolution_strategy() {
    let mut fixture = FixtureDataset::new(2, 1, BoundingBox::new(0.0, 0.0, 16.0, 8.0));
    fixture.add_supergrid_depths(0, 0, 2, 2, (2.0, 2.0), (1.0, 1.0), &[1.0; 4]);
    fixture.add_supergrid_depths(0, 1, 2, 2, (4.0, 4.0), (1.0, 1.0), &[2.0; 4]);

    let dataset = open(
        fixture,
        OpenOptions {
            resolution_strategy: ResolutionStrategy::Mean,
            ..OpenOptions::default()
        },
    );
    // Mean spacing is 3; 16/3 rounds to 5 pixels across.
    assert_eq!(dataset.geometry().width, 5);
}

#[test]
fn test_range_hints_are_dropped_when_restricted() {
    let build = || {
        let mut fixture = FixtureDataset::new(2, 1, BoundingBox::new(0.0, 0.0, 16.0, 8.0));
        fixture.add_supergrid_depths(0, 0, 2, 2, (2.0, 2.0), (1.0, 1.0), &[1.0; 4]);
        fixture
    };

    let mut options = OpenOptions {
        depth_range: Some((-10.0, 50.0)),
        ..OpenOptions::default()
    };
    let dataset = open(build(), options.clone());
    assert_eq!(dataset.depth_range(), Some((-10.0, 50.0)));
    assert_eq!(dataset.uncertainty_range(), None);

    options.catalog.resolution_filter.max = 8.0;
    let dataset = open(build(), options);
    assert_eq!(dataset.depth_range(), None);
}

#[test]
fn test_supergrid_band_reads_rows_north_first() {
    let mut fixture = FixtureDataset::new(1, 1, BoundingBox::new(0.0, 0.0, 8.0, 8.0));
    fixture.add_supergrid_depths(0, 0, 2, 2, (4.0, 4.0), (2.0, 2.0), &[1.0, 2.0, 3.0, 4.0]);

    let dataset = open(
        fixture,
        OpenOptions {
            resolution: Some((4.0, 4.0)),
            ..OpenOptions::default()
        },
    );
    let band = dataset.supergrid_band(0, 0).unwrap();

    let geometry = band.geometry();
    assert_eq!((geometry.width, geometry.height), (2, 2));
    // Corner-convention bounds: node centers at 2 and 6, spacing 4.
    assert_eq!(geometry.transform.origin_x, 0.0);
    assert_eq!(geometry.transform.origin_y, 8.0);
    assert_eq!(geometry.transform.pixel_size_y, -4.0);

    let north = band.read_row(0).unwrap();
    assert_eq!(north, vec![NodePair::new(3.0, 0.3), NodePair::new(4.0, 0.4)]);
    let south = band.read_row(1).unwrap();
    assert_eq!(south[0].depth, 1.0);
    assert!(band.read_row(2).is_err());
}

#[test]
fn test_supergrid_band_requires_populated_cell() {
    let mut fixture = FixtureDataset::new(2, 1, BoundingBox::new(0.0, 0.0, 16.0, 8.0));
    fixture.add_supergrid_depths(0, 0, 2, 2, (4.0, 4.0), (2.0, 2.0), &[1.0; 4]);

    let dataset = open(fixture, OpenOptions::default());
    assert!(matches!(
        dataset.supergrid_band(0, 1),
        Err(BagError::NoSupergridAt { row: 0, col: 1 })
    ));
}

#[test]
fn test_overview_chain_halves_dimensions() {
    let mut fixture = FixtureDataset::new(2, 2, BoundingBox::new(0.0, 0.0, 1024.0, 1024.0));
    fixture.add_supergrid_depths(0, 0, 2, 2, (4.0, 4.0), (2.0, 2.0), &[1.0, 2.0, 3.0, 4.0]);

    let dataset = open(
        fixture,
        OpenOptions {
            resolution: Some((1.0, 1.0)),
            ..OpenOptions::default()
        },
    );
    let levels = dataset.overviews();

    // 1024x1024 raster over a 2x2 low-res grid: factors 2..256, then the
    // low-res terminal level.
    assert_eq!(levels.len(), 9);
    let first = &levels[0];
    assert_eq!(first.kind(), OverviewKind::Derived { factor: 2 });
    assert_eq!(first.geometry().width, 512);
    assert_eq!(first.geometry().transform.pixel_size_x, 2.0);
    assert_eq!(first.geometry().extent(), dataset.geometry().extent());

    let last_derived = &levels[7];
    assert_eq!(last_derived.kind(), OverviewKind::Derived { factor: 256 });
    assert_eq!(last_derived.geometry().width, 4);

    let terminal = &levels[8];
    assert_eq!(terminal.kind(), OverviewKind::LowRes);
    assert_eq!(terminal.geometry().width, 2);
    assert_eq!(terminal.geometry().transform.pixel_size_x, 512.0);
}

#[test]
fn test_single_band_modes_skip_low_res_terminal() {
    let mut fixture = FixtureDataset::new(2, 2, BoundingBox::new(0.0, 0.0, 1024.0, 1024.0));
    fixture.add_supergrid_depths(0, 0, 2, 2, (4.0, 4.0), (2.0, 2.0), &[1.0; 4]);

    let dataset = open(
        fixture,
        OpenOptions {
            resolution: Some((1.0, 1.0)),
            population: PopulationStrategy::Mask,
            ..OpenOptions::default()
        },
    );
    let levels = dataset.overviews();

    // Minimum overview size reverts to 256: only factors 2 and 4 fit.
    assert_eq!(levels.len(), 2);
    assert!(levels
        .iter()
        .all(|level| matches!(level.kind(), OverviewKind::Derived { .. })));
}

#[test]
fn test_overview_band_shares_catalog_and_cache() {
    let mut fixture = FixtureDataset::new(2, 2, BoundingBox::new(0.0, 0.0, 1024.0, 1024.0));
    fixture.add_supergrid_depths(0, 0, 2, 2, (64.0, 64.0), (32.0, 32.0), &[1.0, 2.0, 3.0, 4.0]);
    let stats = fixture.stats();

    let dataset = open(
        fixture,
        OpenOptions {
            resolution: Some((1.0, 1.0)),
            ..OpenOptions::default()
        },
    );
    let levels = dataset.overviews();
    let band = levels[0].mosaic_band();
    // The populated cell sits in the raster's south half: block row 1 at
    // the first level's 256-pixel blocks.
    let block = band.read_block(0, 1).unwrap();
    match block {
        bag_varres::MosaicBlock::Pairs { depth, .. } => {
            assert!(depth.iter().any(|&d| d != dataset.nodata()));
        }
        other => panic!("expected pairs, got {other:?}"),
    }
    // Nodes came through the shared cache: one chunk load covers them all.
    assert_eq!(stats.node_runs(), 1);
}
