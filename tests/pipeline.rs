//! End-to-end: synthetic grid -> ESRI ASCII -> reload -> depth map -> regrid.

use curie_depth::domain::{CurieParams, Extent, InterpMethod, Param, SpectrumOptions};
use curie_depth::io::{load_ascii_grid, load_xyz_csv, write_ascii_grid, write_depth_map_csv};
use curie_depth::report::depth_map_stats;
use curie_depth::{
    Crs, CurieGrid, CurieOptimise, bouligand2009, compute_tanaka, convert_extent, grid, maus1995, tanaka1999,
    transform_coordinates, trim,
};

#[test]
fn synthetic_grid_maps_to_finite_depths() {
    let dir = tempfile::tempdir().unwrap();
    let asc = dir.path().join("anomaly.asc");

    let truth = CurieParams::new(3.0, 1.0, 20.0, 5.0);
    let synth = curie_depth::data::synthetic_grid(&truth, 64, 1000.0, 11).unwrap();
    write_ascii_grid(&asc, synth.data(), &synth.extent()).unwrap();

    let grid_in = load_ascii_grid(&asc).unwrap().into_curie_grid().unwrap();
    assert_eq!(grid_in.nx(), 64);
    assert!((grid_in.dx() - 1000.0).abs() < 1e-9);

    let mut optimiser = CurieOptimise::new(grid_in).with_spectrum_options(SpectrumOptions::default());
    optimiser.set_bounds(Param::Beta, 3.0, 3.0).unwrap();

    let centroids = optimiser.grid().create_centroid_list(31_000.0, None, None).unwrap();
    let estimates = optimiser.optimise_routine(31_000.0, &centroids, &truth);
    assert_eq!(estimates.len(), centroids.len());

    let stats = depth_map_stats(&estimates).expect("at least one window fits");
    assert!(stats.depth_min.is_finite() && stats.depth_min > 0.0);

    // The depth map itself can be regridded into a raster.
    let csv = dir.path().join("map.csv");
    write_depth_map_csv(&csv, &estimates).unwrap();
    let xyz = load_xyz_csv(&csv).unwrap();
    assert_eq!(xyz.rows_read, estimates.len());

    let extent = Extent::new(15_000.0, 48_000.0, 15_000.0, 48_000.0).unwrap();
    let raster = grid(&xyz.points, &extent, (12, 12), InterpMethod::Nearest, None).unwrap();
    let (trimmed, _) = trim(&raster, &extent).unwrap();
    assert!(trimmed.iter().any(|v| v.is_finite()));
}

#[test]
fn root_model_functions_agree() {
    // A very thick layer has the semi-infinite Maus shape up to a constant.
    let offset = |k: f64| bouligand2009(k, 3.0, 1.0, 1e4, 5.0) - maus1995(k, 3.0, 1.0, 5.0);
    let (a, b) = (offset(0.2), offset(2.0));
    assert!(a.is_finite());
    assert!((a - b).abs() < 1e-6, "offsets {a} vs {b}");

    let (zb, zb_err) = compute_tanaka(1.0, 0.1, 10.0, 0.5);
    assert_eq!(zb, 19.0);
    assert!((zb_err - 1.1).abs() < 1e-12);
}

#[test]
fn extent_survives_projection_round_trip() {
    let geo = Extent::new(10.0, 12.0, 45.0, 46.0).unwrap();
    let utm = convert_extent(&geo, Crs::Wgs84, Crs::from_epsg(32632).unwrap()).unwrap();
    assert!(utm.width() > 100_000.0);

    let back = convert_extent(&utm, Crs::from_epsg(32632).unwrap(), Crs::Wgs84).unwrap();
    assert!(back.xmin <= geo.xmin + 1e-6 && back.xmax >= geo.xmax - 1e-6);
    assert!(back.ymin <= geo.ymin + 1e-6 && back.ymax >= geo.ymax - 1e-6);
}

#[test]
fn tanaka_depths_from_a_synthetic_window() {
    let truth = CurieParams::new(3.0, 1.0, 20.0, 5.0);
    let synth = curie_depth::data::synthetic_grid(&truth, 64, 1000.0, 7).unwrap();
    let grid_in = CurieGrid::new(synth.data().clone(), synth.extent()).unwrap();
    assert_eq!((grid_in.ny(), grid_in.nx()), (64, 64));

    let extent = grid_in.extent();
    let (xc, yc) = (0.5 * (extent.xmin + extent.xmax), 0.5 * (extent.ymin + extent.ymax));
    let window = grid_in.subgrid(32_000.0, xc, yc).unwrap();
    let spectrum = grid_in.radial_spectrum(&window, &SpectrumOptions::default()).unwrap();
    let n = spectrum.k.len();
    assert!(n >= 6, "only {n} bins");

    let centroid_range = (spectrum.k[0], spectrum.k[n / 3]);
    let top_range = (spectrum.k[n / 2], spectrum.k[n - 1]);
    let depths = tanaka1999(&spectrum, top_range, centroid_range).unwrap();
    assert!(depths.zt.is_finite() && depths.zo.is_finite());
    assert!(depths.zt_err >= 0.0 && depths.zo_err >= 0.0);

    let (zb, zb_err) = compute_tanaka(depths.zt, depths.zt_err, depths.zo, depths.zo_err);
    assert!((zb - (2.0 * depths.zo - depths.zt)).abs() < 1e-12);
    assert!(zb_err.is_finite());

    // Too narrow a range leaves too few bins to fit.
    let narrow = (spectrum.k[0], spectrum.k[0] + 1e-12);
    assert!(tanaka1999(&spectrum, top_range, narrow).is_err());
}

#[test]
fn coordinates_survive_mercator_round_trip() {
    let lons = [-120.0, 0.0, 33.5, 179.0];
    let lats = [-60.0, 0.0, 12.25, 70.0];
    let (x, y) = transform_coordinates(&lons, &lats, Crs::Wgs84, Crs::WebMercator).unwrap();
    assert!((x[3] - 19_926_188.85).abs() < 1.0, "x={}", x[3]);
    assert!(y[1].abs() < 1e-6);

    let (lon, lat) = transform_coordinates(&x, &y, Crs::WebMercator, Crs::Wgs84).unwrap();
    for i in 0..lons.len() {
        assert!((lon[i] - lons[i]).abs() < 1e-9, "lon {i}: {}", lon[i]);
        assert!((lat[i] - lats[i]).abs() < 1e-9, "lat {i}: {}", lat[i]);
    }

    assert!(transform_coordinates(&lons, &lats[..2], Crs::Wgs84, Crs::WebMercator).is_err());
}
