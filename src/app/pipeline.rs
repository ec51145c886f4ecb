//! Shared pipeline logic used by the CLI handlers.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load grid -> filters -> optimiser setup -> centroid lattice -> fits -> stats
//!
//! The handlers in `app` can then focus on presentation and exports.

use std::path::Path;

use log::info;
use nalgebra::DMatrix;

use crate::domain::{DepthEstimate, Extent, FitConfig, InterpMethod, Param, ParamBounds};
use crate::error::AppError;
use crate::fit::CurieOptimise;
use crate::grid::{CurieGrid, MAX_GRID_CELLS};
use crate::io::load_ascii_grid;
use crate::mapping::{Crs, grid, transform_coordinates, trim};
use crate::math::MinimizeOptions;
use crate::report::{MapStats, depth_map_stats};

/// All computed outputs of a `curie map` run.
#[derive(Debug, Clone)]
pub struct MapOutput {
    pub centroids: Vec<(f64, f64)>,
    pub estimates: Vec<DepthEstimate>,
    /// `None` when every window failed.
    pub stats: Option<MapStats>,
}

/// Load an ESRI ASCII grid and apply the requested whole-grid filters.
///
/// Reduction to the pole runs before upward continuation.
pub fn load_grid(
    path: &Path,
    reduce_to_pole: Option<(f64, f64)>,
    upward_height: Option<f64>,
) -> Result<CurieGrid, AppError> {
    let raster = load_ascii_grid(path)?;
    let grid = raster.into_curie_grid()?;
    info!(
        "loaded {}: {}x{} nodes, dx={}",
        path.display(),
        grid.ny(),
        grid.nx(),
        grid.dx()
    );

    let mut data = grid.data().clone();
    if let Some((inc, dec)) = reduce_to_pole {
        data = grid.reduce_to_pole(&data, inc, dec, None, None)?;
        info!("reduced to pole (inc={inc}, dec={dec})");
    }
    if let Some(h) = upward_height {
        data = grid.upward_continuation(&data, h)?;
        info!("upward continued by {h}");
    }

    if reduce_to_pole.is_none() && upward_height.is_none() {
        return Ok(grid);
    }
    CurieGrid::new(data, grid.extent())
}

/// Build an optimiser for `grid` with the configured spectrum options, priors
/// and bounds.
pub fn build_optimiser(grid: CurieGrid, config: &FitConfig) -> CurieOptimise {
    let mut optimiser = CurieOptimise::new(grid).with_spectrum_options(config.spectrum);
    optimiser.set_priors(config.priors);
    optimiser.replace_bounds(config.bounds);
    match config.max_iter {
        Some(max_iter) => optimiser.with_minimize_options(MinimizeOptions {
            max_iter,
            ..MinimizeOptions::default()
        }),
        None => optimiser,
    }
}

/// Load the grid named in `config` and return a configured optimiser.
pub fn prepare(config: &FitConfig) -> Result<CurieOptimise, AppError> {
    let grid = load_grid(&config.grid_path, config.reduce_to_pole, config.upward_height)?;
    Ok(build_optimiser(grid, config))
}

/// Fit every window on the centroid lattice.
pub fn run_map(optimiser: &CurieOptimise, config: &FitConfig) -> Result<MapOutput, AppError> {
    let centroids = optimiser
        .grid()
        .create_centroid_list(config.window, config.spacing_x, config.spacing_y)?;
    if centroids.is_empty() {
        return Err(AppError::data(format!(
            "Window {} does not fit inside the grid; no centroids to fit.",
            config.window
        )));
    }

    let estimates = optimiser.optimise_routine(config.window, &centroids, &config.initial);
    let stats = depth_map_stats(&estimates);
    Ok(MapOutput {
        centroids,
        estimates,
        stats,
    })
}

/// Bounds with every parameter in `fixed` pinned to its value.
pub fn pin_params(mut bounds: ParamBounds, fixed: &[(Param, f64)]) -> Result<ParamBounds, AppError> {
    for &(param, value) in fixed {
        if !value.is_finite() {
            return Err(AppError::input(format!("Cannot fix {} to {value}.", param.name())));
        }
        bounds.set(param, value, value)?;
    }
    Ok(bounds)
}

/// Options for turning scattered points into a raster.
#[derive(Debug, Clone, Copy)]
pub struct RegridOptions {
    pub nx: usize,
    pub method: InterpMethod,
    pub max_distance: Option<f64>,
    pub crs: Option<(Crs, Crs)>,
    pub trim: bool,
}

/// Interpolate `points` onto a square-cell raster spanning their bounding box.
///
/// With `crs`, point coordinates are transformed before gridding. The column
/// count is `nx`; rows follow from the cell size, so the top edge may extend
/// slightly past the northernmost point.
pub fn regrid_points(
    points: &[(f64, f64, f64)],
    opts: &RegridOptions,
) -> Result<(DMatrix<f64>, Extent), AppError> {
    let mut points: Vec<(f64, f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y, z)| x.is_finite() && y.is_finite() && z.is_finite())
        .collect();
    if points.len() < 2 {
        return Err(AppError::data(format!(
            "Need at least 2 valid points to grid, got {}.",
            points.len()
        )));
    }

    if let Some((from, to)) = opts.crs {
        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let (tx, ty) = transform_coordinates(&xs, &ys, from, to)?;
        for (p, (x, y)) in points.iter_mut().zip(tx.into_iter().zip(ty)) {
            p.0 = x;
            p.1 = y;
        }
        info!("transformed {} points from {from} to {to}", points.len());
    }

    let (xmin, xmax, ymin, ymax) = points.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(x0, x1, y0, y1), &(x, y, _)| (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
    );
    if opts.nx < 2 {
        return Err(AppError::input(format!("Output grid needs nx >= 2, got {}.", opts.nx)));
    }
    let cell = (xmax - xmin) / (opts.nx - 1) as f64;
    if !(cell.is_finite() && cell > 0.0) {
        return Err(AppError::data("Points have no extent in x; cannot choose a cell size."));
    }
    let rows = ((ymax - ymin) / cell).ceil();
    if !(rows.is_finite() && rows < MAX_GRID_CELLS as f64) {
        return Err(AppError::input(format!(
            "Points span {} in y but only {} in x; choose a smaller nx.",
            ymax - ymin,
            xmax - xmin
        )));
    }
    let ny = (rows as usize + 1).max(2);
    if ny.checked_mul(opts.nx).is_none_or(|n| n > MAX_GRID_CELLS) {
        return Err(AppError::input(format!(
            "Output grid of {ny}x{} exceeds {MAX_GRID_CELLS} cells.",
            opts.nx
        )));
    }
    let extent = Extent::new(xmin, xmax, ymin, ymin + (ny - 1) as f64 * cell)?;

    let data = grid(&points, &extent, (ny, opts.nx), opts.method, opts.max_distance)?;
    if opts.trim {
        return trim(&data, &extent);
    }
    Ok((data, extent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_grid;
    use crate::domain::{CurieParams, Priors, SpectrumOptions};
    use crate::io::write_ascii_grid;

    fn config(path: &Path, window: f64) -> FitConfig {
        FitConfig {
            grid_path: path.to_path_buf(),
            upward_height: None,
            reduce_to_pole: None,
            window,
            spacing_x: None,
            spacing_y: None,
            spectrum: SpectrumOptions::default(),
            initial: CurieParams::new(3.0, 1.0, 20.0, 5.0),
            priors: Priors::default(),
            bounds: ParamBounds::default(),
            max_iter: None,
            export_csv: None,
            export_json: None,
        }
    }

    #[test]
    fn map_covers_lattice_and_reports_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.asc");
        let params = CurieParams::new(3.0, 1.0, 20.0, 5.0);
        let grid = synthetic_grid(&params, 64, 1000.0, 3).unwrap();
        write_ascii_grid(&path, grid.data(), &grid.extent()).unwrap();

        let mut cfg = config(&path, 31_000.0);
        cfg.bounds = pin_params(cfg.bounds, &[(Param::Beta, 3.0)]).unwrap();
        let optimiser = prepare(&cfg).unwrap();
        let out = run_map(&optimiser, &cfg).unwrap();

        assert_eq!(out.centroids.len(), out.estimates.len());
        assert!(out.centroids.len() >= 4);
        let stats = out.stats.unwrap();
        assert_eq!(stats.n_windows, out.estimates.len());
        for est in out.estimates.iter().filter(|e| e.params.is_some()) {
            assert_eq!(est.params.unwrap().beta, 3.0);
        }
    }

    #[test]
    fn oversized_window_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.asc");
        let grid = synthetic_grid(&CurieParams::default(), 16, 1000.0, 1).unwrap();
        write_ascii_grid(&path, grid.data(), &grid.extent()).unwrap();

        let cfg = config(&path, 1e6);
        let optimiser = prepare(&cfg).unwrap();
        let err = run_map(&optimiser, &cfg).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }

    #[test]
    fn filters_keep_grid_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.asc");
        let grid = synthetic_grid(&CurieParams::default(), 32, 1000.0, 5).unwrap();
        write_ascii_grid(&path, grid.data(), &grid.extent()).unwrap();

        let filtered = load_grid(&path, Some((60.0, 10.0)), Some(2000.0)).unwrap();
        assert_eq!(filtered.nx(), 32);
        assert_eq!(filtered.ny(), 32);
        assert_ne!(filtered.data(), grid.data());
    }

    #[test]
    fn pinning_rejects_non_finite_values() {
        assert!(pin_params(ParamBounds::default(), &[(Param::Zt, f64::NAN)]).is_err());
        let b = pin_params(ParamBounds::default(), &[(Param::Dz, 25.0)]).unwrap();
        assert_eq!(b.lower[Param::Dz.index()], 25.0);
        assert_eq!(b.upper[Param::Dz.index()], 25.0);
    }

    #[test]
    fn regrid_uses_square_cells() {
        let points: Vec<(f64, f64, f64)> = (0..5)
            .flat_map(|i| (0..3).map(move |j| (i as f64 * 10.0, j as f64 * 10.0, (i + j) as f64)))
            .collect();
        let opts = RegridOptions {
            nx: 5,
            method: InterpMethod::Idw,
            max_distance: None,
            crs: None,
            trim: false,
        };
        let (data, extent) = regrid_points(&points, &opts).unwrap();
        assert_eq!(data.shape(), (3, 5));
        assert_eq!(extent.xmax, 40.0);
        assert_eq!(extent.ymax, 20.0);
        assert!((data[(1, 2)] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn regrid_rejects_degenerate_aspect_ratio() {
        let opts = RegridOptions {
            nx: 100,
            method: InterpMethod::Nearest,
            max_distance: None,
            crs: None,
            trim: false,
        };
        let err = regrid_points(&[(0.0, 0.0, 1.0), (1e-9, 1e6, 2.0)], &opts).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);

        // Rows fit on their own but not times the columns.
        let wide = RegridOptions { nx: 100_000, ..opts };
        let err = regrid_points(&[(0.0, 0.0, 1.0), (1.0, 0.01, 2.0)], &wide).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn regrid_needs_points() {
        let opts = RegridOptions {
            nx: 10,
            method: InterpMethod::Nearest,
            max_distance: None,
            crs: None,
            trim: true,
        };
        let err = regrid_points(&[(0.0, 0.0, f64::NAN)], &opts).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }
}
