//! Raster helpers for depth maps.
//!
//! - `trim`: crop border rows/columns that hold no finite values
//! - `grid`: interpolate scattered `(x, y, z)` points onto a regular grid
//!
//! Grids follow the `CurieGrid` layout: row 0 on `ymin`, column 0 on `xmin`,
//! nodes on the extent edges.

use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{Extent, InterpMethod};
use crate::error::AppError;

/// Exponent of the inverse-distance weights.
const IDW_POWER: f64 = 2.0;

/// Remove leading/trailing rows and columns that are entirely non-finite.
///
/// Returns the cropped data and its extent.
pub fn trim(data: &DMatrix<f64>, extent: &Extent) -> Result<(DMatrix<f64>, Extent), AppError> {
    let (ny, nx) = data.shape();
    if nx < 2 || ny < 2 {
        return Err(AppError::input(format!("Cannot trim a {ny}x{nx} grid (need at least 2x2).")));
    }

    let row_ok: Vec<bool> = (0..ny).map(|r| data.row(r).iter().any(|v| v.is_finite())).collect();
    let col_ok: Vec<bool> = (0..nx).map(|c| data.column(c).iter().any(|v| v.is_finite())).collect();

    let (Some(r0), Some(r1)) = (row_ok.iter().position(|b| *b), row_ok.iter().rposition(|b| *b)) else {
        return Err(AppError::data("Grid holds no finite values."));
    };
    let (Some(c0), Some(c1)) = (col_ok.iter().position(|b| *b), col_ok.iter().rposition(|b| *b)) else {
        return Err(AppError::data("Grid holds no finite values."));
    };
    if r1 == r0 || c1 == c0 {
        return Err(AppError::data(format!(
            "Trimmed grid would be degenerate ({}x{}).",
            r1 - r0 + 1,
            c1 - c0 + 1
        )));
    }

    let dx = extent.width() / (nx - 1) as f64;
    let dy = extent.height() / (ny - 1) as f64;
    let trimmed_extent = Extent::new(
        extent.xmin + c0 as f64 * dx,
        extent.xmin + c1 as f64 * dx,
        extent.ymin + r0 as f64 * dy,
        extent.ymin + r1 as f64 * dy,
    )?;

    debug!("trim: rows {r0}..={r1}, cols {c0}..={c1} of {ny}x{nx}");
    let out = data.view((r0, c0), (r1 - r0 + 1, c1 - c0 + 1)).into_owned();
    Ok((out, trimmed_extent))
}

/// Interpolate scattered points onto a `shape = (ny, nx)` grid over `extent`.
///
/// With `max_distance`, nodes farther than that from every point are `NaN`
/// (for IDW only points within the distance contribute). Points with a
/// non-finite coordinate or value are ignored.
pub fn grid(
    points: &[(f64, f64, f64)],
    extent: &Extent,
    shape: (usize, usize),
    method: InterpMethod,
    max_distance: Option<f64>,
) -> Result<DMatrix<f64>, AppError> {
    let (ny, nx) = shape;
    if nx < 2 || ny < 2 {
        return Err(AppError::input(format!("Output grid must be at least 2x2, got {ny}x{nx}.")));
    }
    if let Some(d) = max_distance {
        if !(d.is_finite() && d > 0.0) {
            return Err(AppError::input(format!("Invalid max distance {d} (must be finite and >0).")));
        }
    }

    let pts: Vec<(f64, f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y, z)| x.is_finite() && y.is_finite() && z.is_finite())
        .collect();
    if pts.is_empty() {
        return Err(AppError::data("No finite points to grid."));
    }

    let dx = extent.width() / (nx - 1) as f64;
    let dy = extent.height() / (ny - 1) as f64;
    let max_d2 = max_distance.map(|d| d * d).unwrap_or(f64::INFINITY);

    // Column-major to match `DMatrix::from_vec`.
    let values: Vec<f64> = (0..nx * ny)
        .into_par_iter()
        .map(|idx| {
            let (r, c) = (idx % ny, idx / ny);
            let gx = extent.xmin + c as f64 * dx;
            let gy = extent.ymin + r as f64 * dy;
            match method {
                InterpMethod::Nearest => nearest(&pts, gx, gy, max_d2),
                InterpMethod::Idw => inverse_distance(&pts, gx, gy, max_d2),
            }
        })
        .collect();

    Ok(DMatrix::from_vec(ny, nx, values))
}

fn nearest(pts: &[(f64, f64, f64)], gx: f64, gy: f64, max_d2: f64) -> f64 {
    let mut best = (f64::INFINITY, f64::NAN);
    for &(x, y, z) in pts {
        let d2 = (x - gx).powi(2) + (y - gy).powi(2);
        if d2 < best.0 {
            best = (d2, z);
        }
    }
    if best.0 <= max_d2 { best.1 } else { f64::NAN }
}

fn inverse_distance(pts: &[(f64, f64, f64)], gx: f64, gy: f64, max_d2: f64) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for &(x, y, z) in pts {
        let d2 = (x - gx).powi(2) + (y - gy).powi(2);
        if d2 > max_d2 {
            continue;
        }
        if d2 == 0.0 {
            return z;
        }
        let w = d2.powf(-0.5 * IDW_POWER);
        num += w * z;
        den += w;
    }
    if den > 0.0 { num / den } else { f64::NAN }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_removes_empty_border() {
        let mut data = DMatrix::from_fn(5, 6, |r, c| (r * 10 + c) as f64);
        data.row_mut(0).fill(f64::NAN);
        data.column_mut(5).fill(f64::NAN);
        data[(2, 0)] = f64::NAN;
        let extent = Extent::new(0.0, 50.0, 0.0, 40.0).unwrap();

        let (out, ext) = trim(&data, &extent).unwrap();
        assert_eq!(out.shape(), (4, 5));
        assert_eq!(out[(0, 0)], 10.0);
        assert!(out[(1, 0)].is_nan());
        assert_eq!(ext, Extent::new(0.0, 40.0, 10.0, 40.0).unwrap());
    }

    #[test]
    fn trim_all_nan_is_an_error() {
        let data = DMatrix::from_element(3, 3, f64::NAN);
        let extent = Extent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let err = trim(&data, &extent).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }

    #[test]
    fn nearest_reproduces_node_values() {
        let extent = Extent::new(0.0, 2.0, 0.0, 1.0).unwrap();
        let pts: Vec<(f64, f64, f64)> = (0..2)
            .flat_map(|r| (0..3).map(move |c| (c as f64, r as f64, (r * 3 + c) as f64)))
            .collect();
        let g = grid(&pts, &extent, (2, 3), InterpMethod::Nearest, None).unwrap();
        for r in 0..2 {
            for c in 0..3 {
                assert_eq!(g[(r, c)], (r * 3 + c) as f64);
            }
        }
    }

    #[test]
    fn idw_midpoint_is_mean_and_hits_data_exactly() {
        let extent = Extent::new(0.0, 2.0, 0.0, 2.0).unwrap();
        let pts = [(0.0, 1.0, 10.0), (2.0, 1.0, 20.0)];
        let g = grid(&pts, &extent, (3, 3), InterpMethod::Idw, None).unwrap();
        assert!((g[(1, 1)] - 15.0).abs() < 1e-12);
        assert_eq!(g[(1, 0)], 10.0);
        assert_eq!(g[(1, 2)], 20.0);
    }

    #[test]
    fn max_distance_leaves_gaps() {
        let extent = Extent::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let pts = [(0.0, 0.0, 1.0)];
        for method in [InterpMethod::Nearest, InterpMethod::Idw] {
            let g = grid(&pts, &extent, (11, 11), method, Some(2.5)).unwrap();
            assert_eq!(g[(0, 2)], 1.0);
            assert!(g[(10, 10)].is_nan());
        }
    }

    #[test]
    fn grid_rejects_empty_input() {
        let extent = Extent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        assert!(grid(&[(0.0, 0.0, f64::NAN)], &extent, (2, 2), InterpMethod::Idw, None).is_err());
    }
}
