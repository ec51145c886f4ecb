//! Trend removal for spectral windows.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::solve_least_squares;

/// Subtract the mean value.
pub fn remove_mean(data: &DMatrix<f64>) -> DMatrix<f64> {
    if data.is_empty() {
        return data.clone();
    }
    let mean = data.mean();
    data.map(|v| v - mean)
}

/// Subtract the least-squares plane `a + b·col + c·row`.
///
/// Index coordinates are used; the plane is the same for any uniform spacing.
pub fn remove_trend_linear(data: &DMatrix<f64>) -> Result<DMatrix<f64>, AppError> {
    let (nrows, ncols) = data.shape();
    let n = nrows * ncols;
    if nrows < 2 || ncols < 2 {
        return Err(AppError::data(format!(
            "Cannot fit a plane to a {nrows}x{ncols} grid."
        )));
    }

    let mut x = DMatrix::<f64>::zeros(n, 3);
    let mut y = DVector::<f64>::zeros(n);
    for c in 0..ncols {
        for r in 0..nrows {
            let i = c * nrows + r;
            x[(i, 0)] = 1.0;
            x[(i, 1)] = c as f64;
            x[(i, 2)] = r as f64;
            y[i] = data[(r, c)];
        }
    }

    let coef = solve_least_squares(&x, &y)
        .ok_or_else(|| AppError::numeric("Plane fit failed during trend removal."))?;

    Ok(DMatrix::from_fn(nrows, ncols, |r, c| {
        data[(r, c)] - (coef[0] + coef[1] * c as f64 + coef[2] * r as f64)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_is_removed_exactly() {
        let data = DMatrix::from_fn(6, 5, |r, c| 3.0 + 2.0 * c as f64 - 1.0 * r as f64);
        let out = remove_trend_linear(&data).unwrap();
        assert!(out.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn residual_keeps_non_planar_signal() {
        let data = DMatrix::from_fn(8, 8, |r, c| ((r as f64 - 3.5).powi(2) + c as f64));
        let out = remove_trend_linear(&data).unwrap();
        assert!(out.abs().max() > 1.0);
        assert!(out.mean().abs() < 1e-9);
    }

    #[test]
    fn mean_removal_centres_data() {
        let data = DMatrix::from_element(3, 3, 4.0);
        assert!(remove_mean(&data).iter().all(|v| *v == 0.0));
    }
}
