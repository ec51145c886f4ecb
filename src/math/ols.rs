//! Least squares solvers.
//!
//! Two small regression problems show up repeatedly:
//!
//! ```text
//! plane removal:  z ≈ a + b·col + c·row          (one solve per window)
//! Tanaka slopes:  y ≈ a + b·k, weights w_i        (two solves per window)
//! ```
//!
//! Both are tall, tiny systems (2–3 columns), so we solve them by SVD, which
//! stays robust when the design matrix is close to rank-deficient.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Straight-line fit `y = intercept + slope·x` with standard errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    pub intercept_err: f64,
    pub slope_err: f64,
}

/// Weighted straight-line fit.
///
/// Standard errors come from `(XᵀWX)⁻¹` scaled by the reduced chi-square of
/// the residuals, so they reflect the actual scatter about the line rather
/// than only the supplied weights.
///
/// Returns `None` with fewer than 3 points, non-positive weights, or a
/// degenerate abscissa.
pub fn linear_fit(x: &[f64], y: &[f64], w: &[f64]) -> Option<LinearFit> {
    let n = x.len();
    if n < 3 || y.len() != n || w.len() != n {
        return None;
    }
    if w.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return None;
    }

    let mut xw = DMatrix::<f64>::zeros(n, 2);
    let mut yw = DVector::<f64>::zeros(n);
    for i in 0..n {
        let sw = w[i].sqrt();
        xw[(i, 0)] = sw;
        xw[(i, 1)] = x[i] * sw;
        yw[i] = y[i] * sw;
    }

    let beta = solve_least_squares(&xw, &yw)?;

    let normal = xw.transpose() * &xw;
    let cov = normal.try_inverse()?;

    let resid = &yw - &xw * &beta;
    let chi2_red = resid.norm_squared() / (n as f64 - 2.0);

    let intercept_err = (cov[(0, 0)] * chi2_red).max(0.0).sqrt();
    let slope_err = (cov[(1, 1)] * chi2_red).max(0.0).sqrt();

    Some(LinearFit {
        intercept: beta[0],
        slope: beta[1],
        intercept_err,
        slope_err,
    })
}
