//! Bound-constrained minimisation on top of `wolfe_bfgs`.
//!
//! The Curie objective has four parameters, box bounds and no analytic
//! gradient. BFGS itself is unconstrained, so each bounded coordinate is
//! rewritten in terms of an unconstrained `u`:
//!
//! | bounds      | map                                 |
//! |-------------|-------------------------------------|
//! | `lo == hi`  | dropped from the search vector      |
//! | `(-∞, ∞)`   | `x = u`                             |
//! | `[lo, ∞)`   | `x = lo + exp(u)`                   |
//! | `(-∞, hi]`  | `x = hi − exp(u)`                   |
//! | `[lo, hi]`  | `x = lo + (hi − lo)·σ(u)`           |
//!
//! Gradients in `u` come from central finite differences.

use std::cell::RefCell;

use log::{debug, warn};
use ndarray::Array1;
use wolfe_bfgs::{Bfgs, BfgsSolution};

use crate::error::AppError;

/// Stopping and differencing controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizeOptions {
    pub max_iter: usize,
    /// Gradient-norm tolerance handed to BFGS.
    pub tolerance: f64,
    /// Relative finite-difference step in the unconstrained coordinates.
    pub fd_step: f64,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        Self {
            max_iter: 500,
            tolerance: 1e-6,
            fd_step: 1e-6,
        }
    }
}

/// Result of a minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub f: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Keeps `exp` finite.
const U_LIMIT: f64 = 700.0;
/// Relative offset from a bound when mapping the start point into `u`; the
/// maps flatten at the edges, so a start exactly on a bound would stall.
const EDGE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Coord {
    Fixed(f64),
    Free,
    Lower(f64),
    Upper(f64),
    Both(f64, f64),
}

impl Coord {
    fn new(lo: f64, hi: f64) -> Self {
        match (lo.is_finite(), hi.is_finite()) {
            _ if lo == hi => Coord::Fixed(lo),
            (false, false) => Coord::Free,
            (true, false) => Coord::Lower(lo),
            (false, true) => Coord::Upper(hi),
            (true, true) => Coord::Both(lo, hi),
        }
    }

    fn to_x(self, u: f64) -> f64 {
        let u = u.clamp(-U_LIMIT, U_LIMIT);
        match self {
            Coord::Fixed(v) => v,
            Coord::Free => u,
            Coord::Lower(lo) => lo + u.exp(),
            Coord::Upper(hi) => hi - u.exp(),
            Coord::Both(lo, hi) => lo + (hi - lo) / (1.0 + (-u).exp()),
        }
    }

    fn to_u(self, x: f64) -> f64 {
        match self {
            Coord::Fixed(_) => 0.0,
            Coord::Free => x,
            Coord::Lower(lo) => (x - lo).max(EDGE * lo.abs().max(1.0)).ln(),
            Coord::Upper(hi) => (hi - x).max(EDGE * hi.abs().max(1.0)).ln(),
            Coord::Both(lo, hi) => {
                let t = ((x - lo) / (hi - lo)).clamp(EDGE, 1.0 - EDGE);
                (t / (1.0 - t)).ln()
            }
        }
    }
}

/// Minimise `f` over the box `[lower, upper]` starting from `x0`.
///
/// `x0` is projected into the box first. Fails when the bounds are
/// inconsistent or `f` is not finite at the (projected) start. When BFGS
/// stops early the best point seen is returned with `converged = false`.
pub fn minimize_bounded<F>(
    f: F,
    x0: &[f64],
    lower: &[f64],
    upper: &[f64],
    opts: &MinimizeOptions,
) -> Result<Minimum, AppError>
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    if lower.len() != n || upper.len() != n {
        return Err(AppError::input("Bounds length does not match parameter count."));
    }
    if lower.iter().zip(upper.iter()).any(|(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi) {
        return Err(AppError::input("Inconsistent bounds (lower > upper)."));
    }

    let coords: Vec<Coord> = lower.iter().zip(upper.iter()).map(|(lo, hi)| Coord::new(*lo, *hi)).collect();
    let start: Vec<f64> = x0
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
        .collect();
    let f0 = f(&start);
    if !f0.is_finite() {
        return Err(AppError::numeric(format!(
            "Objective is not finite at the starting point {start:?}."
        )));
    }

    let free: Vec<usize> = (0..n).filter(|&i| !matches!(coords[i], Coord::Fixed(_))).collect();
    if free.is_empty() {
        return Ok(Minimum {
            x: start,
            f: f0,
            iterations: 0,
            converged: true,
        });
    }

    let to_x = |u: &[f64]| -> Vec<f64> {
        let mut x = start.clone();
        for (k, &i) in free.iter().enumerate() {
            x[i] = coords[i].to_x(u[k]).clamp(lower[i], upper[i]);
        }
        x
    };

    // Non-finite values become a large finite penalty so the line search can
    // back off instead of aborting.
    let penalty = 1e10 * (1.0 + f0.abs());
    let best = RefCell::new((start.clone(), f0));
    let eval = |u: &[f64]| -> f64 {
        let x = to_x(u);
        let fx = f(&x);
        if !fx.is_finite() {
            return penalty;
        }
        let mut b = best.borrow_mut();
        if fx < b.1 {
            *b = (x, fx);
        }
        fx
    };

    let cost_and_grad = |u: &Array1<f64>| -> (f64, Array1<f64>) {
        let mut point = u.to_vec();
        let fu = eval(&point);
        let mut grad = Array1::zeros(point.len());
        for k in 0..point.len() {
            let uk = point[k];
            let h = opts.fd_step * uk.abs().max(1.0);
            point[k] = uk + h;
            let fp = eval(&point);
            point[k] = uk - h;
            let fm = eval(&point);
            point[k] = uk;
            let g = (fp - fm) / (2.0 * h);
            grad[k] = if g.is_finite() { g } else { 0.0 };
        }
        (fu, grad)
    };

    let u0: Array1<f64> = free.iter().map(|&i| coords[i].to_u(start[i])).collect();
    let run = Bfgs::new(u0, cost_and_grad)
        .with_tolerance(opts.tolerance)
        .with_max_iterations(opts.max_iter)
        .run();

    let (best_x, best_f) = best.into_inner();
    match run {
        Ok(BfgsSolution {
            final_point,
            final_value,
            iterations,
            ..
        }) => {
            let x = to_x(&final_point.to_vec());
            // The BFGS point can sit a rounding error above the best evaluation.
            let (x, fx) = if final_value.is_finite() && final_value <= best_f {
                (x, final_value)
            } else {
                (best_x, best_f)
            };
            debug!("minimize_bounded: f={fx:.6e} after {iterations} iterations");
            Ok(Minimum {
                x,
                f: fx,
                iterations,
                converged: true,
            })
        }
        Err(e) => {
            warn!("BFGS stopped early ({e:?}); keeping best point f={best_f:.6e}");
            Ok(Minimum {
                x: best_x,
                f: best_f,
                iterations: opts.max_iter,
                converged: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_quadratic() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2);
        let inf = f64::INFINITY;
        let m = minimize_bounded(f, &[0.0, 0.0], &[-inf, -inf], &[inf, inf], &MinimizeOptions::default())
            .unwrap();
        assert!((m.x[0] - 3.0).abs() < 1e-4);
        assert!((m.x[1] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn optimum_outside_box_approaches_bound() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + (x[1] - 0.5).powi(2);
        let m = minimize_bounded(f, &[0.5, 0.2], &[0.0, 0.0], &[1.0, 1.0], &MinimizeOptions::default())
            .unwrap();
        assert!(m.x[0] <= 1.0 && m.x[0] > 0.999, "x0={}", m.x[0]);
        assert!((m.x[1] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn one_sided_bound_keeps_iterates_feasible() {
        let f = |x: &[f64]| {
            assert!(x[0] >= 2.0);
            (x[0] - 5.0).powi(2)
        };
        let m = minimize_bounded(f, &[2.0], &[2.0], &[f64::INFINITY], &MinimizeOptions::default()).unwrap();
        assert!((m.x[0] - 5.0).abs() < 1e-4, "x0={}", m.x[0]);
    }

    #[test]
    fn rosenbrock_converges() {
        let f = |x: &[f64]| 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2);
        let opts = MinimizeOptions {
            max_iter: 2000,
            tolerance: 1e-8,
            ..MinimizeOptions::default()
        };
        let m = minimize_bounded(f, &[-1.2, 1.0], &[-5.0, -5.0], &[5.0, 5.0], &opts).unwrap();
        assert!((m.x[0] - 1.0).abs() < 1e-3, "x0={}", m.x[0]);
        assert!((m.x[1] - 1.0).abs() < 1e-3, "x1={}", m.x[1]);
    }

    #[test]
    fn pinned_variable_stays_fixed() {
        let f = |x: &[f64]| (x[0] - 2.0).powi(2) + (x[1] - 7.0).powi(2);
        let m = minimize_bounded(f, &[0.0, 0.0], &[-10.0, 4.0], &[10.0, 4.0], &MinimizeOptions::default())
            .unwrap();
        assert_eq!(m.x[1], 4.0);
        assert!((m.x[0] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn all_pinned_returns_start() {
        let f = |x: &[f64]| x[0] + x[1];
        let m = minimize_bounded(f, &[0.0, 0.0], &[1.0, 2.0], &[1.0, 2.0], &MinimizeOptions::default()).unwrap();
        assert_eq!(m.x, vec![1.0, 2.0]);
        assert_eq!(m.f, 3.0);
        assert_eq!(m.iterations, 0);
    }

    #[test]
    fn coordinate_maps_round_trip() {
        for (c, x) in [
            (Coord::Free, -3.0),
            (Coord::Lower(1.0), 4.0),
            (Coord::Upper(10.0), -2.0),
            (Coord::Both(-1.0, 3.0), 0.25),
        ] {
            assert!((c.to_x(c.to_u(x)) - x).abs() < 1e-12, "{c:?}");
        }
    }

    #[test]
    fn non_finite_start_is_an_error() {
        let f = |x: &[f64]| x[0].ln();
        let err = minimize_bounded(f, &[-1.0], &[-2.0], &[2.0], &MinimizeOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_NUMERIC);
    }
}
