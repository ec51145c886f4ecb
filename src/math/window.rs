//! One-dimensional taper windows.
//!
//! The symmetric forms use `n - 1` in the denominator so both end points sit
//! on the window's minimum, matching the usual numerical conventions.

use std::f64::consts::PI;

use nalgebra::DMatrix;

use crate::domain::TaperKind;

/// Taper coefficients of length `n`.
pub fn taper(kind: TaperKind, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }

    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let a = 2.0 * PI * i as f64 / denom;
            match kind {
                TaperKind::None => 1.0,
                TaperKind::Hann => 0.5 - 0.5 * a.cos(),
                TaperKind::Hamming => 0.54 - 0.46 * a.cos(),
                TaperKind::Blackman => 0.42 - 0.5 * a.cos() + 0.08 * (2.0 * a).cos(),
            }
        })
        .collect()
}

/// Outer-product 2-D taper for an `nrows × ncols` window.
pub fn taper_2d(kind: TaperKind, nrows: usize, ncols: usize) -> DMatrix<f64> {
    let tr = taper(kind, nrows);
    let tc = taper(kind, ncols);
    DMatrix::from_fn(nrows, ncols, |r, c| tr[r] * tc[c])
}
