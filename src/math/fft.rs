//! 2-D FFTs over `nalgebra` matrices.
//!
//! `rustfft` only provides 1-D transforms, so a 2-D transform is a pass over
//! every column followed by a pass over every row. Values are stored
//! column-major (the same layout as `DMatrix`), which makes the column pass a
//! walk over contiguous chunks.

use nalgebra::DMatrix;
use rustfft::num_complex::Complex;
use rustfft::{FftDirection, FftPlanner};

/// Column-major grid of complex values.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexGrid {
    nrows: usize,
    ncols: usize,
    values: Vec<Complex<f64>>,
}

impl ComplexGrid {
    pub fn from_real(data: &DMatrix<f64>) -> Self {
        Self {
            nrows: data.nrows(),
            ncols: data.ncols(),
            values: data.iter().map(|v| Complex::new(*v, 0.0)).collect(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn get(&self, r: usize, c: usize) -> Complex<f64> {
        self.values[c * self.nrows + r]
    }

    pub fn set(&mut self, r: usize, c: usize, v: Complex<f64>) {
        self.values[c * self.nrows + r] = v;
    }

    /// Real parts as a matrix.
    pub fn real(&self) -> DMatrix<f64> {
        DMatrix::from_iterator(self.nrows, self.ncols, self.values.iter().map(|v| v.re))
    }
}

/// Forward 2-D FFT (unnormalised).
pub fn fft2(data: &DMatrix<f64>) -> ComplexGrid {
    let mut grid = ComplexGrid::from_real(data);
    transform(&mut grid, FftDirection::Forward);
    grid
}

/// Inverse 2-D FFT, normalised by `1 / (nrows·ncols)`.
pub fn ifft2(grid: &ComplexGrid) -> ComplexGrid {
    let mut out = grid.clone();
    transform(&mut out, FftDirection::Inverse);
    let norm = 1.0 / (out.nrows * out.ncols) as f64;
    for v in out.values.iter_mut() {
        *v *= norm;
    }
    out
}

/// Angular wavenumbers in FFT order for `n` samples spaced `d` apart.
///
/// Index `i` maps to `i·dk` for `i < ⌈n/2⌉` and `(i-n)·dk` above, where
/// `dk = 2π/(n·d)`.
pub fn wavenumbers(n: usize, d: f64) -> Vec<f64> {
    let dk = 2.0 * std::f64::consts::PI / (n as f64 * d);
    let half = n.div_ceil(2);
    (0..n)
        .map(|i| {
            let j = if i < half { i as f64 } else { i as f64 - n as f64 };
            j * dk
        })
        .collect()
}

fn transform(grid: &mut ComplexGrid, direction: FftDirection) {
    let (nrows, ncols) = (grid.nrows, grid.ncols);
    if nrows == 0 || ncols == 0 {
        return;
    }
    let mut planner = FftPlanner::<f64>::new();

    // Columns are contiguous.
    let col_fft = planner.plan_fft(nrows, direction);
    for column in grid.values.chunks_mut(nrows) {
        col_fft.process(column);
    }

    let row_fft = planner.plan_fft(ncols, direction);
    let mut row = vec![Complex::new(0.0, 0.0); ncols];
    for r in 0..nrows {
        for (c, slot) in row.iter_mut().enumerate() {
            *slot = grid.values[c * nrows + r];
        }
        row_fft.process(&mut row);
        for (c, v) in row.iter().enumerate() {
            grid.values[c * nrows + r] = *v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_recovers_input() {
        let data = DMatrix::from_fn(6, 8, |r, c| (r as f64 * 0.7).sin() + c as f64 * 0.1);
        let back = ifft2(&fft2(&data)).real();
        for (a, b) in data.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn dc_term_is_sum() {
        let data = DMatrix::from_element(4, 4, 2.0);
        let spec = fft2(&data);
        assert!((spec.get(0, 0).re - 32.0).abs() < 1e-12);
        assert!(spec.get(1, 2).norm() < 1e-12);
    }

    #[test]
    fn wavenumbers_follow_fft_order() {
        let k = wavenumbers(4, 1.0);
        let dk = std::f64::consts::PI / 2.0;
        assert_eq!(k.len(), 4);
        assert!((k[1] - dk).abs() < 1e-15);
        assert!((k[2] + 2.0 * dk).abs() < 1e-15);
        assert!((k[3] + dk).abs() < 1e-15);
    }
}
