//! `CurieGrid`: a gridded magnetic anomaly with spatial metadata.
//!
//! The grid is stored as a `DMatrix<f64>` with `nrows = ny`, `ncols = nx`.
//! Row 0 lies on `ymin` and column 0 on `xmin`; node spacing must be equal in
//! both directions because the spectral binning assumes square cells.

use log::{debug, info};
use nalgebra::DMatrix;

use crate::domain::{AzimuthSector, Extent, RadialSpectrum, SpectrumOptions};
use crate::error::AppError;
use crate::grid::{filters, spectrum, trend};

/// Relative tolerance for `dx == dy`.
const SQUARE_CELL_TOL: f64 = 1e-3;

/// Upper bound on nodes in any raster or centroid lattice this crate builds.
pub const MAX_GRID_CELLS: usize = 50_000_000;

#[derive(Debug, Clone)]
pub struct CurieGrid {
    data: DMatrix<f64>,
    extent: Extent,
    dx: f64,
    dy: f64,
}

impl CurieGrid {
    pub fn new(data: DMatrix<f64>, extent: Extent) -> Result<Self, AppError> {
        let (ny, nx) = data.shape();
        if nx < 4 || ny < 4 {
            return Err(AppError::data(format!("Grid too small: {ny}x{nx} (need at least 4x4).")));
        }

        let dx = extent.width() / (nx - 1) as f64;
        let dy = extent.height() / (ny - 1) as f64;
        if ((dx - dy) / dx).abs() > SQUARE_CELL_TOL {
            return Err(AppError::input(format!(
                "Grid cells must be square: dx={dx}, dy={dy}."
            )));
        }

        info!(
            "grid: {ny}x{nx} nodes, dx={dx:.3}, x=[{:.1}, {:.1}], y=[{:.1}, {:.1}]",
            extent.xmin, extent.xmax, extent.ymin, extent.ymax
        );

        Ok(Self { data, extent, dx, dy })
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn dy(&self) -> f64 {
        self.dy
    }

    pub fn nx(&self) -> usize {
        self.data.ncols()
    }

    pub fn ny(&self) -> usize {
        self.data.nrows()
    }

    /// Square window of side `window` (coordinate units) centred on `(xc, yc)`.
    ///
    /// The window has an even number of nodes, `2·⌊round(window/dx)/2⌋`, and is
    /// centred on the node nearest the requested point.
    pub fn subgrid(&self, window: f64, xc: f64, yc: f64) -> Result<DMatrix<f64>, AppError> {
        if !(window.is_finite() && window > 0.0) {
            return Err(AppError::input(format!("Invalid window size: {window}.")));
        }
        if !(xc.is_finite() && yc.is_finite()) {
            return Err(AppError::input(format!("Invalid window centre: ({xc}, {yc}).")));
        }

        let half = ((window / self.dx).round() as usize) / 2;
        if half < 2 {
            return Err(AppError::input(format!(
                "Window {window} spans fewer than 4 nodes at spacing {}.",
                self.dx
            )));
        }

        let ic = ((xc - self.extent.xmin) / self.dx).round();
        let ir = ((yc - self.extent.ymin) / self.dy).round();
        let h = half as f64;
        if ic - h < 0.0 || ir - h < 0.0 || ic + h > self.nx() as f64 || ir + h > self.ny() as f64 {
            return Err(AppError::input(format!(
                "Window of size {window} centred on ({xc}, {yc}) extends beyond the grid."
            )));
        }

        let (r0, c0) = (ir as usize - half, ic as usize - half);
        Ok(self.data.view((r0, c0), (2 * half, 2 * half)).into_owned())
    }

    /// Window centroids on a regular lattice such that every window fits.
    ///
    /// Spacing defaults to half the window in each direction.
    pub fn create_centroid_list(
        &self,
        window: f64,
        spacing_x: Option<f64>,
        spacing_y: Option<f64>,
    ) -> Result<Vec<(f64, f64)>, AppError> {
        let sx = spacing_x.unwrap_or(window / 2.0);
        let sy = spacing_y.unwrap_or(window / 2.0);
        if !(window.is_finite() && window > 0.0 && sx.is_finite() && sx > 0.0 && sy.is_finite() && sy > 0.0) {
            return Err(AppError::input(format!(
                "Invalid window/spacing: window={window}, spacing=({sx}, {sy})."
            )));
        }

        let xs = lattice(self.extent.xmin + window / 2.0, self.extent.xmax - window / 2.0, sx)?;
        let ys = lattice(self.extent.ymin + window / 2.0, self.extent.ymax - window / 2.0, sy)?;
        if xs.len().checked_mul(ys.len()).is_none_or(|n| n > MAX_GRID_CELLS) {
            return Err(AppError::input(format!(
                "Centroid lattice of {}x{} exceeds {MAX_GRID_CELLS} windows; increase the spacing.",
                ys.len(),
                xs.len()
            )));
        }

        let centroids: Vec<(f64, f64)> = ys
            .iter()
            .flat_map(|&y| xs.iter().map(move |&x| (x, y)))
            .collect();
        debug!("centroids: {} ({}x{})", centroids.len(), xs.len(), ys.len());
        Ok(centroids)
    }

    /// Subtract the least-squares plane from `data`.
    pub fn remove_trend_linear(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>, AppError> {
        trend::remove_trend_linear(data)
    }

    /// Radial power spectrum of a window extracted from this grid.
    pub fn radial_spectrum(
        &self,
        subgrid: &DMatrix<f64>,
        opts: &SpectrumOptions,
    ) -> Result<RadialSpectrum, AppError> {
        spectrum::radial_spectrum(subgrid, self.dx, opts)
    }

    /// Radial spectra split into `sectors` azimuth sectors.
    pub fn azimuthal_spectrum(
        &self,
        subgrid: &DMatrix<f64>,
        opts: &SpectrumOptions,
        sectors: usize,
    ) -> Result<Vec<AzimuthSector>, AppError> {
        spectrum::azimuthal_spectrum(subgrid, self.dx, opts, sectors)
    }

    /// Upward-continued copy of `data` (height in coordinate units).
    pub fn upward_continuation(&self, data: &DMatrix<f64>, h: f64) -> Result<DMatrix<f64>, AppError> {
        filters::upward_continuation(data, self.dx, h)
    }

    /// Reduced-to-pole copy of `data`.
    pub fn reduce_to_pole(
        &self,
        data: &DMatrix<f64>,
        inc: f64,
        dec: f64,
        sinc: Option<f64>,
        sdec: Option<f64>,
    ) -> Result<DMatrix<f64>, AppError> {
        filters::reduce_to_pole(data, self.dx, inc, dec, sinc, sdec)
    }
}

/// `start, start+step, ...` up to `end` (inclusive, with a little slack).
fn lattice(start: f64, end: f64, step: f64) -> Result<Vec<f64>, AppError> {
    let slack = 1e-9 * step;
    if end < start - slack {
        return Ok(Vec::new());
    }
    let steps = ((end - start + slack) / step).floor();
    if !(steps.is_finite() && steps < MAX_GRID_CELLS as f64) {
        return Err(AppError::input(format!(
            "Spacing {step} gives more than {MAX_GRID_CELLS} centroids along one axis."
        )));
    }
    let count = steps as usize + 1;
    Ok((0..count).map(|i| start + i as f64 * step).collect())
}
