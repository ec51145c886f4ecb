//! Frequency-domain potential-field filters.
//!
//! Both filters multiply the 2-D spectrum by a wavenumber response and
//! transform back; wavenumbers are in radians per coordinate unit.

use log::warn;
use nalgebra::DMatrix;
use rustfft::num_complex::Complex;

use crate::error::AppError;
use crate::math::{fft2, ifft2, wavenumbers};

/// Continue the field from the observation surface to height `h` above it.
///
/// The response is `exp(-h·|k|)`. Negative `h` continues downward and
/// amplifies short wavelengths.
pub fn upward_continuation(data: &DMatrix<f64>, spacing: f64, h: f64) -> Result<DMatrix<f64>, AppError> {
    check_input(data, spacing)?;
    if !h.is_finite() {
        return Err(AppError::input(format!("Invalid continuation height: {h}.")));
    }
    if h < 0.0 {
        warn!("downward continuation by {} units amplifies noise", -h);
    }

    apply_response(data, spacing, |kx, ky| {
        let k = kx.hypot(ky);
        Complex::new((-h * k).exp(), 0.0)
    })
}

/// Reduce the anomaly to the pole.
///
/// `inc`/`dec` give the ambient field direction and `sinc`/`sdec` the
/// magnetisation direction (degrees); the magnetisation defaults to the field
/// direction (induced magnetisation). The zero-wavenumber term is removed.
pub fn reduce_to_pole(
    data: &DMatrix<f64>,
    spacing: f64,
    inc: f64,
    dec: f64,
    sinc: Option<f64>,
    sdec: Option<f64>,
) -> Result<DMatrix<f64>, AppError> {
    check_input(data, spacing)?;
    let sinc = sinc.unwrap_or(inc);
    let sdec = sdec.unwrap_or(dec);
    if ![inc, dec, sinc, sdec].iter().all(|v| v.is_finite()) {
        return Err(AppError::input("Reduction to pole needs finite inclination/declination."));
    }

    let field = direction_cosines(inc, dec);
    let magnetisation = direction_cosines(sinc, sdec);

    apply_response(data, spacing, |kx, ky| {
        let k = kx.hypot(ky);
        if k == 0.0 {
            return Complex::new(0.0, 0.0);
        }
        let theta_f = Complex::new(field.2 * k, field.0 * kx + field.1 * ky);
        let theta_m = Complex::new(magnetisation.2 * k, magnetisation.0 * kx + magnetisation.1 * ky);
        let denom = theta_f * theta_m;
        // Directions perpendicular to a horizontal field blow up; drop them.
        if denom.norm() < 1e-12 * k * k {
            return Complex::new(0.0, 0.0);
        }
        Complex::new(k * k, 0.0) / denom
    })
}

/// Unit vector `(east, north, down)` for an inclination/declination pair.
fn direction_cosines(inc_deg: f64, dec_deg: f64) -> (f64, f64, f64) {
    let (inc, dec) = (inc_deg.to_radians(), dec_deg.to_radians());
    (inc.cos() * dec.sin(), inc.cos() * dec.cos(), inc.sin())
}

fn check_input(data: &DMatrix<f64>, spacing: f64) -> Result<(), AppError> {
    if data.nrows() < 2 || data.ncols() < 2 {
        return Err(AppError::data("Filter input grid is too small."));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(AppError::data("Filter input grid contains non-finite values."));
    }
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(AppError::input(format!("Invalid grid spacing: {spacing}.")));
    }
    Ok(())
}

fn apply_response<F>(data: &DMatrix<f64>, spacing: f64, response: F) -> Result<DMatrix<f64>, AppError>
where
    F: Fn(f64, f64) -> Complex<f64>,
{
    let (nrows, ncols) = data.shape();
    let kx = wavenumbers(ncols, spacing);
    let ky = wavenumbers(nrows, spacing);

    let mut spec = fft2(data);
    for c in 0..ncols {
        for r in 0..nrows {
            let v = spec.get(r, c) * response(kx[c], ky[r]);
            spec.set(r, c, v);
        }
    }

    let out = ifft2(&spec).real();
    if out.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numeric("Filter produced non-finite values."));
    }
    Ok(out)
}
