//! Tanaka et al. (1999) centroid method.
//!
//! Two straight-line fits on the radial spectrum:
//!
//! - high wavenumbers:  `ln P^{1/2} = ln B − k·zt`         → top depth
//! - low wavenumbers:   `ln (P^{1/2}/k) = ln C − k·zo`     → centroid depth
//!
//! The base of the magnetic layer follows as `zb = 2·zo − zt`.

use log::debug;

use crate::domain::{RadialSpectrum, TanakaDepths};
use crate::error::AppError;
use crate::math::linear_fit;

/// Minimum number of spectral bins in each fitting range.
const MIN_BINS: usize = 3;

/// Fit top and centroid depths over the given wavenumber ranges (rad/km).
pub fn tanaka1999(
    spectrum: &RadialSpectrum,
    top_range: (f64, f64),
    centroid_range: (f64, f64),
) -> Result<TanakaDepths, AppError> {
    for (name, (lo, hi)) in [("top", top_range), ("centroid", centroid_range)] {
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && hi > lo) {
            return Err(AppError::input(format!(
                "Invalid {name} wavenumber range: [{lo}, {hi}]."
            )));
        }
    }

    let (zt, zt_err) = fit_depth(spectrum, top_range, "top", |_, phi| 0.5 * phi)?;
    let (zo, zo_err) = fit_depth(spectrum, centroid_range, "centroid", |k, phi| 0.5 * phi - k.ln())?;

    debug!("tanaka: zt={zt:.3}±{zt_err:.3}, zo={zo:.3}±{zo_err:.3}");
    Ok(TanakaDepths {
        zt,
        zt_err,
        zo,
        zo_err,
    })
}

/// Base depth and its error from top and centroid depths.
///
/// `zb = 2·zo − zt`, with the errors added linearly: `2·zo_err + zt_err`.
pub fn compute_tanaka(zt: f64, zt_err: f64, zo: f64, zo_err: f64) -> (f64, f64) {
    (2.0 * zo - zt, 2.0 * zo_err + zt_err)
}

fn fit_depth<F>(
    spectrum: &RadialSpectrum,
    range: (f64, f64),
    name: &str,
    transform: F,
) -> Result<(f64, f64), AppError>
where
    F: Fn(f64, f64) -> f64,
{
    let idx = spectrum.indices_in_range(range.0, range.1);
    if idx.len() < MIN_BINS {
        return Err(AppError::data(format!(
            "Only {} spectral bins in the {name} range [{}, {}] (need {MIN_BINS}).",
            idx.len(),
            range.0,
            range.1
        )));
    }

    let x: Vec<f64> = idx.iter().map(|&i| spectrum.k[i]).collect();
    let y: Vec<f64> = idx
        .iter()
        .map(|&i| transform(spectrum.k[i], spectrum.phi[i]))
        .collect();
    // Halving the log-power halves its scatter.
    let w: Vec<f64> = idx
        .iter()
        .map(|&i| {
            let s = 0.5 * spectrum.sigma_floored(i);
            1.0 / (s * s)
        })
        .collect();

    let fit = linear_fit(&x, &y, &w)
        .ok_or_else(|| AppError::numeric(format!("Linear fit failed over the {name} range.")))?;
    Ok((-fit.slope, fit.slope_err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum_from(k: Vec<f64>, f: impl Fn(f64) -> f64) -> RadialSpectrum {
        let phi = k.iter().map(|&kk| f(kk)).collect();
        let sigma = vec![1.0; k.len()];
        RadialSpectrum { k, phi, sigma }
    }

    #[test]
    fn recovers_top_depth_from_exponential_decay() {
        let k: Vec<f64> = (1..40).map(|i| i as f64 * 0.05).collect();
        let spec = spectrum_from(k, |kk| 4.0 - 2.0 * 1.5 * kk);
        let depths = tanaka1999(&spec, (0.5, 1.5), (0.05, 0.3)).unwrap();
        assert!((depths.zt - 1.5).abs() < 1e-9);
        assert!(depths.zt_err < 1e-6);
    }

    #[test]
    fn recovers_centroid_depth() {
        let k: Vec<f64> = (1..40).map(|i| i as f64 * 0.01).collect();
        // Φ/2 − ln k = 1 − 10·k
        let spec = spectrum_from(k, |kk| 2.0 * (1.0 - 10.0 * kk + kk.ln()));
        let depths = tanaka1999(&spec, (0.2, 0.35), (0.02, 0.1)).unwrap();
        assert!((depths.zo - 10.0).abs() < 1e-9);
    }

    #[test]
    fn base_depth_from_top_and_centroid() {
        let (zb, zb_err) = compute_tanaka(1.5, 0.1, 10.0, 0.2);
        assert!((zb - 18.5).abs() < 1e-12);
        assert!((zb_err - 0.5).abs() < 1e-12);
    }

    #[test]
    fn too_few_bins_is_insufficient_data() {
        let spec = spectrum_from(vec![0.1, 0.2, 0.3, 0.4], |kk| -kk);
        let err = tanaka1999(&spec, (0.15, 0.25), (0.1, 0.4)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }
}
