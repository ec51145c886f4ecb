//! Windowed power spectra.
//!
//! A square window is prepared (trend removal, taper), transformed with a 2-D
//! FFT, and the log-power `ln(|F|^p)` of every wavenumber cell is collected
//! into radial annuli of width `dk = 2π/(n·d)`:
//!
//! ```text
//! bin j covers  j·dk <= |k| < (j+1)·dk,   j = 1 .. n/2 - 1
//! ```
//!
//! The DC cell and the corner wavenumbers beyond Nyquist are never binned.
//! The azimuthal variant further splits every annulus into equal azimuth
//! sectors over [0°, 180°); the spectrum of a real field is point-symmetric so
//! the other half-plane adds no information.

use log::debug;
use nalgebra::DMatrix;

use crate::domain::{AzimuthSector, Detrend, RadialSpectrum, SpectrumOptions};
use crate::error::AppError;
use crate::grid::trend::{remove_mean, remove_trend_linear};
use crate::math::{fft2, taper_2d};

/// Radial spectrum of a square window with node spacing `spacing`.
pub fn radial_spectrum(
    window: &DMatrix<f64>,
    spacing: f64,
    opts: &SpectrumOptions,
) -> Result<RadialSpectrum, AppError> {
    let mut sectors = binned_spectrum(window, spacing, opts, 1)?;
    Ok(sectors.remove(0))
}

/// Radial spectra of `sectors` equal azimuth sectors (degrees from north).
pub fn azimuthal_spectrum(
    window: &DMatrix<f64>,
    spacing: f64,
    opts: &SpectrumOptions,
    sectors: usize,
) -> Result<Vec<AzimuthSector>, AppError> {
    if sectors == 0 {
        return Err(AppError::input("Azimuthal spectrum needs at least one sector."));
    }
    let width = 180.0 / sectors as f64;
    let spectra = binned_spectrum(window, spacing, opts, sectors)?;
    Ok(spectra
        .into_iter()
        .enumerate()
        .map(|(s, spectrum)| AzimuthSector {
            azimuth_deg: (s as f64 + 0.5) * width,
            spectrum,
        })
        .collect())
}

/// Apply the configured trend removal and taper.
pub fn prepare_window(window: &DMatrix<f64>, opts: &SpectrumOptions) -> Result<DMatrix<f64>, AppError> {
    let detrended = match opts.detrend {
        Detrend::None => window.clone(),
        Detrend::Mean => remove_mean(window),
        Detrend::Linear => remove_trend_linear(window)?,
    };
    let taper = taper_2d(opts.taper, window.nrows(), window.ncols());
    Ok(detrended.component_mul(&taper))
}

fn binned_spectrum(
    window: &DMatrix<f64>,
    spacing: f64,
    opts: &SpectrumOptions,
    sectors: usize,
) -> Result<Vec<RadialSpectrum>, AppError> {
    let n = window.nrows();
    if window.ncols() != n {
        return Err(AppError::input(format!(
            "Spectral window must be square, got {}x{}.",
            window.nrows(),
            window.ncols()
        )));
    }
    if n < 4 {
        return Err(AppError::data(format!("Spectral window too small: {n}x{n} (need at least 4x4).")));
    }
    if window.iter().any(|v| !v.is_finite()) {
        return Err(AppError::data("Spectral window contains non-finite values."));
    }
    if !(spacing.is_finite() && spacing > 0.0 && opts.scale.is_finite() && opts.scale > 0.0) {
        return Err(AppError::input(format!(
            "Invalid spacing/scale: spacing={spacing}, scale={}.",
            opts.scale
        )));
    }
    if !(opts.power.is_finite() && opts.power > 0.0) {
        return Err(AppError::input(format!("Invalid spectral power exponent: {}.", opts.power)));
    }

    let prepared = prepare_window(window, opts)?;
    let spec = fft2(&prepared);

    let d = spacing * opts.scale;
    let dk = 2.0 * std::f64::consts::PI / (n as f64 * d);
    let k_axis = crate::math::wavenumbers(n, d);
    let nbins = n / 2 - 1;
    let sector_width = 180.0 / sectors as f64;

    // values[sector][bin] -> (k, log-power) samples
    let mut values: Vec<Vec<Vec<(f64, f64)>>> = vec![vec![Vec::new(); nbins]; sectors];

    for c in 0..n {
        let kx = k_axis[c];
        for r in 0..n {
            let ky = k_axis[r];
            let k = kx.hypot(ky);
            let Some(bin) = annulus_index(k, dk, nbins) else {
                continue;
            };

            let logp = opts.power * spec.get(r, c).norm().ln();
            if !logp.is_finite() {
                continue;
            }

            let sector = if sectors == 1 {
                0
            } else {
                let az = kx.atan2(ky).to_degrees().rem_euclid(180.0);
                ((az / sector_width) as usize).min(sectors - 1)
            };
            values[sector][bin].push((k, logp));
        }
    }

    let out: Vec<RadialSpectrum> = values.into_iter().map(summarise_bins).collect();
    debug!(
        "spectrum: n={n}, dk={dk:.4e}, bins={nbins}, sectors={sectors}, kept={}",
        out.iter().map(RadialSpectrum::len).sum::<usize>()
    );
    Ok(out)
}

/// Annulus index (0-based, starting at `j = 1`) for radial wavenumber `k`.
fn annulus_index(k: f64, dk: f64, nbins: usize) -> Option<usize> {
    let mut j = (k / dk).floor() as usize;
    // Guard the floor against rounding exactly at bin edges.
    if (j + 1) as f64 * dk <= k {
        j += 1;
    } else if j > 0 && j as f64 * dk > k {
        j -= 1;
    }
    if j == 0 || j > nbins {
        return None;
    }
    Some(j - 1)
}

fn summarise_bins(bins: Vec<Vec<(f64, f64)>>) -> RadialSpectrum {
    let mut k = Vec::with_capacity(bins.len());
    let mut phi = Vec::with_capacity(bins.len());
    let mut sigma = Vec::with_capacity(bins.len());

    for bin in bins {
        if bin.is_empty() {
            continue;
        }
        let count = bin.len() as f64;
        let k_mean = bin.iter().map(|(kk, _)| kk).sum::<f64>() / count;
        let mean = bin.iter().map(|(_, v)| v).sum::<f64>() / count;
        let var = bin.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / count;
        k.push(k_mean);
        phi.push(mean);
        sigma.push(var.sqrt());
    }

    RadialSpectrum { k, phi, sigma }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaperKind;
    use std::f64::consts::PI;

    fn plain() -> SpectrumOptions {
        SpectrumOptions {
            taper: TaperKind::None,
            detrend: Detrend::None,
            power: 2.0,
            scale: 0.001,
        }
    }

    #[test]
    fn bins_are_ordered_and_within_edges() {
        let n = 32;
        let data = DMatrix::from_fn(n, n, |r, c| ((r * 7 + c * 3) % 11) as f64 - 5.0);
        let spec = radial_spectrum(&data, 1000.0, &plain()).unwrap();

        let dk = 2.0 * PI / (n as f64 * 1.0);
        assert_eq!(spec.len(), n / 2 - 1);
        for (j, k) in spec.k.iter().enumerate() {
            let lo = (j + 1) as f64 * dk;
            assert!(*k >= lo - 1e-12 && *k < lo + dk, "bin {j}: k={k}");
        }
        for w in spec.k.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn plane_wave_stands_out_in_its_annulus() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use rand_distr::{Distribution, Normal};

        let n = 64;
        let cycles = 8.0;
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 1e-3).unwrap();
        let data = DMatrix::from_fn(n, n, |_, c| {
            (2.0 * PI * cycles * c as f64 / n as f64).sin() + noise.sample(&mut rng)
        });
        let spec = radial_spectrum(&data, 1000.0, &plain()).unwrap();

        // The two exact peaks sit in annulus j = 8 among a white-noise floor,
        // so that bin has by far the largest log-power scatter.
        let dk = 2.0 * PI / n as f64;
        let j = spec
            .k
            .iter()
            .position(|k| *k >= 8.0 * dk && *k < 9.0 * dk)
            .unwrap();
        let peak_bin = spec
            .sigma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, j);
    }

    #[test]
    fn rejects_non_square_window() {
        let data = DMatrix::from_element(8, 10, 1.0);
        let err = radial_spectrum(&data, 1.0, &plain()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn rejects_nan_window() {
        let mut data = DMatrix::from_element(8, 8, 1.0);
        data[(3, 3)] = f64::NAN;
        assert!(radial_spectrum(&data, 1.0, &plain()).is_err());
    }

    #[test]
    fn azimuthal_sectors_isolate_east_west_variation() {
        let n = 32;
        // Broadband profile varying along x only: all energy sits on ky = 0,
        // i.e. azimuth 90 degrees, inside the middle of three sectors.
        let data = DMatrix::from_fn(n, n, |_, c| {
            (1..16)
                .map(|m| (2.0 * PI * m as f64 * c as f64 / n as f64 + 0.3 * m as f64).cos() / m as f64)
                .sum::<f64>()
        });
        let sectors = azimuthal_spectrum(&data, 1000.0, &plain(), 3).unwrap();
        assert_eq!(sectors.len(), 3);
        assert!((sectors[0].azimuth_deg - 30.0).abs() < 1e-12);
        assert!((sectors[1].azimuth_deg - 90.0).abs() < 1e-12);

        let max_phi = |s: &AzimuthSector| s.spectrum.phi.iter().cloned().fold(f64::MIN, f64::max);
        let east = max_phi(&sectors[1]);
        assert!(east > max_phi(&sectors[0]) + 10.0);
        assert!(east > max_phi(&sectors[2]) + 10.0);
    }
}
