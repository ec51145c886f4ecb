//! Reporting utilities: per-bin residuals and depth-map statistics.

pub mod format;

pub use format::*;

use crate::domain::{CurieParams, DepthEstimate, RadialSpectrum};
use crate::error::AppError;
use crate::models::bouligand2009;

/// Observed vs modelled log-power in one spectral bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinResidual {
    pub k: f64,
    pub phi_obs: f64,
    pub phi_fit: f64,
    pub residual: f64,
    /// Residual in units of the bin's standard deviation.
    pub z: f64,
}

/// Summary of a depth map (successful windows only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapStats {
    pub n_windows: usize,
    pub n_failed: usize,
    pub depth_min: f64,
    pub depth_max: f64,
    pub depth_mean: f64,
}

/// Compute fitted values and residuals for each spectral bin.
pub fn spectrum_residuals(spectrum: &RadialSpectrum, params: &CurieParams) -> Result<Vec<BinResidual>, AppError> {
    let mut out = Vec::with_capacity(spectrum.len());
    for i in 0..spectrum.len() {
        let phi_fit = bouligand2009(spectrum.k[i], params.beta, params.zt, params.dz, params.c);
        if !phi_fit.is_finite() {
            return Err(AppError::numeric("Non-finite model prediction during residual computation."));
        }
        let residual = spectrum.phi[i] - phi_fit;
        out.push(BinResidual {
            k: spectrum.k[i],
            phi_obs: spectrum.phi[i],
            phi_fit,
            residual,
            z: residual / spectrum.sigma_floored(i),
        });
    }
    Ok(out)
}

/// Depth range and mean over the successful windows of a map.
///
/// `None` when no window succeeded.
pub fn depth_map_stats(estimates: &[DepthEstimate]) -> Option<MapStats> {
    let depths: Vec<f64> = estimates
        .iter()
        .filter_map(DepthEstimate::curie_depth)
        .filter(|d| d.is_finite())
        .collect();
    if depths.is_empty() {
        return None;
    }

    let (lo, hi) = depths
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &d| (lo.min(d), hi.max(d)));
    Some(MapStats {
        n_windows: estimates.len(),
        n_failed: estimates.len() - depths.len(),
        depth_min: lo,
        depth_max: hi,
        depth_mean: depths.iter().sum::<f64>() / depths.len() as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bouligand_spectrum;

    #[test]
    fn residuals_vanish_on_model_spectrum() {
        let params = CurieParams::new(3.0, 1.0, 20.0, 5.0);
        let k = vec![0.1, 0.2, 0.4];
        let phi = bouligand_spectrum(&k, &params);
        let spec = RadialSpectrum {
            k,
            phi,
            sigma: vec![0.5; 3],
        };
        let res = spectrum_residuals(&spec, &params).unwrap();
        assert!(res.iter().all(|r| r.residual.abs() < 1e-12 && r.z.abs() < 1e-11));
    }

    #[test]
    fn map_stats_skip_failures() {
        let ok = |xc: f64, dz: f64| DepthEstimate {
            xc,
            yc: 0.0,
            params: Some(CurieParams::new(3.0, 1.0, dz, 5.0)),
            misfit: Some(1.0),
            error: None,
        };
        let failed = DepthEstimate {
            xc: 9.0,
            yc: 0.0,
            params: None,
            misfit: None,
            error: Some("boom".into()),
        };
        let stats = depth_map_stats(&[ok(0.0, 19.0), failed, ok(1.0, 29.0)]).unwrap();
        assert_eq!(stats.n_windows, 3);
        assert_eq!(stats.n_failed, 1);
        assert_eq!(stats.depth_min, 20.0);
        assert_eq!(stats.depth_max, 30.0);
        assert!((stats.depth_mean - 25.0).abs() < 1e-12);
        assert!(depth_map_stats(&[]).is_none());
    }
}
