//! `CurieOptimise`: fit the Bouligand model to window spectra.
//!
//! For each window we:
//!
//! - extract the subgrid centred on `(xc, yc)`
//! - compute its radial spectrum
//! - minimise the weighted misfit plus Gaussian prior penalties over the
//!   parameter box `[beta, zt, dz, c]`
//!
//! Windows are independent, so `optimise_routine` fits them in parallel.

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::domain::{CurieParams, DepthEstimate, Param, ParamBounds, Prior, Priors, RadialSpectrum, SpectrumOptions};
use crate::error::AppError;
use crate::grid::CurieGrid;
use crate::math::{minimize_bounded, MinimizeOptions};
use crate::models::bouligand2009;

/// Fewest spectral bins that can constrain the four parameters.
const MIN_SPECTRUM_BINS: usize = 4;

/// Best-fit parameters for one spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct CurieFit {
    pub params: CurieParams,
    /// Objective value at `params`.
    pub misfit: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct CurieOptimise {
    grid: CurieGrid,
    bounds: ParamBounds,
    priors: Priors,
    spectrum_opts: SpectrumOptions,
    minimize_opts: MinimizeOptions,
}

impl CurieOptimise {
    pub fn new(grid: CurieGrid) -> Self {
        Self {
            grid,
            bounds: ParamBounds::default(),
            priors: Priors::default(),
            spectrum_opts: SpectrumOptions::default(),
            minimize_opts: MinimizeOptions::default(),
        }
    }

    pub fn with_spectrum_options(mut self, opts: SpectrumOptions) -> Self {
        self.spectrum_opts = opts;
        self
    }

    pub fn with_minimize_options(mut self, opts: MinimizeOptions) -> Self {
        self.minimize_opts = opts;
        self
    }

    pub fn grid(&self) -> &CurieGrid {
        &self.grid
    }

    pub fn bounds(&self) -> &ParamBounds {
        &self.bounds
    }

    pub fn priors(&self) -> &Priors {
        &self.priors
    }

    pub fn spectrum_options(&self) -> &SpectrumOptions {
        &self.spectrum_opts
    }

    /// Add (or replace) a Gaussian prior on `param`.
    pub fn add_prior(&mut self, param: Param, prior: Prior) {
        debug!("prior {}: mu={}, sigma={}", param.name(), prior.mu, prior.sigma);
        self.priors.set(param, Some(prior));
    }

    /// Replace all priors at once.
    pub fn set_priors(&mut self, priors: Priors) {
        self.priors = priors;
    }

    pub fn reset_priors(&mut self) {
        self.priors = Priors::default();
    }

    /// Constrain `param` to `[lower, upper]`; equal bounds fix the parameter.
    pub fn set_bounds(&mut self, param: Param, lower: f64, upper: f64) -> Result<(), AppError> {
        self.bounds.set(param, lower, upper)
    }

    pub fn replace_bounds(&mut self, bounds: ParamBounds) {
        self.bounds = bounds;
    }

    /// Sum of prior penalties `½((x−μ)/σ)²` at `params`.
    pub fn objective_routine(&self, params: &CurieParams) -> f64 {
        prior_penalty(&self.priors, params)
    }

    /// Weighted spectral misfit plus prior penalties.
    ///
    /// `+∞` wherever the model cannot be evaluated.
    pub fn min_func(&self, params: &CurieParams, spectrum: &RadialSpectrum) -> f64 {
        misfit(params, spectrum, &self.priors)
    }

    /// Radial spectrum of the window centred on `(xc, yc)`.
    pub fn window_spectrum(&self, window: f64, xc: f64, yc: f64) -> Result<RadialSpectrum, AppError> {
        let sub = self.grid.subgrid(window, xc, yc)?;
        self.grid.radial_spectrum(&sub, &self.spectrum_opts)
    }

    /// Fit one window.
    pub fn optimise(&self, window: f64, xc: f64, yc: f64, initial: &CurieParams) -> Result<CurieFit, AppError> {
        let spectrum = self.window_spectrum(window, xc, yc)?;
        self.optimise_spectrum(&spectrum, initial)
    }

    /// Fit an already computed spectrum.
    pub fn optimise_spectrum(&self, spectrum: &RadialSpectrum, initial: &CurieParams) -> Result<CurieFit, AppError> {
        self.optimise_with_priors(spectrum, initial, &self.priors)
    }

    /// Fit every centroid in parallel.
    ///
    /// Output order matches `centroids`. A window that cannot be fitted keeps
    /// its error message instead of aborting the map.
    pub fn optimise_routine(
        &self,
        window: f64,
        centroids: &[(f64, f64)],
        initial: &CurieParams,
    ) -> Vec<DepthEstimate> {
        info!("fitting {} windows of size {window}", centroids.len());

        let estimates: Vec<DepthEstimate> = centroids
            .par_iter()
            .map(|&(xc, yc)| match self.optimise(window, xc, yc, initial) {
                Ok(fit) => DepthEstimate {
                    xc,
                    yc,
                    params: Some(fit.params),
                    misfit: Some(fit.misfit),
                    error: None,
                },
                Err(e) => {
                    warn!("window ({xc:.1}, {yc:.1}): {e}");
                    DepthEstimate {
                        xc,
                        yc,
                        params: None,
                        misfit: None,
                        error: Some(e.message().to_string()),
                    }
                }
            })
            .collect();

        let failed = estimates.iter().filter(|e| e.error.is_some()).count();
        if failed > 0 {
            warn!("{failed} of {} windows failed", estimates.len());
        }
        estimates
    }

    pub(crate) fn optimise_with_priors(
        &self,
        spectrum: &RadialSpectrum,
        initial: &CurieParams,
        priors: &Priors,
    ) -> Result<CurieFit, AppError> {
        if spectrum.len() < MIN_SPECTRUM_BINS {
            return Err(AppError::data(format!(
                "Spectrum has {} bins (need at least {MIN_SPECTRUM_BINS}); use a larger window.",
                spectrum.len()
            )));
        }
        if !initial.is_finite() {
            return Err(AppError::input(format!("Initial parameters are not finite: {initial:?}.")));
        }

        let objective = |x: &[f64]| misfit(&CurieParams::from_slice(x), spectrum, priors);
        let min = minimize_bounded(
            objective,
            &initial.to_array(),
            &self.bounds.lower,
            &self.bounds.upper,
            &self.minimize_opts,
        )?;

        if !min.converged {
            debug!("optimiser stopped after {} iterations without converging", min.iterations);
        }

        Ok(CurieFit {
            params: CurieParams::from_slice(&min.x),
            misfit: min.f,
            iterations: min.iterations,
            converged: min.converged,
        })
    }
}

pub(crate) fn prior_penalty(priors: &Priors, params: &CurieParams) -> f64 {
    priors
        .iter()
        .map(|(param, prior)| prior.penalty(params.get(param)))
        .sum()
}

pub(crate) fn misfit(params: &CurieParams, spectrum: &RadialSpectrum, priors: &Priors) -> f64 {
    let mut total = 0.0;
    for i in 0..spectrum.len() {
        let model = bouligand2009(spectrum.k[i], params.beta, params.zt, params.dz, params.c);
        if !model.is_finite() {
            return f64::INFINITY;
        }
        let r = (spectrum.phi[i] - model) / spectrum.sigma_floored(i);
        total += 0.5 * r * r;
    }
    total + prior_penalty(priors, params)
}

/// A small pseudo-random grid for tests that only need a valid `CurieGrid`.
#[cfg(test)]
pub(crate) fn test_grid(n: usize, dx: f64) -> CurieGrid {
    use crate::domain::Extent;
    use nalgebra::DMatrix;

    let data = DMatrix::from_fn(n, n, |r, c| {
        let v = ((r * 7919 + c * 104_729) % 1013) as f64;
        v / 1013.0 + (r as f64 * 0.2).sin() + (c as f64 * 0.13).cos()
    });
    let side = (n - 1) as f64 * dx;
    let extent = Extent::new(0.0, side, 0.0, side).unwrap();
    CurieGrid::new(data, extent).unwrap()
}
