//! Uncertainty estimates around a window fit.
//!
//! - `metropolis_hastings`: random-walk sampling of the posterior
//!   `exp(−min_func)` inside the parameter box
//! - `sensitivity`: repeated fits of noise-perturbed spectra and prior means
//!
//! Both are deterministic for a given seed.

use log::{debug, info, warn};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::domain::{CurieParams, ParamSummary, Prior, Priors, RadialSpectrum};
use crate::error::AppError;
use crate::fit::optimise::CurieOptimise;

/// Post-burn-in samples of one MCMC run.
#[derive(Debug, Clone, PartialEq)]
pub struct McmcChain {
    pub samples: Vec<CurieParams>,
    /// Fraction of post-burn-in proposals that were accepted.
    pub acceptance_rate: f64,
}

impl McmcChain {
    pub fn summary(&self) -> Option<ParamSummary> {
        ParamSummary::from_samples(&self.samples)
    }
}

impl ParamSummary {
    /// Mean and sample standard deviation of each parameter.
    ///
    /// `None` for an empty sample set. A single sample has zero spread.
    pub fn from_samples(samples: &[CurieParams]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len();

        let mut mean = [0.0; 4];
        for s in samples {
            for (m, v) in mean.iter_mut().zip(s.to_array()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }

        let mut var = [0.0; 4];
        if n > 1 {
            for s in samples {
                for (i, v) in s.to_array().into_iter().enumerate() {
                    var[i] += (v - mean[i]).powi(2);
                }
            }
            for v in var.iter_mut() {
                *v /= (n - 1) as f64;
            }
        }

        Some(Self {
            n,
            mean: CurieParams::from_slice(&mean),
            std: CurieParams::from_slice(&var.map(f64::sqrt)),
        })
    }
}

/// Controls for a Metropolis-Hastings run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McmcOptions {
    /// Number of post-burn-in samples kept.
    pub nsim: usize,
    pub burnin: usize,
    /// Proposal standard deviation per parameter `[beta, zt, dz, c]`.
    pub x_scale: [f64; 4],
    pub seed: u64,
}

impl Default for McmcOptions {
    fn default() -> Self {
        Self {
            nsim: 5000,
            burnin: 1000,
            x_scale: [0.05, 0.05, 1.0, 0.1],
            seed: 42,
        }
    }
}

impl CurieOptimise {
    /// Random-walk Metropolis-Hastings on the window centred at `(xc, yc)`.
    ///
    /// Proposals add `N(0, x_scale[i])` to each parameter; a zero scale keeps
    /// that parameter fixed. Proposals outside the bounds are rejected.
    pub fn metropolis_hastings(
        &self,
        window: f64,
        xc: f64,
        yc: f64,
        initial: &CurieParams,
        opts: &McmcOptions,
    ) -> Result<McmcChain, AppError> {
        let spectrum = self.window_spectrum(window, xc, yc)?;
        self.metropolis_hastings_spectrum(&spectrum, initial, opts)
    }

    /// `metropolis_hastings` on an already computed spectrum.
    pub fn metropolis_hastings_spectrum(
        &self,
        spectrum: &RadialSpectrum,
        initial: &CurieParams,
        opts: &McmcOptions,
    ) -> Result<McmcChain, AppError> {
        let McmcOptions {
            nsim,
            burnin,
            x_scale,
            seed,
        } = *opts;
        if nsim == 0 {
            return Err(AppError::input("MCMC needs at least one sample (nsim > 0)."));
        }
        if x_scale.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(AppError::input(format!(
                "Invalid proposal scales {x_scale:?} (must be finite and >=0)."
            )));
        }

        let mut x0 = initial.to_array();
        self.bounds().clamp(&mut x0);
        let mut p0 = self.min_func(&CurieParams::from_slice(&x0), spectrum);
        if !p0.is_finite() {
            return Err(AppError::numeric(format!(
                "Posterior is not finite at the starting point {x0:?}."
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut samples = Vec::with_capacity(nsim);
        let mut accepted = 0usize;

        for step in 0..burnin + nsim {
            let mut x1 = x0;
            for (v, s) in x1.iter_mut().zip(x_scale) {
                let z: f64 = rng.sample(StandardNormal);
                *v += s * z;
            }

            let mut accept = false;
            if self.bounds().contains(&x1) {
                let p1 = self.min_func(&CurieParams::from_slice(&x1), spectrum);
                if p1.is_finite() {
                    let u: f64 = rng.gen_range(0.0..1.0);
                    accept = p1 <= p0 || u < (p0 - p1).exp();
                }
                if accept {
                    x0 = x1;
                    p0 = p1;
                }
            }

            if step >= burnin {
                if accept {
                    accepted += 1;
                }
                samples.push(CurieParams::from_slice(&x0));
            }
        }

        let acceptance_rate = accepted as f64 / nsim as f64;
        info!("mcmc: {nsim} samples after {burnin} burn-in, acceptance {acceptance_rate:.3}");
        Ok(McmcChain {
            samples,
            acceptance_rate,
        })
    }

    /// Refit the window `nsim` times under random perturbations.
    ///
    /// Simulation `i` draws from its own RNG seeded with `seed + i`, adds
    /// `N(0, σ_j)` to each spectral bin and `N(0, σ_prior)` to each prior
    /// mean, then refits. Failed simulations are skipped with a warning.
    pub fn sensitivity(
        &self,
        window: f64,
        xc: f64,
        yc: f64,
        initial: &CurieParams,
        nsim: usize,
        seed: u64,
    ) -> Result<Vec<CurieParams>, AppError> {
        let spectrum = self.window_spectrum(window, xc, yc)?;
        self.sensitivity_spectrum(&spectrum, initial, nsim, seed)
    }

    /// `sensitivity` on an already computed spectrum.
    pub fn sensitivity_spectrum(
        &self,
        spectrum: &RadialSpectrum,
        initial: &CurieParams,
        nsim: usize,
        seed: u64,
    ) -> Result<Vec<CurieParams>, AppError> {
        if nsim == 0 {
            return Err(AppError::input("Sensitivity analysis needs nsim > 0."));
        }

        let results: Vec<Result<CurieParams, AppError>> = (0..nsim)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let perturbed = perturb_spectrum(spectrum, &mut rng);
                let priors = perturb_priors(self.priors(), &mut rng)?;
                self.optimise_with_priors(&perturbed, initial, &priors)
                    .map(|fit| fit.params)
            })
            .collect();

        let mut samples = Vec::with_capacity(nsim);
        for (i, r) in results.into_iter().enumerate() {
            match r {
                Ok(p) => samples.push(p),
                Err(e) => warn!("sensitivity simulation {i} failed: {e}"),
            }
        }

        if samples.is_empty() {
            return Err(AppError::numeric(format!("All {nsim} sensitivity simulations failed.")));
        }
        debug!("sensitivity: {} of {nsim} simulations succeeded", samples.len());
        Ok(samples)
    }
}

fn perturb_spectrum(spectrum: &RadialSpectrum, rng: &mut StdRng) -> RadialSpectrum {
    let phi = spectrum
        .phi
        .iter()
        .zip(spectrum.sigma.iter())
        .map(|(phi, sigma)| {
            let z: f64 = rng.sample(StandardNormal);
            let s = if sigma.is_finite() { *sigma } else { 0.0 };
            phi + s * z
        })
        .collect();
    RadialSpectrum {
        k: spectrum.k.clone(),
        phi,
        sigma: spectrum.sigma.clone(),
    }
}

fn perturb_priors(priors: &Priors, rng: &mut StdRng) -> Result<Priors, AppError> {
    let mut out = *priors;
    for (param, prior) in priors.iter() {
        let z: f64 = rng.sample(StandardNormal);
        out.set(param, Some(Prior::new(prior.mu + prior.sigma * z, prior.sigma)?));
    }
    Ok(out)
}
