//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the grid, model and optimiser layers
//! - exported to JSON/CSV
//! - reloaded later for reporting or comparisons

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Node-centred bounds of a regular grid, in projected units (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Extent {
    /// Validated constructor: all bounds finite, `max > min` on both axes.
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self, AppError> {
        let finite = [xmin, xmax, ymin, ymax].iter().all(|v| v.is_finite());
        if !finite || xmax <= xmin || ymax <= ymin {
            return Err(AppError::input(format!(
                "Invalid extent: x=[{xmin}, {xmax}], y=[{ymin}, {ymax}] (must be finite with max>min)."
            )));
        }
        Ok(Self {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Window taper applied before the 2-D FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaperKind {
    None,
    Hann,
    Hamming,
    Blackman,
}

/// Trend removal applied to a window before tapering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Detrend {
    /// Leave the window untouched.
    None,
    /// Subtract the window mean.
    Mean,
    /// Subtract the least-squares plane.
    Linear,
}

/// Scattered-point interpolation used by `mapping::grid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InterpMethod {
    /// Value of the closest input point.
    Nearest,
    /// Inverse-distance weighting.
    Idw,
}

/// Options controlling how a window is turned into a radial spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumOptions {
    pub taper: TaperKind,
    pub detrend: Detrend,
    /// Exponent applied to the FFT amplitude (`2.0` gives power).
    pub power: f64,
    /// Factor converting coordinate units to the wavenumber length unit.
    ///
    /// The default `0.001` turns metres into kilometres, so wavenumbers are
    /// reported in rad/km and depths come out in km.
    pub scale: f64,
}

impl Default for SpectrumOptions {
    fn default() -> Self {
        Self {
            taper: TaperKind::Hann,
            detrend: Detrend::Linear,
            power: 2.0,
            scale: 0.001,
        }
    }
}

/// Lower bound on per-bin spectral standard deviations used as fit weights.
pub const SIGMA_FLOOR: f64 = 1e-3;

/// Binned radial power spectrum of a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialSpectrum {
    /// Mean radial wavenumber of each annulus (rad per scaled unit).
    pub k: Vec<f64>,
    /// Mean of `ln(|F|^power)` over each annulus.
    pub phi: Vec<f64>,
    /// Standard deviation of `ln(|F|^power)` over each annulus.
    pub sigma: Vec<f64>,
}

impl RadialSpectrum {
    pub fn len(&self) -> usize {
        self.k.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }

    /// Standard deviation of bin `i`, floored at `SIGMA_FLOOR`.
    ///
    /// Single-cell bins have zero scatter and would otherwise get infinite
    /// weight in a fit.
    pub fn sigma_floored(&self, i: usize) -> f64 {
        let s = self.sigma[i];
        if s.is_finite() && s > SIGMA_FLOOR { s } else { SIGMA_FLOOR }
    }

    /// Indices of bins with `kmin <= k <= kmax`.
    pub fn indices_in_range(&self, kmin: f64, kmax: f64) -> Vec<usize> {
        self.k
            .iter()
            .enumerate()
            .filter(|(_, k)| **k >= kmin && **k <= kmax)
            .map(|(i, _)| i)
            .collect()
    }
}

/// One azimuth sector of an azimuthal spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzimuthSector {
    /// Sector centre, degrees clockwise from north in [0, 180).
    pub azimuth_deg: f64,
    pub spectrum: RadialSpectrum,
}

/// Parameters of the Bouligand et al. (2009) model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurieParams {
    /// Fractal exponent of the magnetisation.
    pub beta: f64,
    /// Depth to the top of the magnetic layer (km).
    pub zt: f64,
    /// Thickness of the magnetic layer (km).
    pub dz: f64,
    /// Spectral level constant.
    pub c: f64,
}

impl CurieParams {
    pub fn new(beta: f64, zt: f64, dz: f64, c: f64) -> Self {
        Self { beta, zt, dz, c }
    }

    /// Depth to the base of the magnetic layer.
    pub fn curie_depth(&self) -> f64 {
        self.zt + self.dz
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.beta, self.zt, self.dz, self.c]
    }

    pub fn from_slice(x: &[f64]) -> Self {
        Self {
            beta: x[0],
            zt: x[1],
            dz: x[2],
            c: x[3],
        }
    }

    pub fn get(&self, param: Param) -> f64 {
        self.to_array()[param.index()]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl Default for CurieParams {
    fn default() -> Self {
        Self {
            beta: 3.0,
            zt: 1.0,
            dz: 20.0,
            c: 5.0,
        }
    }
}

/// Names of the four Bouligand parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Param {
    Beta,
    Zt,
    Dz,
    C,
}

impl Param {
    pub const ALL: [Param; 4] = [Param::Beta, Param::Zt, Param::Dz, Param::C];

    pub fn index(self) -> usize {
        match self {
            Param::Beta => 0,
            Param::Zt => 1,
            Param::Dz => 2,
            Param::C => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Param::Beta => "beta",
            Param::Zt => "zt",
            Param::Dz => "dz",
            Param::C => "C",
        }
    }
}

/// Gaussian prior on one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub mu: f64,
    pub sigma: f64,
}

impl Prior {
    pub fn new(mu: f64, sigma: f64) -> Result<Self, AppError> {
        if !(mu.is_finite() && sigma.is_finite() && sigma > 0.0) {
            return Err(AppError::input(format!(
                "Invalid prior: mu={mu}, sigma={sigma} (sigma must be finite and >0)."
            )));
        }
        Ok(Self { mu, sigma })
    }

    /// Negative log-density up to a constant: `½((x-μ)/σ)²`.
    pub fn penalty(&self, x: f64) -> f64 {
        let z = (x - self.mu) / self.sigma;
        0.5 * z * z
    }
}

/// Optional prior per parameter, indexed by `Param::index`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Priors {
    slots: [Option<Prior>; 4],
}

impl Priors {
    pub fn get(&self, param: Param) -> Option<Prior> {
        self.slots[param.index()]
    }

    pub fn set(&mut self, param: Param, prior: Option<Prior>) {
        self.slots[param.index()] = prior;
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Set priors in `(param, prior)` order.
    pub fn iter(&self) -> impl Iterator<Item = (Param, Prior)> + '_ {
        Param::ALL
            .into_iter()
            .filter_map(|p| self.slots[p.index()].map(|prior| (p, prior)))
    }
}

/// Box constraints on the parameter vector `[beta, zt, dz, c]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBounds {
    pub lower: [f64; 4],
    pub upper: [f64; 4],
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            lower: [0.0, 0.0, 1e-3, f64::NEG_INFINITY],
            upper: [f64::INFINITY; 4],
        }
    }
}

impl ParamBounds {
    pub fn set(&mut self, param: Param, lower: f64, upper: f64) -> Result<(), AppError> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(AppError::input(format!(
                "Invalid bounds for {}: [{lower}, {upper}].",
                param.name()
            )));
        }
        self.lower[param.index()] = lower;
        self.upper[param.index()] = upper;
        Ok(())
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    pub fn clamp(&self, x: &mut [f64]) {
        for (i, v) in x.iter_mut().enumerate() {
            *v = v.clamp(self.lower[i], self.upper[i]);
        }
    }
}

/// Outcome of fitting one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthEstimate {
    pub xc: f64,
    pub yc: f64,
    pub params: Option<CurieParams>,
    /// Objective value at the solution.
    pub misfit: Option<f64>,
    pub error: Option<String>,
}

impl DepthEstimate {
    pub fn curie_depth(&self) -> Option<f64> {
        self.params.map(|p| p.curie_depth())
    }
}

/// Tanaka et al. (1999) depths with one-sigma errors (km).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TanakaDepths {
    pub zt: f64,
    pub zt_err: f64,
    pub zo: f64,
    pub zo_err: f64,
}

/// Per-parameter mean and standard deviation of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamSummary {
    pub n: usize,
    pub mean: CurieParams,
    pub std: CurieParams,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, optionally layered over a TOML file.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub grid_path: PathBuf,
    /// Upward-continuation height applied to the whole grid before analysis.
    pub upward_height: Option<f64>,
    /// Field `(inclination, declination)` for reduction to the pole, degrees.
    pub reduce_to_pole: Option<(f64, f64)>,
    pub window: f64,
    pub spacing_x: Option<f64>,
    pub spacing_y: Option<f64>,
    pub spectrum: SpectrumOptions,
    pub initial: CurieParams,
    pub priors: Priors,
    pub bounds: ParamBounds,
    /// Iteration cap for the minimiser; `None` keeps its default.
    pub max_iter: Option<usize>,
    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// A saved depth-map file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub window: f64,
    pub spectrum: SpectrumOptions,
    pub estimates: Vec<DepthEstimate>,
}
