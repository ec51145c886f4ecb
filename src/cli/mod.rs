//! Command-line parsing for the Curie-depth tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the spectral/fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Detrend, InterpMethod, Param, TaperKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "curie", version, about = "Curie depth estimation from magnetic anomaly grids")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// TOML file with initial values, priors, bounds and spectrum options.
    #[arg(long, global = true, value_name = "TOML")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print (and optionally export) the radial spectrum of one window.
    Spectrum(SpectrumArgs),
    /// Fit the Bouligand model to one window.
    Fit(FitArgs),
    /// Fit every window on a centroid lattice and export a depth map.
    Map(MapArgs),
    /// Tanaka (1999) centroid depths for one window or a saved spectrum.
    Tanaka(TanakaArgs),
    /// Metropolis-Hastings sampling of the posterior for one window.
    Mcmc(McmcArgs),
    /// Refit one window under spectrum and prior perturbations.
    Sensitivity(SensitivityArgs),
    /// Write a synthetic anomaly grid with a Bouligand spectrum.
    Synth(SynthArgs),
    /// Interpolate scattered points (e.g. a depth-map CSV) onto a regular grid.
    Regrid(RegridArgs),
}

/// Input grid and preprocessing options shared by grid-based commands.
#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// ESRI ASCII grid of the magnetic anomaly (projected coordinates, metres).
    #[arg(long, value_name = "ASC")]
    pub grid: PathBuf,

    /// Window taper applied before the FFT.
    #[arg(long, value_enum)]
    pub taper: Option<TaperKind>,

    /// Trend removed from each window.
    #[arg(long, value_enum)]
    pub detrend: Option<Detrend>,

    /// Exponent applied to FFT amplitudes (2 = power).
    #[arg(long)]
    pub power: Option<f64>,

    /// Coordinate-to-wavenumber length factor (0.001 for metres -> km).
    #[arg(long)]
    pub scale: Option<f64>,

    /// Upward-continue the grid by this height (coordinate units) first.
    #[arg(long, value_name = "H")]
    pub upward: Option<f64>,

    /// Reduce to the pole with this field inclination (degrees).
    #[arg(long, requires = "rtp_dec", allow_negative_numbers = true)]
    pub rtp_inc: Option<f64>,

    /// Field declination (degrees) for reduction to the pole.
    #[arg(long, requires = "rtp_inc", allow_negative_numbers = true)]
    pub rtp_dec: Option<f64>,
}

/// A single analysis window.
#[derive(Debug, Args, Clone)]
pub struct WindowArgs {
    /// Window size (coordinate units).
    #[arg(long)]
    pub window: f64,

    /// Window centre x; defaults to the grid centre.
    #[arg(long, allow_negative_numbers = true)]
    pub xc: Option<f64>,

    /// Window centre y; defaults to the grid centre.
    #[arg(long, allow_negative_numbers = true)]
    pub yc: Option<f64>,
}

/// Starting values, priors and bounds for the Bouligand fit.
#[derive(Debug, Args, Clone, Default)]
pub struct ModelArgs {
    /// Initial fractal exponent.
    #[arg(long)]
    pub beta: Option<f64>,

    /// Initial top depth (km).
    #[arg(long)]
    pub zt: Option<f64>,

    /// Initial layer thickness (km).
    #[arg(long)]
    pub dz: Option<f64>,

    /// Initial spectral level.
    #[arg(long = "c", allow_negative_numbers = true)]
    pub c: Option<f64>,

    /// Gaussian prior as `PARAM:MU:SIGMA` (repeatable), e.g. `beta:3:0.5`.
    #[arg(long = "prior", value_parser = parse_prior, allow_negative_numbers = true)]
    pub priors: Vec<(Param, f64, f64)>,

    /// Bounds as `PARAM:LOWER:UPPER` (repeatable), e.g. `dz:1:80`.
    #[arg(long = "bound", value_parser = parse_bound, allow_negative_numbers = true)]
    pub bounds: Vec<(Param, f64, f64)>,

    /// Fix a parameter as `PARAM:VALUE` (repeatable), e.g. `beta:3`.
    #[arg(long = "fix", value_parser = parse_fix, allow_negative_numbers = true)]
    pub fixed: Vec<(Param, f64)>,

    /// Iteration cap for each window fit.
    #[arg(long)]
    pub max_iter: Option<usize>,
}

#[derive(Debug, Parser, Clone)]
pub struct SpectrumArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Split the spectrum into this many azimuth sectors.
    #[arg(long)]
    pub sectors: Option<usize>,

    /// Export the radial spectrum to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Print observed vs modelled spectrum.
    #[arg(long)]
    pub show_spectrum: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct MapArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Window size (coordinate units).
    #[arg(long)]
    pub window: f64,

    /// Centroid spacing in x; defaults to half the window.
    #[arg(long)]
    pub spacing_x: Option<f64>,

    /// Centroid spacing in y; defaults to half the window.
    #[arg(long)]
    pub spacing_y: Option<f64>,

    /// Export per-window results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the full run (options + estimates) to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Suppress the per-window table.
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct TanakaArgs {
    /// ESRI ASCII grid to take the window from.
    #[arg(long, value_name = "ASC", required_unless_present = "spectrum", requires = "window")]
    pub grid: Option<PathBuf>,

    /// Window size (coordinate units).
    #[arg(long)]
    pub window: Option<f64>,

    /// Window centre x; defaults to the grid centre.
    #[arg(long, allow_negative_numbers = true)]
    pub xc: Option<f64>,

    /// Window centre y; defaults to the grid centre.
    #[arg(long, allow_negative_numbers = true)]
    pub yc: Option<f64>,

    /// Use a spectrum CSV (`k,phi,sigma`) instead of a grid window.
    #[arg(long, value_name = "CSV", conflicts_with = "grid")]
    pub spectrum: Option<PathBuf>,

    /// Lower wavenumber of the top-depth range (rad/km).
    #[arg(long)]
    pub top_kmin: f64,

    /// Upper wavenumber of the top-depth range (rad/km).
    #[arg(long)]
    pub top_kmax: f64,

    /// Lower wavenumber of the centroid range (rad/km).
    #[arg(long)]
    pub centroid_kmin: f64,

    /// Upper wavenumber of the centroid range (rad/km).
    #[arg(long)]
    pub centroid_kmax: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct McmcArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of post-burn-in samples.
    #[arg(long, default_value_t = 5000)]
    pub nsim: usize,

    /// Number of burn-in steps.
    #[arg(long, default_value_t = 1000)]
    pub burnin: usize,

    /// Proposal standard deviations `beta,zt,dz,c`.
    #[arg(long, value_delimiter = ',', num_args = 4, default_values_t = [0.05, 0.05, 1.0, 0.1])]
    pub scale: Vec<f64>,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write the chain (one row per sample) to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SensitivityArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of perturbed refits.
    #[arg(long, default_value_t = 100)]
    pub nsim: usize,

    /// Base random seed (simulation `i` uses `seed + i`).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    #[arg(long, default_value_t = 3.0)]
    pub beta: f64,

    #[arg(long, default_value_t = 1.0)]
    pub zt: f64,

    #[arg(long, default_value_t = 20.0)]
    pub dz: f64,

    #[arg(long = "c", default_value_t = 5.0, allow_negative_numbers = true)]
    pub c: f64,

    /// Nodes per side.
    #[arg(long, default_value_t = 256)]
    pub size: usize,

    /// Node spacing (metres).
    #[arg(long, default_value_t = 1000.0)]
    pub spacing: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output ESRI ASCII grid.
    #[arg(long, value_name = "ASC")]
    pub out: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct RegridArgs {
    /// Scattered points: an `x,y,z` CSV, a depth-map CSV or a results `.json`.
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output ESRI ASCII grid.
    #[arg(long, value_name = "ASC")]
    pub out: PathBuf,

    /// Output nodes in x; the row count follows from square cells.
    #[arg(long, default_value_t = 100)]
    pub nx: usize,

    #[arg(long, value_enum, default_value_t = InterpMethod::Idw)]
    pub method: InterpMethod,

    /// Nodes farther than this from every point are left empty.
    #[arg(long)]
    pub max_distance: Option<f64>,

    /// CRS of the input points, e.g. EPSG:32633.
    #[arg(long)]
    pub from: Option<String>,

    /// CRS of the output grid (requires `--from`).
    #[arg(long, requires = "from")]
    pub to: Option<String>,

    /// Crop empty border rows/columns before writing.
    #[arg(long)]
    pub trim: bool,
}

fn parse_param(s: &str) -> Result<Param, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "beta" => Ok(Param::Beta),
        "zt" => Ok(Param::Zt),
        "dz" => Ok(Param::Dz),
        "c" => Ok(Param::C),
        other => Err(format!("unknown parameter '{other}' (expected beta, zt, dz or c)")),
    }
}

fn parse_number(s: &str) -> Result<f64, String> {
    let t = s.trim();
    match t.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        _ => t.parse().map_err(|_| format!("invalid number '{t}'")),
    }
}

fn parse_triple(s: &str, what: &str) -> Result<(Param, f64, f64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [p, a, b] = parts.as_slice() else {
        return Err(format!("expected {what} as PARAM:A:B, got '{s}'"));
    };
    Ok((parse_param(p)?, parse_number(a)?, parse_number(b)?))
}

fn parse_prior(s: &str) -> Result<(Param, f64, f64), String> {
    parse_triple(s, "prior")
}

fn parse_bound(s: &str) -> Result<(Param, f64, f64), String> {
    parse_triple(s, "bound")
}

fn parse_fix(s: &str) -> Result<(Param, f64), String> {
    let Some((p, v)) = s.split_once(':') else {
        return Err(format!("expected PARAM:VALUE, got '{s}'"));
    };
    Ok((parse_param(p)?, parse_number(v)?))
}
