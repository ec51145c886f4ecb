//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - layers the optional TOML config under the CLI flags
//! - runs spectra, fits, maps and samplers
//! - prints reports and writes optional exports

use clap::Parser;
use log::{info, warn};

use crate::cli::{
    Cli, Command, FitArgs, GridArgs, MapArgs, McmcArgs, ModelArgs, RegridArgs, SensitivityArgs, SpectrumArgs,
    SynthArgs, TanakaArgs, WindowArgs,
};
use crate::domain::{CurieParams, FitConfig, ParamBounds, ParamSummary, Prior, Priors, SpectrumOptions};
use crate::error::AppError;
use crate::fit::McmcOptions;
use crate::grid::CurieGrid;
use crate::io::FileConfig;
use crate::mapping::Crs;

pub mod pipeline;

/// Entry point for the `curie` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file = cli.config.as_deref().map(crate::io::load_config).transpose()?;
    let file = file.as_ref();

    match cli.command {
        Command::Spectrum(args) => handle_spectrum(args, file),
        Command::Fit(args) => handle_fit(args, file),
        Command::Map(args) => handle_map(args, file),
        Command::Tanaka(args) => handle_tanaka(args, file),
        Command::Mcmc(args) => handle_mcmc(args, file),
        Command::Sensitivity(args) => handle_sensitivity(args, file),
        Command::Synth(args) => handle_synth(args),
        Command::Regrid(args) => handle_regrid(args),
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the default `info` level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn handle_spectrum(args: SpectrumArgs, file: Option<&FileConfig>) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.grid, &ModelArgs::default(), args.window.window, file)?;
    let optimiser = pipeline::prepare(&config)?;
    let grid = optimiser.grid();
    let (xc, yc) = window_centre(grid, &args.window);

    println!("{}", crate::report::format_grid_summary(grid));
    let spectrum = optimiser.window_spectrum(config.window, xc, yc)?;
    println!("Radial spectrum at ({xc:.1}, {yc:.1}):");
    println!("{}", crate::report::format_spectrum(&spectrum, None));

    if let Some(sectors) = args.sectors {
        let sub = grid.subgrid(config.window, xc, yc)?;
        for sector in grid.azimuthal_spectrum(&sub, optimiser.spectrum_options(), sectors)? {
            println!("Azimuth {:.1}°:", sector.azimuth_deg);
            println!("{}", crate::report::format_spectrum(&sector.spectrum, None));
        }
    }

    if let Some(path) = &args.export {
        crate::io::write_spectrum_csv(path, &spectrum)?;
        info!("spectrum written to {}", path.display());
    }
    Ok(())
}

fn handle_fit(args: FitArgs, file: Option<&FileConfig>) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.grid, &args.model, args.window.window, file)?;
    let optimiser = pipeline::prepare(&config)?;
    let (xc, yc) = window_centre(optimiser.grid(), &args.window);

    let spectrum = optimiser.window_spectrum(config.window, xc, yc)?;
    let fit = optimiser.optimise_spectrum(&spectrum, &config.initial)?;
    if !fit.converged {
        warn!("minimiser stopped after {} iterations without converging", fit.iterations);
    }

    println!("{}", crate::report::format_grid_summary(optimiser.grid()));
    println!("{}", crate::report::format_fit(xc, yc, &fit, &config.priors));
    if args.show_spectrum {
        let residuals = crate::report::spectrum_residuals(&spectrum, &fit.params)?;
        println!("{}", crate::report::format_spectrum(&spectrum, Some(&residuals)));
    }
    Ok(())
}

fn handle_map(args: MapArgs, file: Option<&FileConfig>) -> Result<(), AppError> {
    let mut config = fit_config_from_args(&args.grid, &args.model, args.window, file)?;
    config.spacing_x = args.spacing_x;
    config.spacing_y = args.spacing_y;
    config.export_csv = args.export.clone();
    config.export_json = args.export_json.clone();

    let optimiser = pipeline::prepare(&config)?;
    let out = pipeline::run_map(&optimiser, &config)?;

    if args.quiet {
        if let Some(s) = &out.stats {
            println!(
                "Windows: {} ({} failed) | mean Curie depth {:.3} km",
                s.n_windows, s.n_failed, s.depth_mean
            );
        }
    } else {
        println!("{}", crate::report::format_depth_map(&out.estimates, out.stats.as_ref()));
    }

    if let Some(path) = &config.export_csv {
        crate::io::write_depth_map_csv(path, &out.estimates)?;
        info!("depth map written to {}", path.display());
    }
    if let Some(path) = &config.export_json {
        let results = crate::io::build_results(&config.grid_path, config.window, config.spectrum, out.estimates);
        crate::io::write_results_json(path, &results)?;
        info!("results written to {}", path.display());
    }

    if out.stats.is_none() {
        return Err(AppError::numeric("No window could be fitted."));
    }
    Ok(())
}

fn handle_tanaka(args: TanakaArgs, file: Option<&FileConfig>) -> Result<(), AppError> {
    let spectrum = match (&args.spectrum, &args.grid) {
        (Some(path), _) => crate::io::read_spectrum_csv(path)?,
        (None, Some(grid_path)) => {
            let window = args
                .window
                .ok_or_else(|| AppError::input("--window is required with --grid."))?;
            let grid_args = GridArgs {
                grid: grid_path.clone(),
                taper: None,
                detrend: None,
                power: None,
                scale: None,
                upward: None,
                rtp_inc: None,
                rtp_dec: None,
            };
            let config = fit_config_from_args(&grid_args, &ModelArgs::default(), window, file)?;
            let optimiser = pipeline::prepare(&config)?;
            let centre = WindowArgs {
                window,
                xc: args.xc,
                yc: args.yc,
            };
            let (xc, yc) = window_centre(optimiser.grid(), &centre);
            optimiser.window_spectrum(window, xc, yc)?
        }
        (None, None) => return Err(AppError::input("Provide --spectrum or --grid.")),
    };

    let depths = crate::models::tanaka1999(
        &spectrum,
        (args.top_kmin, args.top_kmax),
        (args.centroid_kmin, args.centroid_kmax),
    )?;
    let (zb, zb_err) = crate::models::compute_tanaka(depths.zt, depths.zt_err, depths.zo, depths.zo_err);
    println!("{}", crate::report::format_tanaka(&depths, zb, zb_err));
    Ok(())
}

fn handle_mcmc(args: McmcArgs, file: Option<&FileConfig>) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.grid, &args.model, args.window.window, file)?;
    let optimiser = pipeline::prepare(&config)?;
    let (xc, yc) = window_centre(optimiser.grid(), &args.window);

    let mut opts = McmcOptions {
        nsim: args.nsim,
        burnin: args.burnin,
        seed: args.seed,
        ..McmcOptions::default()
    };
    for (dst, src) in opts.x_scale.iter_mut().zip(&args.scale) {
        *dst = *src;
    }
    for (param, _) in &args.model.fixed {
        opts.x_scale[param.index()] = 0.0;
    }

    let chain = optimiser.metropolis_hastings(config.window, xc, yc, &config.initial, &opts)?;
    let summary = chain
        .summary()
        .ok_or_else(|| AppError::numeric("MCMC produced no samples."))?;
    println!(
        "{}",
        crate::report::format_summary("Posterior", &summary, Some(chain.acceptance_rate))
    );

    if let Some(path) = &args.export {
        crate::io::write_samples_csv(path, &chain.samples)?;
        info!("chain written to {}", path.display());
    }
    Ok(())
}

fn handle_sensitivity(args: SensitivityArgs, file: Option<&FileConfig>) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.grid, &args.model, args.window.window, file)?;
    let optimiser = pipeline::prepare(&config)?;
    let (xc, yc) = window_centre(optimiser.grid(), &args.window);

    let fits = optimiser.sensitivity(config.window, xc, yc, &config.initial, args.nsim, args.seed)?;
    let summary = ParamSummary::from_samples(&fits)
        .ok_or_else(|| AppError::numeric("Sensitivity analysis produced no fits."))?;
    println!("{}", crate::report::format_summary("Sensitivity", &summary, None));
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let params = CurieParams::new(args.beta, args.zt, args.dz, args.c);
    let grid = crate::data::synthetic_grid(&params, args.size, args.spacing, args.seed)?;
    crate::io::write_ascii_grid(&args.out, grid.data(), &grid.extent())?;
    println!("{}", crate::report::format_grid_summary(&grid));
    info!("synthetic grid written to {}", args.out.display());
    Ok(())
}

fn handle_regrid(args: RegridArgs) -> Result<(), AppError> {
    let is_json = args
        .input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let points = if is_json {
        let results = crate::io::read_results_json(&args.input)?;
        info!(
            "read {} windows from {} (window {})",
            results.estimates.len(),
            results.source,
            results.window
        );
        crate::io::depth_points(&results)
    } else {
        let xyz = crate::io::load_xyz_csv(&args.input)?;
        for err in &xyz.row_errors {
            warn!("{}: line {}: {}", args.input.display(), err.line, err.message);
        }
        info!("read {} points from {} rows", xyz.points.len(), xyz.rows_read);
        xyz.points
    };

    let crs = match (&args.from, &args.to) {
        (Some(from), Some(to)) => Some((Crs::parse(from)?, Crs::parse(to)?)),
        _ => None,
    };
    let opts = pipeline::RegridOptions {
        nx: args.nx,
        method: args.method,
        max_distance: args.max_distance,
        crs,
        trim: args.trim,
    };
    let (data, extent) = pipeline::regrid_points(&points, &opts)?;
    crate::io::write_ascii_grid(&args.out, &data, &extent)?;
    println!(
        "Wrote {}x{} grid to {} | x=[{:.1}, {:.1}] | y=[{:.1}, {:.1}]",
        data.nrows(),
        data.ncols(),
        args.out.display(),
        extent.xmin,
        extent.xmax,
        extent.ymin,
        extent.ymax
    );
    Ok(())
}

/// Requested window centre, defaulting to the grid centre.
fn window_centre(grid: &CurieGrid, args: &WindowArgs) -> (f64, f64) {
    let e = grid.extent();
    (
        args.xc.unwrap_or(0.5 * (e.xmin + e.xmax)),
        args.yc.unwrap_or(0.5 * (e.ymin + e.ymax)),
    )
}

/// Build a run configuration: defaults, then the TOML file, then CLI flags.
pub fn fit_config_from_args(
    grid: &GridArgs,
    model: &ModelArgs,
    window: f64,
    file: Option<&FileConfig>,
) -> Result<FitConfig, AppError> {
    let mut initial = CurieParams::default();
    let mut priors = Priors::default();
    let mut bounds = ParamBounds::default();
    let mut spectrum = SpectrumOptions::default();
    if let Some(file) = file {
        file.apply(&mut initial, &mut priors, &mut bounds, &mut spectrum)?;
    }

    if let Some(t) = grid.taper {
        spectrum.taper = t;
    }
    if let Some(d) = grid.detrend {
        spectrum.detrend = d;
    }
    if let Some(p) = grid.power {
        spectrum.power = p;
    }
    if let Some(s) = grid.scale {
        spectrum.scale = s;
    }

    let mut x = initial.to_array();
    for (i, v) in [model.beta, model.zt, model.dz, model.c].into_iter().enumerate() {
        if let Some(v) = v {
            x[i] = v;
        }
    }
    for &(param, value) in &model.fixed {
        x[param.index()] = value;
    }
    let initial = CurieParams::from_slice(&x);

    for &(param, mu, sigma) in &model.priors {
        priors.set(param, Some(Prior::new(mu, sigma)?));
    }
    for &(param, lo, hi) in &model.bounds {
        bounds.set(param, lo, hi)?;
    }
    let bounds = pipeline::pin_params(bounds, &model.fixed)?;
    if model.max_iter == Some(0) {
        return Err(AppError::input("--max-iter must be at least 1."));
    }

    Ok(FitConfig {
        grid_path: grid.grid.clone(),
        upward_height: grid.upward,
        reduce_to_pole: grid.rtp_inc.zip(grid.rtp_dec),
        window,
        spacing_x: None,
        spacing_y: None,
        spectrum,
        initial,
        priors,
        bounds,
        max_iter: model.max_iter,
        export_csv: None,
        export_json: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Detrend, Param, TaperKind};
    use std::path::PathBuf;

    fn grid_args() -> GridArgs {
        GridArgs {
            grid: PathBuf::from("g.asc"),
            taper: None,
            detrend: Some(Detrend::Mean),
            power: None,
            scale: None,
            upward: Some(500.0),
            rtp_inc: Some(60.0),
            rtp_dec: Some(5.0),
        }
    }

    #[test]
    fn cli_flags_override_config_file() {
        let file = crate::io::parse_config(
            r#"
            [initial]
            beta = 2.5
            zt = 2.0

            [priors]
            dz = { mu = 30.0, sigma = 5.0 }

            [spectrum]
            taper = "blackman"
            detrend = "linear"
            "#,
        )
        .unwrap();
        let model = ModelArgs {
            zt: Some(1.5),
            priors: vec![(Param::Beta, 3.0, 0.25)],
            fixed: vec![(Param::C, 4.0)],
            ..ModelArgs::default()
        };

        let cfg = fit_config_from_args(&grid_args(), &model, 40_000.0, Some(&file)).unwrap();
        assert_eq!(cfg.initial.beta, 2.5);
        assert_eq!(cfg.initial.zt, 1.5);
        assert_eq!(cfg.initial.c, 4.0);
        assert_eq!(cfg.priors.get(Param::Dz), Some(Prior { mu: 30.0, sigma: 5.0 }));
        assert_eq!(cfg.priors.get(Param::Beta), Some(Prior { mu: 3.0, sigma: 0.25 }));
        assert_eq!(cfg.bounds.lower[Param::C.index()], 4.0);
        assert_eq!(cfg.bounds.upper[Param::C.index()], 4.0);
        assert_eq!(cfg.spectrum.taper, TaperKind::Blackman);
        assert_eq!(cfg.spectrum.detrend, Detrend::Mean);
        assert_eq!(cfg.reduce_to_pole, Some((60.0, 5.0)));
        assert_eq!(cfg.upward_height, Some(500.0));
    }

    #[test]
    fn invalid_prior_sigma_is_rejected() {
        let model = ModelArgs {
            priors: vec![(Param::Zt, 1.0, -1.0)],
            ..ModelArgs::default()
        };
        let err = fit_config_from_args(&grid_args(), &model, 1.0, None).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn iteration_cap_flows_into_config() {
        let model = ModelArgs {
            max_iter: Some(25),
            ..ModelArgs::default()
        };
        let cfg = fit_config_from_args(&grid_args(), &model, 1.0, None).unwrap();
        assert_eq!(cfg.max_iter, Some(25));

        let zero = ModelArgs {
            max_iter: Some(0),
            ..ModelArgs::default()
        };
        let err = fit_config_from_args(&grid_args(), &zero, 1.0, None).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
