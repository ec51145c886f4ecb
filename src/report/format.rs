//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the spectral and fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{DepthEstimate, Param, ParamSummary, Priors, RadialSpectrum, TanakaDepths};
use crate::fit::CurieFit;
use crate::grid::CurieGrid;
use crate::report::{BinResidual, MapStats};

/// Grid dimensions, spacing and extent.
pub fn format_grid_summary(grid: &CurieGrid) -> String {
    let e = grid.extent();
    format!(
        "Grid: {}x{} nodes | dx={:.3} | x=[{:.1}, {:.1}] | y=[{:.1}, {:.1}]\n",
        grid.ny(),
        grid.nx(),
        grid.dx(),
        e.xmin,
        e.xmax,
        e.ymin,
        e.ymax
    )
}

/// Table of spectral bins, with model columns when residuals are supplied.
pub fn format_spectrum(spectrum: &RadialSpectrum, residuals: Option<&[BinResidual]>) -> String {
    let mut out = String::new();
    match residuals {
        Some(_) => out.push_str(&format!(
            "{:>10} {:>10} {:>8} {:>10} {:>8}\n",
            "k", "phi", "sigma", "model", "z"
        )),
        None => out.push_str(&format!("{:>10} {:>10} {:>8}\n", "k", "phi", "sigma")),
    }

    for i in 0..spectrum.len() {
        let base = format!(
            "{:>10.4} {:>10.4} {:>8.4}",
            spectrum.k[i], spectrum.phi[i], spectrum.sigma[i]
        );
        match residuals.and_then(|r| r.get(i)) {
            Some(r) => out.push_str(&format!("{base} {:>10.4} {:>8.2}\n", r.phi_fit, r.z)),
            None => {
                out.push_str(&base);
                out.push('\n');
            }
        }
    }
    out
}

/// Best-fit parameters for one window.
pub fn format_fit(xc: f64, yc: f64, fit: &CurieFit, priors: &Priors) -> String {
    let mut out = String::new();
    out.push_str(&format!("Window centre: ({xc:.1}, {yc:.1})\n"));
    for param in Param::ALL {
        let prior = priors
            .get(param)
            .map(|p| format!("  (prior {:.3} ± {:.3})", p.mu, p.sigma))
            .unwrap_or_default();
        out.push_str(&format!("- {:<5}: {:>10.4}{prior}\n", param.name(), fit.params.get(param)));
    }
    out.push_str(&format!("Curie depth: {:.3} km\n", fit.params.curie_depth()));
    out.push_str(&format!(
        "Misfit: {:.4} | iterations={} | converged={}\n",
        fit.misfit, fit.iterations, fit.converged
    ));
    out
}

/// Depth-map table and summary line.
pub fn format_depth_map(estimates: &[DepthEstimate], stats: Option<&MapStats>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>12} {:>12} {:>7} {:>7} {:>8} {:>8} {:>9}\n",
        "xc", "yc", "beta", "zt", "dz", "C", "depth"
    ));
    for est in estimates {
        match (&est.params, &est.error) {
            (Some(p), _) => out.push_str(&format!(
                "{:>12.1} {:>12.1} {:>7.3} {:>7.3} {:>8.3} {:>8.3} {:>9.3}\n",
                est.xc,
                est.yc,
                p.beta,
                p.zt,
                p.dz,
                p.c,
                p.curie_depth()
            )),
            (None, err) => out.push_str(&format!(
                "{:>12.1} {:>12.1}  failed: {}\n",
                est.xc,
                est.yc,
                err.as_deref().unwrap_or("unknown error")
            )),
        }
    }

    match stats {
        Some(s) => out.push_str(&format!(
            "\nWindows: {} ({} failed) | Curie depth: min={:.3} max={:.3} mean={:.3} km\n",
            s.n_windows, s.n_failed, s.depth_min, s.depth_max, s.depth_mean
        )),
        None => out.push_str("\nNo window could be fitted.\n"),
    }
    out
}

/// Tanaka depths plus the derived base depth.
pub fn format_tanaka(depths: &TanakaDepths, zb: f64, zb_err: f64) -> String {
    format!(
        "Tanaka (1999):\n- top      zt = {:.3} ± {:.3} km\n- centroid zo = {:.3} ± {:.3} km\n- base     zb = {:.3} ± {:.3} km\n",
        depths.zt, depths.zt_err, depths.zo, depths.zo_err, zb, zb_err
    )
}

/// Mean ± standard deviation of a sample set.
pub fn format_summary(title: &str, summary: &ParamSummary, acceptance: Option<f64>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title} (n={}):\n", summary.n));
    for param in Param::ALL {
        out.push_str(&format!(
            "- {:<5}: {:>10.4} ± {:.4}\n",
            param.name(),
            summary.mean.get(param),
            summary.std.get(param)
        ));
    }
    out.push_str(&format!(
        "- depth: {:>10.4} (zt + dz)\n",
        summary.mean.curie_depth()
    ));
    if let Some(rate) = acceptance {
        out.push_str(&format!("Acceptance rate: {:.3}\n", rate));
    }
    out
}
