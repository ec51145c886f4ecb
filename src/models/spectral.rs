//! Forward models of the radial log-power spectrum.
//!
//! Both models give `Φ(k) = ln P(k)` for a layer of fractally magnetised
//! sources, with `k` in rad/km and depths in km:
//!
//! - Bouligand et al. (2009): layer from `zt` to `zt + dz`
//! - Maus & Dimri (1995): semi-infinite layer below `zt`
//!
//! Bouligand's finite-thickness term is
//!
//! ```text
//! A = √π / Γ(1+β/2) · [ ½cosh(x)·Γ((1+β)/2) − K_{(1+β)/2}(x)·(x/2)^{(1+β)/2} ],   x = k·dz
//! ```
//!
//! and enters as `ln A − x`. We evaluate `A·e^{−x}` directly, which keeps the
//! product finite where `cosh(x)` alone would overflow.

use crate::domain::CurieParams;
use crate::math::{bessel_k, gamma};

/// Bouligand et al. (2009) log-power at wavenumber `kh`.
///
/// Returns `NaN` outside the model's domain (`kh <= 0`, `dz <= 0`, or a
/// non-positive layer term).
pub fn bouligand2009(kh: f64, beta: f64, zt: f64, dz: f64, c: f64) -> f64 {
    if !(kh > 0.0 && dz > 0.0) {
        return f64::NAN;
    }

    let x = kh * dz;
    let nu = 0.5 * (1.0 + beta);

    let cosh_term = 0.25 * (1.0 + (-2.0 * x).exp()) * gamma(nu);
    let bessel_term = bessel_k(nu, x) * (-x).exp() * (0.5 * x).powf(nu);
    let scaled_a = std::f64::consts::PI.sqrt() / gamma(1.0 + 0.5 * beta) * (cosh_term - bessel_term);
    if !(scaled_a > 0.0) {
        return f64::NAN;
    }

    c - 2.0 * kh * zt - (beta - 1.0) * kh.ln() + scaled_a.ln()
}

/// Maus & Dimri (1995) log-power at wavenumber `kh`.
pub fn maus1995(kh: f64, beta: f64, zt: f64, c: f64) -> f64 {
    if !(kh > 0.0) {
        return f64::NAN;
    }
    c - 2.0 * kh * zt - (beta - 1.0) * kh.ln()
}

/// Bouligand spectrum evaluated at every wavenumber in `k`.
pub fn bouligand_spectrum(k: &[f64], params: &CurieParams) -> Vec<f64> {
    k.iter()
        .map(|&kh| bouligand2009(kh, params.beta, params.zt, params.dz, params.c))
        .collect()
}
