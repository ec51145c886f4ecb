//! Special functions needed by the Bouligand spectrum.
//!
//! - `gamma(x)`: Lanczos approximation (g = 7, 9 terms) with reflection for
//!   `x < 0.5`. Relative accuracy is ~1e-15 over the range we use.
//! - `bessel_k(ν, x)`: modified Bessel function of the second kind for real
//!   order, from the integral representation
//!
//!   `K_ν(x) = ∫₀^∞ exp(-x·cosh t)·cosh(ν·t) dt`
//!
//!   evaluated with the trapezoidal rule. The integrand is analytic and decays
//!   doubly exponentially, so the rule converges geometrically in the step.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Quadrature step in `t` for `bessel_k`.
const K_STEP: f64 = 0.05;
/// Hard cap on quadrature nodes.
const K_MAX_NODES: usize = 20_000;

/// Gamma function for real `x` (not a non-positive integer).
pub fn gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Γ(x)Γ(1-x) = π / sin(πx)
        return PI / ((PI * x).sin() * gamma(1.0 - x));
    }

    let x = x - 1.0;
    let mut a = LANCZOS_COEF[0];
    let t = x + LANCZOS_G + 0.5;
    for (i, c) in LANCZOS_COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }

    (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
}

/// Modified Bessel function of the second kind, `K_ν(x)`, for `x > 0`.
///
/// `K` is even in the order, so negative `nu` is accepted. Returns `NaN` for
/// `x <= 0` and `0.0` once the result underflows.
pub fn bessel_k(nu: f64, x: f64) -> f64 {
    if !(x > 0.0) || !nu.is_finite() {
        return f64::NAN;
    }
    let nu = nu.abs();

    // Half weight at t = 0 (trapezoid end point); the tail is truncated once
    // terms stop contributing.
    let mut sum = 0.5 * (-x).exp();
    for i in 1..K_MAX_NODES {
        let t = i as f64 * K_STEP;
        let term = (nu * t - x * t.cosh()).exp() * 0.5 * (1.0 + (-2.0 * nu * t).exp());
        sum += term;
        // The exponent is concave in t, so once it starts falling the terms
        // only shrink.
        if term < 1e-17 * sum && x * t.sinh() > nu {
            break;
        }
    }

    sum * K_STEP
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel_err(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn gamma_matches_known_values() {
        assert!(rel_err(gamma(5.0), 24.0) < 1e-12);
        assert!(rel_err(gamma(0.5), PI.sqrt()) < 1e-12);
        assert!(rel_err(gamma(2.5), 0.75 * PI.sqrt()) < 1e-12);
        assert!(rel_err(gamma(-0.5), -2.0 * PI.sqrt()) < 1e-12);
    }

    #[test]
    fn bessel_k_half_integer_orders_are_closed_form() {
        for &x in &[0.05, 0.5, 1.0, 3.0, 12.0] {
            let base = (PI / (2.0 * x)).sqrt() * (-x).exp();
            assert!(rel_err(bessel_k(0.5, x), base) < 1e-10, "K_0.5({x})");
            assert!(rel_err(bessel_k(-0.5, x), base) < 1e-10, "K_-0.5({x})");
            assert!(
                rel_err(bessel_k(1.5, x), base * (1.0 + 1.0 / x)) < 1e-10,
                "K_1.5({x})"
            );
        }
    }

    #[test]
    fn bessel_k_rejects_non_positive_argument() {
        assert!(bessel_k(1.0, 0.0).is_nan());
        assert!(bessel_k(1.0, -1.0).is_nan());
    }
}
