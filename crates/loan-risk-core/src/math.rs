//! Decimal numerics shared by the capital, diversification and migration code.
//!
//! Everything stays in `rust_decimal::Decimal`. Transcendental functions use
//! range reduction plus short series; the normal quantile starts from the
//! Abramowitz & Stegun rational estimate and is polished with Newton steps.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const LN_2: Decimal = dec!(0.6931471805599453094172321215);
const SQRT_2PI: Decimal = dec!(2.5066282746310005024157652848);

/// Division that resolves a zero (or unrepresentable) quotient to zero.
///
/// Every ratio metric in the engine goes through this helper: a zero
/// capital or exposure denominator yields 0, never a panic.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator
        .checked_div(denominator)
        .unwrap_or(Decimal::ZERO)
}

/// Clamp a probability-like value into [0, 1].
pub fn clamp_unit(x: Decimal) -> Decimal {
    x.max(Decimal::ZERO).min(Decimal::ONE)
}

/// Exponential via Taylor series with halving range reduction.
pub fn exp_decimal(x: Decimal) -> Decimal {
    if x < dec!(-60) {
        return Decimal::ZERO;
    }
    if x > Decimal::ONE || x < -Decimal::ONE {
        let half = exp_decimal(x / dec!(2));
        return half * half;
    }
    let mut sum = Decimal::ONE;
    let mut term = Decimal::ONE;
    for n in 1u32..=30 {
        term = term * x / Decimal::from(n);
        if term.is_zero() {
            break;
        }
        sum += term;
    }
    sum
}

/// Natural logarithm for x > 0 (returns 0 otherwise).
///
/// Reduces x into [0.5, 2] by powers of two, then sums the atanh series
/// ln(v) = 2 * sum z^(2k+1) / (2k+1) with z = (v-1)/(v+1).
pub fn ln_decimal(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO || x == Decimal::ONE {
        return Decimal::ZERO;
    }
    let mut val = x;
    let mut adjust = Decimal::ZERO;
    while val > dec!(2) {
        val /= dec!(2);
        adjust += LN_2;
    }
    while val < dec!(0.5) {
        val *= dec!(2);
        adjust -= LN_2;
    }

    let z = (val - Decimal::ONE) / (val + Decimal::ONE);
    let z2 = z * z;
    let mut term = z;
    let mut sum = z;
    for k in 1u32..40 {
        term *= z2;
        if term.is_zero() {
            break;
        }
        sum += term / Decimal::from(2 * k + 1);
    }
    dec!(2) * sum + adjust
}

/// Square root: f64 seed, then Newton polish in Decimal.
pub fn sqrt_decimal(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut guess = x
        .to_f64()
        .and_then(|f| Decimal::from_f64(f.sqrt()))
        .filter(|g| *g > Decimal::ZERO)
        .unwrap_or(Decimal::ONE);
    for _ in 0..8 {
        let next = (guess + x / guess) / dec!(2);
        if next == guess {
            break;
        }
        guess = next;
    }
    guess
}

/// Standard normal density.
pub fn norm_pdf(x: Decimal) -> Decimal {
    exp_decimal(-(x * x) / dec!(2)) / SQRT_2PI
}

/// Standard normal CDF (Abramowitz & Stegun 26.2.17, |error| < 7.5e-8).
pub fn norm_cdf(x: Decimal) -> Decimal {
    if x <= dec!(-10) {
        return Decimal::ZERO;
    }
    if x >= dec!(10) {
        return Decimal::ONE;
    }
    let abs_x = x.abs();

    let p = dec!(0.2316419);
    let b1 = dec!(0.319381530);
    let b2 = dec!(-0.356563782);
    let b3 = dec!(1.781477937);
    let b4 = dec!(-1.821255978);
    let b5 = dec!(1.330274429);

    let t = Decimal::ONE / (Decimal::ONE + p * abs_x);
    let poly = t * (b1 + t * (b2 + t * (b3 + t * (b4 + t * b5))));
    let upper = Decimal::ONE - norm_pdf(abs_x) * poly;

    if x < Decimal::ZERO {
        Decimal::ONE - upper
    } else {
        upper
    }
}

/// Inverse standard normal CDF.
///
/// Initial estimate from Abramowitz & Stegun 26.2.23, refined with Newton
/// steps against [`norm_cdf`] so that `norm_cdf(norm_inv(p)) ≈ p`.
pub fn norm_inv(p: Decimal) -> Decimal {
    if p <= Decimal::ZERO {
        return dec!(-10);
    }
    if p >= Decimal::ONE {
        return dec!(10);
    }
    if p == dec!(0.5) {
        return Decimal::ZERO;
    }

    let is_lower = p < dec!(0.5);
    let tail = if is_lower { p } else { Decimal::ONE - p };
    let t = sqrt_decimal(dec!(-2) * ln_decimal(tail));

    let c0 = dec!(2.515517);
    let c1 = dec!(0.802853);
    let c2 = dec!(0.010328);
    let d1 = dec!(1.432788);
    let d2 = dec!(0.189269);
    let d3 = dec!(0.001308);

    let numerator = c0 + t * (c1 + t * c2);
    let denominator = Decimal::ONE + t * (d1 + t * (d2 + t * d3));
    let mut z = t - numerator / denominator;
    if is_lower {
        z = -z;
    }

    for _ in 0..4 {
        let density = norm_pdf(z);
        if density.is_zero() {
            break;
        }
        z -= (norm_cdf(z) - p) / density;
    }
    z
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
