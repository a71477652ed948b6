//! Basel IRB (ASRF) capital requirement for corporate exposures.
//!
//! Regulatory formula:
//! - R  = 0.12 f + 0.24 (1 − f), f = (1 − e^{−50 PD}) / (1 − e^{−50})
//! - b  = (0.11852 − 0.05478 ln PD)²
//! - MA = (1 + (M − 2.5) b) / (1 − 1.5 b), M clamped to [1, 5]
//! - K  = [LGD Φ(Φ⁻¹(PD)/√(1−R) + √(R/(1−R)) Φ⁻¹(0.999)) − PD LGD] × MA
//!
//! The legacy variant keeps the dashboard's historical approximation
//! available for reconciliation: MA = 1 + 2.5 M and the constant 1.06·√1.5
//! in place of Φ⁻¹(0.999).
//!
//! K per unit of LGD rises with PD up to a peak (about 0.28 to 0.31 under
//! the regulatory formula, 0.46 under the legacy one) and then falls back to
//! zero at PD = 1. Capital is held at its peak value for any PD beyond it, so
//! RWA never decreases as PD rises. The maturity slope `b` is evaluated at no
//! less than the 3bp corporate PD floor, where MA stays finite.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::math::{clamp_unit, exp_decimal, ln_decimal, norm_cdf, norm_inv, sqrt_decimal};
use crate::params::CapitalFormula;
use crate::types::{Rate, Years};

/// Φ⁻¹(0.999), the ASRF confidence quantile.
const CONFIDENCE_QUANTILE_999: Decimal = dec!(3.090232306167813);
/// 1.06 × √1.5, used by the legacy approximation.
const LEGACY_CONFIDENCE_TERM: Decimal = dec!(1.298229563675084);
/// RWA = K × 12.5 × EAD
pub const RWA_MULTIPLIER: Decimal = dec!(12.5);

/// Basel corporate PD floor, applied to the maturity slope only.
const MATURITY_PD_FLOOR: Decimal = dec!(0.0003);

/// Bracket searched for the PD that maximises K. Every maturity peaks inside.
const PEAK_SEARCH_LOW: Decimal = dec!(0.1);
const PEAK_SEARCH_HIGH: Decimal = dec!(0.9);
const PEAK_SEARCH_ITERATIONS: usize = 40;
const INV_GOLDEN_RATIO: Decimal = dec!(0.6180339887498948482045868344);

const MIN_EFFECTIVE_MATURITY: Decimal = Decimal::ONE;
const MAX_EFFECTIVE_MATURITY: Decimal = dec!(5);

/// Intermediate results of the capital formula for one exposure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalComponents {
    /// PD the formula was evaluated at: the exposure PD, capped at the peak
    /// of the capital curve
    pub capital_pd: Rate,
    pub asset_correlation: Decimal,
    pub maturity_adjustment: Decimal,
    /// K: capital per unit of EAD
    pub capital_factor: Decimal,
}

/// Supervisory asset correlation for corporate exposures.
pub fn asset_correlation(pd: Rate) -> Decimal {
    let pd = clamp_unit(pd);
    let weight = (Decimal::ONE - exp_decimal(dec!(-50) * pd)) / (Decimal::ONE - exp_decimal(dec!(-50)));
    dec!(0.12) * weight + dec!(0.24) * (Decimal::ONE - weight)
}

/// Regulatory maturity adjustment; `years_to_maturity` is clamped to [1, 5].
///
/// A PD of zero returns 1; other PDs below the 3bp floor use the floor.
pub fn maturity_adjustment(pd: Rate, years_to_maturity: Years) -> Decimal {
    let pd = clamp_unit(pd);
    if pd.is_zero() {
        return Decimal::ONE;
    }
    let pd = pd.max(MATURITY_PD_FLOOR);
    let m = years_to_maturity
        .max(MIN_EFFECTIVE_MATURITY)
        .min(MAX_EFFECTIVE_MATURITY);
    let b_base = dec!(0.11852) - dec!(0.05478) * ln_decimal(pd);
    let b = b_base * b_base;

    (Decimal::ONE + (m - dec!(2.5)) * b) / (Decimal::ONE - dec!(1.5) * b)
}

/// Linear maturity factor of the legacy approximation.
pub fn legacy_maturity_adjustment(years_to_maturity: Years) -> Decimal {
    Decimal::ONE + dec!(2.5) * years_to_maturity.max(Decimal::ZERO)
}

/// K per unit of LGD at `pd`, with the correlation and maturity adjustment
/// it used. Zero at PD 0 and PD 1.
fn unit_capital(pd: Rate, years_to_maturity: Years, formula: CapitalFormula) -> CapitalComponents {
    let rho = asset_correlation(pd);
    let (ma, confidence_term) = match formula {
        CapitalFormula::Regulatory => (
            maturity_adjustment(pd, years_to_maturity),
            CONFIDENCE_QUANTILE_999,
        ),
        CapitalFormula::Legacy => (
            legacy_maturity_adjustment(years_to_maturity),
            LEGACY_CONFIDENCE_TERM,
        ),
    };

    let capital_factor = if pd.is_zero() || pd >= Decimal::ONE {
        Decimal::ZERO
    } else {
        // Conditional PD at the confidence level
        let one_minus_rho = Decimal::ONE - rho;
        let z = norm_inv(pd) / sqrt_decimal(one_minus_rho)
            + sqrt_decimal(rho / one_minus_rho) * confidence_term;
        ((norm_cdf(z) - pd) * ma).max(Decimal::ZERO)
    };

    CapitalComponents {
        capital_pd: pd,
        asset_correlation: rho,
        maturity_adjustment: ma,
        capital_factor,
    }
}

/// PD at which K peaks for this maturity, found by golden-section search.
///
/// Returns the lower end of the final bracket, which never lies past the
/// true peak, so K is still rising at the returned PD.
pub fn peak_capital_pd(years_to_maturity: Years, formula: CapitalFormula) -> Rate {
    let k_at = |pd: Rate| unit_capital(pd, years_to_maturity, formula).capital_factor;

    let (mut lo, mut hi) = (PEAK_SEARCH_LOW, PEAK_SEARCH_HIGH);
    let mut x1 = hi - INV_GOLDEN_RATIO * (hi - lo);
    let mut x2 = lo + INV_GOLDEN_RATIO * (hi - lo);
    let mut f1 = k_at(x1);
    let mut f2 = k_at(x2);

    for _ in 0..PEAK_SEARCH_ITERATIONS {
        if f1 < f2 {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_GOLDEN_RATIO * (hi - lo);
            f2 = k_at(x2);
        } else {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_GOLDEN_RATIO * (hi - lo);
            f1 = k_at(x1);
        }
    }
    lo
}

/// Capital factor K and its ingredients.
///
/// PD and LGD are clamped to [0, 1]. A PD of 0 carries K = 0, K is never
/// negative, and a PD past the peak of the capital curve (PD = 1 included)
/// is charged the peak K.
pub fn capital_requirement(
    pd: Rate,
    lgd: Rate,
    years_to_maturity: Years,
    formula: CapitalFormula,
) -> CapitalComponents {
    let pd = clamp_unit(pd);
    let lgd = clamp_unit(lgd);

    let capital_pd = if pd > PEAK_SEARCH_LOW {
        let peak = peak_capital_pd(years_to_maturity, formula);
        if pd > peak {
            tracing::debug!(%pd, %peak, "PD past the capital peak; holding K at the peak");
        }
        pd.min(peak)
    } else {
        pd
    };

    let unit = unit_capital(capital_pd, years_to_maturity, formula);
    CapitalComponents {
        capital_factor: unit.capital_factor * lgd,
        ..unit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
