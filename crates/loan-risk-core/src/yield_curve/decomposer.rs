//! Monthly decomposition of a loan's effective yield over its life.
//!
//! Time is counted in whole months from the start date: the loan runs for
//! `D` months, `D/12` years, and at month `m` has `(D − m)/12` years left.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::loan::Loan;
use crate::math::{clamp_unit, safe_div};
use crate::params::CalculationParameters;
use crate::types::Rate;

/// Floor on the remaining-life denominator of the fee component.
pub const MIN_REMAINING_YEARS: Decimal = dec!(0.1);

const MONTHS_PER_YEAR: Decimal = dec!(12);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPoint {
    pub month: u32,
    pub effective_yield: Rate,
    /// reference rate + funding index + margin
    pub base_yield: Rate,
    pub fee_component: Rate,
    pub commitment_component: Rate,
    /// PD × LGD, constant across the curve
    pub risk_adjustment: Rate,
}

/// One point per month from 0 to the loan's duration in whole months.
pub fn yield_curve(loan: &Loan, params: &CalculationParameters) -> Vec<YieldPoint> {
    let duration_months = loan.duration_months();
    let duration = Decimal::from(duration_months);
    let duration_years = duration / MONTHS_PER_YEAR;

    let base_yield = loan.reference_rate + params.funding_index_rate + loan.margin;
    let annual_fee_rate = safe_div(
        safe_div(loan.amortising_fees(), duration_years),
        loan.original_amount,
    );
    let undrawn_ratio = safe_div(loan.undrawn_amount, loan.original_amount);
    let risk_adjustment = clamp_unit(loan.pd) * clamp_unit(loan.lgd);

    tracing::debug!(loan_id = %loan.id, duration_months, "building yield curve");

    (0..=duration_months)
        .map(|month| {
            let m = Decimal::from(month);
            let remaining_years = (duration - m) / MONTHS_PER_YEAR;
            let fee_component = annual_fee_rate / remaining_years.max(MIN_REMAINING_YEARS);
            let runoff = if duration.is_zero() {
                Decimal::ZERO
            } else {
                (Decimal::ONE - m / duration).max(Decimal::ZERO)
            };
            let commitment_component = loan.fees.commitment * undrawn_ratio * runoff;

            YieldPoint {
                month,
                effective_yield: base_yield + fee_component + commitment_component
                    - risk_adjustment,
                base_yield,
                fee_component,
                commitment_component,
                risk_adjustment,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
