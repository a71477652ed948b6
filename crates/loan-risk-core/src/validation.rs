//! Data-quality diagnostics.
//!
//! Nothing here rejects input: the calculators accept whatever they are
//! given and clamp at the formula boundaries. These checks produce the
//! warnings that travel alongside a result.

use rust_decimal::Decimal;

use crate::loan::Loan;
use crate::params::{CalculationParameters, CorrelationModel};
use crate::ratings::transition::{validate_row_stochastic, DEFAULT_ROW_TOLERANCE};

fn in_unit_range(x: Decimal) -> bool {
    x >= Decimal::ZERO && x <= Decimal::ONE
}

/// Warnings for one loan record.
pub fn validate_loan(loan: &Loan) -> Vec<String> {
    let mut warnings = Vec::new();
    let id = &loan.id;

    if !in_unit_range(loan.pd) {
        warnings.push(format!("Loan {id}: PD {} outside [0, 1]; clamped in capital formula", loan.pd));
    }
    if !in_unit_range(loan.lgd) {
        warnings.push(format!("Loan {id}: LGD {} outside [0, 1]; clamped in capital formula", loan.lgd));
    }
    for (field, value) in [
        ("original_amount", loan.original_amount),
        ("drawn_amount", loan.drawn_amount),
        ("undrawn_amount", loan.undrawn_amount),
    ] {
        if value < Decimal::ZERO {
            warnings.push(format!("Loan {id}: {field} is negative ({value})"));
        }
    }
    if loan.drawn_amount + loan.undrawn_amount > loan.original_amount {
        warnings.push(format!(
            "Loan {id}: drawn + undrawn ({}) exceeds original amount ({})",
            loan.drawn_amount + loan.undrawn_amount,
            loan.original_amount
        ));
    }
    if let Some(ead) = loan.ead {
        if ead < Decimal::ZERO {
            warnings.push(format!("Loan {id}: EAD is negative ({ead})"));
        }
    }
    if loan.end_date <= loan.start_date {
        warnings.push(format!(
            "Loan {id}: end date {} is not after start date {}; life treated as zero",
            loan.end_date, loan.start_date
        ));
    }
    if loan.original_amount.is_zero() {
        warnings.push(format!("Loan {id}: original amount is zero; per-amount ratios set to 0"));
    }

    warnings
}

/// Warnings for a parameter set.
pub fn validate_params(params: &CalculationParameters) -> Vec<String> {
    let mut warnings = Vec::new();

    for (field, value) in [
        ("target_roe", params.target_roe),
        ("corporate_tax_rate", params.corporate_tax_rate),
        ("capital_ratio", params.capital_ratio),
    ] {
        if !in_unit_range(value) {
            warnings.push(format!("Parameter {field} = {value} is outside [0, 1]"));
        }
    }
    if params.funding_cost < Decimal::ZERO {
        warnings.push(format!("Parameter funding_cost is negative ({})", params.funding_cost));
    }
    if params.operational_cost_ratio < Decimal::ZERO {
        warnings.push(format!(
            "Parameter operational_cost_ratio is negative ({})",
            params.operational_cost_ratio
        ));
    }

    for (scale, table) in &params.rating_pd_mappings {
        for row in table.iter() {
            if !in_unit_range(row.pd) {
                warnings.push(format!(
                    "Rating {} on {} maps to PD {} outside [0, 1]",
                    row.rating, scale, row.pd
                ));
            }
        }
    }

    for (scale, entries) in &params.transition_matrices {
        let report = validate_row_stochastic(entries, DEFAULT_ROW_TOLERANCE);
        for w in report.warnings {
            warnings.push(format!("{} transition matrix: {}", scale, w.message));
        }
    }

    for scenario in &params.stress_scenarios {
        if scenario.pd_multiplier < Decimal::ZERO || scenario.lgd_multiplier < Decimal::ZERO {
            warnings.push(format!("Scenario '{}' has a negative multiplier", scenario.name));
        }
    }

    match &params.correlation_model {
        CorrelationModel::FlatPercentage { benefit_ratio } => {
            if !in_unit_range(*benefit_ratio) {
                warnings.push(format!("Flat diversification ratio {benefit_ratio} is outside [0, 1]"));
            }
        }
        CorrelationModel::SingleFactor { asset_correlation } => {
            if !in_unit_range(*asset_correlation) {
                warnings.push(format!("Asset correlation {asset_correlation} is outside [0, 1]"));
            }
        }
        CorrelationModel::Matrix {
            sectors,
            correlations,
        } => {
            for (i, row) in correlations.iter().enumerate() {
                for (j, rho) in row.iter().enumerate() {
                    if rho.abs() > Decimal::ONE {
                        warnings.push(format!("Sector correlation [{i}][{j}] = {rho} is outside [-1, 1]"));
                    }
                    let mirrored = correlations.get(j).and_then(|r| r.get(i));
                    if j > i && mirrored.is_some_and(|m| m != rho) {
                        warnings.push(format!(
                            "Sector correlation matrix is not symmetric at {} / {}",
                            sectors.get(i).map(String::as_str).unwrap_or("?"),
                            sectors.get(j).map(String::as_str).unwrap_or("?")
                        ));
                    }
                }
            }
        }
    }

    warnings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
