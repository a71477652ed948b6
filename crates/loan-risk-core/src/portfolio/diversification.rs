//! Portfolio-level expected loss under a correlation model.
//!
//! Correlated models work on the loss standard deviation of each loan,
//! σ_i = EAD·LGD·√(PD(1−PD)), and combine them as
//! σ_p = √(Σ_i Σ_j ρ_ij σ_i σ_j) with ρ_ii = 1. Portfolio EL is the naive
//! sum scaled by σ_p / Σσ_i.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::LoanRiskError;
use crate::loan::Loan;
use crate::math::{clamp_unit, safe_div, sqrt_decimal};
use crate::metrics::loan_metrics::LoanMetrics;
use crate::params::CorrelationModel;
use crate::types::Money;
use crate::LoanRiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversificationResult {
    /// Σ EL_i
    pub total_expected_loss: Money,
    pub portfolio_expected_loss: Money,
    /// total − portfolio EL
    pub diversification_benefit: Money,
    /// portfolio EL / total EL (1 means no benefit)
    pub diversification_ratio: Decimal,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Evaluate `model` over a portfolio. `loans` and `metrics` must be aligned
/// by index.
pub fn diversify(
    loans: &[Loan],
    metrics: &[LoanMetrics],
    model: &CorrelationModel,
) -> LoanRiskResult<DiversificationResult> {
    if loans.len() != metrics.len() {
        return Err(LoanRiskError::InvalidInput {
            field: "metrics".into(),
            reason: format!(
                "{} metric records for {} loans",
                metrics.len(),
                loans.len()
            ),
        });
    }

    let total_el: Money = metrics.iter().map(|m| m.expected_loss).sum();

    let ratio = match model {
        CorrelationModel::FlatPercentage { benefit_ratio } => {
            tracing::debug!(%benefit_ratio, "flat diversification benefit");
            Decimal::ONE - *benefit_ratio
        }
        CorrelationModel::SingleFactor { asset_correlation } => {
            let sigmas = loss_sigmas(loans, metrics);
            let sum: Decimal = sigmas.iter().copied().sum();
            let sum_sq: Decimal = sigmas.iter().map(|s| *s * *s).sum();
            // Off-diagonal pairs all share one correlation
            let variance = sum_sq + *asset_correlation * (sum * sum - sum_sq);
            sigma_ratio(variance, sum)
        }
        CorrelationModel::Matrix {
            sectors,
            correlations,
        } => {
            check_matrix_shape(sectors, correlations)?;
            let index: HashMap<&str, usize> = sectors
                .iter()
                .enumerate()
                .map(|(i, s)| (s.as_str(), i))
                .collect();

            // Per-sector Σσ and Σσ²
            let mut by_sector = vec![(Decimal::ZERO, Decimal::ZERO); sectors.len()];
            for (loan, sigma) in loans.iter().zip(loss_sigmas(loans, metrics)) {
                let k = sector_index(loan, &index)?;
                by_sector[k].0 += sigma;
                by_sector[k].1 += sigma * sigma;
            }

            let mut variance = Decimal::ZERO;
            for (k, (sum_k, sq_k)) in by_sector.iter().enumerate() {
                variance += *sq_k + correlations[k][k] * (*sum_k * *sum_k - *sq_k);
                for (l, (sum_l, _)) in by_sector.iter().enumerate() {
                    if l != k {
                        variance += correlations[k][l] * *sum_k * *sum_l;
                    }
                }
            }
            let sum: Decimal = by_sector.iter().map(|(s, _)| *s).sum();
            sigma_ratio(variance, sum)
        }
    };

    let portfolio_el = total_el * ratio;
    Ok(DiversificationResult {
        total_expected_loss: total_el,
        portfolio_expected_loss: portfolio_el,
        diversification_benefit: total_el - portfolio_el,
        diversification_ratio: ratio,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn loss_sigmas(loans: &[Loan], metrics: &[LoanMetrics]) -> Vec<Decimal> {
    loans
        .iter()
        .zip(metrics.iter())
        .map(|(loan, m)| {
            let pd = clamp_unit(loan.pd);
            m.ead * clamp_unit(loan.lgd) * sqrt_decimal(pd * (Decimal::ONE - pd))
        })
        .collect()
}

/// σ_p / Σσ_i, or 1 when no loan carries loss volatility.
fn sigma_ratio(variance: Decimal, sum_sigma: Decimal) -> Decimal {
    if sum_sigma.is_zero() {
        return Decimal::ONE;
    }
    safe_div(sqrt_decimal(variance.max(Decimal::ZERO)), sum_sigma)
}

fn check_matrix_shape(sectors: &[String], correlations: &[Vec<Decimal>]) -> LoanRiskResult<()> {
    let n = sectors.len();
    if correlations.len() != n || correlations.iter().any(|row| row.len() != n) {
        return Err(LoanRiskError::InvalidInput {
            field: "correlation_model.correlations".into(),
            reason: format!("must be a {}x{} matrix matching the sector list", n, n),
        });
    }
    Ok(())
}

fn sector_index(loan: &Loan, index: &HashMap<&str, usize>) -> LoanRiskResult<usize> {
    let sector = loan
        .sector
        .as_deref()
        .ok_or_else(|| LoanRiskError::InvalidInput {
            field: format!("loans[{}].sector", loan.id),
            reason: "sector is required by the matrix correlation model".into(),
        })?;
    index
        .get(sector)
        .copied()
        .ok_or_else(|| LoanRiskError::InvalidInput {
            field: format!("loans[{}].sector", loan.id),
            reason: format!("sector '{}' is not in the correlation matrix", sector),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
