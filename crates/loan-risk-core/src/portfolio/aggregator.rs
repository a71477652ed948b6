use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LoanRiskError;
use crate::loan::Loan;
use crate::math::safe_div;
use crate::metrics::loan_metrics::{compute_all, LoanMetrics};
use crate::params::CalculationParameters;
use crate::portfolio::diversification::diversify;
use crate::types::{Money, Rate};
use crate::LoanRiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Portfolio totals, exposure-weighted averages and capital-weighted returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub loan_count: usize,
    pub total_original_amount: Money,
    pub total_drawn_amount: Money,
    pub total_undrawn_amount: Money,
    pub total_ead: Money,
    /// Naive Σ EL
    pub total_expected_loss: Money,
    /// EL after the diversification adjustment
    pub portfolio_expected_loss: Money,
    pub diversification_benefit: Money,
    pub total_rwa: Money,
    pub total_capital_consumption: Money,
    pub total_annual_income: Money,
    pub total_profit_before_tax: Money,
    pub total_profit_after_tax: Money,
    /// EAD-weighted PD
    pub weighted_pd: Rate,
    /// EAD-weighted LGD
    pub weighted_lgd: Rate,
    /// Σ PAT / Σ capital
    pub portfolio_roe: Rate,
    /// Σ PBT / Σ capital
    pub portfolio_raroc: Rate,
    pub total_eva_intrinsic: Money,
    pub total_eva_sale: Money,
    /// Σ EL / Σ original amount
    pub portfolio_cost_of_risk: Rate,
    /// Σ PAT / Σ original amount
    pub portfolio_net_margin: Rate,
    /// EAD-weighted effective yield
    pub weighted_effective_yield: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Combine per-loan metrics into portfolio metrics.
///
/// Returns on capital are capital-weighted (ratio of sums), never the mean
/// of per-loan ratios. An empty portfolio yields all-zero metrics.
pub fn aggregate(
    loans: &[Loan],
    metrics: &[LoanMetrics],
    params: &CalculationParameters,
) -> LoanRiskResult<PortfolioMetrics> {
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
    tracing::debug!(loans = loans.len(), "aggregating portfolio");

    if loans.is_empty() {
        return Ok(PortfolioMetrics::default());
    }

    let mut out = PortfolioMetrics {
        loan_count: loans.len(),
        ..Default::default()
    };
    let mut pd_weighted = Decimal::ZERO;
    let mut lgd_weighted = Decimal::ZERO;
    let mut yield_weighted = Decimal::ZERO;

    for (loan, m) in loans.iter().zip(metrics.iter()) {
        out.total_original_amount += loan.original_amount;
        out.total_drawn_amount += loan.drawn_amount;
        out.total_undrawn_amount += loan.undrawn_amount;
        out.total_ead += m.ead;
        out.total_expected_loss += m.expected_loss;
        out.total_rwa += m.rwa;
        out.total_capital_consumption += m.capital_consumption;
        out.total_annual_income += m.annual_income;
        out.total_profit_before_tax += m.profit_before_tax;
        out.total_profit_after_tax += m.profit_after_tax;
        out.total_eva_intrinsic += m.eva_intrinsic;
        out.total_eva_sale += m.eva_sale;

        pd_weighted += loan.pd * m.ead;
        lgd_weighted += loan.lgd * m.ead;
        yield_weighted += m.effective_yield * m.ead;
    }

    out.weighted_pd = safe_div(pd_weighted, out.total_ead);
    out.weighted_lgd = safe_div(lgd_weighted, out.total_ead);
    out.weighted_effective_yield = safe_div(yield_weighted, out.total_ead);

    if out.total_capital_consumption.is_zero() {
        tracing::debug!("portfolio capital is zero; ROE and RAROC set to 0");
    }
    out.portfolio_roe = safe_div(out.total_profit_after_tax, out.total_capital_consumption);
    out.portfolio_raroc = safe_div(out.total_profit_before_tax, out.total_capital_consumption);
    out.portfolio_cost_of_risk = safe_div(out.total_expected_loss, out.total_original_amount);
    out.portfolio_net_margin = safe_div(out.total_profit_after_tax, out.total_original_amount);

    let diversification = diversify(loans, metrics, &params.correlation_model)?;
    out.portfolio_expected_loss = diversification.portfolio_expected_loss;
    out.diversification_benefit = diversification.diversification_benefit;

    Ok(out)
}

/// Run the loan calculator over every loan, then aggregate.
pub fn compute_portfolio(
    loans: &[Loan],
    params: &CalculationParameters,
) -> LoanRiskResult<PortfolioMetrics> {
    let metrics = compute_all(loans, params);
    aggregate(loans, &metrics, params)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
