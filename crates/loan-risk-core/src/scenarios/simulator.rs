use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loan::Loan;
use crate::math::clamp_unit;
use crate::params::{CalculationParameters, ScenarioShock};
use crate::portfolio::aggregator::{compute_portfolio, PortfolioMetrics};
use crate::types::{Money, Rate};
use crate::LoanRiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Change of the headline metrics from the base run to a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDeltas {
    pub expected_loss: Money,
    pub portfolio_expected_loss: Money,
    pub rwa: Money,
    pub capital_consumption: Money,
    pub profit_after_tax: Money,
    pub roe: Rate,
    pub raroc: Rate,
    pub eva_intrinsic: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub shock: ScenarioShock,
    pub metrics: PortfolioMetrics,
    pub deltas: ScenarioDeltas,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestReport {
    pub base: PortfolioMetrics,
    pub scenarios: Vec<ScenarioOutcome>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The loan as seen under `shock`: PD and LGD scaled and clamped to
/// [0, 1], reference rate and margin shifted. The input is not modified.
pub fn shocked_loan(loan: &Loan, shock: &ScenarioShock) -> Loan {
    Loan {
        pd: clamp_unit(loan.pd * shock.pd_multiplier),
        lgd: clamp_unit(loan.lgd * shock.lgd_multiplier),
        reference_rate: loan.reference_rate + shock.rate_shift,
        margin: loan.margin + shock.spread_shift,
        ..loan.clone()
    }
}

/// Portfolio metrics with every loan perturbed by `shock`.
pub fn simulate(
    loans: &[Loan],
    params: &CalculationParameters,
    shock: &ScenarioShock,
) -> LoanRiskResult<PortfolioMetrics> {
    tracing::debug!(
        loans = loans.len(),
        pd_multiplier = %shock.pd_multiplier,
        lgd_multiplier = %shock.lgd_multiplier,
        rate_shift = %shock.rate_shift,
        spread_shift = %shock.spread_shift,
        "simulating scenario"
    );
    let shocked: Vec<Loan> = loans.iter().map(|l| shocked_loan(l, shock)).collect();
    compute_portfolio(&shocked, params)
}

/// Base portfolio plus every configured stress scenario, with deltas
/// against the base.
pub fn run_stress_scenarios(
    loans: &[Loan],
    params: &CalculationParameters,
) -> LoanRiskResult<StressTestReport> {
    let base = compute_portfolio(loans, params)?;

    let scenarios = params
        .stress_scenarios
        .iter()
        .map(|scenario| {
            let shock = scenario.shock();
            let metrics = simulate(loans, params, &shock)?;
            let deltas = deltas(&base, &metrics);
            Ok(ScenarioOutcome {
                name: scenario.name.clone(),
                shock,
                metrics,
                deltas,
            })
        })
        .collect::<LoanRiskResult<Vec<_>>>()?;

    Ok(StressTestReport { base, scenarios })
}

fn deltas(base: &PortfolioMetrics, stressed: &PortfolioMetrics) -> ScenarioDeltas {
    let diff = |a: Decimal, b: Decimal| b - a;
    ScenarioDeltas {
        expected_loss: diff(base.total_expected_loss, stressed.total_expected_loss),
        portfolio_expected_loss: diff(
            base.portfolio_expected_loss,
            stressed.portfolio_expected_loss,
        ),
        rwa: diff(base.total_rwa, stressed.total_rwa),
        capital_consumption: diff(
            base.total_capital_consumption,
            stressed.total_capital_consumption,
        ),
        profit_after_tax: diff(base.total_profit_after_tax, stressed.total_profit_after_tax),
        roe: diff(base.portfolio_roe, stressed.portfolio_roe),
        raroc: diff(base.portfolio_raroc, stressed.portfolio_raroc),
        eva_intrinsic: diff(base.total_eva_intrinsic, stressed.total_eva_intrinsic),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
