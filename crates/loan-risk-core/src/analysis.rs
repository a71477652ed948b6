//! Envelope-returning entry points.
//!
//! Each function takes one serde input struct, runs the engine, and wraps
//! the result in a [`ComputationOutput`] carrying data-quality warnings and
//! timing. The CLI and the Node bindings call these.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::loan::Loan;
use crate::metrics::loan_metrics::{compute_all, compute_loan_metrics, LoanMetrics};
use crate::params::{CalculationParameters, CapitalFormula, RatingScale, TransitionEntry};
use crate::portfolio::aggregator::{aggregate, PortfolioMetrics};
use crate::ratings::resolver::resolve_pd;
use crate::ratings::transition::{
    migration_adjusted_pd, migration_distribution, validate_row_stochastic, RatingProbability,
    RowStochasticReport, DEFAULT_ROW_TOLERANCE,
};
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::validation::{validate_loan, validate_params};
use crate::{LoanRiskError, LoanRiskResult};

#[cfg(feature = "scenarios")]
use crate::params::ScenarioShock;
#[cfg(feature = "scenarios")]
use crate::scenarios::simulator::{run_stress_scenarios, simulate, StressTestReport};
#[cfg(feature = "yield_curve")]
use crate::yield_curve::decomposer::{yield_curve, YieldPoint};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanInput {
    pub loan: Loan,
    #[serde(default)]
    pub params: CalculationParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioInput {
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub params: CalculationParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub portfolio: PortfolioMetrics,
    pub loans: Vec<LoanMetrics>,
}

#[cfg(feature = "scenarios")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub params: CalculationParameters,
    #[serde(default)]
    pub shock: ScenarioShock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingLookupInput {
    pub scale: RatingScale,
    pub rating: String,
    #[serde(default)]
    pub params: CalculationParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingLookupOutput {
    pub scale: RatingScale,
    pub rating: String,
    pub pd: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationInput {
    pub scale: RatingScale,
    pub from: String,
    #[serde(default = "default_horizon")]
    pub horizon_years: u32,
    #[serde(default)]
    pub params: CalculationParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOutput {
    pub scale: RatingScale,
    pub from: String,
    pub horizon_years: u32,
    /// One-year table PD of the starting rating, when it has one
    pub base_pd: Option<Rate>,
    pub migration_adjusted_pd: Rate,
    pub distribution: Vec<RatingProbability>,
}

/// Either explicit matrix entries, or the matrix configured for `scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixValidationInput {
    #[serde(default)]
    pub entries: Option<Vec<TransitionEntry>>,
    #[serde(default)]
    pub scale: Option<RatingScale>,
    #[serde(default = "default_tolerance")]
    pub tolerance: Decimal,
    #[serde(default)]
    pub params: CalculationParameters,
}

fn default_horizon() -> u32 {
    1
}

fn default_tolerance() -> Decimal {
    DEFAULT_ROW_TOLERANCE
}

fn capital_methodology(formula: CapitalFormula) -> &'static str {
    match formula {
        CapitalFormula::Regulatory => "Basel IRB ASRF capital (regulatory maturity adjustment)",
        CapitalFormula::Legacy => "Legacy capital approximation (linear maturity factor)",
    }
}

fn params_assumptions(params: &CalculationParameters) -> serde_json::Value {
    serde_json::json!({
        "valuation_date": params.valuation_date,
        "target_roe": params.target_roe,
        "corporate_tax_rate": params.corporate_tax_rate,
        "capital_ratio": params.capital_ratio,
        "funding_cost": params.funding_cost,
        "operational_cost_ratio": params.operational_cost_ratio,
        "capital_formula": params.capital_formula,
        "correlation_model": params.correlation_model,
        "eva_sale_strategy": params.eva_sale_strategy,
        "day_count": "ACT/365.25",
        "zero_denominator": "ratio reported as 0",
    })
}

fn portfolio_warnings(loans: &[Loan], params: &CalculationParameters) -> Vec<String> {
    let mut warnings = validate_params(params);
    for loan in loans {
        warnings.extend(validate_loan(loan));
    }
    warnings
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Metrics for a single loan.
pub fn analyze_loan(input: &LoanInput) -> LoanRiskResult<ComputationOutput<LoanMetrics>> {
    let start = Instant::now();
    tracing::debug!(loan_id = %input.loan.id, "analyze_loan");

    let mut warnings = validate_params(&input.params);
    warnings.extend(validate_loan(&input.loan));
    let metrics = compute_loan_metrics(&input.loan, &input.params);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        capital_methodology(input.params.capital_formula),
        &params_assumptions(&input.params),
        warnings,
        elapsed,
        metrics,
    ))
}

/// Per-loan metrics and their portfolio aggregate.
pub fn analyze_portfolio(input: &PortfolioInput) -> LoanRiskResult<ComputationOutput<PortfolioReport>> {
    let start = Instant::now();
    tracing::debug!(loans = input.loans.len(), "analyze_portfolio");

    let mut warnings = portfolio_warnings(&input.loans, &input.params);
    if input.loans.is_empty() {
        warnings.push("Empty portfolio; all metrics are zero".into());
    }

    let loans = compute_all(&input.loans, &input.params);
    let portfolio = aggregate(&input.loans, &loans, &input.params)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Portfolio aggregation (capital-weighted returns, correlation-adjusted EL)",
        &params_assumptions(&input.params),
        warnings,
        elapsed,
        PortfolioReport { portfolio, loans },
    ))
}

/// Portfolio metrics under a single ad-hoc shock.
#[cfg(feature = "scenarios")]
pub fn analyze_scenario(input: &ScenarioInput) -> LoanRiskResult<ComputationOutput<PortfolioMetrics>> {
    let start = Instant::now();
    let mut warnings = portfolio_warnings(&input.loans, &input.params);
    if input.shock.pd_multiplier < Decimal::ZERO || input.shock.lgd_multiplier < Decimal::ZERO {
        warnings.push("Negative multiplier; shocked PD/LGD clamped to 0".into());
    }

    let metrics = simulate(&input.loans, &input.params, &input.shock)?;

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "shock": input.shock,
        "pd_lgd_clamp": "[0, 1] after multiplier",
        "parameters": params_assumptions(&input.params),
    });
    Ok(with_metadata(
        "Scenario simulation (shocked loan view, same pipeline)",
        &assumptions,
        warnings,
        elapsed,
        metrics,
    ))
}

/// Base run plus every configured stress scenario.
#[cfg(feature = "scenarios")]
pub fn analyze_stress(input: &PortfolioInput) -> LoanRiskResult<ComputationOutput<StressTestReport>> {
    let start = Instant::now();
    let mut warnings = portfolio_warnings(&input.loans, &input.params);
    if input.params.stress_scenarios.is_empty() {
        warnings.push("No stress scenarios configured; only the base run is reported".into());
    }

    let report = run_stress_scenarios(&input.loans, &input.params)?;

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "scenarios": input.params.stress_scenarios,
        "deltas": "scenario minus base",
    });
    Ok(with_metadata(
        "Stress testing over configured scenarios",
        &assumptions,
        warnings,
        elapsed,
        report,
    ))
}

/// Table PD of a rating label.
pub fn resolve_rating(input: &RatingLookupInput) -> LoanRiskResult<ComputationOutput<RatingLookupOutput>> {
    let start = Instant::now();
    let pd = resolve_pd(&input.scale, &input.rating, &input.params.rating_pd_mappings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rating to PD table lookup (exact label match)",
        &serde_json::json!({ "case_sensitive": true }),
        Vec::new(),
        elapsed,
        RatingLookupOutput {
            scale: input.scale.clone(),
            rating: input.rating.clone(),
            pd,
        },
    ))
}

/// Multi-year migration-adjusted PD and the forward rating distribution.
pub fn migration_pd(input: &MigrationInput) -> LoanRiskResult<ComputationOutput<MigrationOutput>> {
    let start = Instant::now();
    let params = &input.params;

    let matrix = params
        .transition_matrices
        .get(&input.scale)
        .ok_or_else(|| LoanRiskError::TransitionMatrixNotFound {
            scale: input.scale.to_string(),
        })?;
    let mut warnings: Vec<String> = validate_row_stochastic(matrix, DEFAULT_ROW_TOLERANCE)
        .warnings
        .into_iter()
        .map(|w| w.message)
        .collect();
    if input.horizon_years == 0 {
        warnings.push("Horizon of 0 years returns the table PD of the starting rating".into());
    }

    let pd = migration_adjusted_pd(
        &input.scale,
        &input.from,
        input.horizon_years,
        &params.transition_matrices,
        &params.rating_pd_mappings,
    )?;
    let distribution = migration_distribution(
        &input.scale,
        &input.from,
        input.horizon_years,
        &params.transition_matrices,
    )?;
    let base_pd = resolve_pd(&input.scale, &input.from, &params.rating_pd_mappings).ok();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rating migration (matrix power, probability-weighted PD)",
        &serde_json::json!({ "matrix_power": "repeated squaring", "renormalised": false }),
        warnings,
        elapsed,
        MigrationOutput {
            scale: input.scale.clone(),
            from: input.from.clone(),
            horizon_years: input.horizon_years,
            base_pd,
            migration_adjusted_pd: pd,
            distribution,
        },
    ))
}

/// Row-stochastic diagnostics. Always succeeds when a matrix is found;
/// invalid rows are reported in the result, never as an error.
pub fn validate_matrix(
    input: &MatrixValidationInput,
) -> LoanRiskResult<ComputationOutput<RowStochasticReport>> {
    let start = Instant::now();
    let entries: &[TransitionEntry] = match (&input.entries, &input.scale) {
        (Some(entries), _) => entries,
        (None, Some(scale)) => input
            .params
            .transition_matrices
            .get(scale)
            .ok_or_else(|| LoanRiskError::TransitionMatrixNotFound {
                scale: scale.to_string(),
            })?,
        (None, None) => {
            return Err(LoanRiskError::InvalidInput {
                field: "entries".into(),
                reason: "provide matrix entries or a rating scale".into(),
            })
        }
    };

    let report = validate_row_stochastic(entries, input.tolerance);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Transition matrix row-stochastic check",
        &serde_json::json!({ "tolerance": input.tolerance, "renormalised": false }),
        Vec::new(),
        elapsed,
        report,
    ))
}

/// Monthly effective-yield decomposition of one loan.
#[cfg(feature = "yield_curve")]
pub fn analyze_yield_curve(input: &LoanInput) -> LoanRiskResult<ComputationOutput<Vec<YieldPoint>>> {
    let start = Instant::now();
    let warnings = validate_loan(&input.loan);
    let curve = yield_curve(&input.loan, &input.params);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Effective yield decomposition (monthly)",
        &serde_json::json!({
            "fee_denominator_floor_years": crate::yield_curve::decomposer::MIN_REMAINING_YEARS,
            "commitment_runoff": "linear",
            "risk_adjustment": "PD x LGD, constant",
        }),
        warnings,
        elapsed,
        curve,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
