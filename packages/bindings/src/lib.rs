use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use loan_risk_core::analysis;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Parse the JSON argument, run `f`, and serialise its envelope.
fn call_json<I, O, E>(input_json: &str, f: impl FnOnce(&I) -> Result<O, E>) -> NapiResult<String>
where
    I: DeserializeOwned,
    O: Serialize,
    E: std::fmt::Display,
{
    let input: I = serde_json::from_str(input_json).map_err(to_napi_error)?;
    let output = f(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Loan and portfolio metrics
// ---------------------------------------------------------------------------

#[napi]
pub fn loan_metrics(input_json: String) -> NapiResult<String> {
    call_json(&input_json, analysis::analyze_loan)
}

#[napi]
pub fn portfolio_metrics(input_json: String) -> NapiResult<String> {
    call_json(&input_json, analysis::analyze_portfolio)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn simulate_scenario(input_json: String) -> NapiResult<String> {
    call_json(&input_json, analysis::analyze_scenario)
}

#[napi]
pub fn stress_test(input_json: String) -> NapiResult<String> {
    call_json(&input_json, analysis::analyze_stress)
}

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

#[napi]
pub fn resolve_pd(input_json: String) -> NapiResult<String> {
    call_json(&input_json, analysis::resolve_rating)
}

#[napi]
pub fn migration_pd(input_json: String) -> NapiResult<String> {
    call_json(&input_json, analysis::migration_pd)
}

#[napi]
pub fn validate_transition_matrix(input_json: String) -> NapiResult<String> {
    call_json(&input_json, analysis::validate_matrix)
}

// ---------------------------------------------------------------------------
// Yield curve
// ---------------------------------------------------------------------------

#[napi]
pub fn yield_curve(input_json: String) -> NapiResult<String> {
    call_json(&input_json, analysis::analyze_yield_curve)
}

/// Default calculation parameters, for seeding the parameter editor.
#[napi]
pub fn default_parameters() -> NapiResult<String> {
    serde_json::to_string(&loan_risk_core::CalculationParameters::default()).map_err(to_napi_error)
}
