pub mod file;
pub mod stdin;

use chrono::Local;
use loan_risk_core::CalculationParameters;
use serde_json::Value;

use crate::GlobalOpts;

/// The command's JSON input: `--input` file first, then piped stdin.
pub fn read_input(path: Option<&str>) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(Some(file::read_json_value(p)?)),
        None => stdin::read_stdin(),
    }
}

/// Parameters for this run: the `--params` file wins over parameters
/// embedded in the input, which win over the built-in defaults. The
/// valuation date comes from `--as-of`, then the parameters, then today.
pub fn resolve_params(
    opts: &GlobalOpts,
    embedded: Option<CalculationParameters>,
) -> Result<CalculationParameters, Box<dyn std::error::Error>> {
    let mut params = match &opts.params {
        Some(path) => file::read_params(path)?,
        None => embedded.unwrap_or_default(),
    };
    if let Some(date) = opts.as_of {
        params.valuation_date = Some(date);
    }
    if params.valuation_date.is_none() {
        params.valuation_date = Some(Local::now().date_naive());
    }
    Ok(params)
}

/// Pull an optional `params` object out of an input document.
pub fn take_params(value: &mut Value) -> Result<Option<CalculationParameters>, Box<dyn std::error::Error>> {
    match value.as_object_mut().and_then(|m| m.remove("params")) {
        Some(p) => Ok(Some(serde_json::from_value(p)?)),
        None => Ok(None),
    }
}
