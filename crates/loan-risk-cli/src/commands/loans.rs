use clap::Args;
use serde_json::Value;

use loan_risk_core::analysis::{self, LoanInput, PortfolioInput};
use loan_risk_core::{CalculationParameters, Loan};

use crate::input;
use crate::GlobalOpts;

/// Arguments for loan and portfolio commands
#[derive(Args)]
pub struct LoanArgs {
    /// Path to JSON input file: a loan (or list of loans), optionally
    /// wrapped as {"loan": ...} / {"loans": [...]} with embedded "params"
    #[arg(long)]
    pub input: Option<String>,
}

/// Split an input document into loans and any embedded parameters.
pub fn read_loans(
    path: Option<&str>,
    opts: &GlobalOpts,
) -> Result<(Vec<Loan>, CalculationParameters), Box<dyn std::error::Error>> {
    let mut data = input::read_input(path)?
        .ok_or("--input file is required (or pipe JSON on stdin)")?;
    let embedded = input::take_params(&mut data)?;

    let loans: Vec<Loan> = match data {
        Value::Array(items) => serde_json::from_value(Value::Array(items))?,
        Value::Object(mut map) => {
            if let Some(list) = map.remove("loans") {
                serde_json::from_value(list)?
            } else if let Some(single) = map.remove("loan") {
                vec![serde_json::from_value(single)?]
            } else {
                vec![serde_json::from_value(Value::Object(map))?]
            }
        }
        _ => return Err("input must be a loan object or an array of loans".into()),
    };

    let params = input::resolve_params(opts, embedded)?;
    Ok((loans, params))
}

fn single_loan(
    args: &LoanArgs,
    opts: &GlobalOpts,
) -> Result<LoanInput, Box<dyn std::error::Error>> {
    let (mut loans, params) = read_loans(args.input.as_deref(), opts)?;
    if loans.len() != 1 {
        return Err(format!("expected exactly one loan, got {}", loans.len()).into());
    }
    let loan = loans.remove(0);
    Ok(LoanInput { loan, params })
}

pub fn run_loan_metrics(args: LoanArgs, opts: &GlobalOpts) -> Result<Value, Box<dyn std::error::Error>> {
    let loan_input = single_loan(&args, opts)?;
    let result = analysis::analyze_loan(&loan_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_portfolio(args: LoanArgs, opts: &GlobalOpts) -> Result<Value, Box<dyn std::error::Error>> {
    let (loans, params) = read_loans(args.input.as_deref(), opts)?;
    let result = analysis::analyze_portfolio(&PortfolioInput { loans, params })?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_yield_curve(args: LoanArgs, opts: &GlobalOpts) -> Result<Value, Box<dyn std::error::Error>> {
    let loan_input = single_loan(&args, opts)?;
    let result = analysis::analyze_yield_curve(&loan_input)?;
    Ok(serde_json::to_value(result)?)
}
