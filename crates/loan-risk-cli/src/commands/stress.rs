use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_risk_core::analysis::{self, PortfolioInput, ScenarioInput};
use loan_risk_core::params::ScenarioShock;

use crate::commands::loans::read_loans;
use crate::GlobalOpts;

/// Arguments for the configured stress run
#[derive(Args)]
pub struct StressArgs {
    /// Path to JSON input file (list of loans, or {"loans": [...], "params": {...}})
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a single ad-hoc scenario
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SimulateArgs {
    /// Path to JSON input file (list of loans, or {"loans": [...], "params": {...}})
    #[arg(long)]
    pub input: Option<String>,

    /// Multiplier applied to every PD (result clamped to [0, 1])
    #[arg(long, default_value = "1")]
    pub pd_multiplier: Decimal,

    /// Multiplier applied to every LGD (result clamped to [0, 1])
    #[arg(long, default_value = "1")]
    pub lgd_multiplier: Decimal,

    /// Additive shift to the reference rate (0.01 = +100bp)
    #[arg(long, default_value = "0")]
    pub rate_shift: Decimal,

    /// Additive shift to the loan margin
    #[arg(long, default_value = "0")]
    pub spread_shift: Decimal,
}

pub fn run_stress(args: StressArgs, opts: &GlobalOpts) -> Result<Value, Box<dyn std::error::Error>> {
    let (loans, params) = read_loans(args.input.as_deref(), opts)?;
    let result = analysis::analyze_stress(&PortfolioInput { loans, params })?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_simulate(args: SimulateArgs, opts: &GlobalOpts) -> Result<Value, Box<dyn std::error::Error>> {
    let (loans, params) = read_loans(args.input.as_deref(), opts)?;
    let shock = ScenarioShock {
        pd_multiplier: args.pd_multiplier,
        lgd_multiplier: args.lgd_multiplier,
        rate_shift: args.rate_shift,
        spread_shift: args.spread_shift,
    };
    let result = analysis::analyze_scenario(&ScenarioInput {
        loans,
        params,
        shock,
    })?;
    Ok(serde_json::to_value(result)?)
}
