use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_risk_core::analysis::{self, MatrixValidationInput, MigrationInput, RatingLookupInput};
use loan_risk_core::params::{RatingScale, TransitionEntry};
use loan_risk_core::ratings::transition::DEFAULT_ROW_TOLERANCE;

use crate::input;
use crate::GlobalOpts;

/// Arguments for a rating-to-PD lookup
#[derive(Args)]
pub struct ResolvePdArgs {
    /// Rating scale (S&P, Moody's, Fitch, Internal, or a custom name)
    #[arg(long, default_value = "S&P")]
    pub scale: String,

    /// Rating label, matched exactly
    #[arg(long)]
    pub rating: String,
}

/// Arguments for a migration-adjusted PD
#[derive(Args)]
pub struct MigrationArgs {
    /// Rating scale whose transition matrix is used
    #[arg(long, default_value = "S&P")]
    pub scale: String,

    /// Starting rating
    #[arg(long)]
    pub from: String,

    /// Horizon in whole years
    #[arg(long, default_value_t = 1)]
    pub horizon: u32,
}

/// Arguments for a transition matrix check
#[derive(Args)]
pub struct ValidateMatrixArgs {
    /// JSON file with a list of {from, to, probability} entries; when absent
    /// the matrix configured for --scale is checked
    #[arg(long)]
    pub input: Option<String>,

    /// Rating scale whose configured matrix is checked
    #[arg(long, default_value = "S&P")]
    pub scale: String,

    /// Allowed |row sum - 1|
    #[arg(long)]
    pub tolerance: Option<Decimal>,
}

pub fn run_resolve_pd(args: ResolvePdArgs, opts: &GlobalOpts) -> Result<Value, Box<dyn std::error::Error>> {
    let params = input::resolve_params(opts, None)?;
    let result = analysis::resolve_rating(&RatingLookupInput {
        scale: RatingScale::from(args.scale),
        rating: args.rating,
        params,
    })?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_migration_pd(args: MigrationArgs, opts: &GlobalOpts) -> Result<Value, Box<dyn std::error::Error>> {
    let params = input::resolve_params(opts, None)?;
    let result = analysis::migration_pd(&MigrationInput {
        scale: RatingScale::from(args.scale),
        from: args.from,
        horizon_years: args.horizon,
        params,
    })?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_validate_matrix(
    args: ValidateMatrixArgs,
    opts: &GlobalOpts,
) -> Result<Value, Box<dyn std::error::Error>> {
    let entries: Option<Vec<TransitionEntry>> = match args.input {
        Some(ref path) => Some(input::file::read_json(path)?),
        None => None,
    };
    let params = input::resolve_params(opts, None)?;
    let result = analysis::validate_matrix(&MatrixValidationInput {
        entries,
        scale: Some(RatingScale::from(args.scale)),
        tolerance: args.tolerance.unwrap_or(DEFAULT_ROW_TOLERANCE),
        params,
    })?;
    Ok(serde_json::to_value(result)?)
}
