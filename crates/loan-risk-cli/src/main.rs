mod commands;
mod input;
mod output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::loans::LoanArgs;
use commands::ratings::{MigrationArgs, ResolvePdArgs, ValidateMatrixArgs};
use commands::stress::{SimulateArgs, StressArgs};

/// Commercial loan credit-risk and profitability metrics
#[derive(Parser)]
#[command(
    name = "lre",
    version,
    about = "Commercial loan credit-risk and profitability metrics",
    long_about = "A CLI for computing expected loss, Basel IRB capital, ROE, RAROC and EVA \
                  for commercial loans and portfolios with decimal precision. Supports \
                  rating-to-PD lookups, multi-year migration PDs, stress scenarios and \
                  effective-yield decomposition."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Calculation parameters file (JSON or YAML); built-in defaults otherwise
    #[arg(long, global = true)]
    params: Option<String>,

    /// Valuation date for remaining maturity (YYYY-MM-DD); defaults to today
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Metrics for a single loan (EL, RWA, capital, ROE, RAROC, EVA)
    LoanMetrics(LoanArgs),
    /// Per-loan metrics and portfolio aggregate
    Portfolio(LoanArgs),
    /// Run every configured stress scenario against a portfolio
    Stress(StressArgs),
    /// Run a portfolio under one ad-hoc shock
    Simulate(SimulateArgs),
    /// Look up the PD of a rating label
    ResolvePd(ResolvePdArgs),
    /// Migration-adjusted PD over a multi-year horizon
    MigrationPd(MigrationArgs),
    /// Check that transition matrix rows sum to one
    ValidateMatrix(ValidateMatrixArgs),
    /// Monthly effective-yield decomposition of a loan
    YieldCurve(LoanArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Options shared by every command.
pub struct GlobalOpts {
    pub params: Option<String>,
    pub as_of: Option<NaiveDate>,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let opts = GlobalOpts {
        params: cli.params,
        as_of: cli.as_of,
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::LoanMetrics(args) => commands::loans::run_loan_metrics(args, &opts),
        Commands::Portfolio(args) => commands::loans::run_portfolio(args, &opts),
        Commands::Stress(args) => commands::stress::run_stress(args, &opts),
        Commands::Simulate(args) => commands::stress::run_simulate(args, &opts),
        Commands::ResolvePd(args) => commands::ratings::run_resolve_pd(args, &opts),
        Commands::MigrationPd(args) => commands::ratings::run_migration_pd(args, &opts),
        Commands::ValidateMatrix(args) => commands::ratings::run_validate_matrix(args, &opts),
        Commands::YieldCurve(args) => commands::loans::run_yield_curve(args, &opts),
        Commands::Version => {
            println!("lre {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
