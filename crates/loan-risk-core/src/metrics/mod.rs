pub mod capital;
pub mod loan_metrics;
