pub mod error;
pub mod loan;
pub mod math;
pub mod params;
pub mod types;

pub mod metrics;
pub mod portfolio;
pub mod ratings;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "yield_curve")]
pub mod yield_curve;

pub mod analysis;
pub mod validation;

pub use error::LoanRiskError;
pub use loan::{Loan, LoanFees};
pub use params::CalculationParameters;
pub use types::*;

/// Standard result type for all loan-risk computations
pub type LoanRiskResult<T> = Result<T, LoanRiskError>;
