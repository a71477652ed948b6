use std::collections::HashMap;

use crate::error::LoanRiskError;
use crate::loan::Loan;
use crate::params::{RatingScale, RatingTable};
use crate::types::Rate;
use crate::LoanRiskResult;

/// Look up the baseline one-year PD of `rating` on `scale`.
///
/// Fails with [`LoanRiskError::RatingNotFound`] when either the scale has no
/// table or the label is not in it. No notch is ever guessed; the caller
/// decides on a fallback.
pub fn resolve_pd(
    scale: &RatingScale,
    rating: &str,
    mappings: &HashMap<RatingScale, RatingTable>,
) -> LoanRiskResult<Rate> {
    mappings
        .get(scale)
        .and_then(|table| table.get(rating))
        .ok_or_else(|| LoanRiskError::RatingNotFound {
            scale: scale.to_string(),
            rating: rating.to_string(),
        })
}

/// Resolve the PD implied by a loan's internal rating on `scale`.
pub fn resolve_loan_pd(
    loan: &Loan,
    scale: &RatingScale,
    mappings: &HashMap<RatingScale, RatingTable>,
) -> LoanRiskResult<Rate> {
    resolve_pd(scale, &loan.internal_rating, mappings)
}

/// A copy of `loan` whose `pd` is replaced by the table PD of its rating.
pub fn with_resolved_pd(
    loan: &Loan,
    scale: &RatingScale,
    mappings: &HashMap<RatingScale, RatingTable>,
) -> LoanRiskResult<Loan> {
    let pd = resolve_loan_pd(loan, scale, mappings)?;
    Ok(Loan { pd, ..loan.clone() })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
