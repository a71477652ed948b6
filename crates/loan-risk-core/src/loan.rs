use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Currency, Money, Rate, Years};

/// Days per year used for every date-to-year conversion (ACT/365.25).
pub const DAYS_PER_YEAR: Decimal = dec!(365.25);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fee schedule of a facility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanFees {
    /// Upfront / arrangement fee (amount, amortised over the loan life)
    #[serde(default)]
    pub upfront: Money,
    /// Commitment fee (annual rate on the undrawn amount)
    #[serde(default)]
    pub commitment: Rate,
    /// Agency fee (amount, amortised over the loan life)
    #[serde(default)]
    pub agency: Money,
    /// Any other fee (amount, amortised over the loan life)
    #[serde(default)]
    pub other: Money,
}

/// A single commercial loan facility as delivered by the import layer.
///
/// The engine treats loans as immutable; scenario and rating overrides
/// always produce a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub original_amount: Money,
    pub drawn_amount: Money,
    #[serde(default)]
    pub undrawn_amount: Money,
    /// Exposure at default; falls back to the drawn amount when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ead: Option<Money>,
    /// One-year probability of default (0 to 1)
    pub pd: Rate,
    /// Loss given default (0 to 1)
    pub lgd: Rate,
    pub margin: Rate,
    pub reference_rate: Rate,
    #[serde(default)]
    pub fees: LoanFees,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub internal_rating: String,
    #[serde(default)]
    pub currency: Currency,
    /// Industry sector, used by the sector correlation model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

impl Loan {
    /// EAD, or the drawn amount when no explicit EAD was supplied.
    pub fn exposure_at_default(&self) -> Money {
        self.ead.unwrap_or(self.drawn_amount)
    }

    /// Upfront + agency + other fees, i.e. the amounts amortised over the life.
    pub fn amortising_fees(&self) -> Money {
        self.fees.upfront + self.fees.agency + self.fees.other
    }

    /// Contractual life in years, never negative.
    pub fn life_years(&self) -> Years {
        years_between(self.start_date, self.end_date)
    }

    /// Remaining years to maturity measured from `as_of` (or the start date
    /// when no valuation date is given). Matured loans return zero.
    pub fn years_to_maturity(&self, as_of: Option<NaiveDate>) -> Years {
        years_between(as_of.unwrap_or(self.start_date), self.end_date)
    }

    /// Whole calendar months between start and end date, never negative.
    pub fn duration_months(&self) -> u32 {
        months_between(self.start_date, self.end_date)
    }
}

// ---------------------------------------------------------------------------
// Date helpers
// ---------------------------------------------------------------------------

/// Year fraction between two dates (ACT/365.25), clamped at zero.
pub fn years_between(from: NaiveDate, to: NaiveDate) -> Years {
    let days = (to - from).num_days();
    if days <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(days) / DAYS_PER_YEAR
}

/// Whole months from `from` to `to`; a partial final month is not counted.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
