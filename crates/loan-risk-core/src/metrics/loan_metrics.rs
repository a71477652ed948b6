use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loan::Loan;
use crate::math::safe_div;
use crate::metrics::capital::{capital_requirement, RWA_MULTIPLIER};
use crate::params::{CalculationParameters, EvaSaleStrategy};
use crate::types::{Money, Rate, Years};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Regulatory and profitability metrics of a single loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanMetrics {
    pub loan_id: String,
    pub ead: Money,
    pub expected_loss: Money,
    pub rwa: Money,
    pub capital_consumption: Money,
    pub roe: Rate,
    pub raroc: Rate,
    pub eva_intrinsic: Money,
    pub eva_sale: Money,
    /// EL per unit of original amount
    pub cost_of_risk: Rate,
    /// Profit after tax per unit of original amount
    pub net_margin: Rate,
    /// All-in rate the loan must earn to meet the target return
    pub effective_yield: Rate,
    pub annual_income: Money,
    pub profit_before_tax: Money,
    pub profit_after_tax: Money,
    /// K, capital per unit of EAD
    pub capital_factor: Decimal,
    pub maturity_adjustment: Decimal,
    pub asset_correlation: Decimal,
    pub years_to_maturity: Years,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute every per-loan metric.
///
/// Pure and infallible: degenerate inputs (zero capital, zero life, zero
/// original amount) resolve to zero on the affected ratio rather than
/// failing the whole portfolio.
pub fn compute_loan_metrics(loan: &Loan, params: &CalculationParameters) -> LoanMetrics {
    let ead = loan.exposure_at_default();
    let expected_loss = loan.pd * loan.lgd * ead;

    let years_to_maturity = loan.years_to_maturity(params.valuation_date);
    let capital = capital_requirement(
        loan.pd,
        loan.lgd,
        years_to_maturity,
        params.capital_formula,
    );
    let rwa = capital.capital_factor * RWA_MULTIPLIER * ead;
    let capital_consumption = rwa * params.capital_ratio;

    let annual_income = annual_income(loan);
    let funding = params.funding_cost * loan.drawn_amount;
    let operating_cost = params.operational_cost_ratio * loan.original_amount;

    let profit_before_tax = annual_income - funding - operating_cost - expected_loss;
    let profit_after_tax = profit_before_tax * (Decimal::ONE - params.corporate_tax_rate);

    if capital_consumption.is_zero() {
        tracing::debug!(loan_id = %loan.id, "zero capital consumption; ROE and RAROC set to 0");
    }
    let roe = safe_div(profit_after_tax, capital_consumption);
    let raroc = safe_div(profit_before_tax, capital_consumption);
    let eva_intrinsic = (roe - params.target_roe) * capital_consumption;

    let eva_sale = match params.eva_sale_strategy {
        EvaSaleStrategy::Intrinsic => eva_intrinsic,
        EvaSaleStrategy::SalePrice {
            sale_price_factor,
            capital_cost_rate,
        } => {
            let sale_pbt =
                sale_price_factor * ead - funding - capital_cost_rate * capital_consumption;
            let sale_pat = sale_pbt * (Decimal::ONE - params.corporate_tax_rate);
            let sale_roe = safe_div(sale_pat, capital_consumption);
            (sale_roe - params.target_roe) * capital_consumption
        }
    };

    let cost_of_risk = safe_div(expected_loss, loan.original_amount);
    let net_margin = safe_div(profit_after_tax, loan.original_amount);
    let effective_yield = loan.reference_rate
        + params.funding_index_rate
        + loan.margin
        + params.operational_cost_ratio
        + params.target_roe * params.capital_ratio;

    LoanMetrics {
        loan_id: loan.id.clone(),
        ead,
        expected_loss,
        rwa,
        capital_consumption,
        roe,
        raroc,
        eva_intrinsic,
        eva_sale,
        cost_of_risk,
        net_margin,
        effective_yield,
        annual_income,
        profit_before_tax,
        profit_after_tax,
        capital_factor: capital.capital_factor,
        maturity_adjustment: capital.maturity_adjustment,
        asset_correlation: capital.asset_correlation,
        years_to_maturity,
    }
}

/// Metrics for every loan, in input order.
#[cfg(not(feature = "parallel"))]
pub fn compute_all(loans: &[Loan], params: &CalculationParameters) -> Vec<LoanMetrics> {
    loans
        .iter()
        .map(|loan| compute_loan_metrics(loan, params))
        .collect()
}

/// Metrics for every loan, in input order, computed on the rayon pool.
#[cfg(feature = "parallel")]
pub fn compute_all(loans: &[Loan], params: &CalculationParameters) -> Vec<LoanMetrics> {
    use rayon::prelude::*;

    loans
        .par_iter()
        .map(|loan| compute_loan_metrics(loan, params))
        .collect()
}

/// Interest on the drawn amount, commitment fee on the undrawn amount and
/// the flat annual share of upfront, agency and other fees.
fn annual_income(loan: &Loan) -> Money {
    let interest = (loan.margin + loan.reference_rate) * loan.drawn_amount;
    let commitment = loan.fees.commitment * loan.undrawn_amount;
    let fees = safe_div(loan.amortising_fees(), loan.life_years());
    interest + commitment + fees
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::LoanFees;
    use crate::params::CapitalFormula;
    use crate::types::Currency;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn make_base_loan() -> Loan {
        Loan {
            id: "L-100".into(),
            name: Some("Acme Term Loan".into()),
            original_amount: dec!(1_000_000),
            drawn_amount: dec!(1_000_000),
            undrawn_amount: dec!(0),
            ead: None,
            pd: dec!(0.02),
            lgd: dec!(0.45),
            margin: dec!(0.025),
            reference_rate: dec!(0.03),
            fees: LoanFees::default(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            internal_rating: "7".into(),
            currency: Currency::EUR,
            sector: None,
        }
    }

    #[test]
    fn test_expected_loss_is_exact() {
        let m = compute_loan_metrics(&make_base_loan(), &CalculationParameters::default());
        assert_eq!(m.expected_loss, dec!(9000));
        assert_eq!(m.ead, dec!(1_000_000));
    }

    #[test]
    fn test_explicit_ead_overrides_drawn() {
        let loan = Loan {
            ead: Some(dec!(500_000)),
            ..make_base_loan()
        };
        let m = compute_loan_metrics(&loan, &CalculationParameters::default());
        assert_eq!(m.expected_loss, dec!(4500));
    }

    #[test]
    fn test_rwa_and_capital_chain() {
        let params = CalculationParameters::default();
        let m = compute_loan_metrics(&make_base_loan(), &params);
        assert_eq!(m.rwa, m.capital_factor * dec!(12.5) * m.ead);
        assert_eq!(m.capital_consumption, m.rwa * params.capital_ratio);
        assert!(m.capital_factor > Decimal::ZERO);
    }

    #[test]
    fn test_income_and_profit() {
        let params = CalculationParameters::default();
        let m = compute_loan_metrics(&make_base_loan(), &params);
        // (2.5% + 3%) × 1,000,000
        assert_eq!(m.annual_income, dec!(55_000));
        // 55,000 − 30,000 funding − 5,000 opcost − 9,000 EL
        assert_eq!(m.profit_before_tax, dec!(11_000));
        assert_eq!(m.profit_after_tax, dec!(8_250));
        assert!(approx_eq(m.roe, m.profit_after_tax / m.capital_consumption, dec!(0.0000001)));
        assert!(approx_eq(m.raroc, m.profit_before_tax / m.capital_consumption, dec!(0.0000001)));
    }

    #[test]
    fn test_fees_amortised_over_life() {
        let loan = Loan {
            drawn_amount: dec!(800_000),
            undrawn_amount: dec!(200_000),
            fees: LoanFees {
                upfront: dec!(10_000),
                commitment: dec!(0.005),
                agency: dec!(2_000),
                other: dec!(0),
            },
            ..make_base_loan()
        };
        let m = compute_loan_metrics(&loan, &CalculationParameters::default());
        let expected = dec!(0.055) * dec!(800_000)
            + dec!(0.005) * dec!(200_000)
            + dec!(12_000) / loan.life_years();
        assert_eq!(m.annual_income, expected);
    }

    #[test]
    fn test_zero_life_drops_fee_term() {
        let loan = Loan {
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            fees: LoanFees {
                upfront: dec!(10_000),
                ..Default::default()
            },
            ..make_base_loan()
        };
        let m = compute_loan_metrics(&loan, &CalculationParameters::default());
        assert_eq!(m.annual_income, dec!(55_000));
        assert_eq!(m.years_to_maturity, Decimal::ZERO);
    }

    #[test]
    fn test_zero_capital_gives_zero_returns() {
        let loan = Loan {
            pd: dec!(0),
            ..make_base_loan()
        };
        let m = compute_loan_metrics(&loan, &CalculationParameters::default());
        assert_eq!(m.capital_consumption, Decimal::ZERO);
        assert_eq!(m.roe, Decimal::ZERO);
        assert_eq!(m.raroc, Decimal::ZERO);
        assert_eq!(m.eva_intrinsic, Decimal::ZERO);
    }

    #[test]
    fn test_eva_intrinsic() {
        let params = CalculationParameters::default();
        let m = compute_loan_metrics(&make_base_loan(), &params);
        let expected = (m.roe - params.target_roe) * m.capital_consumption;
        assert_eq!(m.eva_intrinsic, expected);
        assert_eq!(m.eva_sale, m.eva_intrinsic);
    }

    #[test]
    fn test_eva_sale_price_strategy() {
        let params = CalculationParameters {
            eva_sale_strategy: EvaSaleStrategy::SalePrice {
                sale_price_factor: dec!(0.05),
                capital_cost_rate: dec!(0.0),
            },
            ..Default::default()
        };
        let m = compute_loan_metrics(&make_base_loan(), &params);
        // sale PBT = 50,000 − 30,000 = 20,000; PAT = 15,000
        let expected = (dec!(15_000) / m.capital_consumption - params.target_roe)
            * m.capital_consumption;
        assert!(approx_eq(m.eva_sale, expected, dec!(0.0001)));
        assert_ne!(m.eva_sale, m.eva_intrinsic);
    }

    #[test]
    fn test_ratios_per_original_amount() {
        let m = compute_loan_metrics(&make_base_loan(), &CalculationParameters::default());
        assert_eq!(m.cost_of_risk, dec!(0.009));
        assert_eq!(m.net_margin, dec!(0.00825));
    }

    #[test]
    fn test_zero_original_amount_ratios_are_zero() {
        let loan = Loan {
            original_amount: dec!(0),
            ..make_base_loan()
        };
        let m = compute_loan_metrics(&loan, &CalculationParameters::default());
        assert_eq!(m.cost_of_risk, Decimal::ZERO);
        assert_eq!(m.net_margin, Decimal::ZERO);
    }

    #[test]
    fn test_effective_yield() {
        let params = CalculationParameters {
            funding_index_rate: dec!(0.001),
            ..Default::default()
        };
        let m = compute_loan_metrics(&make_base_loan(), &params);
        // 3% + 0.1% + 2.5% + 0.5% + 12% × 10.5%
        assert_eq!(m.effective_yield, dec!(0.0736));
    }

    #[test]
    fn test_valuation_date_shortens_maturity() {
        let base = CalculationParameters::default();
        let later = base
            .clone()
            .with_valuation_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        let at_start = compute_loan_metrics(&make_base_loan(), &base);
        let near_end = compute_loan_metrics(&make_base_loan(), &later);
        assert!(near_end.years_to_maturity < at_start.years_to_maturity);
        assert!(near_end.rwa < at_start.rwa);
        assert_eq!(near_end.maturity_adjustment, Decimal::ONE);
    }

    #[test]
    fn test_legacy_formula_changes_capital_only() {
        let legacy = CalculationParameters {
            capital_formula: CapitalFormula::Legacy,
            ..Default::default()
        };
        let reg = compute_loan_metrics(&make_base_loan(), &CalculationParameters::default());
        let leg = compute_loan_metrics(&make_base_loan(), &legacy);
        assert_eq!(reg.expected_loss, leg.expected_loss);
        assert_eq!(reg.profit_before_tax, leg.profit_before_tax);
        assert_ne!(reg.rwa, leg.rwa);
    }

    #[test]
    fn test_compute_all_preserves_order() {
        let loans: Vec<Loan> = (0..5)
            .map(|i| Loan {
                id: format!("L-{}", i),
                ..make_base_loan()
            })
            .collect();
        let metrics = compute_all(&loans, &CalculationParameters::default());
        let ids: Vec<&str> = metrics.iter().map(|m| m.loan_id.as_str()).collect();
        assert_eq!(ids, vec!["L-0", "L-1", "L-2", "L-3", "L-4"]);
    }
}
