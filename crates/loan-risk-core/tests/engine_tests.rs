use chrono::NaiveDate;
use loan_risk_core::analysis::{self, PortfolioInput};
use loan_risk_core::metrics::loan_metrics::{compute_all, compute_loan_metrics};
use loan_risk_core::params::{
    default_transition_matrices, CorrelationModel, RatingScale, TransitionEntry,
};
use loan_risk_core::portfolio::aggregator::{aggregate, compute_portfolio};
use loan_risk_core::ratings::resolver::{resolve_pd, with_resolved_pd};
use loan_risk_core::ratings::transition::{
    migration_adjusted_pd, validate_row_stochastic, DEFAULT_ROW_TOLERANCE,
};
use loan_risk_core::scenarios::simulator::simulate;
use loan_risk_core::{CalculationParameters, Loan, LoanFees, LoanRiskError};
use loan_risk_core::params::ScenarioShock;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_base_loan() -> Loan {
    Loan {
        id: "TL-001".into(),
        name: Some("Northwind term loan".into()),
        original_amount: dec!(1_000_000),
        drawn_amount: dec!(1_000_000),
        undrawn_amount: dec!(0),
        ead: None,
        pd: dec!(0.02),
        lgd: dec!(0.45),
        margin: dec!(0.025),
        reference_rate: dec!(0.035),
        fees: LoanFees {
            upfront: dec!(15_000),
            commitment: dec!(0.004),
            agency: dec!(5_000),
            other: dec!(0),
        },
        start_date: date(2024, 3, 1),
        end_date: date(2029, 3, 1),
        internal_rating: "BBB".into(),
        currency: Default::default(),
        sector: Some("Industrials".into()),
    }
}

fn make_book() -> Vec<Loan> {
    let base = make_base_loan();
    vec![
        base.clone(),
        Loan {
            id: "RCF-002".into(),
            drawn_amount: dec!(2_000_000),
            undrawn_amount: dec!(3_000_000),
            original_amount: dec!(5_000_000),
            pd: dec!(0.005),
            lgd: dec!(0.4),
            internal_rating: "BBB".into(),
            sector: Some("Utilities".into()),
            ..base.clone()
        },
        Loan {
            id: "LBO-003".into(),
            original_amount: dec!(3_000_000),
            drawn_amount: dec!(3_000_000),
            pd: dec!(0.06),
            lgd: dec!(0.55),
            margin: dec!(0.045),
            internal_rating: "B".into(),
            sector: Some("Industrials".into()),
            ..base
        },
    ]
}

// ===========================================================================
// Loan metrics
// ===========================================================================

#[test]
fn test_expected_loss_is_pd_lgd_ead() {
    let params = CalculationParameters::default();
    for loan in make_book() {
        let m = compute_loan_metrics(&loan, &params);
        assert_eq!(m.expected_loss, loan.pd * loan.lgd * loan.exposure_at_default());
    }
    let m = compute_loan_metrics(&make_base_loan(), &params);
    assert_eq!(m.expected_loss, dec!(9_000));
}

#[test]
fn test_pd_and_lgd_zero_are_tolerated() {
    let params = CalculationParameters::default();
    for (pd, lgd) in [(dec!(0), dec!(0.45)), (dec!(0.02), dec!(0)), (dec!(0), dec!(0))] {
        let loan = Loan {
            pd,
            lgd,
            ..make_base_loan()
        };
        let m = compute_loan_metrics(&loan, &params);
        assert_eq!(m.expected_loss, Decimal::ZERO);
        assert_eq!(m.capital_consumption, Decimal::ZERO);
        assert_eq!(m.roe, Decimal::ZERO);
        assert_eq!(m.raroc, Decimal::ZERO);
    }
}

#[test]
fn test_matured_loan_uses_clamped_maturity() {
    let params = CalculationParameters::default().with_valuation_date(date(2031, 1, 1));
    let m = compute_loan_metrics(&make_base_loan(), &params);
    assert_eq!(m.years_to_maturity, Decimal::ZERO);
    assert_eq!(m.maturity_adjustment, Decimal::ONE);
    assert!(m.rwa > Decimal::ZERO);
}

#[test]
fn test_rwa_never_falls_across_pd_grid() {
    let params = CalculationParameters::default();
    let mut previous = Decimal::ZERO;
    for step in 0..=20 {
        let loan = Loan {
            pd: Decimal::from(step) * dec!(0.05),
            ..make_base_loan()
        };
        let m = compute_loan_metrics(&loan, &params);
        assert!(m.rwa >= previous, "RWA fell at PD {}: {} < {}", loan.pd, m.rwa, previous);
        previous = m.rwa;
    }

    // A defaulted loan is charged the peak capital, not zero
    let near_default = compute_loan_metrics(&Loan { pd: dec!(0.95), ..make_base_loan() }, &params);
    let defaulted = compute_loan_metrics(&Loan { pd: Decimal::ONE, ..make_base_loan() }, &params);
    assert!(defaulted.rwa > Decimal::ZERO);
    assert_eq!(defaulted.rwa, near_default.rwa);
}

#[test]
fn test_parameter_swap_changes_next_result() {
    let loan = make_base_loan();
    let before = compute_loan_metrics(&loan, &CalculationParameters::default());
    let edited = CalculationParameters {
        capital_ratio: dec!(0.13),
        ..Default::default()
    };
    let after = compute_loan_metrics(&loan, &edited);
    assert_eq!(before.rwa, after.rwa);
    assert!(after.capital_consumption > before.capital_consumption);
    assert!(after.roe < before.roe);
}

// ===========================================================================
// Portfolio
// ===========================================================================

#[test]
fn test_flat_benefit_on_fifteen_thousand_el() {
    let loans = vec![
        make_base_loan(),
        Loan {
            id: "TL-004".into(),
            pd: dec!(0.01),
            lgd: dec!(0.6),
            ..make_base_loan()
        },
    ];
    let out = compute_portfolio(&loans, &CalculationParameters::default()).unwrap();
    assert_eq!(out.total_expected_loss, dec!(15_000));
    assert_eq!(out.portfolio_expected_loss, dec!(12_000));
    assert_eq!(out.diversification_benefit, dec!(3_000));
}

#[test]
fn test_portfolio_roe_is_capital_weighted_not_mean() {
    // Same profit basis, different capital
    let params = CalculationParameters::default();
    let loans = vec![
        Loan {
            id: "X".into(),
            pd: dec!(0.003),
            ..make_base_loan()
        },
        Loan {
            id: "Y".into(),
            pd: dec!(0.08),
            ..make_base_loan()
        },
    ];
    let metrics = compute_all(&loans, &params);
    assert_ne!(metrics[0].capital_consumption, metrics[1].capital_consumption);

    let out = aggregate(&loans, &metrics, &params).unwrap();
    let pat: Decimal = metrics.iter().map(|m| m.profit_after_tax).sum();
    let capital: Decimal = metrics.iter().map(|m| m.capital_consumption).sum();
    assert_eq!(out.portfolio_roe, pat / capital);
    assert_ne!(out.portfolio_roe, (metrics[0].roe + metrics[1].roe) / dec!(2));
}

#[test]
fn test_sector_matrix_benefit_between_extremes() {
    let loans = make_book();
    let with_model = |model| {
        let params = CalculationParameters {
            correlation_model: model,
            ..Default::default()
        };
        compute_portfolio(&loans, &params).unwrap()
    };
    let independent = with_model(CorrelationModel::SingleFactor {
        asset_correlation: Decimal::ZERO,
    });
    let comonotone = with_model(CorrelationModel::SingleFactor {
        asset_correlation: Decimal::ONE,
    });
    let sectors = with_model(CorrelationModel::Matrix {
        sectors: vec!["Industrials".into(), "Utilities".into()],
        correlations: vec![vec![dec!(0.6), dec!(0.2)], vec![dec!(0.2), dec!(0.5)]],
    });

    assert!(independent.portfolio_expected_loss < sectors.portfolio_expected_loss);
    assert!(sectors.portfolio_expected_loss < comonotone.portfolio_expected_loss);
    assert!(comonotone.diversification_benefit.abs() < dec!(0.01));
}

#[test]
fn test_mismatched_metrics_rejected() {
    let loans = make_book();
    let params = CalculationParameters::default();
    let metrics = compute_all(&loans[..2], &params);
    assert!(matches!(
        aggregate(&loans, &metrics, &params),
        Err(LoanRiskError::InvalidInput { .. })
    ));
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn test_identity_scenario_equals_base() {
    let loans = make_book();
    let params = CalculationParameters::default().with_valuation_date(date(2025, 6, 30));
    let base = compute_portfolio(&loans, &params).unwrap();
    let sim = simulate(&loans, &params, &ScenarioShock::identity()).unwrap();
    assert_eq!(sim, base);
}

#[test]
fn test_simulation_leaves_inputs_untouched() {
    let loans = make_book();
    let snapshot = loans.clone();
    let shock = ScenarioShock {
        pd_multiplier: dec!(3),
        lgd_multiplier: dec!(1.5),
        rate_shift: dec!(0.02),
        spread_shift: dec!(0.01),
    };
    simulate(&loans, &CalculationParameters::default(), &shock).unwrap();
    assert_eq!(loans, snapshot);
}

// ===========================================================================
// Ratings and migration
// ===========================================================================

#[test]
fn test_rating_lookup_and_substitution() {
    let params = CalculationParameters::default();
    let pd = resolve_pd(&RatingScale::SandP, "B", &params.rating_pd_mappings).unwrap();
    assert_eq!(pd, dec!(0.0341));

    let loan = with_resolved_pd(&make_base_loan(), &RatingScale::SandP, &params.rating_pd_mappings)
        .unwrap();
    assert_eq!(loan.pd, dec!(0.0018));
}

#[test]
fn test_horizon_one_is_weighted_sum_of_row() {
    let params = CalculationParameters::default();
    let entries = &params.transition_matrices[&RatingScale::SandP];
    let table = &params.rating_pd_mappings[&RatingScale::SandP];
    let expected: Decimal = entries
        .iter()
        .filter(|e| e.from == "BB")
        .map(|e| e.probability * table.get(&e.to).unwrap())
        .sum();

    let pd = migration_adjusted_pd(
        &RatingScale::SandP,
        "BB",
        1,
        &params.transition_matrices,
        &params.rating_pd_mappings,
    )
    .unwrap();
    assert!((pd - expected).abs() < dec!(0.0000000001));
}

#[test]
fn test_longer_horizon_raises_investment_grade_pd() {
    let params = CalculationParameters::default();
    let pd_at = |h| {
        migration_adjusted_pd(
            &RatingScale::SandP,
            "A",
            h,
            &params.transition_matrices,
            &params.rating_pd_mappings,
        )
        .unwrap()
    };
    assert!(pd_at(3) > pd_at(1));
    assert_eq!(pd_at(0), dec!(0.0006));
}

#[test]
fn test_perturbed_cell_flips_row_only() {
    let mut entries: Vec<TransitionEntry> = default_transition_matrices()
        .remove(&RatingScale::SandP)
        .unwrap();
    assert!(validate_row_stochastic(&entries, DEFAULT_ROW_TOLERANCE).valid);

    let cell = entries
        .iter_mut()
        .find(|e| e.from == "BBB" && e.to == "BBB")
        .unwrap();
    cell.probability += dec!(0.011);

    let report = validate_row_stochastic(&entries, DEFAULT_ROW_TOLERANCE);
    assert!(!report.valid);
    assert!(!report.row("BBB").unwrap().valid);
    assert!(report.row("A").unwrap().valid);
    assert_eq!(report.warnings.len(), 1);
}

// ===========================================================================
// Envelope
// ===========================================================================

#[test]
fn test_portfolio_envelope_carries_warnings() {
    let mut loans = make_book();
    loans[0].drawn_amount = dec!(1_200_000);
    let out = analysis::analyze_portfolio(&PortfolioInput {
        loans,
        params: CalculationParameters::default(),
    })
    .unwrap();
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].contains("TL-001"));
    assert_eq!(out.metadata.precision, "rust_decimal_128bit");
}
