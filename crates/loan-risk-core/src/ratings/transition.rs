use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::LoanRiskError;
use crate::params::{RatingScale, RatingTable, TransitionEntry};
use crate::ratings::resolver::resolve_pd;
use crate::types::Rate;
use crate::LoanRiskResult;

/// Row-sum tolerance used by parameter tooling when none is given.
pub const DEFAULT_ROW_TOLERANCE: Decimal = dec!(0.01);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingProbability {
    pub rating: String,
    pub probability: Rate,
}

/// Row-sum diagnostics for one origin rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCheck {
    pub rating: String,
    pub row_sum: Decimal,
    /// |row_sum - 1|
    pub deviation: Decimal,
    pub valid: bool,
}

/// Non-fatal finding about a transition matrix. Returned as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixValidationWarning {
    pub rating: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowStochasticReport {
    pub rows: Vec<RowCheck>,
    /// True when every row is within tolerance and no cell is negative
    pub valid: bool,
    pub max_row_deviation: Decimal,
    pub tolerance: Decimal,
    pub warnings: Vec<MatrixValidationWarning>,
}

impl RowStochasticReport {
    pub fn row(&self, rating: &str) -> Option<&RowCheck> {
        self.rows.iter().find(|r| r.rating == rating)
    }
}

// ---------------------------------------------------------------------------
// Dense matrix construction and algebra
// ---------------------------------------------------------------------------

/// Rating labels of a sparse matrix, in order of first appearance.
fn matrix_labels(entries: &[TransitionEntry]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for e in entries {
        for label in [&e.from, &e.to] {
            if !labels.iter().any(|l| l == label) {
                labels.push(label.clone());
            }
        }
    }
    labels
}

fn dense_matrix(entries: &[TransitionEntry], labels: &[String]) -> Vec<Vec<Decimal>> {
    let n = labels.len();
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let mut m = vec![vec![Decimal::ZERO; n]; n];
    for e in entries {
        if let (Some(&i), Some(&j)) = (index.get(e.from.as_str()), index.get(e.to.as_str())) {
            m[i][j] += e.probability;
        }
    }
    m
}

fn identity(n: usize) -> Vec<Vec<Decimal>> {
    let mut id = vec![vec![Decimal::ZERO; n]; n];
    for (i, row) in id.iter_mut().enumerate() {
        row[i] = Decimal::ONE;
    }
    id
}

fn overflow_error(horizon_years: u32) -> LoanRiskError {
    LoanRiskError::InvalidInput {
        field: "transition_matrices".into(),
        reason: format!(
            "matrix power overflows at a {}-year horizon; rows must sum to 1",
            horizon_years
        ),
    }
}

/// Product of two square matrices; `None` when a cell overflows.
fn matrix_multiply(a: &[Vec<Decimal>], b: &[Vec<Decimal>]) -> Option<Vec<Vec<Decimal>>> {
    let n = a.len();
    let mut result = vec![vec![Decimal::ZERO; n]; n];
    for i in 0..n {
        for k in 0..n {
            let a_ik = a[i][k];
            if a_ik.is_zero() {
                continue;
            }
            for j in 0..n {
                let term = a_ik.checked_mul(b[k][j])?;
                result[i][j] = result[i][j].checked_add(term)?;
            }
        }
    }
    Some(result)
}

/// Integer matrix power by repeated squaring. `exp == 0` is the identity.
///
/// Fails with `InvalidInput` when a non-stochastic matrix grows past the
/// range of `Decimal`.
fn matrix_power(m: &[Vec<Decimal>], exp: u32) -> LoanRiskResult<Vec<Vec<Decimal>>> {
    if exp == 0 {
        return Ok(identity(m.len()));
    }
    let mut result: Option<Vec<Vec<Decimal>>> = None;
    let mut base = m.to_vec();
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = Some(match result {
                None => base.clone(),
                Some(acc) => matrix_multiply(&acc, &base).ok_or_else(|| overflow_error(exp))?,
            });
        }
        e >>= 1;
        if e > 0 {
            base = matrix_multiply(&base, &base).ok_or_else(|| overflow_error(exp))?;
        }
    }
    Ok(result.unwrap_or_else(|| identity(m.len())))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Forward rating distribution of `from` after `horizon_years` one-year steps.
pub fn migration_distribution(
    scale: &RatingScale,
    from: &str,
    horizon_years: u32,
    matrices: &HashMap<RatingScale, Vec<TransitionEntry>>,
) -> LoanRiskResult<Vec<RatingProbability>> {
    let entries = matrices
        .get(scale)
        .ok_or_else(|| LoanRiskError::TransitionMatrixNotFound {
            scale: scale.to_string(),
        })?;

    let labels = matrix_labels(entries);
    let has_row = entries.iter().any(|e| e.from == from);
    let row_idx = labels
        .iter()
        .position(|l| l == from)
        .filter(|_| has_row)
        .ok_or_else(|| LoanRiskError::RatingNotFound {
            scale: scale.to_string(),
            rating: from.to_string(),
        })?;

    let powered = matrix_power(&dense_matrix(entries, &labels), horizon_years)?;

    Ok(labels
        .into_iter()
        .zip(powered[row_idx].iter())
        .map(|(rating, p)| RatingProbability {
            rating,
            probability: *p,
        })
        .collect())
}

/// Migration-adjusted PD: `Σ_to P^h(from → to) · PD(to)`.
///
/// Every destination rating reachable with non-zero probability must have a
/// PD on the same scale, otherwise the lookup fails rather than guessing.
pub fn migration_adjusted_pd(
    scale: &RatingScale,
    from: &str,
    horizon_years: u32,
    matrices: &HashMap<RatingScale, Vec<TransitionEntry>>,
    mappings: &HashMap<RatingScale, RatingTable>,
) -> LoanRiskResult<Rate> {
    let distribution = migration_distribution(scale, from, horizon_years, matrices)?;

    let mut pd = Decimal::ZERO;
    for cell in distribution.iter().filter(|c| !c.probability.is_zero()) {
        pd = cell
            .probability
            .checked_mul(resolve_pd(scale, &cell.rating, mappings)?)
            .and_then(|weighted| pd.checked_add(weighted))
            .ok_or_else(|| overflow_error(horizon_years))?;
    }

    tracing::debug!(%scale, from, horizon_years, %pd, "migration-adjusted PD");
    Ok(pd)
}

/// Row-stochasticity check. Pure diagnostic: the matrix is never changed.
///
/// A row is valid when |Σ p − 1| ≤ `tolerance` and none of its cells is
/// negative.
pub fn validate_row_stochastic(entries: &[TransitionEntry], tolerance: Decimal) -> RowStochasticReport {
    let mut origins: Vec<&str> = Vec::new();
    for e in entries {
        if !origins.contains(&e.from.as_str()) {
            origins.push(e.from.as_str());
        }
    }

    let mut rows = Vec::with_capacity(origins.len());
    let mut warnings = Vec::new();
    let mut max_row_deviation = Decimal::ZERO;

    for &rating in &origins {
        let cells: Vec<&TransitionEntry> = entries.iter().filter(|e| e.from == rating).collect();
        let row_sum: Decimal = cells.iter().map(|e| e.probability).sum();
        let deviation = (row_sum - Decimal::ONE).abs();
        max_row_deviation = max_row_deviation.max(deviation);

        let mut valid = deviation <= tolerance;
        if !valid {
            warnings.push(MatrixValidationWarning {
                rating: rating.to_string(),
                message: format!(
                    "Row '{}' sums to {} (deviation {} exceeds tolerance {})",
                    rating, row_sum, deviation, tolerance
                ),
            });
        }
        for cell in cells.iter().filter(|e| e.probability < Decimal::ZERO) {
            valid = false;
            warnings.push(MatrixValidationWarning {
                rating: rating.to_string(),
                message: format!(
                    "Negative probability {} for '{}' -> '{}'",
                    cell.probability, cell.from, cell.to
                ),
            });
        }

        rows.push(RowCheck {
            rating: rating.to_string(),
            row_sum,
            deviation,
            valid,
        });
    }

    // Mass reaching a rating with no row of its own leaves the matrix after
    // one more step.
    let mut dangling: Vec<&str> = Vec::new();
    for e in entries {
        let to = e.to.as_str();
        if !e.probability.is_zero() && !origins.contains(&to) && !dangling.contains(&to) {
            dangling.push(to);
            warnings.push(MatrixValidationWarning {
                rating: to.to_string(),
                message: format!(
                    "Rating '{}' is a destination but has no row; multi-year horizons lose its mass",
                    to
                ),
            });
        }
    }

    RowStochasticReport {
        valid: rows.iter().all(|r| r.valid),
        rows,
        max_row_deviation,
        tolerance,
        warnings,
    }
}

/// [`validate_row_stochastic`] for the matrix configured on `scale`.
pub fn validate_scale_matrix(
    scale: &RatingScale,
    matrices: &HashMap<RatingScale, Vec<TransitionEntry>>,
    tolerance: Decimal,
) -> LoanRiskResult<RowStochasticReport> {
    let entries = matrices
        .get(scale)
        .ok_or_else(|| LoanRiskError::TransitionMatrixNotFound {
            scale: scale.to_string(),
        })?;
    Ok(validate_row_stochastic(entries, tolerance))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{default_rating_pd_mappings, default_transition_matrices};

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn entry(from: &str, to: &str, p: Decimal) -> TransitionEntry {
        TransitionEntry {
            from: from.into(),
            to: to.into(),
            probability: p,
        }
    }

    fn two_state() -> (
        HashMap<RatingScale, Vec<TransitionEntry>>,
        HashMap<RatingScale, RatingTable>,
    ) {
        let scale = RatingScale::Internal;
        let mut matrices = HashMap::new();
        matrices.insert(
            scale.clone(),
            vec![
                entry("A", "A", dec!(0.9)),
                entry("A", "D", dec!(0.1)),
                entry("D", "D", Decimal::ONE),
            ],
        );
        let mut mappings = HashMap::new();
        mappings.insert(
            scale,
            RatingTable::from_pairs(&[("A", dec!(0.01)), ("D", Decimal::ONE)]),
        );
        (matrices, mappings)
    }

    #[test]
    fn test_one_year_weighted_sum() {
        let (matrices, mappings) = two_state();
        let pd = migration_adjusted_pd(&RatingScale::Internal, "A", 1, &matrices, &mappings).unwrap();
        // 0.9 * 0.01 + 0.1 * 1
        assert_eq!(pd, dec!(0.109));
    }

    #[test]
    fn test_two_year_uses_matrix_square() {
        let (matrices, mappings) = two_state();
        let pd = migration_adjusted_pd(&RatingScale::Internal, "A", 2, &matrices, &mappings).unwrap();
        // P^2 row A = [0.81, 0.19]
        assert_eq!(pd, dec!(0.1981));
    }

    #[test]
    fn test_three_year_power_matches_repeated_multiplication() {
        let (matrices, _) = two_state();
        let dist = migration_distribution(&RatingScale::Internal, "A", 3, &matrices).unwrap();
        assert_eq!(dist[0].rating, "A");
        assert_eq!(dist[0].probability, dec!(0.729));
        assert_eq!(dist[1].probability, dec!(0.271));
    }

    #[test]
    fn test_zero_horizon_returns_own_pd() {
        let (matrices, mappings) = two_state();
        let pd = migration_adjusted_pd(&RatingScale::Internal, "A", 0, &matrices, &mappings).unwrap();
        assert_eq!(pd, dec!(0.01));
    }

    #[test]
    fn test_default_state_is_absorbing() {
        let matrices = default_transition_matrices();
        let mappings = default_rating_pd_mappings();
        for h in [1, 3, 10] {
            let pd = migration_adjusted_pd(&RatingScale::SandP, "D", h, &matrices, &mappings).unwrap();
            assert_eq!(pd, Decimal::ONE);
        }
    }

    #[test]
    fn test_bbb_one_year_matches_explicit_sum() {
        let matrices = default_transition_matrices();
        let mappings = default_rating_pd_mappings();
        let pd = migration_adjusted_pd(&RatingScale::SandP, "BBB", 1, &matrices, &mappings).unwrap();
        let expected = dec!(0.0002) * dec!(0.0001)
            + dec!(0.0033) * dec!(0.0002)
            + dec!(0.0595) * dec!(0.0006)
            + dec!(0.8693) * dec!(0.0018)
            + dec!(0.0530) * dec!(0.0072)
            + dec!(0.0117) * dec!(0.0341)
            + dec!(0.0012) * dec!(0.2653)
            + dec!(0.0018) * Decimal::ONE;
        assert_eq!(pd, expected);
        // Migration risk pushes the forward PD above the static BBB PD
        assert!(pd > dec!(0.0018));
    }

    #[test]
    fn test_multi_year_pd_increases_with_horizon() {
        let matrices = default_transition_matrices();
        let mappings = default_rating_pd_mappings();
        let one = migration_adjusted_pd(&RatingScale::SandP, "BB", 1, &matrices, &mappings).unwrap();
        let five = migration_adjusted_pd(&RatingScale::SandP, "BB", 5, &matrices, &mappings).unwrap();
        assert!(five > one);
        assert!(five < Decimal::ONE);
    }

    #[test]
    fn test_multi_year_rows_stay_stochastic() {
        let matrices = default_transition_matrices();
        let dist = migration_distribution(&RatingScale::SandP, "A", 7, &matrices).unwrap();
        let total: Decimal = dist.iter().map(|c| c.probability).sum();
        assert!(approx_eq(total, Decimal::ONE, dec!(0.0000000001)));
    }

    #[test]
    fn test_missing_matrix_errors() {
        let matrices = default_transition_matrices();
        let mappings = default_rating_pd_mappings();
        let err = migration_adjusted_pd(&RatingScale::Moodys, "Baa", 1, &matrices, &mappings).unwrap_err();
        assert!(matches!(err, LoanRiskError::TransitionMatrixNotFound { .. }));
    }

    #[test]
    fn test_unknown_origin_rating_errors() {
        let (matrices, mappings) = two_state();
        let err = migration_adjusted_pd(&RatingScale::Internal, "Z", 1, &matrices, &mappings).unwrap_err();
        assert!(matches!(err, LoanRiskError::RatingNotFound { .. }));
    }

    #[test]
    fn test_destination_without_pd_errors() {
        let (matrices, mut mappings) = two_state();
        mappings.get_mut(&RatingScale::Internal).unwrap().remove("D");
        let err = migration_adjusted_pd(&RatingScale::Internal, "A", 1, &matrices, &mappings).unwrap_err();
        match err {
            LoanRiskError::RatingNotFound { rating, .. } => assert_eq!(rating, "D"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_explosive_matrix_fails_instead_of_overflowing() {
        let (mut matrices, mappings) = two_state();
        matrices.insert(
            RatingScale::Internal,
            vec![
                entry("A", "A", dec!(1.5)),
                entry("A", "D", dec!(0.1)),
                entry("D", "D", Decimal::ONE),
            ],
        );
        let err = migration_adjusted_pd(&RatingScale::Internal, "A", 200, &matrices, &mappings)
            .unwrap_err();
        match err {
            LoanRiskError::InvalidInput { field, .. } => assert_eq!(field, "transition_matrices"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(migration_distribution(&RatingScale::Internal, "A", u32::MAX, &matrices).is_err());

        // Short horizons still evaluate: row A of P^2 is [2.25, 0.25]
        let pd = migration_adjusted_pd(&RatingScale::Internal, "A", 2, &matrices, &mappings).unwrap();
        assert_eq!(pd, dec!(0.2725));
    }

    #[test]
    fn test_validate_well_formed_matrix() {
        let matrices = default_transition_matrices();
        let report = validate_row_stochastic(&matrices[&RatingScale::SandP], DEFAULT_ROW_TOLERANCE);
        assert!(report.valid);
        assert_eq!(report.rows.len(), 8);
        assert!(report.rows.iter().all(|r| r.valid));
        assert!(report.warnings.is_empty());
        assert_eq!(report.max_row_deviation, Decimal::ZERO);
    }

    #[test]
    fn test_perturbed_cell_flips_only_that_row() {
        let mut entries = default_transition_matrices().remove(&RatingScale::SandP).unwrap();
        let cell = entries
            .iter_mut()
            .find(|e| e.from == "BB" && e.to == "BB")
            .unwrap();
        cell.probability += dec!(0.02);

        let report = validate_row_stochastic(&entries, DEFAULT_ROW_TOLERANCE);
        assert!(!report.valid);
        assert!(!report.row("BB").unwrap().valid);
        assert_eq!(report.row("BB").unwrap().row_sum, dec!(1.02));
        assert!(report.row("BBB").unwrap().valid);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].rating, "BB");
    }

    #[test]
    fn test_small_deviation_within_tolerance_is_valid() {
        let entries = vec![entry("A", "A", dec!(0.995)), entry("A", "D", dec!(0.0))];
        let report = validate_row_stochastic(&entries, DEFAULT_ROW_TOLERANCE);
        assert!(report.valid);
        assert_eq!(report.row("A").unwrap().deviation, dec!(0.005));
    }

    #[test]
    fn test_negative_cell_invalidates_row() {
        let entries = vec![entry("A", "A", dec!(1.05)), entry("A", "D", dec!(-0.05))];
        let report = validate_row_stochastic(&entries, DEFAULT_ROW_TOLERANCE);
        assert!(!report.valid);
        assert_eq!(report.row("A").unwrap().row_sum, Decimal::ONE);
    }

    #[test]
    fn test_validation_does_not_renormalise() {
        let entries = vec![entry("A", "A", dec!(0.5)), entry("A", "D", dec!(0.3))];
        let before = entries.clone();
        let _ = validate_row_stochastic(&entries, DEFAULT_ROW_TOLERANCE);
        assert_eq!(entries, before);
    }

    #[test]
    fn test_destination_without_row_is_flagged() {
        let entries = vec![
            entry("A", "A", dec!(0.9)),
            entry("A", "B", dec!(0.1)),
            entry("A", "C", Decimal::ZERO),
        ];
        let report = validate_row_stochastic(&entries, DEFAULT_ROW_TOLERANCE);
        assert!(report.row("A").unwrap().valid);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].rating, "B");
        assert!(report.warnings[0].message.contains("no row"));
    }
}
