//! Calculation parameters.
//!
//! One `CalculationParameters` value drives a whole computation run. It is
//! plain data: the engine only ever borrows it, so an operator can swap in
//! an edited set between calls and the next call picks it up.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::Rate;

// ---------------------------------------------------------------------------
// Rating scales and tables
// ---------------------------------------------------------------------------

/// A rating scale. Agency scales are named; anything else is carried as-is.
///
/// Serialised as a plain string ("S&P", "Moody's", "Fitch", "Internal", ...)
/// so scales can key JSON and YAML maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RatingScale {
    SandP,
    Moodys,
    Fitch,
    Internal,
    Other(String),
}

impl From<String> for RatingScale {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "s&p" | "sp" | "sandp" | "s_and_p" => RatingScale::SandP,
            "moody's" | "moodys" => RatingScale::Moodys,
            "fitch" => RatingScale::Fitch,
            "internal" => RatingScale::Internal,
            _ => RatingScale::Other(s),
        }
    }
}

impl From<&str> for RatingScale {
    fn from(s: &str) -> Self {
        RatingScale::from(s.to_string())
    }
}

impl From<RatingScale> for String {
    fn from(scale: RatingScale) -> Self {
        scale.to_string()
    }
}

impl fmt::Display for RatingScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingScale::SandP => write!(f, "S&P"),
            RatingScale::Moodys => write!(f, "Moody's"),
            RatingScale::Fitch => write!(f, "Fitch"),
            RatingScale::Internal => write!(f, "Internal"),
            RatingScale::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One row of a rating table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPd {
    pub rating: String,
    pub pd: Rate,
}

/// Ordered rating-to-PD table. Lookup is by exact, case-sensitive label;
/// insertion order is kept for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingTable(Vec<RatingPd>);

impl RatingTable {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_pairs(pairs: &[(&str, Rate)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(rating, pd)| RatingPd {
                    rating: (*rating).to_string(),
                    pd: *pd,
                })
                .collect(),
        )
    }

    pub fn get(&self, rating: &str) -> Option<Rate> {
        self.0.iter().find(|r| r.rating == rating).map(|r| r.pd)
    }

    pub fn contains(&self, rating: &str) -> bool {
        self.0.iter().any(|r| r.rating == rating)
    }

    /// Insert a new rating at the end, or update the PD of an existing one
    /// in place (its position is kept).
    pub fn upsert(&mut self, rating: impl Into<String>, pd: Rate) {
        let rating = rating.into();
        match self.0.iter_mut().find(|r| r.rating == rating) {
            Some(existing) => existing.pd = pd,
            None => self.0.push(RatingPd { rating, pd }),
        }
    }

    /// Remove a rating, returning its PD if it was present.
    pub fn remove(&mut self, rating: &str) -> Option<Rate> {
        let idx = self.0.iter().position(|r| r.rating == rating)?;
        Some(self.0.remove(idx).pd)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RatingPd> {
        self.0.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.0.iter().map(|r| r.rating.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One cell of a one-year rating migration matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub from: String,
    pub to: String,
    pub probability: Rate,
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// A named stress scenario configured by the parameter owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    #[serde(default = "default_multiplier")]
    pub pd_multiplier: Decimal,
    #[serde(default = "default_multiplier")]
    pub lgd_multiplier: Decimal,
    /// Additive shift to the reference rate (0.01 = +100bp)
    #[serde(default)]
    pub rate_shift: Rate,
    /// Additive shift to the loan margin
    #[serde(default)]
    pub spread_shift: Rate,
}

impl StressScenario {
    pub fn shock(&self) -> ScenarioShock {
        ScenarioShock {
            pd_multiplier: self.pd_multiplier,
            lgd_multiplier: self.lgd_multiplier,
            rate_shift: self.rate_shift,
            spread_shift: self.spread_shift,
        }
    }
}

/// The perturbation applied to every loan by the scenario simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioShock {
    #[serde(default = "default_multiplier")]
    pub pd_multiplier: Decimal,
    #[serde(default = "default_multiplier")]
    pub lgd_multiplier: Decimal,
    #[serde(default)]
    pub rate_shift: Rate,
    #[serde(default)]
    pub spread_shift: Rate,
}

impl ScenarioShock {
    /// Multipliers of one and zero shifts: reproduces the base portfolio.
    pub fn identity() -> Self {
        Self {
            pd_multiplier: Decimal::ONE,
            lgd_multiplier: Decimal::ONE,
            rate_shift: Decimal::ZERO,
            spread_shift: Decimal::ZERO,
        }
    }
}

impl Default for ScenarioShock {
    fn default() -> Self {
        Self::identity()
    }
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}

// ---------------------------------------------------------------------------
// Strategy selectors
// ---------------------------------------------------------------------------

/// Which capital formula the loan calculator applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapitalFormula {
    /// Basel IRB ASRF formula with the regulatory maturity adjustment.
    #[default]
    Regulatory,
    /// Compatibility mode reproducing the dashboard's historical
    /// approximation (linear maturity factor, 1.06·√1.5 confidence term).
    Legacy,
}

/// How the portfolio diversification benefit is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CorrelationModel {
    /// Portfolio EL is a fixed share below the naive sum.
    FlatPercentage { benefit_ratio: Rate },
    /// One common asset correlation between every pair of loans.
    SingleFactor { asset_correlation: Rate },
    /// Pairwise correlation looked up by loan sector.
    Matrix {
        sectors: Vec<String>,
        correlations: Vec<Vec<Decimal>>,
    },
}

impl Default for CorrelationModel {
    fn default() -> Self {
        CorrelationModel::FlatPercentage {
            benefit_ratio: dec!(0.20),
        }
    }
}

/// How the secondary-market-sale EVA is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum EvaSaleStrategy {
    /// Same profit basis as the hold-to-maturity EVA.
    #[default]
    Intrinsic,
    /// Sale proxy: `sale_price_factor × EAD − funding − capital_cost_rate × capital`.
    SalePrice {
        sale_price_factor: Decimal,
        #[serde(default)]
        capital_cost_rate: Rate,
    },
}

// ---------------------------------------------------------------------------
// CalculationParameters
// ---------------------------------------------------------------------------

/// Global inputs for one computation run. Every field has a default so a
/// partial JSON/YAML parameter file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationParameters {
    /// Date from which remaining maturity is measured; unset means each
    /// loan's own start date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<NaiveDate>,
    pub target_roe: Rate,
    pub corporate_tax_rate: Rate,
    /// Capital held per unit of RWA
    pub capital_ratio: Rate,
    /// Funding cost on the drawn amount
    pub funding_cost: Rate,
    /// Operating cost per unit of original amount
    pub operational_cost_ratio: Rate,
    /// Funding index spread included in the all-in effective yield
    pub funding_index_rate: Rate,
    pub rating_pd_mappings: HashMap<RatingScale, RatingTable>,
    pub transition_matrices: HashMap<RatingScale, Vec<TransitionEntry>>,
    pub stress_scenarios: Vec<StressScenario>,
    pub capital_formula: CapitalFormula,
    pub correlation_model: CorrelationModel,
    pub eva_sale_strategy: EvaSaleStrategy,
}

impl Default for CalculationParameters {
    fn default() -> Self {
        Self {
            valuation_date: None,
            target_roe: dec!(0.12),
            corporate_tax_rate: dec!(0.25),
            capital_ratio: dec!(0.105),
            funding_cost: dec!(0.03),
            operational_cost_ratio: dec!(0.005),
            funding_index_rate: Decimal::ZERO,
            rating_pd_mappings: default_rating_pd_mappings(),
            transition_matrices: default_transition_matrices(),
            stress_scenarios: default_stress_scenarios(),
            capital_formula: CapitalFormula::default(),
            correlation_model: CorrelationModel::default(),
            eva_sale_strategy: EvaSaleStrategy::default(),
        }
    }
}

impl CalculationParameters {
    pub fn with_valuation_date(mut self, date: NaiveDate) -> Self {
        self.valuation_date = Some(date);
        self
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Long-run one-year default rates by agency grade, plus an internal
/// ten-notch master scale.
pub fn default_rating_pd_mappings() -> HashMap<RatingScale, RatingTable> {
    let agency = [
        ("AAA", dec!(0.0001)),
        ("AA", dec!(0.0002)),
        ("A", dec!(0.0006)),
        ("BBB", dec!(0.0018)),
        ("BB", dec!(0.0072)),
        ("B", dec!(0.0341)),
        ("CCC", dec!(0.2653)),
        ("D", Decimal::ONE),
    ];
    let moodys = [
        ("Aaa", dec!(0.0001)),
        ("Aa", dec!(0.0002)),
        ("A", dec!(0.0006)),
        ("Baa", dec!(0.0018)),
        ("Ba", dec!(0.0072)),
        ("B", dec!(0.0341)),
        ("Caa", dec!(0.2653)),
        ("C", Decimal::ONE),
    ];
    let internal = [
        ("1", dec!(0.0003)),
        ("2", dec!(0.0006)),
        ("3", dec!(0.0012)),
        ("4", dec!(0.0025)),
        ("5", dec!(0.005)),
        ("6", dec!(0.01)),
        ("7", dec!(0.02)),
        ("8", dec!(0.05)),
        ("9", dec!(0.15)),
        ("10", Decimal::ONE),
    ];

    let mut mappings = HashMap::new();
    mappings.insert(RatingScale::SandP, RatingTable::from_pairs(&agency));
    mappings.insert(RatingScale::Fitch, RatingTable::from_pairs(&agency));
    mappings.insert(RatingScale::Moodys, RatingTable::from_pairs(&moodys));
    mappings.insert(RatingScale::Internal, RatingTable::from_pairs(&internal));
    mappings
}

/// Average one-year S&P corporate migration matrix (rows sum to exactly 1,
/// default is absorbing).
pub fn default_transition_matrices() -> HashMap<RatingScale, Vec<TransitionEntry>> {
    let labels = ["AAA", "AA", "A", "BBB", "BB", "B", "CCC", "D"];
    let rows: [[Decimal; 8]; 8] = [
        [dec!(0.8981), dec!(0.0933), dec!(0.0064), dec!(0.0006), dec!(0.0011), dec!(0.0003), dec!(0.0002), dec!(0.0000)],
        [dec!(0.0058), dec!(0.8936), dec!(0.0907), dec!(0.0063), dec!(0.0008), dec!(0.0012), dec!(0.0002), dec!(0.0014)],
        [dec!(0.0009), dec!(0.0226), dec!(0.9105), dec!(0.0568), dec!(0.0064), dec!(0.0020), dec!(0.0002), dec!(0.0006)],
        [dec!(0.0002), dec!(0.0033), dec!(0.0595), dec!(0.8693), dec!(0.0530), dec!(0.0117), dec!(0.0012), dec!(0.0018)],
        [dec!(0.0003), dec!(0.0014), dec!(0.0067), dec!(0.0773), dec!(0.8053), dec!(0.0884), dec!(0.0100), dec!(0.0106)],
        [dec!(0.0000), dec!(0.0011), dec!(0.0024), dec!(0.0043), dec!(0.0648), dec!(0.8346), dec!(0.0407), dec!(0.0521)],
        [dec!(0.0022), dec!(0.0000), dec!(0.0022), dec!(0.0130), dec!(0.0238), dec!(0.1124), dec!(0.6486), dec!(0.1978)],
        [dec!(0.0000), dec!(0.0000), dec!(0.0000), dec!(0.0000), dec!(0.0000), dec!(0.0000), dec!(0.0000), dec!(1.0000)],
    ];

    let mut entries = Vec::with_capacity(labels.len() * labels.len());
    for (from, row) in labels.iter().zip(rows.iter()) {
        for (to, probability) in labels.iter().zip(row.iter()) {
            entries.push(TransitionEntry {
                from: (*from).to_string(),
                to: (*to).to_string(),
                probability: *probability,
            });
        }
    }

    let mut matrices = HashMap::new();
    matrices.insert(RatingScale::SandP, entries);
    matrices
}

pub fn default_stress_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario {
            name: "Adverse".into(),
            pd_multiplier: dec!(1.5),
            lgd_multiplier: dec!(1.1),
            rate_shift: dec!(0.01),
            spread_shift: dec!(0.0025),
        },
        StressScenario {
            name: "Severe".into(),
            pd_multiplier: dec!(2.5),
            lgd_multiplier: dec!(1.25),
            rate_shift: dec!(0.02),
            spread_shift: dec!(0.005),
        },
        StressScenario {
            name: "Rate shock".into(),
            pd_multiplier: Decimal::ONE,
            lgd_multiplier: Decimal::ONE,
            rate_shift: dec!(0.02),
            spread_shift: Decimal::ZERO,
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
