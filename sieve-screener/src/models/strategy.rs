//! Screening strategy models.
//!
//! A `Strategy` is an ordered set of `Condition`s combined with a single
//! logic operator, plus output shaping (market scope, sort, row cap).
//! Validation collects every structural problem into one list so a caller
//! can display all of them at once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum length of a strategy name.
pub const MAX_STRATEGY_NAME_LEN: usize = 100;

// ============================================================================
// Enums
// ============================================================================

/// Category of an indicator. Descriptive only; it does not affect compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorType {
    Price,
    Volume,
    Technical,
    Fundamental,
    Custom,
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    /// Closed interval test; requires a `[low, high]` value pair
    #[serde(rename = "between")]
    Between,
    /// Approximated as a plain `>` threshold; no true crossing detection
    #[serde(rename = "cross_above")]
    CrossAbove,
    /// Approximated as a plain `<` threshold; no true crossing detection
    #[serde(rename = "cross_below")]
    CrossBelow,
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Between => "between",
            Self::CrossAbove => "cross_above",
            Self::CrossBelow => "cross_below",
        };
        write!(f, "{}", s)
    }
}

/// Time frame of a condition. Only daily data is evaluated; weekly and
/// monthly are accepted but produce no resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Market scope, restricting the instrument universe by symbol prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    #[default]
    All,
    /// Shanghai
    Sh,
    /// Shenzhen
    Sz,
    /// Beijing
    Bj,
}

/// Logic operator applied uniformly across all non-market conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyLogic {
    #[default]
    And,
    Or,
}

/// Sort direction for the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

// ============================================================================
// Condition
// ============================================================================

/// Comparison value: a single number, or an ordered `[low, high]` pair for
/// the `between` operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Range([f64; 2]),
}

impl ConditionValue {
    /// The scalar value, if this is a single number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Range(_) => None,
        }
    }

    /// The `(low, high)` pair, if this is a range.
    pub fn as_range(&self) -> Option<(f64, f64)> {
        match self {
            Self::Number(_) => None,
            Self::Range([low, high]) => Some((*low, *high)),
        }
    }
}

/// One indicator/operator/value comparison used to filter instruments.
///
/// Immutable once validated as part of a `Strategy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Indicator column name (e.g. "close", "volume")
    pub indicator: String,
    /// Indicator category
    pub indicator_type: IndicatorType,
    /// Comparison operator
    pub operator: ComparisonOperator,
    /// Comparison value
    pub value: ConditionValue,
    /// Time frame (only daily is honored)
    #[serde(default)]
    pub time_frame: TimeFrame,
    /// "Must hold for N consecutive periods" — accepted but not enforced
    #[serde(default)]
    pub days: Option<u32>,
}

impl Condition {
    /// Validate this condition, appending problems to `errors`.
    ///
    /// `label` identifies the condition in the error messages (1-based).
    fn validate_into(&self, label: usize, errors: &mut Vec<String>) {
        if self.indicator.trim().is_empty() {
            errors.push(format!("condition {}: indicator name must not be empty", label));
        }

        match self.operator {
            ComparisonOperator::Between => match self.value {
                ConditionValue::Range([low, high]) => {
                    if low >= high {
                        errors.push(format!(
                            "condition {}: between bounds must satisfy low < high (got [{}, {}])",
                            label, low, high
                        ));
                    }
                }
                ConditionValue::Number(_) => {
                    errors.push(format!(
                        "condition {}: between requires a [low, high] value pair",
                        label
                    ));
                }
            },
            _ => {
                if self.value.as_number().is_none() {
                    errors.push(format!(
                        "condition {}: operator {} requires a single numeric value",
                        label, self.operator
                    ));
                }
            }
        }

        if let Some(days) = self.days {
            if days == 0 {
                errors.push(format!("condition {}: days must be positive", label));
            }
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// A complete screening strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    /// Strategy name (non-empty, at most 100 chars)
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Market scope; always AND-ed with the other conditions
    #[serde(default)]
    pub market: Market,
    /// Ordered, non-empty list of conditions
    pub conditions: Vec<Condition>,
    /// Logic operator between conditions
    #[serde(default)]
    pub logic: StrategyLogic,
    /// Row cap on the result set
    #[serde(default)]
    pub max_stocks: Option<u32>,
    /// Sort column (validated against the target's column set)
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Sort direction
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Strategy {
    /// Validate the strategy structure.
    ///
    /// Returns the full list of field-level problems; an empty list means the
    /// strategy is structurally sound. Indicator and sort column names are
    /// checked later against the target table's column set.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("strategy name must not be empty".to_string());
        } else if self.name.len() > MAX_STRATEGY_NAME_LEN {
            errors.push(format!(
                "strategy name must be at most {} characters",
                MAX_STRATEGY_NAME_LEN
            ));
        }

        if self.conditions.is_empty() {
            errors.push("at least one condition is required".to_string());
        }

        for (i, condition) in self.conditions.iter().enumerate() {
            condition.validate_into(i + 1, &mut errors);
        }

        if let Some(max_stocks) = self.max_stocks {
            if max_stocks == 0 {
                errors.push("max_stocks must be positive".to_string());
            }
        }

        errors
    }
}

// ============================================================================
// Screening Results
// ============================================================================

/// Echo of one evaluated condition, attached to every result row.
///
/// This records what was tested, not whether the individual clause held for
/// the row; the compiled query only reports overall membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDetail {
    pub indicator: String,
    pub operator: ComparisonOperator,
    pub value: ConditionValue,
}

impl From<&Condition> for MatchDetail {
    fn from(condition: &Condition) -> Self {
        Self {
            indicator: condition.indicator.clone(),
            operator: condition.operator,
            value: condition.value.clone(),
        }
    }
}

/// One instrument that passed the screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningResultItem {
    /// Instrument symbol
    pub symbol: String,
    /// Display name (present for indices)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Most recent close
    pub latest_price: f64,
    /// Per-condition echo, keyed "condition_1", "condition_2", ...
    pub match_details: BTreeMap<String, MatchDetail>,
}

/// Result of a screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub strategy_name: String,
    /// Number of matching instruments
    pub total: usize,
    pub items: Vec<ScreeningResultItem>,
    /// Wall-clock execution time in seconds
    pub execution_time: f64,
}

// ============================================================================
// Tests
// ============================================================================
