//! Condition compiler.
//!
//! Turns one declarative `Condition` into a SQL comparison predicate plus
//! named parameter bindings. Indicator names are checked against the static
//! column set of the target table before any SQL text is assembled; values
//! are never interpolated, only bound.
//!
//! Compilation is a pure function of its inputs.

use sieve_common::{Error, Result};

use crate::models::{ComparisonOperator, Condition};
use crate::store::TargetKind;

/// Indicator columns of the stock daily table.
pub const STOCK_COLUMNS: &[&str] = &[
    "open",
    "high",
    "low",
    "close",
    "volume",
    "amount",
    "outstanding_share",
    "turnover",
];

/// Indicator columns of the index daily table.
pub const INDEX_COLUMNS: &[&str] = &[
    "open",
    "high",
    "low",
    "close",
    "volume",
    "amount",
    "amplitude",
    "change_rate",
    "change_amount",
    "turnover_rate",
];

/// Columns accepted by `sort_by` on top of the indicator set.
const EXTRA_SORT_COLUMNS: &[&str] = &["symbol", "latest_price"];

/// Indicator columns available for a target.
pub const fn indicator_columns(target: TargetKind) -> &'static [&'static str] {
    match target {
        TargetKind::Stock => STOCK_COLUMNS,
        TargetKind::Index => INDEX_COLUMNS,
    }
}

/// Check an indicator name against the target's column set.
pub fn validate_indicator(target: TargetKind, indicator: &str) -> Result<()> {
    if indicator_columns(target).contains(&indicator) {
        Ok(())
    } else {
        Err(Error::Validation(vec![format!(
            "unknown indicator '{}' for target {:?}",
            indicator, target
        )]))
    }
}

/// Check a sort column against the target's column set.
pub fn validate_sort_column(target: TargetKind, column: &str) -> Result<()> {
    if indicator_columns(target).contains(&column) || EXTRA_SORT_COLUMNS.contains(&column) {
        Ok(())
    } else {
        Err(Error::Validation(vec![format!(
            "unknown sort column '{}' for target {:?}",
            column, target
        )]))
    }
}

/// A compiled condition: predicate template plus its parameter bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCondition {
    /// SQL predicate referencing the target's alias and named parameters
    pub clause: String,
    /// Named parameter bindings consumed by the clause
    pub params: Vec<(String, f64)>,
}

/// Compile one condition.
///
/// `index` distinguishes the condition from its siblings for unique parameter
/// naming; `target` selects the table alias and column set.
///
/// `time_frame` other than daily and `days` > 1 are accepted but produce no
/// additional predicate. `cross_above`/`cross_below` compile to plain
/// threshold comparisons; there is no crossing detection against history.
pub fn compile(condition: &Condition, index: usize, target: TargetKind) -> Result<CompiledCondition> {
    validate_indicator(target, &condition.indicator)?;

    let qualifier = target.qualifier();
    let column = format!("{}.{}", qualifier, condition.indicator);

    let compiled = match condition.operator {
        ComparisonOperator::Between => {
            let (low, high) = condition.value.as_range().ok_or_else(|| {
                // Guarded at Strategy validation; kept as a hard error in case
                // a condition is compiled outside that path.
                Error::InvalidInput(format!(
                    "condition {}: between requires a [low, high] value pair",
                    index + 1
                ))
            })?;
            let low_name = format!(":v{}_lo", index);
            let high_name = format!(":v{}_hi", index);
            CompiledCondition {
                clause: format!("{} BETWEEN {} AND {}", column, low_name, high_name),
                params: vec![(low_name, low), (high_name, high)],
            }
        }
        operator => {
            let value = condition.value.as_number().ok_or_else(|| {
                Error::InvalidInput(format!(
                    "condition {}: operator {} requires a single numeric value",
                    index + 1,
                    operator
                ))
            })?;
            let sql_op = match operator {
                ComparisonOperator::Gt => ">",
                ComparisonOperator::Gte => ">=",
                ComparisonOperator::Lt => "<",
                ComparisonOperator::Lte => "<=",
                ComparisonOperator::Eq => "=",
                ComparisonOperator::Neq => "!=",
                // Approximated: threshold comparison, not a crossover test
                ComparisonOperator::CrossAbove => ">",
                ComparisonOperator::CrossBelow => "<",
                ComparisonOperator::Between => unreachable!(),
            };
            let name = format!(":v{}", index);
            CompiledCondition {
                clause: format!("{} {} {}", column, sql_op, name),
                params: vec![(name, value)],
            }
        }
    };

    Ok(compiled)
}

// ============================================================================
// Tests
// ============================================================================
