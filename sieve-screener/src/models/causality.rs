//! Causality test request and response models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Smallest accepted maximum lag order.
pub const MIN_MAX_LAG: u32 = 1;
/// Largest accepted maximum lag order.
pub const MAX_MAX_LAG: u32 = 20;

/// Direction(s) of the causality test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestDirection {
    /// Does the stock lead the index?
    StockToIndex,
    /// Does the index lead the stock?
    IndexToStock,
    /// Test both directions
    #[default]
    Both,
}

impl TestDirection {
    pub fn includes_stock_to_index(self) -> bool {
        matches!(self, Self::StockToIndex | Self::Both)
    }

    pub fn includes_index_to_stock(self) -> bool {
        matches!(self, Self::IndexToStock | Self::Both)
    }
}

/// Request to test directional causality between a stock and all indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalityRequest {
    /// Subject stock symbol
    pub stock_symbol: String,
    /// Maximum lag order to test (1..=20)
    #[serde(default = "default_max_lag")]
    pub max_lag: u32,
    /// Direction(s) to test
    #[serde(default)]
    pub test_direction: TestDirection,
    /// Significance threshold for the per-lag p-values, in (0, 1)
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
    /// Drop dates where the stock shows no trading activity
    #[serde(default = "default_exclude_suspension")]
    pub exclude_suspension: bool,
}

const fn default_max_lag() -> u32 {
    5
}

const fn default_significance_level() -> f64 {
    0.05
}

const fn default_exclude_suspension() -> bool {
    true
}

impl CausalityRequest {
    /// Check the request bounds. Returns the collected problems.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.stock_symbol.trim().is_empty() {
            errors.push("stock_symbol must not be empty".to_string());
        }
        if !(MIN_MAX_LAG..=MAX_MAX_LAG).contains(&self.max_lag) {
            errors.push(format!(
                "max_lag must be between {} and {}",
                MIN_MAX_LAG, MAX_MAX_LAG
            ));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            errors.push("significance_level must be strictly between 0 and 1".to_string());
        }

        errors
    }
}

/// Outcome of one lag order of the causality test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerLagResult {
    /// Lag order
    pub lag: u32,
    /// F-statistic of the restricted-vs-unrestricted comparison
    pub f_value: f64,
    /// Right-tail p-value of the F-statistic
    pub p_value: f64,
    /// Whether p_value < significance_level
    pub is_significant: bool,
}

/// Aggregated conclusion over all tested lags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalityVerdict {
    /// At least one lag is significant
    pub has_causality: bool,
    /// Lags whose p-value fell below the threshold, ascending
    pub significant_lags: Vec<u32>,
    /// Minimum p-value across all tested lags; None if nothing was computed
    pub min_p_value: Option<f64>,
}

impl CausalityVerdict {
    /// The default verdict used when a test fails as a whole.
    pub fn none() -> Self {
        Self {
            has_causality: false,
            significant_lags: Vec::new(),
            min_p_value: None,
        }
    }

    /// Aggregate per-lag results into a verdict.
    pub fn from_lags<'a>(lags: impl IntoIterator<Item = &'a PerLagResult>) -> Self {
        let mut significant_lags = Vec::new();
        let mut min_p_value: Option<f64> = None;

        for result in lags {
            if result.is_significant {
                significant_lags.push(result.lag);
            }
            min_p_value = Some(match min_p_value {
                Some(current) if current <= result.p_value => current,
                _ => result.p_value,
            });
        }

        significant_lags.sort_unstable();
        Self {
            has_causality: !significant_lags.is_empty(),
            significant_lags,
            min_p_value,
        }
    }
}

/// Result of testing one direction for one (stock, index) pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionOutcome {
    /// Per-lag outcomes keyed by lag order
    pub lags: BTreeMap<u32, PerLagResult>,
    /// Aggregated conclusion
    pub conclusion: CausalityVerdict,
    /// Batch-level failure message, if the test could not run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DirectionOutcome {
    /// A failed outcome carrying the error and the default verdict.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            lags: BTreeMap::new(),
            conclusion: CausalityVerdict::none(),
            error: Some(message.into()),
        }
    }
}

/// Causality results for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalityResultItem {
    pub index_symbol: String,
    pub index_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_to_index_result: Option<DirectionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_to_stock_result: Option<DirectionOutcome>,
}

/// Full response of a causality request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalityResponse {
    pub stock_symbol: String,
    pub stock_name: Option<String>,
    pub max_lag: u32,
    pub significance_level: f64,
    pub results: Vec<CausalityResultItem>,
    /// Wall-clock execution time in seconds
    pub execution_time: f64,
}
