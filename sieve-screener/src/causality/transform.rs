//! Stationarity transform.
//!
//! Converts a price sequence to log returns (first difference of the natural
//! log), dropping the first observation. The causality test assumes the
//! transformed series is stationary.

use sieve_common::{Error, Result};

/// Compute log returns of a price sequence. Output length is N-1.
///
/// Non-positive prices are a domain error for the logarithm and fail the
/// transform rather than producing silent NaN/infinity values.
pub fn log_returns(prices: &[f64]) -> Result<Vec<f64>> {
    if let Some(bad) = prices.iter().find(|p| **p <= 0.0) {
        return Err(Error::Computation(format!(
            "log return undefined for non-positive price {}",
            bad
        )));
    }

    Ok(prices
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_returns_values() {
        let returns = log_returns(&[100.0, 110.0, 121.0]).unwrap();
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - (110.0f64 / 100.0).ln()).abs() < 1e-12);
        assert!((returns[1] - (121.0f64 / 110.0).ln()).abs() < 1e-12);
        // 10% growth both days: identical returns
        assert!((returns[0] - returns[1]).abs() < 1e-12);
    }

    #[test]
    fn test_single_observation_yields_empty() {
        assert!(log_returns(&[100.0]).unwrap().is_empty());
        assert!(log_returns(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_non_positive_price_is_an_error() {
        assert!(log_returns(&[100.0, 0.0, 110.0]).is_err());
        assert!(log_returns(&[100.0, -5.0]).is_err());
    }
}
