//! Lagged causality test.
//!
//! For each lag order L in 1..=max_lag, fits a restricted autoregression of
//! y on its own L lags and an unrestricted one that adds x's L lags, then
//! compares residual sums of squares with an F-test:
//!
//! ```text
//! F = ((SSR_r - SSR_u) / L) / (SSR_u / (n_rows - 2L - 1))
//! ```
//!
//! with p-values from the Fisher–Snedecor distribution F(L, n_rows - 2L - 1).
//! A significant F means x's past improves the prediction of y beyond y's
//! own past.
//!
//! The whole batch fails as one unit (insufficient observations, singular
//! design); callers receive the error message together with a default
//! negative verdict instead of a crash.

use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use sieve_common::{Error, Result};

use crate::models::{CausalityVerdict, DirectionOutcome, PerLagResult};

/// Pivot threshold below which the normal-equation system counts as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Test whether `x` causes `y` up to `max_lag`.
///
/// Inputs are the stationary (log-return) series. Failures are captured in
/// the returned outcome's `error` field with the default negative verdict.
pub fn test_direction(x: &[f64], y: &[f64], max_lag: u32, significance_level: f64) -> DirectionOutcome {
    match run_all_lags(x, y, max_lag, significance_level) {
        Ok(lags) => {
            let conclusion = CausalityVerdict::from_lags(&lags);
            DirectionOutcome {
                lags: lags.into_iter().map(|r| (r.lag, r)).collect(),
                conclusion,
                error: None,
            }
        }
        Err(e) => DirectionOutcome::failed(e.to_string()),
    }
}

fn run_all_lags(
    x: &[f64],
    y: &[f64],
    max_lag: u32,
    significance_level: f64,
) -> Result<Vec<PerLagResult>> {
    if x.len() != y.len() {
        return Err(Error::InvalidInput(format!(
            "series length mismatch: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    if max_lag == 0 {
        return Err(Error::InvalidInput("max_lag must be at least 1".to_string()));
    }

    let n = y.len();
    let max_lag_usize = max_lag as usize;

    // The largest model must keep at least one residual degree of freedom:
    // n - L rows against 2L + 1 parameters.
    let needed = 3 * max_lag_usize + 2;
    if n < needed {
        return Err(Error::Computation(format!(
            "insufficient observations: {} samples cannot support max_lag {} (need at least {})",
            n, max_lag, needed
        )));
    }

    let mut results = Vec::with_capacity(max_lag_usize);
    for lag in 1..=max_lag_usize {
        results.push(test_single_lag(x, y, lag, significance_level)?);
    }
    Ok(results)
}

/// Run the restricted-vs-unrestricted comparison for one lag order.
fn test_single_lag(x: &[f64], y: &[f64], lag: usize, significance_level: f64) -> Result<PerLagResult> {
    let n = y.len();
    let rows = n - lag;

    // Response: y[t] for t in lag..n
    let response: Vec<f64> = y[lag..].to_vec();

    // Restricted design: intercept + y[t-1..t-lag]
    // Unrestricted design: restricted + x[t-1..t-lag]
    let mut restricted = Vec::with_capacity(rows);
    let mut unrestricted = Vec::with_capacity(rows);
    for t in lag..n {
        let mut row_r = Vec::with_capacity(lag + 1);
        row_r.push(1.0);
        for j in 1..=lag {
            row_r.push(y[t - j]);
        }

        let mut row_u = row_r.clone();
        for j in 1..=lag {
            row_u.push(x[t - j]);
        }

        restricted.push(row_r);
        unrestricted.push(row_u);
    }

    let ssr_restricted = ols_ssr(&restricted, &response)?;
    let ssr_unrestricted = ols_ssr(&unrestricted, &response)?;

    let df_num = lag as f64;
    let df_den = (rows - (2 * lag + 1)) as f64;

    if ssr_unrestricted <= SINGULAR_EPS {
        return Err(Error::Computation(format!(
            "degenerate regression at lag {}: unrestricted model fits exactly",
            lag
        )));
    }

    // Numerical noise can push SSR_r fractionally below SSR_u; clamp at zero.
    let f_value =
        (((ssr_restricted - ssr_unrestricted) / df_num) / (ssr_unrestricted / df_den)).max(0.0);

    let dist = FisherSnedecor::new(df_num, df_den)
        .map_err(|e| Error::Computation(format!("F distribution unavailable at lag {}: {}", lag, e)))?;
    let p_value = 1.0 - dist.cdf(f_value);

    Ok(PerLagResult {
        lag: lag as u32,
        f_value,
        p_value,
        is_significant: p_value < significance_level,
    })
}

/// Ordinary least squares via normal equations; returns the residual sum of
/// squares of the fitted model.
fn ols_ssr(design: &[Vec<f64>], response: &[f64]) -> Result<f64> {
    let rows = design.len();
    let cols = design[0].len();

    // X'X and X'y
    let mut xtx = vec![vec![0.0; cols]; cols];
    let mut xty = vec![0.0; cols];
    for (row, &target) in design.iter().zip(response.iter()) {
        for i in 0..cols {
            xty[i] += row[i] * target;
            for j in i..cols {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    // Mirror the upper triangle
    for i in 0..cols {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    let beta = solve(xtx, xty).ok_or_else(|| {
        Error::Computation("singular design matrix (degenerate or collinear series)".to_string())
    })?;

    let mut ssr = 0.0;
    for (row, &target) in design.iter().zip(response.iter()) {
        let predicted: f64 = row.iter().zip(beta.iter()).map(|(a, b)| a * b).sum();
        let residual = target - predicted;
        ssr += residual * residual;
    }

    debug_assert_eq!(rows, response.len());
    Ok(ssr)
}

/// Solve a small dense linear system by Gaussian elimination with partial
/// pivoting. Returns None when the system is singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        // Pivot: largest absolute value in the column
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if a[row][col].abs() > a[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        if a[pivot_row][col].abs() < SINGULAR_EPS {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    // Back substitution
    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let mut value = b[row];
        for col in (row + 1)..n {
            value -= a[row][col] * solution[col];
        }
        solution[row] = value / a[row][row];
    }
    Some(solution)
}

// ============================================================================
// Tests
// ============================================================================
