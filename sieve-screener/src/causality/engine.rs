//! Causality test orchestrator.
//!
//! Runs the full pipeline for one request: resolve the subject stock,
//! enumerate all known indices and, for each index, align the series,
//! transform to log returns and run the lagged causality test in the
//! requested direction(s). One bad index pairing never aborts the batch.

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use sieve_common::{AppConfig, Error, Result};

use crate::models::{CausalityRequest, CausalityResponse, CausalityResultItem, DirectionOutcome};
use crate::store::{MarketStore, TargetKind};

use super::align::{align, AlignedPair};
use super::granger::test_direction;
use super::transform::log_returns;

/// The causality test engine.
pub struct CausalityEngine {
    store: Arc<MarketStore>,
    config: Arc<AppConfig>,
}

impl CausalityEngine {
    pub fn new(store: Arc<MarketStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// Execute a causality request against every known index.
    ///
    /// Fails with `NotFound` when the subject stock is unknown; individual
    /// index failures are logged and skipped.
    pub async fn run(&self, request: &CausalityRequest) -> Result<CausalityResponse> {
        let started = Instant::now();

        let errors = request.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let snapshot = self
            .store
            .get_snapshot(TargetKind::Stock, &request.stock_symbol)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("stock {} not found", request.stock_symbol))
            })?;

        let end = Utc::now().date_naive();
        let start = end - Duration::days(self.config.causality.lookback_days);

        let stock_bars = self
            .store
            .get_daily_bars(TargetKind::Stock, &request.stock_symbol, start, end)
            .await?;

        let universe = self.store.list_index_universe().await?;
        info!(
            stock = %request.stock_symbol,
            indices = universe.len(),
            max_lag = request.max_lag,
            "Starting causality scan"
        );

        let mut results = Vec::new();
        for (index_symbol, index_name) in universe {
            match self
                .test_one_index(request, &stock_bars, &index_symbol, &index_name, start, end)
                .await
            {
                Ok(Some(item)) => results.push(item),
                Ok(None) => {
                    debug!(index = %index_symbol, "No aligned observations, skipping");
                }
                Err(e) => {
                    warn!(index = %index_symbol, error = %e, "Index pairing failed, skipping");
                }
            }
        }

        let execution_time = started.elapsed().as_secs_f64();
        info!(
            stock = %request.stock_symbol,
            results = results.len(),
            execution_time = format!("{:.3}s", execution_time),
            "Causality scan complete"
        );

        Ok(CausalityResponse {
            stock_symbol: request.stock_symbol.clone(),
            stock_name: snapshot.name,
            max_lag: request.max_lag,
            significance_level: request.significance_level,
            results,
            execution_time,
        })
    }

    /// Run the requested direction(s) for one index. `Ok(None)` means the
    /// aligned series was empty and the pairing is skipped.
    async fn test_one_index(
        &self,
        request: &CausalityRequest,
        stock_bars: &[crate::store::DailyBar],
        index_symbol: &str,
        index_name: &str,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<Option<CausalityResultItem>> {
        let index_bars = self
            .store
            .get_daily_bars(TargetKind::Index, index_symbol, start, end)
            .await?;

        let pair = align(stock_bars, &index_bars, request.exclude_suspension);
        if pair.is_empty() {
            return Ok(None);
        }

        let mut item = CausalityResultItem {
            index_symbol: index_symbol.to_string(),
            index_name: index_name.to_string(),
            stock_to_index_result: None,
            index_to_stock_result: None,
        };

        match self.to_returns(&pair) {
            Ok((stock_returns, index_returns)) => {
                if request.test_direction.includes_stock_to_index() {
                    item.stock_to_index_result = Some(test_direction(
                        &stock_returns,
                        &index_returns,
                        request.max_lag,
                        request.significance_level,
                    ));
                }
                if request.test_direction.includes_index_to_stock() {
                    item.index_to_stock_result = Some(test_direction(
                        &index_returns,
                        &stock_returns,
                        request.max_lag,
                        request.significance_level,
                    ));
                }
            }
            Err(e) => {
                // Domain error in the transform fails the test for this
                // pairing, carried in the outcome rather than dropped.
                let failed = DirectionOutcome::failed(e.to_string());
                if request.test_direction.includes_stock_to_index() {
                    item.stock_to_index_result = Some(failed.clone());
                }
                if request.test_direction.includes_index_to_stock() {
                    item.index_to_stock_result = Some(failed);
                }
            }
        }

        Ok(Some(item))
    }

    fn to_returns(&self, pair: &AlignedPair) -> Result<(Vec<f64>, Vec<f64>)> {
        let stock_returns = log_returns(&pair.stock)?;
        let index_returns = log_returns(&pair.index)?;
        Ok((stock_returns, index_returns))
    }
}
