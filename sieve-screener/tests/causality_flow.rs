//! End-to-end tests for the causality pipeline.
//!
//! Store seeding → alignment → log-return transform → lagged F-test →
//! per-index aggregation.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use sieve_common::{AppConfig, Error};
use sieve_screener::causality::CausalityEngine;
use sieve_screener::models::{CausalityRequest, TestDirection};
use sieve_screener::store::{DailyBar, MarketStore};

// ============================================================================
// Test Data Generators
// ============================================================================

/// Simple deterministic pseudo-random number generator (0.0 to 1.0)
fn rand_simple(seed: u64) -> f64 {
    let x = seed.wrapping_mul(0x5DEECE66D).wrapping_add(0xB);
    (x % 1000) as f64 / 1000.0
}

/// Trading dates ending yesterday, oldest first.
fn recent_dates(count: usize) -> Vec<NaiveDate> {
    let today = Utc::now().date_naive();
    (0..count)
        .map(|i| today - Duration::days((count - i) as i64))
        .collect()
}

fn bar(symbol: &str, date: NaiveDate, close: f64, volume: f64) -> DailyBar {
    DailyBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume,
        amount: None,
    }
}

/// Build an index price path and a stock price path whose daily return
/// follows the index's previous-day return. The index should be found to
/// lead the stock, not the other way around.
fn driven_price_paths(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut index_prices = Vec::with_capacity(n);
    let mut stock_prices = Vec::with_capacity(n);
    let mut index_price = 3000.0;
    let mut stock_price = 10.0;
    let mut last_index_return = 0.0;

    for i in 0..n {
        let index_return = (rand_simple(i as u64) - 0.5) * 0.04;
        let stock_return =
            0.9 * last_index_return + (rand_simple(i as u64 + 7919) - 0.5) * 0.004;

        index_price *= (1.0 + index_return).max(0.5);
        stock_price *= (1.0 + stock_return).max(0.5);
        index_prices.push(index_price);
        stock_prices.push(stock_price);
        last_index_return = index_return;
    }

    (index_prices, stock_prices)
}

async fn engine_with(store: Arc<MarketStore>) -> CausalityEngine {
    CausalityEngine::new(store, Arc::new(AppConfig::default()))
}

fn request(symbol: &str) -> CausalityRequest {
    CausalityRequest {
        stock_symbol: symbol.to_string(),
        max_lag: 3,
        test_direction: TestDirection::Both,
        significance_level: 0.05,
        exclude_suspension: true,
    }
}

// ============================================================================
// Causality Flow
// ============================================================================

#[tokio::test]
async fn detects_index_leading_stock() {
    let store = Arc::new(MarketStore::open_in_memory().unwrap());
    let dates = recent_dates(200);
    let (index_prices, stock_prices) = driven_price_paths(200);

    let stock_bars: Vec<DailyBar> = dates
        .iter()
        .zip(&stock_prices)
        .map(|(d, p)| bar("600100", *d, *p, 1000.0))
        .collect();
    let index_bars: Vec<DailyBar> = dates
        .iter()
        .zip(&index_prices)
        .map(|(d, p)| bar("000001", *d, *p, 1e9))
        .collect();

    store.save_stock_bars(&stock_bars).await.unwrap();
    store.save_index_bars("Composite", &index_bars).await.unwrap();

    let engine = engine_with(store).await;
    let response = engine.run(&request("600100")).await.unwrap();

    assert_eq!(response.stock_symbol, "600100");
    assert_eq!(response.max_lag, 3);
    assert_eq!(response.results.len(), 1);

    let item = &response.results[0];
    assert_eq!(item.index_symbol, "000001");
    assert_eq!(item.index_name, "Composite");

    let index_to_stock = item.index_to_stock_result.as_ref().unwrap();
    assert!(index_to_stock.error.is_none());
    assert_eq!(index_to_stock.lags.len(), 3);
    assert!(index_to_stock.conclusion.has_causality);
    assert!(index_to_stock.conclusion.significant_lags.contains(&1));
    assert!(index_to_stock.conclusion.min_p_value.unwrap() < 0.01);

    // Both directions were requested and computed
    assert!(item.stock_to_index_result.is_some());
}

#[tokio::test]
async fn single_direction_request_skips_the_other() {
    let store = Arc::new(MarketStore::open_in_memory().unwrap());
    let dates = recent_dates(120);
    let (index_prices, stock_prices) = driven_price_paths(120);

    store
        .save_stock_bars(
            &dates
                .iter()
                .zip(&stock_prices)
                .map(|(d, p)| bar("600100", *d, *p, 1000.0))
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap();
    store
        .save_index_bars(
            "Composite",
            &dates
                .iter()
                .zip(&index_prices)
                .map(|(d, p)| bar("000001", *d, *p, 1e9))
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap();

    let engine = engine_with(store).await;
    let mut req = request("600100");
    req.test_direction = TestDirection::StockToIndex;

    let response = engine.run(&req).await.unwrap();
    let item = &response.results[0];
    assert!(item.stock_to_index_result.is_some());
    assert!(item.index_to_stock_result.is_none());
}

#[tokio::test]
async fn unknown_stock_fails_before_any_index_is_tested() {
    let store = Arc::new(MarketStore::open_in_memory().unwrap());
    let engine = engine_with(store).await;

    let err = engine.run(&request("999999")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.to_string().contains("999999"));
}

#[tokio::test]
async fn out_of_bounds_request_is_a_validation_error() {
    let store = Arc::new(MarketStore::open_in_memory().unwrap());
    let engine = engine_with(store).await;

    let mut req = request("600100");
    req.max_lag = 50;
    req.significance_level = 2.0;

    let err = engine.run(&req).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.field_errors().len(), 2);
}

#[tokio::test]
async fn disjoint_date_ranges_skip_the_pairing() {
    let store = Arc::new(MarketStore::open_in_memory().unwrap());
    let dates = recent_dates(30);

    store
        .save_stock_bars(
            &dates
                .iter()
                .map(|d| bar("600100", *d, 10.0, 1000.0))
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap();
    // Index data lies far outside the lookback window's overlap
    let old_date = NaiveDate::from_ymd_opt(2015, 1, 5).unwrap();
    store
        .save_index_bars("Old Composite", &[bar("000001", old_date, 3000.0, 1e9)])
        .await
        .unwrap();

    let engine = engine_with(store).await;
    let response = engine.run(&request("600100")).await.unwrap();

    // The pairing is skipped, not failed
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn too_few_overlapping_days_surface_as_batch_error() {
    let store = Arc::new(MarketStore::open_in_memory().unwrap());
    let dates = recent_dates(8);

    store
        .save_stock_bars(
            &dates
                .iter()
                .enumerate()
                .map(|(i, d)| bar("600100", *d, 10.0 + i as f64, 1000.0))
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap();
    store
        .save_index_bars(
            "Composite",
            &dates
                .iter()
                .enumerate()
                .map(|(i, d)| bar("000001", *d, 3000.0 + i as f64, 1e9))
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap();

    let engine = engine_with(store).await;
    let response = engine.run(&request("600100")).await.unwrap();

    assert_eq!(response.results.len(), 1);
    let outcome = response.results[0].index_to_stock_result.as_ref().unwrap();
    assert!(outcome.error.as_ref().unwrap().contains("insufficient observations"));
    assert!(!outcome.conclusion.has_causality);
    assert!(outcome.conclusion.min_p_value.is_none());
}

#[tokio::test]
async fn non_positive_price_fails_the_pair_not_the_request() {
    let store = Arc::new(MarketStore::open_in_memory().unwrap());
    let dates = recent_dates(60);

    let mut stock_bars: Vec<DailyBar> = dates
        .iter()
        .enumerate()
        .map(|(i, d)| bar("600100", *d, 10.0 + (i % 5) as f64, 1000.0))
        .collect();
    // A corrupt zero price on a traded day: log return is undefined
    stock_bars[30].close = 0.0;

    store.save_stock_bars(&stock_bars).await.unwrap();
    store
        .save_index_bars(
            "Composite",
            &dates
                .iter()
                .enumerate()
                .map(|(i, d)| bar("000001", *d, 3000.0 + i as f64, 1e9))
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap();

    let engine = engine_with(store).await;
    let response = engine.run(&request("600100")).await.unwrap();

    assert_eq!(response.results.len(), 1);
    let item = &response.results[0];
    let outcome = item.stock_to_index_result.as_ref().unwrap();
    assert!(outcome.error.as_ref().unwrap().contains("non-positive price"));
    assert!(!outcome.conclusion.has_causality);
}

#[tokio::test]
async fn suspension_days_are_dropped_from_the_alignment() {
    let store = Arc::new(MarketStore::open_in_memory().unwrap());
    let dates = recent_dates(40);

    // Every other stock day is suspended; with only ~20 usable observations
    // a max_lag of 6 cannot be supported, while it could be with all 40.
    let stock_bars: Vec<DailyBar> = dates
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let volume = if i % 2 == 0 { 0.0 } else { 1000.0 };
            bar("600100", *d, 10.0 + 5.0 * rand_simple(i as u64), volume)
        })
        .collect();
    store.save_stock_bars(&stock_bars).await.unwrap();
    store
        .save_index_bars(
            "Composite",
            &dates
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    bar("000001", *d, 3000.0 + 150.0 * rand_simple(i as u64 + 31337), 1e9)
                })
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap();

    let engine = engine_with(store).await;
    let mut req = request("600100");
    req.max_lag = 6;

    let response = engine.run(&req).await.unwrap();
    let outcome = response.results[0].index_to_stock_result.as_ref().unwrap();
    assert!(outcome.error.as_ref().unwrap().contains("insufficient observations"));

    // Keeping suspended days restores enough observations
    req.exclude_suspension = false;
    let response = engine.run(&req).await.unwrap();
    let outcome = response.results[0].index_to_stock_result.as_ref().unwrap();
    assert!(outcome.error.is_none());
    assert_eq!(outcome.lags.len(), 6);
}
