//! Screening engine.
//!
//! Assembles the compiled conditions into one filtered, ordered, limited
//! query over the latest-row-per-symbol view and shapes the result set.
//!
//! The market-scope predicate is always AND-ed with the compiled conditions
//! regardless of the strategy's logic operator. This is deliberate: `logic`
//! governs how the user's conditions combine with each other, while the
//! market scope bounds the universe they run against.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use sieve_common::{Error, Result};

use crate::models::{
    Market, MatchDetail, ScreeningResult, ScreeningResultItem, Strategy, StrategyLogic,
};
use crate::store::{LatestRowFilter, MarketStore, TargetKind};

use super::condition::{self, validate_indicator, validate_sort_column};

/// Symbol prefixes per market segment. Stocks and indices follow different
/// prefix conventions and must use the matching rule set.
fn market_prefixes(target: TargetKind, market: Market) -> &'static [&'static str] {
    match (target, market) {
        (_, Market::All) => &[],
        (TargetKind::Stock, Market::Sh) => &["60", "68"],
        (TargetKind::Stock, Market::Sz) => &["00", "30"],
        (TargetKind::Stock, Market::Bj) => &["43", "83", "87"],
        (TargetKind::Index, Market::Sh) => &["00", "88"],
        (TargetKind::Index, Market::Sz) => &["39"],
        (TargetKind::Index, Market::Bj) => &["89"],
    }
}

/// Build the market-scope predicate, if the strategy restricts the universe.
fn market_scope(target: TargetKind, market: Market) -> Option<String> {
    let prefixes = market_prefixes(target, market);
    if prefixes.is_empty() {
        return None;
    }

    let qualifier = target.qualifier();
    let clauses: Vec<String> = prefixes
        .iter()
        .map(|prefix| format!("{}.symbol LIKE '{}%'", qualifier, prefix))
        .collect();
    Some(format!("({})", clauses.join(" OR ")))
}

/// The screening engine.
pub struct ScreenEngine {
    store: Arc<MarketStore>,
}

impl ScreenEngine {
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    /// Compile and run a screening strategy against the given universe.
    ///
    /// Structural problems (empty name, no conditions, malformed bounds,
    /// unknown indicator or sort column) are collected and returned together
    /// as a `Validation` error so the caller can display all of them at once.
    pub async fn run(&self, strategy: &Strategy, target: TargetKind) -> Result<ScreeningResult> {
        let started = Instant::now();

        let mut errors = strategy.validate();
        for (i, cond) in strategy.conditions.iter().enumerate() {
            if let Err(e) = validate_indicator(target, &cond.indicator) {
                errors.extend(e.field_errors().iter().map(|msg| format!("condition {}: {}", i + 1, msg)));
            }
        }
        if let Some(sort_by) = &strategy.sort_by {
            if let Err(e) = validate_sort_column(target, sort_by) {
                errors.extend(e.field_errors().iter().cloned());
            }
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let filter = self.build_filter(strategy, target)?;
        debug!(
            strategy = %strategy.name,
            conditions = strategy.conditions.len(),
            universe = ?target,
            "Compiled screening filter"
        );

        let rows = self.store.fetch_latest_filtered(target, &filter).await?;

        // Every returned row carries an echo of what was evaluated, keyed by
        // condition position. This reports the tested definitions, not the
        // per-clause outcome for the row.
        let match_details: BTreeMap<String, MatchDetail> = strategy
            .conditions
            .iter()
            .enumerate()
            .map(|(i, cond)| (format!("condition_{}", i + 1), MatchDetail::from(cond)))
            .collect();

        let items: Vec<ScreeningResultItem> = rows
            .into_iter()
            .map(|row| ScreeningResultItem {
                symbol: row.symbol,
                name: row.name,
                latest_price: row.latest_price,
                match_details: match_details.clone(),
            })
            .collect();

        let execution_time = started.elapsed().as_secs_f64();
        info!(
            strategy = %strategy.name,
            total = items.len(),
            execution_time = format!("{:.3}s", execution_time),
            "Screening complete"
        );

        Ok(ScreeningResult {
            strategy_name: strategy.name.clone(),
            total: items.len(),
            items,
            execution_time,
        })
    }

    /// Combine the market scope and the compiled conditions into one filter.
    fn build_filter(&self, strategy: &Strategy, target: TargetKind) -> Result<LatestRowFilter> {
        let mut params = Vec::new();
        let mut clauses = Vec::with_capacity(strategy.conditions.len());

        for (i, cond) in strategy.conditions.iter().enumerate() {
            let compiled = condition::compile(cond, i, target)?;
            clauses.push(format!("({})", compiled.clause));
            params.extend(compiled.params);
        }

        let logic = match strategy.logic {
            StrategyLogic::And => " AND ",
            StrategyLogic::Or => " OR ",
        };
        let combined = clauses.join(logic);

        // Market scope is AND-ed in regardless of `logic`.
        let where_sql = match market_scope(target, strategy.market) {
            Some(scope) if combined.is_empty() => Some(scope),
            Some(scope) => Some(format!("{} AND ({})", scope, combined)),
            None if combined.is_empty() => None,
            None => Some(combined),
        };

        Ok(LatestRowFilter {
            where_sql,
            params,
            order_by: strategy
                .sort_by
                .clone()
                .map(|column| (column, strategy.sort_order)),
            limit: strategy.max_stocks,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComparisonOperator, Condition, ConditionValue, IndicatorType, SortOrder, TimeFrame};
    use crate::store::DailyBar;
    use chrono::NaiveDate;

    fn condition(indicator: &str, operator: ComparisonOperator, value: f64) -> Condition {
        Condition {
            indicator: indicator.to_string(),
            indicator_type: IndicatorType::Price,
            operator,
            value: ConditionValue::Number(value),
            time_frame: TimeFrame::Daily,
            days: None,
        }
    }

    fn strategy(conditions: Vec<Condition>) -> Strategy {
        Strategy {
            name: "test".to_string(),
            description: None,
            market: Market::All,
            conditions,
            logic: StrategyLogic::And,
            max_stocks: None,
            sort_by: None,
            sort_order: SortOrder::Desc,
        }
    }

    fn bar(symbol: &str, date: &str, close: f64) -> DailyBar {
        DailyBar {
            symbol: symbol.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
            amount: None,
        }
    }

    async fn engine_with_universe() -> ScreenEngine {
        let store = Arc::new(MarketStore::open_in_memory().unwrap());
        // AAA-like Shanghai stock above threshold, one below, one Shenzhen
        store
            .save_stock_bars(&[
                bar("600010", "2024-05-10", 12.0),
                bar("600020", "2024-05-10", 8.0),
                bar("000030", "2024-05-10", 15.0),
            ])
            .await
            .unwrap();
        ScreenEngine::new(store)
    }

    #[test]
    fn test_market_scope_rule_sets() {
        assert_eq!(
            market_scope(TargetKind::Stock, Market::Sh).unwrap(),
            "(s.symbol LIKE '60%' OR s.symbol LIKE '68%')"
        );
        assert_eq!(
            market_scope(TargetKind::Index, Market::Sz).unwrap(),
            "(i.symbol LIKE '39%')"
        );
        assert!(market_scope(TargetKind::Stock, Market::All).is_none());
    }

    #[tokio::test]
    async fn test_screen_filters_by_condition_and_market() {
        let engine = engine_with_universe().await;
        let mut s = strategy(vec![condition("close", ComparisonOperator::Gt, 10.0)]);
        s.market = Market::Sh;

        let result = engine.run(&s, TargetKind::Stock).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].symbol, "600010");
        assert_eq!(result.items[0].latest_price, 12.0);
    }

    #[tokio::test]
    async fn test_market_scope_overrides_or_logic() {
        // A row failing the market filter must never appear, even with OR
        // logic and conditions it satisfies.
        let engine = engine_with_universe().await;
        let mut s = strategy(vec![
            condition("close", ComparisonOperator::Gt, 14.0), // only 000030
            condition("close", ComparisonOperator::Lt, 9.0),  // only 600020
        ]);
        s.logic = StrategyLogic::Or;
        s.market = Market::Sh;

        let result = engine.run(&s, TargetKind::Stock).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].symbol, "600020");
    }

    #[tokio::test]
    async fn test_boundary_semantics_of_comparisons() {
        let store = Arc::new(MarketStore::open_in_memory().unwrap());
        store
            .save_stock_bars(&[bar("600010", "2024-05-10", 10.0)])
            .await
            .unwrap();
        let engine = ScreenEngine::new(store);

        let gte = strategy(vec![condition("close", ComparisonOperator::Gte, 10.0)]);
        assert_eq!(engine.run(&gte, TargetKind::Stock).await.unwrap().total, 1);

        let gt = strategy(vec![condition("close", ComparisonOperator::Gt, 10.0)]);
        assert_eq!(engine.run(&gt, TargetKind::Stock).await.unwrap().total, 0);

        let eq = strategy(vec![condition("close", ComparisonOperator::Eq, 10.0)]);
        assert_eq!(engine.run(&eq, TargetKind::Stock).await.unwrap().total, 1);

        let neq = strategy(vec![condition("close", ComparisonOperator::Neq, 10.0)]);
        assert_eq!(engine.run(&neq, TargetKind::Stock).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_sort_and_limit() {
        let engine = engine_with_universe().await;
        let mut s = strategy(vec![condition("close", ComparisonOperator::Gt, 0.0)]);
        s.sort_by = Some("close".to_string());
        s.sort_order = SortOrder::Desc;
        s.max_stocks = Some(2);

        let result = engine.run(&s, TargetKind::Stock).await.unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.items[0].symbol, "000030");
        assert_eq!(result.items[1].symbol, "600010");
    }

    #[tokio::test]
    async fn test_validation_errors_are_collected() {
        let engine = engine_with_universe().await;
        let mut s = strategy(vec![condition("nonsense", ComparisonOperator::Gt, 1.0)]);
        s.name = "".to_string();
        s.sort_by = Some("also_nonsense".to_string());

        let err = engine.run(&s, TargetKind::Stock).await.unwrap_err();
        let errors = err.field_errors();
        assert_eq!(errors.len(), 3);
    }

    #[tokio::test]
    async fn test_match_details_echo_all_conditions() {
        let engine = engine_with_universe().await;
        let s = strategy(vec![
            condition("close", ComparisonOperator::Gt, 5.0),
            condition("volume", ComparisonOperator::Gt, 0.0),
        ]);

        let result = engine.run(&s, TargetKind::Stock).await.unwrap();
        assert!(result.total > 0);
        let details = &result.items[0].match_details;
        assert_eq!(details.len(), 2);
        assert_eq!(details["condition_1"].indicator, "close");
        assert_eq!(details["condition_2"].indicator, "volume");
    }

    #[tokio::test]
    async fn test_between_screen() {
        let engine = engine_with_universe().await;
        let s = strategy(vec![Condition {
            indicator: "close".to_string(),
            indicator_type: IndicatorType::Price,
            operator: ComparisonOperator::Between,
            value: ConditionValue::Range([9.0, 13.0]),
            time_frame: TimeFrame::Daily,
            days: None,
        }]);

        let result = engine.run(&s, TargetKind::Stock).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].symbol, "600010");
    }
}
