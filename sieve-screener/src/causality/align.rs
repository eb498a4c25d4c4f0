//! Series alignment.
//!
//! Reduces two irregular daily series to equal-length, date-aligned close
//! sequences: optionally drops the stock's non-trading (zero volume) dates,
//! intersects the two date sets and sorts ascending.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::store::DailyBar;

/// Two equal-length, date-aligned close sequences, ascending by date.
#[derive(Debug, Clone, Default)]
pub struct AlignedPair {
    pub dates: Vec<NaiveDate>,
    pub stock: Vec<f64>,
    pub index: Vec<f64>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Align a stock series with an index series.
///
/// If either input is empty the result is empty; this is a valid degenerate
/// outcome, not an error — callers skip the pairing.
///
/// With `exclude_suspension`, dates where the stock's traded volume is not
/// strictly positive are removed before intersecting. The index series is
/// never filtered for its own zero-volume dates.
pub fn align(stock: &[DailyBar], index: &[DailyBar], exclude_suspension: bool) -> AlignedPair {
    if stock.is_empty() || index.is_empty() {
        return AlignedPair::default();
    }

    let stock_by_date: BTreeMap<NaiveDate, &DailyBar> = stock
        .iter()
        .filter(|bar| !exclude_suspension || bar.volume > 0.0)
        .map(|bar| (bar.date, bar))
        .collect();
    let index_by_date: BTreeMap<NaiveDate, &DailyBar> =
        index.iter().map(|bar| (bar.date, bar)).collect();

    let mut pair = AlignedPair::default();
    for (date, stock_bar) in &stock_by_date {
        if let Some(index_bar) = index_by_date.get(date) {
            pair.dates.push(*date);
            pair.stock.push(stock_bar.close);
            pair.index.push(index_bar.close);
        }
    }

    pair
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64, volume: f64) -> DailyBar {
        DailyBar {
            symbol: "TEST".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
            amount: None,
        }
    }

    #[test]
    fn test_suspension_dates_removed_from_both_series() {
        // Stock: d1 suspended (volume 0), d2 and d3 traded. Index covers d1..d4.
        let stock = vec![
            bar("2024-01-01", 10.0, 0.0),
            bar("2024-01-02", 11.0, 5.0),
            bar("2024-01-03", 12.0, 5.0),
        ];
        let index = vec![
            bar("2024-01-01", 3000.0, 1e9),
            bar("2024-01-02", 3010.0, 1e9),
            bar("2024-01-03", 3020.0, 1e9),
            bar("2024-01-04", 3030.0, 1e9),
        ];

        let pair = align(&stock, &index, true);
        assert_eq!(pair.len(), 2);
        assert_eq!(
            pair.dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            ]
        );
        assert_eq!(pair.stock, vec![11.0, 12.0]);
        assert_eq!(pair.index, vec![3010.0, 3020.0]);
    }

    #[test]
    fn test_suspension_kept_when_not_excluded() {
        let stock = vec![bar("2024-01-01", 10.0, 0.0), bar("2024-01-02", 11.0, 5.0)];
        let index = vec![bar("2024-01-01", 3000.0, 1e9), bar("2024-01-02", 3010.0, 1e9)];

        let pair = align(&stock, &index, false);
        assert_eq!(pair.len(), 2);
    }

    #[test]
    fn test_index_zero_volume_dates_are_not_filtered() {
        let stock = vec![bar("2024-01-01", 10.0, 5.0)];
        let index = vec![bar("2024-01-01", 3000.0, 0.0)];

        let pair = align(&stock, &index, true);
        assert_eq!(pair.len(), 1);
    }

    #[test]
    fn test_empty_inputs_yield_empty_pair() {
        let bars = vec![bar("2024-01-01", 10.0, 5.0)];

        assert!(align(&[], &bars, true).is_empty());
        assert!(align(&bars, &[], true).is_empty());
        assert!(align(&[], &[], false).is_empty());
    }

    #[test]
    fn test_output_sorted_ascending_regardless_of_input_order() {
        let stock = vec![bar("2024-01-03", 12.0, 5.0), bar("2024-01-01", 10.0, 5.0)];
        let index = vec![bar("2024-01-01", 3000.0, 1e9), bar("2024-01-03", 3020.0, 1e9)];

        let pair = align(&stock, &index, true);
        assert_eq!(pair.stock, vec![10.0, 12.0]);
        assert!(pair.dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_disjoint_dates_yield_empty_pair() {
        let stock = vec![bar("2024-01-01", 10.0, 5.0)];
        let index = vec![bar("2024-01-02", 3000.0, 1e9)];

        assert!(align(&stock, &index, true).is_empty());
    }
}
