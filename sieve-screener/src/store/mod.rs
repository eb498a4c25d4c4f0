//! Market data storage using SQLite.
//!
//! Holds the daily OHLCV history for stocks and indices and exposes the
//! read interface the screening and causality engines consume:
//! - latest-row-per-symbol filtered view
//! - raw OHLCV rows for a symbol in a date range
//! - distinct (symbol, name) pairs for a universe
//! - single instrument snapshot by symbol
//!
//! All values are bound as parameters; identifiers reaching this module have
//! already been validated against the static column sets in the screener.

use chrono::NaiveDate;
use rusqlite::{params, Connection, ToSql};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use sieve_common::{Error, Result};

use crate::models::SortOrder;

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Stock daily K-line data
CREATE TABLE IF NOT EXISTS stock_daily_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    amount REAL,
    outstanding_share REAL,
    turnover REAL,
    UNIQUE(symbol, date)
);

CREATE INDEX IF NOT EXISTS idx_stock_daily_symbol_date
ON stock_daily_data(symbol, date DESC);

-- Index daily K-line data
CREATE TABLE IF NOT EXISTS index_daily_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    amount REAL,
    amplitude REAL,
    change_rate REAL,
    change_amount REAL,
    turnover_rate REAL,
    UNIQUE(symbol, date)
);

CREATE INDEX IF NOT EXISTS idx_index_daily_symbol_date
ON index_daily_data(symbol, date DESC);
"#;

// ============================================================================
// Target Kind
// ============================================================================

/// Which instrument universe a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Stock,
    Index,
}

impl TargetKind {
    /// Backing table name.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Stock => "stock_daily_data",
            Self::Index => "index_daily_data",
        }
    }

    /// Table alias used to qualify indicator columns in predicates.
    pub const fn qualifier(self) -> &'static str {
        match self {
            Self::Stock => "s",
            Self::Index => "i",
        }
    }
}

impl FromStr for TargetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stock" => Ok(Self::Stock),
            "index" => Ok(Self::Index),
            other => Err(Error::InvalidInput(format!(
                "unsupported target type: {} (expected 'stock' or 'index')",
                other
            ))),
        }
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// One daily OHLCV observation.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: Option<f64>,
}

/// One row of the latest-per-symbol filtered view.
#[derive(Debug, Clone)]
pub struct LatestRow {
    pub symbol: String,
    pub name: Option<String>,
    pub latest_price: f64,
}

/// Snapshot of an instrument's most recent daily row.
#[derive(Debug, Clone)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub name: Option<String>,
    pub latest_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A compiled filter over the latest-per-symbol view.
///
/// `where_sql` references columns through the target's alias and values only
/// through named parameters listed in `params`.
#[derive(Debug, Clone, Default)]
pub struct LatestRowFilter {
    pub where_sql: Option<String>,
    pub params: Vec<(String, f64)>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<u32>,
}

/// One page of a universe listing.
#[derive(Debug, Clone)]
pub struct UniversePage {
    pub items: Vec<LatestRow>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

// ============================================================================
// Market Store
// ============================================================================

/// SQLite-backed market data store.
pub struct MarketStore {
    /// SQLite connection wrapped in Mutex for thread safety
    /// Note: We use Mutex instead of RwLock because rusqlite::Connection
    /// is Send but not Sync, and Mutex<T> is Sync when T: Send
    db: Arc<Mutex<Connection>>,
}

impl MarketStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::initialize(conn, Some(path))
    }

    /// Open an in-memory store (used by tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, None)
    }

    fn initialize(conn: Connection, path: Option<&Path>) -> Result<Self> {
        // WAL only applies to on-disk databases
        if path.is_some() {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        }
        conn.execute_batch(CREATE_TABLES_SQL)?;

        if let Some(path) = path {
            info!(db_path = %path.display(), "Initialized market store");
        }

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    // ========================================================================
    // Write Operations (ingestion boundary)
    // ========================================================================

    /// Save stock daily bars. Existing (symbol, date) rows are replaced.
    pub async fn save_stock_bars(&self, bars: &[DailyBar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        for bar in bars {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO stock_daily_data
                (symbol, date, open, high, low, close, volume, amount)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    bar.symbol,
                    bar.date.to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.amount,
                ],
            )?;
        }
        tx.commit()?;

        debug!(symbol = %bars[0].symbol, count = bars.len(), "Saved stock bars");
        Ok(bars.len())
    }

    /// Save index daily bars under the given display name.
    pub async fn save_index_bars(&self, name: &str, bars: &[DailyBar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        for bar in bars {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO index_daily_data
                (symbol, name, date, open, high, low, close, volume, amount)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    bar.symbol,
                    name,
                    bar.date.to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.amount,
                ],
            )?;
        }
        tx.commit()?;

        debug!(symbol = %bars[0].symbol, count = bars.len(), "Saved index bars");
        Ok(bars.len())
    }

    // ========================================================================
    // Raw Series Reads
    // ========================================================================

    /// Fetch daily bars for a symbol within `[start, end]`, ascending by date.
    pub async fn get_daily_bars(
        &self,
        target: TargetKind,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT symbol, date, open, high, low, close, volume, amount
             FROM {} WHERE symbol = ?1 AND date BETWEEN ?2 AND ?3
             ORDER BY date",
            target.table()
        );

        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(
            params![symbol, start.to_string(), end.to_string()],
            Self::row_to_bar,
        )?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row?);
        }
        Ok(bars)
    }

    fn row_to_bar(row: &rusqlite::Row) -> rusqlite::Result<DailyBar> {
        let date_str: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(DailyBar {
            symbol: row.get(0)?,
            date,
            open: row.get(2)?,
            high: row.get(3)?,
            low: row.get(4)?,
            close: row.get(5)?,
            volume: row.get(6)?,
            amount: row.get(7)?,
        })
    }

    // ========================================================================
    // Latest-Row-Per-Symbol View
    // ========================================================================

    /// SQL prefix selecting the most recent row per symbol as a derived table.
    ///
    /// Written as an explicit top-1-by-date join so it stays portable across
    /// SQLite builds without window-function support.
    fn latest_cte(target: TargetKind) -> String {
        let table = target.table();
        format!(
            "WITH latest AS (\n\
             SELECT t.* FROM {table} t\n\
             JOIN (SELECT symbol, MAX(date) AS date FROM {table} GROUP BY symbol) m\n\
             ON t.symbol = m.symbol AND t.date = m.date\n\
             )",
            table = table
        )
    }

    fn select_columns(target: TargetKind) -> &'static str {
        match target {
            TargetKind::Stock => "symbol, NULL AS name, close AS latest_price",
            TargetKind::Index => "symbol, name, close AS latest_price",
        }
    }

    /// Execute a compiled filter against the latest-per-symbol view.
    pub async fn fetch_latest_filtered(
        &self,
        target: TargetKind,
        filter: &LatestRowFilter,
    ) -> Result<Vec<LatestRow>> {
        let mut sql = format!(
            "{}\nSELECT {} FROM latest {}",
            Self::latest_cte(target),
            Self::select_columns(target),
            target.qualifier(),
        );

        if let Some(where_sql) = &filter.where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }
        if let Some((column, order)) = &filter.order_by {
            let direction = match order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {} {}", column, direction));
        }
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        debug!(universe = ?target, sql = %sql, "Executing latest-row query");

        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;

        let named: Vec<(&str, &dyn ToSql)> = filter
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v as &dyn ToSql))
            .collect();

        let mut rows = stmt.query(named.as_slice())?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(LatestRow {
                symbol: row.get(0)?,
                name: row.get(1)?,
                latest_price: row.get(2)?,
            });
        }
        Ok(items)
    }

    // ========================================================================
    // Universe Listings
    // ========================================================================

    /// Distinct (symbol, name) pairs of the index universe, symbol ascending.
    pub async fn list_index_universe(&self) -> Result<Vec<(String, String)>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT DISTINCT symbol, name FROM index_daily_data ORDER BY symbol",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut universe = Vec::new();
        for row in rows {
            universe.push(row?);
        }
        Ok(universe)
    }

    /// Paged listing of a universe with optional symbol search.
    pub async fn list_universe(
        &self,
        target: TargetKind,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<UniversePage> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let offset = (page - 1) * page_size;

        let mut sql = format!(
            "{}\nSELECT {} FROM latest {}",
            Self::latest_cte(target),
            Self::select_columns(target),
            target.qualifier(),
        );
        let mut count_sql = format!(
            "SELECT COUNT(DISTINCT symbol) FROM {}",
            target.table()
        );

        let pattern = search.map(|s| format!("%{}%", s));
        if pattern.is_some() {
            sql.push_str(" WHERE symbol LIKE :search");
            count_sql.push_str(" WHERE symbol LIKE :search");
        }
        sql.push_str(&format!(" ORDER BY symbol LIMIT {} OFFSET {}", page_size, offset));

        let db = self.db.lock().await;

        let items = {
            let mut stmt = db.prepare(&sql)?;
            let mut rows = match &pattern {
                Some(p) => stmt.query(&[(":search", p as &dyn ToSql)][..])?,
                None => stmt.query([])?,
            };
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(LatestRow {
                    symbol: row.get(0)?,
                    name: row.get(1)?,
                    latest_price: row.get(2)?,
                });
            }
            items
        };

        let total: i64 = match &pattern {
            Some(p) => db.query_row(&count_sql, &[(":search", p as &dyn ToSql)][..], |row| {
                row.get(0)
            })?,
            None => db.query_row(&count_sql, [], |row| row.get(0))?,
        };

        Ok(UniversePage {
            items,
            total: total as usize,
            page,
            page_size,
        })
    }

    // ========================================================================
    // Instrument Snapshots
    // ========================================================================

    /// Most recent daily row for a single instrument, if any.
    pub async fn get_snapshot(
        &self,
        target: TargetKind,
        symbol: &str,
    ) -> Result<Option<InstrumentSnapshot>> {
        let name_column = match target {
            TargetKind::Stock => "NULL AS name",
            TargetKind::Index => "name",
        };
        let sql = format!(
            "SELECT symbol, {}, date, open, high, low, close, volume
             FROM {} WHERE symbol = ?1
             ORDER BY date DESC LIMIT 1",
            name_column,
            target.table()
        );

        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let mut rows = stmt.query(params![symbol])?;

        match rows.next()? {
            Some(row) => {
                let date_str: String = row.get(2)?;
                let latest_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                    .map_err(|e| Error::Internal(format!("bad date in store: {}", e)))?;
                Ok(Some(InstrumentSnapshot {
                    symbol: row.get(0)?,
                    name: row.get(1)?,
                    latest_date,
                    open: row.get(3)?,
                    high: row.get(4)?,
                    low: row.get(5)?,
                    close: row.get(6)?,
                    volume: row.get(7)?,
                }))
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
