//! Condition-based screening engine.
//!
//! Compiles a strategy's boolean expression of indicator comparisons into a
//! parameterized query over the latest-row-per-symbol view and shapes the
//! results:
//!
//! ```text
//! Strategy ──▶ condition compiler ──▶ predicate + bindings
//!                                        │
//!            market scope (always AND) ──┤
//!                                        ▼
//!                          latest-row filtered query ──▶ ScreeningResult
//! ```

pub mod condition;
pub mod query;

pub use condition::{CompiledCondition, INDEX_COLUMNS, STOCK_COLUMNS};
pub use query::ScreenEngine;
