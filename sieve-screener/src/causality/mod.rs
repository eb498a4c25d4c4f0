//! Causality test pipeline.
//!
//! ```text
//! stock series ─┐
//!               ├─▶ align (drop suspensions, intersect dates)
//! index series ─┘        │
//!                        ▼
//!              log-return transform (stationarity)
//!                        │
//!                        ▼
//!          lagged F-test per lag order 1..=max_lag
//!                        │
//!                        ▼
//!            per-lag results + overall verdict
//! ```

pub mod align;
pub mod engine;
pub mod granger;
pub mod transform;

pub use align::{align, AlignedPair};
pub use engine::CausalityEngine;
pub use granger::test_direction;
pub use transform::log_returns;
