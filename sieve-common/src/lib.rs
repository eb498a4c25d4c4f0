//! Shared foundations for the Sieve services.
//!
//! Provides the unified error type, the immutable application configuration
//! and logging initialization used by every service crate.

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppConfig;
pub use error::{Error, Result};
