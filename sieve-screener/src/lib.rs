//! Sieve Screener Library
//!
//! Screens financial instruments (stocks/indices) against configurable
//! technical conditions and tests directional statistical causality between
//! a stock and the market indices.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   sieve-screener (Rust Service)                 │
//! │                            :4452                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────┐     │
//! │  │  Market Store │   │   Screening   │   │   Causality   │     │
//! │  │   (SQLite)    │   │    Engine     │   │    Engine     │     │
//! │  └───────────────┘   └───────────────┘   └───────────────┘     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Screening
//! A `Strategy` combines indicator comparisons (close > 10, volume between
//! [a, b], ...) with one logic operator and a market scope, compiled into a
//! parameterized query over the latest daily row of every instrument.
//!
//! ## Causality
//! For each market index, the stock and index close series are aligned,
//! transformed to log returns and compared with a lagged F-test in one or
//! both directions, producing per-lag significance and an overall verdict.

#![warn(clippy::all)]

pub mod causality;
pub mod models;
pub mod routes;
pub mod screener;
pub mod store;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use sieve_common::AppConfig;

use crate::causality::CausalityEngine;
use crate::screener::ScreenEngine;
use crate::store::MarketStore;

/// Screener service state
pub struct SieveState {
    /// Configuration
    pub config: Arc<AppConfig>,
    /// Market data store
    pub store: Arc<MarketStore>,
    /// Screening engine
    pub screen: ScreenEngine,
    /// Causality engine
    pub causality: CausalityEngine,
}

impl SieveState {
    /// Create the service state from configuration.
    pub fn new(config: AppConfig) -> sieve_common::Result<Self> {
        let config = Arc::new(config);
        let store = Arc::new(MarketStore::open(&config.storage.db_path)?);
        let screen = ScreenEngine::new(Arc::clone(&store));
        let causality = CausalityEngine::new(Arc::clone(&store), Arc::clone(&config));

        Ok(Self {
            config,
            store,
            screen,
            causality,
        })
    }
}

/// Main screener service
pub struct ScreenerService {
    state: Arc<SieveState>,
}

impl ScreenerService {
    /// Create a new screener service
    pub fn new(config: AppConfig) -> sieve_common::Result<Self> {
        let state = Arc::new(SieveState::new(config)?);
        Ok(Self { state })
    }

    /// Build the HTTP router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/api/v1/screen/:target", post(routes::run_screen))
            .route("/api/v1/causality", post(routes::run_causality))
            .route("/api/v1/stocks", get(routes::list_stocks))
            .route("/api/v1/stocks/:symbol", get(routes::get_stock))
            .route("/api/v1/indices", get(routes::list_indices))
            .route("/api/v1/indices/:symbol", get(routes::get_index))
            // The engines carry no internal timeout; bounded latency is
            // imposed here, around the whole request.
            .layer(TimeoutLayer::new(Duration::from_secs(120)))
            .with_state(self.state.clone())
    }

    /// Start the HTTP server.
    pub async fn start(self) -> Result<()> {
        let host = self.state.config.server.host.clone();
        let port = self.state.config.server.port;
        let app = self.router();

        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
