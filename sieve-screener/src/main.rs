//! Sieve Screener - condition-based market screening and causality testing.

use anyhow::Result;
use sieve_common::logging::init_logging;
use sieve_common::AppConfig;
use sieve_screener::ScreenerService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Sieve Screener v{}", env!("CARGO_PKG_VERSION"));

    // Build the service (opens the market store)
    let service = ScreenerService::new(config)?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
