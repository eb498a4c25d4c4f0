//! HTTP routes for the screener service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use sieve_common::Error;

use crate::models::{CausalityRequest, CausalityResponse, ScreeningResult, Strategy};
use crate::store::TargetKind;
use crate::SieveState;

// ============================================================================
// Error Mapping
// ============================================================================

/// Wrapper turning a service error into an HTTP response.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        // Validation failures surface every field problem at once
        let body = match &self.0 {
            Error::Validation(errors) => serde_json::json!({
                "error": "validation failed",
                "details": errors,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct UniverseItem {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub latest_price: f64,
}

#[derive(Debug, Serialize)]
pub struct UniverseResponse {
    pub items: Vec<UniverseItem>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub latest_date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

const fn default_page() -> usize {
    1
}

const fn default_page_size() -> usize {
    20
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "sieve-screener".to_string(),
    })
}

/// Run a screening strategy against the stock or index universe.
pub async fn run_screen(
    State(state): State<Arc<SieveState>>,
    Path(target): Path<String>,
    Json(strategy): Json<Strategy>,
) -> Result<Json<ScreeningResult>, ApiError> {
    // Target type is checked before any compilation starts
    let target: TargetKind = target.parse()?;
    let result = state.screen.run(&strategy, target).await?;
    Ok(Json(result))
}

/// Run a causality test between a stock and all indices.
pub async fn run_causality(
    State(state): State<Arc<SieveState>>,
    Json(request): Json<CausalityRequest>,
) -> Result<Json<CausalityResponse>, ApiError> {
    let response = state.causality.run(&request).await?;
    Ok(Json(response))
}

/// List the stock universe with latest prices.
pub async fn list_stocks(
    State(state): State<Arc<SieveState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<UniverseResponse>, ApiError> {
    list_universe(state, TargetKind::Stock, params).await
}

/// List the index universe with latest prices.
pub async fn list_indices(
    State(state): State<Arc<SieveState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<UniverseResponse>, ApiError> {
    list_universe(state, TargetKind::Index, params).await
}

async fn list_universe(
    state: Arc<SieveState>,
    target: TargetKind,
    params: ListParams,
) -> Result<Json<UniverseResponse>, ApiError> {
    let page = state
        .store
        .list_universe(target, params.search.as_deref(), params.page, params.page_size)
        .await?;

    Ok(Json(UniverseResponse {
        items: page
            .items
            .into_iter()
            .map(|row| UniverseItem {
                symbol: row.symbol,
                name: row.name,
                latest_price: row.latest_price,
            })
            .collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
    }))
}

/// Latest snapshot of one stock.
pub async fn get_stock(
    State(state): State<Arc<SieveState>>,
    Path(symbol): Path<String>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    get_snapshot(state, TargetKind::Stock, symbol).await
}

/// Latest snapshot of one index.
pub async fn get_index(
    State(state): State<Arc<SieveState>>,
    Path(symbol): Path<String>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    get_snapshot(state, TargetKind::Index, symbol).await
}

async fn get_snapshot(
    state: Arc<SieveState>,
    target: TargetKind,
    symbol: String,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let snapshot = state
        .store
        .get_snapshot(target, &symbol)
        .await?
        .ok_or_else(|| Error::NotFound(format!("instrument {} not found", symbol)))?;

    Ok(Json(SnapshotResponse {
        symbol: snapshot.symbol,
        name: snapshot.name,
        latest_date: snapshot.latest_date.to_string(),
        open: snapshot.open,
        high: snapshot.high,
        low: snapshot.low,
        close: snapshot.close,
        volume: snapshot.volume,
    }))
}
