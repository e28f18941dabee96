//! Read-only report endpoints.

use super::error::IntoApiError;
use crate::server::AppState;
use axum::{
	extract::{Query, State},
	Json,
};
use chrono::NaiveDate;
use fulfillment_core::reports::{ShippingSummary, WorkflowSnapshot, WorkstationUtilization};
use fulfillment_types::{APIError, Product};
use serde::Deserialize;

const DEFAULT_LOW_STOCK: i64 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
	pub from: Option<NaiveDate>,
	pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UtilizationQuery {
	pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
	pub threshold: Option<i64>,
}

/// GET /api/reports/shipping
///
/// Defaults to the thirty days ending today.
pub async fn shipping(
	State(state): State<AppState>,
	Query(query): Query<RangeQuery>,
) -> Result<Json<ShippingSummary>, APIError> {
	let summary = state
		.engine
		.reports()
		.shipping_window(query.from, query.to)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(summary))
}

/// GET /api/reports/utilization
pub async fn utilization(
	State(state): State<AppState>,
	Query(query): Query<UtilizationQuery>,
) -> Result<Json<Vec<WorkstationUtilization>>, APIError> {
	let days = query
		.days
		.unwrap_or(state.engine.config().scheduling.forecast_window_days);
	let report = state
		.engine
		.reports()
		.utilization(days)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(report))
}

/// GET /api/reports/low-stock
pub async fn low_stock(
	State(state): State<AppState>,
	Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<Product>>, APIError> {
	let products = state
		.engine
		.reports()
		.low_stock(query.threshold.unwrap_or(DEFAULT_LOW_STOCK))
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(products))
}

/// GET /api/reports/workflow
pub async fn workflow(State(state): State<AppState>) -> Result<Json<WorkflowSnapshot>, APIError> {
	let snapshot = state
		.engine
		.reports()
		.workflow()
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(snapshot))
}
