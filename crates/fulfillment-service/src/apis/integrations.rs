//! Commerce sync and insight endpoints. Both answer 503 when the
//! integration is not configured.

use super::error::IntoApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	Json,
};
use fulfillment_core::handlers::{ImportSummary, ProductSyncSummary};
use fulfillment_insights::{Answer, PrioritySuggestion, ProductionInsights};
use fulfillment_types::APIError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
	pub question: String,
}

/// POST /api/sync/orders
pub async fn import_orders(State(state): State<AppState>) -> Result<Json<ImportSummary>, APIError> {
	let summary = state
		.engine
		.sync()
		.import_orders()
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(summary))
}

/// POST /api/sync/products
pub async fn sync_products(
	State(state): State<AppState>,
) -> Result<Json<ProductSyncSummary>, APIError> {
	let summary = state
		.engine
		.sync()
		.sync_products()
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(summary))
}

/// POST /api/insights/production
pub async fn production_insights(
	State(state): State<AppState>,
) -> Result<Json<ProductionInsights>, APIError> {
	let insights = state
		.engine
		.insights()
		.production_insights()
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(insights))
}

/// POST /api/insights/priority/{order_id}
pub async fn suggest_priority(
	State(state): State<AppState>,
	Path(order_id): Path<String>,
) -> Result<Json<PrioritySuggestion>, APIError> {
	let suggestion = state
		.engine
		.insights()
		.suggest_priority(&order_id)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(suggestion))
}

/// POST /api/insights/ask
pub async fn ask(
	State(state): State<AppState>,
	Json(request): Json<AskRequest>,
) -> Result<Json<Answer>, APIError> {
	if request.question.trim().is_empty() {
		return Err(super::error::bad_request("question is required"));
	}
	let answer = state
		.engine
		.insights()
		.ask(&request.question)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(answer))
}
