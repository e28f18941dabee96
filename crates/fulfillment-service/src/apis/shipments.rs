//! Shipment endpoints: standalone labels, package checks and the shipment
//! log.

use super::error::IntoApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	Json,
};
use fulfillment_carrier::PackageValidation;
use fulfillment_core::handlers::{LabelDraft, LabelOutcome};
use fulfillment_types::{APIError, PasswordConfirmation, Shipment};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ShipmentsQuery {
	pub limit: Option<usize>,
}

/// GET /api/shipments
pub async fn list_shipments(
	State(state): State<AppState>,
	Query(query): Query<ShipmentsQuery>,
) -> Result<Json<Vec<Shipment>>, APIError> {
	let shipments = state
		.engine
		.labels()
		.list_shipments(query.limit)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(shipments))
}

/// POST /api/shipments
///
/// Buys a label that is not tied to an order (returns, samples, supplies).
pub async fn create_shipment(
	State(state): State<AppState>,
	Json(draft): Json<LabelDraft>,
) -> Result<(StatusCode, Json<LabelOutcome>), APIError> {
	let outcome = state
		.engine
		.labels()
		.create_label(draft)
		.await
		.map_err(|e| {
			tracing::warn!(component = "api", error = %e, "Label purchase failed");
			e.into_api_error()
		})?;
	Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/shipments/validate
pub async fn validate_package(
	State(state): State<AppState>,
	Json(draft): Json<LabelDraft>,
) -> Result<Json<PackageValidation>, APIError> {
	let validation = state
		.engine
		.labels()
		.validate_package(draft)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(validation))
}

/// DELETE /api/shipments/{id}
pub async fn delete_shipment(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(confirmation): Json<PasswordConfirmation>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.labels()
		.delete_shipment(&id, &confirmation.password)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(StatusCode::NO_CONTENT)
}
