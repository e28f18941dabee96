//! Plain CRUD over entity types that have no workflow of their own.
//!
//! Handlers are generic over the entity and instantiated per route.

use super::error::IntoApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	Json,
};
use fulfillment_storage::Sort;
use fulfillment_types::{APIError, Entity};
use serde_json::Value;

/// Lists records newest first.
pub async fn list_records<T: Entity>(
	State(state): State<AppState>,
) -> Result<Json<Vec<T>>, APIError> {
	let records = state
		.engine
		.storage()
		.list::<T>(Some(&Sort::desc("created_date")), None)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(records))
}

pub async fn create_record<T: Entity>(
	State(state): State<AppState>,
	Json(record): Json<T>,
) -> Result<(StatusCode, Json<T>), APIError> {
	let created = state
		.engine
		.storage()
		.create(record)
		.await
		.map_err(IntoApiError::into_api_error)?;
	tracing::info!(
		component = "api",
		namespace = T::KEY.as_str(),
		id = %created.id(),
		"Created record"
	);
	Ok((StatusCode::CREATED, Json(created)))
}

/// Merges the body's top-level fields into the stored record.
pub async fn update_record<T: Entity>(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(partial): Json<Value>,
) -> Result<Json<T>, APIError> {
	let updated = state
		.engine
		.storage()
		.update::<T>(&id, partial)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(updated))
}

pub async fn delete_record<T: Entity>(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.storage()
		.delete::<T>(&id)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(StatusCode::NO_CONTENT)
}
