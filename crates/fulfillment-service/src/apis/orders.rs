//! Order endpoints: queues, manual entry, edits, workflow transitions,
//! packing view and label purchase for an order.

use super::error::IntoApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	Json,
};
use fulfillment_core::handlers::{
	LabelDraft, LabelOutcome, OrderDraft, OrderEdit, PackingView, StatusPush,
};
use fulfillment_core::{Queue, QueueFilter, Transition};
use fulfillment_types::{APIError, Order, OrderSource, OrderStatus, PasswordConfirmation, Priority};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
	#[serde(default)]
	pub queue: Queue,
	pub search: Option<String>,
	pub priority: Option<Priority>,
	pub source: Option<OrderSource>,
	pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct BulkTransitionRequest {
	pub order_ids: Vec<String>,
	pub transition: Transition,
}

#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
	pub priority: Priority,
}

/// GET /api/orders
pub async fn list_orders(
	State(state): State<AppState>,
	Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<Order>>, APIError> {
	let filter = QueueFilter {
		search: query.search,
		priority: query.priority,
		source: query.source,
		status: query.status,
	};
	let orders = state
		.engine
		.queues()
		.fetch(query.queue, &filter)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(orders))
}

/// POST /api/orders
pub async fn create_order(
	State(state): State<AppState>,
	Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let order = state
		.engine
		.orders()
		.create_manual_order(draft)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{id}
pub async fn get_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.engine
		.orders()
		.get_order(&id)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(order))
}

/// PATCH /api/orders/{id}
pub async fn edit_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(edit): Json<OrderEdit>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.engine
		.orders()
		.edit_order(&id, edit)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(order))
}

/// DELETE /api/orders/{id}
pub async fn delete_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(confirmation): Json<PasswordConfirmation>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.orders()
		.delete_order(&id, &confirmation.password)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(StatusCode::NO_CONTENT)
}

/// POST /api/orders/{id}/transition
pub async fn transition_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(transition): Json<Transition>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.engine
		.order_state()
		.transition(&id, &transition)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(order))
}

/// POST /api/orders/bulk-transition
pub async fn bulk_transition(
	State(state): State<AppState>,
	Json(request): Json<BulkTransitionRequest>,
) -> Result<Json<Vec<Order>>, APIError> {
	let orders = state
		.engine
		.order_state()
		.bulk_transition(&request.order_ids, &request.transition)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(orders))
}

/// PUT /api/orders/{id}/priority
pub async fn set_priority(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(request): Json<PriorityRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.engine
		.orders()
		.set_priority(&id, request.priority)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(order))
}

/// GET /api/orders/{id}/packing
pub async fn packing_view(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<PackingView>, APIError> {
	let view = state
		.engine
		.orders()
		.packing_view(&id)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(view))
}

/// POST /api/orders/{id}/label
pub async fn create_order_label(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(mut draft): Json<LabelDraft>,
) -> Result<(StatusCode, Json<LabelOutcome>), APIError> {
	draft.order_id = Some(id);
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

/// POST /api/orders/{id}/sync-status
pub async fn sync_status(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<StatusPush>, APIError> {
	let push = state
		.engine
		.sync()
		.push_status(&id)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(push))
}
