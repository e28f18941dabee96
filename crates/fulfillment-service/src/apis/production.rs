//! Production task endpoints.

use super::error::IntoApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	Json,
};
use fulfillment_core::scheduling::{Forecast, ScheduleOutcome, TaskDraft};
use fulfillment_core::state::TaskAction;
use fulfillment_types::{APIError, ProductionTask, TaskStatus};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct TasksQuery {
	pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
	pub reason: String,
}

/// GET /api/production/tasks
pub async fn list_tasks(
	State(state): State<AppState>,
	Query(query): Query<TasksQuery>,
) -> Result<Json<Vec<ProductionTask>>, APIError> {
	let tasks = state
		.engine
		.scheduler()
		.list_tasks(query.status)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(tasks))
}

/// POST /api/production/tasks
pub async fn create_task(
	State(state): State<AppState>,
	Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<ProductionTask>), APIError> {
	let task = state
		.engine
		.scheduler()
		.create_task(draft)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok((StatusCode::CREATED, Json(task)))
}

async fn apply(
	state: &AppState,
	task_id: &str,
	action: TaskAction,
) -> Result<Json<ProductionTask>, APIError> {
	let task = state
		.engine
		.task_state()
		.apply(task_id, &action)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(task))
}

/// POST /api/production/tasks/{id}/start
pub async fn start_task(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<ProductionTask>, APIError> {
	apply(&state, &id, TaskAction::Start).await
}

/// POST /api/production/tasks/{id}/complete
pub async fn complete_task(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<ProductionTask>, APIError> {
	apply(&state, &id, TaskAction::Complete).await
}

/// POST /api/production/tasks/{id}/block
pub async fn block_task(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(request): Json<BlockRequest>,
) -> Result<Json<ProductionTask>, APIError> {
	apply(&state, &id, TaskAction::Block {
		reason: request.reason,
	})
	.await
}

/// POST /api/production/tasks/{id}/resume
pub async fn resume_task(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<ProductionTask>, APIError> {
	apply(&state, &id, TaskAction::Resume).await
}

/// POST /api/production/auto-schedule
pub async fn auto_schedule(
	State(state): State<AppState>,
) -> Result<Json<ScheduleOutcome>, APIError> {
	let outcome = state
		.engine
		.scheduler()
		.auto_schedule()
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(outcome))
}

/// GET /api/production/forecast
pub async fn forecast(State(state): State<AppState>) -> Result<Json<Forecast>, APIError> {
	let forecast = state
		.engine
		.scheduler()
		.forecast()
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(forecast))
}
