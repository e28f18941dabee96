//! Production planning.
//!
//! Owns the production task list: manual task creation, auto-scheduling of
//! production orders and the read-only forecast. Task status changes go
//! through [`crate::state::TaskStateMachine`].

pub mod auto;
pub mod forecast;

pub use forecast::{DailyCompletion, Forecast};

use chrono::{DateTime, Utc};
use fulfillment_config::SchedulingConfig;
use fulfillment_storage::{Filter, Sort, StorageError, StorageService};
use fulfillment_types::{
	round_hours, Order, OrderStatus, Priority, ProductionTask, RecordMeta, TaskStatus, WorkStation,
};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SchedulingError {
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Validation error: {0}")]
	Validation(String),
}

/// A task entered by hand.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDraft {
	pub task_name: String,
	pub workstation: String,
	#[serde(default)]
	pub order_id: Option<String>,
	#[serde(default)]
	pub priority: Priority,
	#[serde(default)]
	pub scheduled_start: Option<DateTime<Utc>>,
	#[serde(default)]
	pub scheduled_end: Option<DateTime<Utc>>,
	pub estimated_hours: f64,
	#[serde(default)]
	pub materials_ready: bool,
	#[serde(default)]
	pub notes: Option<String>,
}

/// Result of an auto-schedule run.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleOutcome {
	pub created: Vec<ProductionTask>,
	pub total_hours: f64,
}

pub struct ProductionScheduler {
	storage: Arc<StorageService>,
	config: SchedulingConfig,
	rng: Mutex<StdRng>,
}

impl ProductionScheduler {
	pub fn new(storage: Arc<StorageService>, config: SchedulingConfig, rng: StdRng) -> Self {
		Self {
			storage,
			config,
			rng: Mutex::new(rng),
		}
	}

	pub fn config(&self) -> &SchedulingConfig {
		&self.config
	}

	/// Lists tasks, optionally of one status, earliest scheduled first.
	pub async fn list_tasks(
		&self,
		status: Option<TaskStatus>,
	) -> Result<Vec<ProductionTask>, SchedulingError> {
		let sort = Sort::asc("scheduled_start");
		let tasks = match status {
			Some(status) => {
				self.storage
					.filter(&Filter::new().eq("status", status), Some(&sort), None)
					.await?
			},
			None => self.storage.list(Some(&sort), None).await?,
		};
		Ok(tasks)
	}

	/// Creates a task by hand. A linked order fills in the order number.
	pub async fn create_task(&self, draft: TaskDraft) -> Result<ProductionTask, SchedulingError> {
		if draft.task_name.trim().is_empty() {
			return Err(SchedulingError::Validation("task name is required".into()));
		}
		if draft.workstation.trim().is_empty() {
			return Err(SchedulingError::Validation("workstation is required".into()));
		}
		if !draft.estimated_hours.is_finite() || draft.estimated_hours <= 0.0 {
			return Err(SchedulingError::Validation(
				"estimated hours must be positive".into(),
			));
		}
		if let (Some(start), Some(end)) = (draft.scheduled_start, draft.scheduled_end) {
			if end < start {
				return Err(SchedulingError::Validation(
					"scheduled end is before scheduled start".into(),
				));
			}
		}

		let order_number = match &draft.order_id {
			Some(order_id) => Some(self.storage.get::<Order>(order_id).await?.order_number),
			None => None,
		};

		let task = ProductionTask {
			meta: RecordMeta::default(),
			order_id: draft.order_id,
			order_number,
			task_name: draft.task_name.trim().to_string(),
			workstation: draft.workstation.trim().to_string(),
			status: TaskStatus::Scheduled,
			priority: draft.priority,
			scheduled_start: draft.scheduled_start,
			scheduled_end: draft.scheduled_end,
			estimated_hours: round_hours(draft.estimated_hours),
			actual_start: None,
			actual_end: None,
			actual_hours: None,
			blocked_reason: None,
			materials_ready: draft.materials_ready,
			notes: draft.notes,
		};
		Ok(self.storage.create(task).await?)
	}

	/// Creates one scheduled task for every production order without one.
	pub async fn auto_schedule(&self) -> Result<ScheduleOutcome, SchedulingError> {
		let orders: Vec<Order> = self
			.storage
			.filter(
				&Filter::new().eq("status", OrderStatus::Production),
				Some(&Sort::asc("created_date")),
				None,
			)
			.await?;
		let tasks: Vec<ProductionTask> = self.storage.list(None, None).await?;
		let workstations: Vec<WorkStation> = self.storage.list(None, None).await?;

		let candidates = auto::candidates(orders, &tasks);
		if candidates.is_empty() {
			tracing::info!(component = "production", "No unscheduled production orders");
			return Ok(ScheduleOutcome {
				created: Vec::new(),
				total_hours: 0.0,
			});
		}

		let now = self.storage.clock().now();
		let planned = {
			let mut rng = self.rng.lock().await;
			auto::plan_tasks(&candidates, &workstations, &self.config, now, &mut *rng)
		};
		let created = self.storage.bulk_create(planned).await?;
		let total_hours = round_hours(created.iter().map(|t| t.estimated_hours).sum());

		tracing::info!(
			component = "production",
			tasks = created.len(),
			total_hours,
			"Auto-scheduled production orders"
		);
		Ok(ScheduleOutcome {
			created,
			total_hours,
		})
	}

	/// Forecast for the configured window ending today.
	pub async fn forecast(&self) -> Result<Forecast, SchedulingError> {
		let tasks: Vec<ProductionTask> = self.storage.list(None, None).await?;
		let today = self.storage.clock().now().date_naive();
		Ok(forecast::forecast(
			&tasks,
			today,
			self.config.forecast_window_days,
		))
	}
}
