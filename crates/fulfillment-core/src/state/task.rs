//! Production task state machine.
//!
//! scheduled -> in_progress -> completed, with blocked reachable from
//! in_progress and returning to it on resume. Completed is terminal.

use fulfillment_storage::{StorageError, StorageService};
use fulfillment_types::{round_hours, truncate_id, ProductionTask, TaskStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Task not found: {0}")]
	NotFound(String),
	#[error("Cannot {action} a task that is {from}")]
	InvalidTransition {
		action: &'static str,
		from: TaskStatus,
	},
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<StorageError> for TaskStateError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => TaskStateError::NotFound(id),
			other => TaskStateError::Storage(other.to_string()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskAction {
	Start,
	Complete,
	Block { reason: String },
	Resume,
}

impl TaskAction {
	pub fn name(&self) -> &'static str {
		match self {
			TaskAction::Start => "start",
			TaskAction::Complete => "complete",
			TaskAction::Block { .. } => "block",
			TaskAction::Resume => "resume",
		}
	}

	fn source(&self) -> TaskStatus {
		match self {
			TaskAction::Start => TaskStatus::Scheduled,
			TaskAction::Complete | TaskAction::Block { .. } => TaskStatus::InProgress,
			TaskAction::Resume => TaskStatus::Blocked,
		}
	}
}

pub struct TaskStateMachine {
	storage: Arc<StorageService>,
}

impl TaskStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Applies an action to a stored task. The status check and the write
	/// happen under the store's write lock.
	pub async fn apply(
		&self,
		task_id: &str,
		action: &TaskAction,
	) -> Result<ProductionTask, TaskStateError> {
		if let TaskAction::Block { reason } = action {
			if reason.trim().is_empty() {
				return Err(TaskStateError::Validation(
					"blocking a task requires a reason".into(),
				));
			}
		}

		let now = self.storage.clock().now();
		let task = self
			.storage
			.update_with(task_id, |task: &mut ProductionTask| {
				if task.status != action.source() {
					return Err(TaskStateError::InvalidTransition {
						action: action.name(),
						from: task.status,
					});
				}
				match action {
					TaskAction::Start => {
						task.status = TaskStatus::InProgress;
						task.actual_start = Some(now);
					},
					TaskAction::Complete => {
						task.status = TaskStatus::Completed;
						task.actual_end = Some(now);
						task.actual_hours = Some(match task.actual_start {
							Some(start) => {
								round_hours((now - start).num_seconds().max(0) as f64 / 3600.0)
							},
							None => task.estimated_hours,
						});
					},
					TaskAction::Block { reason } => {
						task.status = TaskStatus::Blocked;
						task.blocked_reason = Some(reason.trim().to_string());
					},
					TaskAction::Resume => {
						task.status = TaskStatus::InProgress;
						task.blocked_reason = None;
					},
				}
				Ok(())
			})
			.await?;

		tracing::info!(
			component = "production",
			task_id = %truncate_id(task_id),
			action = action.name(),
			status = %task.status,
			"Task transitioned"
		);
		Ok(task)
	}
}
