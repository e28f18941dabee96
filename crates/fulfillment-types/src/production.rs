//! Production scheduling records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Priority, RecordMeta, StorageKey};

string_enum! {
	/// Lifecycle state of a production task.
	pub enum TaskStatus ("task status") {
		Scheduled => "scheduled",
		InProgress => "in_progress",
		Completed => "completed",
		Blocked => "blocked",
	}
}

/// A scheduling unit of production work, usually tied to one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionTask {
	#[serde(flatten)]
	pub meta: RecordMeta,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_number: Option<String>,
	pub task_name: String,
	pub workstation: String,
	pub status: TaskStatus,
	#[serde(default)]
	pub priority: Priority,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scheduled_start: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scheduled_end: Option<DateTime<Utc>>,
	#[serde(default)]
	pub estimated_hours: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub actual_start: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub actual_end: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub actual_hours: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub blocked_reason: Option<String>,
	#[serde(default)]
	pub materials_ready: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

entity!(ProductionTask, StorageKey::ProductionTasks);

/// A named production resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkStation {
	#[serde(flatten)]
	pub meta: RecordMeta,
	pub name: String,
	/// Productive hours available per day, used for utilization reporting.
	#[serde(default = "default_capacity_hours")]
	pub daily_capacity_hours: f64,
	#[serde(default = "default_active")]
	pub active: bool,
}

entity!(WorkStation, StorageKey::WorkStations);

fn default_capacity_hours() -> f64 {
	8.0
}

fn default_active() -> bool {
	true
}
