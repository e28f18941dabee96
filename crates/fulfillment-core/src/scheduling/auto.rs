//! Back-to-back auto-scheduling of production orders.

use chrono::{DateTime, Duration, Utc};
use fulfillment_config::SchedulingConfig;
use fulfillment_types::{
	round_hours, Order, OrderStatus, ProductionTask, RecordMeta, TaskStatus, WorkStation,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::queue::{sort_by_priority, SecondaryKey};

/// Estimated production hours for an order.
pub fn estimate_hours(order: &Order, config: &SchedulingConfig) -> f64 {
	let by_quantity = f64::from(order.total_item_quantity()) * config.hours_per_item;
	round_hours(by_quantity.max(config.min_task_hours))
}

/// Whole workdays needed for `hours` of work. Never less than one.
pub fn workdays(hours: f64, config: &SchedulingConfig) -> i64 {
	if config.workday_hours <= 0.0 {
		return 1;
	}
	((hours / config.workday_hours).ceil() as i64).max(1)
}

/// Orders in production that no task references yet, oldest first and then
/// ranked by priority.
pub fn candidates(orders: Vec<Order>, tasks: &[ProductionTask]) -> Vec<Order> {
	let scheduled: HashSet<&str> = tasks
		.iter()
		.filter_map(|task| task.order_id.as_deref())
		.collect();
	let mut candidates: Vec<Order> = orders
		.into_iter()
		.filter(|order| order.status == OrderStatus::Production)
		.filter(|order| !scheduled.contains(order.meta.id.as_str()))
		.collect();
	sort_by_priority(&mut candidates, SecondaryKey::OldestFirst);
	candidates
}

/// Plans one task per order, in the given order, starting at `start`.
///
/// Tasks run back-to-back: each starts where the previous one ended,
/// regardless of how many workstations exist. The workstation is drawn
/// uniformly from the active ones.
pub fn plan_tasks<R: Rng + ?Sized>(
	orders: &[Order],
	workstations: &[WorkStation],
	config: &SchedulingConfig,
	start: DateTime<Utc>,
	rng: &mut R,
) -> Vec<ProductionTask> {
	let active: Vec<&WorkStation> = workstations.iter().filter(|ws| ws.active).collect();
	let mut cursor = start;

	orders
		.iter()
		.map(|order| {
			let estimated_hours = estimate_hours(order, config);
			let end = cursor + Duration::days(workdays(estimated_hours, config));
			let workstation = active
				.choose(rng)
				.map(|ws| ws.name.clone())
				.unwrap_or_else(|| config.default_workstation.clone());

			let task = ProductionTask {
				meta: RecordMeta::default(),
				order_id: Some(order.meta.id.clone()),
				order_number: Some(order.order_number.clone()),
				task_name: format!("Produce order {}", order.order_number),
				workstation,
				status: TaskStatus::Scheduled,
				priority: order.priority,
				scheduled_start: Some(cursor),
				scheduled_end: Some(end),
				estimated_hours,
				actual_start: None,
				actual_end: None,
				actual_hours: None,
				blocked_reason: None,
				materials_ready: true,
				notes: None,
			};
			cursor = end;
			task
		})
		.collect()
}
