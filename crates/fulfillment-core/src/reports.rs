//! Read-only reports over shipments, tasks, products and orders.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use fulfillment_storage::{Filter, Sort, StorageError, StorageService};
use fulfillment_types::{
	round_hours, Order, OrderStatus, Priority, Product, ProductStatus, ProductionTask, Shipment,
	WorkStation,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Longest utilization window accepted, in days.
pub const MAX_UTILIZATION_DAYS: u32 = 366;

/// Shipping report window used when the caller gives no `from` date.
pub const DEFAULT_SHIPPING_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum ReportError {
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShippingSummary {
	pub from: NaiveDate,
	pub to: NaiveDate,
	pub label_count: usize,
	pub total_cost: Decimal,
	pub by_carrier: BTreeMap<String, usize>,
	pub by_category: BTreeMap<String, usize>,
	pub needs_reconciliation: usize,
}

/// Shipments with a ship date in `from..=to`.
pub fn shipping_summary(shipments: &[Shipment], from: NaiveDate, to: NaiveDate) -> ShippingSummary {
	let mut summary = ShippingSummary {
		from,
		to,
		label_count: 0,
		total_cost: Decimal::ZERO,
		by_carrier: BTreeMap::new(),
		by_category: BTreeMap::new(),
		needs_reconciliation: 0,
	};
	for shipment in shipments
		.iter()
		.filter(|s| s.ship_date >= from && s.ship_date <= to)
	{
		summary.label_count += 1;
		summary.total_cost += shipment.shipping_cost.unwrap_or_default();
		*summary
			.by_carrier
			.entry(shipment.carrier.to_string())
			.or_default() += 1;
		*summary
			.by_category
			.entry(shipment.shipment_category.to_string())
			.or_default() += 1;
		if shipment.needs_reconciliation {
			summary.needs_reconciliation += 1;
		}
	}
	summary
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkstationUtilization {
	pub workstation: String,
	pub scheduled_hours: f64,
	pub capacity_hours: f64,
	/// Percent of capacity. `None` for workstations with no capacity, such
	/// as names only found on tasks.
	pub utilization: Option<f64>,
}

/// Estimated hours of tasks scheduled to start in `[start, start + days)`,
/// per workstation, against each workstation's capacity for the window.
pub fn utilization(
	tasks: &[ProductionTask],
	workstations: &[WorkStation],
	start: DateTime<Utc>,
	days: u32,
) -> Vec<WorkstationUtilization> {
	let end = start
		.checked_add_signed(Duration::days(i64::from(days)))
		.unwrap_or(DateTime::<Utc>::MAX_UTC);
	let mut hours: BTreeMap<String, f64> = workstations
		.iter()
		.filter(|ws| ws.active)
		.map(|ws| (ws.name.clone(), 0.0))
		.collect();
	for task in tasks {
		let Some(scheduled) = task.scheduled_start else {
			continue;
		};
		if scheduled >= start && scheduled < end {
			*hours.entry(task.workstation.clone()).or_default() += task.estimated_hours;
		}
	}

	hours
		.into_iter()
		.map(|(name, scheduled_hours)| {
			let capacity_hours = workstations
				.iter()
				.find(|ws| ws.active && ws.name == name)
				.map(|ws| ws.daily_capacity_hours * f64::from(days))
				.unwrap_or(0.0);
			WorkstationUtilization {
				utilization: (capacity_hours > 0.0)
					.then(|| round_hours(100.0 * scheduled_hours / capacity_hours)),
				workstation: name,
				scheduled_hours: round_hours(scheduled_hours),
				capacity_hours: round_hours(capacity_hours),
			}
		})
		.collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowSnapshot {
	/// Every status, including those with no orders.
	pub counts: BTreeMap<String, usize>,
	pub total: usize,
	/// Rush orders that have not shipped yet.
	pub open_rush: usize,
}

fn awaiting_shipment(status: OrderStatus) -> bool {
	!matches!(
		status,
		OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Cancelled
	)
}

pub fn workflow_snapshot(orders: &[Order]) -> WorkflowSnapshot {
	let mut counts: BTreeMap<String, usize> = OrderStatus::ALL
		.iter()
		.map(|status| (status.to_string(), 0))
		.collect();
	for order in orders {
		*counts.entry(order.status.to_string()).or_default() += 1;
	}
	WorkflowSnapshot {
		counts,
		total: orders.len(),
		open_rush: orders
			.iter()
			.filter(|o| o.priority == Priority::Rush && awaiting_shipment(o.status))
			.count(),
	}
}

pub struct ReportService {
	storage: Arc<StorageService>,
}

impl ReportService {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn shipping(&self, from: NaiveDate, to: NaiveDate) -> Result<ShippingSummary, ReportError> {
		if to < from {
			return Err(ReportError::Validation("'to' is before 'from'".into()));
		}
		let shipments: Vec<Shipment> = self.storage.list(None, None).await?;
		Ok(shipping_summary(&shipments, from, to))
	}

	/// Like [`Self::shipping`], with `to` defaulting to today and `from` to
	/// the thirty days ending at `to`.
	pub async fn shipping_window(
		&self,
		from: Option<NaiveDate>,
		to: Option<NaiveDate>,
	) -> Result<ShippingSummary, ReportError> {
		let to = to.unwrap_or_else(|| self.storage.clock().now().date_naive());
		let from = match from {
			Some(from) => from,
			None => to
				.checked_sub_signed(Duration::days(DEFAULT_SHIPPING_DAYS - 1))
				.ok_or_else(|| ReportError::Validation(format!("'to' date {} is out of range", to)))?,
		};
		self.shipping(from, to).await
	}

	/// Utilization for `days` days starting at midnight UTC today.
	pub async fn utilization(&self, days: u32) -> Result<Vec<WorkstationUtilization>, ReportError> {
		if !(1..=MAX_UTILIZATION_DAYS).contains(&days) {
			return Err(ReportError::Validation(format!(
				"window must be between 1 and {} days, got {}",
				MAX_UTILIZATION_DAYS, days
			)));
		}
		let today = self.storage.clock().now().date_naive();
		let start = today.and_time(chrono::NaiveTime::MIN).and_utc();
		let tasks: Vec<ProductionTask> = self.storage.list(None, None).await?;
		let workstations: Vec<WorkStation> = self.storage.list(None, None).await?;
		Ok(utilization(&tasks, &workstations, start, days))
	}

	/// Enabled products at or below `threshold`, lowest stock first.
	pub async fn low_stock(&self, threshold: i64) -> Result<Vec<Product>, ReportError> {
		let mut products: Vec<Product> = self
			.storage
			.filter(
				&Filter::new().eq("status", ProductStatus::Enabled),
				Some(&Sort::asc("stock_quantity")),
				None,
			)
			.await?;
		products.retain(|p| p.stock_quantity <= threshold);
		Ok(products)
	}

	pub async fn workflow(&self) -> Result<WorkflowSnapshot, ReportError> {
		let orders: Vec<Order> = self.storage.list(None, None).await?;
		Ok(workflow_snapshot(&orders))
	}
}
