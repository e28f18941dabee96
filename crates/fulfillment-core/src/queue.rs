//! Workflow queues.
//!
//! Each queue fetches orders by exact status, up to the configured fetch
//! limit, then applies pure filters and sorts by priority with a
//! queue-specific secondary key. Orders beyond the fetch limit are silently
//! left out.

use fulfillment_storage::{Filter, Sort, StorageError, StorageService};
use fulfillment_types::{Order, OrderSource, OrderStatus, Priority};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// A page of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Queue {
	/// Every order, optionally narrowed to one status.
	#[default]
	Orders,
	Production,
	Staging,
	PackingStation,
	ReadyToShip,
	OnHold,
}

/// Tie-breaker applied after priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryKey {
	NewestFirst,
	OldestFirst,
	RecentlyUpdatedFirst,
}

impl SecondaryKey {
	fn sort(&self) -> Sort {
		match self {
			SecondaryKey::NewestFirst => Sort::desc("created_date"),
			SecondaryKey::OldestFirst => Sort::asc("created_date"),
			SecondaryKey::RecentlyUpdatedFirst => Sort::desc("updated_date"),
		}
	}

	fn compare(&self, a: &Order, b: &Order) -> Ordering {
		match self {
			SecondaryKey::NewestFirst => b.meta.created_date.cmp(&a.meta.created_date),
			SecondaryKey::OldestFirst => a.meta.created_date.cmp(&b.meta.created_date),
			SecondaryKey::RecentlyUpdatedFirst => b.meta.updated_date.cmp(&a.meta.updated_date),
		}
	}
}

impl Queue {
	/// Status the queue is fetched by. `None` for the all-orders page.
	pub fn status(&self) -> Option<OrderStatus> {
		match self {
			Queue::Orders => None,
			Queue::Production => Some(OrderStatus::Production),
			Queue::Staging | Queue::PackingStation => Some(OrderStatus::Staging),
			Queue::ReadyToShip => Some(OrderStatus::Processing),
			Queue::OnHold => Some(OrderStatus::Hold),
		}
	}

	pub fn secondary_key(&self) -> SecondaryKey {
		match self {
			Queue::Orders => SecondaryKey::NewestFirst,
			Queue::Production => SecondaryKey::OldestFirst,
			Queue::Staging | Queue::PackingStation | Queue::ReadyToShip | Queue::OnHold => {
				SecondaryKey::RecentlyUpdatedFirst
			},
		}
	}

	/// Whether free-text search also looks at line item SKUs.
	pub fn searches_skus(&self) -> bool {
		matches!(self, Queue::Production | Queue::Staging | Queue::PackingStation)
	}
}

/// Composable view filters. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueFilter {
	#[serde(default)]
	pub search: Option<String>,
	#[serde(default)]
	pub priority: Option<Priority>,
	#[serde(default)]
	pub source: Option<OrderSource>,
	/// Only honoured on the all-orders page.
	#[serde(default)]
	pub status: Option<OrderStatus>,
}

impl QueueFilter {
	/// Case-insensitive substring search over order number, customer name
	/// and email, plus SKUs when `include_skus` is set.
	pub fn matches_search(&self, order: &Order, include_skus: bool) -> bool {
		let Some(needle) = self
			.search
			.as_deref()
			.map(str::trim)
			.filter(|s| !s.is_empty())
		else {
			return true;
		};
		let needle = needle.to_lowercase();
		let hit = |text: &str| text.to_lowercase().contains(&needle);

		hit(&order.order_number)
			|| hit(&order.customer_name)
			|| hit(&order.customer_email)
			|| (include_skus && order.items.iter().any(|item| hit(&item.sku)))
	}

	pub fn matches(&self, order: &Order, include_skus: bool) -> bool {
		self.priority.is_none_or(|p| order.priority == p)
			&& self.source.is_none_or(|s| order.source == s)
			&& self.status.is_none_or(|s| order.status == s)
			&& self.matches_search(order, include_skus)
	}
}

/// Stable sort by priority rank, then by the secondary key.
pub fn sort_by_priority(orders: &mut [Order], secondary: SecondaryKey) {
	orders.sort_by(|a, b| {
		a.priority
			.rank()
			.cmp(&b.priority.rank())
			.then_with(|| secondary.compare(a, b))
	});
}

/// Reads queues from the store.
pub struct QueueService {
	storage: Arc<StorageService>,
	fetch_limit: usize,
}

impl QueueService {
	pub fn new(storage: Arc<StorageService>, fetch_limit: usize) -> Self {
		Self {
			storage,
			fetch_limit,
		}
	}

	/// Returns the orders on a queue after filtering and ranking.
	pub async fn fetch(&self, queue: Queue, filter: &QueueFilter) -> Result<Vec<Order>, StorageError> {
		let status = queue.status().or(match queue {
			Queue::Orders => filter.status,
			_ => None,
		});
		let predicate = match status {
			Some(status) => Filter::new().eq("status", status),
			None => Filter::new(),
		};
		let secondary = queue.secondary_key();

		let mut orders: Vec<Order> = self
			.storage
			.filter(&predicate, Some(&secondary.sort()), Some(self.fetch_limit))
			.await?;
		orders.retain(|order| filter.matches(order, queue.searches_skus()));
		sort_by_priority(&mut orders, secondary);

		tracing::debug!(
			component = "queue",
			queue = ?queue,
			count = orders.len(),
			"Fetched queue"
		);
		Ok(orders)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{clocked_storage, item, manual_order, start_time};
	use chrono::Duration;
	use fulfillment_types::ManualClock;

	async fn store(
		storage: &Arc<StorageService>,
		clock: &ManualClock,
		number: &str,
		status: OrderStatus,
		priority: Priority,
	) -> Order {
		clock.advance(Duration::minutes(1));
		let mut order = manual_order(number, "US");
		order.status = status;
		order.priority = priority;
		storage.create(order).await.unwrap()
	}

	#[test]
	fn test_priority_sort_is_total_and_stable() {
		let base = start_time();
		let mut orders: Vec<Order> = [
			("a", Priority::Normal, 0),
			("b", Priority::Rush, 1),
			("c", Priority::Priority, 2),
			("d", Priority::Normal, 3),
			("e", Priority::Rush, 4),
		]
		.into_iter()
		.map(|(number, priority, minute)| {
			let mut order = manual_order(number, "US");
			order.priority = priority;
			order.meta.created_date = base + Duration::minutes(minute);
			order
		})
		.collect();

		sort_by_priority(&mut orders, SecondaryKey::OldestFirst);
		let numbers: Vec<_> = orders.iter().map(|o| o.order_number.as_str()).collect();
		assert_eq!(numbers, vec!["b", "e", "c", "a", "d"]);

		sort_by_priority(&mut orders, SecondaryKey::NewestFirst);
		let numbers: Vec<_> = orders.iter().map(|o| o.order_number.as_str()).collect();
		assert_eq!(numbers, vec!["e", "b", "c", "d", "a"]);
	}

	#[test]
	fn test_search_covers_skus_only_where_enabled() {
		let mut order = manual_order("A-1001", "US");
		order.items = vec![item("VASE-BLUE", 1, 2.0)];
		let filter = QueueFilter {
			search: Some("vase".into()),
			..Default::default()
		};
		assert!(filter.matches(&order, true));
		assert!(!filter.matches(&order, false));

		let filter = QueueFilter {
			search: Some("LOVELACE".into()),
			..Default::default()
		};
		assert!(filter.matches(&order, false));
	}

	#[tokio::test]
	async fn test_production_queue_is_rush_first_then_fifo() {
		let clock = ManualClock::new(start_time());
		let storage = clocked_storage(&clock);
		store(&storage, &clock, "1", OrderStatus::Production, Priority::Normal).await;
		store(&storage, &clock, "2", OrderStatus::Production, Priority::Rush).await;
		store(&storage, &clock, "3", OrderStatus::Staging, Priority::Rush).await;
		store(&storage, &clock, "4", OrderStatus::Production, Priority::Normal).await;

		let service = QueueService::new(storage, 100);
		let orders = service
			.fetch(Queue::Production, &QueueFilter::default())
			.await
			.unwrap();
		let numbers: Vec<_> = orders.iter().map(|o| o.order_number.as_str()).collect();
		assert_eq!(numbers, vec!["2", "1", "4"]);
	}

	#[tokio::test]
	async fn test_fetch_limit_truncates_silently() {
		let clock = ManualClock::new(start_time());
		let storage = clocked_storage(&clock);
		for n in 0..5 {
			store(&storage, &clock, &n.to_string(), OrderStatus::Pending, Priority::Normal).await;
		}
		let service = QueueService::new(storage, 3);
		let orders = service
			.fetch(Queue::Orders, &QueueFilter::default())
			.await
			.unwrap();
		let numbers: Vec<_> = orders.iter().map(|o| o.order_number.as_str()).collect();
		assert_eq!(numbers, vec!["4", "3", "2"]);
	}

	#[tokio::test]
	async fn test_orders_queue_filters() {
		let clock = ManualClock::new(start_time());
		let storage = clocked_storage(&clock);
		store(&storage, &clock, "1", OrderStatus::Pending, Priority::Rush).await;
		store(&storage, &clock, "2", OrderStatus::Hold, Priority::Rush).await;
		store(&storage, &clock, "3", OrderStatus::Pending, Priority::Normal).await;
		let service = QueueService::new(storage, 100);

		let filter = QueueFilter {
			status: Some(OrderStatus::Pending),
			priority: Some(Priority::Rush),
			..Default::default()
		};
		let orders = service.fetch(Queue::Orders, &filter).await.unwrap();
		assert_eq!(orders.len(), 1);
		assert_eq!(orders[0].order_number, "1");

		let filter = QueueFilter {
			source: Some(OrderSource::Magento),
			..Default::default()
		};
		assert!(service.fetch(Queue::OnHold, &filter).await.unwrap().is_empty());
	}
}
