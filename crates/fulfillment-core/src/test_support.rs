//! Fixtures shared by the unit tests of this crate.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fulfillment_storage::implementations::memory::{MemoryStorage, MemoryStorageSchema};
use fulfillment_storage::{StorageError, StorageInterface, StorageService};
use fulfillment_types::{
	ConfigSchema, LineItem, ManualClock, Order, OrderSource, OrderStatus, Priority, RecordMeta,
	ShippingAddress,
};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

/// 2025-03-10 09:00 UTC, a Monday.
pub fn start_time() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

pub fn memory_storage() -> Arc<StorageService> {
	Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
}

pub fn clocked_storage(clock: &ManualClock) -> Arc<StorageService> {
	Arc::new(StorageService::with_clock(
		Box::new(MemoryStorage::new()),
		Arc::new(clock.clone()),
	))
}

pub fn address(country: &str) -> ShippingAddress {
	ShippingAddress {
		street1: "1 Main St".into(),
		city: "Springfield".into(),
		state: "IL".into(),
		zip: "62701".into(),
		country: country.into(),
		..Default::default()
	}
}

pub fn item(sku: &str, quantity: u32, weight: f64) -> LineItem {
	LineItem {
		sku: sku.into(),
		name: format!("{} item", sku),
		quantity,
		weight,
		options: None,
	}
}

/// A pending manual order with one line, not yet stored.
pub fn manual_order(number: &str, country: &str) -> Order {
	let mut order = Order {
		meta: RecordMeta::default(),
		order_number: number.into(),
		status: OrderStatus::Pending,
		priority: Priority::Normal,
		source: OrderSource::Manual,
		customer_name: "Ada Lovelace".into(),
		customer_email: "ada@example.com".into(),
		shipping_address: address(country),
		items: vec![item("MUG-01", 1, 1.5)],
		total_weight: 0.0,
		order_value: Decimal::new(2500, 2),
		is_international: false,
		special_instructions: None,
		staged_by: None,
		external_id: None,
	};
	order.refresh_derived();
	order
}

/// Memory backend whose writes to one chosen key fail.
#[derive(Clone)]
pub struct FlakyStorage {
	inner: Arc<MemoryStorage>,
	fail_key: Arc<Mutex<Option<String>>>,
}

impl FlakyStorage {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(MemoryStorage::new()),
			fail_key: Arc::new(Mutex::new(None)),
		}
	}

	/// A store over this backend. Every call shares the same data.
	pub fn service(&self) -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(self.clone())))
	}

	pub fn fail_writes_to(&self, key: &str) {
		*self.fail_key.lock().unwrap() = Some(key.to_string());
	}
}

#[async_trait]
impl StorageInterface for FlakyStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.inner.get_bytes(key).await
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		if self.fail_key.lock().unwrap().as_deref() == Some(key) {
			return Err(StorageError::Backend("connection reset".into()));
		}
		self.inner.set_bytes(key, value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.inner.delete(key).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.inner.exists(key).await
	}

	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		self.inner.list_keys(namespace).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}
