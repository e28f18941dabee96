//! Storage module for the fulfillment system.
//!
//! This module provides the entity store every other component reads and
//! writes through. A low-level byte backend ([`StorageInterface`]) is wrapped
//! by [`StorageService`], which adds typed CRUD over [`Entity`] records,
//! server-managed identity and timestamps, equality filters and sorting, and
//! serialized read-modify-write updates.

use async_trait::async_trait;
use fulfillment_types::{
	Clock, ConfigSchema, Entity, ImplementationRegistry, StorageKey, SystemClock,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}
pub mod query;

pub use query::{Filter, Sort};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found: {0}")]
	NotFound(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// A write would produce a record that is not a valid entity.
	#[error("Validation error: {0}")]
	Validation(String),
	/// A guarded update found the record in an unexpected state.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys have the form `{namespace}:{id}`.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key. Missing keys are a
	/// `NotFound` error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists the ids stored under a namespace.
	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn record_key(namespace: StorageKey, id: &str) -> String {
	format!("{}:{}", namespace.as_str(), id)
}

/// Typed entity store over a byte backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
	clock: Arc<dyn Clock>,
	/// Serializes read-modify-write updates.
	write_lock: Mutex<()>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self::with_clock(backend, Arc::new(SystemClock))
	}

	pub fn with_clock(backend: Box<dyn StorageInterface>, clock: Arc<dyn Clock>) -> Self {
		Self {
			backend,
			clock,
			write_lock: Mutex::new(()),
		}
	}

	pub fn clock(&self) -> Arc<dyn Clock> {
		self.clock.clone()
	}

	/// Lists every record of a type, sorted (default newest first) and
	/// truncated to `limit`.
	pub async fn list<T: Entity>(
		&self,
		sort: Option<&Sort>,
		limit: Option<usize>,
	) -> Result<Vec<T>, StorageError> {
		self.filter(&Filter::new(), sort, limit).await
	}

	/// Lists records whose top-level fields equal every condition in
	/// `filter`. Sorting and truncation apply after filtering.
	pub async fn filter<T: Entity>(
		&self,
		filter: &Filter,
		sort: Option<&Sort>,
		limit: Option<usize>,
	) -> Result<Vec<T>, StorageError> {
		let mut values: Vec<Value> = self
			.load_namespace(T::KEY)
			.await?
			.into_iter()
			.filter(|v| filter.matches(v))
			.collect();

		let default_sort = Sort::default();
		let sort = sort.unwrap_or(&default_sort);
		values.sort_by(|a, b| sort.compare(a, b));
		if let Some(limit) = limit {
			values.truncate(limit);
		}

		values
			.into_iter()
			.map(|v| serde_json::from_value(v).map_err(|e| StorageError::Serialization(e.to_string())))
			.collect()
	}

	/// Retrieves a record by id.
	pub async fn get<T: Entity>(&self, id: &str) -> Result<T, StorageError> {
		let value = self.read_value(T::KEY, id).await?;
		serde_json::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	pub async fn exists<T: Entity>(&self, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&record_key(T::KEY, id)).await
	}

	/// Stores a new record, assigning a fresh id and both timestamps.
	/// Whatever metadata the caller put on the record is discarded.
	pub async fn create<T: Entity>(&self, mut record: T) -> Result<T, StorageError> {
		let now = self.clock.now();
		let meta = record.meta_mut();
		meta.id = uuid::Uuid::new_v4().to_string();
		meta.created_date = now;
		meta.updated_date = now;
		self.write(&record).await?;
		tracing::debug!(
			component = "storage",
			namespace = T::KEY.as_str(),
			id = %record.id(),
			"Created record"
		);
		Ok(record)
	}

	/// Creates several records as independent writes. A failure stops the
	/// batch; records written before it stay.
	pub async fn bulk_create<T: Entity>(&self, records: Vec<T>) -> Result<Vec<T>, StorageError> {
		let mut created = Vec::with_capacity(records.len());
		for record in records {
			created.push(self.create(record).await?);
		}
		Ok(created)
	}

	/// Writes a record exactly as given, keeping its id and timestamps.
	/// Used when seeding a store from records exported elsewhere.
	pub async fn put<T: Entity>(&self, record: &T) -> Result<(), StorageError> {
		if record.id().is_empty() {
			return Err(StorageError::Validation("record id must not be empty".into()));
		}
		self.write(record).await
	}

	/// Merges the top-level keys of `partial` into the stored record.
	///
	/// `id` and `created_date` are never changed and `updated_date` is set
	/// to now. The merged record must still deserialize as `T`, so an
	/// out-of-vocabulary enum value or a wrong field type is rejected with
	/// `Validation` and nothing is written.
	pub async fn update<T: Entity>(&self, id: &str, partial: Value) -> Result<T, StorageError> {
		let Value::Object(patch) = partial else {
			return Err(StorageError::Validation("partial update must be an object".into()));
		};

		let _guard = self.write_lock.lock().await;
		let mut current = self.read_value(T::KEY, id).await?;
		let Some(fields) = current.as_object_mut() else {
			return Err(StorageError::Serialization(format!(
				"record {} is not an object",
				id
			)));
		};
		for (field, value) in patch {
			if matches!(field.as_str(), "id" | "created_date" | "updated_date") {
				continue;
			}
			fields.insert(field, value);
		}

		let mut record: T =
			serde_json::from_value(current).map_err(|e| StorageError::Validation(e.to_string()))?;
		record.meta_mut().updated_date = self.clock.now();
		self.write(&record).await?;
		Ok(record)
	}

	/// Read-modify-write under the store's write lock.
	///
	/// `apply` sees the current stored record; if it returns an error
	/// nothing is written. Identity and `created_date` are restored after
	/// `apply` and `updated_date` is bumped.
	pub async fn update_with<T, E, F>(&self, id: &str, apply: F) -> Result<T, E>
	where
		T: Entity,
		E: From<StorageError>,
		F: FnOnce(&mut T) -> Result<(), E>,
	{
		let _guard = self.write_lock.lock().await;
		let mut record: T = self.get(id).await?;
		let original = record.meta().clone();
		apply(&mut record)?;

		let meta = record.meta_mut();
		meta.id = original.id;
		meta.created_date = original.created_date;
		meta.updated_date = self.clock.now();
		self.write(&record).await?;
		Ok(record)
	}

	/// Compare-and-swap update: `guard` inspects the current stored record
	/// and either allows the write or explains why not, in which case a
	/// `Conflict` is returned and nothing is written.
	pub async fn update_guarded<T, G, F>(&self, id: &str, guard: G, apply: F) -> Result<T, StorageError>
	where
		T: Entity,
		G: FnOnce(&T) -> Result<(), String>,
		F: FnOnce(&mut T),
	{
		self.update_with(id, |record: &mut T| {
			guard(record).map_err(StorageError::Conflict)?;
			apply(record);
			Ok(())
		})
		.await
	}

	/// Removes a record. Deleting a missing id is a `NotFound` error.
	pub async fn delete<T: Entity>(&self, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&record_key(T::KEY, id)).await?;
		tracing::debug!(
			component = "storage",
			namespace = T::KEY.as_str(),
			id = %id,
			"Deleted record"
		);
		Ok(())
	}

	async fn write<T: Entity>(&self, record: &T) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&record_key(T::KEY, record.id()), bytes)
			.await
	}

	async fn read_value(&self, namespace: StorageKey, id: &str) -> Result<Value, StorageError> {
		let bytes = self.backend.get_bytes(&record_key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	async fn load_namespace(&self, namespace: StorageKey) -> Result<Vec<Value>, StorageError> {
		let ids = self.backend.list_keys(namespace.as_str()).await?;
		let mut values = Vec::with_capacity(ids.len());
		for id in ids {
			match self.read_value(namespace, &id).await {
				Ok(value) => values.push(value),
				// Removed between listing and reading.
				Err(StorageError::NotFound(_)) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Duration, TimeZone, Utc};
	use fulfillment_types::{
		LineItem, ManualClock, Order, OrderSource, OrderStatus, Priority, ShippingAddress,
	};
	use implementations::memory::MemoryStorage;
	use serde_json::json;

	fn order(number: &str, status: OrderStatus) -> Order {
		Order {
			meta: Default::default(),
			order_number: number.to_string(),
			status,
			priority: Priority::Normal,
			source: OrderSource::Manual,
			customer_name: "Ada".into(),
			customer_email: "ada@example.com".into(),
			shipping_address: ShippingAddress {
				country: "US".into(),
				..Default::default()
			},
			items: vec![LineItem {
				sku: "MUG-01".into(),
				name: "Mug".into(),
				quantity: 1,
				weight: 1.0,
				options: None,
			}],
			total_weight: 1.0,
			order_value: Default::default(),
			is_international: false,
			special_instructions: None,
			staged_by: None,
			external_id: None,
		}
	}

	fn service() -> (StorageService, ManualClock) {
		let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
		let service =
			StorageService::with_clock(Box::new(MemoryStorage::new()), Arc::new(clock.clone()));
		(service, clock)
	}

	#[tokio::test]
	async fn test_create_assigns_identity() {
		let (store, clock) = service();
		let mut draft = order("1001", OrderStatus::Pending);
		draft.meta.id = "client-chosen".into();

		let created = store.create(draft).await.unwrap();
		assert_ne!(created.meta.id, "client-chosen");
		assert_eq!(created.meta.created_date, clock.now());
		assert_eq!(created.meta.updated_date, clock.now());

		let fetched: Order = store.get(created.id()).await.unwrap();
		assert_eq!(fetched.order_number, "1001");
	}

	#[tokio::test]
	async fn test_list_sorts_newest_first_and_truncates() {
		let (store, clock) = service();
		for n in ["1", "2", "3"] {
			store.create(order(n, OrderStatus::Pending)).await.unwrap();
			clock.advance(Duration::minutes(1));
		}

		let all: Vec<Order> = store.list(None, None).await.unwrap();
		let numbers: Vec<_> = all.iter().map(|o| o.order_number.as_str()).collect();
		assert_eq!(numbers, vec!["3", "2", "1"]);

		let oldest: Vec<Order> = store.list(Some(&Sort::asc("created_date")), Some(2)).await.unwrap();
		let numbers: Vec<_> = oldest.iter().map(|o| o.order_number.as_str()).collect();
		assert_eq!(numbers, vec!["1", "2"]);
	}

	#[tokio::test]
	async fn test_filter_by_status() {
		let (store, _) = service();
		store.create(order("1", OrderStatus::Pending)).await.unwrap();
		store.create(order("2", OrderStatus::Production)).await.unwrap();

		let filter = Filter::new().eq("status", OrderStatus::Production);
		let found: Vec<Order> = store.filter(&filter, None, None).await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].order_number, "2");
	}

	#[tokio::test]
	async fn test_update_merges_and_protects_identity() {
		let (store, clock) = service();
		let created = store.create(order("1", OrderStatus::Pending)).await.unwrap();
		clock.advance(Duration::minutes(5));

		let updated: Order = store
			.update(
				created.id(),
				json!({
					"id": "hijack",
					"created_date": "2000-01-01T00:00:00Z",
					"priority": "rush",
				}),
			)
			.await
			.unwrap();
		assert_eq!(updated.meta.id, created.meta.id);
		assert_eq!(updated.meta.created_date, created.meta.created_date);
		assert_eq!(updated.meta.updated_date, clock.now());
		assert_eq!(updated.priority, Priority::Rush);
		assert_eq!(updated.customer_name, "Ada");
	}

	#[tokio::test]
	async fn test_update_rejects_unknown_status() {
		let (store, _) = service();
		let created = store.create(order("1", OrderStatus::Pending)).await.unwrap();

		let result = store
			.update::<Order>(created.id(), json!({"status": "in_transit"}))
			.await;
		assert!(matches!(result, Err(StorageError::Validation(_))));

		let unchanged: Order = store.get(created.id()).await.unwrap();
		assert_eq!(unchanged.status, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_update_guarded_conflict_writes_nothing() {
		let (store, clock) = service();
		let created = store.create(order("1", OrderStatus::Shipped)).await.unwrap();
		clock.advance(Duration::minutes(1));

		let result = store
			.update_guarded(
				created.id(),
				|o: &Order| {
					if o.status == OrderStatus::Pending {
						Ok(())
					} else {
						Err(format!("order is {}", o.status))
					}
				},
				|o| o.status = OrderStatus::Cancelled,
			)
			.await;
		assert!(matches!(result, Err(StorageError::Conflict(msg)) if msg == "order is shipped"));

		let stored: Order = store.get(created.id()).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Shipped);
		assert_eq!(stored.meta.updated_date, created.meta.updated_date);
	}

	#[tokio::test]
	async fn test_delete_missing_is_not_found() {
		let (store, _) = service();
		let created = store.create(order("1", OrderStatus::Pending)).await.unwrap();
		store.delete::<Order>(created.id()).await.unwrap();
		assert!(!store.exists::<Order>(created.id()).await.unwrap());
		assert!(matches!(
			store.delete::<Order>(created.id()).await,
			Err(StorageError::NotFound(_))
		));
	}
}
