//! Commerce platform sync: order import, catalog sync and status push-back.

use fulfillment_commerce::{CommerceError, CommerceService, ImportedOrder, RemoteProduct};
use fulfillment_storage::{StorageError, StorageService};
use fulfillment_types::{
	truncate_id, Order, OrderSource, OrderStatus, Priority, Product, RecordMeta,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum SyncError {
	#[error("No commerce platform is configured")]
	NotConfigured,
	#[error("Commerce error: {0}")]
	Commerce(#[from] CommerceError),
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for SyncError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => SyncError::NotFound(id),
			other => SyncError::Storage(other.to_string()),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
	pub imported: Vec<Order>,
	/// Order numbers that already existed locally.
	pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductSyncSummary {
	pub created: usize,
	pub updated: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusPush {
	pub order_id: String,
	pub status: OrderStatus,
	pub remote_status: &'static str,
}

fn new_order(imported: ImportedOrder) -> Order {
	let mut order = Order {
		meta: RecordMeta::default(),
		order_number: imported.order_number,
		status: OrderStatus::Pending,
		priority: Priority::Normal,
		source: OrderSource::Magento,
		customer_name: imported.customer_name,
		customer_email: imported.customer_email,
		shipping_address: imported.shipping_address,
		items: imported.items,
		total_weight: 0.0,
		order_value: imported.order_value,
		is_international: false,
		special_instructions: None,
		staged_by: None,
		external_id: Some(imported.external_id),
	};
	order.refresh_derived();
	order
}

fn apply_remote(product: &mut Product, remote: &RemoteProduct) {
	product.name = remote.name.clone();
	product.price = remote.price;
	product.weight = remote.weight;
	product.status = remote.status;
	product.magento_id = Some(remote.remote_id);
	if let Some(stock) = remote.stock_quantity {
		product.stock_quantity = stock;
	}
}

pub struct SyncHandler {
	storage: Arc<StorageService>,
	commerce: Option<Arc<CommerceService>>,
}

impl SyncHandler {
	pub fn new(storage: Arc<StorageService>, commerce: Option<Arc<CommerceService>>) -> Self {
		Self { storage, commerce }
	}

	fn commerce(&self) -> Result<&CommerceService, SyncError> {
		self.commerce.as_deref().ok_or(SyncError::NotConfigured)
	}

	/// Imports upstream orders as pending Magento orders. An order whose
	/// number already exists locally is skipped.
	#[instrument(skip_all)]
	pub async fn import_orders(&self) -> Result<ImportSummary, SyncError> {
		let fetched = self.commerce()?.fetch_orders().await?;
		let mut known: HashSet<String> = self
			.storage
			.list::<Order>(None, None)
			.await?
			.into_iter()
			.map(|order| order.order_number)
			.collect();

		let mut imported = Vec::new();
		let mut skipped = Vec::new();
		for remote in fetched {
			if known.contains(&remote.order_number) {
				skipped.push(remote.order_number);
				continue;
			}
			known.insert(remote.order_number.clone());
			imported.push(self.storage.create(new_order(remote)).await?);
		}

		tracing::info!(
			component = "sync",
			imported = imported.len(),
			skipped = skipped.len(),
			"Imported orders"
		);
		Ok(ImportSummary { imported, skipped })
	}

	/// Upserts the upstream catalog by SKU, stamping `last_synced`.
	#[instrument(skip_all)]
	pub async fn sync_products(&self) -> Result<ProductSyncSummary, SyncError> {
		let remote = self.commerce()?.fetch_all_products().await?;
		let mut by_sku: HashMap<String, String> = self
			.storage
			.list::<Product>(None, None)
			.await?
			.into_iter()
			.map(|p| (p.sku, p.meta.id))
			.collect();
		let now = self.storage.clock().now();

		let mut summary = ProductSyncSummary::default();
		for item in &remote {
			match by_sku.get(&item.sku) {
				Some(id) => {
					self.storage
						.update_with(id, |product: &mut Product| {
							apply_remote(product, item);
							product.last_synced = Some(now);
							Ok::<(), StorageError>(())
						})
						.await?;
					summary.updated += 1;
				},
				None => {
					let mut product = Product {
						meta: RecordMeta::default(),
						sku: item.sku.clone(),
						name: String::new(),
						category: None,
						price: Default::default(),
						stock_quantity: 0,
						weight: 0.0,
						status: Default::default(),
						components: Vec::new(),
						packing_notes: None,
						related_items: Vec::new(),
						magento_id: None,
						last_synced: Some(now),
					};
					apply_remote(&mut product, item);
					let created = self.storage.create(product).await?;
					by_sku.insert(created.sku, created.meta.id);
					summary.created += 1;
				},
			}
		}

		tracing::info!(
			component = "sync",
			created = summary.created,
			updated = summary.updated,
			"Synced products"
		);
		Ok(summary)
	}

	/// Pushes the order's mapped status to the platform.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn push_status(&self, order_id: &str) -> Result<StatusPush, SyncError> {
		let commerce = self.commerce()?;
		let order: Order = self.storage.get(order_id).await?;
		let external_id = order.external_id.as_deref().ok_or_else(|| {
			SyncError::Validation(format!(
				"order {} has no commerce platform id",
				order.order_number
			))
		})?;
		let remote_status = commerce.push_status(external_id, order.status).await?;
		Ok(StatusPush {
			order_id: order.meta.id.clone(),
			status: order.status,
			remote_status,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{address, item, manual_order, memory_storage};
	use async_trait::async_trait;
	use fulfillment_commerce::{CommerceInterface, ProductPage, TrackingPush};
	use fulfillment_types::{ConfigSchema, ProductStatus, ValidationError};
	use rust_decimal::Decimal;
	use std::sync::Mutex;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	#[derive(Clone, Default)]
	struct Platform {
		orders: Vec<ImportedOrder>,
		products: Vec<RemoteProduct>,
		statuses: Arc<Mutex<Vec<(String, String)>>>,
	}

	#[async_trait]
	impl CommerceInterface for Platform {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn fetch_orders(&self) -> Result<Vec<ImportedOrder>, CommerceError> {
			Ok(self.orders.clone())
		}

		async fn fetch_products(&self, page: usize) -> Result<ProductPage, CommerceError> {
			let products = self.products.iter().skip((page - 1) * 2).take(2).cloned().collect();
			Ok(ProductPage {
				products,
				total_count: self.products.len(),
			})
		}

		async fn push_status(&self, external_id: &str, status: &str) -> Result<(), CommerceError> {
			self.statuses
				.lock()
				.unwrap()
				.push((external_id.to_string(), status.to_string()));
			Ok(())
		}

		async fn push_tracking(
			&self,
			_external_id: &str,
			_tracking_number: &str,
			_carrier: &str,
		) -> Result<TrackingPush, CommerceError> {
			Ok(TrackingPush::Comment)
		}
	}

	fn imported(number: &str, country: &str) -> ImportedOrder {
		ImportedOrder {
			external_id: format!("ext-{}", number),
			order_number: number.into(),
			customer_name: "Ada Lovelace".into(),
			customer_email: "ada@example.com".into(),
			shipping_address: address(country),
			items: vec![item("MUG-01", 2, 1.25)],
			order_value: Decimal::new(3600, 2),
		}
	}

	fn remote(id: i64, sku: &str, stock: Option<i64>) -> RemoteProduct {
		RemoteProduct {
			remote_id: id,
			sku: sku.into(),
			name: format!("Product {}", sku),
			price: Decimal::new(1000, 2),
			weight: 1.0,
			status: ProductStatus::Enabled,
			stock_quantity: stock,
		}
	}

	fn handler(storage: Arc<StorageService>, platform: Platform) -> SyncHandler {
		SyncHandler::new(
			storage,
			Some(Arc::new(CommerceService::new(Box::new(platform)))),
		)
	}

	#[tokio::test]
	async fn test_import_skips_known_order_numbers() {
		let storage = memory_storage();
		storage.create(manual_order("100001", "US")).await.unwrap();
		let platform = Platform {
			orders: vec![
				imported("100001", "US"),
				imported("100002", "CA"),
				imported("100002", "CA"),
			],
			..Default::default()
		};
		let handler = handler(storage.clone(), platform);

		let summary = handler.import_orders().await.unwrap();
		assert_eq!(summary.imported.len(), 1);
		assert_eq!(summary.skipped, vec!["100001".to_string(), "100002".to_string()]);

		let order = &summary.imported[0];
		assert_eq!(order.source, OrderSource::Magento);
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.total_weight, 2.5);
		assert!(order.is_international);
		assert_eq!(order.external_id.as_deref(), Some("ext-100002"));
	}

	#[tokio::test]
	async fn test_product_sync_upserts_by_sku() {
		let storage = memory_storage();
		let first = handler(
			storage.clone(),
			Platform {
				products: vec![remote(1, "A", Some(5)), remote(2, "B", None), remote(3, "C", None)],
				..Default::default()
			},
		);
		let summary = first.sync_products().await.unwrap();
		assert_eq!(summary, ProductSyncSummary { created: 3, updated: 0 });

		let mut renamed = remote(1, "A", None);
		renamed.name = "Renamed".into();
		let second = handler(
			storage.clone(),
			Platform {
				products: vec![renamed, remote(4, "D", Some(1))],
				..Default::default()
			},
		);
		let summary = second.sync_products().await.unwrap();
		assert_eq!(summary, ProductSyncSummary { created: 1, updated: 1 });

		let products: Vec<Product> = storage.list(None, None).await.unwrap();
		assert_eq!(products.len(), 4);
		let a = products.iter().find(|p| p.sku == "A").unwrap();
		assert_eq!(a.name, "Renamed");
		assert_eq!(a.stock_quantity, 5);
		assert!(products.iter().all(|p| p.last_synced.is_some()));
	}

	#[tokio::test]
	async fn test_push_status_uses_mapping() {
		let storage = memory_storage();
		let platform = Platform::default();
		let statuses = platform.statuses.clone();
		let handler = handler(storage.clone(), platform);

		let mut order = manual_order("100003", "US");
		order.status = OrderStatus::Hold;
		order.external_id = Some("77".into());
		let order = storage.create(order).await.unwrap();
		let push = handler.push_status(&order.meta.id).await.unwrap();
		assert_eq!(push.remote_status, "holded");
		assert_eq!(
			statuses.lock().unwrap().clone(),
			vec![("77".to_string(), "holded".to_string())]
		);

		let local = storage.create(manual_order("100004", "US")).await.unwrap();
		assert!(matches!(
			handler.push_status(&local.meta.id).await,
			Err(SyncError::Validation(_))
		));
	}

	#[tokio::test]
	async fn test_missing_platform_is_not_configured() {
		let handler = SyncHandler::new(memory_storage(), None);
		assert!(matches!(handler.import_orders().await, Err(SyncError::NotConfigured)));
	}
}
