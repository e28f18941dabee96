//! Stock adjustments and the inventory ledger.

use fulfillment_storage::{Filter, Sort, StorageError, StorageService};
use fulfillment_types::{truncate_id, AdjustmentType, Product, RecordMeta, StockAdjustment};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum InventoryError {
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Product not found: {0}")]
	NotFound(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for InventoryError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => InventoryError::NotFound(id),
			other => InventoryError::Storage(other.to_string()),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustmentRequest {
	pub adjustment_type: AdjustmentType,
	/// Units added or removed, or the counted level for a recount.
	pub quantity: i64,
	#[serde(default)]
	pub reason: Option<String>,
	pub adjusted_by: String,
}

pub struct InventoryHandler {
	storage: Arc<StorageService>,
}

impl InventoryHandler {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Records a ledger entry and then sets the product's stock level.
	///
	/// These are two separate writes. If the second fails the ledger entry
	/// stays and the product keeps its old level.
	#[instrument(skip_all, fields(product_id = %truncate_id(product_id)))]
	pub async fn adjust_stock(
		&self,
		product_id: &str,
		request: AdjustmentRequest,
	) -> Result<(StockAdjustment, Product), InventoryError> {
		if request.quantity < 0 {
			return Err(InventoryError::Validation("quantity cannot be negative".into()));
		}
		if request.quantity == 0 && request.adjustment_type != AdjustmentType::Recount {
			return Err(InventoryError::Validation("quantity must be positive".into()));
		}
		if request.adjusted_by.trim().is_empty() {
			return Err(InventoryError::Validation("adjusted_by is required".into()));
		}

		let product: Product = self.storage.get(product_id).await?;
		let previous = product.stock_quantity;
		let out_of_range = || {
			InventoryError::Validation(format!(
				"adjusting {} by {} is out of range",
				product.sku, request.quantity
			))
		};
		let new_quantity = request
			.adjustment_type
			.apply(previous, request.quantity)
			.ok_or_else(out_of_range)?;
		let quantity_change = new_quantity
			.checked_sub(previous)
			.ok_or_else(out_of_range)?;
		if new_quantity < 0 {
			return Err(InventoryError::Validation(format!(
				"{} has {} in stock; removing {} would go below zero",
				product.sku, previous, request.quantity
			)));
		}

		let entry = self
			.storage
			.create(StockAdjustment {
				meta: RecordMeta::default(),
				product_id: product.meta.id.clone(),
				sku: product.sku.clone(),
				adjustment_type: request.adjustment_type,
				quantity_change,
				previous_quantity: previous,
				new_quantity,
				reason: request.reason.filter(|r| !r.trim().is_empty()),
				adjusted_by: request.adjusted_by.trim().to_string(),
			})
			.await?;

		let product = self
			.storage
			.update_with(product_id, |product: &mut Product| {
				product.stock_quantity = new_quantity;
				Ok::<(), StorageError>(())
			})
			.await?;

		tracing::info!(
			component = "inventory",
			sku = %product.sku,
			adjustment = %entry.adjustment_type,
			previous,
			new_quantity,
			"Stock adjusted"
		);
		Ok((entry, product))
	}

	/// Ledger entries for one product, newest first.
	pub async fn history(&self, product_id: &str) -> Result<Vec<StockAdjustment>, InventoryError> {
		Ok(self
			.storage
			.filter(
				&Filter::new().eq("product_id", product_id),
				Some(&Sort::desc("created_date")),
				None,
			)
			.await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{clocked_storage, start_time};
	use chrono::Duration;
	use fulfillment_types::{ManualClock, ProductStatus};
	use rust_decimal::Decimal;

	fn product(stock: i64) -> Product {
		Product {
			meta: RecordMeta::default(),
			sku: "MUG-01".into(),
			name: "Mug".into(),
			category: None,
			price: Decimal::new(1800, 2),
			stock_quantity: stock,
			weight: 1.2,
			status: ProductStatus::Enabled,
			components: Vec::new(),
			packing_notes: None,
			related_items: Vec::new(),
			magento_id: None,
			last_synced: None,
		}
	}

	fn request(adjustment_type: AdjustmentType, quantity: i64) -> AdjustmentRequest {
		AdjustmentRequest {
			adjustment_type,
			quantity,
			reason: Some("cycle count".into()),
			adjusted_by: "sam".into(),
		}
	}

	#[tokio::test]
	async fn test_adjustments_update_stock_and_ledger() {
		let clock = ManualClock::new(start_time());
		let storage = clocked_storage(&clock);
		let created = storage.create(product(10)).await.unwrap();
		let handler = InventoryHandler::new(storage.clone());
		let id = created.meta.id.as_str();

		let (entry, product) = handler
			.adjust_stock(id, request(AdjustmentType::Damaged, 3))
			.await
			.unwrap();
		assert_eq!(entry.quantity_change, -3);
		assert_eq!(entry.previous_quantity, 10);
		assert_eq!(product.stock_quantity, 7);

		clock.advance(Duration::minutes(5));
		let (entry, product) = handler
			.adjust_stock(id, request(AdjustmentType::Recount, 12))
			.await
			.unwrap();
		assert_eq!(entry.quantity_change, 5);
		assert_eq!(product.stock_quantity, 12);

		let history = handler.history(id).await.unwrap();
		let types: Vec<AdjustmentType> = history.iter().map(|e| e.adjustment_type).collect();
		assert_eq!(types, vec![AdjustmentType::Recount, AdjustmentType::Damaged]);
	}

	#[tokio::test]
	async fn test_negative_result_is_rejected_without_writes() {
		let storage = clocked_storage(&ManualClock::new(start_time()));
		let created = storage.create(product(2)).await.unwrap();
		let handler = InventoryHandler::new(storage.clone());

		let result = handler
			.adjust_stock(&created.meta.id, request(AdjustmentType::ManualRemove, 5))
			.await;
		assert!(matches!(result, Err(InventoryError::Validation(_))));
		assert!(handler.history(&created.meta.id).await.unwrap().is_empty());
		let stored: Product = storage.get(&created.meta.id).await.unwrap();
		assert_eq!(stored.stock_quantity, 2);

		let result = handler
			.adjust_stock(&created.meta.id, request(AdjustmentType::ManualAdd, -1))
			.await;
		assert!(matches!(result, Err(InventoryError::Validation(_))));

		let result = handler
			.adjust_stock("missing", request(AdjustmentType::Found, 1))
			.await;
		assert!(matches!(result, Err(InventoryError::NotFound(_))));
	}

	#[tokio::test]
	async fn test_overflowing_quantity_is_rejected_without_writes() {
		let storage = clocked_storage(&ManualClock::new(start_time()));
		let created = storage.create(product(10)).await.unwrap();
		let handler = InventoryHandler::new(storage.clone());

		let result = handler
			.adjust_stock(&created.meta.id, request(AdjustmentType::ManualAdd, i64::MAX))
			.await;
		assert!(matches!(result, Err(InventoryError::Validation(_))));

		let negative = storage.create(product(-5)).await.unwrap();
		let result = handler
			.adjust_stock(&negative.meta.id, request(AdjustmentType::Recount, i64::MAX))
			.await;
		assert!(matches!(result, Err(InventoryError::Validation(_))));

		assert!(handler.history(&created.meta.id).await.unwrap().is_empty());
		assert!(handler.history(&negative.meta.id).await.unwrap().is_empty());
		let stored: Product = storage.get(&created.meta.id).await.unwrap();
		assert_eq!(stored.stock_quantity, 10);
	}
}
