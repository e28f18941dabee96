//! Catalog products and inventory ledger records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{RecordMeta, StorageKey};

string_enum! {
	/// Catalog availability of a product.
	pub enum ProductStatus ("product status") {
		Enabled => "enabled",
		Disabled => "disabled",
	}
}

impl Default for ProductStatus {
	fn default() -> Self {
		ProductStatus::Enabled
	}
}

/// A part that has to be pulled when packing a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
	pub name: String,
	pub quantity: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Catalog entry, synced from the commerce platform or managed locally.
///
/// `sku` is the join key used to enrich order lines with packing details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
	#[serde(flatten)]
	pub meta: RecordMeta,
	pub sku: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(default)]
	pub price: Decimal,
	#[serde(default)]
	pub stock_quantity: i64,
	#[serde(default)]
	pub weight: f64,
	#[serde(default)]
	pub status: ProductStatus,
	#[serde(default)]
	pub components: Vec<Component>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub packing_notes: Option<String>,
	#[serde(default)]
	pub related_items: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub magento_id: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_synced: Option<DateTime<Utc>>,
}

entity!(Product, StorageKey::Products);

string_enum! {
	/// Reason category of a stock ledger entry.
	pub enum AdjustmentType ("adjustment type") {
		ManualAdd => "manual_add",
		ManualRemove => "manual_remove",
		Damaged => "damaged",
		Found => "found",
		Recount => "recount",
	}
}

impl AdjustmentType {
	/// Computes the resulting stock level for an adjustment of `quantity`
	/// units applied to `previous`.
	///
	/// Add types increase stock, remove types decrease it and a recount sets
	/// the level to `quantity` directly. Returns `None` on overflow.
	pub fn apply(&self, previous: i64, quantity: i64) -> Option<i64> {
		match self {
			AdjustmentType::ManualAdd | AdjustmentType::Found => previous.checked_add(quantity),
			AdjustmentType::ManualRemove | AdjustmentType::Damaged => {
				previous.checked_sub(quantity)
			},
			AdjustmentType::Recount => Some(quantity),
		}
	}
}

/// Append-only inventory ledger entry. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustment {
	#[serde(flatten)]
	pub meta: RecordMeta,
	pub product_id: String,
	pub sku: String,
	pub adjustment_type: AdjustmentType,
	/// Signed difference between `new_quantity` and `previous_quantity`.
	pub quantity_change: i64,
	pub previous_quantity: i64,
	pub new_quantity: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	pub adjusted_by: String,
}

entity!(StockAdjustment, StorageKey::StockAdjustments);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_adjustment_types_apply_in_the_right_direction() {
		assert_eq!(AdjustmentType::ManualAdd.apply(10, 5), Some(15));
		assert_eq!(AdjustmentType::Found.apply(10, 1), Some(11));
		assert_eq!(AdjustmentType::ManualRemove.apply(10, 4), Some(6));
		assert_eq!(AdjustmentType::Damaged.apply(10, 10), Some(0));
		assert_eq!(AdjustmentType::Recount.apply(10, 7), Some(7));
	}

	#[test]
	fn test_adjustment_overflow_yields_none() {
		assert_eq!(AdjustmentType::ManualAdd.apply(10, i64::MAX), None);
		assert_eq!(AdjustmentType::Damaged.apply(-10, i64::MAX), None);
	}

	#[test]
	fn test_product_defaults_from_minimal_json() {
		let product: Product =
			serde_json::from_str(r#"{"sku": "MUG-01", "name": "Mug"}"#).unwrap();
		assert_eq!(product.status, ProductStatus::Enabled);
		assert_eq!(product.stock_quantity, 0);
		assert!(product.components.is_empty());
	}
}
