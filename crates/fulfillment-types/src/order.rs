//! Order types for the fulfillment system.
//!
//! An order is the unit that moves through the warehouse workflow. This
//! module defines the record itself, its line items and address, and the
//! closed vocabularies for status, priority and source.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{RecordMeta, StorageKey};

string_enum! {
	/// Workflow status of an order.
	///
	/// `processing` is displayed as "ready to ship". Carrier-level states such
	/// as `in_transit` belong to [`crate::ShipmentStatus`], never to orders.
	pub enum OrderStatus ("order status") {
		Pending => "pending",
		Production => "production",
		Staging => "staging",
		Processing => "processing",
		Shipped => "shipped",
		Delivered => "delivered",
		Hold => "hold",
		Cancelled => "cancelled",
	}
}

impl OrderStatus {
	/// Returns true for states no workflow action leaves.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Cancelled | OrderStatus::Delivered)
	}
}

string_enum! {
	/// Queue priority. Declaration order is the ranking: rush first.
	#[derive(PartialOrd, Ord)]
	pub enum Priority ("priority") {
		Rush => "rush",
		Priority => "priority",
		Normal => "normal",
	}
}

impl Priority {
	/// Numeric rank used as the primary queue sort key (rush = 0).
	pub fn rank(&self) -> u8 {
		match self {
			Priority::Rush => 0,
			Priority::Priority => 1,
			Priority::Normal => 2,
		}
	}
}

impl Default for Priority {
	fn default() -> Self {
		Priority::Normal
	}
}

string_enum! {
	/// Where an order entered the system.
	pub enum OrderSource ("order source") {
		Magento => "magento",
		Manual => "manual",
	}
}

/// Structured shipping destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
	pub street1: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub street2: Option<String>,
	pub city: String,
	pub state: String,
	pub zip: String,
	pub country: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone: Option<String>,
}

impl ShippingAddress {
	/// True when the destination is outside the US.
	///
	/// The comparison ignores case and surrounding whitespace. An empty
	/// country is treated as domestic.
	pub fn is_international(&self) -> bool {
		let country = self.country.trim();
		!country.is_empty() && !country.eq_ignore_ascii_case("US")
	}
}

/// One ordered product line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
	pub sku: String,
	pub name: String,
	pub quantity: u32,
	/// Unit weight in pounds.
	#[serde(default)]
	pub weight: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<serde_json::Value>,
}

/// A customer fulfillment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	#[serde(flatten)]
	pub meta: RecordMeta,
	/// Business key. Unique in practice, not enforced by the store.
	pub order_number: String,
	pub status: OrderStatus,
	#[serde(default)]
	pub priority: Priority,
	pub source: OrderSource,
	pub customer_name: String,
	#[serde(default)]
	pub customer_email: String,
	pub shipping_address: ShippingAddress,
	#[serde(default)]
	pub items: Vec<LineItem>,
	/// Sum of item weight times quantity, derived on every write path.
	#[serde(default)]
	pub total_weight: f64,
	#[serde(default)]
	pub order_value: Decimal,
	/// Derived from `shipping_address.country`.
	#[serde(default)]
	pub is_international: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub special_instructions: Option<String>,
	/// Who moved the order into staging.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub staged_by: Option<String>,
	/// Identifier of the order in the upstream commerce platform.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub external_id: Option<String>,
}

entity!(Order, StorageKey::Orders);

impl Order {
	/// Total number of units across all line items.
	pub fn total_item_quantity(&self) -> u32 {
		self.items.iter().map(|item| item.quantity).sum()
	}

	/// Recomputes the fields derived from items and address.
	pub fn refresh_derived(&mut self) {
		self.total_weight = total_weight(&self.items);
		self.is_international = self.shipping_address.is_international();
	}

	/// True when any line item carries the given SKU.
	pub fn has_sku(&self, sku: &str) -> bool {
		self.items.iter().any(|item| item.sku == sku)
	}
}

/// Sum of `weight * quantity` over the given items.
pub fn total_weight(items: &[LineItem]) -> f64 {
	items
		.iter()
		.map(|item| item.weight * f64::from(item.quantity))
		.sum()
}
