//! Shipment records created alongside purchased carrier labels.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{RecordMeta, ShippingAddress, StorageKey};

string_enum! {
	/// Carrier that issued a label.
	pub enum Carrier ("carrier") {
		Fedex => "fedex",
		Usps => "usps",
	}
}

string_enum! {
	/// Carrier-side tracking state of a shipment.
	pub enum ShipmentStatus ("shipment status") {
		LabelCreated => "label_created",
		PickedUp => "picked_up",
		InTransit => "in_transit",
		OutForDelivery => "out_for_delivery",
		Delivered => "delivered",
		Exception => "exception",
		Voided => "voided",
	}
}

string_enum! {
	/// Business reason a label was bought.
	pub enum ShipmentCategory ("shipment category") {
		Order => "order",
		CustomPart => "custom_part",
		Sample => "sample",
		Return => "return",
		Other => "other",
	}
}

impl Default for ShipmentCategory {
	fn default() -> Self {
		ShipmentCategory::Order
	}
}

/// Package dimensions in inches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
	pub length: f64,
	pub width: f64,
	pub height: f64,
}

/// One purchased label plus its tracking metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
	#[serde(flatten)]
	pub meta: RecordMeta,
	/// Weak reference; absent for labels not tied to an order.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_number: Option<String>,
	pub tracking_number: String,
	pub carrier: Carrier,
	pub service_type: String,
	pub status: ShipmentStatus,
	pub ship_date: NaiveDate,
	pub weight: f64,
	#[serde(default)]
	pub dimensions: Dimensions,
	pub label_url: String,
	pub destination_address: ShippingAddress,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub shipping_cost: Option<Decimal>,
	#[serde(default)]
	pub shipment_category: ShipmentCategory,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub category_notes: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub shipped_by: Option<String>,
	/// Set when the label was bought but the owning order could not be
	/// moved to `processing` afterwards.
	#[serde(default)]
	pub needs_reconciliation: bool,
}

entity!(Shipment, StorageKey::Shipments);
