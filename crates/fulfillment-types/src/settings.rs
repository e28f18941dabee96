//! Reference configuration records managed through plain CRUD.

use serde::{Deserialize, Serialize};

use crate::{Dimensions, RecordMeta, ShippingAddress, StorageKey};

/// Named box size offered at the packing station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxPreset {
	#[serde(flatten)]
	pub meta: RecordMeta,
	pub name: String,
	pub dimensions: Dimensions,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_weight: Option<f64>,
}

entity!(BoxPreset, StorageKey::BoxPresets);

/// Packing instructions for one SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingConfig {
	#[serde(flatten)]
	pub meta: RecordMeta,
	pub sku: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub box_preset_id: Option<String>,
	#[serde(default)]
	pub instructions: String,
}

entity!(PackingConfig, StorageKey::PackingConfigs);

/// Short label shown instead of the full product name on pick lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductShorthand {
	#[serde(flatten)]
	pub meta: RecordMeta,
	pub sku: String,
	pub shorthand: String,
}

entity!(ProductShorthand, StorageKey::ProductShorthands);

/// Person or desk reachable about a package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub company: Option<String>,
	pub phone: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
}

/// Shipper identity and label defaults. A single record is expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSettings {
	#[serde(flatten)]
	pub meta: RecordMeta,
	pub shipper: Contact,
	pub origin_address: ShippingAddress,
	#[serde(default = "default_service_type")]
	pub default_service_type: String,
	#[serde(default = "default_label_format")]
	pub label_format: String,
}

entity!(ShippingSettings, StorageKey::ShippingSettings);

fn default_service_type() -> String {
	"FEDEX_GROUND".to_string()
}

fn default_label_format() -> String {
	"PDF".to_string()
}
