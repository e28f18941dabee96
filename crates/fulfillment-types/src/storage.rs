//! Storage-related types for the fulfillment system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::str::FromStr;

/// Storage namespaces for the different record collections.
///
/// Every entity type lives in its own namespace; keys in the byte store are
/// formed as `{namespace}:{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	Orders,
	Shipments,
	Products,
	StockAdjustments,
	ProductionTasks,
	WorkStations,
	BoxPresets,
	PackingConfigs,
	ShippingSettings,
	ProductShorthands,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Shipments => "shipments",
			StorageKey::Products => "products",
			StorageKey::StockAdjustments => "stock_adjustments",
			StorageKey::ProductionTasks => "production_tasks",
			StorageKey::WorkStations => "work_stations",
			StorageKey::BoxPresets => "box_presets",
			StorageKey::PackingConfigs => "packing_configs",
			StorageKey::ShippingSettings => "shipping_settings",
			StorageKey::ProductShorthands => "product_shorthands",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::Shipments,
			Self::Products,
			Self::StockAdjustments,
			Self::ProductionTasks,
			Self::WorkStations,
			Self::BoxPresets,
			Self::PackingConfigs,
			Self::ShippingSettings,
			Self::ProductShorthands,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

/// Server-managed identity and timestamps carried by every record.
///
/// Flattened into each entity so the serialized record is a single flat
/// object. Clients never set these; the store assigns them on create and
/// bumps `updated_date` on every write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordMeta {
	pub id: String,
	pub created_date: DateTime<Utc>,
	pub updated_date: DateTime<Utc>,
}

/// A record type that can be persisted in the entity store.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
	/// Namespace holding records of this type.
	const KEY: StorageKey;

	fn meta(&self) -> &RecordMeta;

	fn meta_mut(&mut self) -> &mut RecordMeta;

	fn id(&self) -> &str {
		&self.meta().id
	}
}
