//! Registry of every implementation factory compiled into the binary.
//!
//! Configuration names an implementation per component; the registry maps
//! those names to factory functions so the builder can instantiate them.

use fulfillment_carrier::CarrierFactory;
use fulfillment_commerce::CommerceFactory;
use fulfillment_config::{Config, IntegrationConfig};
use fulfillment_core::{FulfillmentBuilder, FulfillmentEngine, FulfillmentFactories};
use fulfillment_insights::InsightFactory;
use fulfillment_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub carrier: HashMap<String, CarrierFactory>,
	pub commerce: HashMap<String, CommerceFactory>,
	pub insights: HashMap<String, InsightFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			carrier: HashMap::new(),
			commerce: HashMap::new(),
			insights: HashMap::new(),
		}
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the registry, filling it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in fulfillment_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.storage.insert(name.to_string(), factory);
		}

		for (name, factory) in fulfillment_carrier::get_all_implementations() {
			tracing::debug!("Registering carrier implementation: {}", name);
			registry.carrier.insert(name.to_string(), factory);
		}

		for (name, factory) in fulfillment_commerce::get_all_implementations() {
			tracing::debug!("Registering commerce implementation: {}", name);
			registry.commerce.insert(name.to_string(), factory);
		}

		for (name, factory) in fulfillment_insights::get_all_implementations() {
			tracing::debug!("Registering insight implementation: {}", name);
			registry.insights.insert(name.to_string(), factory);
		}

		registry
	})
}

/// Picks the factories named in one configuration section. An unknown name
/// is an error listing what the binary offers.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

fn integration_impls(section: Option<&IntegrationConfig>) -> HashMap<String, toml::Value> {
	section
		.map(|section| section.implementations.clone())
		.unwrap_or_default()
}

/// Builds the engine from configuration using the registered factories.
pub fn build_engine_from_config(
	config: Config,
) -> Result<FulfillmentEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let carrier_factories = build_factories!(
		registry,
		integration_impls(config.carrier.as_ref()),
		carrier,
		"carrier"
	);
	let commerce_factories = build_factories!(
		registry,
		integration_impls(config.commerce.as_ref()),
		commerce,
		"commerce"
	);
	let insight_factories = build_factories!(
		registry,
		integration_impls(config.insights.as_ref()),
		insights,
		"insight"
	);

	let factories = FulfillmentFactories {
		storage_factories,
		carrier_factories,
		commerce_factories,
		insight_factories,
	};

	Ok(FulfillmentBuilder::new(config).build(factories)?)
}
