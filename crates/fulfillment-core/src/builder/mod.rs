//! Builder for assembling a fulfillment engine from configuration.
//!
//! Each pluggable component (storage, carrier, commerce platform, insight
//! provider) is created from a map of named factory functions. Storage is
//! required; the integrations are optional and the endpoints that need them
//! answer "not configured" when they are absent.

use crate::engine::FulfillmentEngine;
use fulfillment_carrier::{CarrierError, CarrierInterface, CarrierService};
use fulfillment_commerce::{CommerceError, CommerceInterface, CommerceService};
use fulfillment_config::{Config, IntegrationConfig};
use fulfillment_insights::{InsightError, InsightInterface, InsightService};
use fulfillment_storage::{StorageError, StorageInterface, StorageService};
use fulfillment_types::{Clock, SystemClock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by the
/// implementation name used in configuration.
pub struct FulfillmentFactories<SF, CF, MF, IF> {
	pub storage_factories: HashMap<String, SF>,
	pub carrier_factories: HashMap<String, CF>,
	pub commerce_factories: HashMap<String, MF>,
	pub insight_factories: HashMap<String, IF>,
}

/// Builder for constructing a FulfillmentEngine with pluggable implementations.
pub struct FulfillmentBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
	rng: Option<StdRng>,
}

impl FulfillmentBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
			rng: None,
		}
	}

	/// Replaces the wall clock used for record timestamps.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Seeds workstation selection in auto-scheduling.
	pub fn with_rng(mut self, rng: StdRng) -> Self {
		self.rng = Some(rng);
		self
	}

	pub fn build<SF, CF, MF, IF>(
		self,
		factories: FulfillmentFactories<SF, CF, MF, IF>,
	) -> Result<FulfillmentEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		CF: Fn(&toml::Value) -> Result<Box<dyn CarrierInterface>, CarrierError>,
		MF: Fn(&toml::Value) -> Result<Box<dyn CommerceInterface>, CommerceError>,
		IF: Fn(&toml::Value) -> Result<Box<dyn InsightInterface>, InsightError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = factories.storage_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		let primary_storage = &self.config.storage.primary;
		let backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"primary storage '{}' has no registered implementation",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::with_clock(backend, self.clock.clone()));

		let carrier = load_integration(
			"carrier",
			self.config.carrier.as_ref(),
			&factories.carrier_factories,
		)?
		.map(|implementation| Arc::new(CarrierService::new(implementation)));

		let commerce = load_integration(
			"commerce",
			self.config.commerce.as_ref(),
			&factories.commerce_factories,
		)?
		.map(|implementation| Arc::new(CommerceService::new(implementation)));

		let insights = load_integration(
			"insights",
			self.config.insights.as_ref(),
			&factories.insight_factories,
		)?
		.map(|implementation| Arc::new(InsightService::new(implementation)));

		let rng = self.rng.unwrap_or_else(StdRng::from_entropy);

		Ok(FulfillmentEngine::new(
			self.config,
			storage,
			carrier,
			commerce,
			insights,
			rng,
		))
	}
}

/// Creates the primary implementation of an optional integration.
///
/// An absent section is logged and yields `None`. A configured primary with
/// no registered factory, or a factory that rejects its table, is an error.
fn load_integration<T, E, F>(
	component: &'static str,
	section: Option<&IntegrationConfig>,
	factories: &HashMap<String, F>,
) -> Result<Option<Box<T>>, BuilderError>
where
	T: ?Sized,
	E: Display,
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let Some(section) = section else {
		tracing::warn!(component, "Not configured; dependent endpoints are disabled");
		return Ok(None);
	};
	let (name, config) = section.primary_config().ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' has no configuration table",
			component, section.primary
		))
	})?;
	let factory = factories.get(name).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"{} implementation '{}' is not registered",
			component, name
		))
	})?;

	match factory(config) {
		Ok(implementation) => {
			tracing::info!(component, implementation = %name, enabled = true, "Loaded");
			Ok(Some(implementation))
		},
		Err(e) => {
			tracing::error!(
				component,
				implementation = %name,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, name, e
			)))
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_config::ConfigBuilder;
	use fulfillment_storage::implementations::{file, memory};
	use fulfillment_types::{ManualClock, Order};

	type StorageFn = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;
	type CarrierFn = fn(&toml::Value) -> Result<Box<dyn CarrierInterface>, CarrierError>;
	type CommerceFn = fn(&toml::Value) -> Result<Box<dyn CommerceInterface>, CommerceError>;
	type InsightFn = fn(&toml::Value) -> Result<Box<dyn InsightInterface>, InsightError>;

	fn factories() -> FulfillmentFactories<StorageFn, CarrierFn, CommerceFn, InsightFn> {
		let mut storage_factories: HashMap<String, StorageFn> = HashMap::new();
		storage_factories.insert("memory".into(), memory::create_storage);
		FulfillmentFactories {
			storage_factories,
			carrier_factories: HashMap::new(),
			commerce_factories: HashMap::new(),
			insight_factories: HashMap::new(),
		}
	}

	#[tokio::test]
	async fn test_build_with_memory_storage() {
		let clock = Arc::new(ManualClock::new(crate::test_support::start_time()));
		let engine = FulfillmentBuilder::new(ConfigBuilder::new().build())
			.with_clock(clock)
			.with_rng(StdRng::seed_from_u64(3))
			.build(factories())
			.unwrap();

		let orders: Vec<Order> = engine.storage().list(None, None).await.unwrap();
		assert!(orders.is_empty());
		assert_eq!(engine.config().service.id, "test-fulfillment");
	}

	#[test]
	fn test_unknown_storage_is_missing_component() {
		let config = ConfigBuilder::new()
			.storage("redis", toml::Value::Table(toml::Table::new()))
			.build();
		let result = FulfillmentBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_unregistered_carrier_is_rejected() {
		let config = ConfigBuilder::new()
			.carrier("ups", toml::Value::Table(toml::Table::new()))
			.build();
		let result = FulfillmentBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_bad_storage_table_is_config_error() {
		let mut table = toml::Table::new();
		table.insert("storage_path".into(), toml::Value::Integer(5));
		let mut storage_factories: HashMap<String, StorageFn> = HashMap::new();
		storage_factories.insert("file".into(), file::create_storage);
		let config = ConfigBuilder::new()
			.storage("file", toml::Value::Table(table))
			.build();
		let result = FulfillmentBuilder::new(config).build(FulfillmentFactories {
			storage_factories,
			..factories()
		});
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}
