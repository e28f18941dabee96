//! Configuration builder for tests and local development.
//!
//! Produces a valid in-memory configuration without touching the
//! filesystem or environment.

use crate::{
	ApiConfig, ConcurrencyMode, Config, IntegrationConfig, SchedulingConfig, SecurityConfig,
	ServiceConfig, StorageConfig, WorkflowConfig,
};
use fulfillment_types::SecretString;
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	delete_password: String,
	concurrency: ConcurrencyMode,
	queue_fetch_limit: usize,
	scheduling: SchedulingConfig,
	carrier: Option<IntegrationConfig>,
	commerce: Option<IntegrationConfig>,
	insights: Option<IntegrationConfig>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Memory storage, last-write-wins, default scheduling constants and no
	/// integrations.
	pub fn new() -> Self {
		Self {
			service_id: "test-fulfillment".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::Table::new()),
			delete_password: "test-password".to_string(),
			concurrency: ConcurrencyMode::LastWriteWins,
			queue_fetch_limit: 100,
			scheduling: SchedulingConfig::default(),
			carrier: None,
			commerce: None,
			insights: None,
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Selects the storage implementation and its table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	pub fn delete_password(mut self, password: impl Into<String>) -> Self {
		self.delete_password = password.into();
		self
	}

	pub fn concurrency(mut self, mode: ConcurrencyMode) -> Self {
		self.concurrency = mode;
		self
	}

	pub fn queue_fetch_limit(mut self, limit: usize) -> Self {
		self.queue_fetch_limit = limit;
		self
	}

	pub fn scheduling(mut self, scheduling: SchedulingConfig) -> Self {
		self.scheduling = scheduling;
		self
	}

	pub fn carrier(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.carrier = Some(integration(name.into(), config));
		self
	}

	pub fn commerce(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.commerce = Some(integration(name.into(), config));
		self
	}

	pub fn insights(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.insights = Some(integration(name.into(), config));
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(self.storage_primary.clone(), self.storage_config);

		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: storage_implementations,
			},
			security: SecurityConfig {
				delete_password: SecretString::from(self.delete_password),
			},
			workflow: WorkflowConfig {
				concurrency: self.concurrency,
				queue_fetch_limit: self.queue_fetch_limit,
			},
			scheduling: self.scheduling,
			carrier: self.carrier,
			commerce: self.commerce,
			insights: self.insights,
			api: self.api,
		}
	}
}

fn integration(name: String, config: toml::Value) -> IntegrationConfig {
	let mut implementations = HashMap::new();
	implementations.insert(name.clone(), config);
	IntegrationConfig {
		primary: name,
		implementations,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_build_is_valid() {
		let config = ConfigBuilder::new().build();
		assert!(config.validate().is_ok());
		assert_eq!(config.storage.primary, "memory");
		assert!(config.security.delete_password.matches("test-password"));
	}

	#[test]
	fn test_builder_overrides() {
		let config = ConfigBuilder::new()
			.service_id("bench")
			.concurrency(ConcurrencyMode::CompareAndSwap)
			.queue_fetch_limit(5)
			.build();
		assert_eq!(config.service.id, "bench");
		assert_eq!(config.workflow.concurrency, ConcurrencyMode::CompareAndSwap);
		assert_eq!(config.workflow.queue_fetch_limit, 5);
	}
}
