//! Configuration module for the fulfillment service.
//!
//! Configuration is TOML. Values may reference environment variables as
//! `${VAR}` or `${VAR:-default}`, which keeps credentials such as the carrier
//! client secret out of the file itself.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

pub mod builders {
	pub mod config;
}
mod loader;

pub use builders::config::ConfigBuilder;

use fulfillment_types::SecretString;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the fulfillment service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub service: ServiceConfig,
	pub storage: StorageConfig,
	pub security: SecurityConfig,
	#[serde(default)]
	pub workflow: WorkflowConfig,
	#[serde(default)]
	pub scheduling: SchedulingConfig,
	/// Label purchasing. Label endpoints answer 503 when absent.
	pub carrier: Option<IntegrationConfig>,
	/// Order import and status push-back.
	pub commerce: Option<IntegrationConfig>,
	/// LLM-backed summaries and suggestions.
	pub insights: Option<IntegrationConfig>,
	pub api: Option<ApiConfig>,
}

/// Identity of this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
	/// Shared password confirming destructive deletes.
	pub delete_password: SecretString,
}

/// How order transitions guard against concurrent edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
	/// The transition is checked against the status read at request time
	/// and the write overwrites whatever is stored.
	#[default]
	LastWriteWins,
	/// The source state is re-checked under the store's write lock; a
	/// concurrent change yields a conflict instead of a write.
	CompareAndSwap,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
	#[serde(default)]
	pub concurrency: ConcurrencyMode,
	/// Maximum number of orders fetched per queue before filtering.
	#[serde(default = "default_queue_fetch_limit")]
	pub queue_fetch_limit: usize,
}

impl Default for WorkflowConfig {
	fn default() -> Self {
		Self {
			concurrency: ConcurrencyMode::default(),
			queue_fetch_limit: default_queue_fetch_limit(),
		}
	}
}

fn default_queue_fetch_limit() -> usize {
	100
}

/// Constants used by auto-scheduling and forecasting.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulingConfig {
	#[serde(default = "default_hours_per_item")]
	pub hours_per_item: f64,
	#[serde(default = "default_min_task_hours")]
	pub min_task_hours: f64,
	#[serde(default = "default_workday_hours")]
	pub workday_hours: f64,
	/// Used when no active workstation exists.
	#[serde(default = "default_workstation")]
	pub default_workstation: String,
	#[serde(default = "default_forecast_window_days")]
	pub forecast_window_days: u32,
}

impl Default for SchedulingConfig {
	fn default() -> Self {
		Self {
			hours_per_item: default_hours_per_item(),
			min_task_hours: default_min_task_hours(),
			workday_hours: default_workday_hours(),
			default_workstation: default_workstation(),
			forecast_window_days: default_forecast_window_days(),
		}
	}
}

fn default_hours_per_item() -> f64 {
	0.5
}

fn default_min_task_hours() -> f64 {
	1.0
}

fn default_workday_hours() -> f64 {
	8.0
}

fn default_workstation() -> String {
	"Main Production".to_string()
}

fn default_forecast_window_days() -> u32 {
	7
}

/// An external integration section: one primary implementation chosen from
/// the configured ones.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntegrationConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

impl IntegrationConfig {
	/// Returns the primary implementation's name and table.
	pub fn primary_config(&self) -> Option<(&str, &toml::Value)> {
		self.implementations
			.get(&self.primary)
			.map(|config| (self.primary.as_str(), config))
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_api_host(),
			port: default_api_port(),
			timeout_seconds: default_api_timeout(),
			max_request_size: default_max_request_size(),
			cors: None,
		}
	}
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	#[serde(default)]
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)))
			},
		};
		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives and
	/// resolving environment variables.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Checks cross-field constraints serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if self.security.delete_password.is_empty() {
			return Err(ConfigError::Validation(
				"security.delete_password cannot be empty".into(),
			));
		}

		if !(1..=1000).contains(&self.workflow.queue_fetch_limit) {
			return Err(ConfigError::Validation(format!(
				"workflow.queue_fetch_limit must be between 1 and 1000, got {}",
				self.workflow.queue_fetch_limit
			)));
		}

		self.validate_scheduling()?;

		for (section, integration) in [
			("carrier", &self.carrier),
			("commerce", &self.commerce),
			("insights", &self.insights),
		] {
			if let Some(integration) = integration {
				if integration.primary_config().is_none() {
					return Err(ConfigError::Validation(format!(
						"Primary {} '{}' not found in implementations",
						section, integration.primary
					)));
				}
			}
		}

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.port == 0 {
				return Err(ConfigError::Validation("api.port cannot be 0".into()));
			}
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"api.timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}

	fn validate_scheduling(&self) -> Result<(), ConfigError> {
		let scheduling = &self.scheduling;
		if scheduling.hours_per_item <= 0.0 {
			return Err(ConfigError::Validation(
				"scheduling.hours_per_item must be greater than 0".into(),
			));
		}
		if scheduling.min_task_hours < 0.0 {
			return Err(ConfigError::Validation(
				"scheduling.min_task_hours cannot be negative".into(),
			));
		}
		if scheduling.workday_hours <= 0.0 || scheduling.workday_hours > 24.0 {
			return Err(ConfigError::Validation(
				"scheduling.workday_hours must be in (0, 24]".into(),
			));
		}
		if scheduling.default_workstation.trim().is_empty() {
			return Err(ConfigError::Validation(
				"scheduling.default_workstation cannot be empty".into(),
			));
		}
		if !(1..=90).contains(&scheduling.forecast_window_days) {
			return Err(ConfigError::Validation(
				"scheduling.forecast_window_days must be between 1 and 90".into(),
			));
		}
		Ok(())
	}
}

/// Parses a TOML string: environment variables are resolved first and the
/// result is validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
