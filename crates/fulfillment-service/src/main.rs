//! Main entry point for the fulfillment service.
//!
//! Loads the configuration, wires storage and the optional carrier,
//! commerce and insight integrations into the engine, then serves the
//! HTTP API.

use clap::Parser;
use fulfillment_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the fulfillment service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/fulfillment.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started fulfillment");

	let config = load_config(&args).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config.clone())?);

	let api_config = config.api.clone().unwrap_or_default();
	if !api_config.enabled {
		tracing::warn!("API server disabled in configuration, nothing to run");
		return Ok(());
	}

	server::start_server(api_config, engine).await?;

	tracing::info!("Stopped fulfillment");
	Ok(())
}

async fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
	let path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	Ok(Config::from_file(path).await?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["fulfillment"]);
		assert_eq!(args.config, PathBuf::from("config/fulfillment.toml"));
		assert_eq!(args.log_level, "info");

		let args = Args::parse_from(["fulfillment", "-c", "/etc/ops.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("/etc/ops.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_load_config_and_build_engine() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("fulfillment.toml");
		std::fs::write(
			&path,
			r#"
[service]
id = "warehouse-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[security]
delete_password = "hunter2"

[api]
enabled = false
"#,
		)
		.unwrap();

		let args = Args::parse_from(["fulfillment", "-c", path.to_str().unwrap()]);
		let config = load_config(&args).await.unwrap();
		assert_eq!(config.service.id, "warehouse-test");
		assert!(!config.api.as_ref().unwrap().enabled);

		let engine = factory_registry::build_engine_from_config(config).unwrap();
		assert!(!engine.has_carrier());
		assert!(!engine.has_commerce());
	}

	#[tokio::test]
	async fn test_load_config_missing_file() {
		let dir = tempdir().unwrap();
		let args = Args::parse_from([
			"fulfillment",
			"-c",
			dir.path().join("absent.toml").to_str().unwrap(),
		]);
		assert!(load_config(&args).await.is_err());
	}
}
