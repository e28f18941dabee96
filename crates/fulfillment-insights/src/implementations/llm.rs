//! Chat-completions model provider.
//!
//! Works with any endpoint that speaks the OpenAI chat-completions format
//! and honours `response_format: json_schema`. The request kind picks the
//! system prompt and schema; the context travels as the user message.

use crate::{
	InsightError, InsightFactory, InsightInterface, InsightRegistry, InsightRequest,
};
use async_trait::async_trait;
use fulfillment_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString,
	ValidationError,
};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Chat-completions client.
pub struct LlmInsights {
	client: reqwest::Client,
	endpoint: String,
	api_key: SecretString,
	model: String,
}

impl LlmInsights {
	pub fn new(
		endpoint: String,
		api_key: SecretString,
		model: String,
		timeout: Duration,
	) -> Result<Self, InsightError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| InsightError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			endpoint,
			api_key,
			model,
		})
	}
}

#[async_trait]
impl InsightInterface for LlmInsights {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LlmSchema)
	}

	async fn summarize(&self, request: &InsightRequest) -> Result<Value, InsightError> {
		let body = build_chat_body(&self.model, request);
		let response = self
			.client
			.post(&self.endpoint)
			.bearer_auth(self.api_key.expose_secret())
			.json(&body)
			.send()
			.await
			.map_err(|e| InsightError::Network(e.to_string()))?;

		let status = response.status();
		let text = response
			.text()
			.await
			.map_err(|e| InsightError::Network(e.to_string()))?;
		if !status.is_success() {
			let message = serde_json::from_str::<Value>(&text)
				.ok()
				.and_then(|v| {
					v.pointer("/error/message")
						.and_then(Value::as_str)
						.map(str::to_string)
				})
				.unwrap_or_else(|| text.chars().take(500).collect());
			return Err(InsightError::Upstream {
				status: status.as_u16(),
				message,
			});
		}

		let value: Value = serde_json::from_str(&text).map_err(|e| InsightError::SchemaMismatch {
			kind: request.kind(),
			message: e.to_string(),
		})?;
		parse_chat_content(request.kind(), &value)
	}
}

fn system_prompt(request: &InsightRequest) -> &'static str {
	match request {
		InsightRequest::ProductionInsights { .. } => {
			"You review a small workshop's production floor. Given task counts, \
			 the completion forecast and blocked-task reasons, summarize the state \
			 of production, name bottlenecks and give short, concrete recommendations."
		},
		InsightRequest::SuggestPriority { .. } => {
			"You triage fulfillment orders. Given one order and the current queue, \
			 suggest rush, priority or normal and explain the choice in one or two sentences."
		},
		InsightRequest::Ask { .. } => {
			"You answer questions from warehouse staff using only the queue summary \
			 provided. Say so when the summary does not contain the answer."
		},
	}
}

/// Builds the chat-completions request for an insight.
pub fn build_chat_body(model: &str, request: &InsightRequest) -> Value {
	let user_content = match request {
		InsightRequest::Ask { question, context } => json!({
			"question": question,
			"context": context,
		}),
		other => other.context().clone(),
	};

	json!({
		"model": model,
		"messages": [
			{ "role": "system", "content": system_prompt(request) },
			{ "role": "user", "content": user_content.to_string() },
		],
		"response_format": {
			"type": "json_schema",
			"json_schema": {
				"name": request.kind(),
				"schema": request.output_schema(),
				"strict": true,
			}
		},
	})
}

/// Pulls the JSON object out of the first choice's message content.
pub fn parse_chat_content(kind: &'static str, value: &Value) -> Result<Value, InsightError> {
	let mismatch = |message: String| InsightError::SchemaMismatch { kind, message };

	let content = value
		.pointer("/choices/0/message/content")
		.and_then(Value::as_str)
		.ok_or_else(|| mismatch("no message content in response".into()))?;
	let parsed: Value =
		serde_json::from_str(content).map_err(|e| mismatch(format!("content is not JSON: {}", e)))?;
	if !parsed.is_object() {
		return Err(mismatch("content is not a JSON object".into()));
	}
	Ok(parsed)
}

/// Configuration schema for the chat-completions provider.
pub struct LlmSchema;

impl ConfigSchema for LlmSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("endpoint", FieldType::Url),
				Field::new("api_key", FieldType::String),
				Field::new("model", FieldType::String).with_validator(|v| match v.as_str() {
					Some(s) if !s.trim().is_empty() => Ok(()),
					_ => Err("must not be empty".to_string()),
				}),
			],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create the chat-completions provider.
///
/// Configuration parameters:
/// - `endpoint`: full chat-completions URL
/// - `api_key`: bearer token for the provider
/// - `model`: model name sent with every request
/// - `timeout_seconds`: request timeout (default: 60)
pub fn create_insights(config: &toml::Value) -> Result<Box<dyn InsightInterface>, InsightError> {
	LlmSchema
		.validate(config)
		.map_err(|e| InsightError::Configuration(e.to_string()))?;

	let get = |key: &str| {
		config
			.get(key)
			.and_then(|v| v.as_str())
			.map(str::to_string)
			.ok_or_else(|| InsightError::Configuration(format!("{} is required", key)))
	};
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(LlmInsights::new(
		get("endpoint")?,
		SecretString::from(get("api_key")?),
		get("model")?,
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the chat-completions provider.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "llm";
	type Factory = InsightFactory;

	fn factory() -> Self::Factory {
		create_insights
	}
}

impl InsightRegistry for Registry {}
