//! LLM-backed insights for the fulfillment service.
//!
//! Every insight is a single `summarize` call: the caller supplies a
//! request kind and a JSON context, the implementation returns a JSON
//! object, and [`InsightService`] decodes it into the typed output declared
//! for that kind. Nothing here writes to the store; a priority suggestion
//! is advice the user may or may not apply.

use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, ImplementationRegistry, Priority};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod llm;
}

/// Errors that can occur while producing an insight.
#[derive(Debug, Error)]
pub enum InsightError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Model provider returned {status}: {message}")]
	Upstream { status: u16, message: String },
	/// The model answered but not with an object of the declared shape.
	#[error("Response does not match the {kind} schema: {message}")]
	SchemaMismatch { kind: &'static str, message: String },
	#[error("Invalid insight request: {0}")]
	InvalidRequest(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// What is being asked of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightRequest {
	/// Commentary on the production floor: task counts, forecast, blockers.
	ProductionInsights { context: Value },
	/// A suggested priority for one order.
	SuggestPriority { context: Value },
	/// A free-text question answered against a queue summary.
	Ask { question: String, context: Value },
}

impl InsightRequest {
	pub fn kind(&self) -> &'static str {
		match self {
			InsightRequest::ProductionInsights { .. } => "production_insights",
			InsightRequest::SuggestPriority { .. } => "suggest_priority",
			InsightRequest::Ask { .. } => "ask",
		}
	}

	pub fn context(&self) -> &Value {
		match self {
			InsightRequest::ProductionInsights { context }
			| InsightRequest::SuggestPriority { context }
			| InsightRequest::Ask { context, .. } => context,
		}
	}

	/// JSON schema the response object must satisfy.
	pub fn output_schema(&self) -> Value {
		match self {
			InsightRequest::ProductionInsights { .. } => json!({
				"type": "object",
				"properties": {
					"summary": { "type": "string" },
					"bottlenecks": { "type": "array", "items": { "type": "string" } },
					"recommendations": { "type": "array", "items": { "type": "string" } }
				},
				"required": ["summary", "bottlenecks", "recommendations"],
				"additionalProperties": false
			}),
			InsightRequest::SuggestPriority { .. } => json!({
				"type": "object",
				"properties": {
					"priority": { "type": "string", "enum": ["rush", "priority", "normal"] },
					"reasoning": { "type": "string" }
				},
				"required": ["priority", "reasoning"],
				"additionalProperties": false
			}),
			InsightRequest::Ask { .. } => json!({
				"type": "object",
				"properties": {
					"answer": { "type": "string" }
				},
				"required": ["answer"],
				"additionalProperties": false
			}),
		}
	}

	fn validate(&self) -> Result<(), InsightError> {
		if let InsightRequest::Ask { question, .. } = self {
			if question.trim().is_empty() {
				return Err(InsightError::InvalidRequest("question must not be empty".into()));
			}
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionInsights {
	pub summary: String,
	#[serde(default)]
	pub bottlenecks: Vec<String>,
	#[serde(default)]
	pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritySuggestion {
	pub priority: Priority,
	pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
	pub answer: String,
}

/// Typed result of a `summarize` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightResponse {
	ProductionInsights(ProductionInsights),
	SuggestPriority(PrioritySuggestion),
	Ask(Answer),
}

/// Trait implemented by every model provider.
#[async_trait]
pub trait InsightInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Produces a JSON object for the request, constrained to
	/// [`InsightRequest::output_schema`] where the provider supports it.
	async fn summarize(&self, request: &InsightRequest) -> Result<Value, InsightError>;
}

/// Type alias for insight factory functions.
pub type InsightFactory = fn(&toml::Value) -> Result<Box<dyn InsightInterface>, InsightError>;

/// Registry trait for insight implementations.
pub trait InsightRegistry: ImplementationRegistry<Factory = InsightFactory> {}

/// Get all registered insight implementations.
pub fn get_all_implementations() -> Vec<(&'static str, InsightFactory)> {
	use implementations::llm;

	vec![(llm::Registry::NAME, llm::Registry::factory())]
}

fn decode<T: DeserializeOwned>(kind: &'static str, value: Value) -> Result<T, InsightError> {
	serde_json::from_value(value).map_err(|e| InsightError::SchemaMismatch {
		kind,
		message: e.to_string(),
	})
}

/// Front for the configured model provider.
pub struct InsightService {
	implementation: Box<dyn InsightInterface>,
}

impl InsightService {
	pub fn new(implementation: Box<dyn InsightInterface>) -> Self {
		Self { implementation }
	}

	/// Runs one request and decodes the answer into its declared type.
	/// Failures are returned as-is; there is no retry.
	pub async fn summarize(&self, request: InsightRequest) -> Result<InsightResponse, InsightError> {
		request.validate()?;
		let kind = request.kind();
		let value = self.implementation.summarize(&request).await?;
		tracing::debug!(component = "insights", kind, "Received insight");

		Ok(match request {
			InsightRequest::ProductionInsights { .. } => {
				InsightResponse::ProductionInsights(decode(kind, value)?)
			},
			InsightRequest::SuggestPriority { .. } => {
				InsightResponse::SuggestPriority(decode(kind, value)?)
			},
			InsightRequest::Ask { .. } => InsightResponse::Ask(decode(kind, value)?),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::ValidationError;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	/// Returns a fixed value for every request.
	struct Canned {
		value: Value,
		calls: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl InsightInterface for Canned {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn summarize(&self, _request: &InsightRequest) -> Result<Value, InsightError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(self.value.clone())
		}
	}

	fn service(value: Value) -> (InsightService, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));
		let service = InsightService::new(Box::new(Canned {
			value,
			calls: calls.clone(),
		}));
		(service, calls)
	}

	#[tokio::test]
	async fn test_priority_suggestion_is_decoded() {
		let (service, _) = service(json!({ "priority": "rush", "reasoning": "Due tomorrow" }));
		let response = service
			.summarize(InsightRequest::SuggestPriority { context: json!({}) })
			.await
			.unwrap();
		assert_eq!(
			response,
			InsightResponse::SuggestPriority(PrioritySuggestion {
				priority: Priority::Rush,
				reasoning: "Due tomorrow".into(),
			})
		);
	}

	#[tokio::test]
	async fn test_out_of_vocabulary_priority_is_a_schema_mismatch() {
		let (service, _) = service(json!({ "priority": "urgent", "reasoning": "" }));
		let error = service
			.summarize(InsightRequest::SuggestPriority { context: json!({}) })
			.await
			.unwrap_err();
		assert!(matches!(
			error,
			InsightError::SchemaMismatch {
				kind: "suggest_priority",
				..
			}
		));
	}

	#[tokio::test]
	async fn test_empty_question_is_rejected_without_a_call() {
		let (service, calls) = service(json!({ "answer": "42" }));
		let error = service
			.summarize(InsightRequest::Ask {
				question: "  ".into(),
				context: json!({}),
			})
			.await
			.unwrap_err();
		assert!(matches!(error, InsightError::InvalidRequest(_)));
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn test_output_schemas_name_required_fields() {
		let request = InsightRequest::ProductionInsights { context: json!({}) };
		assert_eq!(request.output_schema()["required"][0], "summary");
		assert_eq!(request.kind(), "production_insights");
	}
}
