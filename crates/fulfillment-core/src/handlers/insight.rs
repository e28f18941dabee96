//! Insight handler.
//!
//! Builds the context object for each insight request from stored data and
//! hands it to the configured model provider. Suggestions are advisory and
//! never written back.

use crate::reports::workflow_snapshot;
use crate::scheduling::ProductionScheduler;
use fulfillment_insights::{
	Answer, InsightError, InsightRequest, InsightResponse, InsightService, PrioritySuggestion,
	ProductionInsights,
};
use fulfillment_storage::{StorageError, StorageService};
use fulfillment_types::{truncate_id, Order, ProductionTask, TaskStatus};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum InsightHandlerError {
	#[error("No insight provider is configured")]
	NotConfigured,
	#[error("Insight error: {0}")]
	Insight(#[from] InsightError),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for InsightHandlerError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => InsightHandlerError::NotFound(id),
			other => InsightHandlerError::Storage(other.to_string()),
		}
	}
}

fn unexpected(kind: &'static str) -> InsightHandlerError {
	InsightHandlerError::Insight(InsightError::SchemaMismatch {
		kind,
		message: "provider answered a different request kind".into(),
	})
}

pub struct InsightHandler {
	storage: Arc<StorageService>,
	scheduler: Arc<ProductionScheduler>,
	insights: Option<Arc<InsightService>>,
}

impl InsightHandler {
	pub fn new(
		storage: Arc<StorageService>,
		scheduler: Arc<ProductionScheduler>,
		insights: Option<Arc<InsightService>>,
	) -> Self {
		Self {
			storage,
			scheduler,
			insights,
		}
	}

	fn service(&self) -> Result<&InsightService, InsightHandlerError> {
		self.insights.as_deref().ok_or(InsightHandlerError::NotConfigured)
	}

	/// Task counts per status, the forecast and current blockers.
	pub async fn production_context(&self) -> Result<Value, InsightHandlerError> {
		let tasks: Vec<ProductionTask> = self.storage.list(None, None).await?;
		let mut counts: BTreeMap<&str, usize> =
			TaskStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
		for task in &tasks {
			*counts.entry(task.status.as_str()).or_default() += 1;
		}
		let blocked: Vec<Value> = tasks
			.iter()
			.filter(|t| t.status == TaskStatus::Blocked)
			.map(|t| {
				json!({
					"task": t.task_name,
					"workstation": t.workstation,
					"reason": t.blocked_reason,
				})
			})
			.collect();
		let forecast = self
			.scheduler
			.forecast()
			.await
			.map_err(|e| InsightHandlerError::Storage(e.to_string()))?;

		Ok(json!({
			"task_counts": counts,
			"forecast": forecast,
			"blocked": blocked,
		}))
	}

	#[instrument(skip_all)]
	pub async fn production_insights(&self) -> Result<ProductionInsights, InsightHandlerError> {
		let service = self.service()?;
		let context = self.production_context().await?;
		match service
			.summarize(InsightRequest::ProductionInsights { context })
			.await?
		{
			InsightResponse::ProductionInsights(insights) => Ok(insights),
			_ => Err(unexpected("production_insights")),
		}
	}

	/// Suggests a priority for one order. Nothing is written.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn suggest_priority(
		&self,
		order_id: &str,
	) -> Result<PrioritySuggestion, InsightHandlerError> {
		let service = self.service()?;
		let order: Order = self.storage.get(order_id).await?;
		let context = json!({
			"order_number": order.order_number,
			"status": order.status,
			"current_priority": order.priority,
			"source": order.source,
			"created_date": order.meta.created_date,
			"items": order.items,
			"total_weight": order.total_weight,
			"order_value": order.order_value,
			"is_international": order.is_international,
			"special_instructions": order.special_instructions,
		});
		match service
			.summarize(InsightRequest::SuggestPriority { context })
			.await?
		{
			InsightResponse::SuggestPriority(suggestion) => Ok(suggestion),
			_ => Err(unexpected("suggest_priority")),
		}
	}

	/// Answers a free-text question against the current workflow summary.
	#[instrument(skip_all)]
	pub async fn ask(&self, question: &str) -> Result<Answer, InsightHandlerError> {
		let service = self.service()?;
		let orders: Vec<Order> = self.storage.list(None, None).await?;
		let context = json!({
			"workflow": workflow_snapshot(&orders),
			"production": self.production_context().await?,
		});
		match service
			.summarize(InsightRequest::Ask {
				question: question.to_string(),
				context,
			})
			.await?
		{
			InsightResponse::Ask(answer) => Ok(answer),
			_ => Err(unexpected("ask")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{manual_order, memory_storage};
	use async_trait::async_trait;
	use fulfillment_config::SchedulingConfig;
	use fulfillment_insights::InsightInterface;
	use fulfillment_types::{ConfigSchema, Priority, ValidationError};
	use rand::rngs::StdRng;
	use rand::SeedableRng;
	use std::sync::Mutex;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	/// Answers every request with a fixed object and records the context.
	#[derive(Clone)]
	struct Canned {
		answer: Value,
		seen: Arc<Mutex<Vec<InsightRequest>>>,
	}

	#[async_trait]
	impl InsightInterface for Canned {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn summarize(&self, request: &InsightRequest) -> Result<Value, InsightError> {
			self.seen.lock().unwrap().push(request.clone());
			Ok(self.answer.clone())
		}
	}

	type Seen = Arc<Mutex<Vec<InsightRequest>>>;

	fn handler(storage: Arc<StorageService>, answer: Option<Value>) -> (InsightHandler, Seen) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let insights = answer.map(|answer| {
			Arc::new(InsightService::new(Box::new(Canned {
				answer,
				seen: seen.clone(),
			})))
		});
		let scheduler = Arc::new(ProductionScheduler::new(
			storage.clone(),
			SchedulingConfig::default(),
			StdRng::seed_from_u64(1),
		));
		(InsightHandler::new(storage, scheduler, insights), seen)
	}

	#[tokio::test]
	async fn test_priority_suggestion_is_advisory() {
		let storage = memory_storage();
		let order = storage.create(manual_order("5001", "US")).await.unwrap();
		let (handler, seen) = handler(
			storage.clone(),
			Some(json!({ "priority": "rush", "reasoning": "Event date next week" })),
		);

		let suggestion = handler.suggest_priority(&order.meta.id).await.unwrap();
		assert_eq!(suggestion.priority, Priority::Rush);

		let stored: Order = storage.get(&order.meta.id).await.unwrap();
		assert_eq!(stored.priority, Priority::Normal);
		assert_eq!(stored.meta.updated_date, order.meta.updated_date);

		let requests = seen.lock().unwrap();
		assert_eq!(requests[0].context()["order_number"], json!("5001"));
	}

	#[tokio::test]
	async fn test_schema_mismatch_is_surfaced() {
		let storage = memory_storage();
		let (handler, _) = handler(storage, Some(json!({ "summary": 12 })));
		let result = handler.production_insights().await;
		assert!(matches!(
			result,
			Err(InsightHandlerError::Insight(InsightError::SchemaMismatch { .. }))
		));
	}

	#[tokio::test]
	async fn test_ask_sends_workflow_context() {
		let storage = memory_storage();
		storage.create(manual_order("5002", "US")).await.unwrap();
		let (handler, seen) = handler(storage, Some(json!({ "answer": "One pending order." })));

		let answer = handler.ask("How many orders are waiting?").await.unwrap();
		assert_eq!(answer.answer, "One pending order.");
		let requests = seen.lock().unwrap();
		assert_eq!(requests[0].context()["workflow"]["counts"]["pending"], json!(1));
		assert_eq!(
			requests[0].context()["production"]["task_counts"]["scheduled"],
			json!(0)
		);
	}

	#[tokio::test]
	async fn test_missing_provider_is_not_configured() {
		let (handler, _) = handler(memory_storage(), None);
		assert!(matches!(
			handler.ask("anything").await,
			Err(InsightHandlerError::NotConfigured)
		));
	}
}
