//! Fulfillment engine that owns every service and handler.
//!
//! The engine is assembled once by [`crate::builder::FulfillmentBuilder`]
//! and shared by the HTTP layer. There is no background loop: every
//! operation is triggered by a request and runs to completion within it.

use crate::handlers::{InsightHandler, InventoryHandler, LabelHandler, OrderHandler, SyncHandler};
use crate::queue::QueueService;
use crate::reports::ReportService;
use crate::scheduling::ProductionScheduler;
use crate::state::{OrderStateMachine, TaskStateMachine};
use fulfillment_carrier::CarrierService;
use fulfillment_commerce::CommerceService;
use fulfillment_config::Config;
use fulfillment_insights::InsightService;
use fulfillment_storage::StorageService;
use rand::rngs::StdRng;
use std::sync::Arc;

/// Main engine holding the shared services of one fulfillment instance.
#[derive(Clone)]
pub struct FulfillmentEngine {
	config: Config,
	storage: Arc<StorageService>,
	carrier: Option<Arc<CarrierService>>,
	commerce: Option<Arc<CommerceService>>,
	order_state: Arc<OrderStateMachine>,
	task_state: Arc<TaskStateMachine>,
	queues: Arc<QueueService>,
	scheduler: Arc<ProductionScheduler>,
	order_handler: Arc<OrderHandler>,
	label_handler: Arc<LabelHandler>,
	inventory_handler: Arc<InventoryHandler>,
	sync_handler: Arc<SyncHandler>,
	insight_handler: Arc<InsightHandler>,
	reports: Arc<ReportService>,
}

impl FulfillmentEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		carrier: Option<Arc<CarrierService>>,
		commerce: Option<Arc<CommerceService>>,
		insights: Option<Arc<InsightService>>,
		rng: StdRng,
	) -> Self {
		let delete_password = config.security.delete_password.clone();
		let order_state = Arc::new(OrderStateMachine::new(
			storage.clone(),
			config.workflow.concurrency,
		));
		let task_state = Arc::new(TaskStateMachine::new(storage.clone()));
		let queues = Arc::new(QueueService::new(
			storage.clone(),
			config.workflow.queue_fetch_limit,
		));
		let scheduler = Arc::new(ProductionScheduler::new(
			storage.clone(),
			config.scheduling.clone(),
			rng,
		));

		let order_handler = Arc::new(OrderHandler::new(
			storage.clone(),
			order_state.clone(),
			delete_password.clone(),
		));
		let label_handler = Arc::new(LabelHandler::new(
			storage.clone(),
			order_state.clone(),
			carrier.clone(),
			commerce.clone(),
			delete_password,
		));
		let inventory_handler = Arc::new(InventoryHandler::new(storage.clone()));
		let sync_handler = Arc::new(SyncHandler::new(storage.clone(), commerce.clone()));
		let insight_handler = Arc::new(InsightHandler::new(
			storage.clone(),
			scheduler.clone(),
			insights,
		));
		let reports = Arc::new(ReportService::new(storage.clone()));

		Self {
			config,
			storage,
			carrier,
			commerce,
			order_state,
			task_state,
			queues,
			scheduler,
			order_handler,
			label_handler,
			inventory_handler,
			sync_handler,
			insight_handler,
			reports,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn has_carrier(&self) -> bool {
		self.carrier.is_some()
	}

	pub fn has_commerce(&self) -> bool {
		self.commerce.is_some()
	}

	pub fn order_state(&self) -> &Arc<OrderStateMachine> {
		&self.order_state
	}

	pub fn task_state(&self) -> &Arc<TaskStateMachine> {
		&self.task_state
	}

	pub fn queues(&self) -> &Arc<QueueService> {
		&self.queues
	}

	pub fn scheduler(&self) -> &Arc<ProductionScheduler> {
		&self.scheduler
	}

	pub fn orders(&self) -> &Arc<OrderHandler> {
		&self.order_handler
	}

	pub fn labels(&self) -> &Arc<LabelHandler> {
		&self.label_handler
	}

	pub fn inventory(&self) -> &Arc<InventoryHandler> {
		&self.inventory_handler
	}

	pub fn sync(&self) -> &Arc<SyncHandler> {
		&self.sync_handler
	}

	pub fn insights(&self) -> &Arc<InsightHandler> {
		&self.insight_handler
	}

	pub fn reports(&self) -> &Arc<ReportService> {
		&self.reports
	}
}
