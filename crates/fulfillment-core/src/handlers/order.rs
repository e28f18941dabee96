//! Order handler for manual entry, edits, priority and deletion.
//!
//! Workflow status changes go through the [`OrderStateMachine`]; this
//! handler owns everything else a user does to an order, including the
//! packing view that joins order lines to the catalog.

use crate::state::{OrderStateError, OrderStateMachine};
use fulfillment_storage::{StorageError, StorageService};
use fulfillment_types::{
	truncate_id, BoxPreset, Component, LineItem, Order, OrderSource, OrderStatus, PackingConfig,
	Priority, Product, ProductShorthand, RecordMeta, SecretString, ShippingAddress,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while handling orders.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Forbidden: {0}")]
	Forbidden(String),
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error(transparent)]
	State(#[from] OrderStateError),
}

impl From<StorageError> for OrderError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => OrderError::NotFound(id),
			StorageError::Validation(message) => OrderError::Validation(message),
			other => OrderError::Storage(other.to_string()),
		}
	}
}

/// Fields accepted when an order is entered by hand. Weight totals and the
/// international flag are always derived.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
	pub order_number: String,
	pub customer_name: String,
	#[serde(default)]
	pub customer_email: String,
	pub shipping_address: ShippingAddress,
	pub items: Vec<LineItem>,
	#[serde(default)]
	pub priority: Priority,
	#[serde(default)]
	pub order_value: Decimal,
	#[serde(default)]
	pub special_instructions: Option<String>,
}

/// Partial edit of an order. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderEdit {
	#[serde(default)]
	pub customer_name: Option<String>,
	#[serde(default)]
	pub customer_email: Option<String>,
	#[serde(default)]
	pub shipping_address: Option<ShippingAddress>,
	#[serde(default)]
	pub items: Option<Vec<LineItem>>,
	#[serde(default)]
	pub order_value: Option<Decimal>,
	#[serde(default)]
	pub special_instructions: Option<String>,
}

/// One order line with whatever the catalog knows about its SKU.
#[derive(Debug, Clone, Serialize)]
pub struct PackingLine {
	#[serde(flatten)]
	pub item: LineItem,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub shorthand: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub components: Vec<Component>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub packing_notes: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub related_items: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub box_preset: Option<BoxPreset>,
}

impl PackingLine {
	fn bare(item: LineItem) -> Self {
		Self {
			item,
			shorthand: None,
			components: Vec::new(),
			packing_notes: None,
			related_items: Vec::new(),
			instructions: None,
			box_preset: None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct PackingView {
	pub order: Order,
	pub lines: Vec<PackingLine>,
}

fn validate_items(items: &[LineItem]) -> Result<(), OrderError> {
	if items.is_empty() {
		return Err(OrderError::Validation("an order needs at least one item".into()));
	}
	for item in items {
		if item.sku.trim().is_empty() {
			return Err(OrderError::Validation("every item needs a SKU".into()));
		}
		if item.quantity == 0 {
			return Err(OrderError::Validation(format!(
				"item {} has zero quantity",
				item.sku
			)));
		}
		if !item.weight.is_finite() || item.weight < 0.0 {
			return Err(OrderError::Validation(format!(
				"item {} has an invalid weight",
				item.sku
			)));
		}
	}
	Ok(())
}

/// Handler for user edits to orders.
pub struct OrderHandler {
	storage: Arc<StorageService>,
	state_machine: Arc<OrderStateMachine>,
	delete_password: SecretString,
}

impl OrderHandler {
	pub fn new(
		storage: Arc<StorageService>,
		state_machine: Arc<OrderStateMachine>,
		delete_password: SecretString,
	) -> Self {
		Self {
			storage,
			state_machine,
			delete_password,
		}
	}

	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
		Ok(self.storage.get(order_id).await?)
	}

	/// Creates a pending manual order.
	#[instrument(skip_all, fields(order_number = %draft.order_number))]
	pub async fn create_manual_order(&self, draft: OrderDraft) -> Result<Order, OrderError> {
		if draft.order_number.trim().is_empty() {
			return Err(OrderError::Validation("order number is required".into()));
		}
		if draft.customer_name.trim().is_empty() {
			return Err(OrderError::Validation("customer name is required".into()));
		}
		validate_items(&draft.items)?;

		let mut order = Order {
			meta: RecordMeta::default(),
			order_number: draft.order_number.trim().to_string(),
			status: OrderStatus::Pending,
			priority: draft.priority,
			source: OrderSource::Manual,
			customer_name: draft.customer_name.trim().to_string(),
			customer_email: draft.customer_email.trim().to_string(),
			shipping_address: draft.shipping_address,
			items: draft.items,
			total_weight: 0.0,
			order_value: draft.order_value,
			is_international: false,
			special_instructions: draft.special_instructions,
			staged_by: None,
			external_id: None,
		};
		order.refresh_derived();

		let order = self.storage.create(order).await?;
		tracing::info!(
			component = "orders",
			order_id = %truncate_id(&order.meta.id),
			international = order.is_international,
			"Created manual order"
		);
		Ok(order)
	}

	/// Applies an edit and re-derives weight and the international flag.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn edit_order(&self, order_id: &str, edit: OrderEdit) -> Result<Order, OrderError> {
		if let Some(items) = &edit.items {
			validate_items(items)?;
		}
		if edit
			.customer_name
			.as_deref()
			.is_some_and(|name| name.trim().is_empty())
		{
			return Err(OrderError::Validation("customer name cannot be blank".into()));
		}

		let order = self
			.storage
			.update_with(order_id, |order: &mut Order| {
				if let Some(name) = edit.customer_name {
					order.customer_name = name.trim().to_string();
				}
				if let Some(email) = edit.customer_email {
					order.customer_email = email.trim().to_string();
				}
				if let Some(address) = edit.shipping_address {
					order.shipping_address = address;
				}
				if let Some(items) = edit.items {
					order.items = items;
				}
				if let Some(value) = edit.order_value {
					order.order_value = value;
				}
				if let Some(instructions) = edit.special_instructions {
					order.special_instructions =
						Some(instructions).filter(|text| !text.trim().is_empty());
				}
				order.refresh_derived();
				Ok::<(), OrderError>(())
			})
			.await?;
		Ok(order)
	}

	pub async fn set_priority(&self, order_id: &str, priority: Priority) -> Result<Order, OrderError> {
		Ok(self.state_machine.set_priority(order_id, priority).await?)
	}

	/// Deletes an order after checking the shared delete password. A wrong
	/// password deletes nothing.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn delete_order(&self, order_id: &str, password: &str) -> Result<(), OrderError> {
		if !self.delete_password.matches(password) {
			tracing::warn!(component = "orders", "Rejected order delete with wrong password");
			return Err(OrderError::Forbidden("incorrect delete password".into()));
		}
		self.storage.delete::<Order>(order_id).await?;
		tracing::info!(component = "orders", "Deleted order");
		Ok(())
	}

	/// Joins each line to its product, packing config and shorthand by SKU.
	/// Lines whose SKU is unknown are returned as-is.
	pub async fn packing_view(&self, order_id: &str) -> Result<PackingView, OrderError> {
		let order: Order = self.storage.get(order_id).await?;

		let products: HashMap<String, Product> = self
			.storage
			.list::<Product>(None, None)
			.await?
			.into_iter()
			.map(|p| (p.sku.clone(), p))
			.collect();
		let configs: HashMap<String, PackingConfig> = self
			.storage
			.list::<PackingConfig>(None, None)
			.await?
			.into_iter()
			.map(|c| (c.sku.clone(), c))
			.collect();
		let shorthands: HashMap<String, String> = self
			.storage
			.list::<ProductShorthand>(None, None)
			.await?
			.into_iter()
			.map(|s| (s.sku, s.shorthand))
			.collect();
		let presets: HashMap<String, BoxPreset> = self
			.storage
			.list::<BoxPreset>(None, None)
			.await?
			.into_iter()
			.map(|b| (b.meta.id.clone(), b))
			.collect();

		let lines = order
			.items
			.iter()
			.cloned()
			.map(|item| {
				let mut line = PackingLine::bare(item);
				let sku = line.item.sku.clone();
				line.shorthand = shorthands.get(&sku).cloned();
				if let Some(product) = products.get(&sku) {
					line.components = product.components.clone();
					line.packing_notes = product.packing_notes.clone();
					line.related_items = product.related_items.clone();
				}
				if let Some(config) = configs.get(&sku) {
					line.instructions =
						Some(config.instructions.clone()).filter(|text| !text.is_empty());
					line.box_preset = config
						.box_preset_id
						.as_ref()
						.and_then(|id| presets.get(id))
						.cloned();
				}
				line
			})
			.collect();

		Ok(PackingView { order, lines })
	}
}
