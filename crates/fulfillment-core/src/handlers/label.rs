//! Label handler.
//!
//! Buying a label is a sequence of independent writes: the carrier purchase,
//! the Shipment record and the order status change. Nothing can undo a
//! purchased label, so a failure after the purchase is reported as a
//! partial failure and the shipment is flagged for reconciliation instead.

use crate::state::OrderStateMachine;
use fulfillment_carrier::{CarrierError, CarrierService, LabelRequest, PackageValidation};
use fulfillment_commerce::{CommerceService, TrackingPush};
use fulfillment_storage::{Sort, StorageError, StorageService};
use fulfillment_types::{
	truncate_id, Contact, Dimensions, Order, OrderSource, RecordMeta, SecretString, Shipment,
	ShipmentCategory, ShipmentStatus, ShippingAddress, ShippingSettings,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while creating or managing labels.
#[derive(Debug, Error)]
pub enum LabelError {
	/// Rejected before any carrier call.
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Forbidden: {0}")]
	Forbidden(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("No carrier is configured")]
	NotConfigured,
	#[error("Carrier error: {0}")]
	Carrier(CarrierError),
	/// The label was purchased but a later step failed.
	#[error("Label {tracking_number} was purchased but {message}")]
	PartialFailure {
		tracking_number: String,
		shipment_id: Option<String>,
		message: String,
	},
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for LabelError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => LabelError::NotFound(id),
			other => LabelError::Storage(other.to_string()),
		}
	}
}

impl From<CarrierError> for LabelError {
	fn from(err: CarrierError) -> Self {
		match err {
			CarrierError::InvalidRequest(message) => LabelError::Validation(message),
			other => LabelError::Carrier(other),
		}
	}
}

/// What the user asks for when buying or validating a label.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelDraft {
	/// When set, recipient and destination come from the order.
	#[serde(default)]
	pub order_id: Option<String>,
	#[serde(default)]
	pub recipient: Option<Contact>,
	#[serde(default)]
	pub destination: Option<ShippingAddress>,
	/// Defaults to the shipping settings' service type.
	#[serde(default)]
	pub service_type: Option<String>,
	pub weight: f64,
	#[serde(default)]
	pub dimensions: Dimensions,
	#[serde(default)]
	pub shipment_category: ShipmentCategory,
	#[serde(default)]
	pub category_notes: Option<String>,
	#[serde(default)]
	pub shipped_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelOutcome {
	pub shipment: Shipment,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub order: Option<Order>,
	/// How the tracking number reached the commerce platform, if it did.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tracking_push: Option<TrackingPush>,
}

struct PreparedLabel {
	request: LabelRequest,
	order: Option<Order>,
}

pub struct LabelHandler {
	storage: Arc<StorageService>,
	state_machine: Arc<OrderStateMachine>,
	carrier: Option<Arc<CarrierService>>,
	commerce: Option<Arc<CommerceService>>,
	delete_password: SecretString,
}

impl LabelHandler {
	pub fn new(
		storage: Arc<StorageService>,
		state_machine: Arc<OrderStateMachine>,
		carrier: Option<Arc<CarrierService>>,
		commerce: Option<Arc<CommerceService>>,
		delete_password: SecretString,
	) -> Self {
		Self {
			storage,
			state_machine,
			carrier,
			commerce,
			delete_password,
		}
	}

	fn carrier(&self) -> Result<&Arc<CarrierService>, LabelError> {
		self.carrier.as_ref().ok_or(LabelError::NotConfigured)
	}

	async fn shipping_settings(&self) -> Result<ShippingSettings, LabelError> {
		self.storage
			.list::<ShippingSettings>(None, Some(1))
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| LabelError::Validation("shipping settings are not configured".into()))
	}

	/// Runs every local check and assembles the carrier request.
	async fn prepare(&self, draft: &LabelDraft) -> Result<PreparedLabel, LabelError> {
		if !draft.weight.is_finite() || draft.weight <= 0.0 {
			return Err(LabelError::Validation("package weight must be positive".into()));
		}
		let settings = self.shipping_settings().await?;

		let order = match &draft.order_id {
			Some(order_id) => Some(self.storage.get::<Order>(order_id).await?),
			None => None,
		};
		let (recipient, destination) = match &order {
			Some(order) => (
				Contact {
					name: order.customer_name.clone(),
					company: None,
					phone: order.shipping_address.phone.clone().unwrap_or_default(),
					email: Some(order.customer_email.clone()).filter(|e| !e.is_empty()),
				},
				order.shipping_address.clone(),
			),
			None => match (&draft.recipient, &draft.destination) {
				(Some(recipient), Some(destination)) => (recipient.clone(), destination.clone()),
				_ => {
					return Err(LabelError::Validation(
						"a label without an order needs a recipient and destination".into(),
					))
				},
			},
		};
		if recipient.name.trim().is_empty() {
			return Err(LabelError::Validation("recipient name is required".into()));
		}

		let request = LabelRequest {
			shipper: settings.shipper,
			origin: settings.origin_address,
			recipient,
			destination,
			service_type: draft
				.service_type
				.clone()
				.filter(|s| !s.trim().is_empty())
				.unwrap_or(settings.default_service_type),
			weight: draft.weight,
			dimensions: draft.dimensions,
			label_format: settings.label_format,
			reference: order.as_ref().map(|o| o.order_number.clone()),
		};
		request.validate()?;
		Ok(PreparedLabel { request, order })
	}

	/// Buys a label, records the shipment and moves the order to
	/// `processing`.
	#[instrument(skip_all, fields(order_id = ?draft.order_id.as_deref().map(truncate_id)))]
	pub async fn create_label(&self, draft: LabelDraft) -> Result<LabelOutcome, LabelError> {
		let carrier = self.carrier()?.clone();
		let PreparedLabel { request, order } = self.prepare(&draft).await?;

		let label = carrier.purchase_label(&request).await?;

		let shipment = Shipment {
			meta: RecordMeta::default(),
			order_id: order.as_ref().map(|o| o.meta.id.clone()),
			order_number: order.as_ref().map(|o| o.order_number.clone()),
			tracking_number: label.tracking_number.clone(),
			carrier: carrier.carrier(),
			service_type: label.service_type.clone(),
			status: ShipmentStatus::LabelCreated,
			ship_date: self.storage.clock().now().date_naive(),
			weight: request.weight,
			dimensions: request.dimensions,
			label_url: label.label_url.clone(),
			destination_address: request.destination.clone(),
			shipping_cost: label.shipping_cost,
			shipment_category: draft.shipment_category,
			category_notes: draft.category_notes.clone(),
			shipped_by: draft.shipped_by.clone(),
			needs_reconciliation: false,
		};
		let mut shipment = match self.storage.create(shipment).await {
			Ok(shipment) => shipment,
			Err(e) => {
				tracing::error!(
					component = "labels",
					tracking_number = %label.tracking_number,
					error = %e,
					"Label purchased but shipment record was not saved"
				);
				return Err(LabelError::PartialFailure {
					tracking_number: label.tracking_number,
					shipment_id: None,
					message: format!("the shipment record could not be saved: {}", e),
				});
			},
		};

		let Some(order) = order else {
			return Ok(LabelOutcome {
				shipment,
				order: None,
				tracking_push: None,
			});
		};

		let order = match self.state_machine.mark_label_created(&order.meta.id).await {
			Ok(order) => order,
			Err(e) => {
				shipment.needs_reconciliation = true;
				if let Err(put_err) = self.storage.put(&shipment).await {
					tracing::error!(
						component = "labels",
						shipment_id = %truncate_id(&shipment.meta.id),
						error = %put_err,
						"Could not flag shipment for reconciliation"
					);
				}
				tracing::error!(
					component = "labels",
					order_id = %truncate_id(&order.meta.id),
					tracking_number = %shipment.tracking_number,
					error = %e,
					"Label purchased but order status was not updated"
				);
				return Err(LabelError::PartialFailure {
					tracking_number: shipment.tracking_number,
					shipment_id: Some(shipment.meta.id),
					message: format!("the order could not be moved to processing: {}", e),
				});
			},
		};

		let tracking_push = self.push_tracking(&order, &shipment).await;
		tracing::info!(
			component = "labels",
			order_id = %truncate_id(&order.meta.id),
			tracking_number = %shipment.tracking_number,
			"Label created"
		);
		Ok(LabelOutcome {
			shipment,
			order: Some(order),
			tracking_push,
		})
	}

	/// Best effort: failures are logged and never fail the label.
	async fn push_tracking(&self, order: &Order, shipment: &Shipment) -> Option<TrackingPush> {
		if order.source != OrderSource::Magento {
			return None;
		}
		let commerce = self.commerce.as_ref()?;
		let external_id = order.external_id.as_deref()?;
		match commerce
			.push_tracking(external_id, &shipment.tracking_number, shipment.carrier.as_str())
			.await
		{
			Ok(push) => Some(push),
			Err(e) => {
				tracing::warn!(
					component = "labels",
					order_id = %truncate_id(&order.meta.id),
					error = %e,
					"Tracking push-back failed"
				);
				None
			},
		}
	}

	/// Asks the carrier whether the package would be accepted. Buys nothing.
	pub async fn validate_package(&self, draft: LabelDraft) -> Result<PackageValidation, LabelError> {
		let carrier = self.carrier()?.clone();
		let prepared = self.prepare(&draft).await?;
		Ok(carrier.validate_package(&prepared.request).await?)
	}

	/// Newest shipments first.
	pub async fn list_shipments(&self, limit: Option<usize>) -> Result<Vec<Shipment>, LabelError> {
		Ok(self
			.storage
			.list(Some(&Sort::desc("created_date")), limit)
			.await?)
	}

	/// Deletes a shipment record after checking the delete password. The
	/// carrier label itself is not voided.
	#[instrument(skip_all, fields(shipment_id = %truncate_id(shipment_id)))]
	pub async fn delete_shipment(&self, shipment_id: &str, password: &str) -> Result<(), LabelError> {
		if !self.delete_password.matches(password) {
			tracing::warn!(component = "labels", "Rejected shipment delete with wrong password");
			return Err(LabelError::Forbidden("incorrect delete password".into()));
		}
		self.storage.delete::<Shipment>(shipment_id).await?;
		tracing::info!(component = "labels", "Deleted shipment");
		Ok(())
	}
}
