//! Carrier integration for the fulfillment service.
//!
//! This module abstracts over shipping carriers: purchasing a label for a
//! package and asking the carrier whether a package would be accepted.
//! Implementations talk to the carrier's API; the rest of the system only
//! sees [`CarrierService`].

use async_trait::async_trait;
use fulfillment_types::{
	Carrier, ConfigSchema, Contact, Dimensions, ImplementationRegistry, ShippingAddress,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod fedex;
}

/// Errors that can occur while talking to a carrier.
#[derive(Debug, Error)]
pub enum CarrierError {
	/// The request never produced an HTTP response.
	#[error("Network error: {0}")]
	Network(String),
	/// The carrier answered with a non-success status.
	#[error("Carrier returned {status}: {message}")]
	Upstream { status: u16, message: String },
	/// The carrier answered 2xx but the body was not understood.
	#[error("Unexpected carrier response: {0}")]
	InvalidResponse(String),
	/// The request was rejected locally before any call was made.
	#[error("Invalid label request: {0}")]
	InvalidRequest(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Everything needed to rate and purchase a single-package label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRequest {
	pub shipper: Contact,
	pub origin: ShippingAddress,
	pub recipient: Contact,
	pub destination: ShippingAddress,
	pub service_type: String,
	/// Package weight in pounds.
	pub weight: f64,
	#[serde(default)]
	pub dimensions: Dimensions,
	#[serde(default = "default_label_format")]
	pub label_format: String,
	/// Printed on the label; usually the order number.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reference: Option<String>,
}

fn default_label_format() -> String {
	"PDF".to_string()
}

impl LabelRequest {
	/// Checks done before any carrier call.
	pub fn validate(&self) -> Result<(), CarrierError> {
		if self.weight.is_nan() || self.weight <= 0.0 {
			return Err(CarrierError::InvalidRequest(
				"package weight must be positive".into(),
			));
		}
		let dims = self.dimensions;
		if dims.length < 0.0 || dims.width < 0.0 || dims.height < 0.0 {
			return Err(CarrierError::InvalidRequest(
				"package dimensions cannot be negative".into(),
			));
		}
		if self.service_type.trim().is_empty() {
			return Err(CarrierError::InvalidRequest("service type is required".into()));
		}
		if self.destination.zip.trim().is_empty() || self.destination.country.trim().is_empty() {
			return Err(CarrierError::InvalidRequest(
				"destination needs a postal code and country".into(),
			));
		}
		Ok(())
	}
}

/// A label the carrier has issued and will bill for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedLabel {
	pub tracking_number: String,
	pub label_url: String,
	pub service_type: String,
	pub shipping_cost: Option<Decimal>,
}

/// Carrier verdict on a package, without purchasing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageValidation {
	pub valid: bool,
	#[serde(default)]
	pub messages: Vec<String>,
}

/// Trait implemented by every carrier integration.
#[async_trait]
pub trait CarrierInterface: Send + Sync {
	/// Which carrier this implementation books with.
	fn carrier(&self) -> Carrier;

	/// Returns the configuration schema for this carrier implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Buys a label. Every successful call costs money; callers never retry.
	async fn purchase_label(&self, request: &LabelRequest) -> Result<PurchasedLabel, CarrierError>;

	/// Asks the carrier whether the package would be accepted.
	async fn validate_package(
		&self,
		request: &LabelRequest,
	) -> Result<PackageValidation, CarrierError>;
}

/// Type alias for carrier factory functions.
pub type CarrierFactory = fn(&toml::Value) -> Result<Box<dyn CarrierInterface>, CarrierError>;

/// Registry trait for carrier implementations.
pub trait CarrierRegistry: ImplementationRegistry<Factory = CarrierFactory> {}

/// Get all registered carrier implementations.
pub fn get_all_implementations() -> Vec<(&'static str, CarrierFactory)> {
	use implementations::fedex;

	vec![(fedex::Registry::NAME, fedex::Registry::factory())]
}

/// Front for the configured carrier.
pub struct CarrierService {
	implementation: Box<dyn CarrierInterface>,
}

impl CarrierService {
	pub fn new(implementation: Box<dyn CarrierInterface>) -> Self {
		Self { implementation }
	}

	pub fn carrier(&self) -> Carrier {
		self.implementation.carrier()
	}

	/// Validates the request locally, then purchases the label.
	pub async fn purchase_label(
		&self,
		request: &LabelRequest,
	) -> Result<PurchasedLabel, CarrierError> {
		request.validate()?;
		let label = self.implementation.purchase_label(request).await?;
		tracing::info!(
			component = "carrier",
			carrier = %self.carrier(),
			tracking_number = %label.tracking_number,
			"Purchased label"
		);
		Ok(label)
	}

	pub async fn validate_package(
		&self,
		request: &LabelRequest,
	) -> Result<PackageValidation, CarrierError> {
		request.validate()?;
		self.implementation.validate_package(request).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::ValidationError;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	struct CountingCarrier {
		calls: Arc<AtomicUsize>,
	}

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	#[async_trait]
	impl CarrierInterface for CountingCarrier {
		fn carrier(&self) -> Carrier {
			Carrier::Fedex
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn purchase_label(
			&self,
			request: &LabelRequest,
		) -> Result<PurchasedLabel, CarrierError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(PurchasedLabel {
				tracking_number: "794600000000".into(),
				label_url: "https://labels.example/1.pdf".into(),
				service_type: request.service_type.clone(),
				shipping_cost: None,
			})
		}

		async fn validate_package(
			&self,
			_request: &LabelRequest,
		) -> Result<PackageValidation, CarrierError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(PackageValidation {
				valid: true,
				messages: vec![],
			})
		}
	}

	pub(crate) fn request(weight: f64) -> LabelRequest {
		LabelRequest {
			shipper: Contact {
				name: "Shipping Desk".into(),
				company: Some("Acme Workshop".into()),
				phone: "5555550100".into(),
				email: None,
			},
			origin: ShippingAddress {
				street1: "10 Factory Rd".into(),
				city: "Memphis".into(),
				state: "TN".into(),
				zip: "38118".into(),
				country: "US".into(),
				..Default::default()
			},
			recipient: Contact {
				name: "Ada Lovelace".into(),
				phone: "5555550199".into(),
				..Default::default()
			},
			destination: ShippingAddress {
				street1: "1 Main St".into(),
				city: "Toronto".into(),
				state: "ON".into(),
				zip: "M5V 2T6".into(),
				country: "CA".into(),
				..Default::default()
			},
			service_type: "FEDEX_GROUND".into(),
			weight,
			dimensions: Dimensions {
				length: 12.0,
				width: 8.0,
				height: 4.0,
			},
			label_format: "PDF".into(),
			reference: Some("1001".into()),
		}
	}

	#[tokio::test]
	async fn test_invalid_request_makes_no_call() {
		let calls = Arc::new(AtomicUsize::new(0));
		let service = CarrierService::new(Box::new(CountingCarrier {
			calls: calls.clone(),
		}));

		let result = service.purchase_label(&request(0.0)).await;
		assert!(matches!(result, Err(CarrierError::InvalidRequest(_))));
		let result = service.validate_package(&request(-1.0)).await;
		assert!(matches!(result, Err(CarrierError::InvalidRequest(_))));
		assert_eq!(calls.load(Ordering::SeqCst), 0);

		let label = service.purchase_label(&request(2.5)).await.unwrap();
		assert_eq!(label.service_type, "FEDEX_GROUND");
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_nan_weight_is_rejected() {
		assert!(request(f64::NAN).validate().is_err());
	}
}
