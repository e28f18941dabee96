//! FedEx carrier implementation.
//!
//! Uses the FedEx REST APIs: an OAuth2 client-credentials token from
//! `/oauth/token`, label purchase via `/ship/v1/shipments` and package
//! validation via `/ship/v1/shipments/packages/validate`. Request bodies are
//! built and responses parsed by free functions so they can be tested
//! without a network.

use crate::{
	CarrierError, CarrierFactory, CarrierInterface, CarrierRegistry, LabelRequest,
	PackageValidation, PurchasedLabel,
};
use async_trait::async_trait;
use fulfillment_types::{
	Carrier, ConfigSchema, Contact, Field, FieldType, ImplementationRegistry, Schema,
	SecretString, ShippingAddress, ValidationError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
/// Tokens are refreshed this long before FedEx says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
	token: SecretString,
	expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default = "default_expires_in")]
	expires_in: u64,
}

fn default_expires_in() -> u64 {
	3600
}

/// When a token fetched at `now` with the given lifetime should be
/// refreshed. Lifetimes past what `Instant` can represent fall back to the
/// default lifetime.
fn token_expiry(now: Instant, expires_in: u64) -> Instant {
	let refresh_after = |secs: u64| {
		now.checked_add(Duration::from_secs(secs).saturating_sub(TOKEN_EXPIRY_MARGIN))
	};
	refresh_after(expires_in)
		.or_else(|| refresh_after(default_expires_in()))
		.unwrap_or(now)
}

/// FedEx REST client.
pub struct FedexCarrier {
	client: reqwest::Client,
	api_url: String,
	client_id: String,
	client_secret: SecretString,
	account_number: String,
	token: Mutex<Option<CachedToken>>,
}

impl FedexCarrier {
	pub fn new(
		api_url: String,
		client_id: String,
		client_secret: SecretString,
		account_number: String,
		timeout: Duration,
	) -> Result<Self, CarrierError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| CarrierError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			api_url: api_url.trim_end_matches('/').to_string(),
			client_id,
			client_secret,
			account_number,
			token: Mutex::new(None),
		})
	}

	/// Returns a cached bearer token, fetching a new one when absent or
	/// about to expire.
	async fn access_token(&self) -> Result<SecretString, CarrierError> {
		let mut cached = self.token.lock().await;
		if let Some(token) = cached.as_ref() {
			if Instant::now() < token.expires_at {
				return Ok(token.token.clone());
			}
		}

		let response = self
			.client
			.post(format!("{}/oauth/token", self.api_url))
			.form(&[
				("grant_type", "client_credentials"),
				("client_id", self.client_id.as_str()),
				("client_secret", self.client_secret.expose_secret()),
			])
			.send()
			.await
			.map_err(|e| CarrierError::Network(e.to_string()))?;

		let status = response.status();
		let body = response
			.text()
			.await
			.map_err(|e| CarrierError::Network(e.to_string()))?;
		if !status.is_success() {
			return Err(parse_error(status.as_u16(), &body));
		}

		let parsed: TokenResponse = serde_json::from_str(&body)
			.map_err(|e| CarrierError::InvalidResponse(format!("token response: {}", e)))?;
		let token = SecretString::from(parsed.access_token);
		*cached = Some(CachedToken {
			token: token.clone(),
			expires_at: token_expiry(Instant::now(), parsed.expires_in),
		});
		tracing::debug!(component = "carrier", "Refreshed FedEx access token");
		Ok(token)
	}

	/// POSTs a JSON body with the bearer token and returns the status and
	/// raw body text.
	async fn post_json(&self, path: &str, body: &Value) -> Result<(u16, String), CarrierError> {
		let token = self.access_token().await?;
		let response = self
			.client
			.post(format!("{}{}", self.api_url, path))
			.bearer_auth(token.expose_secret())
			.header("X-locale", "en_US")
			.json(body)
			.send()
			.await
			.map_err(|e| CarrierError::Network(e.to_string()))?;

		let status = response.status().as_u16();
		let text = response
			.text()
			.await
			.map_err(|e| CarrierError::Network(e.to_string()))?;
		Ok((status, text))
	}
}

#[async_trait]
impl CarrierInterface for FedexCarrier {
	fn carrier(&self) -> Carrier {
		Carrier::Fedex
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FedexSchema)
	}

	async fn purchase_label(&self, request: &LabelRequest) -> Result<PurchasedLabel, CarrierError> {
		let body = build_shipment_body(&self.account_number, request);
		let (status, text) = self.post_json("/ship/v1/shipments", &body).await?;
		if !(200..300).contains(&status) {
			return Err(parse_error(status, &text));
		}
		let value: Value = serde_json::from_str(&text)
			.map_err(|e| CarrierError::InvalidResponse(e.to_string()))?;
		parse_label_response(&value, &request.service_type)
	}

	async fn validate_package(
		&self,
		request: &LabelRequest,
	) -> Result<PackageValidation, CarrierError> {
		let body = build_shipment_body(&self.account_number, request);
		let (status, text) = self
			.post_json("/ship/v1/shipments/packages/validate", &body)
			.await?;
		let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
		match status {
			200..=299 => Ok(PackageValidation {
				valid: true,
				messages: alert_messages(&value),
			}),
			// FedEx reports an unacceptable package as a client error.
			400 | 422 => Ok(PackageValidation {
				valid: false,
				messages: error_messages(&value),
			}),
			_ => Err(parse_error(status, &text)),
		}
	}
}

fn contact_json(contact: &Contact) -> Value {
	let mut value = json!({
		"personName": contact.name,
		"phoneNumber": contact.phone,
	});
	if let Some(company) = &contact.company {
		value["companyName"] = json!(company);
	}
	if let Some(email) = &contact.email {
		value["emailAddress"] = json!(email);
	}
	value
}

fn address_json(address: &ShippingAddress) -> Value {
	let mut street_lines = vec![address.street1.clone()];
	if let Some(street2) = address.street2.as_ref().filter(|s| !s.trim().is_empty()) {
		street_lines.push(street2.clone());
	}
	json!({
		"streetLines": street_lines,
		"city": address.city,
		"stateOrProvinceCode": address.state,
		"postalCode": address.zip,
		"countryCode": address.country.trim().to_uppercase(),
	})
}

/// Builds the shipment request body shared by purchase and validation.
pub fn build_shipment_body(account_number: &str, request: &LabelRequest) -> Value {
	let mut package = json!({
		"weight": { "units": "LB", "value": request.weight },
	});
	let dims = request.dimensions;
	if dims.length > 0.0 && dims.width > 0.0 && dims.height > 0.0 {
		package["dimensions"] = json!({
			"length": dims.length.ceil() as u64,
			"width": dims.width.ceil() as u64,
			"height": dims.height.ceil() as u64,
			"units": "IN",
		});
	}
	if let Some(reference) = &request.reference {
		package["customerReferences"] = json!([
			{ "customerReferenceType": "CUSTOMER_REFERENCE", "value": reference }
		]);
	}

	json!({
		"labelResponseOptions": "URL_ONLY",
		"accountNumber": { "value": account_number },
		"requestedShipment": {
			"shipper": {
				"contact": contact_json(&request.shipper),
				"address": address_json(&request.origin),
			},
			"recipients": [{
				"contact": contact_json(&request.recipient),
				"address": address_json(&request.destination),
			}],
			"serviceType": request.service_type,
			"packagingType": "YOUR_PACKAGING",
			"pickupType": "USE_SCHEDULED_PICKUP",
			"shippingChargesPayment": { "paymentType": "SENDER" },
			"labelSpecification": {
				"imageType": request.label_format,
				"labelStockType": "PAPER_4X6",
			},
			"requestedPackageLineItems": [package],
		},
	})
}

/// Extracts tracking number, label URL and net charge from a successful
/// shipment response.
pub fn parse_label_response(
	value: &Value,
	requested_service: &str,
) -> Result<PurchasedLabel, CarrierError> {
	let shipment = value
		.pointer("/output/transactionShipments/0")
		.ok_or_else(|| CarrierError::InvalidResponse("no transaction shipment".into()))?;
	let piece = shipment.pointer("/pieceResponses/0");

	let tracking_number = shipment
		.get("masterTrackingNumber")
		.and_then(Value::as_str)
		.or_else(|| piece.and_then(|p| p.get("trackingNumber")).and_then(Value::as_str))
		.ok_or_else(|| CarrierError::InvalidResponse("no tracking number".into()))?
		.to_string();

	let label_url = piece
		.and_then(|p| p.pointer("/packageDocuments/0/url"))
		.or_else(|| shipment.pointer("/shipmentDocuments/0/url"))
		.and_then(Value::as_str)
		.ok_or_else(|| CarrierError::InvalidResponse("no label document url".into()))?
		.to_string();

	let shipping_cost = shipment
		.pointer("/completedShipmentDetail/shipmentRating/shipmentRateDetails/0/totalNetCharge")
		.and_then(|charge| match charge {
			Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
			Value::String(s) => s.parse::<Decimal>().ok(),
			_ => None,
		});

	let service_type = shipment
		.get("serviceType")
		.and_then(Value::as_str)
		.unwrap_or(requested_service)
		.to_string();

	Ok(PurchasedLabel {
		tracking_number,
		label_url,
		service_type,
		shipping_cost,
	})
}

fn error_messages(value: &Value) -> Vec<String> {
	value
		.get("errors")
		.and_then(Value::as_array)
		.map(|errors| {
			errors
				.iter()
				.filter_map(|e| {
					let message = e.get("message").and_then(Value::as_str)?;
					Some(match e.get("code").and_then(Value::as_str) {
						Some(code) => format!("{}: {}", code, message),
						None => message.to_string(),
					})
				})
				.collect()
		})
		.unwrap_or_default()
}

fn alert_messages(value: &Value) -> Vec<String> {
	value
		.pointer("/output/alerts")
		.and_then(Value::as_array)
		.map(|alerts| {
			alerts
				.iter()
				.filter_map(|a| a.get("message").and_then(Value::as_str).map(str::to_string))
				.collect()
		})
		.unwrap_or_default()
}

/// Turns a non-success response into an `Upstream` error carrying the
/// FedEx error messages, or the raw body when it has none.
pub fn parse_error(status: u16, body: &str) -> CarrierError {
	let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
	let messages = error_messages(&value);
	let message = if messages.is_empty() {
		body.chars().take(500).collect()
	} else {
		messages.join("; ")
	};
	CarrierError::Upstream { status, message }
}

/// Configuration schema for the FedEx carrier.
pub struct FedexSchema;

impl ConfigSchema for FedexSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let non_empty = |v: &toml::Value| match v.as_str() {
			Some(s) if !s.trim().is_empty() => Ok(()),
			_ => Err("must not be empty".to_string()),
		};
		let schema = Schema::new(
			vec![
				Field::new("api_url", FieldType::Url),
				Field::new("client_id", FieldType::String).with_validator(non_empty),
				Field::new("client_secret", FieldType::String).with_validator(non_empty),
				Field::new("account_number", FieldType::String).with_validator(non_empty),
			],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(120),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create the FedEx carrier from configuration.
///
/// Configuration parameters:
/// - `api_url`: FedEx API base, e.g. "https://apis-sandbox.fedex.com"
/// - `client_id` / `client_secret`: API project credentials
/// - `account_number`: shipper account billed for labels
/// - `timeout_seconds`: request timeout (default: 30)
pub fn create_carrier(config: &toml::Value) -> Result<Box<dyn CarrierInterface>, CarrierError> {
	FedexSchema
		.validate(config)
		.map_err(|e| CarrierError::Configuration(e.to_string()))?;

	let get = |key: &str| {
		config
			.get(key)
			.and_then(|v| v.as_str())
			.map(str::to_string)
			.ok_or_else(|| CarrierError::Configuration(format!("{} is required", key)))
	};
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(FedexCarrier::new(
		get("api_url")?,
		get("client_id")?,
		SecretString::from(get("client_secret")?),
		get("account_number")?,
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the FedEx carrier implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "fedex";
	type Factory = CarrierFactory;

	fn factory() -> Self::Factory {
		create_carrier
	}
}

impl CarrierRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::request;

	#[test]
	fn test_token_expiry_handles_extreme_lifetimes() {
		let now = Instant::now();
		assert_eq!(token_expiry(now, 3600), now + Duration::from_secs(3540));
		assert_eq!(token_expiry(now, 10), now);
		assert_eq!(token_expiry(now, u64::MAX), now + Duration::from_secs(3540));
	}

	#[test]
	fn test_build_shipment_body() {
		let body = build_shipment_body("510087000", &request(2.5));

		assert_eq!(body["accountNumber"]["value"], "510087000");
		let shipment = &body["requestedShipment"];
		assert_eq!(shipment["serviceType"], "FEDEX_GROUND");
		assert_eq!(shipment["shipper"]["contact"]["companyName"], "Acme Workshop");
		assert_eq!(shipment["recipients"][0]["address"]["countryCode"], "CA");
		assert_eq!(shipment["recipients"][0]["address"]["streetLines"].as_array().unwrap().len(), 1);

		let package = &shipment["requestedPackageLineItems"][0];
		assert_eq!(package["weight"]["value"], 2.5);
		assert_eq!(package["dimensions"]["length"], 12);
		assert_eq!(package["customerReferences"][0]["value"], "1001");
	}

	#[test]
	fn test_zero_dimensions_are_omitted() {
		let mut req = request(1.0);
		req.dimensions = Default::default();
		let body = build_shipment_body("1", &req);
		assert!(body["requestedShipment"]["requestedPackageLineItems"][0]
			.get("dimensions")
			.is_none());
	}

	#[test]
	fn test_parse_label_response() {
		let response = json!({
			"output": {
				"transactionShipments": [{
					"masterTrackingNumber": "794698765432",
					"serviceType": "FEDEX_GROUND",
					"pieceResponses": [{
						"trackingNumber": "794698765432",
						"packageDocuments": [{ "url": "https://wwwtest.fedex.com/label/1" }]
					}],
					"completedShipmentDetail": {
						"shipmentRating": {
							"shipmentRateDetails": [{ "totalNetCharge": 18.42 }]
						}
					}
				}]
			}
		});
		let label = parse_label_response(&response, "FEDEX_2_DAY").unwrap();
		assert_eq!(label.tracking_number, "794698765432");
		assert_eq!(label.label_url, "https://wwwtest.fedex.com/label/1");
		assert_eq!(label.service_type, "FEDEX_GROUND");
		assert_eq!(label.shipping_cost, Some(Decimal::new(1842, 2)));
	}

	#[test]
	fn test_parse_label_response_without_documents_fails() {
		let response = json!({
			"output": { "transactionShipments": [{ "masterTrackingNumber": "1" }] }
		});
		assert!(matches!(
			parse_label_response(&response, "FEDEX_GROUND"),
			Err(CarrierError::InvalidResponse(_))
		));
	}

	#[test]
	fn test_parse_error_prefers_fedex_messages() {
		let body = r#"{"transactionId":"x","errors":[{"code":"ACCOUNT.NUMBER.MISMATCH","message":"Account mismatch"}]}"#;
		match parse_error(403, body) {
			CarrierError::Upstream { status, message } => {
				assert_eq!(status, 403);
				assert_eq!(message, "ACCOUNT.NUMBER.MISMATCH: Account mismatch");
			},
			other => panic!("unexpected error: {:?}", other),
		}

		match parse_error(502, "Bad Gateway") {
			CarrierError::Upstream { message, .. } => assert_eq!(message, "Bad Gateway"),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn test_config_validation() {
		let valid: toml::Value = toml::from_str(
			r#"
api_url = "https://apis-sandbox.fedex.com"
client_id = "id"
client_secret = "secret"
account_number = "510087000"
"#,
		)
		.unwrap();
		assert!(create_carrier(&valid).is_ok());

		let missing: toml::Value = toml::from_str(r#"api_url = "https://apis-sandbox.fedex.com""#).unwrap();
		assert!(matches!(
			create_carrier(&missing),
			Err(CarrierError::Configuration(_))
		));
	}
}
