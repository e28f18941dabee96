//! Magento 2 REST implementation.
//!
//! Talks to `/rest/V1` with an integration access token. Orders are
//! searched by status, products are paged with `searchCriteria`, and
//! push-back goes through order comments and the order extension
//! attributes.

use crate::{
	CommerceError, CommerceFactory, CommerceInterface, CommerceRegistry, ImportedOrder,
	ProductPage, RemoteProduct, TrackingPush,
};
use async_trait::async_trait;
use fulfillment_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, LineItem, ProductStatus, Schema,
	SecretString, ShippingAddress, ValidationError,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_IMPORT_STATUS: &str = "processing";
const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Magento REST client.
pub struct MagentoCommerce {
	client: reqwest::Client,
	base_url: String,
	access_token: SecretString,
	import_status: String,
	page_size: usize,
}

impl MagentoCommerce {
	pub fn new(
		base_url: String,
		access_token: SecretString,
		import_status: String,
		page_size: usize,
		timeout: Duration,
	) -> Result<Self, CommerceError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| CommerceError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
			access_token,
			import_status,
			page_size,
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}/rest/V1{}", self.base_url, path)
	}

	async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, CommerceError> {
		let response = request
			.bearer_auth(self.access_token.expose_secret())
			.send()
			.await
			.map_err(|e| CommerceError::Network(e.to_string()))?;

		let status = response.status();
		let text = response
			.text()
			.await
			.map_err(|e| CommerceError::Network(e.to_string()))?;
		if !status.is_success() {
			return Err(CommerceError::Upstream {
				status: status.as_u16(),
				message: error_message(&text),
			});
		}
		if text.trim().is_empty() {
			return Ok(Value::Null);
		}
		serde_json::from_str(&text).map_err(|e| CommerceError::InvalidResponse(e.to_string()))
	}

	async fn post_comment(&self, external_id: &str, comment: String, status: Option<&str>) -> Result<(), CommerceError> {
		let mut history = json!({
			"comment": comment,
			"is_customer_notified": 0,
			"is_visible_on_front": 0,
		});
		if let Some(status) = status {
			history["status"] = json!(status);
		}
		self.send(
			self.client
				.post(self.url(&format!("/orders/{}/comments", external_id)))
				.json(&json!({ "statusHistory": history })),
		)
		.await?;
		Ok(())
	}
}

#[async_trait]
impl CommerceInterface for MagentoCommerce {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MagentoSchema)
	}

	async fn fetch_orders(&self) -> Result<Vec<ImportedOrder>, CommerceError> {
		let value = self
			.send(
				self.client
					.get(self.url("/orders"))
					.query(&order_search_query(&self.import_status, self.page_size)),
			)
			.await?;
		parse_orders(&value)
	}

	async fn fetch_products(&self, page: usize) -> Result<ProductPage, CommerceError> {
		let value = self
			.send(
				self.client
					.get(self.url("/products"))
					.query(&product_page_query(page, self.page_size)),
			)
			.await?;
		parse_product_page(&value)
	}

	async fn push_status(&self, external_id: &str, status: &str) -> Result<(), CommerceError> {
		self.post_comment(
			external_id,
			format!("Fulfillment status changed to {}", status),
			Some(status),
		)
		.await
	}

	async fn push_tracking(
		&self,
		external_id: &str,
		tracking_number: &str,
		carrier: &str,
	) -> Result<TrackingPush, CommerceError> {
		let body = tracking_attribute_body(external_id, tracking_number, carrier);
		match self
			.send(self.client.post(self.url("/orders")).json(&body))
			.await
		{
			Ok(_) => Ok(TrackingPush::ExtensionAttribute),
			Err(e) => {
				tracing::warn!(
					component = "commerce",
					external_id = %external_id,
					error = %e,
					"Tracking attribute update refused, falling back to order comment"
				);
				self.post_comment(
					external_id,
					format!("Tracking number: {} ({})", tracking_number, carrier),
					None,
				)
				.await?;
				Ok(TrackingPush::Comment)
			},
		}
	}
}

/// Query string selecting orders in `status`, newest first.
pub fn order_search_query(status: &str, page_size: usize) -> Vec<(String, String)> {
	let filter = "searchCriteria[filter_groups][0][filters][0]";
	vec![
		(format!("{}[field]", filter), "status".to_string()),
		(format!("{}[value]", filter), status.to_string()),
		(format!("{}[condition_type]", filter), "eq".to_string()),
		("searchCriteria[sortOrders][0][field]".to_string(), "created_at".to_string()),
		("searchCriteria[sortOrders][0][direction]".to_string(), "DESC".to_string()),
		("searchCriteria[pageSize]".to_string(), page_size.to_string()),
	]
}

pub fn product_page_query(page: usize, page_size: usize) -> Vec<(String, String)> {
	vec![
		("searchCriteria[pageSize]".to_string(), page_size.to_string()),
		("searchCriteria[currentPage]".to_string(), page.to_string()),
	]
}

/// Body setting the tracking extension attributes on an order.
pub fn tracking_attribute_body(external_id: &str, tracking_number: &str, carrier: &str) -> Value {
	let entity_id = external_id
		.parse::<i64>()
		.map(Value::from)
		.unwrap_or_else(|_| Value::from(external_id));
	json!({
		"entity": {
			"entity_id": entity_id,
			"extension_attributes": {
				"tracking_number": tracking_number,
				"carrier_code": carrier,
			}
		}
	})
}

fn error_message(body: &str) -> String {
	serde_json::from_str::<Value>(body)
		.ok()
		.and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
		.unwrap_or_else(|| body.chars().take(500).collect())
}

fn text(value: &Value, key: &str) -> String {
	value
		.get(key)
		.and_then(Value::as_str)
		.unwrap_or_default()
		.trim()
		.to_string()
}

fn decimal(value: Option<&Value>) -> Option<Decimal> {
	match value? {
		Value::Number(n) => n.to_string().parse().ok(),
		Value::String(s) => s.parse().ok(),
		_ => None,
	}
}

fn id_string(value: Option<&Value>) -> Option<String> {
	match value? {
		Value::Number(n) => Some(n.to_string()),
		Value::String(s) if !s.is_empty() => Some(s.clone()),
		_ => None,
	}
}

fn parse_address(value: &Value) -> ShippingAddress {
	let street: Vec<String> = match value.get("street") {
		Some(Value::Array(lines)) => lines
			.iter()
			.filter_map(Value::as_str)
			.map(str::to_string)
			.collect(),
		Some(Value::String(line)) => vec![line.clone()],
		_ => vec![],
	};
	let state = match text(value, "region_code") {
		code if !code.is_empty() => code,
		_ => text(value, "region"),
	};
	let phone = text(value, "telephone");

	ShippingAddress {
		street1: street.first().cloned().unwrap_or_default(),
		street2: street.get(1).cloned().filter(|s| !s.trim().is_empty()),
		city: text(value, "city"),
		state,
		zip: text(value, "postcode"),
		country: text(value, "country_id"),
		phone: (!phone.is_empty()).then_some(phone),
	}
}

/// Converts one Magento order into an import candidate.
///
/// Child lines of configurable products (those with a `parent_item_id`) are
/// skipped so each ordered unit appears once.
pub fn parse_order(value: &Value) -> Result<ImportedOrder, CommerceError> {
	let external_id = id_string(value.get("entity_id"))
		.ok_or_else(|| CommerceError::InvalidResponse("order without entity_id".into()))?;
	let order_number = text(value, "increment_id");
	if order_number.is_empty() {
		return Err(CommerceError::InvalidResponse(format!(
			"order {} has no increment_id",
			external_id
		)));
	}

	let shipping = value
		.pointer("/extension_attributes/shipping_assignments/0/shipping/address")
		.or_else(|| value.get("billing_address"))
		.cloned()
		.unwrap_or(Value::Null);

	let mut customer_name = format!(
		"{} {}",
		text(value, "customer_firstname"),
		text(value, "customer_lastname")
	)
	.trim()
	.to_string();
	if customer_name.is_empty() {
		customer_name = format!("{} {}", text(&shipping, "firstname"), text(&shipping, "lastname"))
			.trim()
			.to_string();
	}

	let items = value
		.get("items")
		.and_then(Value::as_array)
		.map(|items| {
			items
				.iter()
				.filter(|item| item.get("parent_item_id").map_or(true, Value::is_null))
				.map(|item| LineItem {
					sku: text(item, "sku"),
					name: text(item, "name"),
					quantity: item
						.get("qty_ordered")
						.and_then(Value::as_f64)
						.map(|q| q.round().max(0.0) as u32)
						.unwrap_or(0),
					weight: item.get("weight").and_then(Value::as_f64).unwrap_or(0.0),
					options: item
						.pointer("/product_option/extension_attributes")
						.cloned(),
				})
				.collect()
		})
		.unwrap_or_default();

	Ok(ImportedOrder {
		external_id,
		order_number,
		customer_name,
		customer_email: text(value, "customer_email"),
		shipping_address: parse_address(&shipping),
		items,
		order_value: decimal(value.get("grand_total")).unwrap_or_default(),
	})
}

/// Parses an order search result. Orders that cannot be read are logged
/// and left out.
pub fn parse_orders(value: &Value) -> Result<Vec<ImportedOrder>, CommerceError> {
	let items = value
		.get("items")
		.and_then(Value::as_array)
		.ok_or_else(|| CommerceError::InvalidResponse("order search without items".into()))?;

	Ok(items
		.iter()
		.filter_map(|item| match parse_order(item) {
			Ok(order) => Some(order),
			Err(e) => {
				tracing::warn!(component = "commerce", error = %e, "Skipping unreadable order");
				None
			},
		})
		.collect())
}

pub fn parse_product(value: &Value) -> Result<RemoteProduct, CommerceError> {
	let remote_id = value
		.get("id")
		.and_then(Value::as_i64)
		.ok_or_else(|| CommerceError::InvalidResponse("product without id".into()))?;
	let sku = text(value, "sku");
	if sku.is_empty() {
		return Err(CommerceError::InvalidResponse(format!(
			"product {} has no sku",
			remote_id
		)));
	}
	// Magento uses 1 for enabled and 2 for disabled.
	let status = match value.get("status").and_then(Value::as_i64) {
		Some(2) => ProductStatus::Disabled,
		_ => ProductStatus::Enabled,
	};

	Ok(RemoteProduct {
		remote_id,
		sku,
		name: text(value, "name"),
		price: decimal(value.get("price")).unwrap_or_default(),
		weight: value.get("weight").and_then(Value::as_f64).unwrap_or(0.0),
		status,
		stock_quantity: value
			.pointer("/extension_attributes/stock_item/qty")
			.and_then(Value::as_f64)
			.map(|q| q.round() as i64),
	})
}

pub fn parse_product_page(value: &Value) -> Result<ProductPage, CommerceError> {
	let items = value
		.get("items")
		.and_then(Value::as_array)
		.ok_or_else(|| CommerceError::InvalidResponse("product search without items".into()))?;
	let total_count = value
		.get("total_count")
		.and_then(Value::as_u64)
		.map(|n| n as usize)
		.unwrap_or(items.len());
	let products = items
		.iter()
		.map(parse_product)
		.collect::<Result<Vec<_>, _>>()?;
	Ok(ProductPage {
		products,
		total_count,
	})
}

/// Configuration schema for the Magento integration.
pub struct MagentoSchema;

impl ConfigSchema for MagentoSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("base_url", FieldType::Url),
				Field::new("access_token", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(s) if !s.trim().is_empty() => Ok(()),
						_ => Err("must not be empty".to_string()),
					}
				}),
			],
			vec![
				Field::new("import_status", FieldType::String),
				Field::new(
					"page_size",
					FieldType::Integer {
						min: Some(1),
						max: Some(500),
					},
				),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create the Magento integration from configuration.
///
/// Configuration parameters:
/// - `base_url`: store URL, without the `/rest` suffix
/// - `access_token`: integration access token
/// - `import_status`: Magento status imported as new orders (default: "processing")
/// - `page_size`: page size for order and product searches (default: 100)
/// - `timeout_seconds`: request timeout (default: 30)
pub fn create_commerce(config: &toml::Value) -> Result<Box<dyn CommerceInterface>, CommerceError> {
	MagentoSchema
		.validate(config)
		.map_err(|e| CommerceError::Configuration(e.to_string()))?;

	let get_str = |key: &str| config.get(key).and_then(|v| v.as_str()).map(str::to_string);
	let get_int = |key: &str| config.get(key).and_then(|v| v.as_integer());

	let base_url = get_str("base_url")
		.ok_or_else(|| CommerceError::Configuration("base_url is required".into()))?;
	let access_token = get_str("access_token")
		.ok_or_else(|| CommerceError::Configuration("access_token is required".into()))?;

	Ok(Box::new(MagentoCommerce::new(
		base_url,
		SecretString::from(access_token),
		get_str("import_status").unwrap_or_else(|| DEFAULT_IMPORT_STATUS.to_string()),
		get_int("page_size")
			.map(|v| v as usize)
			.unwrap_or(DEFAULT_PAGE_SIZE),
		Duration::from_secs(
			get_int("timeout_seconds")
				.map(|v| v as u64)
				.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
		),
	)?))
}

/// Registry for the Magento implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "magento";
	type Factory = CommerceFactory;

	fn factory() -> Self::Factory {
		create_commerce
	}
}

impl CommerceRegistry for Registry {}
