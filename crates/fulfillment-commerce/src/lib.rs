//! Commerce platform integration for the fulfillment service.
//!
//! The commerce platform is where orders originate and where the catalog
//! lives. This module abstracts over it: importing orders waiting for
//! fulfillment, paging through products, and pushing workflow status and
//! tracking numbers back upstream.

use async_trait::async_trait;
use fulfillment_types::{
	ConfigSchema, ImplementationRegistry, LineItem, OrderStatus, ProductStatus, ShippingAddress,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod magento;
}

/// Errors that can occur while talking to the commerce platform.
#[derive(Debug, Error)]
pub enum CommerceError {
	#[error("Network error: {0}")]
	Network(String),
	/// The platform answered with a non-success status.
	#[error("Commerce platform returned {status}: {message}")]
	Upstream { status: u16, message: String },
	#[error("Unexpected commerce response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// An order as read from the commerce platform, before it becomes a local
/// record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedOrder {
	/// Platform entity id, kept for status and tracking push-back.
	pub external_id: String,
	pub order_number: String,
	pub customer_name: String,
	pub customer_email: String,
	pub shipping_address: ShippingAddress,
	pub items: Vec<LineItem>,
	pub order_value: Decimal,
}

/// A catalog entry as read from the commerce platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProduct {
	pub remote_id: i64,
	pub sku: String,
	pub name: String,
	pub price: Decimal,
	pub weight: f64,
	pub status: ProductStatus,
	/// Absent when the platform does not expose stock for the product.
	pub stock_quantity: Option<i64>,
}

/// One page of the remote catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
	pub products: Vec<RemoteProduct>,
	/// Total number of products across all pages.
	pub total_count: usize,
}

/// How a tracking number reached the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPush {
	ExtensionAttribute,
	/// The attribute update was refused and an order comment was posted
	/// instead.
	Comment,
}

/// Maps a workflow status onto the platform's order status vocabulary.
///
/// Every internal stage before shipping is "processing" upstream.
pub fn remote_status(status: OrderStatus) -> &'static str {
	match status {
		OrderStatus::Pending
		| OrderStatus::Production
		| OrderStatus::Staging
		| OrderStatus::Processing => "processing",
		OrderStatus::Shipped | OrderStatus::Delivered => "complete",
		OrderStatus::Hold => "holded",
		OrderStatus::Cancelled => "canceled",
	}
}

/// Trait implemented by every commerce platform integration.
#[async_trait]
pub trait CommerceInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Fetches orders currently in the configured import status.
	async fn fetch_orders(&self) -> Result<Vec<ImportedOrder>, CommerceError>;

	/// Fetches one page of products. Pages are numbered from 1.
	async fn fetch_products(&self, page: usize) -> Result<ProductPage, CommerceError>;

	/// Sets the upstream status of an order.
	async fn push_status(&self, external_id: &str, status: &str) -> Result<(), CommerceError>;

	/// Attaches a tracking number to an order.
	async fn push_tracking(
		&self,
		external_id: &str,
		tracking_number: &str,
		carrier: &str,
	) -> Result<TrackingPush, CommerceError>;
}

/// Type alias for commerce factory functions.
pub type CommerceFactory = fn(&toml::Value) -> Result<Box<dyn CommerceInterface>, CommerceError>;

/// Registry trait for commerce implementations.
pub trait CommerceRegistry: ImplementationRegistry<Factory = CommerceFactory> {}

/// Get all registered commerce implementations.
pub fn get_all_implementations() -> Vec<(&'static str, CommerceFactory)> {
	use implementations::magento;

	vec![(magento::Registry::NAME, magento::Registry::factory())]
}

/// Front for the configured commerce platform.
pub struct CommerceService {
	implementation: Box<dyn CommerceInterface>,
}

impl CommerceService {
	pub fn new(implementation: Box<dyn CommerceInterface>) -> Self {
		Self { implementation }
	}

	pub async fn fetch_orders(&self) -> Result<Vec<ImportedOrder>, CommerceError> {
		let orders = self.implementation.fetch_orders().await?;
		tracing::debug!(component = "commerce", count = orders.len(), "Fetched orders");
		Ok(orders)
	}

	/// Pages through the whole catalog.
	///
	/// Stops once `total_count` products have been seen or a page comes back
	/// empty, whichever happens first.
	pub async fn fetch_all_products(&self) -> Result<Vec<RemoteProduct>, CommerceError> {
		let mut products = Vec::new();
		let mut page = 1;
		loop {
			let batch = self.implementation.fetch_products(page).await?;
			if batch.products.is_empty() {
				break;
			}
			products.extend(batch.products);
			if products.len() >= batch.total_count {
				break;
			}
			page += 1;
		}
		tracing::debug!(component = "commerce", count = products.len(), pages = page, "Fetched catalog");
		Ok(products)
	}

	/// Pushes the mapped status of an order upstream.
	pub async fn push_status(
		&self,
		external_id: &str,
		status: OrderStatus,
	) -> Result<&'static str, CommerceError> {
		let remote = remote_status(status);
		self.implementation.push_status(external_id, remote).await?;
		tracing::info!(
			component = "commerce",
			external_id = %external_id,
			status = %status,
			remote_status = remote,
			"Pushed order status"
		);
		Ok(remote)
	}

	pub async fn push_tracking(
		&self,
		external_id: &str,
		tracking_number: &str,
		carrier: &str,
	) -> Result<TrackingPush, CommerceError> {
		self.implementation
			.push_tracking(external_id, tracking_number, carrier)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::ValidationError;
	use std::sync::{Arc, Mutex};

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	fn product(sku: &str) -> RemoteProduct {
		RemoteProduct {
			remote_id: 1,
			sku: sku.into(),
			name: sku.into(),
			price: Decimal::new(500, 2),
			weight: 1.0,
			status: ProductStatus::Enabled,
			stock_quantity: Some(3),
		}
	}

	/// Serves a fixed catalog in pages of `page_size`, recording pushed
	/// statuses.
	struct PagedCatalog {
		skus: Vec<&'static str>,
		page_size: usize,
		/// Reported total, which may disagree with `skus.len()`.
		total_count: usize,
		pushed: Arc<Mutex<Vec<(String, String)>>>,
	}

	#[async_trait]
	impl CommerceInterface for PagedCatalog {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn fetch_orders(&self) -> Result<Vec<ImportedOrder>, CommerceError> {
			Ok(vec![])
		}

		async fn fetch_products(&self, page: usize) -> Result<ProductPage, CommerceError> {
			let products = self
				.skus
				.iter()
				.skip((page - 1) * self.page_size)
				.take(self.page_size)
				.map(|sku| product(sku))
				.collect();
			Ok(ProductPage {
				products,
				total_count: self.total_count,
			})
		}

		async fn push_status(&self, external_id: &str, status: &str) -> Result<(), CommerceError> {
			self.pushed
				.lock()
				.unwrap()
				.push((external_id.to_string(), status.to_string()));
			Ok(())
		}

		async fn push_tracking(
			&self,
			_external_id: &str,
			_tracking_number: &str,
			_carrier: &str,
		) -> Result<TrackingPush, CommerceError> {
			Ok(TrackingPush::ExtensionAttribute)
		}
	}

	fn catalog(skus: Vec<&'static str>, page_size: usize, total_count: usize) -> PagedCatalog {
		PagedCatalog {
			skus,
			page_size,
			total_count,
			pushed: Arc::new(Mutex::new(vec![])),
		}
	}

	#[test]
	fn test_remote_status_mapping() {
		assert_eq!(remote_status(OrderStatus::Pending), "processing");
		assert_eq!(remote_status(OrderStatus::Staging), "processing");
		assert_eq!(remote_status(OrderStatus::Delivered), "complete");
		assert_eq!(remote_status(OrderStatus::Hold), "holded");
		assert_eq!(remote_status(OrderStatus::Cancelled), "canceled");
	}

	#[tokio::test]
	async fn test_fetch_all_products_stops_at_total_count() {
		let service = CommerceService::new(Box::new(catalog(vec!["A", "B", "C", "D", "E"], 2, 5)));
		let products = service.fetch_all_products().await.unwrap();
		assert_eq!(products.len(), 5);
	}

	#[tokio::test]
	async fn test_fetch_all_products_stops_on_empty_page() {
		let inner = catalog(vec!["A", "B", "C"], 2, 10);
		let service = CommerceService::new(Box::new(inner));
		let products = service.fetch_all_products().await.unwrap();
		// Third page is empty even though the platform claims ten products.
		assert_eq!(products.len(), 3);
	}

	#[tokio::test]
	async fn test_push_status_sends_mapped_value() {
		let inner = catalog(vec![], 1, 0);
		let pushed = inner.pushed.clone();
		let service = CommerceService::new(Box::new(inner));
		let remote = service.push_status("42", OrderStatus::Shipped).await.unwrap();
		assert_eq!(remote, "complete");
		assert_eq!(
			pushed.lock().unwrap().as_slice(),
			&[("42".to_string(), "complete".to_string())]
		);
	}
}
