//! Catalog and inventory ledger endpoints.

use super::error::IntoApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	Json,
};
use fulfillment_core::handlers::AdjustmentRequest;
use fulfillment_storage::{Filter, Sort};
use fulfillment_types::{APIError, Product, ProductStatus, StockAdjustment};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
	/// Case-insensitive match on SKU or name.
	pub search: Option<String>,
	pub status: Option<ProductStatus>,
}

#[derive(Debug, Serialize)]
pub struct AdjustmentResponse {
	pub adjustment: StockAdjustment,
	pub product: Product,
}

/// GET /api/products
pub async fn list_products(
	State(state): State<AppState>,
	Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<Product>>, APIError> {
	let mut filter = Filter::new();
	if let Some(status) = query.status {
		filter = filter.eq("status", status);
	}
	let mut products: Vec<Product> = state
		.engine
		.storage()
		.filter(&filter, Some(&Sort::asc("sku")), None)
		.await
		.map_err(IntoApiError::into_api_error)?;

	if let Some(needle) = query
		.search
		.map(|s| s.trim().to_lowercase())
		.filter(|s| !s.is_empty())
	{
		products.retain(|p| {
			p.sku.to_lowercase().contains(&needle) || p.name.to_lowercase().contains(&needle)
		});
	}
	Ok(Json(products))
}

/// PATCH /api/products/{id}
///
/// Stock levels only change through the adjustment ledger, so a body
/// carrying `stock_quantity` is rejected.
pub async fn update_product(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(partial): Json<Value>,
) -> Result<Json<Product>, APIError> {
	if partial.get("stock_quantity").is_some() {
		return Err(super::error::bad_request(
			"stock_quantity is changed through /adjustments",
		));
	}
	let product = state
		.engine
		.storage()
		.update::<Product>(&id, partial)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(product))
}

/// POST /api/products/{id}/adjustments
pub async fn adjust_stock(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(request): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<AdjustmentResponse>), APIError> {
	let (adjustment, product) = state
		.engine
		.inventory()
		.adjust_stock(&id, request)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok((
		StatusCode::CREATED,
		Json(AdjustmentResponse {
			adjustment,
			product,
		}),
	))
}

/// GET /api/products/{id}/adjustments
pub async fn adjustment_history(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Vec<StockAdjustment>>, APIError> {
	let history = state
		.engine
		.inventory()
		.history(&id)
		.await
		.map_err(IntoApiError::into_api_error)?;
	Ok(Json(history))
}
