//! HTTP server for the fulfillment API.
//!
//! Every route lives under `/api` except the `/health` probe. Request
//! bodies are capped at `api.max_request_size` and every request is bounded
//! by `api.timeout_seconds`.

use crate::apis::{integrations, orders, production, products, records, reports, shipments};
use axum::{
	extract::{DefaultBodyLimit, State},
	http::{HeaderName, HeaderValue, Method},
	routing::{delete, get, patch, post, put},
	Json, Router,
};
use fulfillment_config::{ApiConfig, CorsConfig};
use fulfillment_core::FulfillmentEngine;
use fulfillment_types::{
	BoxPreset, Entity, HealthResponse, PackingConfig, Product, ProductShorthand, ShippingSettings,
	WorkStation,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<FulfillmentEngine>,
}

/// Binds the listener and serves until the process is stopped.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<FulfillmentEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config)?;

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("Fulfillment API server starting on {}", bind_address);

	axum::serve(listener, app).await?;
	Ok(())
}

/// Builds the full router with its middleware stack.
pub fn router(
	engine: Arc<FulfillmentEngine>,
	api_config: &ApiConfig,
) -> Result<Router, Box<dyn std::error::Error>> {
	let cors = cors_layer(api_config.cors.as_ref())?;

	let api = Router::new()
		.route("/orders", get(orders::list_orders).post(orders::create_order))
		.route("/orders/bulk-transition", post(orders::bulk_transition))
		.route(
			"/orders/{id}",
			get(orders::get_order)
				.patch(orders::edit_order)
				.delete(orders::delete_order),
		)
		.route("/orders/{id}/transition", post(orders::transition_order))
		.route("/orders/{id}/priority", put(orders::set_priority))
		.route("/orders/{id}/packing", get(orders::packing_view))
		.route("/orders/{id}/label", post(orders::create_order_label))
		.route("/orders/{id}/sync-status", post(orders::sync_status))
		.route(
			"/shipments",
			get(shipments::list_shipments).post(shipments::create_shipment),
		)
		.route("/shipments/validate", post(shipments::validate_package))
		.route("/shipments/{id}", delete(shipments::delete_shipment))
		.route(
			"/production/tasks",
			get(production::list_tasks).post(production::create_task),
		)
		.route("/production/tasks/{id}/start", post(production::start_task))
		.route(
			"/production/tasks/{id}/complete",
			post(production::complete_task),
		)
		.route("/production/tasks/{id}/block", post(production::block_task))
		.route("/production/tasks/{id}/resume", post(production::resume_task))
		.route("/production/auto-schedule", post(production::auto_schedule))
		.route("/production/forecast", get(production::forecast))
		.route(
			"/products",
			get(products::list_products).post(records::create_record::<Product>),
		)
		.route("/products/{id}", patch(products::update_product))
		.route(
			"/products/{id}/adjustments",
			get(products::adjustment_history).post(products::adjust_stock),
		)
		.route("/sync/orders", post(integrations::import_orders))
		.route("/sync/products", post(integrations::sync_products))
		.route(
			"/insights/production",
			post(integrations::production_insights),
		)
		.route(
			"/insights/priority/{order_id}",
			post(integrations::suggest_priority),
		)
		.route("/insights/ask", post(integrations::ask))
		.route("/reports/shipping", get(reports::shipping))
		.route("/reports/utilization", get(reports::utilization))
		.route("/reports/low-stock", get(reports::low_stock))
		.route("/reports/workflow", get(reports::workflow));

	let api = settings_routes::<WorkStation>(api, "workstations");
	let api = settings_routes::<BoxPreset>(api, "box-presets");
	let api = settings_routes::<PackingConfig>(api, "packing-configs");
	let api = settings_routes::<ShippingSettings>(api, "shipping");
	let api = settings_routes::<ProductShorthand>(api, "shorthands");

	let app = Router::new()
		.route("/health", get(health))
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors),
		)
		.layer(DefaultBodyLimit::max(api_config.max_request_size))
		.with_state(AppState { engine });

	Ok(app)
}

/// Adds list/create and update/delete routes for one settings collection.
fn settings_routes<T: Entity>(router: Router<AppState>, kind: &str) -> Router<AppState> {
	router
		.route(
			&format!("/settings/{}", kind),
			get(records::list_records::<T>).post(records::create_record::<T>),
		)
		.route(
			&format!("/settings/{}/{{id}}", kind),
			patch(records::update_record::<T>).delete(records::delete_record::<T>),
		)
}

/// Handles GET /health requests.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok".to_string(),
		service_id: state.engine.config().service.id.clone(),
		version: env!("CARGO_PKG_VERSION").to_string(),
	})
}

/// Builds the CORS layer. Without a `cors` section any origin is allowed.
fn cors_layer(cors: Option<&CorsConfig>) -> Result<CorsLayer, Box<dyn std::error::Error>> {
	let Some(cors) = cors else {
		return Ok(CorsLayer::permissive());
	};

	let origins = if cors.allowed_origins.iter().any(|o| o == "*") {
		AllowOrigin::any()
	} else {
		let origins = cors
			.allowed_origins
			.iter()
			.map(|o| HeaderValue::from_str(o))
			.collect::<Result<Vec<_>, _>>()?;
		AllowOrigin::list(origins)
	};

	let methods = if cors.allowed_methods.is_empty() {
		vec![
			Method::GET,
			Method::POST,
			Method::PUT,
			Method::PATCH,
			Method::DELETE,
		]
	} else {
		cors.allowed_methods
			.iter()
			.map(|m| Method::from_bytes(m.to_uppercase().as_bytes()))
			.collect::<Result<Vec<_>, _>>()?
	};

	let headers = if cors.allowed_headers.is_empty() {
		AllowHeaders::from(Any)
	} else {
		let headers = cors
			.allowed_headers
			.iter()
			.map(|h| HeaderName::from_bytes(h.as_bytes()))
			.collect::<Result<Vec<_>, _>>()?;
		AllowHeaders::list(headers)
	};

	Ok(CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(methods)
		.allow_headers(headers))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory_registry::build_engine_from_config;
	use axum::body::{to_bytes, Body};
	use axum::http::{Request, StatusCode};
	use fulfillment_config::ConfigBuilder;
	use serde_json::{json, Value};
	use tower::ServiceExt;

	fn app() -> Router {
		let config = ConfigBuilder::new().delete_password("letmein").build();
		let engine = Arc::new(build_engine_from_config(config).unwrap());
		router(engine, &ApiConfig::default()).unwrap()
	}

	async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let builder = Request::builder().method(method).uri(uri);
		let request = match body {
			Some(body) => builder
				.header("content-type", "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => builder.body(Body::empty()).unwrap(),
		};
		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	fn draft(number: &str, country: &str) -> Value {
		json!({
			"order_number": number,
			"customer_name": "Grace Hopper",
			"customer_email": "grace@example.com",
			"shipping_address": {
				"street1": "1 Harbor Way",
				"city": "Halifax",
				"state": "NS",
				"zip": "B3H 1A1",
				"country": country,
			},
			"items": [
				{ "sku": "MUG-01", "name": "Mug", "quantity": 2, "weight": 3.0 },
				{ "sku": "TEE-02", "name": "Tee", "quantity": 1, "weight": 5.0 },
			],
		})
	}

	#[tokio::test]
	async fn test_health() {
		let app = app();
		let (status, body) = call(&app, "GET", "/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
		assert_eq!(body["service_id"], "test-fulfillment");
	}

	#[tokio::test]
	async fn test_order_workflow_over_http() {
		let app = app();
		let (status, order) = call(&app, "POST", "/api/orders", Some(draft("9001", "CA"))).await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(order["status"], "pending");
		assert_eq!(order["is_international"], true);
		assert_eq!(order["total_weight"], 11.0);
		let id = order["id"].as_str().unwrap().to_string();

		let (status, body) = call(
			&app,
			"POST",
			&format!("/api/orders/{}/transition", id),
			Some(json!({ "action": "mark_shipped" })),
		)
		.await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "INVALID_TRANSITION");

		let (status, moved) = call(
			&app,
			"POST",
			&format!("/api/orders/{}/transition", id),
			Some(json!({ "action": "move_to_production" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(moved["status"], "production");

		let (status, queue) = call(&app, "GET", "/api/orders?queue=production&search=mug", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(queue.as_array().unwrap().len(), 1);

		let (status, queue) = call(&app, "GET", "/api/orders?queue=staging", None).await;
		assert_eq!(status, StatusCode::OK);
		assert!(queue.as_array().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_delete_requires_password() {
		let app = app();
		let (_, order) = call(&app, "POST", "/api/orders", Some(draft("9002", "US"))).await;
		let uri = format!("/api/orders/{}", order["id"].as_str().unwrap());

		let (status, _) = call(&app, "DELETE", &uri, Some(json!({ "password": "nope" }))).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		let (status, _) = call(&app, "GET", &uri, None).await;
		assert_eq!(status, StatusCode::OK);

		let (status, _) = call(&app, "DELETE", &uri, Some(json!({ "password": "letmein" }))).await;
		assert_eq!(status, StatusCode::NO_CONTENT);
		let (status, _) = call(&app, "GET", &uri, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_unconfigured_integrations_answer_503() {
		let app = app();
		let (status, body) = call(&app, "POST", "/api/sync/orders", None).await;
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(body["error"], "NOT_CONFIGURED");

		let (status, _) = call(
			&app,
			"POST",
			"/api/shipments",
			Some(json!({ "weight": 2.0 })),
		)
		.await;
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

		let (status, _) = call(
			&app,
			"POST",
			"/api/insights/ask",
			Some(json!({ "question": "What is blocked?" })),
		)
		.await;
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	}

	#[tokio::test]
	async fn test_settings_crud() {
		let app = app();
		let (status, station) = call(
			&app,
			"POST",
			"/api/settings/workstations",
			Some(json!({ "name": "Laser" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(station["daily_capacity_hours"], 8.0);
		let uri = format!("/api/settings/workstations/{}", station["id"].as_str().unwrap());

		let (status, updated) = call(&app, "PATCH", &uri, Some(json!({ "active": false }))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(updated["active"], false);

		let (status, _) = call(&app, "PATCH", &uri, Some(json!({ "active": "sometimes" }))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, _) = call(&app, "DELETE", &uri, None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);
		let (_, list) = call(&app, "GET", "/api/settings/workstations", None).await;
		assert!(list.as_array().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_stock_adjustment_over_http() {
		let app = app();
		let (status, product) = call(
			&app,
			"POST",
			"/api/products",
			Some(json!({ "sku": "MUG-01", "name": "Mug", "stock_quantity": 4 })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		let uri = format!("/api/products/{}/adjustments", product["id"].as_str().unwrap());

		let (status, body) = call(
			&app,
			"POST",
			&uri,
			Some(json!({ "adjustment_type": "manual_add", "quantity": 6, "adjusted_by": "sam" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["product"]["stock_quantity"], 10);

		let (status, body) = call(
			&app,
			"POST",
			&uri,
			Some(json!({ "adjustment_type": "damaged", "quantity": 11, "adjusted_by": "sam" })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "VALIDATION_ERROR");

		let (_, history) = call(&app, "GET", &uri, None).await;
		assert_eq!(history.as_array().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_product_patch_cannot_touch_stock() {
		let app = app();
		let (_, product) = call(
			&app,
			"POST",
			"/api/products",
			Some(json!({ "sku": "TEE-02", "name": "Tee", "stock_quantity": 3 })),
		)
		.await;
		let uri = format!("/api/products/{}", product["id"].as_str().unwrap());

		let (status, _) = call(&app, "PATCH", &uri, Some(json!({ "stock_quantity": 99 }))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, updated) = call(&app, "PATCH", &uri, Some(json!({ "name": "Tee (L)" }))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(updated["name"], "Tee (L)");
		assert_eq!(updated["stock_quantity"], 3);
		let (_, history) = call(&app, "GET", &format!("{}/adjustments", uri), None).await;
		assert!(history.as_array().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_report_windows_out_of_range_are_rejected() {
		let app = app();
		let (status, _) = call(&app, "GET", "/api/reports/utilization?days=4294967295", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		let (status, _) = call(&app, "GET", "/api/reports/utilization?days=7", None).await;
		assert_eq!(status, StatusCode::OK);
		let (status, _) = call(&app, "GET", "/api/reports/shipping", None).await;
		assert_eq!(status, StatusCode::OK);
	}

	#[test]
	fn test_cors_rejects_bad_origin() {
		let cors = CorsConfig {
			allowed_origins: vec!["bad\norigin".into()],
			allowed_headers: vec![],
			allowed_methods: vec![],
		};
		assert!(cors_layer(Some(&cors)).is_err());
	}
}
