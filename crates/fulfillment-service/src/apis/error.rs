//! Mapping from domain errors onto the HTTP error envelope.

use fulfillment_carrier::CarrierError;
use fulfillment_commerce::CommerceError;
use fulfillment_core::handlers::{
	InsightHandlerError, InventoryError, LabelError, OrderError, SyncError,
};
use fulfillment_core::{OrderStateError, ReportError, SchedulingError, TaskStateError};
use fulfillment_insights::InsightError;
use fulfillment_storage::StorageError;
use fulfillment_types::APIError;
use serde_json::json;

/// Converts a domain error into the API error returned to the client.
pub trait IntoApiError {
	fn into_api_error(self) -> APIError;
}

pub fn bad_request(message: impl Into<String>) -> APIError {
	APIError::BadRequest {
		error_type: "VALIDATION_ERROR".into(),
		message: message.into(),
		details: None,
	}
}

fn forbidden(message: impl Into<String>) -> APIError {
	APIError::Forbidden {
		error_type: "FORBIDDEN".into(),
		message: message.into(),
	}
}

fn not_found(message: impl Into<String>) -> APIError {
	APIError::NotFound {
		error_type: "NOT_FOUND".into(),
		message: message.into(),
	}
}

fn not_configured(message: impl Into<String>) -> APIError {
	APIError::ServiceUnavailable {
		error_type: "NOT_CONFIGURED".into(),
		message: message.into(),
		retry_after: None,
	}
}

fn internal(message: impl Into<String>) -> APIError {
	APIError::InternalServerError {
		error_type: "INTERNAL_ERROR".into(),
		message: message.into(),
	}
}

fn upstream(error_type: &str, message: String, status: Option<u16>, text: &str) -> APIError {
	APIError::BadGateway {
		error_type: error_type.into(),
		message,
		details: Some(json!({ "upstream_status": status, "upstream_message": text })),
	}
}

impl IntoApiError for StorageError {
	fn into_api_error(self) -> APIError {
		match self {
			StorageError::NotFound(id) => not_found(format!("Record not found: {}", id)),
			StorageError::Validation(message) => bad_request(message),
			StorageError::Conflict(message) => APIError::Conflict {
				error_type: "CONFLICT".into(),
				message,
				details: None,
			},
			other => internal(other.to_string()),
		}
	}
}

impl IntoApiError for OrderStateError {
	fn into_api_error(self) -> APIError {
		match self {
			OrderStateError::NotFound(id) => not_found(format!("Order not found: {}", id)),
			OrderStateError::Validation(message) => bad_request(message),
			OrderStateError::InvalidTransition { .. } => APIError::Conflict {
				error_type: "INVALID_TRANSITION".into(),
				message: self.to_string(),
				details: None,
			},
			OrderStateError::Conflict(message) => APIError::Conflict {
				error_type: "CONFLICT".into(),
				message,
				details: None,
			},
			OrderStateError::BulkAborted {
				ref applied,
				ref failed_id,
				ref source,
				..
			} => {
				let details = json!({
					"applied": applied,
					"failed_id": failed_id,
					"cause": source.to_string(),
				});
				APIError::Conflict {
					error_type: "BULK_ABORTED".into(),
					message: self.to_string(),
					details: Some(details),
				}
			},
			OrderStateError::Storage(message) => internal(message),
		}
	}
}

impl IntoApiError for OrderError {
	fn into_api_error(self) -> APIError {
		match self {
			OrderError::Validation(message) => bad_request(message),
			OrderError::Forbidden(message) => forbidden(message),
			OrderError::NotFound(id) => not_found(format!("Order not found: {}", id)),
			OrderError::State(e) => e.into_api_error(),
			OrderError::Storage(message) => internal(message),
		}
	}
}

impl IntoApiError for TaskStateError {
	fn into_api_error(self) -> APIError {
		match self {
			TaskStateError::NotFound(id) => not_found(format!("Task not found: {}", id)),
			TaskStateError::Validation(message) => bad_request(message),
			TaskStateError::InvalidTransition { .. } => APIError::Conflict {
				error_type: "INVALID_TRANSITION".into(),
				message: self.to_string(),
				details: None,
			},
			TaskStateError::Storage(message) => internal(message),
		}
	}
}

impl IntoApiError for SchedulingError {
	fn into_api_error(self) -> APIError {
		match self {
			SchedulingError::Validation(message) => bad_request(message),
			SchedulingError::Storage(e) => e.into_api_error(),
		}
	}
}

impl IntoApiError for CarrierError {
	fn into_api_error(self) -> APIError {
		match self {
			CarrierError::Upstream { status, ref message } => {
				let text = message.clone();
				upstream("CARRIER_ERROR", self.to_string(), Some(status), &text)
			},
			CarrierError::Network(ref text) | CarrierError::InvalidResponse(ref text) => {
				let text = text.clone();
				upstream("CARRIER_ERROR", self.to_string(), None, &text)
			},
			CarrierError::InvalidRequest(message) => bad_request(message),
			CarrierError::Configuration(message) => internal(message),
		}
	}
}

impl IntoApiError for LabelError {
	fn into_api_error(self) -> APIError {
		match self {
			LabelError::Validation(message) => bad_request(message),
			LabelError::Forbidden(message) => forbidden(message),
			LabelError::NotFound(id) => not_found(format!("Record not found: {}", id)),
			LabelError::NotConfigured => not_configured(self.to_string()),
			LabelError::Carrier(e) => e.into_api_error(),
			LabelError::PartialFailure {
				ref tracking_number,
				ref shipment_id,
				..
			} => {
				let details = json!({
					"tracking_number": tracking_number,
					"shipment_id": shipment_id,
					"needs_reconciliation": true,
				});
				APIError::UnprocessableEntity {
					error_type: "PARTIAL_FAILURE".into(),
					message: self.to_string(),
					details: Some(details),
				}
			},
			LabelError::Storage(message) => internal(message),
		}
	}
}

impl IntoApiError for InventoryError {
	fn into_api_error(self) -> APIError {
		match self {
			InventoryError::Validation(message) => bad_request(message),
			InventoryError::NotFound(id) => not_found(format!("Product not found: {}", id)),
			InventoryError::Storage(message) => internal(message),
		}
	}
}

impl IntoApiError for CommerceError {
	fn into_api_error(self) -> APIError {
		match self {
			CommerceError::Upstream { status, ref message } => {
				let text = message.clone();
				upstream("COMMERCE_ERROR", self.to_string(), Some(status), &text)
			},
			CommerceError::Network(ref text) | CommerceError::InvalidResponse(ref text) => {
				let text = text.clone();
				upstream("COMMERCE_ERROR", self.to_string(), None, &text)
			},
			CommerceError::Configuration(message) => internal(message),
		}
	}
}

impl IntoApiError for SyncError {
	fn into_api_error(self) -> APIError {
		match self {
			SyncError::NotConfigured => not_configured(self.to_string()),
			SyncError::Commerce(e) => e.into_api_error(),
			SyncError::Validation(message) => bad_request(message),
			SyncError::NotFound(id) => not_found(format!("Record not found: {}", id)),
			SyncError::Storage(message) => internal(message),
		}
	}
}

impl IntoApiError for InsightError {
	fn into_api_error(self) -> APIError {
		match self {
			InsightError::Upstream { status, ref message } => {
				let text = message.clone();
				upstream("INSIGHT_ERROR", self.to_string(), Some(status), &text)
			},
			InsightError::Network(ref text) | InsightError::SchemaMismatch { message: ref text, .. } => {
				let text = text.clone();
				upstream("INSIGHT_ERROR", self.to_string(), None, &text)
			},
			InsightError::InvalidRequest(message) => bad_request(message),
			InsightError::Configuration(message) => internal(message),
		}
	}
}

impl IntoApiError for InsightHandlerError {
	fn into_api_error(self) -> APIError {
		match self {
			InsightHandlerError::NotConfigured => not_configured(self.to_string()),
			InsightHandlerError::Insight(e) => e.into_api_error(),
			InsightHandlerError::NotFound(id) => not_found(format!("Record not found: {}", id)),
			InsightHandlerError::Storage(message) => internal(message),
		}
	}
}

impl IntoApiError for ReportError {
	fn into_api_error(self) -> APIError {
		match self {
			ReportError::Validation(message) => bad_request(message),
			ReportError::Storage(e) => e.into_api_error(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::OrderStatus;

	#[test]
	fn test_status_mapping() {
		let cases: Vec<(APIError, u16)> = vec![
			(OrderError::Forbidden("wrong password".into()).into_api_error(), 403),
			(OrderError::Validation("no items".into()).into_api_error(), 400),
			(
				OrderStateError::InvalidTransition {
					action: "mark_shipped",
					from: OrderStatus::Pending,
				}
				.into_api_error(),
				409,
			),
			(StorageError::Conflict("moved".into()).into_api_error(), 409),
			(StorageError::NotFound("o-1".into()).into_api_error(), 404),
			(LabelError::NotConfigured.into_api_error(), 503),
			(SyncError::NotConfigured.into_api_error(), 503),
			(StorageError::Backend("disk".into()).into_api_error(), 500),
		];
		for (error, status) in cases {
			assert_eq!(error.status_code(), status, "{}", error);
		}
	}

	#[test]
	fn test_upstream_failure_carries_details() {
		let error = LabelError::Carrier(CarrierError::Upstream {
			status: 401,
			message: "NOT.AUTHORIZED.ERROR".into(),
		})
		.into_api_error();
		assert_eq!(error.status_code(), 502);
		let body = error.to_error_response();
		let details = body.details.unwrap();
		assert_eq!(details["upstream_status"], 401);
		assert_eq!(details["upstream_message"], "NOT.AUTHORIZED.ERROR");
	}

	#[test]
	fn test_bulk_abort_lists_applied_ids() {
		let error = OrderStateError::BulkAborted {
			action: "move_to_production",
			applied: vec!["a".into(), "b".into()],
			failed_id: "c".into(),
			source: Box::new(OrderStateError::NotFound("c".into())),
		}
		.into_api_error();
		assert_eq!(error.status_code(), 409);
		let details = error.to_error_response().details.unwrap();
		assert_eq!(details["applied"], json!(["a", "b"]));
		assert_eq!(details["failed_id"], "c");
	}
}
