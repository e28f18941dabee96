//! API types for the fulfillment HTTP API.
//!
//! This module defines the error envelope returned by every endpoint and a
//! handful of request/response bodies shared between handlers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Password gate rejected the request (403)
	Forbidden { error_type: String, message: String },
	/// Referenced record does not exist (404)
	NotFound { error_type: String, message: String },
	/// Transition not allowed from the current state, or a concurrent write
	/// won (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Unprocessable entity for business logic failures (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// An upstream integration failed (502). `details` carries the
	/// upstream status and text when known.
	BadGateway {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Service unavailable with optional retry information (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::BadGateway { .. } => 502,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest { error_type, message, details }
			| APIError::Conflict { error_type, message, details }
			| APIError::UnprocessableEntity { error_type, message, details }
			| APIError::BadGateway { error_type, message, details } => {
				(error_type, message, details.clone(), None)
			},
			APIError::Forbidden { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::InternalServerError { error_type, message } => {
				(error_type, message, None, None)
			},
			APIError::ServiceUnavailable { error_type, message, retry_after } => {
				(error_type, message, None, *retry_after)
			},
		};
		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
			retry_after,
		}
	}

	fn message(&self) -> &str {
		match self {
			APIError::BadRequest { message, .. }
			| APIError::Forbidden { message, .. }
			| APIError::NotFound { message, .. }
			| APIError::Conflict { message, .. }
			| APIError::UnprocessableEntity { message, .. }
			| APIError::BadGateway { message, .. }
			| APIError::ServiceUnavailable { message, .. }
			| APIError::InternalServerError { message, .. } => message,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			APIError::BadRequest { .. } => "Bad Request",
			APIError::Forbidden { .. } => "Forbidden",
			APIError::NotFound { .. } => "Not Found",
			APIError::Conflict { .. } => "Conflict",
			APIError::UnprocessableEntity { .. } => "Unprocessable Entity",
			APIError::BadGateway { .. } => "Bad Gateway",
			APIError::ServiceUnavailable { .. } => "Service Unavailable",
			APIError::InternalServerError { .. } => "Internal Server Error",
		};
		write!(f, "{}: {}", label, self.message())
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

/// Body for destructive endpoints guarded by the delete password.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfirmation {
	pub password: String,
}

/// Liveness payload returned by `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	pub service_id: String,
	pub version: String,
}
