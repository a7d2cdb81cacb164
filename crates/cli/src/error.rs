//! HTTP error responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use foxden::SessionError;
use foxden_protocol::ErrorBody;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;
use crate::validate::ValidationError;

/// Error returned by API handlers, rendered as `{"error": kind, "message": text}`.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("{0}")]
	Validation(String),

	#[error("{0}")]
	NotFound(String),

	#[error("{0}")]
	Conflict(String),

	/// No browser can be launched on this host.
	#[error("{0}")]
	Unavailable(String),

	#[error("{0}")]
	Internal(String),
}

impl ApiError {
	pub fn status(&self) -> StatusCode {
		match self {
			ApiError::Validation(_) => StatusCode::BAD_REQUEST,
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::Conflict(_) => StatusCode::CONFLICT,
			ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Short error kind used in the `error` field.
	pub fn kind(&self) -> &'static str {
		match self {
			ApiError::Validation(_) => "Validation failed",
			ApiError::NotFound(_) => "Not Found",
			ApiError::Conflict(_) => "Conflict",
			ApiError::Unavailable(_) => "Engine Unavailable",
			ApiError::Internal(_) => "Internal Server Error",
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if let ApiError::Internal(message) = &self {
			error!(target = "foxden.http", %message, "request failed");
		}

		let body = ErrorBody {
			error: self.kind().to_string(),
			message: self.to_string(),
		};
		(self.status(), Json(body)).into_response()
	}
}

impl From<SessionError> for ApiError {
	fn from(err: SessionError) -> Self {
		match err {
			SessionError::Conflict(_) => ApiError::Conflict(err.to_string()),
			SessionError::NotFound(_) => ApiError::NotFound(err.to_string()),
			SessionError::EngineUnavailable(_) => ApiError::Unavailable(err.to_string()),
			SessionError::InvalidProfile(_) => ApiError::Validation(err.to_string()),
			SessionError::LaunchFailure(_) => ApiError::Internal(err.to_string()),
		}
	}
}

impl From<StoreError> for ApiError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::Duplicate(_) => ApiError::Conflict(err.to_string()),
			StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
			StoreError::Io { .. } | StoreError::InvalidData { .. } | StoreError::Json(_) => ApiError::Internal(err.to_string()),
		}
	}
}

impl From<ValidationError> for ApiError {
	fn from(err: ValidationError) -> Self {
		ApiError::Validation(err.to_string())
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		ApiError::Validation(rejection.body_text())
	}
}
