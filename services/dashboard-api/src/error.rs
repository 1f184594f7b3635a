// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! API error responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use benchdash_core::SupervisorError;
use benchdash_reports::ReportError;
use chrono::Utc;
use serde_json::json;
use tracing::error;

/// Error returned by route handlers, rendered as a JSON envelope.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status.
    pub status: StatusCode,
    /// Machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Lookup miss for `what`.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: format!("{what} not found"),
        }
    }

    /// Unexpected server-side failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            },
            "meta": {
                "timestamp": Utc::now().to_rfc3339(),
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        let status = match &err {
            SupervisorError::AlreadyRunning | SupervisorError::NotRunning => StatusCode::CONFLICT,
            SupervisorError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            SupervisorError::SpawnFailed { .. } | SupervisorError::StopTimeout { .. } => {
                error!(error = %err, "Supervisor failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        error!(error = %err, "Failed to read reports");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "REPORT_ERROR",
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_CONFIG",
            message: rejection.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!(error = %err, "Blocking task failed");
        Self::internal(format!("Background task failed: {err}"))
    }
}

/// Result type for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;
