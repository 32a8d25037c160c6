//! Consistent error responses.
//!
//! Every non-2xx response carries the same JSON body:
//!
//! ```json
//! { "status": 404, "error": "Not Found", "message": "...", "path": "/api/rules/9" }
//! ```
//!
//! Handlers and middleware return [`ApiError`]; its `IntoResponse` renders the
//! body without a path and leaves an [`ErrorBody`] in the response extensions.
//! [`crate::middleware::error_body_middleware`] fills in the request path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use invcfg_auth::AuthzError;
use invcfg_core::{FieldViolation, RuleId, join_violations};
use invcfg_infra::RuleServiceError;
use invcfg_infra::rule_store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("A rule with name '{0}' already exists")]
    Conflict(String),

    #[error("Inventory rule with id {0} not found")]
    NotFound(RuleId),

    #[error("No handler found for this path")]
    RouteNotFound,

    #[error("Request method not supported for this path")]
    MethodNotAllowed,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied. Insufficient permissions.")]
    Forbidden,

    /// Detail is logged, never sent to the client.
    #[error("An unexpected error occurred")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldViolation::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short error label for the `error` field.
    pub fn label(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Validation Error",
            ApiError::Conflict(_) => "Bad Request",
            ApiError::NotFound(_) | ApiError::RouteNotFound => "Not Found",
            ApiError::MethodNotAllowed => "Method Not Allowed",
            ApiError::Unauthorized => "Unauthorized",
            ApiError::Forbidden => "Forbidden",
            ApiError::Internal(_) => "Internal Server Error",
        }
    }

    pub fn body(&self, path: impl Into<String>) -> ErrorBody {
        ErrorBody {
            status: self.status().as_u16(),
            error: self.label().to_string(),
            message: self.to_string(),
            path: path.into(),
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed with internal error");
        }

        let body = self.body("");
        let mut res = (self.status(), axum::Json(body.clone())).into_response();
        res.extensions_mut().insert(body);
        res
    }
}

impl From<RuleServiceError> for ApiError {
    fn from(value: RuleServiceError) -> Self {
        match value {
            RuleServiceError::Validation(v) => ApiError::Validation(v),
            RuleServiceError::Conflict(name) => ApiError::Conflict(name),
            RuleServiceError::NotFound(id) => ApiError::NotFound(id),
            RuleServiceError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthorized => ApiError::Unauthorized,
            AuthzError::Forbidden => ApiError::Forbidden,
        }
    }
}
