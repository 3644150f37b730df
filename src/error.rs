//! Errors as the HTTP client sees them
//!
//! Every failure leaves a handler as `{"success": false, "error", "code"}`,
//! plus `field_errors` when validation names specific inputs. Internal
//! details (SQL text, queue state) are logged here and replaced with a
//! generic message.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::JwtError;
use crate::database::DatabaseError;
use crate::services::error::ServiceError;

const GENERIC_FAILURE: &str = "An error occurred while processing your request";

#[derive(Debug)]
pub enum ApiError {
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    /// `code` is the stable reason clients branch on, e.g. `RETRY_LIMIT_EXCEEDED`
    Conflict { code: &'static str, message: String },
    InternalServerError(String),
    ServiceUnavailable(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        use ApiError::*;
        match self {
            ValidationError { message, .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message.as_str()),
            Unauthorized(m) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", m.as_str()),
            Forbidden(m) => (StatusCode::FORBIDDEN, "FORBIDDEN", m.as_str()),
            NotFound(m) => (StatusCode::NOT_FOUND, "NOT_FOUND", m.as_str()),
            Conflict { code, message } => (StatusCode::CONFLICT, *code, message.as_str()),
            InternalServerError(m) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", m.as_str()),
            ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", m.as_str()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    pub fn error_code(&self) -> &'static str {
        self.parts().1
    }

    pub fn message(&self) -> &str {
        self.parts().2
    }

    pub fn to_json(&self) -> Value {
        let (_, code, message) = self.parts();
        let mut body = json!({ "success": false, "error": message, "code": code });
        if let ApiError::ValidationError { field_errors: Some(fields), .. } = self {
            body["field_errors"] = json!(fields);
        }
        body
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict { code, message: message.into() }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::PermissionDenied => ApiError::Forbidden("Permission denied".into()),
            ServiceError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            ServiceError::Validation { message, field_errors } => ApiError::ValidationError {
                message,
                field_errors: (!field_errors.is_empty()).then_some(field_errors),
            },
            ServiceError::Conflict(reason) => ApiError::conflict(reason.code(), reason.message()),
            ServiceError::InconsistentState(detail) => {
                tracing::warn!(%detail, "state changed underneath the request");
                ApiError::conflict("INCONSISTENT_STATE", detail)
            }
            ServiceError::Database(db) => db.into(),
            ServiceError::Queue(detail) => {
                tracing::error!(%detail, "job queue rejected work");
                ApiError::internal_server_error(GENERIC_FAILURE)
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(what) => ApiError::NotFound(what),
            DatabaseError::UniqueViolation(constraint) => {
                tracing::warn!(%constraint, "uncaught unique violation");
                ApiError::conflict("CONFLICT", "The resource was modified concurrently")
            }
            DatabaseError::MigrationError(detail) => {
                tracing::error!(%detail, "schema migration failed");
                ApiError::ServiceUnavailable("Schema migration in progress".into())
            }
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!(error = %err, "store is not configured");
                ApiError::ServiceUnavailable("Database temporarily unavailable".into())
            }
            DatabaseError::QueryError(_) | DatabaseError::Sqlx(_) => {
                tracing::error!(error = %err, "store query failed");
                ApiError::internal_server_error(GENERIC_FAILURE)
            }
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        if let JwtError::TokenGeneration(detail) = &err {
            tracing::error!(%detail, "could not sign token");
            return ApiError::internal_server_error("Failed to issue token");
        }
        ApiError::unauthorized(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
