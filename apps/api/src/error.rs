//! Error types for the HTTP API.
//!
//! Every failure leaves the server as a `{code, message}` JSON body.
//!
//! ```text
//! ┌────────────────────────────────────────────────┬────────┐
//! │ Error                                          │ Status │
//! ├────────────────────────────────────────────────┼────────┤
//! │ InvalidDateRange, Validation                   │ 400    │
//! │ Unauthenticated                                │ 401    │
//! │ PaymentFailed                                  │ 402    │
//! │ Forbidden                                      │ 403    │
//! │ NotFound                                       │ 404    │
//! │ Conflict, InvalidStateTransition, InvalidState │ 409    │
//! │ malformed JSON or query                        │ 422    │
//! │ RateLimited (+ Retry-After)                    │ 429    │
//! │ Internal                                       │ 500    │
//! └────────────────────────────────────────────────┴────────┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use rental_engine::{EngineError, ErrorKind};

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_booking_id: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e.kind() {
                ErrorKind::InvalidDateRange | ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::PaymentFailed => StatusCode::PAYMENT_REQUIRED,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict
                | ErrorKind::InvalidStateTransition
                | ErrorKind::InvalidState => StatusCode::CONFLICT,
                ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Engine(e) => e.code(),
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::InvalidBody(_) => "VALIDATION_ERROR",
        }
    }

    fn body(&self) -> ErrorBody {
        let message = match self {
            // Storage details stay in the logs.
            ApiError::Engine(EngineError::Internal(_)) => "internal error".to_string(),
            other => other.to_string(),
        };
        let conflicting_booking_id = match self {
            ApiError::Engine(EngineError::Conflict { conflicting_booking_id }) => {
                Some(conflicting_booking_id.clone())
            }
            _ => None,
        };

        ErrorBody {
            code: self.code(),
            message,
            conflicting_booking_id,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Engine(EngineError::Internal(detail)) = &self {
            error!(detail = %detail, "Request failed with internal error");
        }

        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        if let ApiError::Engine(EngineError::RateLimited { retry_after_secs }) = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
