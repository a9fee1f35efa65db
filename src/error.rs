// HTTP API Error Types
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 402 Payment Required (plan tier below the feature minimum)
    PlanInsufficient(String),

    // 403 Forbidden
    Forbidden(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 429 Too Many Requests, with a retry hint in seconds
    RateLimited { detail: String, retry_after: i64 },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable (feature flag off, store down)
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::PlanInsufficient(_) => 402,
            ApiError::Forbidden(_) => 403,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::RateLimited { .. } => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::PlanInsufficient(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::RateLimited { detail, .. } => detail,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::PlanInsufficient(_) => "PLAN_INSUFFICIENT",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::RateLimited { .. } => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            // Rate-limit body shape is part of the client contract
            ApiError::RateLimited { detail, retry_after } => json!({
                "detail": detail,
                "retry_after": retry_after,
            }),
            _ => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code(),
            }),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn plan_insufficient(message: impl Into<String>) -> Self {
        ApiError::PlanInsufficient(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn rate_limited(detail: impl Into<String>, retry_after: i64) -> Self {
        ApiError::RateLimited { detail: detail.into(), retry_after }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<crate::coach::pipeline::GateError> for ApiError {
    fn from(err: crate::coach::pipeline::GateError) -> Self {
        use crate::coach::pipeline::GateError;
        match err {
            GateError::FeatureDisabled => {
                ApiError::service_unavailable("AI coaching is temporarily unavailable")
            }
            GateError::PlanInsufficient { required } => ApiError::plan_insufficient(format!(
                "AI coaching requires the {} plan or above",
                required
            )),
            GateError::RateLimited { retry_after } => ApiError::RateLimited {
                detail: "Too many coaching requests. Please slow down.".to_string(),
                retry_after,
            },
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // 429 responses carry the retry hint as a header as well as in the body
        if let ApiError::RateLimited { retry_after, .. } = &self {
            let mut response = (status, Json(self.to_json())).into_response();
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            return response;
        }

        (status, Json(self.to_json())).into_response()
    }
}
