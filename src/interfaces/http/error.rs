use crate::error::BookingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

impl BookingError {
    /// Machine-readable error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            BookingError::InvalidAmount(_) => "invalid_amount",
            BookingError::AuthorizationFailed(_) => "authorization_failed",
            BookingError::CaptureFailed(_) => "capture_failed",
            BookingError::NotFound(_) => "not_found",
            BookingError::ValidationFailed(_) => "validation_failed",
            BookingError::NotificationFailed(_) => "notification_failed",
            BookingError::Timeout(_) => "timeout",
            BookingError::Storage(_) => "storage_error",
            BookingError::Config(_) => "config_error",
        }
    }
}

impl ResponseError for BookingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidAmount(_) | BookingError::ValidationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::AuthorizationFailed(_) => StatusCode::PAYMENT_REQUIRED,
            BookingError::CaptureFailed(_) => StatusCode::CONFLICT,
            BookingError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            BookingError::NotificationFailed(_)
            | BookingError::Storage(_)
            | BookingError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": self.error_code(),
            "message": self.to_string(),
            "retryable": self.is_retryable(),
        }))
    }
}
