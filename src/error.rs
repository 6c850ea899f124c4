use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Payment authorization failed: {0}")]
    AuthorizationFailed(String),
    #[error("Payment capture failed: {0}")]
    CaptureFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Notification failed: {0}")]
    NotificationFailed(String),
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BookingError {
    /// Errors the caller may retry without risking a duplicate charge.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::CaptureFailed(_) | Self::Storage(_)
        )
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::ValidationFailed(errors.to_string())
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(error: serde_json::Error) -> Self {
        Self::Storage(format!("Serialization error: {error}"))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BookingError {
    fn from(error: rocksdb::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
