use crate::domain::booking::{BookingStatus, BookingType};
use crate::domain::fees::ChargeBreakdown;
use crate::domain::money::{Amount, Cents};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reconciliation data attached to a held charge so it can be traced back to
/// a booking from the processor's dashboard alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationMetadata {
    pub booking_type: BookingType,
    pub expertise_post_id: String,
    pub expert_id: String,
    pub customer_id: String,
    pub status: BookingStatus,
}

impl AuthorizationMetadata {
    /// Flattened `(key, value)` pairs in the processor's naming.
    pub fn pairs(&self) -> [(&'static str, String); 5] {
        [
            ("bookingType", self.booking_type.to_string()),
            ("expertisePostId", self.expertise_post_id.clone()),
            ("expertId", self.expert_id.clone()),
            ("customerId", self.customer_id.clone()),
            ("status", self.status.to_string()),
        ]
    }
}

/// A request to hold funds with deferred (manual) capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub breakdown: ChargeBreakdown,
    /// Connected account that receives `breakdown.payout` on capture.
    pub destination: String,
    pub metadata: AuthorizationMetadata,
    pub description: String,
}

impl AuthorizationRequest {
    pub fn new(
        total: Amount,
        service_fee: Amount,
        destination: impl Into<String>,
        metadata: AuthorizationMetadata,
    ) -> Result<Self> {
        let breakdown = ChargeBreakdown::new(total, service_fee)?;
        let description = format!(
            "Booking from customer with id {} of type {} to expert with id {} for {} dollars.",
            metadata.customer_id, metadata.booking_type, metadata.expert_id, total
        );

        Ok(Self {
            breakdown,
            destination: destination.into(),
            metadata,
            description,
        })
    }
}

/// Processor-side lifecycle of a held charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    /// Funds are held and waiting for capture.
    RequiresCapture,
    /// Captured; funds moved.
    Succeeded,
    Canceled,
    Unknown,
}

impl HandleStatus {
    pub fn from_processor(status: &str) -> Self {
        match status {
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "requires_confirmation" => Self::RequiresConfirmation,
            "requires_action" => Self::RequiresAction,
            "processing" => Self::Processing,
            "requires_capture" => Self::RequiresCapture,
            "succeeded" => Self::Succeeded,
            "canceled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for HandleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        })
    }
}

/// The processor's view of an authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHandle {
    pub id: String,
    /// Token the payer's client uses to confirm the hold with the processor.
    pub client_secret: Option<String>,
    pub amount: Cents,
    pub status: HandleStatus,
    pub metadata: Option<AuthorizationMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub handle_id: String,
    pub amount_captured: Cents,
    pub status: HandleStatus,
}
