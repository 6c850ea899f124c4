use crate::domain::fees::FeeQuote;
use crate::domain::money::Amount;
use crate::domain::party::{PartyRef, PostRef};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingType {
    SingleTextResponse,
}

impl BookingType {
    /// Human label used in emails and charge descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleTextResponse => "Single Text Response",
        }
    }
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SingleTextResponse => "SINGLE_TEXT_RESPONSE",
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    PendingResponse,
    Completed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::PendingResponse)
    }

    /// Only a pending booking moves, and only forward: to `Completed` once the
    /// payment is captured, or to `Expired` once the hold is released.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (Self::PendingResponse, Self::Completed) | (Self::PendingResponse, Self::Expired)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PendingResponse => "PENDING_RESPONSE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        })
    }
}

/// Payload of a single-text-response booking: the customer's question and,
/// once fulfilled, the expert's reply.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SingleTextResponse {
    pub customer_submission: String,
    #[serde(default)]
    pub expert_response: Option<String>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub booking_type: BookingType,
    pub expert: PartyRef,
    pub customer: PartyRef,
    pub expertise_post: PostRef,
    pub status: BookingStatus,
    pub single_text_response: SingleTextResponse,
    pub stripe_payment_intent_id: String,
    pub price_per_submission: Amount,
    pub service_fee: Amount,
    pub total: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub response_deadline: DateTime<Utc>,
}

/// Everything needed to persist a new booking; the store assigns identity
/// and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDraft {
    pub booking_type: BookingType,
    pub expert: PartyRef,
    pub customer: PartyRef,
    pub expertise_post: PostRef,
    pub customer_submission: String,
    pub stripe_payment_intent_id: String,
    pub quote: FeeQuote,
    pub response_window: Duration,
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    /// Compare-and-set guard: the patch is refused unless the stored booking
    /// is still in this status when the write happens.
    pub expected_status: Option<BookingStatus>,
    pub status: Option<BookingStatus>,
    pub expert_response: Option<String>,
}

impl Booking {
    pub fn from_draft(id: Uuid, draft: BookingDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            booking_type: draft.booking_type,
            expert: draft.expert,
            customer: draft.customer,
            expertise_post: draft.expertise_post,
            status: BookingStatus::PendingResponse,
            single_text_response: SingleTextResponse {
                customer_submission: draft.customer_submission,
                expert_response: None,
                responded_at: None,
            },
            stripe_payment_intent_id: draft.stripe_payment_intent_id,
            price_per_submission: draft.quote.price_per_submission,
            service_fee: draft.quote.service_fee,
            total: draft.quote.total,
            created_at: now,
            updated_at: now,
            response_deadline: now + draft.response_window,
        }
    }

    /// Merges a patch as-is once its `expected_status` guard holds.
    /// Transition rules are the caller's concern.
    pub fn apply(&mut self, patch: BookingPatch, now: DateTime<Utc>) -> Result<()> {
        if let Some(expected) = patch.expected_status
            && expected != self.status
        {
            return Err(BookingError::ValidationFailed(format!(
                "booking {} is {}, expected {expected}",
                self.id, self.status
            )));
        }

        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(response) = patch.expert_response {
            self.single_text_response.expert_response = Some(response);
            self.single_text_response.responded_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}
