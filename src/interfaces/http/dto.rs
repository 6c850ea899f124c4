//! Request and response bodies for the booking API.
//!
//! Every request type is validated here before it becomes an orchestrator
//! command. Money never comes from these bodies: totals supplied by a client
//! are only compared against the server-derived quote.

use crate::application::orchestrator::{
    AuthorizePayment, BookingCreated, BookingIdentity, CreateBooking, PaymentAuthorized,
    UpdateBooking,
};
use crate::domain::booking::{Booking, BookingPatch, BookingStatus, BookingType};
use crate::domain::money::Amount;
use crate::domain::query::{BookingFilter, BookingPage};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A reference to another entity, sent either as a bare id or as the
/// populated document (`{ "_id": ..., ... }`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(String),
    Embedded {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Id(id) | EntityRef::Embedded { id } => id,
        }
    }
}

fn require_pending(status: Option<BookingStatus>) -> Result<()> {
    match status {
        Some(status) if status != BookingStatus::PendingResponse => {
            Err(BookingError::ValidationFailed(format!(
                "new bookings start as PENDING_RESPONSE, not {status}"
            )))
        }
        _ => Ok(()),
    }
}

/// POST /api/bookings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub booking_type: BookingType,
    #[validate(length(min = 1, max = 64))]
    pub expertise_post_id: String,
    #[validate(length(min = 1, max = 64))]
    pub expert_id: String,
    #[validate(length(min = 1, max = 64))]
    pub customer_id: String,
    pub status: Option<BookingStatus>,
    #[validate(length(min = 1, max = 5000))]
    pub customer_submission: String,
    #[validate(length(min = 1, max = 255))]
    pub stripe_payment_intent_id: Option<String>,
}

impl CreateBookingRequest {
    pub fn into_command(self) -> Result<CreateBooking> {
        self.validate()?;
        require_pending(self.status)?;
        Ok(CreateBooking {
            booking_type: self.booking_type,
            expertise_post_id: self.expertise_post_id,
            expert_id: self.expert_id,
            customer_id: self.customer_id,
            customer_submission: self.customer_submission,
            payment_intent_id: self.stripe_payment_intent_id,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    pub success: bool,
    pub booking_id: Uuid,
    pub stripe_payment_intent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub expert_notified: bool,
}

impl From<BookingCreated> for CreateBookingResponse {
    fn from(created: BookingCreated) -> Self {
        Self {
            success: true,
            booking_id: created.booking.id,
            stripe_payment_intent_id: created.booking.stripe_payment_intent_id,
            client_secret: created.client_secret,
            expert_notified: created.expert_notified,
        }
    }
}

/// POST /api/stripe/paymentIntent
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub total: Option<Decimal>,
    pub service_fee: Option<Decimal>,
    pub booking_type: BookingType,
    #[validate(length(min = 1, max = 64))]
    pub expertise_post_id: String,
    #[validate(length(min = 1, max = 64))]
    pub expert_id: String,
    #[validate(length(min = 1, max = 64))]
    pub customer_id: String,
    pub status: Option<BookingStatus>,
    #[validate(length(min = 1, max = 255))]
    pub expert_stripe_id: Option<String>,
}

impl PaymentIntentRequest {
    pub fn into_command(self) -> Result<AuthorizePayment> {
        self.validate()?;
        require_pending(self.status)?;
        Ok(AuthorizePayment {
            booking_type: self.booking_type,
            expertise_post_id: self.expertise_post_id,
            expert_id: self.expert_id,
            customer_id: self.customer_id,
            expected_total: self.total,
            expected_service_fee: self.service_fee,
            expected_destination: self.expert_stripe_id,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub success: bool,
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub total: Amount,
    pub service_fee: Amount,
}

impl From<PaymentAuthorized> for PaymentIntentResponse {
    fn from(authorized: PaymentAuthorized) -> Self {
        Self {
            success: true,
            client_secret: authorized.client_secret,
            payment_intent_id: authorized.payment_intent_id,
            total: authorized.quote.total,
            service_fee: authorized.quote.service_fee,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SingleTextResponsePatch {
    #[validate(length(min = 1, max = 5000))]
    pub customer_submission: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub expert_response: Option<String>,
}

/// PUT /api/bookings/{id}
///
/// Clients send the booking back as they last saw it. Only `status` and the
/// expert response are applied; identity fields are checked against the
/// stored booking and anything else is ignored.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    #[serde(rename = "_id")]
    pub id: Option<Uuid>,
    pub booking_type: Option<BookingType>,
    pub expertise_post: Option<EntityRef>,
    pub expert: Option<EntityRef>,
    pub customer: Option<EntityRef>,
    pub status: Option<BookingStatus>,
    #[validate(nested)]
    pub single_text_response: Option<SingleTextResponsePatch>,
    #[validate(length(min = 1, max = 255))]
    pub stripe_payment_intent_id: Option<String>,
    #[serde(default)]
    pub charge_payment_intent: bool,
}

impl UpdateBookingRequest {
    pub fn into_command(self, booking_id: Uuid) -> Result<UpdateBooking> {
        self.validate()?;
        if self.id.is_some_and(|id| id != booking_id) {
            return Err(BookingError::ValidationFailed(
                "_id in the body does not match the booking in the path".into(),
            ));
        }

        let text = self.single_text_response.unwrap_or_default();
        Ok(UpdateBooking {
            booking_id,
            identity: BookingIdentity {
                booking_type: self.booking_type,
                expert_id: self.expert.map(|e| e.id().to_string()),
                customer_id: self.customer.map(|c| c.id().to_string()),
                expertise_post_id: self.expertise_post.map(|p| p.id().to_string()),
                payment_intent_id: self.stripe_payment_intent_id,
                customer_submission: text.customer_submission,
            },
            patch: BookingPatch {
                expected_status: None,
                status: self.status,
                expert_response: text.expert_response,
            },
            charge_payment_intent: self.charge_payment_intent,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_notified: Option<bool>,
}

/// GET /api/bookings query string
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListBookingsQuery {
    #[validate(length(max = 200))]
    pub keyword: Option<String>,
    pub status: Option<BookingStatus>,
    pub booking_type: Option<BookingType>,
    #[validate(length(min = 1, max = 64))]
    pub expert: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub customer: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub expertise_post: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub min_total: Option<Decimal>,
    pub max_total: Option<Decimal>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
}

impl ListBookingsQuery {
    /// Returns the filter and the 1-indexed page.
    pub fn into_filter(self) -> Result<(BookingFilter, u32)> {
        self.validate()?;
        let filter = BookingFilter {
            keyword: self.keyword,
            status: self.status,
            booking_type: self.booking_type,
            expert_id: self.expert,
            customer_id: self.customer,
            expertise_post_id: self.expertise_post,
            created_after: self.created_after,
            created_before: self.created_before,
            min_total: self.min_total,
            max_total: self.max_total,
            deadline_before: None,
        };
        Ok((filter, self.page.unwrap_or(1)))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBookingsResponse {
    pub bookings_count: usize,
    pub res_per_page: u32,
    pub filtered_bookings_count: usize,
    pub bookings: Vec<Booking>,
}

impl ListBookingsResponse {
    pub fn new(page: BookingPage, res_per_page: u32) -> Self {
        Self {
            bookings_count: page.total_count,
            res_per_page,
            filtered_bookings_count: page.filtered_count,
            bookings: page.items,
        }
    }
}
