use super::booking::{Booking, BookingDraft, BookingPatch};
use super::notification::EmailMessage;
use super::party::{ExpertisePost, UserProfile};
use super::payment::{AuthorizationHandle, AuthorizationRequest, CaptureResult};
use super::query::{BookingFilter, BookingPage, Pagination};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Durable booking records. The store merges patches verbatim; it does not
/// enforce the status machine.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create(&self, draft: BookingDraft) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Booking>>;
    /// Returns `Ok(None)` when no booking has this id.
    async fn update(&self, id: Uuid, patch: BookingPatch) -> Result<Option<Booking>>;
    async fn list(&self, filter: &BookingFilter, pagination: Pagination) -> Result<BookingPage>;
}

/// Holds funds with the external payment processor and later releases them.
///
/// Implementations must fail `capture` with `CaptureFailed` for a handle that
/// is already captured or canceled.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, request: AuthorizationRequest) -> Result<AuthorizationHandle>;
    async fn retrieve(&self, handle_id: &str) -> Result<AuthorizationHandle>;
    async fn capture(&self, handle_id: &str) -> Result<CaptureResult>;
    async fn cancel(&self, handle_id: &str) -> Result<AuthorizationHandle>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Read-only view of users and expertise posts owned by other subsystems.
#[async_trait]
pub trait MarketplaceDirectory: Send + Sync {
    async fn expertise_post(&self, id: &str) -> Result<Option<ExpertisePost>>;
    async fn user(&self, id: &str) -> Result<Option<UserProfile>>;
}

pub type BookingStoreBox = Box<dyn BookingStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
pub type NotifierBox = Box<dyn Notifier>;
pub type DirectoryBox = Box<dyn MarketplaceDirectory>;
