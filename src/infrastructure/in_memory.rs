use crate::domain::booking::{Booking, BookingDraft, BookingPatch};
use crate::domain::notification::EmailMessage;
use crate::domain::party::{ExpertisePost, UserProfile};
use crate::domain::payment::{AuthorizationHandle, AuthorizationRequest, CaptureResult, HandleStatus};
use crate::domain::ports::{BookingStore, MarketplaceDirectory, Notifier, PaymentGateway};
use crate::domain::query::{BookingFilter, BookingPage, Pagination};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// A thread-safe in-memory booking store.
///
/// Uses `Arc<RwLock<HashMap<Uuid, Booking>>>` so clones share one map.
/// Suitable for tests and single-process deployments without persistence.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
}

impl InMemoryBookingStore {
    /// Creates a new, empty in-memory booking store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, draft: BookingDraft) -> Result<Booking> {
        let mut bookings = self.bookings.write().await;
        if bookings
            .values()
            .any(|b| b.stripe_payment_intent_id == draft.stripe_payment_intent_id)
        {
            return Err(BookingError::ValidationFailed(format!(
                "payment intent {} already belongs to a booking",
                draft.stripe_payment_intent_id
            )));
        }

        let booking = Booking::from_draft(Uuid::new_v4(), draft, Utc::now());
        bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&id).cloned())
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .find(|b| b.stripe_payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn update(&self, id: Uuid, patch: BookingPatch) -> Result<Option<Booking>> {
        let mut bookings = self.bookings.write().await;
        let Some(booking) = bookings.get_mut(&id) else {
            return Ok(None);
        };
        booking.apply(patch, Utc::now())?;
        Ok(Some(booking.clone()))
    }

    async fn list(&self, filter: &BookingFilter, pagination: Pagination) -> Result<BookingPage> {
        let bookings = self.bookings.read().await;
        Ok(pagination.paginate(filter, bookings.values().cloned().collect()))
    }
}

/// Read-only directory of users and expertise posts, built up front.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    users: HashMap<String, UserProfile>,
    posts: HashMap<String, ExpertisePost>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn with_post(mut self, post: ExpertisePost) -> Self {
        self.posts.insert(post.id.clone(), post);
        self
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }
}

#[async_trait]
impl MarketplaceDirectory for InMemoryDirectory {
    async fn expertise_post(&self, id: &str) -> Result<Option<ExpertisePost>> {
        Ok(self.posts.get(id).cloned())
    }

    async fn user(&self, id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.get(id).cloned())
    }
}

#[derive(Debug, Clone)]
struct SandboxIntent {
    handle: AuthorizationHandle,
    application_fee: i64,
    destination: String,
}

/// Local stand-in for the card processor.
///
/// Holds are created already confirmed (`requires_capture`), as if the
/// customer had completed the card form. Destinations must look like
/// connected accounts (`acct_...`).
#[derive(Default, Clone)]
pub struct SandboxPaymentGateway {
    intents: Arc<RwLock<HashMap<String, SandboxIntent>>>,
}

impl SandboxPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a hold, bypassing the gateway interface.
    pub async fn snapshot(&self, handle_id: &str) -> Option<AuthorizationHandle> {
        let intents = self.intents.read().await;
        intents.get(handle_id).map(|i| i.handle.clone())
    }

    pub async fn handle_count(&self) -> usize {
        self.intents.read().await.len()
    }

    /// Transfer details recorded for a hold: (application fee in cents, destination).
    pub async fn transfer_of(&self, handle_id: &str) -> Option<(i64, String)> {
        let intents = self.intents.read().await;
        intents
            .get(handle_id)
            .map(|i| (i.application_fee, i.destination.clone()))
    }

    /// Places a hold outside the booking flow, e.g. one issued for other metadata.
    pub async fn insert(&self, handle: AuthorizationHandle) {
        let mut intents = self.intents.write().await;
        intents.insert(
            handle.id.clone(),
            SandboxIntent {
                handle,
                application_fee: 0,
                destination: String::new(),
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for SandboxPaymentGateway {
    async fn authorize(&self, request: AuthorizationRequest) -> Result<AuthorizationHandle> {
        if !request.destination.starts_with("acct_") {
            return Err(BookingError::AuthorizationFailed(format!(
                "no such destination: {}",
                request.destination
            )));
        }

        let id = format!("pi_sandbox_{}", Uuid::new_v4().simple());
        let handle = AuthorizationHandle {
            client_secret: Some(format!("{id}_secret_{}", Uuid::new_v4().simple())),
            id: id.clone(),
            amount: request.breakdown.amount,
            status: HandleStatus::RequiresCapture,
            metadata: Some(request.metadata),
        };

        let mut intents = self.intents.write().await;
        intents.insert(
            id,
            SandboxIntent {
                handle: handle.clone(),
                application_fee: request.breakdown.application_fee.value(),
                destination: request.destination,
            },
        );
        Ok(handle)
    }

    async fn retrieve(&self, handle_id: &str) -> Result<AuthorizationHandle> {
        self.snapshot(handle_id)
            .await
            .ok_or_else(|| BookingError::NotFound(format!("payment intent {handle_id}")))
    }

    async fn capture(&self, handle_id: &str) -> Result<CaptureResult> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(handle_id)
            .ok_or_else(|| BookingError::CaptureFailed(format!("no such payment intent: {handle_id}")))?;

        if intent.handle.status != HandleStatus::RequiresCapture {
            return Err(BookingError::CaptureFailed(format!(
                "payment intent {handle_id} is {} and cannot be captured",
                intent.handle.status
            )));
        }

        intent.handle.status = HandleStatus::Succeeded;
        Ok(CaptureResult {
            handle_id: handle_id.to_string(),
            amount_captured: intent.handle.amount,
            status: HandleStatus::Succeeded,
        })
    }

    async fn cancel(&self, handle_id: &str) -> Result<AuthorizationHandle> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(handle_id)
            .ok_or_else(|| BookingError::NotFound(format!("payment intent {handle_id}")))?;

        if matches!(
            intent.handle.status,
            HandleStatus::Succeeded | HandleStatus::Canceled
        ) {
            return Err(BookingError::ValidationFailed(format!(
                "payment intent {handle_id} is {} and cannot be canceled",
                intent.handle.status
            )));
        }

        intent.handle.status = HandleStatus::Canceled;
        Ok(intent.handle.clone())
    }
}

/// Notifier that keeps every message instead of delivering it.
#[derive(Default, Clone)]
pub struct InMemoryOutbox {
    sent: Arc<RwLock<Vec<EmailMessage>>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryOutbox {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(recipient = %message.email, subject = %message.subject, "Queued email in outbox");
        self.sent.write().await.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, BookingType};
    use crate::domain::fees::compute_fees;
    use crate::domain::money::{Amount, Cents};
    use crate::domain::payment::AuthorizationMetadata;
    use crate::domain::party::{PartyRef, PostRef};
    use rust_decimal_macros::dec;

    fn draft(intent: &str) -> BookingDraft {
        BookingDraft {
            booking_type: BookingType::SingleTextResponse,
            expert: PartyRef {
                id: "exp_1".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
            },
            customer: PartyRef {
                id: "cus_1".into(),
                name: "Grace".into(),
                email: "grace@example.com".into(),
            },
            expertise_post: PostRef {
                id: "post_1".into(),
                title: "Compiler reviews".into(),
            },
            customer_submission: "Where do I start?".into(),
            stripe_payment_intent_id: intent.into(),
            quote: compute_fees(dec!(50.00)).unwrap(),
            response_window: chrono::Duration::days(7),
        }
    }

    fn request(destination: &str) -> AuthorizationRequest {
        let quote = compute_fees(dec!(50.00)).unwrap();
        AuthorizationRequest::new(
            quote.total,
            quote.service_fee,
            destination,
            AuthorizationMetadata {
                booking_type: BookingType::SingleTextResponse,
                expertise_post_id: "post_1".into(),
                expert_id: "exp_1".into(),
                customer_id: "cus_1".into(),
                status: BookingStatus::PendingResponse,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_booking_store() {
        let store = InMemoryBookingStore::new();
        let created = store.create(draft("pi_1")).await.unwrap();

        let retrieved = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(retrieved, created);

        let by_intent = store.find_by_payment_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(by_intent.id, created.id);

        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_store_rejects_reused_intent() {
        let store = InMemoryBookingStore::new();
        store.create(draft("pi_1")).await.unwrap();

        let result = store.create(draft("pi_1")).await;
        assert!(matches!(result, Err(BookingError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_in_memory_store_update_merges_patch() {
        let store = InMemoryBookingStore::new();
        let created = store.create(draft("pi_1")).await.unwrap();

        let updated = store
            .update(
                created.id,
                BookingPatch {
                    expected_status: Some(BookingStatus::PendingResponse),
                    status: Some(BookingStatus::Completed),
                    expert_response: Some("Read the dragon book.".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Completed);
        assert_eq!(updated.total, created.total);

        let stale = store
            .update(
                created.id,
                BookingPatch {
                    expected_status: Some(BookingStatus::PendingResponse),
                    status: Some(BookingStatus::Completed),
                    expert_response: Some("Overwritten?".into()),
                },
            )
            .await;
        assert!(matches!(stale, Err(BookingError::ValidationFailed(_))));
        let stored = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(
            stored.single_text_response.expert_response.as_deref(),
            Some("Read the dragon book.")
        );

        let missing = store.update(Uuid::new_v4(), BookingPatch::default()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_sandbox_hold_lifecycle() {
        let gateway = SandboxPaymentGateway::new();
        let handle = gateway.authorize(request("acct_ada")).await.unwrap();
        assert_eq!(handle.status, HandleStatus::RequiresCapture);
        assert_eq!(handle.amount, Cents(5175));
        assert_eq!(
            gateway.transfer_of(&handle.id).await,
            Some((1175, "acct_ada".to_string()))
        );

        let captured = gateway.capture(&handle.id).await.unwrap();
        assert_eq!(captured.amount_captured, Cents(5175));

        let again = gateway.capture(&handle.id).await;
        assert!(matches!(again, Err(BookingError::CaptureFailed(_))));
        let cancel = gateway.cancel(&handle.id).await;
        assert!(cancel.is_err());
    }

    #[tokio::test]
    async fn test_sandbox_rejects_unknown_destination() {
        let gateway = SandboxPaymentGateway::new();
        let result = gateway.authorize(request("not-an-account")).await;
        assert!(matches!(result, Err(BookingError::AuthorizationFailed(_))));
        assert_eq!(gateway.handle_count().await, 0);
    }

    #[tokio::test]
    async fn test_sandbox_retrieve_unknown_is_not_found() {
        let gateway = SandboxPaymentGateway::new();
        let result = gateway.retrieve("pi_missing").await;
        assert!(matches!(result, Err(BookingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = InMemoryDirectory::new().with_post(ExpertisePost {
            id: "post_1".into(),
            title: "Compiler reviews".into(),
            price_per_submission: Amount::new(dec!(50)).unwrap(),
            user: "exp_1".into(),
        });

        assert!(directory.expertise_post("post_1").await.unwrap().is_some());
        assert!(directory.user("exp_1").await.unwrap().is_none());
    }
}
