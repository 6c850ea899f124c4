#![allow(dead_code)]

use advice_escrow::application::notifications::NotificationTemplates;
use advice_escrow::application::orchestrator::{
    BookingOrchestrator, BookingUpdated, CreateBooking, OrchestratorSettings, UpdateBooking,
};
use advice_escrow::domain::booking::{
    Booking, BookingDraft, BookingPatch, BookingStatus, BookingType,
};
use advice_escrow::domain::money::Amount;
use advice_escrow::domain::notification::EmailMessage;
use advice_escrow::domain::party::{ExpertisePost, UserProfile};
use advice_escrow::domain::payment::{
    AuthorizationHandle, AuthorizationRequest, CaptureResult, HandleStatus,
};
use advice_escrow::domain::ports::{BookingStore, Notifier, NotifierBox, PaymentGateway};
use advice_escrow::domain::query::{BookingFilter, BookingPage, Pagination};
use advice_escrow::error::{BookingError, Result};
use advice_escrow::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryDirectory, InMemoryOutbox,
};
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// post_1 (50.00) and post_3 (19.99) belong to exp_1, who can take payouts.
/// post_2 belongs to exp_2, who has not finished payout onboarding.
pub fn directory() -> InMemoryDirectory {
    let user = |id: &str, name: &str, account: Option<&str>| UserProfile {
        id: id.into(),
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        stripe_account_id: account.map(Into::into),
    };
    let post = |id: &str, title: &str, price, owner: &str| ExpertisePost {
        id: id.into(),
        title: title.into(),
        price_per_submission: Amount::new(price).unwrap(),
        user: owner.into(),
    };

    InMemoryDirectory::new()
        .with_user(user("exp_1", "Ada", Some("acct_ada")))
        .with_user(user("exp_2", "Barbara", None))
        .with_user(user("cus_1", "Grace", None))
        .with_user(user("cus_2", "Edsger", None))
        .with_post(post("post_1", "Compiler reviews", dec!(50.00), "exp_1"))
        .with_post(post("post_2", "Distributed systems", dec!(80.00), "exp_2"))
        .with_post(post("post_3", "Quick questions", dec!(19.99), "exp_1"))
}

pub fn create_request(submission: &str) -> CreateBooking {
    CreateBooking {
        booking_type: BookingType::SingleTextResponse,
        expertise_post_id: "post_1".into(),
        expert_id: "exp_1".into(),
        customer_id: "cus_1".into(),
        customer_submission: submission.into(),
        payment_intent_id: None,
    }
}

pub fn fulfil_request(booking_id: Uuid, response: &str) -> UpdateBooking {
    UpdateBooking {
        booking_id,
        identity: Default::default(),
        patch: BookingPatch {
            expected_status: None,
            status: Some(BookingStatus::Completed),
            expert_response: Some(response.into()),
        },
        charge_payment_intent: true,
    }
}

#[derive(Default)]
struct GatewayState {
    handles: HashMap<String, AuthorizationHandle>,
    issued: u32,
    reject_authorizations: bool,
    capture_failures: u32,
    retrieve_failures: u32,
    delay: Option<Duration>,
    authorize_calls: u32,
    capture_calls: u32,
}

/// Payment gateway double issuing handles `ph_1`, `ph_2`, ... with
/// scriptable failures and latency.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reject_authorizations(&self) {
        self.state.lock().await.reject_authorizations = true;
    }

    pub async fn fail_next_captures(&self, count: u32) {
        self.state.lock().await.capture_failures = count;
    }

    /// Fails the next lookups the way the processor's retrieve endpoint does
    /// on an outage or a revoked key.
    pub async fn fail_next_retrievals(&self, count: u32) {
        self.state.lock().await.retrieve_failures = count;
    }

    pub async fn delay_calls(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    pub async fn status_of(&self, handle_id: &str) -> Option<HandleStatus> {
        self.state
            .lock()
            .await
            .handles
            .get(handle_id)
            .map(|h| h.status)
    }

    pub async fn authorize_calls(&self) -> u32 {
        self.state.lock().await.authorize_calls
    }

    pub async fn capture_calls(&self) -> u32 {
        self.state.lock().await.capture_calls
    }

    async fn pause(&self) {
        let delay = self.state.lock().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn authorize(&self, request: AuthorizationRequest) -> Result<AuthorizationHandle> {
        self.pause().await;
        let mut state = self.state.lock().await;
        state.authorize_calls += 1;
        if state.reject_authorizations {
            return Err(BookingError::AuthorizationFailed("card declined".into()));
        }

        state.issued += 1;
        let id = format!("ph_{}", state.issued);
        let handle = AuthorizationHandle {
            client_secret: Some(format!("{id}_secret")),
            id: id.clone(),
            amount: request.breakdown.amount,
            status: HandleStatus::RequiresCapture,
            metadata: Some(request.metadata),
        };
        state.handles.insert(id, handle.clone());
        Ok(handle)
    }

    async fn retrieve(&self, handle_id: &str) -> Result<AuthorizationHandle> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if state.retrieve_failures > 0 {
            state.retrieve_failures -= 1;
            return Err(BookingError::AuthorizationFailed(
                "processor returned 503 Service Unavailable".into(),
            ));
        }
        state
            .handles
            .get(handle_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(handle_id.to_string()))
    }

    async fn capture(&self, handle_id: &str) -> Result<CaptureResult> {
        self.pause().await;
        let mut state = self.state.lock().await;
        state.capture_calls += 1;
        if state.capture_failures > 0 {
            state.capture_failures -= 1;
            return Err(BookingError::CaptureFailed("processor declined capture".into()));
        }

        let handle = state
            .handles
            .get_mut(handle_id)
            .ok_or_else(|| BookingError::CaptureFailed(handle_id.to_string()))?;
        if handle.status != HandleStatus::RequiresCapture {
            return Err(BookingError::CaptureFailed(format!(
                "{handle_id} is {}",
                handle.status
            )));
        }
        handle.status = HandleStatus::Succeeded;
        Ok(CaptureResult {
            handle_id: handle_id.to_string(),
            amount_captured: handle.amount,
            status: HandleStatus::Succeeded,
        })
    }

    async fn cancel(&self, handle_id: &str) -> Result<AuthorizationHandle> {
        self.pause().await;
        let mut state = self.state.lock().await;
        let handle = state
            .handles
            .get_mut(handle_id)
            .ok_or_else(|| BookingError::NotFound(handle_id.to_string()))?;
        if handle.status != HandleStatus::RequiresCapture {
            return Err(BookingError::ValidationFailed(format!(
                "{handle_id} is {}",
                handle.status
            )));
        }
        handle.status = HandleStatus::Canceled;
        Ok(handle.clone())
    }
}

/// In-memory store that can be told to fail its next writes.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: InMemoryBookingStore,
    create_failures: Arc<Mutex<u32>>,
    update_failures: Arc<Mutex<u32>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next_creates(&self, count: u32) {
        *self.create_failures.lock().await = count;
    }

    pub async fn fail_next_updates(&self, count: u32) {
        *self.update_failures.lock().await = count;
    }

    pub async fn get(&self, id: Uuid) -> Booking {
        self.inner.find_by_id(id).await.unwrap().unwrap()
    }

    pub async fn count(&self) -> usize {
        self.inner
            .list(&BookingFilter::default(), Pagination::unbounded())
            .await
            .unwrap()
            .total_count
    }
}

async fn take_failure(counter: &Mutex<u32>) -> bool {
    let mut remaining = counter.lock().await;
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl BookingStore for FlakyStore {
    async fn create(&self, draft: BookingDraft) -> Result<Booking> {
        if take_failure(&self.create_failures).await {
            return Err(BookingError::Storage("disk full".into()));
        }
        self.inner.create(draft).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Booking>> {
        self.inner.find_by_payment_intent(payment_intent_id).await
    }

    async fn update(&self, id: Uuid, patch: BookingPatch) -> Result<Option<Booking>> {
        if take_failure(&self.update_failures).await {
            return Err(BookingError::Storage("connection reset".into()));
        }
        self.inner.update(id, patch).await
    }

    async fn list(&self, filter: &BookingFilter, pagination: Pagination) -> Result<BookingPage> {
        self.inner.list(filter, pagination).await
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _message: EmailMessage) -> Result<()> {
        Err(BookingError::NotificationFailed("relay unavailable".into()))
    }
}

pub struct Fixture {
    pub orchestrator: Arc<BookingOrchestrator>,
    pub store: FlakyStore,
    pub gateway: ScriptedGateway,
    pub outbox: InMemoryOutbox,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(false, OrchestratorSettings::default())
    }

    pub fn with_failing_notifier() -> Self {
        Self::build(true, OrchestratorSettings::default())
    }

    pub fn with_settings(settings: OrchestratorSettings) -> Self {
        Self::build(false, settings)
    }

    fn build(failing_notifier: bool, settings: OrchestratorSettings) -> Self {
        let store = FlakyStore::new();
        let gateway = ScriptedGateway::new();
        let outbox = InMemoryOutbox::new();
        let notifier: NotifierBox = if failing_notifier {
            Box::new(FailingNotifier)
        } else {
            Box::new(outbox.clone())
        };

        let orchestrator = BookingOrchestrator::new(
            Box::new(store.clone()),
            Box::new(gateway.clone()),
            notifier,
            Box::new(directory()),
            NotificationTemplates::new("SlicedAdvice", "https://slicedadvice.com", 7),
            settings,
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            store,
            gateway,
            outbox,
        }
    }

    pub async fn create(&self, submission: &str) -> Booking {
        self.orchestrator
            .create_booking(create_request(submission))
            .await
            .unwrap()
            .booking
    }

    pub async fn fulfil(&self, booking_id: Uuid) -> Result<BookingUpdated> {
        self.orchestrator
            .update_booking(fulfil_request(booking_id, "Here is my advice."))
            .await
    }
}
