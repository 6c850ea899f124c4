use crate::application::notifications::NotificationTemplates;
use crate::domain::booking::{Booking, BookingDraft, BookingPatch, BookingStatus, BookingType};
use crate::domain::fees::{FeeQuote, compute_fees};
use crate::domain::money::Amount;
use crate::domain::notification::EmailMessage;
use crate::domain::party::{ExpertisePost, PartyRef, PostRef, UserProfile};
use crate::domain::payment::{
    AuthorizationHandle, AuthorizationMetadata, AuthorizationRequest, HandleStatus,
};
use crate::domain::ports::{BookingStoreBox, DirectoryBox, NotifierBox, PaymentGatewayBox};
use crate::domain::query::{BookingFilter, BookingPage, Pagination};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Upper bound on any single payment processor call.
    pub gateway_timeout: Duration,
    pub notification_timeout: Duration,
    /// How long an expert has to respond before the hold is released.
    pub response_window: chrono::Duration,
    pub res_per_page: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(15),
            notification_timeout: Duration::from_secs(10),
            response_window: chrono::Duration::days(7),
            res_per_page: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub booking_type: BookingType,
    pub expertise_post_id: String,
    pub expert_id: String,
    pub customer_id: String,
    pub customer_submission: String,
    /// A hold the customer already confirmed. When absent, a new one is
    /// authorized as part of the booking.
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingCreated {
    pub booking: Booking,
    pub client_secret: Option<String>,
    pub expert_notified: bool,
}

/// Request for a hold ahead of booking creation. The `expected_*` fields are
/// what the client displayed; they are checked, never charged.
#[derive(Debug, Clone)]
pub struct AuthorizePayment {
    pub booking_type: BookingType,
    pub expertise_post_id: String,
    pub expert_id: String,
    pub customer_id: String,
    pub expected_total: Option<Decimal>,
    pub expected_service_fee: Option<Decimal>,
    pub expected_destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAuthorized {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub quote: FeeQuote,
}

/// Identity fields a client may echo back on update. Each one present must
/// equal the stored value.
#[derive(Debug, Clone, Default)]
pub struct BookingIdentity {
    pub booking_type: Option<BookingType>,
    pub expert_id: Option<String>,
    pub customer_id: Option<String>,
    pub expertise_post_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub customer_submission: Option<String>,
}

impl BookingIdentity {
    fn verify(&self, booking: &Booking) -> Result<()> {
        fn unchanged(field: &str, echoed: Option<&str>, stored: &str) -> Result<()> {
            match echoed {
                Some(value) if value != stored => Err(BookingError::ValidationFailed(format!(
                    "{field} cannot be changed on an existing booking"
                ))),
                _ => Ok(()),
            }
        }

        if self.booking_type.is_some_and(|t| t != booking.booking_type) {
            return Err(BookingError::ValidationFailed(
                "bookingType cannot be changed on an existing booking".into(),
            ));
        }
        unchanged("expert", self.expert_id.as_deref(), &booking.expert.id)?;
        unchanged("customer", self.customer_id.as_deref(), &booking.customer.id)?;
        unchanged(
            "expertisePost",
            self.expertise_post_id.as_deref(),
            &booking.expertise_post.id,
        )?;
        unchanged(
            "stripePaymentIntentId",
            self.payment_intent_id.as_deref(),
            &booking.stripe_payment_intent_id,
        )?;
        unchanged(
            "customerSubmission",
            self.customer_submission.as_deref(),
            &booking.single_text_response.customer_submission,
        )
    }
}

#[derive(Debug, Clone)]
pub struct UpdateBooking {
    pub booking_id: Uuid,
    pub identity: BookingIdentity,
    pub patch: BookingPatch,
    /// Capture the held payment and complete the booking.
    pub charge_payment_intent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingUpdated {
    pub booking: Booking,
    /// `Some` only when a capture happened and the customer was due an email.
    pub customer_notified: Option<bool>,
}

struct Parties {
    post: ExpertisePost,
    expert: UserProfile,
    customer: UserProfile,
    payout_account: String,
}

/// Drives a booking through its lifecycle.
///
/// Every operation runs its steps strictly in order and holds no state
/// between requests, so one instance is shared by all request handlers.
/// Money moves only through the [`PaymentGateway`](crate::domain::ports::PaymentGateway):
/// a booking is persisted only after a hold exists, and marked completed only
/// after that hold is captured.
pub struct BookingOrchestrator {
    store: BookingStoreBox,
    gateway: PaymentGatewayBox,
    notifier: NotifierBox,
    directory: DirectoryBox,
    templates: NotificationTemplates,
    settings: OrchestratorSettings,
}

impl BookingOrchestrator {
    pub fn new(
        store: BookingStoreBox,
        gateway: PaymentGatewayBox,
        notifier: NotifierBox,
        directory: DirectoryBox,
        templates: NotificationTemplates,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            directory,
            templates,
            settings,
        }
    }

    pub fn res_per_page(&self) -> u32 {
        self.settings.res_per_page
    }

    /// The customer-facing price summary for an expertise post.
    #[instrument(skip(self))]
    pub async fn quote(&self, expertise_post_id: &str) -> Result<FeeQuote> {
        let post = self.load_post(expertise_post_id).await?;
        compute_fees(post.price_per_submission.value())
    }

    /// Places a hold for the server-derived total without creating a booking.
    #[instrument(skip(self, cmd), fields(expertise_post_id = %cmd.expertise_post_id, customer_id = %cmd.customer_id))]
    pub async fn authorize_payment(&self, cmd: AuthorizePayment) -> Result<PaymentAuthorized> {
        let parties = self
            .resolve_parties(&cmd.expertise_post_id, &cmd.expert_id, &cmd.customer_id)
            .await?;
        let quote = compute_fees(parties.post.price_per_submission.value())?;

        matches_quote("total", cmd.expected_total, quote.total)?;
        matches_quote("serviceFee", cmd.expected_service_fee, quote.service_fee)?;
        if let Some(destination) = cmd.expected_destination
            && destination != parties.payout_account
        {
            return Err(BookingError::ValidationFailed(
                "expertStripeId does not match the expert's payout account".into(),
            ));
        }

        let handle = self.authorize(cmd.booking_type, &parties, &quote).await?;
        Ok(PaymentAuthorized {
            payment_intent_id: handle.id,
            client_secret: handle.client_secret,
            quote,
        })
    }

    /// Quote, hold, persist, then tell the expert.
    ///
    /// Nothing is written unless a hold exists. If persisting fails after a
    /// fresh hold was placed, that hold is voided before the error returns.
    #[instrument(skip(self, cmd), fields(expertise_post_id = %cmd.expertise_post_id, customer_id = %cmd.customer_id))]
    pub async fn create_booking(&self, cmd: CreateBooking) -> Result<BookingCreated> {
        let submission = cmd.customer_submission.trim();
        if submission.is_empty() {
            return Err(BookingError::ValidationFailed(
                "customerSubmission must not be empty".into(),
            ));
        }

        let parties = self
            .resolve_parties(&cmd.expertise_post_id, &cmd.expert_id, &cmd.customer_id)
            .await?;
        let quote = compute_fees(parties.post.price_per_submission.value())?;

        let fresh_hold = cmd.payment_intent_id.is_none();
        let handle = match cmd.payment_intent_id.as_deref() {
            Some(existing) => {
                self.verify_hold(existing, cmd.booking_type, &parties, &quote)
                    .await?
            }
            None => self.authorize(cmd.booking_type, &parties, &quote).await?,
        };

        let draft = BookingDraft {
            booking_type: cmd.booking_type,
            expert: PartyRef::from(&parties.expert),
            customer: PartyRef::from(&parties.customer),
            expertise_post: PostRef::from(&parties.post),
            customer_submission: submission.to_string(),
            stripe_payment_intent_id: handle.id.clone(),
            quote,
            response_window: self.settings.response_window,
        };

        let booking = match self.store.create(draft).await {
            Ok(booking) => booking,
            Err(e) => {
                if fresh_hold {
                    self.void_hold(&handle.id).await;
                }
                return Err(e);
            }
        };
        info!(
            booking_id = %booking.id,
            payment_intent_id = %booking.stripe_payment_intent_id,
            total = %booking.total,
            "Booking created"
        );

        let expert_notified = self
            .notify(self.templates.booking_requested(&booking))
            .await;

        Ok(BookingCreated {
            booking,
            client_secret: handle.client_secret,
            expert_notified,
        })
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))
    }

    pub async fn list_bookings(&self, filter: BookingFilter, page: u32) -> Result<BookingPage> {
        self.store
            .list(&filter, Pagination::new(page, self.settings.res_per_page))
            .await
    }

    /// Applies an update, capturing the payment first when asked to.
    ///
    /// With `charge_payment_intent`, the capture must succeed before the
    /// booking is written as `COMPLETED`. A failed capture leaves the booking
    /// untouched in `PENDING_RESPONSE` so the same request can be retried.
    #[instrument(skip(self, cmd), fields(booking_id = %cmd.booking_id, charge = cmd.charge_payment_intent))]
    pub async fn update_booking(&self, cmd: UpdateBooking) -> Result<BookingUpdated> {
        let booking = self.get_booking(cmd.booking_id).await?;
        cmd.identity.verify(&booking)?;

        let mut patch = cmd.patch;
        if let Some(response) = patch.expert_response.as_deref()
            && response.trim().is_empty()
        {
            return Err(BookingError::ValidationFailed(
                "expertResponse must not be empty".into(),
            ));
        }

        if cmd.charge_payment_intent {
            check_completable(&booking, &patch)?;
            self.settle(&booking).await?;
            patch.status = Some(BookingStatus::Completed);
        } else {
            check_edit(&booking, &patch)?;
        }
        patch.expected_status = Some(booking.status);

        // A concurrent request may have completed the booking since it was
        // read; the guarded write lets exactly one of them record it.
        let updated = self
            .store
            .update(booking.id, patch)
            .await
            .map_err(|e| match e {
                BookingError::ValidationFailed(reason) if cmd.charge_payment_intent => {
                    BookingError::CaptureFailed(reason)
                }
                other => other,
            })?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking.id)))?;

        let customer_notified = if cmd.charge_payment_intent {
            info!(booking_id = %updated.id, "Booking completed");
            Some(
                self.notify(self.templates.booking_completed(&updated))
                    .await,
            )
        } else {
            None
        };

        Ok(BookingUpdated {
            booking: updated,
            customer_notified,
        })
    }

    /// Releases the hold on every pending booking whose response window
    /// closed at or before `now`, then marks it `EXPIRED`. A booking whose
    /// hold cannot be released stays pending for the next sweep.
    #[instrument(skip(self))]
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<usize> {
        let filter = BookingFilter {
            status: Some(BookingStatus::PendingResponse),
            deadline_before: Some(now),
            ..Default::default()
        };
        let overdue = self.store.list(&filter, Pagination::unbounded()).await?;

        let mut expired = 0;
        for booking in overdue.items {
            if !booking.status.can_transition_to(BookingStatus::Expired) {
                continue;
            }
            if let Err(e) = self.release_hold(&booking).await {
                warn!(booking_id = %booking.id, error = %e, "Could not release hold for overdue booking");
                continue;
            }

            let patch = BookingPatch {
                expected_status: Some(booking.status),
                status: Some(BookingStatus::Expired),
                expert_response: None,
            };
            match self.store.update(booking.id, patch).await {
                Ok(Some(_)) => {
                    info!(booking_id = %booking.id, "Booking expired");
                    expired += 1;
                }
                Ok(None) => {}
                Err(BookingError::ValidationFailed(reason)) => {
                    warn!(booking_id = %booking.id, %reason, "Booking changed while expiring");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    async fn load_post(&self, expertise_post_id: &str) -> Result<ExpertisePost> {
        self.directory
            .expertise_post(expertise_post_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("expertise post {expertise_post_id}")))
    }

    async fn resolve_parties(
        &self,
        expertise_post_id: &str,
        expert_id: &str,
        customer_id: &str,
    ) -> Result<Parties> {
        let post = self.load_post(expertise_post_id).await?;
        if post.user != expert_id {
            return Err(BookingError::ValidationFailed(format!(
                "expert {expert_id} does not own expertise post {expertise_post_id}"
            )));
        }

        let expert = self
            .directory
            .user(expert_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("expert {expert_id}")))?;
        let customer = self
            .directory
            .user(customer_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("customer {customer_id}")))?;

        if customer.id == expert.id {
            return Err(BookingError::ValidationFailed(
                "experts cannot book their own expertise posts".into(),
            ));
        }

        let payout_account = expert
            .stripe_account_id
            .clone()
            .filter(|account| !account.is_empty())
            .ok_or_else(|| {
                BookingError::ValidationFailed(format!(
                    "expert {expert_id} has not finished payout onboarding"
                ))
            })?;

        Ok(Parties {
            post,
            expert,
            customer,
            payout_account,
        })
    }

    async fn authorize(
        &self,
        booking_type: BookingType,
        parties: &Parties,
        quote: &FeeQuote,
    ) -> Result<AuthorizationHandle> {
        let request = AuthorizationRequest::new(
            quote.total,
            quote.service_fee,
            parties.payout_account.clone(),
            metadata_for(booking_type, parties),
        )?;

        let handle = self
            .call_gateway("payment authorization", self.gateway.authorize(request))
            .await?;
        info!(payment_intent_id = %handle.id, amount = %handle.amount, "Payment authorized");
        Ok(handle)
    }

    /// Accepts a client-confirmed hold only if it is unused, still held, for
    /// the server-derived amount, and issued for this post and these parties.
    async fn verify_hold(
        &self,
        payment_intent_id: &str,
        booking_type: BookingType,
        parties: &Parties,
        quote: &FeeQuote,
    ) -> Result<AuthorizationHandle> {
        if self
            .store
            .find_by_payment_intent(payment_intent_id)
            .await?
            .is_some()
        {
            return Err(BookingError::AuthorizationFailed(format!(
                "payment intent {payment_intent_id} already belongs to a booking"
            )));
        }

        let handle = self
            .call_gateway("payment retrieval", self.gateway.retrieve(payment_intent_id))
            .await
            .map_err(|e| match e {
                BookingError::NotFound(what) => BookingError::AuthorizationFailed(what),
                other => other,
            })?;

        if handle.status != HandleStatus::RequiresCapture {
            return Err(BookingError::AuthorizationFailed(format!(
                "payment intent {payment_intent_id} is {}, expected requires_capture",
                handle.status
            )));
        }
        if handle.amount != quote.total.to_cents() {
            return Err(BookingError::AuthorizationFailed(format!(
                "payment intent {payment_intent_id} holds {} cents, expected {}",
                handle.amount,
                quote.total.to_cents()
            )));
        }

        let expected = metadata_for(booking_type, parties);
        let issued_for_booking = handle.metadata.as_ref().is_some_and(|m| {
            m.booking_type == expected.booking_type
                && m.expertise_post_id == expected.expertise_post_id
                && m.expert_id == expected.expert_id
                && m.customer_id == expected.customer_id
        });
        if !issued_for_booking {
            return Err(BookingError::AuthorizationFailed(format!(
                "payment intent {payment_intent_id} was not issued for this booking"
            )));
        }

        debug!(payment_intent_id, "Reusing confirmed hold");
        Ok(handle)
    }

    /// Captures the booking's hold. A hold that is already captured counts as
    /// settled only while the booking is still pending: a previous attempt
    /// moved the money but never recorded it.
    async fn settle(&self, booking: &Booking) -> Result<()> {
        let id = booking.stripe_payment_intent_id.as_str();
        let handle = self
            .call_gateway("payment retrieval", self.gateway.retrieve(id))
            .await
            .map_err(capture_failure)?;

        match handle.status {
            HandleStatus::RequiresCapture => {
                let result = self
                    .call_gateway("payment capture", self.gateway.capture(id))
                    .await
                    .map_err(capture_failure)?;
                if result.status != HandleStatus::Succeeded {
                    return Err(BookingError::CaptureFailed(format!(
                        "payment intent {id} is {} after capture",
                        result.status
                    )));
                }
                info!(payment_intent_id = id, amount = %result.amount_captured, "Payment captured");
            }
            HandleStatus::Succeeded => {
                let current = self.get_booking(booking.id).await?;
                if current.status != BookingStatus::PendingResponse {
                    return Err(BookingError::CaptureFailed(format!(
                        "payment intent {id} was already captured for booking {} ({})",
                        current.id, current.status
                    )));
                }
                warn!(
                    booking_id = %booking.id,
                    payment_intent_id = id,
                    "Payment already captured; recording completion without a second capture"
                );
            }
            other => {
                return Err(BookingError::CaptureFailed(format!(
                    "payment intent {id} is {other} and cannot be captured"
                )));
            }
        }
        Ok(())
    }

    async fn release_hold(&self, booking: &Booking) -> Result<()> {
        let id = booking.stripe_payment_intent_id.as_str();
        let handle = self
            .call_gateway("payment retrieval", self.gateway.retrieve(id))
            .await?;

        match handle.status {
            HandleStatus::Canceled => Ok(()),
            HandleStatus::Succeeded => Err(BookingError::ValidationFailed(format!(
                "payment intent {id} was already captured"
            ))),
            _ => {
                self.call_gateway("payment cancellation", self.gateway.cancel(id))
                    .await?;
                Ok(())
            }
        }
    }

    async fn void_hold(&self, payment_intent_id: &str) {
        match self
            .call_gateway("payment cancellation", self.gateway.cancel(payment_intent_id))
            .await
        {
            Ok(_) => info!(payment_intent_id, "Voided hold after failed booking write"),
            Err(e) => warn!(payment_intent_id, error = %e, "Failed to void hold after failed booking write"),
        }
    }

    async fn call_gateway<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.settings.gateway_timeout, call)
            .await
            .map_err(|_| {
                warn!(operation, "Payment gateway call timed out");
                BookingError::Timeout(operation.to_string())
            })?
    }

    /// Best effort: a failed send is logged and reported as `false`, and never
    /// undoes the state change that triggered it.
    async fn notify(&self, message: EmailMessage) -> bool {
        let recipient = message.email.clone();
        let outcome = tokio::time::timeout(
            self.settings.notification_timeout,
            self.notifier.send(message),
        )
        .await
        .unwrap_or_else(|_| Err(BookingError::NotificationFailed("timed out".into())));

        match outcome {
            Ok(()) => {
                debug!(%recipient, "Notification sent");
                true
            }
            Err(e) => {
                warn!(%recipient, error = %e, "Notification failed");
                false
            }
        }
    }
}

fn metadata_for(booking_type: BookingType, parties: &Parties) -> AuthorizationMetadata {
    AuthorizationMetadata {
        booking_type,
        expertise_post_id: parties.post.id.clone(),
        expert_id: parties.expert.id.clone(),
        customer_id: parties.customer.id.clone(),
        status: BookingStatus::PendingResponse,
    }
}

fn matches_quote(field: &str, shown: Option<Decimal>, derived: Amount) -> Result<()> {
    match shown {
        Some(value) if value != derived.value() => Err(BookingError::ValidationFailed(format!(
            "{field} {value} does not match the current price of {derived}"
        ))),
        _ => Ok(()),
    }
}

fn check_completable(booking: &Booking, patch: &BookingPatch) -> Result<()> {
    if booking.status == BookingStatus::Completed {
        return Err(BookingError::CaptureFailed(format!(
            "booking {} is already completed and its payment captured",
            booking.id
        )));
    }
    if !booking.status.can_transition_to(BookingStatus::Completed) {
        return Err(BookingError::ValidationFailed(format!(
            "booking {} is {} and cannot be charged",
            booking.id, booking.status
        )));
    }

    if let Some(status) = patch.status
        && status != BookingStatus::Completed
    {
        return Err(BookingError::ValidationFailed(format!(
            "charging a booking completes it; status {status} was requested"
        )));
    }

    let has_response = patch
        .expert_response
        .as_deref()
        .or(booking.single_text_response.expert_response.as_deref())
        .is_some_and(|r| !r.trim().is_empty());
    if !has_response {
        return Err(BookingError::ValidationFailed(
            "an expert response is required to complete a booking".into(),
        ));
    }
    Ok(())
}

/// An edit without a charge never changes status: `COMPLETED` needs the
/// capture and `EXPIRED` needs the hold released by the sweeper.
fn check_edit(booking: &Booking, patch: &BookingPatch) -> Result<()> {
    if let Some(status) = patch.status
        && status != booking.status
    {
        return Err(BookingError::ValidationFailed(
            if !booking.status.can_transition_to(status) {
                format!("booking cannot move from {} to {status}", booking.status)
            } else if status == BookingStatus::Completed {
                "completing a booking requires chargePaymentIntent".to_string()
            } else {
                format!("{status} is set only once the payment hold is released")
            },
        ));
    }
    if booking.status.is_terminal() && patch.expert_response.is_some() {
        return Err(BookingError::ValidationFailed(format!(
            "booking is {} and can no longer be edited",
            booking.status
        )));
    }
    Ok(())
}

/// Processor failures on the charge path surface as `CaptureFailed`, except
/// timeouts, which stay retryable as `Timeout`.
fn capture_failure(error: BookingError) -> BookingError {
    match error {
        BookingError::Timeout(_) | BookingError::CaptureFailed(_) => error,
        BookingError::NotFound(reason)
        | BookingError::AuthorizationFailed(reason)
        | BookingError::ValidationFailed(reason) => BookingError::CaptureFailed(reason),
        other => BookingError::CaptureFailed(other.to_string()),
    }
}
