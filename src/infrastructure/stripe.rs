//! Stripe-backed payment gateway using manual-capture PaymentIntents.

use crate::domain::booking::{BookingStatus, BookingType};
use crate::domain::money::Cents;
use crate::domain::payment::{
    AuthorizationHandle, AuthorizationMetadata, AuthorizationRequest, CaptureResult, HandleStatus,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, instrument};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub api_base: String,
    pub currency: String,
    pub timeout: Duration,
}

/// Stripe payment gateway
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    settings: StripeSettings,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    amount: i64,
    #[serde(default)]
    amount_received: i64,
    status: String,
    client_secret: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(settings: StripeSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| BookingError::Config(format!("Cannot build HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    /// Make authenticated request to Stripe.
    ///
    /// 404 maps to `NotFound` and client timeouts to `Timeout`; every other
    /// failure goes through `failure` so each call reports its own kind.
    async fn stripe_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        form: Option<&[(String, String)]>,
        failure: fn(String) -> BookingError,
    ) -> Result<T> {
        let url = format!("{}{endpoint}", self.settings.api_base);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.settings.secret_key, Option::<&str>::None);

        if let Some(form_data) = form {
            request = request.form(form_data);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, endpoint, "Stripe API request failed");
            if e.is_timeout() {
                BookingError::Timeout(format!("Stripe {endpoint}"))
            } else {
                failure(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Stripe API error");
            return Err(error_from_response(status, &body, failure));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            failure(e.to_string())
        })
    }
}

/// Turns a non-2xx Stripe response into a domain error, preferring the
/// message from Stripe's `{"error": {...}}` envelope.
fn error_from_response(
    status: StatusCode,
    body: &str,
    failure: fn(String) -> BookingError,
) -> BookingError {
    let message = serde_json::from_str::<StripeErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| format!("Stripe API error: {status}"));
    if status == StatusCode::NOT_FOUND {
        BookingError::NotFound(message)
    } else {
        failure(message)
    }
}

/// Form body for `POST /payment_intents`.
pub fn authorization_form(request: &AuthorizationRequest, currency: &str) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), request.breakdown.amount.to_string()),
        ("currency".to_string(), currency.to_string()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ("capture_method".to_string(), "manual".to_string()),
        (
            "application_fee_amount".to_string(),
            request.breakdown.application_fee.to_string(),
        ),
        (
            "transfer_data[destination]".to_string(),
            request.destination.clone(),
        ),
        ("description".to_string(), request.description.clone()),
    ];
    form.extend(
        request
            .metadata
            .pairs()
            .into_iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value)),
    );
    form
}

fn parse_metadata(metadata: &HashMap<String, String>) -> Option<AuthorizationMetadata> {
    fn wire<T: DeserializeOwned>(value: &str) -> Option<T> {
        serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
    }

    Some(AuthorizationMetadata {
        booking_type: wire::<BookingType>(metadata.get("bookingType")?)?,
        expertise_post_id: metadata.get("expertisePostId")?.clone(),
        expert_id: metadata.get("expertId")?.clone(),
        customer_id: metadata.get("customerId")?.clone(),
        status: wire::<BookingStatus>(metadata.get("status")?)?,
    })
}

impl From<StripePaymentIntent> for AuthorizationHandle {
    fn from(intent: StripePaymentIntent) -> Self {
        Self {
            metadata: parse_metadata(&intent.metadata),
            status: HandleStatus::from_processor(&intent.status),
            amount: Cents(intent.amount),
            client_secret: intent.client_secret,
            id: intent.id,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(destination = %request.destination, amount = %request.breakdown.amount))]
    async fn authorize(&self, request: AuthorizationRequest) -> Result<AuthorizationHandle> {
        debug!("Creating payment intent");
        let form = authorization_form(&request, &self.settings.currency);
        let intent: StripePaymentIntent = self
            .stripe_request(
                Method::POST,
                "/payment_intents",
                Some(&form),
                BookingError::AuthorizationFailed,
            )
            .await?;
        Ok(intent.into())
    }

    #[instrument(skip(self))]
    async fn retrieve(&self, handle_id: &str) -> Result<AuthorizationHandle> {
        let intent: StripePaymentIntent = self
            .stripe_request(
                Method::GET,
                &format!("/payment_intents/{handle_id}"),
                None,
                BookingError::AuthorizationFailed,
            )
            .await?;
        Ok(intent.into())
    }

    #[instrument(skip(self))]
    async fn capture(&self, handle_id: &str) -> Result<CaptureResult> {
        debug!("Capturing payment intent");
        let intent: StripePaymentIntent = self
            .stripe_request(
                Method::POST,
                &format!("/payment_intents/{handle_id}/capture"),
                None,
                BookingError::CaptureFailed,
            )
            .await
            .map_err(|e| match e {
                BookingError::NotFound(message) => BookingError::CaptureFailed(message),
                other => other,
            })?;

        Ok(CaptureResult {
            handle_id: intent.id,
            amount_captured: Cents(intent.amount_received),
            status: HandleStatus::from_processor(&intent.status),
        })
    }

    #[instrument(skip(self))]
    async fn cancel(&self, handle_id: &str) -> Result<AuthorizationHandle> {
        debug!("Canceling payment intent");
        let intent: StripePaymentIntent = self
            .stripe_request(
                Method::POST,
                &format!("/payment_intents/{handle_id}/cancel"),
                None,
                BookingError::ValidationFailed,
            )
            .await?;
        Ok(intent.into())
    }
}
