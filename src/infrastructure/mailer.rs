use crate::domain::notification::EmailMessage;
use crate::domain::ports::Notifier;
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info, instrument};

/// Delivers email by POSTing `{ email, subject, message }` to a relay service.
#[derive(Clone)]
pub struct HttpMailRelay {
    client: Client,
    relay_url: String,
}

impl HttpMailRelay {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BookingError::Config(format!("Cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpMailRelay {
    #[instrument(skip(self, message), fields(recipient = %message.email))]
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Mail relay request failed");
                BookingError::NotificationFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookingError::NotificationFailed(format!(
                "mail relay answered {status}"
            )));
        }
        Ok(())
    }
}

/// Writes emails to the log instead of sending them. Used when no relay is
/// configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(
            recipient = %message.email,
            subject = %message.subject,
            body = %message.message,
            "Email (not sent, no mail relay configured)"
        );
        Ok(())
    }
}
