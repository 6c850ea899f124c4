//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `ESCROW__`-prefixed environment variables
//! (`ESCROW__PAYMENTS__STRIPE_SECRET_KEY`, `ESCROW__SERVER__PORT`, ...).

use crate::application::notifications::NotificationTemplates;
use crate::application::orchestrator::OrchestratorSettings;
use crate::error::{BookingError, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest page size a deployment may configure.
pub const MAX_RES_PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub bookings: BookingsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

/// Payment processor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// Stripe secret key. Without it the in-memory sandbox processor is used.
    pub stripe_secret_key: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_payments_timeout")]
    pub timeout_ms: u64,
}

fn default_api_base() -> String {
    crate::infrastructure::stripe::STRIPE_API_BASE.to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_payments_timeout() -> u64 {
    15_000
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            api_base: default_api_base(),
            currency: default_currency(),
            timeout_ms: default_payments_timeout(),
        }
    }
}

/// Outbound email configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    /// Mail relay endpoint. Without it emails are only logged.
    pub relay_url: Option<String>,
    #[serde(default = "default_mail_timeout")]
    pub timeout_ms: u64,
}

fn default_mail_timeout() -> u64 {
    10_000
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            timeout_ms: default_mail_timeout(),
        }
    }
}

/// Booking lifecycle configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BookingsConfig {
    #[serde(default = "default_brand")]
    pub brand: String,
    /// Base URL used for dashboard links in emails.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_res_per_page")]
    pub res_per_page: u32,
    #[serde(default = "default_response_window")]
    pub response_window_days: i64,
    #[serde(default = "default_sweep")]
    pub expiry_sweep_secs: u64,
}

fn default_brand() -> String {
    "SlicedAdvice".to_string()
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_res_per_page() -> u32 {
    20
}

fn default_response_window() -> i64 {
    7
}

fn default_sweep() -> u64 {
    300
}

impl Default for BookingsConfig {
    fn default() -> Self {
        Self {
            brand: default_brand(),
            site_url: default_site_url(),
            res_per_page: default_res_per_page(),
            response_window_days: default_response_window(),
            expiry_sweep_secs: default_sweep(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// RocksDB directory. Requires the `storage-rocksdb` feature.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DirectoryConfig {
    /// JSON file of users and expertise posts.
    pub seed_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix("ESCROW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BookingError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_RES_PER_PAGE).contains(&self.bookings.res_per_page) {
            return Err(BookingError::Config(format!(
                "bookings.res_per_page must be between 1 and {MAX_RES_PER_PAGE}"
            )));
        }
        if self.bookings.response_window_days < 1 {
            return Err(BookingError::Config(
                "bookings.response_window_days must be at least 1".into(),
            ));
        }
        if self.bookings.expiry_sweep_secs == 0 {
            return Err(BookingError::Config(
                "bookings.expiry_sweep_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            gateway_timeout: Duration::from_millis(self.payments.timeout_ms),
            notification_timeout: Duration::from_millis(self.mail.timeout_ms),
            response_window: chrono::Duration::days(self.bookings.response_window_days),
            res_per_page: self.bookings.res_per_page,
        }
    }

    pub fn notification_templates(&self) -> NotificationTemplates {
        NotificationTemplates::new(
            self.bookings.brand.clone(),
            self.bookings.site_url.clone(),
            self.bookings.response_window_days,
        )
    }

    pub fn expiry_sweep_period(&self) -> Duration {
        Duration::from_secs(self.bookings.expiry_sweep_secs)
    }
}
