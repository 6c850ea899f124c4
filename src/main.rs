use actix_web::{App, HttpServer, web};
use advice_escrow::application::expiry::spawn_sweeper;
use advice_escrow::application::orchestrator::BookingOrchestrator;
use advice_escrow::config::AppConfig;
use advice_escrow::domain::fees::compute_fees;
use advice_escrow::domain::money::Amount;
use advice_escrow::domain::ports::{
    BookingStoreBox, DirectoryBox, NotifierBox, PaymentGatewayBox,
};
use advice_escrow::infrastructure::directory_seed::DirectorySeed;
use advice_escrow::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryDirectory, SandboxPaymentGateway,
};
use advice_escrow::infrastructure::mailer::{HttpMailRelay, LogNotifier};
#[cfg(feature = "storage-rocksdb")]
use advice_escrow::infrastructure::rocksdb::RocksDBStore;
use advice_escrow::infrastructure::stripe::{StripeGateway, StripeSettings};
use advice_escrow::interfaces::http;
use advice_escrow::telemetry;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the booking API server
    Serve {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Print the customer-facing fees for a price per submission
    Quote {
        /// Price per submission in dollars, e.g. 19.99
        price: String,

        /// Print the quote as JSON
        #[arg(long)]
        json: bool,
    },
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Quote { price, json } => quote(&price, json),
        Command::Serve { config, db_path } => serve(config, db_path).await,
    }
}

fn quote(price: &str, json: bool) -> Result<()> {
    let price = Amount::parse(price).into_diagnostic()?;
    let quote = compute_fees(price.value()).into_diagnostic()?;

    if json {
        println!("{}", serde_json::to_string(&quote).into_diagnostic()?);
    } else {
        println!("Price per submission: {}", quote.price_per_submission);
        println!("Service fee:          {}", quote.service_fee);
        println!("Total:                {}", quote.total);
    }
    Ok(())
}

async fn serve(config_path: Option<PathBuf>, db_path: Option<PathBuf>) -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let mut config = AppConfig::load(config_path.as_deref()).into_diagnostic()?;
    if db_path.is_some() {
        config.storage.db_path = db_path;
    }

    let orchestrator = Arc::new(BookingOrchestrator::new(
        build_store(config.storage.db_path.as_deref())?,
        build_gateway(&config)?,
        build_notifier(&config)?,
        build_directory(&config)?,
        config.notification_templates(),
        config.orchestrator_settings(),
    ));

    let sweeper = spawn_sweeper(orchestrator.clone(), config.expiry_sweep_period());
    let data = web::Data::from(orchestrator);

    info!(
        addr = %config.server_addr(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting booking API"
    );

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(data.clone())
            .configure(http::configure)
    })
    .workers(config.server.workers)
    .bind(config.server_addr())
    .into_diagnostic()?
    .run()
    .await
    .into_diagnostic()?;

    sweeper.abort();
    Ok(())
}

fn build_store(db_path: Option<&Path>) -> Result<BookingStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            info!(path = %path.display(), "Using RocksDB booking store");
            Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryBookingStore::new()))
        }
        None => Ok(Box::new(InMemoryBookingStore::new())),
    }
}

fn build_gateway(config: &AppConfig) -> Result<PaymentGatewayBox> {
    match config.payments.stripe_secret_key.as_deref() {
        Some(key) if !key.is_empty() => {
            let gateway = StripeGateway::new(StripeSettings {
                secret_key: key.to_string(),
                api_base: config.payments.api_base.clone(),
                currency: config.payments.currency.clone(),
                timeout: Duration::from_millis(config.payments.timeout_ms),
            })
            .into_diagnostic()?;
            Ok(Box::new(gateway))
        }
        _ => {
            warn!("No Stripe secret key configured; using the in-memory sandbox processor");
            Ok(Box::new(SandboxPaymentGateway::new()))
        }
    }
}

fn build_notifier(config: &AppConfig) -> Result<NotifierBox> {
    match config.mail.relay_url.as_deref() {
        Some(url) if !url.is_empty() => Ok(Box::new(
            HttpMailRelay::new(url, Duration::from_millis(config.mail.timeout_ms))
                .into_diagnostic()?,
        )),
        _ => {
            warn!("No mail relay configured; emails will only be logged");
            Ok(Box::new(LogNotifier))
        }
    }
}

fn build_directory(config: &AppConfig) -> Result<DirectoryBox> {
    match config.directory.seed_path.as_deref() {
        Some(path) => Ok(Box::new(
            DirectorySeed::load(path).into_diagnostic()?.into_directory(),
        )),
        None => {
            warn!("No directory seed configured; every booking request will fail with NotFound");
            Ok(Box::new(InMemoryDirectory::new()))
        }
    }
}
