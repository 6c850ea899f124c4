use crate::application::orchestrator::BookingOrchestrator;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Runs [`BookingOrchestrator::expire_overdue`] every `period` until the
/// returned task is aborted.
pub fn spawn_sweeper(orchestrator: Arc<BookingOrchestrator>, period: Duration) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "Starting booking expiry sweeper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match orchestrator.expire_overdue(Utc::now()).await {
                Ok(0) => debug!("No overdue bookings"),
                Ok(expired) => info!(expired, "Expired overdue bookings"),
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    })
}
