//! Application layer: the booking lifecycle and its background jobs.
//!
//! `BookingOrchestrator` sequences every step that touches money. It holds
//! only boxed ports, so the same orchestration runs against the sandbox or
//! Stripe, in memory or on RocksDB.

pub mod expiry;
pub mod notifications;
pub mod orchestrator;
