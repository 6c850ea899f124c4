//! Adapters for the domain ports.

pub mod directory_seed;
pub mod in_memory;
pub mod mailer;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod stripe;
