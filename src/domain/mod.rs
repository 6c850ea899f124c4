//! Domain types and rules, free of I/O.

pub mod booking;
pub mod fees;
pub mod money;
pub mod notification;
pub mod party;
pub mod payment;
pub mod ports;
pub mod query;
