//! ITWS radar bridge service.
//!
//! Consumes ITWS product messages, keeps a short frame history and posts it
//! to the weather ingestion API, acknowledging each message only once its
//! document was accepted.

pub mod config;
pub mod metrics;
pub mod pipeline;

pub use config::BridgeConfig;
pub use pipeline::{Bridge, Outcome, SkipReason};
