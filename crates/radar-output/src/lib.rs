//! Output side of the ITWS bridge.
//!
//! - [`json`]: append-only JSON builder
//! - [`encoder`]: the two history document shapes
//! - [`forwarder`]: HTTP delivery that only returns once the document is accepted

pub mod encoder;
pub mod error;
pub mod forwarder;
pub mod json;

pub use encoder::{encode_history, OutputShape};
pub use error::ForwardError;
pub use forwarder::{DocumentSink, ForwardReport, ForwarderConfig, ReliableForwarder, RetryPolicy};
pub use json::JsonWriter;
