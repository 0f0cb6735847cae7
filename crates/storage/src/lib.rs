//! Frame history and inbound message transport for the ITWS bridge.
//!
//! Provides:
//! - [`HistoryCache`]: rolling, deduplicated frame history
//! - [`MessageSource`]: acknowledged message intake, backed by Redis Streams

pub mod history;
pub mod queue;

pub use history::{
    HistoryCache, HistoryOrder, HistorySnapshot, PushOutcome, DEFAULT_HISTORY_CAPACITY,
};
pub use queue::{
    InboundMessage, MessageSource, PendingCursor, RedisStreamSource, PAYLOAD_FIELD,
    PRODUCT_ID_FIELD,
};
