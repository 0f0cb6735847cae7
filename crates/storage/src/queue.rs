//! Inbound product messages from Redis Streams.
//!
//! Entries carry the product XML in a `payload` field and optionally a
//! numeric `productID`. Reads go through a consumer group so that entries
//! left un-acknowledged (a crash mid-forward, or a decode failure without
//! force-ack) are redelivered: on start the consumer walks its own pending
//! list once, oldest first, then switches to new entries. Entries that fail
//! again during that walk stay pending and are passed over.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{aio::MultiplexedConnection, streams::*, AsyncCommands, Client};
use tracing::{debug, info};

use wx_common::{WxError, WxResult};

/// Stream entry field holding the product document.
pub const PAYLOAD_FIELD: &str = "payload";

/// Stream entry field holding the numeric product identifier.
pub const PRODUCT_ID_FIELD: &str = "productID";

/// One received product message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Transport identifier used for acknowledgment
    pub id: String,
    pub payload: Bytes,
    /// Product identifier carried alongside the payload, if any
    pub product_id: Option<i64>,
}

impl InboundMessage {
    pub fn new(id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            product_id: None,
        }
    }

    pub fn with_product_id(mut self, product_id: i64) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Cut the payload to at most `max_bytes`. Returns whether it was cut.
    pub fn truncate(&mut self, max_bytes: usize) -> bool {
        if self.payload.len() > max_bytes {
            self.payload.truncate(max_bytes);
            true
        } else {
            false
        }
    }
}

/// Source of product messages with explicit acknowledgment.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait up to `timeout` for the next message.
    async fn receive(&mut self, timeout: Duration) -> WxResult<Option<InboundMessage>>;

    /// Mark a message as processed so it is not redelivered.
    async fn acknowledge(&mut self, message: &InboundMessage) -> WxResult<()>;
}

/// Redis error code returned by `XGROUP CREATE` for an existing group.
const BUSYGROUP: &str = "BUSYGROUP";

/// Position in the consumer's pending list during the startup walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCursor {
    next_start: Option<String>,
}

impl PendingCursor {
    pub fn new() -> Self {
        Self {
            next_start: Some("0".to_string()),
        }
    }

    /// Start id for the next pending read, or `None` once the walk is done.
    pub fn start_id(&self) -> Option<&str> {
        self.next_start.as_deref()
    }

    pub fn is_drained(&self) -> bool {
        self.next_start.is_none()
    }

    /// Record the result of a pending read. Reads return entries after the
    /// start id, so the next one starts at the entry just delivered.
    pub fn advance(&mut self, delivered: Option<&str>) {
        self.next_start = delivered.map(str::to_string);
    }
}

impl Default for PendingCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer-group reader over one Redis stream.
pub struct RedisStreamSource {
    conn: MultiplexedConnection,
    stream: String,
    group: String,
    consumer: String,
    pending: PendingCursor,
}

impl RedisStreamSource {
    /// Connect and make sure the stream and consumer group exist.
    pub async fn connect(
        redis_url: &str,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> WxResult<Self> {
        let stream = stream.into();
        let group = group.into();

        let client = Client::open(redis_url)
            .map_err(|e| WxError::QueueError(format!("Redis connection failed: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| WxError::QueueError(format!("Redis connection failed: {}", e)))?;

        let created: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&stream)
            .arg(&group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match created {
            Ok(()) => info!(stream = %stream, group = %group, "Created consumer group"),
            Err(e) if is_existing_group(e.code()) => {
                debug!(stream = %stream, group = %group, "Consumer group already exists")
            }
            Err(e) => {
                return Err(WxError::QueueError(format!(
                    "Failed to create consumer group '{}' on '{}': {}",
                    group, stream, e
                )))
            }
        }

        Ok(Self {
            conn,
            stream,
            group,
            consumer: consumer.into(),
            pending: PendingCursor::new(),
        })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    async fn read(&mut self, start_id: &str, timeout: Duration) -> WxResult<Option<InboundMessage>> {
        let block_ms = usize::try_from(timeout.as_millis()).unwrap_or(usize::MAX).max(1);
        let opts = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1)
            .block(block_ms);

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.stream], &[start_id], &opts)
            .await
            .map_err(|e| WxError::QueueError(format!("Read failed: {}", e)))?;

        let Some(reply) = reply else {
            return Ok(None);
        };

        for stream_key in reply.keys {
            if let Some(entry) = stream_key.ids.into_iter().next() {
                return Ok(Some(message_from_entry(entry)));
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl MessageSource for RedisStreamSource {
    async fn receive(&mut self, timeout: Duration) -> WxResult<Option<InboundMessage>> {
        if let Some(start) = self.pending.start_id().map(str::to_string) {
            let message = self.read(&start, timeout).await?;
            self.pending.advance(message.as_ref().map(|m| m.id.as_str()));
            match message {
                Some(message) => {
                    debug!(id = %message.id, "Redelivering pending message");
                    return Ok(Some(message));
                }
                None => info!(stream = %self.stream, "Pending backlog drained"),
            }
        }

        self.read(">", timeout).await
    }

    async fn acknowledge(&mut self, message: &InboundMessage) -> WxResult<()> {
        let _: i64 = self
            .conn
            .xack(&self.stream, &self.group, &[&message.id])
            .await
            .map_err(|e| WxError::QueueError(format!("XACK failed: {}", e)))?;
        Ok(())
    }
}

fn is_existing_group(code: Option<&str>) -> bool {
    code == Some(BUSYGROUP)
}

fn message_from_entry(entry: StreamId) -> InboundMessage {
    let payload = entry
        .map
        .get(PAYLOAD_FIELD)
        .and_then(|v| redis::from_redis_value::<Vec<u8>>(v).ok());
    let product_id = entry
        .map
        .get(PRODUCT_ID_FIELD)
        .and_then(|v| redis::from_redis_value::<String>(v).ok());

    build_message(entry.id, payload, product_id.as_deref())
}

fn build_message(id: String, payload: Option<Vec<u8>>, product_id: Option<&str>) -> InboundMessage {
    InboundMessage {
        id,
        payload: Bytes::from(payload.unwrap_or_default()),
        product_id: product_id.and_then(|s| s.trim().parse().ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message() {
        let message = build_message(
            "1700000000000-0".to_string(),
            Some(b"<itws_msg/>".to_vec()),
            Some(" 9901"),
        );
        assert_eq!(message.id, "1700000000000-0");
        assert_eq!(message.payload.as_ref(), b"<itws_msg/>");
        assert_eq!(message.product_id, Some(9901));
    }

    #[test]
    fn test_message_without_fields() {
        let message = build_message("1-0".to_string(), None, Some("n/a"));
        assert!(message.payload.is_empty());
        assert_eq!(message.product_id, None);
    }

    #[test]
    fn test_truncate() {
        let mut message = InboundMessage::new("1-0", &b"0123456789"[..]);
        assert!(!message.truncate(10));
        assert!(message.truncate(4));
        assert_eq!(message.payload.as_ref(), b"0123");
    }

    #[test]
    fn test_with_product_id() {
        let message = InboundMessage::new("1-0", Bytes::new()).with_product_id(9905);
        assert_eq!(message.product_id, Some(9905));
    }

    #[test]
    fn test_pending_cursor_walks_past_delivered_entries() {
        let mut cursor = PendingCursor::new();
        assert_eq!(cursor.start_id(), Some("0"));

        // A redelivered entry that fails again must not be read twice
        cursor.advance(Some("1700000000000-0"));
        assert_eq!(cursor.start_id(), Some("1700000000000-0"));
        cursor.advance(Some("1700000000300-0"));
        assert_eq!(cursor.start_id(), Some("1700000000300-0"));
        assert!(!cursor.is_drained());

        cursor.advance(None);
        assert!(cursor.is_drained());
        assert_eq!(cursor.start_id(), None);
    }

    #[test]
    fn test_empty_pending_list_drains_immediately() {
        let mut cursor = PendingCursor::default();
        cursor.advance(None);
        assert!(cursor.is_drained());
    }

    #[test]
    fn test_only_busygroup_is_tolerated() {
        assert!(is_existing_group(Some("BUSYGROUP")));
        assert!(!is_existing_group(Some("WRONGTYPE")));
        assert!(!is_existing_group(Some("NOAUTH")));
        assert!(!is_existing_group(None));
    }
}
