//! Per-message processing and the steady-state consume loop.
//!
//! Messages are handled one at a time in receipt order:
//! gate by product id, decode, push into the history, encode the history and
//! hand it to the sink. The sink only returns once the document was accepted,
//! which is what makes acknowledging afterwards safe.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use itws_parser::{decode_frame, DecoderConfig};
use radar_output::{encode_history, DocumentSink, OutputShape};
use storage::{HistoryCache, InboundMessage, MessageSource, PushOutcome};
use wx_common::{now_epoch_ms, WxResult};

use crate::config::BridgeConfig;
use crate::metrics::{self, ErrorStage};

/// Pause after a transport error before polling again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Why a message was dropped without producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The message's product id is not the target product
    OtherProduct,
    /// No usable grid (no payload, zero cells, unresolvable dimensions)
    NoFrame,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::OtherProduct => "other_product",
            SkipReason::NoFrame => "no_frame",
        }
    }
}

/// Result of processing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// History document accepted downstream
    Forwarded { frames: usize, attempts: u32 },
    /// Same generation time as the newest cached frame; nothing sent
    Duplicate,
    Skipped(SkipReason),
    /// Decoding, encoding or delivery failed
    Failed(String),
}

impl Outcome {
    /// Whether the source message may be acknowledged.
    ///
    /// Failures are left for redelivery unless `ack_on_error` is set.
    pub fn should_ack(&self, ack_on_error: bool) -> bool {
        match self {
            Outcome::Failed(_) => ack_on_error,
            _ => true,
        }
    }
}

/// Pipeline knobs taken from [`BridgeConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub decoder: DecoderConfig,
    pub shape: OutputShape,
    pub history_capacity: usize,
    pub product_filter: Option<i64>,
    pub max_payload_bytes: usize,
    pub ack_on_exception: bool,
    pub heartbeat_interval: Duration,
    pub receive_timeout: Duration,
}

impl From<&BridgeConfig> for PipelineSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            decoder: config.decoder_config(),
            shape: config.output_shape,
            history_capacity: config.history_capacity,
            product_filter: config.product_filter(),
            max_payload_bytes: config.max_payload_bytes,
            ack_on_exception: config.ack_on_exception,
            heartbeat_interval: config.heartbeat_interval,
            receive_timeout: config.receive_timeout,
        }
    }
}

/// Single-worker bridge from a message source to a document sink.
pub struct Bridge<K: DocumentSink> {
    settings: PipelineSettings,
    history: HistoryCache,
    sink: K,
    empty_polls: u64,
    last_heartbeat: Instant,
}

impl<K: DocumentSink> Bridge<K> {
    pub fn new(settings: PipelineSettings, sink: K) -> Self {
        let history = HistoryCache::new(settings.history_capacity, settings.shape.history_order());
        Self {
            settings,
            history,
            sink,
            empty_polls: 0,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process one message. Never fails; errors become [`Outcome::Failed`].
    #[instrument(skip(self, message), fields(id = %message.id, bytes = message.payload.len()))]
    pub async fn handle(&mut self, message: &mut InboundMessage) -> Outcome {
        metrics::record_message();

        if let (Some(target), Some(actual)) = (self.settings.product_filter, message.product_id) {
            if target != actual {
                debug!(target = target, actual = actual, "Skipping non-target product");
                metrics::record_skipped(SkipReason::OtherProduct.as_str());
                return Outcome::Skipped(SkipReason::OtherProduct);
            }
        }

        if message.truncate(self.settings.max_payload_bytes) {
            warn!(
                limit = self.settings.max_payload_bytes,
                "Payload exceeds size limit, truncated"
            );
        }

        let frame = match decode_frame(&message.payload, now_epoch_ms(), &self.settings.decoder) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Message holds no usable grid");
                metrics::record_skipped(SkipReason::NoFrame.as_str());
                return Outcome::Skipped(SkipReason::NoFrame);
            }
            Err(e) => {
                error!(error = %e, "Failed to decode message");
                metrics::record_error(ErrorStage::Decode);
                return Outcome::Failed(e.to_string());
            }
        };

        if frame.has_dimension_mismatch() {
            metrics::record_dimension_mismatch();
        }

        match self.history.push(frame) {
            PushOutcome::Duplicate => {
                debug!("Duplicate generation time, history unchanged");
                metrics::record_duplicate();
                return Outcome::Duplicate;
            }
            PushOutcome::Reset { discarded } => {
                info!(discarded = discarded, "Grid geometry changed, history reset");
                metrics::record_history_reset();
            }
            PushOutcome::Inserted { .. } => {}
        }
        metrics::set_history_frames(self.history.len());

        self.forward_history().await
    }

    async fn forward_history(&self) -> Outcome {
        let snapshot = self.history.snapshot();
        let document = match encode_history(&snapshot, self.settings.shape, now_epoch_ms()) {
            Ok(document) => document,
            Err(e) => {
                error!(error = %e, "Failed to encode history");
                metrics::record_error(ErrorStage::Encode);
                return Outcome::Failed(e.to_string());
            }
        };

        match self.sink.forward(document).await {
            Ok(report) => {
                metrics::record_forward_attempts(report.attempts);
                metrics::record_forward_success();
                info!(
                    frames = snapshot.len(),
                    newest = %snapshot.newest().map(|f| f.generated_iso()).unwrap_or_default(),
                    max_level_all = snapshot.max_level(),
                    attempts = report.attempts,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "POST OK"
                );
                Outcome::Forwarded {
                    frames: snapshot.len(),
                    attempts: report.attempts,
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to forward history");
                metrics::record_error(ErrorStage::Forward);
                Outcome::Failed(e.to_string())
            }
        }
    }

    /// Receive and process at most one message.
    ///
    /// Returns `Ok(None)` on an empty poll.
    pub async fn process_next<S: MessageSource>(
        &mut self,
        source: &mut S,
    ) -> WxResult<Option<Outcome>> {
        let Some(mut message) = source.receive(self.settings.receive_timeout).await? else {
            self.on_empty_poll();
            return Ok(None);
        };

        let outcome = self.handle(&mut message).await;

        if outcome.should_ack(self.settings.ack_on_exception) {
            if let Err(e) = source.acknowledge(&message).await {
                warn!(id = %message.id, error = %e, "Failed to acknowledge message");
            }
        } else {
            warn!(id = %message.id, "Leaving message unacknowledged for redelivery");
        }

        Ok(Some(outcome))
    }

    /// Consume forever. Transport errors are logged and polling resumes.
    pub async fn run<S: MessageSource>(&mut self, source: &mut S) {
        info!(
            shape = %self.settings.shape,
            capacity = self.history.capacity(),
            "Bridge running"
        );
        loop {
            if let Err(e) = self.process_next(source).await {
                warn!(error = %e, "Receive failed");
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
            }
        }
    }

    fn on_empty_poll(&mut self) {
        self.empty_polls += 1;
        if self.last_heartbeat.elapsed() >= self.settings.heartbeat_interval {
            info!(empty_polls = self.empty_polls, "Waiting for messages");
            self.last_heartbeat = Instant::now();
        }
    }
}
