//! Bridge metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, gauge};

pub const MESSAGES_TOTAL: &str = "itws_messages_total";
pub const MESSAGES_SKIPPED_TOTAL: &str = "itws_messages_skipped_total";
pub const DECODE_ERRORS_TOTAL: &str = "itws_decode_errors_total";
pub const PROCESSING_ERRORS_TOTAL: &str = "itws_processing_errors_total";
pub const DIMENSION_MISMATCH_TOTAL: &str = "itws_dimension_mismatch_total";
pub const FRAMES_DUPLICATE_TOTAL: &str = "itws_frames_duplicate_total";
pub const HISTORY_RESETS_TOTAL: &str = "itws_history_resets_total";
pub const FORWARD_ATTEMPTS_TOTAL: &str = "itws_forward_attempts_total";
pub const FORWARD_SUCCESS_TOTAL: &str = "itws_forward_success_total";
pub const HISTORY_FRAMES: &str = "itws_history_frames";

/// Register metric descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(MESSAGES_TOTAL, "Messages received from the stream");
    describe_counter!(MESSAGES_SKIPPED_TOTAL, "Messages dropped as irrelevant or malformed");
    describe_counter!(DECODE_ERRORS_TOTAL, "Messages that failed to decode");
    describe_counter!(PROCESSING_ERRORS_TOTAL, "Histories that failed to encode or forward");
    describe_counter!(DIMENSION_MISMATCH_TOTAL, "Frames published with mismatched dimensions");
    describe_counter!(FRAMES_DUPLICATE_TOTAL, "Frames dropped as duplicates of the newest frame");
    describe_counter!(HISTORY_RESETS_TOTAL, "History clears caused by a geometry change");
    describe_counter!(FORWARD_ATTEMPTS_TOTAL, "HTTP POST attempts");
    describe_counter!(FORWARD_SUCCESS_TOTAL, "Documents accepted by the ingestion API");
    describe_gauge!(HISTORY_FRAMES, "Frames currently held in the history");
}

pub fn record_message() {
    counter!(MESSAGES_TOTAL).increment(1);
}

pub fn record_skipped(reason: &'static str) {
    counter!(MESSAGES_SKIPPED_TOTAL, "reason" => reason).increment(1);
}

/// Pipeline stage a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Decode,
    Encode,
    Forward,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::Decode => "decode",
            ErrorStage::Encode => "encode",
            ErrorStage::Forward => "forward",
        }
    }

    /// Counter incremented for failures in this stage.
    pub fn counter_name(&self) -> &'static str {
        match self {
            ErrorStage::Decode => DECODE_ERRORS_TOTAL,
            ErrorStage::Encode | ErrorStage::Forward => PROCESSING_ERRORS_TOTAL,
        }
    }
}

pub fn record_error(stage: ErrorStage) {
    counter!(stage.counter_name(), "stage" => stage.as_str()).increment(1);
}

pub fn record_dimension_mismatch() {
    counter!(DIMENSION_MISMATCH_TOTAL).increment(1);
}

pub fn record_duplicate() {
    counter!(FRAMES_DUPLICATE_TOTAL).increment(1);
}

pub fn record_history_reset() {
    counter!(HISTORY_RESETS_TOTAL).increment(1);
}

pub fn record_forward_attempts(attempts: u32) {
    counter!(FORWARD_ATTEMPTS_TOTAL).increment(attempts as u64);
}

pub fn record_forward_success() {
    counter!(FORWARD_SUCCESS_TOTAL).increment(1);
}

pub fn set_history_frames(frames: usize) {
    gauge!(HISTORY_FRAMES).set(frames as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_decode_failures_count_as_decode_errors() {
        assert_eq!(ErrorStage::Decode.counter_name(), DECODE_ERRORS_TOTAL);
        assert_eq!(ErrorStage::Encode.counter_name(), PROCESSING_ERRORS_TOTAL);
        assert_eq!(ErrorStage::Forward.counter_name(), PROCESSING_ERRORS_TOTAL);
        assert_eq!(ErrorStage::Forward.as_str(), "forward");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_error(ErrorStage::Encode);
        record_forward_attempts(3);
        set_history_frames(2);
    }
}
