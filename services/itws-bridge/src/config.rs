//! Bridge configuration from environment variables.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

use itws_parser::{DecoderConfig, TranscodeMode, DEFAULT_TEXT_LIMIT};
use radar_output::{ForwarderConfig, OutputShape, RetryPolicy};
use storage::DEFAULT_HISTORY_CAPACITY;
use wx_common::{SpecialCodes, WxError};

pub const DEFAULT_POST_URL: &str = "http://localhost:8080/api/wx/radar";
pub const DEFAULT_TARGET_PRODUCT_ID: i64 = 9901;

/// Runtime settings for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Stream to consume; required when consuming from Redis
    pub stream: Option<String>,
    pub consumer_group: String,
    pub consumer_name: String,

    /// Only process this product (when filtering is enabled)
    pub target_product_id: i64,
    pub filter_product: bool,

    /// Blocking receive timeout
    pub receive_timeout: Duration,
    /// Minimum interval between "waiting" logs
    pub heartbeat_interval: Duration,
    /// Payloads are cut to this many bytes before decoding
    pub max_payload_bytes: usize,

    pub special_codes: SpecialCodes,
    pub history_capacity: usize,
    pub output_shape: OutputShape,

    /// HTTP delivery settings
    pub forwarder: ForwarderConfig,

    /// Acknowledge messages even when processing failed
    pub ack_on_exception: bool,

    /// Prometheus listener address
    pub metrics_addr: Option<SocketAddr>,
}

impl BridgeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let redis_url = get("REDIS_URL").unwrap_or_else(|| "redis://redis:6379".to_string());
        let stream = get("ITWS_STREAM");
        let consumer_group = get("ITWS_CONSUMER_GROUP").unwrap_or_else(|| "itws-bridge".to_string());
        let consumer_name = get("ITWS_CONSUMER_NAME")
            .unwrap_or_else(|| format!("itws-bridge-{}", Uuid::new_v4()));

        let target_product_id = parse_or(&get, "ITWS_TARGET_PRODUCT_ID", DEFAULT_TARGET_PRODUCT_ID)?;
        let filter_product = get("ITWS_FILTER_PRODUCT").map_or(true, |v| parse_flag(&v));

        let receive_timeout = Duration::from_millis(parse_or(&get, "RECEIVE_TIMEOUT_MS", 15_000)?);
        let heartbeat_interval = Duration::from_millis(parse_or(&get, "HEARTBEAT_MS", 10_000)?);
        let max_payload_bytes = parse_or(&get, "MAX_XML_BYTES", 32_000_000usize)?;

        let defaults = SpecialCodes::default();
        let special_codes = SpecialCodes {
            bad: parse_or(&get, "ITWS_CODE_BAD", defaults.bad)?,
            no_coverage: parse_or(&get, "ITWS_CODE_NO_COVERAGE", defaults.no_coverage)?,
            attenuated: parse_or(&get, "ITWS_CODE_ATTENUATED", defaults.attenuated)?,
            anomalous_propagation: parse_or(&get, "ITWS_CODE_AP", defaults.anomalous_propagation)?,
        };

        let history_capacity = parse_or(&get, "HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY)?;
        if history_capacity == 0 {
            return Err(invalid("HISTORY_CAPACITY", "must be at least 1"));
        }

        let output_shape = match get("OUTPUT_SHAPE") {
            Some(value) => value.parse::<OutputShape>()?,
            None => OutputShape::default(),
        };

        let url = get("WX_POST_URL")
            .or_else(|| get("ITWS_POST_URL"))
            .unwrap_or_else(|| DEFAULT_POST_URL.to_string());
        reqwest::Url::parse(&url).with_context(|| format!("Invalid WX_POST_URL '{}'", url))?;

        let mut forwarder = ForwarderConfig::new(url);
        forwarder.token = get("ITWS_INGEST_TOKEN");
        if let Some(header) = get("ITWS_TOKEN_HEADER") {
            forwarder.token_header = header;
        }
        forwarder.connect_timeout =
            Duration::from_millis(parse_or(&get, "HTTP_CONNECT_TIMEOUT_MS", 1_500)?);
        forwarder.request_timeout =
            Duration::from_millis(parse_or(&get, "HTTP_REQUEST_TIMEOUT_MS", 5_000)?);
        forwarder.retry =
            RetryPolicy::unbounded(Duration::from_millis(parse_or(&get, "HTTP_RETRY_SLEEP_MS", 250)?));

        let ack_on_exception = get("ACK_ON_EXCEPTION").map_or(false, |v| parse_flag(&v));

        let metrics_addr = match get("METRICS_ADDR") {
            Some(addr) => Some(
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("Invalid METRICS_ADDR '{}'", addr))?,
            ),
            None => None,
        };

        Ok(Self {
            redis_url,
            stream,
            consumer_group,
            consumer_name,
            target_product_id,
            filter_product,
            receive_timeout,
            heartbeat_interval,
            max_payload_bytes,
            special_codes,
            history_capacity,
            output_shape,
            forwarder,
            ack_on_exception,
            metrics_addr,
        })
    }

    /// Stream name, failing when it was not configured.
    pub fn require_stream(&self) -> Result<&str> {
        self.stream
            .as_deref()
            .ok_or_else(|| anyhow!(WxError::MissingSetting("ITWS_STREAM".to_string())))
    }

    /// Product filter target, if filtering is enabled.
    pub fn product_filter(&self) -> Option<i64> {
        self.filter_product.then_some(self.target_product_id)
    }

    /// Decoder settings matching the configured output shape.
    pub fn decoder_config(&self) -> DecoderConfig {
        let mode = match self.output_shape {
            OutputShape::Expanded => TranscodeMode::Expanded,
            OutputShape::Compact => TranscodeMode::Compact,
        };
        DecoderConfig {
            mode,
            special_codes: self.special_codes,
            target_product_id: self.product_filter(),
            text_limit: DEFAULT_TEXT_LIMIT,
        }
    }
}

/// `1`, `true`, `yes` and `y` (any case) are true; anything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| invalid(key, &format!("'{}': {}", value, e))),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: &str) -> anyhow::Error {
    anyhow!(WxError::InvalidSetting {
        key: key.to_string(),
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<BridgeConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BridgeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("ITWS_STREAM", "itws:products")]).unwrap();
        assert_eq!(config.require_stream().unwrap(), "itws:products");
        assert_eq!(config.redis_url, "redis://redis:6379");
        assert_eq!(config.consumer_group, "itws-bridge");
        assert!(config.consumer_name.starts_with("itws-bridge-"));
        assert_eq!(config.product_filter(), Some(9901));
        assert_eq!(config.receive_timeout, Duration::from_millis(15_000));
        assert_eq!(config.heartbeat_interval, Duration::from_millis(10_000));
        assert_eq!(config.max_payload_bytes, 32_000_000);
        assert_eq!(config.special_codes, SpecialCodes::default());
        assert_eq!(config.history_capacity, 4);
        assert_eq!(config.output_shape, OutputShape::Expanded);
        assert_eq!(config.forwarder.url, DEFAULT_POST_URL);
        assert_eq!(config.forwarder.token, None);
        assert_eq!(config.forwarder.token_header, "X-WX-Token");
        assert_eq!(config.forwarder.connect_timeout, Duration::from_millis(1_500));
        assert_eq!(config.forwarder.request_timeout, Duration::from_millis(5_000));
        assert_eq!(config.forwarder.retry.max_attempts, None);
        assert_eq!(config.forwarder.retry.delay, Duration::from_millis(250));
        assert!(!config.ack_on_exception);
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_missing_stream() {
        let config = config(&[]).unwrap();
        let err = config.require_stream().unwrap_err();
        assert!(err.to_string().contains("ITWS_STREAM"));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("ITWS_STREAM", "s"),
            ("ITWS_FILTER_PRODUCT", "false"),
            ("ITWS_CODE_BAD", "11"),
            ("ITWS_CODE_AP", "12"),
            ("OUTPUT_SHAPE", "compact"),
            ("ITWS_POST_URL", "http://ingest:9000/radar"),
            ("ITWS_INGEST_TOKEN", "t0ken"),
            ("HTTP_RETRY_SLEEP_MS", "10"),
            ("ACK_ON_EXCEPTION", "Yes"),
            ("METRICS_ADDR", "0.0.0.0:9102"),
        ])
        .unwrap();

        assert_eq!(config.product_filter(), None);
        assert_eq!(config.special_codes.bad, 11);
        assert_eq!(config.special_codes.anomalous_propagation, 12);
        assert_eq!(config.special_codes.no_coverage, 15);
        assert_eq!(config.output_shape, OutputShape::Compact);
        assert_eq!(config.forwarder.url, "http://ingest:9000/radar");
        assert_eq!(config.forwarder.token.as_deref(), Some("t0ken"));
        assert_eq!(config.forwarder.retry.effective_delay(), Duration::from_millis(50));
        assert!(config.ack_on_exception);
        assert_eq!(config.metrics_addr.unwrap().port(), 9102);

        let decoder = config.decoder_config();
        assert_eq!(decoder.mode, TranscodeMode::Compact);
        assert_eq!(decoder.target_product_id, None);
        assert_eq!(decoder.special_codes.bad, 11);
    }

    #[test]
    fn test_primary_post_url_wins() {
        let config = config(&[
            ("WX_POST_URL", "http://a/radar"),
            ("ITWS_POST_URL", "http://b/radar"),
        ])
        .unwrap();
        assert_eq!(config.forwarder.url, "http://a/radar");
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("RECEIVE_TIMEOUT_MS", "soon")]).is_err());
        assert!(config(&[("HISTORY_CAPACITY", "0")]).is_err());
        assert!(config(&[("OUTPUT_SHAPE", "png")]).is_err());
        assert!(config(&[("WX_POST_URL", "not a url")]).is_err());
        assert!(config(&[("METRICS_ADDR", "localhost")]).is_err());

        let err = config(&[("ITWS_CODE_BAD", "x")]).unwrap_err();
        assert!(err.to_string().contains("ITWS_CODE_BAD"));
    }

    #[test]
    fn test_parse_flag() {
        for value in ["1", "true", "TRUE", "yes", "y", " Y "] {
            assert!(parse_flag(value), "{}", value);
        }
        for value in ["0", "false", "no", "on", ""] {
            assert!(!parse_flag(value), "{}", value);
        }
    }
}
