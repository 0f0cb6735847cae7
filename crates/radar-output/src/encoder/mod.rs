//! History document encoders.
//!
//! Two interchangeable shapes are supported, chosen by configuration:
//!
//! - [`OutputShape::Expanded`]: shared grid geometry plus per-frame cell
//!   bytes, zlib-compressed and base64-encoded
//! - [`OutputShape::Compact`]: per-frame metadata with the merged run list
//!   kept as `level,count` text
//!
//! Key names and ordering are part of the wire contract with the ingestion
//! API.

mod compact;
mod expanded;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use storage::{HistoryOrder, HistorySnapshot};
use wx_common::{WxError, WxResult};

pub use compact::encode_compact;
pub use expanded::{encode_expanded, zlib_compress, EXPANDED_SCHEMA};

/// Document shape sent downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputShape {
    #[default]
    Expanded,
    Compact,
}

impl OutputShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputShape::Expanded => "expanded",
            OutputShape::Compact => "compact",
        }
    }

    /// Frame order the shape's `frames` array is written in.
    pub fn history_order(&self) -> HistoryOrder {
        match self {
            OutputShape::Expanded => HistoryOrder::OldestFirst,
            OutputShape::Compact => HistoryOrder::NewestFirst,
        }
    }
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputShape {
    type Err = WxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expanded" | "zlib" | "bytes" => Ok(OutputShape::Expanded),
            "compact" | "rle" => Ok(OutputShape::Compact),
            other => Err(WxError::InvalidSetting {
                key: "OUTPUT_SHAPE".to_string(),
                message: format!("unknown shape '{}', expected expanded or compact", other),
            }),
        }
    }
}

/// Encode a history snapshot as one JSON document.
///
/// `now_ms` stamps documents that carry an update time. An empty snapshot
/// is an error.
pub fn encode_history(
    snapshot: &HistorySnapshot<'_>,
    shape: OutputShape,
    now_ms: i64,
) -> WxResult<Bytes> {
    if snapshot.is_empty() {
        return Err(WxError::EncodeError("history is empty".to_string()));
    }
    let document = match shape {
        OutputShape::Expanded => encode_expanded(snapshot)?,
        OutputShape::Compact => encode_compact(snapshot, now_ms),
    };
    Ok(Bytes::from(document))
}
