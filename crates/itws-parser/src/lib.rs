//! ITWS grid product decoder.
//!
//! Turns one XML product message into a [`Frame`](wx_common::Frame):
//!
//! - [`rle`]: streaming `value,count` token transcoder producing mapped levels
//! - [`dims`]: authoritative rows/cols from inconsistent header hints
//! - [`geometry`]: grid origin and rotation from header fields
//! - [`decoder`]: XML event handling and frame assembly
//!
//! # Example
//!
//! ```ignore
//! use itws_parser::{decode_frame, DecoderConfig};
//!
//! let frame = decode_frame(xml.as_bytes(), received_at_ms, &DecoderConfig::default())?;
//! ```

pub mod decoder;
pub mod dims;
pub mod error;
pub mod geometry;
pub mod rle;
mod tags;

pub use decoder::{decode_frame, DecoderConfig, FrameDecoder, Progress, DEFAULT_TEXT_LIMIT};
pub use dims::resolve_dimensions;
pub use error::{DecodeError, DecodeResult};
pub use geometry::{resolve_geometry, GeometryHints};
pub use rle::{RunLengthTranscoder, TranscodeMode};
