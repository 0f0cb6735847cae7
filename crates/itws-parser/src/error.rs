//! Error types for ITWS decoding.

use thiserror::Error;

/// Unexpected failures while decoding a product message.
///
/// Malformed or irrelevant products are not errors; the decoder reports
/// them as "no frame".
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("XML syntax error at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
}

/// Result type for decode operations.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
