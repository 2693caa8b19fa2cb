use thiserror::Error;

use crate::etf::{DecodingError, EncodingError};

/// Failures routing a user-defined aggregate value to or from ETF shapes.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("expected {expected}, found ETF tag {actual_tag}")]
    TypeMismatch {
        expected: &'static str,
        actual_tag: u8,
    },
    #[error("key {0:?} not found while decoding a keyed value")]
    KeyNotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Decoding(#[from] DecodingError),
}
