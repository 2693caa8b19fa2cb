use thiserror::Error;

/// Failures while turning a [`crate::term::Term`] into ETF bytes.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("atom name {0:?} is longer than 255 bytes and cannot be encoded as SMALL_ATOM_UTF8")]
    AtomTooLong(String),
    #[error("bitstring trailing bit count {0} is out of range 0..=7")]
    InvalidTrailingBits(u8),
    #[error("fun subform is not supported for encoding")]
    UnsupportedFun,
    #[error("list exceeds {0} elements, too large for STRING encoding")]
    StringTooLong(usize),
}

/// Failures while parsing ETF bytes into a [`crate::term::Term`].
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("malformed term: {0}")]
    BadTerm(&'static str),
    #[error("unrecognised ETF tag byte {0}")]
    UnknownTag(u8),
    #[error("list is missing its NIL tail")]
    MissingListEnd,
    #[error("BIT_BINARY has unsupported nonzero bit offset {0}")]
    UnsupportedBitOffset(u8),
    #[error("unexpected end of buffer while reading {0}")]
    Eof(&'static str),
}
