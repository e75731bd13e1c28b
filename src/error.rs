use thiserror::Error;

/// Result alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, BcryptError>;

/// Rejections surfaced by the codecs and the hash operations.
///
/// Malformed input and undersized buffers are both recoverable: the caller
/// gets one of these instead of partial output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BcryptError {
    /// Missing `$` separator or a version byte other than `2`.
    #[error("invalid hash prefix")]
    InvalidPrefix,

    /// The minor version byte is not one of `a`, `b` or `y`.
    #[error("unknown minor version: {0:#04x}")]
    UnknownMinor(u8),

    /// The cost field is not two digits or lies outside 4..=31.
    #[error("invalid cost")]
    InvalidCost,

    /// A character outside the bcrypt alphabet sits in the consumed range.
    #[error("invalid base64 character")]
    InvalidBase64,

    /// The destination cannot hold the complete result.
    #[error("buffer too small")]
    BufferTooSmall,

    /// Raw salt must be exactly 16 bytes.
    #[error("invalid salt length: expected 16 bytes, got {0}")]
    InvalidSaltLength(usize),

    /// An invariant of the hash pipeline did not hold.
    #[error("internal error: {0}")]
    InternalError(&'static str),
}
