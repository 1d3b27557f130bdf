//! Error types for message parsing in tagnet-types.

use thiserror::Error;

/// Errors that can occur when parsing tag telemetry messages.
///
/// This error type is platform-agnostic and does not include
/// storage-specific errors (those belong in tagnet-store).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A message carried a data-type string outside the known set.
    #[error("Unknown record kind: {0}")]
    UnknownKind(String),
}

/// Result type alias using tagnet-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
