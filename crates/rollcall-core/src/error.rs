//! Error types for Rollcall core.

use thiserror::Error;

/// Core errors that can occur while handling lookup payloads.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// A raw number the normalizer could not turn into a canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNumber {
    #[error("number is empty")]
    Empty,

    #[error("number contains invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("number has {digits} digits, expected between {min} and {max}")]
    InvalidLength { digits: usize, min: usize, max: usize },

    #[error("no calling code available for national number")]
    MissingCallingCode,
}

/// Why a lookup did not produce a match list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    /// The directory reported an error for the transaction.
    #[error("directory error: {0}")]
    Directory(String),

    /// The response payload could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),

    /// The response channel closed before any event was delivered.
    #[error("directory disconnected before responding")]
    Disconnected,
}

impl From<CoreError> for LookupFailure {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::EncodingError(msg) | CoreError::DecodingError(msg) => {
                LookupFailure::Decode(msg)
            }
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
