//! Library-wide error and result types.

use std::fmt;

/// Result alias used throughout romulus-lwc.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The authentication tag recomputed during decryption did not match the
    /// one the caller supplied. The plaintext output buffer has already been
    /// zeroed by the time this is returned.
    TagMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TagMismatch => write!(f, "authentication tag mismatch"),
        }
    }
}

impl std::error::Error for Error {}
