use std::io;
use thiserror::Error;

/// Result type for coffer operations
pub type Result<T> = std::result::Result<T, CofferError>;

/// Unified error type for all coffer operations
#[derive(Debug, Error)]
pub enum CofferError {
    // Format errors
    #[error("Bad signature in archive header")]
    BadSignature,

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unknown algorithm id: {0}")]
    UnknownAlgorithm(u8),

    #[error("Payload length {0} does not fit in the coded stream header")]
    LengthOverflow(u64),

    #[error("Malformed container: {0}")]
    Malformed(&'static str),

    #[error("Corrupt bit stream: {0}")]
    CorruptStream(&'static str),

    // Truncation errors
    #[error("Truncated archive: {0}")]
    Truncated(&'static str),

    #[error("Archive size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    // Path errors
    #[error("Entry path escapes the extraction root: {0}")]
    PathSecurity(String),

    #[error("Invalid entry path: {0}")]
    InvalidPath(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}
