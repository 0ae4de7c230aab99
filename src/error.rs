//! Error types for Keyward
//!
//! Two layers:
//! - [`KeywardError`]: internal failures, carried through `Result` everywhere
//! - [`ServiceError`]: the closed set of failures a client can observe

use thiserror::Error;

/// Result type alias using KeywardError
pub type Result<T> = std::result::Result<T, KeywardError>;

/// Unified error type for Keyward operations
#[derive(Debug, Error)]
pub enum KeywardError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Cache Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Key cache full ({capacity} entries)")]
    CapacityExceeded { capacity: usize },

    #[error("Key load failed: {0}")]
    KeyLoad(String),

    // -------------------------------------------------------------------------
    // Trusted Execution Errors
    // -------------------------------------------------------------------------
    #[error("Transform failed: {0}")]
    Transform(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures reported to clients in an error envelope.
///
/// The `Display` text of each variant is the exact wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Key material could not be resolved or cached
    #[error("Key not added")]
    KeyLoad,

    /// Empty key identifier or empty payload
    #[error("Key or Data Error")]
    KeyOrData,

    #[error("Encrypt Error")]
    Encrypt,

    #[error("Decrypt Error")]
    Decrypt,

    /// Request type outside the supported set
    #[error("Request Type Error")]
    RequestType,

    /// Error text a client does not recognize
    #[error("Unrecognized response")]
    Unrecognized,

    /// Envelope absent, malformed, or incomplete
    #[error("Missing Data")]
    MissingData,
}

impl ServiceError {
    /// Parse a wire message back into a variant
    pub fn from_message(message: &str) -> Self {
        match message {
            "Key not added" => ServiceError::KeyLoad,
            "Key or Data Error" => ServiceError::KeyOrData,
            "Encrypt Error" => ServiceError::Encrypt,
            "Decrypt Error" => ServiceError::Decrypt,
            "Request Type Error" => ServiceError::RequestType,
            "Missing Data" => ServiceError::MissingData,
            _ => ServiceError::Unrecognized,
        }
    }
}
