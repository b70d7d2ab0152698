//! Error types for the relay
//!
//! Defines application-level errors and mailbox send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Transport errors end a single session. Configuration and TLS errors are
/// fatal at startup.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal for the session)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry actor is gone (its command channel was closed)
    #[error("Registry closed")]
    RegistryClosed,

    /// No unused display name within the suffix bound
    #[error("No display name available up to suffix {max_suffix}")]
    NamesExhausted { max_suffix: u32 },

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// TLS setup failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Certificate file could not be read or parsed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Private key file could not be read or parsed
    #[error("Private key error: {0}")]
    PrivateKey(String),
}

/// Mailbox send errors
///
/// Result of a non-blocking enqueue into a session's mailbox.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The mailbox is at capacity
    #[error("Mailbox full")]
    MailboxFull,
    /// The receiving end of the mailbox has been closed
    #[error("Mailbox closed")]
    MailboxClosed,
}

/// Crate-wide result type
pub type Result<T, E = AppError> = std::result::Result<T, E>;
