//! Error types for svc-runtime.

use thiserror::Error;

/// Main error type for all runtime operations.
///
/// Failures raised by user handlers are not represented here: they become
/// error records inside the transport (see [`crate::server`]).
#[derive(Debug, Error)]
pub enum SdkError {
    /// I/O error during channel operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration and param casting only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// A value has no wire representation (non-string map key, integer overflow).
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Protocol error (invalid frame, malformed command, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A path operation had to traverse a scalar.
    #[error("Path error: cannot traverse scalar at segment '{segment}' of '{path}'")]
    Path { path: String, segment: String },

    /// A parameter value cannot be cast to its declared type.
    #[error("Parameter '{name}' is not of type {expected}")]
    TypeMismatch { name: String, expected: String },

    /// Parameters failed schema validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid component configuration, detected at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No handler registered for the requested action.
    #[error("Invalid action: {0}")]
    ActionNotFound(String),

    /// A download was requested from a service without a file server.
    #[error("File server not configured: \"{service}\" ({version})")]
    NoFileServer { service: String, version: String },

    /// No schema is known for the given service.
    #[error("Cannot resolve schema for service: \"{service}\" ({version})")]
    SchemaNotFound { service: String, version: String },

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using SdkError.
pub type Result<T> = std::result::Result<T, SdkError>;
