//! Error types for stackstore
//!
//! Provides a unified error type for all operations. The variants mirror the
//! protocol's failure taxonomy: `Protocol` errors are fatal to a connection
//! (the client gets `ERROR` and the socket closes), `Failed` and
//! `Contention` are recoverable (`FAILED`, connection stays open).

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for stackstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors (fatal to the connection)
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Application Failures (recoverable; abort any open transaction)
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Failed(String),

    // -------------------------------------------------------------------------
    // Lock Contention (recoverable; the open transaction keeps its locks)
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Contention(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Build a recoverable application failure
    pub fn failed(msg: impl Into<String>) -> Self {
        StoreError::Failed(msg.into())
    }

    /// Build a fatal protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        StoreError::Protocol(msg.into())
    }

    /// True if the connection can keep serving requests after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Failed(_) | StoreError::Contention(_))
    }
}
