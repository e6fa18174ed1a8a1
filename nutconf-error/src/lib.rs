//! Unified error handling for nutconf
//!
//! This crate provides the single error type used across all nutconf
//! components. It uses thiserror for ergonomic error definitions with
//! proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using NutConfError
pub type Result<T> = std::result::Result<T, NutConfError>;

/// Unified error type for all nutconf operations
#[derive(thiserror::Error, Debug)]
pub enum NutConfError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("No configuration type matches the detected configuration: {0}")]
    UnknownConfigurationType(String),

    // ============================================================================
    // Store (persistence) Errors
    // ============================================================================
    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration row not found: {0}")]
    RowNotFound(u32),

    // ============================================================================
    // Scanning Errors
    // ============================================================================
    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ============================================================================
    // Credential Errors
    // ============================================================================
    #[error("Credential error: {0}")]
    Credential(String),

    // ============================================================================
    // Messaging Errors
    // ============================================================================
    #[error("Missing request metadata: {0}")]
    MissingMetadata(String),

    #[error("Bus error: {0}")]
    Bus(String),

    // ============================================================================
    // Service Management Errors
    // ============================================================================
    #[error("Service error: {0}")]
    Service(String),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl NutConfError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a store error from a string
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a scan error from a string
    pub fn scan(msg: impl Into<String>) -> Self {
        Self::Scan(msg.into())
    }

    /// Create a credential error from a string
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create a service error from a string
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }
}

// Allow converting from String to NutConfError
impl From<String> for NutConfError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to NutConfError
impl From<&str> for NutConfError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
