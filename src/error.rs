//! Error types for docchat
//!
//! This module defines the error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use std::time::Duration;
use thiserror::Error;

/// Main error type for docchat operations
///
/// Covers configuration loading, backend exchanges, local persistence,
/// and request lifecycle failures (deadline and abort).
#[derive(Error, Debug)]
pub enum DocchatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend exchange errors (non-2xx status, undecodable body, transport)
    #[error("Backend error: {0}")]
    Backend(String),

    /// A request did not complete before its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A request was aborted by the caller before it completed
    #[error("Request aborted")]
    Aborted,

    /// Local storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for docchat operations
///
/// Uses `anyhow::Error` as the error type, allowing rich error context
/// and easy propagation with `?`.
pub type Result<T> = anyhow::Result<T>;
