//! Core error types for focusgate-core.
//!
//! This module defines the error hierarchy using thiserror. None of these
//! errors is fatal to the daemon: the coordinator logs them and keeps its
//! in-memory state authoritative.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::{RunState, TimerAction};

/// Core error type for focusgate-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence-related errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Navigation interceptor errors
    #[error("Interceptor error: {0}")]
    Interceptor(#[from] InterceptorError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`PersistentStore`](crate::storage::PersistentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The store could not be reached or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A query against the backing database failed
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A duration falls outside the accepted range
    #[error("Invalid duration for '{field}': {value} minutes (expected {min}..={max})")]
    DurationOutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Errors raised while pushing rules to a navigation interceptor.
#[derive(Error, Debug)]
pub enum InterceptorError {
    #[error("Failed to write rules to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode rules: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Interceptor rejected rules: {0}")]
    Rejected(String),
}

/// Errors seen by clients talking to a running daemon.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    /// The daemon loop has exited
    #[error("daemon is not running")]
    Stopped,

    /// The daemon dropped the request without replying
    #[error("daemon dropped the request")]
    NoReply,
}

/// A timer command that is not valid from the current run state.
///
/// This is reported back to clients as `{success: false}`, never raised.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot {action} while {from}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub action: TimerAction,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg)
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
