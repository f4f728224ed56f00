//! Error types for GeoStrata
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Cancellation is deliberately absent: a cancelled enumeration terminates
//! normally and never surfaces as an error.

use thiserror::Error;

/// Result type alias for GeoStrata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by a backing store
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for the feature provider
#[derive(Debug, Error)]
pub enum Error {
    /// Operation requires a different session state
    #[error("Invalid state: {operation} requires an open session (session is {state})")]
    InvalidState {
        /// Operation that was attempted
        operation: &'static str,
        /// State the session was in
        state: &'static str,
    },

    /// Identifier does not name an existing feature
    #[error("Feature not found: {0}")]
    NotFound(String),

    /// Malformed argument (e.g. an envelope with min > max)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Backing resource could not be acquired while opening a session
    #[error("Connection failed for '{connection_id}': {reason}")]
    ConnectionFailed {
        /// Connection identifier of the backing resource
        connection_id: String,
        /// Underlying failure
        reason: String,
    },

    /// Dataset has no features, so it has no extent
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Backing store changed since the spatial index was built
    #[error("Spatial index is stale: built at generation {indexed}, store is at {current}")]
    StaleIndex {
        /// Store generation the index was built at
        indexed: u64,
        /// Current store generation
        current: u64,
    },

    /// Error raised by the backing store, passed through untouched
    #[error("Store error: {0}")]
    Store(#[source] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a NotFound error from any identifier
    pub fn not_found(id: impl std::fmt::Debug) -> Self {
        Error::NotFound(format!("{:?}", id))
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a ConnectionFailed error
    pub fn connection_failed(connection_id: impl Into<String>, reason: impl ToString) -> Self {
        Error::ConnectionFailed {
            connection_id: connection_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a backing-store error without altering it
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Store(Box::new(err))
    }

    /// Create a Config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is an InvalidState error
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }
}
