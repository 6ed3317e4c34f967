//! Error types for Cropcast

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias using Cropcast's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Category of an outbound fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorKind {
    /// Transport failure, timeout or non-2xx status
    Network,
    /// Response body could not be decoded
    Parse,
    /// Response was well-formed but held no usable records
    Empty,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Parse => "parse",
            Self::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// Failure fetching from an external data source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error from '{source_id}': {message}")]
pub struct FetchError {
    /// What went wrong
    pub kind: FetchErrorKind,
    /// Data source that failed
    pub source_id: String,
    /// Human-readable detail
    pub message: String,
}

impl FetchError {
    /// Create a network error
    pub fn network(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, source_id, message)
    }

    /// Create a parse error
    pub fn parse(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Parse, source_id, message)
    }

    /// Create an empty-result error
    pub fn empty(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Empty, source_id, message)
    }

    fn new(kind: FetchErrorKind, source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        self.kind == FetchErrorKind::Network
    }
}

/// Error types for Cropcast operations
#[derive(Error, Debug)]
pub enum Error {
    /// External data source failure
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Too few records for the requested computation
    #[error("Insufficient data for {what}: need at least {required}, got {actual}")]
    InsufficientData {
        what: String,
        required: usize,
        actual: usize,
    },

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an insufficient data error
    pub fn insufficient(what: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            what: what.into(),
            required,
            actual,
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable name for the error variant
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(e) => match e.kind {
                FetchErrorKind::Network => "fetch_network",
                FetchErrorKind::Parse => "fetch_parse",
                FetchErrorKind::Empty => "fetch_empty",
            },
            Self::InsufficientData { .. } => "insufficient_data",
            Self::NotFound { .. } => "not_found",
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::Internal(_) => "internal",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
