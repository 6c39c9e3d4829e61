//! Error types for revit-mcp-bridge.
//!
//! Two families live here:
//!
//! - [`ConfigError`] for startup configuration problems, reported once and fatal.
//! - [`BridgeError`] for per-invocation failures. These never cross the bridge
//!   boundary as control flow: the route dispatcher converts every one of them
//!   into a [`crate::envelope::ResponseEnvelope`] before returning.

use std::path::PathBuf;

use thiserror::Error;

use crate::export::ExportStrategyResult;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Failures scoped to a single bridge invocation.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// No document is open in the remote session.
    #[error("No active Revit document")]
    NoActiveSession,

    /// A named entity (sheet, view, level) does not exist.
    #[error("{message}")]
    EntityNotFound {
        /// Human-readable description of what was not found.
        message: String,
        /// Valid alternatives the caller could retry with.
        candidates: Vec<String>,
    },

    /// Malformed request body or arguments.
    #[error("{0}")]
    InvalidInput(String),

    /// Every export strategy ran without producing a file.
    #[error("Export artifact was not created")]
    ArtifactNotCreated {
        /// One record per strategy that was tried, in order.
        attempts: Vec<ExportStrategyResult>,
    },

    /// Connection or timeout failure at the relay boundary.
    #[error("{0}")]
    TransportFailure(String),

    /// Uncaught condition inside a handler.
    #[error("{0}")]
    InternalFailure(String),
}

impl BridgeError {
    /// Returns the HTTP-like status code for this failure class.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::NoActiveSession => 503,
            Self::EntityNotFound { .. } => 404,
            Self::InvalidInput(_) => 400,
            Self::TransportFailure(_) => 502,
            Self::ArtifactNotCreated { .. } | Self::InternalFailure(_) => 500,
        }
    }

    /// Shorthand for a not-found error without candidate hints.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::EntityNotFound {
            message: message.into(),
            candidates: Vec::new(),
        }
    }

    /// Shorthand for an internal failure with a context prefix.
    #[must_use]
    pub fn internal(context: &str, cause: impl std::fmt::Display) -> Self {
        Self::InternalFailure(format!("{context}: {cause}"))
    }
}
