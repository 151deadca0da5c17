//! LSH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LshError>;

/// Top-level error type for the log statistics helper.
#[derive(Debug, Error)]
pub enum LshError {
    #[error("[LSH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LSH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LSH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LSH-1101] unknown module: {name}")]
    UnknownModule { name: String },

    #[error("[LSH-2001] cannot read log source {path}: {details}")]
    SourceRead { path: PathBuf, details: String },

    #[error("[LSH-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LSH-3001] process table failure: {details}")]
    ProcessTable { details: String },

    #[error("[LSH-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LSH-3101] {action} of {process} exceeded the retry budget: {diagnostic}")]
    SupervisorTimeout {
        process: String,
        action: &'static str,
        diagnostic: String,
    },

    #[error("[LSH-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl LshError {
    /// The stable code embedded in this error's message.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LSH-1001",
            Self::MissingConfig { .. } => "LSH-1002",
            Self::ConfigParse { .. } => "LSH-1003",
            Self::UnknownModule { .. } => "LSH-1101",
            Self::SourceRead { .. } => "LSH-2001",
            Self::Serialization { .. } => "LSH-2101",
            Self::ProcessTable { .. } => "LSH-3001",
            Self::Io { .. } => "LSH-3002",
            Self::SupervisorTimeout { .. } => "LSH-3101",
            Self::Runtime { .. } => "LSH-3900",
        }
    }

    /// Whether a retry has any chance of succeeding.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::SourceRead { .. }
                | Self::ProcessTable { .. }
                | Self::SupervisorTimeout { .. }
                | Self::Runtime { .. }
        )
    }

    /// Build an IO error carrying the affected path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for unreadable log sources.
    #[must_use]
    pub fn source_read(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::SourceRead {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for LshError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for LshError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
