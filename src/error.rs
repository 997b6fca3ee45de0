//! Error types for the block generator

use std::path::PathBuf;
use thiserror::Error;

use crate::types::RecordId;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error in {label}: {message}")]
    Syntax { label: String, message: String },

    #[error("Failed to write {artifact}: {source}")]
    Write {
        artifact: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove existing file {path}: {source}")]
    Overwrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {artifact} into place at {path}: {message}")]
    Persist {
        artifact: String,
        path: PathBuf,
        message: String,
    },

    #[error("Record not found: {id}")]
    RecordNotFound { id: RecordId },

    #[error("Settings query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("{failed} of {total} record(s) failed to generate")]
    GenerationFailed { failed: usize, total: usize },
}

/// Failure of a structured settings query.
///
/// `UnsupportedOperator` is the storage engine telling us it cannot run the
/// query at all; callers may fall back to a scan. Anything else is a real
/// failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("storage engine does not support {0}")]
    UnsupportedOperator(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

impl GeneratorError {
    pub fn syntax(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            label: label.into(),
            message: message.into(),
        }
    }

    pub fn write(artifact: impl Into<String>, source: std::io::Error) -> Self {
        Self::Write {
            artifact: artifact.into(),
            source,
        }
    }

    pub fn persist(
        artifact: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::Persist {
            artifact: artifact.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// True for errors raised because generated content did not parse.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}
