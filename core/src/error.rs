//! Error taxonomy for the audit engine.
//!
//! Only configuration problems are fatal. Per-file I/O failures are
//! recovered inside the phase that hit them and never reach the caller.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// A file could not be read (permissions, deleted mid-run).
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A threshold or setting is missing, non-numeric, or out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An entry-point pattern is not a valid regular expression.
    #[error("invalid entry-point pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An entry-point glob is malformed.
    #[error("invalid entry-point glob `{pattern}`: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The run was cancelled between two files.
    #[error("audit cancelled")]
    Cancelled,
}

impl AuditError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuditError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, AuditError::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_recoverable() {
        let err = AuditError::io(
            "src/gone.js",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("src/gone.js"));
    }

    #[test]
    fn config_errors_are_fatal() {
        assert!(AuditError::Config("complexity_warning".into()).is_fatal());
        assert!(AuditError::Cancelled.is_fatal());
    }
}
