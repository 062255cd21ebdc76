// Centralized error handling module
// Error types with context for configuration, file access and sink operations

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the importer
/// Carries the path and operation involved plus a suggestion for the operator
#[derive(Debug, Error)]
pub enum ImportError {
    /// Configuration errors, raised before any file is opened
    #[error("Missing required argument: {argument}\nSuggestion: Run with --help to see required arguments")]
    MissingRequiredArgument { argument: String },

    #[error("Invalid parent metadata '{entry}': {reason}\nSuggestion: Pass entries as key,value (e.g. --parent-meta FileName,image.dd)")]
    InvalidParentMeta { entry: String, reason: String },

    #[error("Invalid parent hash '{value}': expected 40 hexadecimal characters (SHA-1)\nSuggestion: Pass the SHA-1 of the containing artifact")]
    InvalidParentHash { value: String },

    #[error("Parent metadata given without a parent hash\nSuggestion: Add --parent <SHA-1> or drop --parent-meta")]
    ParentMetaWithoutParent,

    #[error("Invalid configuration file {}: {reason}\nSuggestion: Check the TOML syntax and key names", .path.display())]
    InvalidConfigFile { path: PathBuf, reason: String },

    #[error("Directory not found: {}\nSuggestion: Check that the directory path is correct and the directory exists", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a directory: {}\nSuggestion: Pass a directory to --dir, not a file", .path.display())]
    NotADirectory { path: PathBuf },

    /// File access errors, recovered per file
    #[error("File not found: {}\nSuggestion: The file may have been removed while the import was running", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Permission denied while {operation} file: {}\nSuggestion: Check file permissions or run with appropriate privileges", .path.display())]
    PermissionDenied { path: PathBuf, operation: String },

    #[error("I/O error while {operation}{}: {source}\nSuggestion: Check file permissions and disk space", .path.as_ref().map(|p| format!(" file {}", p.display())).unwrap_or_default())]
    Io {
        path: Option<PathBuf>,
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Sink errors, surfaced to the operator and never retried
    #[error("Sink rejected record {key}: {reason}")]
    SinkRejected { key: String, reason: String },

    #[error("Sink I/O error while {operation}: {source}\nSuggestion: Check the output location and disk space")]
    SinkIo {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ImportError {
    /// Create a file access error with context about the operation and optional path
    pub fn from_io_error(err: io::Error, operation: &str, path: Option<PathBuf>) -> Self {
        match (err.kind(), path) {
            (io::ErrorKind::NotFound, Some(path)) => {
                if operation.contains("directory") {
                    ImportError::DirectoryNotFound { path }
                } else {
                    ImportError::FileNotFound { path }
                }
            }
            (io::ErrorKind::PermissionDenied, Some(path)) => ImportError::PermissionDenied {
                path,
                operation: operation.to_string(),
            },
            (_, path) => ImportError::Io {
                path,
                operation: operation.to_string(),
                source: err,
            },
        }
    }

    /// Wrap an I/O failure of the sink's backing store
    pub fn sink_io(err: io::Error, operation: &str) -> Self {
        ImportError::SinkIo {
            operation: operation.to_string(),
            source: err,
        }
    }

    /// True for errors that must abort the run before any file I/O
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ImportError::MissingRequiredArgument { .. }
                | ImportError::InvalidParentMeta { .. }
                | ImportError::InvalidParentHash { .. }
                | ImportError::ParentMetaWithoutParent
                | ImportError::InvalidConfigFile { .. }
                | ImportError::DirectoryNotFound { .. }
                | ImportError::NotADirectory { .. }
        )
    }

    /// True for errors raised by a record sink
    pub fn is_sink(&self) -> bool {
        matches!(
            self,
            ImportError::SinkRejected { .. }
                | ImportError::SinkIo { .. }
                | ImportError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
