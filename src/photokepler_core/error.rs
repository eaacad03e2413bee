use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    // Library errors
    #[error("Could not access Photos library at {path}: {reason}")]
    LibraryAccess { path: PathBuf, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Per-record decoding, always recovered by the loader
    #[error("Unreadable attribute {attribute}: {reason}")]
    AttributeAccess {
        attribute: &'static str,
        reason: String,
    },

    // Output errors
    #[error("Could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    // Metadata errors
    #[error("Exiftool error: {0}")]
    Exiftool(String),
}

impl ExportError {
    pub fn library_access(path: &Path, reason: impl ToString) -> Self {
        ExportError::LibraryAccess {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// The path the failed operation was attempting to use, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ExportError::LibraryAccess { path, .. } | ExportError::Write { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }

    /// Human-readable cause without the path prefix.
    pub fn details(&self) -> String {
        match self {
            ExportError::LibraryAccess { reason, .. } => reason.clone(),
            ExportError::Write { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for photokepler operations.
pub type Result<T> = std::result::Result<T, ExportError>;
