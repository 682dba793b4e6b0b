//! File materialisation error types
//!
//! One error per file. A failure writing one file never prevents sibling
//! files from being written.

use std::path::PathBuf;
use thiserror::Error;

/// Filesystem errors raised while writing generated files
#[derive(Error, Debug)]
pub enum MaterializeError {
    /// Underlying I/O failure
    #[error("I/O error writing '{}': {source}", .path.display())]
    Io {
        /// Target path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Target exists and overwriting is disabled in strict mode
    #[error("File '{}' already exists", .0.display())]
    Conflict(PathBuf),

    /// Write did not finish in time
    #[error("Timed out after {secs}s writing '{}'", .path.display())]
    Timeout {
        /// Target path
        path: PathBuf,
        /// Timeout in seconds
        secs: u64,
    },

    /// Relative path escapes the output root
    #[error("Path '{}' escapes the output directory", .0.display())]
    PathTraversal(PathBuf),

    /// Write task panicked or was cancelled
    #[error("Write task for '{}' aborted: {reason}", .path.display())]
    Aborted {
        /// Target path
        path: PathBuf,
        /// Join error message
        reason: String,
    },
}

impl MaterializeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MaterializeError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, MaterializeError::Conflict(_))
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MaterializeError::Conflict(_) | MaterializeError::PathTraversal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = MaterializeError::Conflict(PathBuf::from("src/user.ts"));
        assert!(err.is_conflict());
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "File 'src/user.ts' already exists");

        let err = MaterializeError::Timeout {
            path: PathBuf::from("a.ts"),
            secs: 10,
        };
        assert!(!err.is_client_error());
    }
}
