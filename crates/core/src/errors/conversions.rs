//! Conversion implementations for error types

use super::types::Error;
use std::path::PathBuf;
use std::sync::Arc;

// Conversion implementations (keeping these as they provide more context than thiserror's #[from])
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::Yaml {
            message: error.to_string(),
            source: error,
        }
    }
}

impl From<Arc<Error>> for Error {
    fn from(error: Arc<Error>) -> Self {
        Error::Shared(error)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_cancelled() {
            Error::Cancelled {
                operation: "worker task".to_string(),
            }
        } else {
            Error::Internal {
                message: format!("worker task panicked: {error}"),
            }
        }
    }
}
