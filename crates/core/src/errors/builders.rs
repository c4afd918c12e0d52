//! Builder methods for creating errors with context

use super::types::{Error, Stage};
use std::path::PathBuf;
use std::sync::Arc;

// Helper methods for creating errors with context
impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a YAML error
    #[must_use]
    pub fn yaml(message: impl Into<String>, source: serde_yaml::Error) -> Self {
        Error::Yaml {
            message: message.into(),
            source,
        }
    }

    /// Create a selector error
    #[must_use]
    pub fn selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Selector {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create a build error
    #[must_use]
    pub fn build(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Build {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a publish error
    #[must_use]
    pub fn publish(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Publish {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported reference error
    #[must_use]
    pub fn unsupported_reference(reference: impl Into<String>) -> Self {
        Error::UnsupportedReference {
            reference: reference.into(),
        }
    }

    /// Wrap an error with the file and stage it was raised in
    #[must_use]
    pub fn file(file: impl Into<String>, stage: Stage, source: Error) -> Self {
        Error::File {
            file: file.into(),
            stage,
            source: Box::new(source),
        }
    }

    /// Create a dependency graph error
    #[must_use]
    pub fn dependency(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Dependency {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a notifier error
    #[must_use]
    pub fn notifier(message: impl Into<String>) -> Self {
        Error::Notifier {
            message: message.into(),
        }
    }

    /// Create a command execution error
    #[must_use]
    pub fn command_execution(
        command: impl Into<String>,
        args: Vec<String>,
        message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            args,
            message: message.into(),
            exit_code,
        }
    }

    /// Wrap a cached error so it can be handed to another caller
    #[must_use]
    pub fn shared(inner: Arc<Error>) -> Self {
        Error::Shared(inner)
    }

    /// Create a cancellation error
    #[must_use]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Error::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }
}
