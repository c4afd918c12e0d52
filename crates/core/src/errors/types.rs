//! Core error type definitions

use std::path::PathBuf;
use std::sync::Arc;

/// Result type alias for kresolve operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kresolve operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors, always detected before processing starts
    Configuration { message: String },

    /// File system operations
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// YAML decoding/encoding errors
    Yaml {
        message: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Label selector parsing or evaluation errors
    Selector { selector: String, message: String },

    /// A build target failed to build
    Build { key: String, message: String },

    /// An artifact failed to publish
    Publish { key: String, message: String },

    /// A reference the builder cannot handle, in strict mode
    UnsupportedReference { reference: String },

    /// Per-file wrapper naming the offending file and processing stage
    File {
        file: String,
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    /// Failure to register a target in the dependency graph
    Dependency { key: String, message: String },

    /// Filesystem change notifier failures
    Notifier { message: String },

    /// External command execution errors
    CommandExecution {
        command: String,
        args: Vec<String>,
        message: String,
        exit_code: Option<i32>,
    },

    /// A cached outcome replayed to every caller of the same generation
    Shared(Arc<Error>),

    /// Work abandoned because the run was cancelled
    Cancelled { operation: String },

    /// A worker task panicked or was aborted
    Internal { message: String },
}

/// Stage of per-file processing an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Parse,
    Select,
    Resolve,
    Encode,
}

impl Error {
    /// Strips `Shared` wrappers, returning the error that was originally raised
    pub fn root(&self) -> &Error {
        match self {
            Error::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Whether this error only reports that the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Error::Cancelled { .. })
    }
}
