//! Display implementations for error types

use super::types::{Error, Stage};
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { message } => {
                write!(f, "configuration error: {message}")
            }
            Error::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "file system {} operation failed for '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            Error::Yaml { message, .. } => {
                write!(f, "YAML error: {message}")
            }
            Error::Selector { selector, message } => {
                write!(f, "selector '{selector}': {message}")
            }
            Error::Build { key, message } => {
                write!(f, "failed to build '{key}': {message}")
            }
            Error::Publish { key, message } => {
                write!(f, "failed to publish '{key}': {message}")
            }
            Error::UnsupportedReference { reference } => {
                write!(f, "unsupported reference '{reference}'")
            }
            Error::File {
                file,
                stage,
                source,
            } => {
                write!(f, "error processing '{file}' ({stage}): {source}")
            }
            Error::Dependency { key, message } => {
                write!(f, "adding '{key}' to dependency graph: {message}")
            }
            Error::Notifier { message } => {
                write!(f, "watching dependencies: {message}")
            }
            Error::CommandExecution {
                command,
                args,
                message,
                exit_code,
            } => {
                let args_str = args.join(" ");
                let invocation = if args_str.is_empty() {
                    command.clone()
                } else {
                    format!("{command} {args_str}")
                };
                match exit_code {
                    Some(code) => write!(
                        f,
                        "command '{invocation}' failed with exit code {code}: {message}"
                    ),
                    None => write!(f, "command '{invocation}' failed: {message}"),
                }
            }
            Error::Shared(inner) => fmt::Display::fmt(inner, f),
            Error::Cancelled { operation } => {
                write!(f, "{operation} cancelled")
            }
            Error::Internal { message } => {
                write!(f, "internal error: {message}")
            }
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "reading",
            Stage::Parse => "parsing",
            Stage::Select => "evaluating selector",
            Stage::Resolve => "resolving image references",
            Stage::Encode => "encoding output",
        };
        f.write_str(name)
    }
}
