//! Identifiers for build targets and input files

use crate::constants::{REFERENCE_SCHEME, STDIN_FILENAME};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Display};
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Opaque identifier of a compilable source unit.
///
/// Keys compare by exact string match; `ko://./cmd/app` and `./cmd/app`
/// name the same target because the scheme is stripped on construction
/// through [`TargetKey::from_reference`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetKey(String);

impl TargetKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from a manifest reference, dropping the reference scheme
    pub fn from_reference(reference: &str) -> Self {
        Self::new(strip_scheme(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Remove the `ko://` scheme from a reference, if present
pub fn strip_scheme(reference: &str) -> &str {
    reference.strip_prefix(REFERENCE_SCHEME).unwrap_or(reference)
}

impl Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for TargetKey {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for TargetKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of one input manifest: a path, or standard input
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileId {
    Stdin,
    Path(PathBuf),
}

impl FileId {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FileId::Stdin => None,
            FileId::Path(path) => Some(path),
        }
    }

    pub fn is_stdin(&self) -> bool {
        matches!(self, FileId::Stdin)
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileId::Stdin => f.write_str(STDIN_FILENAME),
            FileId::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        if s == STDIN_FILENAME {
            FileId::Stdin
        } else {
            FileId::Path(PathBuf::from(s))
        }
    }
}

impl From<PathBuf> for FileId {
    fn from(path: PathBuf) -> Self {
        if path.as_os_str() == STDIN_FILENAME {
            FileId::Stdin
        } else {
            FileId::Path(path)
        }
    }
}

impl From<&Path> for FileId {
    fn from(path: &Path) -> Self {
        FileId::from(path.to_path_buf())
    }
}
