//! The immutable run configuration
//!
//! `Config` is the single source of truth for how a resolution run behaves.
//! It is split into one section per concern so each component only needs
//! to look at the options that affect it.

use crate::repository::validate_repository;
use kresolve_core::{Error, Result, DEFAULT_DEBOUNCE_MS, STDIN_FILENAME};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Immutable configuration for one run.
///
/// Construct it through [`ConfigBuilder`] or [`crate::ConfigLoader`] and
/// call [`Config::validate`] before handing it to the pipeline.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub build: BuildOptions,
    pub publish: PublishOptions,
    pub filenames: FilenameOptions,
    pub selector: SelectorOptions,
    pub strict: StrictOptions,
    pub watch: WatchOptions,
}

/// How targets are built
#[derive(Debug, Clone, Serialize)]
pub struct BuildOptions {
    /// Directory target keys are resolved against
    pub root: PathBuf,

    /// Maximum number of physical builds running at once
    pub concurrent_builds: usize,
}

/// Where and how artifacts are published
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishOptions {
    /// Destination repository, e.g. `registry.example/team`
    pub repository: String,

    pub naming: NamingStrategy,

    /// Also write artifacts into a local image layout at this path
    pub oci_layout_path: Option<PathBuf>,

    /// Cap on simultaneous publishes; uncapped when `None`
    pub concurrent_publishes: Option<usize>,

    /// Tags recorded next to each published reference
    pub tags: Vec<String>,
}

/// Which manifest files are read
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilenameOptions {
    /// Files, directories, or `-` for standard input
    pub filenames: Vec<PathBuf>,

    /// Descend into subdirectories of directory inputs
    pub recursive: bool,

    /// Keep running and re-resolve on change
    pub watch: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectorOptions {
    /// Label selector documents must match to be kept
    pub selector: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StrictOptions {
    /// Only treat `ko://` strings as references, and reject unsupported ones
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchOptions {
    /// Quiet period that ends a burst of filesystem events
    pub debounce: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            concurrent_builds: std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// How a target key becomes an image name under the repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingStrategy {
    /// `<last path component>-<short hash of the key>`
    #[default]
    BaseHash,
    /// `<last path component>`
    Base,
    /// The whole key
    Preserve,
}

impl NamingStrategy {
    pub const ALL: [NamingStrategy; 3] = [Self::BaseHash, Self::Base, Self::Preserve];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaseHash => "base-hash",
            Self::Base => "base",
            Self::Preserve => "preserve",
        }
    }
}

impl fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "unknown naming strategy '{s}', expected one of: base-hash, base, preserve"
                ))
            })
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Whether any input is standard input
    pub fn reads_stdin(&self) -> bool {
        self.filenames
            .filenames
            .iter()
            .any(|path| path.as_os_str() == STDIN_FILENAME)
    }

    /// Reject configurations that cannot run. Called before any file is read.
    pub fn validate(&self) -> Result<()> {
        if self.publish.repository.is_empty() {
            return Err(Error::configuration(format!(
                "no destination repository: pass --repo or set {}",
                kresolve_core::DOCKER_REPO_VAR
            )));
        }
        validate_repository(&self.publish.repository)?;

        if self.filenames.filenames.is_empty() {
            return Err(Error::configuration(
                "no input files: pass -f with a file, a directory or '-'",
            ));
        }

        if self.filenames.watch && self.reads_stdin() {
            return Err(Error::configuration(
                "cannot watch standard input: remove '-' from the inputs or drop --watch",
            ));
        }

        if self.build.concurrent_builds == 0 {
            return Err(Error::configuration("concurrent builds must be at least 1"));
        }

        if self.publish.concurrent_publishes == Some(0) {
            return Err(Error::configuration(
                "concurrent publishes must be at least 1",
            ));
        }

        for tag in &self.publish.tags {
            if tag.is_empty() || tag.len() > 128 || !tag.chars().all(is_tag_char) {
                return Err(Error::configuration(format!("invalid tag '{tag}'")));
            }
        }

        if self.watch.debounce.is_zero() && self.filenames.watch {
            return Err(Error::configuration("debounce window must be positive"));
        }

        Ok(())
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Step-by-step construction of a [`Config`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.build.root = root.into();
        self
    }

    pub fn concurrent_builds(mut self, builds: usize) -> Self {
        self.config.build.concurrent_builds = builds;
        self
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.config.publish.repository = repository.into();
        self
    }

    pub fn naming(mut self, naming: NamingStrategy) -> Self {
        self.config.publish.naming = naming;
        self
    }

    pub fn oci_layout_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.publish.oci_layout_path = path;
        self
    }

    pub fn concurrent_publishes(mut self, publishes: Option<usize>) -> Self {
        self.config.publish.concurrent_publishes = publishes;
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.config.publish.tags = tags;
        self
    }

    pub fn filenames(mut self, filenames: Vec<PathBuf>) -> Self {
        self.config.filenames.filenames = filenames;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.config.filenames.recursive = recursive;
        self
    }

    pub fn watch(mut self, watch: bool) -> Self {
        self.config.filenames.watch = watch;
        self
    }

    pub fn selector(mut self, selector: Option<String>) -> Self {
        self.config.selector.selector = selector.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict.strict = strict;
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config.watch.debounce = debounce;
        self
    }

    /// Finish without validating
    pub fn build(self) -> Config {
        self.config
    }
}
