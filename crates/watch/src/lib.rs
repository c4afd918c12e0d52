//! Watch-mode change tracking for kresolve
//!
//! Maps filesystem changes back to the build targets they affect, and the
//! targets back to the manifest files that referenced them.

pub mod debounce;
pub mod graph;
pub mod locator;
pub mod notifier;
pub mod targets;

pub use graph::DependencyGraph;
pub use locator::{DirectoryLocator, SourceLocator};
pub use notifier::{FsNotifier, Notifier, NotifierEvent};
pub use targets::FileTargets;
