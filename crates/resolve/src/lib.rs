//! Manifest resolution for kresolve
//!
//! - **`enumerate`**: the stream of input manifest files, finite or live.
//! - **`documents`** and **`selector`**: multi-document YAML handling and
//!   label-selector filtering.
//! - **`references`**: finds build references in documents and substitutes
//!   the published image references.
//! - **`file`**: resolution of a single manifest file.
//! - **`pipeline`**: concurrent resolution of many files with output in
//!   submission order, plus the watch-mode re-trigger loop.

pub mod documents;
pub mod enumerate;
pub mod file;
pub mod pipeline;
pub mod references;
pub mod selector;

pub use enumerate::{FileSource, Resubmitter};
pub use file::resolve_file;
pub use pipeline::{NotifierFactory, Pipeline, PipelineOptions, WatchSettings};
pub use references::image_references;
pub use selector::Selector;
