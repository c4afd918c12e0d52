//! Domain newtypes shared across the workspace

pub mod artifact;
pub mod keys;

pub use artifact::{Artifact, Digest, ImageReference};
pub use keys::{FileId, TargetKey};
