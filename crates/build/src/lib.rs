//! Concrete build and publish capabilities
//!
//! [`SourceBuilder`] packs a source directory into a deterministic,
//! content-addressed artifact. The publishers turn artifacts into image
//! references, either purely computed ([`DryRunPublisher`]) or also
//! written into a local layout ([`LayoutPublisher`]).

pub mod naming;
pub mod publish;
pub mod source;

pub use naming::image_name;
pub use publish::{DryRunPublisher, LayoutPublisher, MultiPublisher};
pub use source::SourceBuilder;
