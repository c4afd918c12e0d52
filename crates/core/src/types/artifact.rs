//! Build artifacts and the references they are published under

use super::keys::TargetKey;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt::{self, Display};

/// Content digest in `sha256:<hex>` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(String);

impl Digest {
    /// Digest the given bytes
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex portion after the algorithm prefix
    pub fn hex(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, hex)| hex)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The opaque output of building one target.
///
/// Cloning is cheap: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub key: TargetKey,
    pub digest: Digest,
    pub data: Bytes,
}

impl Artifact {
    /// Wrap built bytes, computing their digest
    pub fn new(key: TargetKey, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            key,
            digest: Digest::sha256(&data),
            data,
        }
    }
}

/// A published, content-addressed image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// `<repository>/<name>@<digest>`
    pub fn by_digest(repository: &str, name: &str, digest: &Digest) -> Self {
        let repository = repository.trim_end_matches('/');
        Self(format!("{repository}/{name}@{digest}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
