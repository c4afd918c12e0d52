//! Image names derived from target keys

use kresolve_config::NamingStrategy;
use kresolve_core::NAME_HASH_LEN;
use sha2::{Digest, Sha256};

const FALLBACK_NAME: &str = "image";

/// Name under the destination repository for the image built from `key`
pub fn image_name(strategy: NamingStrategy, key: &str) -> String {
    let path = key.trim_start_matches("./").trim_end_matches('/');
    let base = path.rsplit('/').next().unwrap_or(path);

    match strategy {
        NamingStrategy::BaseHash => {
            let hash = hex::encode(Sha256::digest(key.as_bytes()));
            format!("{}-{}", sanitize(base), &hash[..NAME_HASH_LEN])
        }
        NamingStrategy::Base => sanitize(base),
        NamingStrategy::Preserve => path
            .split('/')
            .map(sanitize)
            .collect::<Vec<_>>()
            .join("/"),
    }
}

/// Lowercase, with runs of characters not allowed in image names collapsed
/// to a single `-`
fn sanitize(component: &str) -> String {
    let mut name = String::with_capacity(component.len());
    for c in component.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.ends_with('-') {
            name.push('-');
        }
    }
    let name = name.trim_matches('-');
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}
