//! Destination repository name checks

use kresolve_core::{Error, Result};

/// Check that `repository` is a usable `<registry>[/<path>...]` name.
///
/// The first component is a registry host (optionally with a port). Every
/// later component follows the lowercase path rules of image names:
/// alphanumeric runs joined by single `.`, `_` or `-` separators, with `__`
/// also allowed.
pub fn validate_repository(repository: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(Error::configuration(format!(
            "invalid repository '{repository}': {reason}"
        )))
    };

    if repository.is_empty() {
        return invalid("empty name");
    }
    if repository.len() > 255 {
        return invalid("longer than 255 characters");
    }

    let mut components = repository.split('/');
    let registry = components.next().unwrap_or_default();
    if !is_valid_registry(registry) {
        return invalid("registry must be a host name with an optional port");
    }

    for component in components {
        if component.is_empty() {
            return invalid("empty path component");
        }
        if !is_valid_path_component(component) {
            return invalid(&format!(
                "path component '{component}' must be lowercase alphanumerics separated by '.', '_' or '-'"
            ));
        }
    }

    Ok(())
}

fn is_valid_registry(registry: &str) -> bool {
    let (host, port) = match registry.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };

    if let Some(port) = port {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }

    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn is_valid_path_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if is_alnum(b) {
            i += 1;
            continue;
        }
        // A separator run: one of `.` `_` `-`, or exactly `__`.
        match b {
            b'.' | b'-' => i += 1,
            b'_' if bytes.get(i + 1) == Some(&b'_') => i += 2,
            b'_' => i += 1,
            _ => return false,
        }
        if !bytes.get(i).copied().is_some_and(is_alnum) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_repositories() {
        for repo in [
            "registry.example",
            "registry.example/team",
            "localhost:5000/apps/web",
            "gcr.io/my-project/sub_dir.v2",
            "ko.local",
        ] {
            assert!(validate_repository(repo).is_ok(), "{repo} should be valid");
        }
    }

    #[test]
    fn test_rejects_malformed_repositories() {
        for repo in [
            "",
            "registry.example/",
            "/team",
            "registry.example//team",
            "registry.example/Team",
            "registry.example/team-",
            "registry.example/a..b",
            "registry.example:port/team",
            "-bad.example/team",
        ] {
            let err = validate_repository(repo).unwrap_err();
            assert!(
                matches!(err, Error::Configuration { .. }),
                "{repo} should be a configuration error"
            );
        }
    }
}
