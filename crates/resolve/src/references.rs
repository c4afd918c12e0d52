//! Finding and substituting build references in documents

use futures::future::try_join_all;
use indexmap::IndexSet;
use kresolve_core::{Builder, Error, ImageReference, Publisher, Result, TargetKey, REFERENCE_SCHEME};
use serde_yaml::Value;
use std::collections::HashMap;
use tracing::debug;

/// Resolve every build reference in `documents` in place.
///
/// In strict mode only `ko://` strings are references and one the builder
/// cannot handle is an error. Otherwise any string the builder supports is
/// a reference and everything else is left alone. Each distinct reference
/// is built and published once, concurrently with the others.
pub async fn image_references(
    documents: &mut [Value],
    strict: bool,
    builder: &dyn Builder,
    publisher: &dyn Publisher,
) -> Result<()> {
    let mut candidates = IndexSet::new();
    for document in documents.iter() {
        collect(document, strict, builder, &mut candidates)?;
    }
    if candidates.is_empty() {
        return Ok(());
    }

    debug!(references = candidates.len(), "resolving references");
    let resolved = try_join_all(candidates.into_iter().map(|reference| async move {
        let key = TargetKey::from_reference(&reference);
        let artifact = builder.build(&key).await?;
        let image = publisher.publish(&artifact).await?;
        Ok::<_, Error>((reference, image))
    }))
    .await?;

    let resolved: HashMap<String, ImageReference> = resolved.into_iter().collect();
    for document in documents.iter_mut() {
        substitute(document, &resolved);
    }
    Ok(())
}

fn collect(
    value: &Value,
    strict: bool,
    builder: &dyn Builder,
    candidates: &mut IndexSet<String>,
) -> Result<()> {
    match value {
        Value::String(s) => {
            if strict {
                if s.starts_with(REFERENCE_SCHEME) {
                    if !builder.is_supported_reference(s) {
                        return Err(Error::unsupported_reference(s.as_str()));
                    }
                    candidates.insert(s.clone());
                }
            } else if builder.is_supported_reference(s) {
                candidates.insert(s.clone());
            }
        }
        Value::Sequence(items) => {
            for item in items {
                collect(item, strict, builder, candidates)?;
            }
        }
        Value::Mapping(mapping) => {
            for item in mapping.values() {
                collect(item, strict, builder, candidates)?;
            }
        }
        Value::Tagged(tagged) => collect(&tagged.value, strict, builder, candidates)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

fn substitute(value: &mut Value, resolved: &HashMap<String, ImageReference>) {
    match value {
        Value::String(s) => {
            if let Some(image) = resolved.get(s.as_str()) {
                *s = image.to_string();
            }
        }
        Value::Sequence(items) => items.iter_mut().for_each(|item| substitute(item, resolved)),
        Value::Mapping(mapping) => mapping
            .values_mut()
            .for_each(|item| substitute(item, resolved)),
        Value::Tagged(tagged) => substitute(&mut tagged.value, resolved),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
