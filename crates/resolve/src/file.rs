//! Resolution of a single manifest file

use crate::documents::{encode_manifest, parse_manifest, Verbatim};
use crate::references::image_references;
use crate::selector::Selector;
use bytes::Bytes;
use kresolve_core::{Builder, Error, FileId, Publisher, Result, ResultExt, Stage};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Read, filter, resolve and re-encode one manifest file.
///
/// Documents without references keep their source text.
/// Any failure is reported as [`Error::File`] naming the file and stage.
/// A failure in one document fails the whole file.
pub async fn resolve_file(
    file: &FileId,
    builder: &dyn Builder,
    publisher: &dyn Publisher,
    selector: Option<&Selector>,
    strict: bool,
) -> Result<Bytes> {
    let raw = read(file).await.in_file(file, Stage::Read)?;

    let mut parsed = parse_manifest(&raw).in_file(file, Stage::Parse)?;

    if let Some(selector) = selector {
        let mut kept = Vec::with_capacity(parsed.len());
        for (document, verbatim) in parsed {
            if selector.matches_document(&document).in_file(file, Stage::Select)? {
                kept.push((document, verbatim));
            }
        }
        parsed = kept;
    }

    let (mut documents, verbatim): (Vec<_>, Vec<Option<Verbatim>>) = parsed.into_iter().unzip();
    image_references(&mut documents, strict, builder, publisher)
        .await
        .in_file(file, Stage::Resolve)?;

    let encoded = encode_manifest(documents.iter().zip(verbatim.iter().map(Option::as_ref)))
        .in_file(file, Stage::Encode)?;
    debug!(file = %file, documents = documents.len(), "resolved file");
    Ok(Bytes::from(encoded))
}

async fn read(file: &FileId) -> Result<Vec<u8>> {
    match file {
        FileId::Stdin => {
            let mut raw = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut raw)
                .await
                .map_err(|e| Error::file_system("-", "read standard input", e))?;
            Ok(raw)
        }
        FileId::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|e| Error::file_system(path.as_path(), "read manifest", e)),
    }
}
