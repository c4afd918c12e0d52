//! Multi-document YAML decoding and encoding
//!
//! A document that comes out of resolution unchanged is written back as the
//! exact text it was read from, comments and layout included. Changed
//! documents are re-encoded with two-space indentation and block sequences
//! indented under their parent key.

use kresolve_core::{Error, Result, DOCUMENT_SEPARATOR};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// Source text of one document and the value it decodes to
#[derive(Debug, Clone)]
pub struct Verbatim {
    text: String,
    decoded: Value,
}

impl Verbatim {
    /// The source text, if `value` is still what it decoded to
    fn text_for(&self, value: &Value) -> Option<&str> {
        (self.decoded == *value).then_some(self.text.as_str())
    }
}

/// Decode every document in `raw`. Empty documents are dropped.
pub fn parse_documents(raw: &[u8]) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for deserializer in serde_yaml::Deserializer::from_slice(raw) {
        let document = Value::deserialize(deserializer)
            .map_err(|e| Error::yaml("decoding manifest", e))?;
        if !document.is_null() {
            documents.push(document);
        }
    }
    Ok(documents)
}

/// Decode every document in `raw`, pairing each with its source text when
/// that text can be located exactly. Flow-style (JSON) documents carry no
/// source text and are always re-encoded as block YAML.
pub fn parse_manifest(raw: &[u8]) -> Result<Vec<(Value, Option<Verbatim>)>> {
    let documents = parse_documents(raw)?;
    let mut sources = locate_sources(raw, &documents)
        .unwrap_or_else(|| vec![None; documents.len()])
        .into_iter();
    Ok(documents
        .into_iter()
        .map(|document| (document, sources.next().flatten()))
        .collect())
}

/// Split `raw` at its document markers and decode each piece on its own.
///
/// Gives up (returns `None`) on anything the line scan cannot be sure of:
/// directives, end markers, content on a marker line, or pieces that do not
/// decode to exactly the documents of the whole stream.
fn locate_sources(raw: &[u8], documents: &[Value]) -> Option<Vec<Option<Verbatim>>> {
    let text = std::str::from_utf8(raw).ok()?;
    let mut sources = Vec::with_capacity(documents.len());

    for piece in split_pieces(text)? {
        let mut decoded = parse_documents(piece.as_bytes()).ok()?;
        if decoded.len() > 1 {
            return None;
        }
        let Some(decoded) = decoded.pop() else {
            continue;
        };
        if *documents.get(sources.len())? != decoded {
            return None;
        }

        let trimmed = piece.trim_start();
        let flow = trimmed.starts_with('{') || trimmed.starts_with('[');
        sources.push((!flow).then(|| {
            let mut text = piece.to_string();
            if !text.ends_with('\n') {
                text.push('\n');
            }
            Verbatim { text, decoded }
        }));
    }

    (sources.len() == documents.len()).then_some(sources)
}

/// The text between `---` marker lines
fn split_pieces(text: &str) -> Option<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if let Some(rest) = content.strip_prefix("---") {
            if rest.is_empty() || rest.starts_with([' ', '\t']) {
                let rest = rest.trim_start();
                if !(rest.is_empty() || rest.starts_with('#')) {
                    return None;
                }
                pieces.push(&text[start..offset]);
                start = offset + line.len();
            }
        } else if content.starts_with('%') || content == "..." || content.starts_with("... ") {
            return None;
        }
        offset += line.len();
    }

    pieces.push(&text[start..]);
    Some(pieces)
}

/// Encode documents separated by `---` lines
pub fn encode_documents(documents: &[Value]) -> Result<String> {
    encode_manifest(documents.iter().map(|document| (document, None)))
}

/// Encode documents separated by `---` lines, reusing the source text of
/// every document that still matches it
pub fn encode_manifest<'a, I>(documents: I) -> Result<String>
where
    I: IntoIterator<Item = (&'a Value, Option<&'a Verbatim>)>,
{
    let mut out = String::new();
    for (index, (document, verbatim)) in documents.into_iter().enumerate() {
        if index > 0 {
            out.push_str(DOCUMENT_SEPARATOR);
        }
        match verbatim.and_then(|verbatim| verbatim.text_for(document)) {
            Some(text) => out.push_str(text),
            None => out.push_str(&encode_document(document)?),
        }
    }
    Ok(out)
}

fn encode_document(document: &Value) -> Result<String> {
    let mut out = String::new();
    let written = match document {
        Value::Mapping(mapping) if !mapping.is_empty() => write_mapping(&mut out, mapping, 0, false),
        Value::Sequence(items) if !items.is_empty() => write_sequence(&mut out, items, 0, false),
        scalar => write_scalar(&mut out, scalar, 0).map(|()| out.push('\n')),
    };
    match written {
        Some(()) => Ok(out),
        // Complex keys and tagged collections.
        None => serde_yaml::to_string(document).map_err(|e| Error::yaml("encoding manifest", e)),
    }
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

/// `inline` means the cursor already sits after a `- ` for the first entry
fn write_mapping(out: &mut String, mapping: &Mapping, indent: usize, inline: bool) -> Option<()> {
    for (index, (key, value)) in mapping.iter().enumerate() {
        if index > 0 || !inline {
            pad(out, indent);
        }
        write_key(out, key)?;
        out.push(':');
        match value {
            Value::Mapping(nested) if !nested.is_empty() => {
                out.push('\n');
                write_mapping(out, nested, indent + 2, false)?;
            }
            Value::Sequence(items) if !items.is_empty() => {
                out.push('\n');
                write_sequence(out, items, indent + 2, false)?;
            }
            scalar => {
                out.push(' ');
                write_scalar(out, scalar, indent)?;
                out.push('\n');
            }
        }
    }
    Some(())
}

fn write_sequence(out: &mut String, items: &[Value], indent: usize, inline: bool) -> Option<()> {
    for (index, item) in items.iter().enumerate() {
        if index > 0 || !inline {
            pad(out, indent);
        }
        out.push_str("- ");
        match item {
            Value::Mapping(nested) if !nested.is_empty() => {
                write_mapping(out, nested, indent + 2, true)?;
            }
            Value::Sequence(nested) if !nested.is_empty() => {
                write_sequence(out, nested, indent + 2, true)?;
            }
            scalar => {
                write_scalar(out, scalar, indent)?;
                out.push('\n');
            }
        }
    }
    Some(())
}

fn write_key(out: &mut String, key: &Value) -> Option<()> {
    if matches!(key, Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_)) {
        return None;
    }
    let text = serde_yaml::to_string(key).ok()?;
    let text = text.strip_suffix('\n').unwrap_or(&text);
    if text.contains('\n') {
        return None;
    }
    out.push_str(text);
    Some(())
}

/// Write a leaf value. Block scalars have their continuation lines shifted
/// right by `indent`.
fn write_scalar(out: &mut String, value: &Value, indent: usize) -> Option<()> {
    let text = serde_yaml::to_string(value).ok()?;
    let text = text.strip_suffix('\n').unwrap_or(&text);
    let mut lines = text.split('\n');
    out.push_str(lines.next()?);
    for line in lines {
        if !matches!(value, Value::String(_)) {
            return None;
        }
        out.push('\n');
        if !line.is_empty() {
            pad(out, indent);
        }
        out.push_str(line);
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(input: &str) -> String {
        let documents = parse_manifest(input.as_bytes()).unwrap();
        encode_manifest(documents.iter().map(|(value, verbatim)| (value, verbatim.as_ref()))).unwrap()
    }

    #[test]
    fn test_multiple_documents_round_trip() {
        let input = "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: first
---
apiVersion: v1
kind: Service
metadata:
  name: second
  labels:
    app: web
";
        let documents = parse_documents(input.as_bytes()).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(encode_documents(&documents).unwrap(), input);
    }

    #[test]
    fn test_empty_documents_are_dropped() {
        let documents = parse_documents(b"---\n---\nkind: Pod\n---\n# only a comment\n").unwrap();
        assert_eq!(documents.len(), 1);
        assert!(parse_documents(b"").unwrap().is_empty());
        assert_eq!(encode_documents(&[]).unwrap(), "");
        assert_eq!(round_trip("---\n---\nkind: Pod\n---\n# only a comment\n"), "kind: Pod\n");
    }

    #[test]
    fn test_malformed_input_is_yaml_error() {
        let err = parse_documents(b"kind: [unclosed\n").unwrap_err();
        assert!(matches!(err, Error::Yaml { .. }));
    }

    #[test]
    fn test_json_input_is_reencoded_as_yaml() {
        let documents = parse_documents(br#"{"kind": "Pod", "spec": {"image": "x"}}"#).unwrap();
        assert_eq!(
            encode_documents(&documents).unwrap(),
            "kind: Pod\nspec:\n  image: x\n"
        );
        assert_eq!(
            round_trip(r#"{"kind": "Pod", "spec": {"image": "x"}}"#),
            "kind: Pod\nspec:\n  image: x\n"
        );
    }

    #[test]
    fn test_untouched_documents_keep_comments_and_layout() {
        let input = "\
# app deployment
kind: Deployment
spec:
  containers:
    - name: web # main
      image: nginx
---   # second
kind: Service
spec:
  ports: [80, 443]
";
        assert_eq!(
            round_trip(input),
            input.replace("---   # second\n", DOCUMENT_SEPARATOR)
        );
    }

    #[test]
    fn test_changed_document_is_reencoded_with_indented_sequences() {
        let input = "\
# app deployment
kind: Deployment
spec:
  containers:
  - name: web
    image: ko://./cmd/web
    args:
    - --verbose
---
# untouched
kind: Service
";
        let mut documents = parse_manifest(input.as_bytes()).unwrap();
        documents[0].0["spec"]["containers"][0]["image"] = Value::from("registry.example/web@sha256:abc");

        let encoded =
            encode_manifest(documents.iter().map(|(value, verbatim)| (value, verbatim.as_ref()))).unwrap();
        assert_eq!(
            encoded,
            "\
kind: Deployment
spec:
  containers:
    - name: web
      image: registry.example/web@sha256:abc
      args:
        - --verbose
---
# untouched
kind: Service
"
        );
    }

    #[test]
    fn test_reencoded_block_scalars_stay_under_their_key() {
        let mut document = parse_documents(b"data:\n  script: |\n    echo one\n    echo two\n").unwrap();
        document[0]["data"]["other"] = Value::from("x");

        let encoded = encode_documents(&document).unwrap();
        assert_eq!(parse_documents(encoded.as_bytes()).unwrap(), document);
        assert!(encoded.starts_with("data:\n  script: "));
        assert!(encoded.ends_with("  other: x\n"));
    }

    #[test]
    fn test_nested_sequences_and_empty_collections() {
        let documents = parse_documents(b"matrix:\n- [1, 2]\n- []\nlabels: {}\n").unwrap();

        let encoded = encode_documents(&documents).unwrap();
        assert_eq!(encoded, "matrix:\n  - - 1\n    - 2\n  - []\nlabels: {}\n");
        assert_eq!(parse_documents(encoded.as_bytes()).unwrap(), documents);
    }

    #[test]
    fn test_directives_fall_back_to_reencoding() {
        assert_eq!(round_trip("%YAML 1.1\n---\nkind: Pod # note\n"), "kind: Pod\n");
    }
}
