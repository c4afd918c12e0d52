//! Label selectors over manifest documents
//!
//! Supports the set-based and equality-based requirement forms:
//!
//! ```text
//! app=web, tier==frontend, env!=prod, zone in (a, b), team notin (x), canary, !legacy
//! ```

use kresolve_core::{Error, Result};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Equals(key, value) => labels.get(key) == Some(value),
            Self::NotEquals(key, value) => labels.get(key) != Some(value),
            Self::In(key, values) => labels.get(key).is_some_and(|v| values.contains(v)),
            Self::NotIn(key, values) => labels.get(key).map_or(true, |v| !values.contains(v)),
            Self::Exists(key) => labels.contains_key(key),
            Self::DoesNotExist(key) => !labels.contains_key(key),
        }
    }
}

/// A parsed label selector; every requirement must hold for a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let err = |message: String| Error::selector(source, message);

        let mut requirements = Vec::new();
        for term in split_top_level(source).map_err(err)? {
            let term = term.trim();
            if term.is_empty() {
                return Err(err("empty requirement".to_string()));
            }
            requirements.push(parse_requirement(term).map_err(err)?);
        }

        Ok(Self {
            source: source.to_string(),
            requirements,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Match against a document's `metadata.labels`. A document without
    /// labels has an empty label set.
    pub fn matches_document(&self, document: &Value) -> Result<bool> {
        let labels = match document.get("metadata").and_then(|m| m.get("labels")) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Mapping(mapping)) => {
                let mut labels = BTreeMap::new();
                for (key, value) in mapping {
                    match (key.as_str(), value.as_str()) {
                        (Some(key), Some(value)) => {
                            labels.insert(key.to_string(), value.to_string());
                        }
                        _ => {
                            return Err(Error::selector(
                                &self.source,
                                "metadata.labels must map strings to strings",
                            ))
                        }
                    }
                }
                labels
            }
            Some(_) => {
                return Err(Error::selector(
                    &self.source,
                    "metadata.labels must be a mapping",
                ))
            }
        };
        Ok(self.matches(&labels))
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Split on commas that are not inside a parenthesised value list
fn split_top_level(source: &str) -> std::result::Result<Vec<&str>, String> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        match c {
            '(' => {
                if depth > 0 {
                    return Err("nested parentheses".to_string());
                }
                depth += 1;
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced ')'".to_string())?;
            }
            ',' if depth == 0 => {
                terms.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unclosed '('".to_string());
    }
    terms.push(&source[start..]);
    Ok(terms)
}

fn parse_requirement(term: &str) -> std::result::Result<Requirement, String> {
    if let Some(key) = term.strip_prefix('!') {
        return Ok(Requirement::DoesNotExist(label_key(key.trim())?));
    }
    if let Some((key, value)) = term.split_once("!=") {
        return Ok(Requirement::NotEquals(label_key(key.trim())?, label_value(value.trim())?));
    }
    if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
        return Ok(Requirement::Equals(label_key(key.trim())?, label_value(value.trim())?));
    }
    if let Some(open) = term.find('(') {
        let list = term[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| format!("expected ')' at the end of '{term}'"))?;
        let values = list
            .split(',')
            .map(|v| label_value(v.trim()))
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;

        let mut head = term[..open].split_whitespace();
        let (key, operator) = match (head.next(), head.next(), head.next()) {
            (Some(key), Some(operator), None) => (label_key(key)?, operator),
            _ => return Err(format!("expected '<key> in (...)' or '<key> notin (...)', got '{term}'")),
        };
        return match operator {
            "in" => Ok(Requirement::In(key, values)),
            "notin" => Ok(Requirement::NotIn(key, values)),
            other => Err(format!("unknown operator '{other}'")),
        };
    }
    Ok(Requirement::Exists(label_key(term)?))
}

fn label_key(key: &str) -> std::result::Result<String, String> {
    let valid = !key.is_empty()
        && key.len() <= 316
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if valid {
        Ok(key.to_string())
    } else {
        Err(format!("invalid label key '{key}'"))
    }
}

fn label_value(value: &str) -> std::result::Result<String, String> {
    let valid = value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(value.to_string())
    } else {
        Err(format!("invalid label value '{value}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_equality_requirements() {
        let selector = Selector::parse("app=web, tier==frontend, env!=prod").unwrap();

        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "frontend")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "frontend"), ("env", "prod")])));
        assert!(!selector.matches(&labels(&[("app", "api"), ("tier", "frontend")])));
    }

    #[test]
    fn test_set_requirements() {
        let selector = Selector::parse("zone in (a, b),team notin (x),canary,!legacy").unwrap();

        assert!(selector.matches(&labels(&[("zone", "b"), ("canary", "")])));
        assert!(!selector.matches(&labels(&[("zone", "c"), ("canary", "")])));
        assert!(!selector.matches(&labels(&[("zone", "a"), ("canary", ""), ("team", "x")])));
        assert!(!selector.matches(&labels(&[("zone", "a")])));
        assert!(!selector.matches(&labels(&[("zone", "a"), ("canary", ""), ("legacy", "1")])));
    }

    #[test]
    fn test_invalid_selectors() {
        for source in ["app in (a", "app=we b", "in (a)", "app foo (a)", "a,,b", "app=(x)", "ap p"] {
            let err = Selector::parse(source).unwrap_err();
            assert!(matches!(err, Error::Selector { .. }), "{source} should fail");
        }
    }

    #[test]
    fn test_matches_document_labels() {
        let selector: Selector = "app=web".parse().unwrap();

        let matching: Value = serde_yaml::from_str("metadata:\n  labels:\n    app: web\n").unwrap();
        let unlabeled: Value = serde_yaml::from_str("kind: Pod\n").unwrap();
        let malformed: Value = serde_yaml::from_str("metadata:\n  labels: [app]\n").unwrap();
        let numeric: Value = serde_yaml::from_str("metadata:\n  labels:\n    app: 3\n").unwrap();

        assert!(selector.matches_document(&matching).unwrap());
        assert!(!selector.matches_document(&unlabeled).unwrap());
        assert!(selector.matches_document(&malformed).is_err());
        assert!(selector.matches_document(&numeric).is_err());
    }
}
