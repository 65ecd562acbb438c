//! Multi-document YAML splitting.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use super::registry::Gvk;

/// Errors that terminate validation of a manifest input.
#[derive(Error, Debug)]
pub enum ManifestParseError {
    #[error("manifest contains no documents")]
    Empty,
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One non-empty document from a manifest stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Zero-based position among the non-empty documents.
    pub index: usize,
    pub value: Value,
}

impl Document {
    pub fn as_object(&self) -> Option<&Mapping> {
        self.value.as_mapping()
    }

    /// `document-<index>`
    pub fn location(&self) -> String {
        format!("document-{}", self.index)
    }

    /// GVK from `apiVersion` and `kind`. None if either is missing, empty or not a string.
    pub fn gvk(&self) -> Option<Gvk> {
        let map = self.as_object()?;
        let api_version = non_empty_str(map.get("apiVersion"))?;
        let kind = non_empty_str(map.get("kind"))?;
        Some(Gvk::from_api_version(api_version, kind))
    }

    /// `metadata.name`, if present.
    pub fn name(&self) -> Option<&str> {
        non_empty_str(self.as_object()?.get("metadata")?.get("name"))
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Split YAML text into its non-empty documents.
///
/// Empty documents (between consecutive `---`, or comment-only) are skipped.
/// A syntax error anywhere fails the whole input.
pub fn parse_documents(text: &str) -> Result<Vec<Document>, ManifestParseError> {
    let mut documents = Vec::new();
    for de in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(de)?;
        if value.is_null() {
            continue;
        }
        documents.push(Document {
            index: documents.len(),
            value,
        });
    }

    if documents.is_empty() {
        return Err(ManifestParseError::Empty);
    }
    Ok(documents)
}
