//! Format-specific document loaders.
//!
//! Each loader normalizes one source format into `NormalizedDocument`s that
//! the chunker consumes uniformly. PDF/DOCX/SQL loaders would implement the
//! same trait; only text and JSON ship in-tree.

use crate::errors::{RagError, Result};
use crate::types::NormalizedDocument;
use std::path::Path;

/// A format-specific loader: source location in, normalized documents out.
pub trait DocumentLoader {
    /// Load and normalize all documents from `source`.
    fn load(&self, source: &Path) -> Result<Vec<NormalizedDocument>>;
}

/// Plain text and markdown files: one document per file.
#[derive(Debug, Clone, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, source: &Path) -> Result<Vec<NormalizedDocument>> {
        let text = std::fs::read_to_string(source)?;
        let mut doc = NormalizedDocument::new(source.to_string_lossy(), text);
        doc.metadata
            .insert("format".to_string(), "text".to_string());
        Ok(vec![doc])
    }
}

/// JSON files: string leaves are concatenated into one document, with their
/// JSON pointer paths recorded as metadata keys.
#[derive(Debug, Clone, Default)]
pub struct JsonLoader;

impl DocumentLoader for JsonLoader {
    fn load(&self, source: &Path) -> Result<Vec<NormalizedDocument>> {
        let raw = std::fs::read_to_string(source)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;

        let mut parts = Vec::new();
        collect_strings(&value, "", &mut parts);
        if parts.is_empty() {
            return Err(RagError::Input(format!(
                "JSON document {} contains no string fields",
                source.display()
            )));
        }

        let text = parts
            .iter()
            .map(|(_, s)| s.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut doc = NormalizedDocument::new(source.to_string_lossy(), text);
        doc.metadata
            .insert("format".to_string(), "json".to_string());
        doc.metadata
            .insert("fields".to_string(), parts.len().to_string());
        Ok(vec![doc])
    }
}

/// Depth-first walk collecting (pointer, string) pairs.
fn collect_strings(value: &serde_json::Value, path: &str, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::String(s) => out.push((path.to_string(), s.clone())),
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_strings(item, &format!("{}/{}", path, i), out);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, item) in map {
                collect_strings(item, &format!("{}/{}", path, key), out);
            }
        }
        _ => {}
    }
}

/// Pick a loader from the file extension.
pub fn loader_for(source: &Path) -> Box<dyn DocumentLoader> {
    match source.extension().and_then(|e| e.to_str()) {
        Some("json") => Box::new(JsonLoader),
        _ => Box::new(TextLoader),
    }
}
