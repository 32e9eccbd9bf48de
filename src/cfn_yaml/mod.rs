//! Loading and writing CloudFormation YAML without losing intrinsic function
//! tags. `!FindInMap [...]`, `!Ref x` and any other local tag are kept as
//! tagged [`Node`]s. Writing back only rewrites the entries that were set, so
//! the rest of the file keeps its exact text.

mod document;
mod emitter;
mod loader;
mod parser;
pub mod types;

use crate::errors::{Error, Result};
use crate::fs;
use std::path::Path;
use tracing::debug;

pub use document::Document;
pub use types::{Location, Node, Scalar, Tag};

/// Parse CloudFormation YAML text with intrinsic function tag support
pub fn parse_cf_yaml(yaml_str: &str) -> Result<Document> {
    Document::parse(yaml_str)
}

/// Render a document as YAML text
pub fn to_yaml_string(doc: &Document) -> Result<String> {
    doc.to_yaml_string()
}

/// Read and parse the template at `path`.
pub fn load(path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path).map_err(|source| Error::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "loaded template");
    let content = String::from_utf8(bytes).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        location: None,
        reason: format!("template is not valid UTF-8: {}", e.utf8_error()),
    })?;
    parse_cf_yaml(&content).map_err(|e| e.with_path(path))
}

/// Render `doc` and atomically replace the file at `path` with it. The text
/// is only written once it reads back as `doc`.
pub fn dump(doc: &Document, path: &Path) -> Result<()> {
    let text = doc.to_yaml_string().map_err(|e| e.with_path(path))?;
    fs::atomic_write(path, text.as_bytes())
}
