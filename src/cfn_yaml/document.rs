use super::emitter;
use super::loader::Loader;
use super::parser::{self, Entry, Marked};
use super::types::{Node, Scalar};
use crate::errors::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// A loaded template: the node tree plus the text it came from.
///
/// Changes go through [`Document::set_entry`], which records the entry it
/// replaced. Rendering rewrites only those entries in the original text, so
/// every other line, comments included, comes back byte for byte.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
    source: Option<String>,
    edits: Vec<Edit>,
}

#[derive(Debug, Clone, PartialEq)]
struct Edit {
    path: Vec<String>,
    before: Option<String>,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        let root = Loader::new().load(text)?;
        parser::parse_marks(text)?;
        Ok(Document {
            root,
            source: Some(text.to_string()),
            edits: Vec::new(),
        })
    }

    /// A document with no source text. It renders in the serializer's own
    /// layout.
    pub fn from_node(root: Node) -> Self {
        Document {
            root,
            source: None,
            edits: Vec::new(),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Sets `key` in the mapping at `parent`. An existing key keeps its
    /// position. A new key goes in front of `before` when that key exists,
    /// and at the end otherwise.
    pub fn set_entry(
        &mut self,
        parent: &[&str],
        key: &str,
        value: Node,
        before: Option<&str>,
    ) -> Result<()> {
        let map = self
            .root
            .get_path_mut(parent)
            .and_then(Node::as_mapping_mut)
            .ok_or_else(|| Error::missing_path(parent))?;

        let key_scalar = Scalar::from(key);
        let slot = match before {
            Some(next) if !map.contains_key(&key_scalar) => map.get_index_of(&Scalar::from(next)),
            _ => None,
        };
        match slot {
            Some(at) => {
                map.shift_insert(at, key_scalar, value);
            }
            None => {
                map.insert(key_scalar, value);
            }
        }

        let path: Vec<String> = parent
            .iter()
            .chain(std::iter::once(&key))
            .map(|s| s.to_string())
            .collect();
        self.edits.retain(|edit| edit.path != path);
        self.edits.push(Edit {
            path,
            before: before.map(str::to_string),
        });
        Ok(())
    }

    /// Renders the document and checks that the text reads back as exactly
    /// this document.
    pub fn to_yaml_string(&self) -> Result<String> {
        let text = match &self.source {
            None => emitter::document(&self.root)?,
            Some(source) => {
                let mut text = source.clone();
                for edit in &self.edits {
                    text = self.apply(&text, edit)?;
                }
                text
            }
        };
        self.verify(&text)?;
        Ok(text)
    }

    fn apply(&self, text: &str, edit: &Edit) -> Result<String> {
        let outline = parser::parse_marks(text)?;
        let path: Vec<&str> = edit.path.iter().map(String::as_str).collect();

        // Rewrite the deepest entry that sits in a block mapping. Flow
        // mappings are rewritten whole as part of their enclosing entry.
        for depth in (1..=path.len()).rev() {
            let Some(value) = self.root.get_path(&path[..depth]) else {
                continue;
            };
            let parent = outline.as_ref().and_then(|o| o.find(&path[..depth - 1]));
            if let Some(Marked::Mapping {
                flow: false,
                entries,
            }) = parent
            {
                let before = if depth == path.len() {
                    edit.before.as_deref()
                } else {
                    None
                };
                if let Some(spliced) =
                    splice_entry(text, entries, path[depth - 1], value, before)?
                {
                    return Ok(spliced);
                }
            }
        }

        debug!(path = %edit.path.join("."), "no block entry to rewrite, rendering whole document");
        emitter::document(&self.root)
    }

    fn verify(&self, text: &str) -> Result<()> {
        let reloaded = Loader::new().load(text)?;
        if reloaded == self.root {
            Ok(())
        } else {
            Err(Error::Parse {
                path: PathBuf::new(),
                location: None,
                reason: "rewritten template does not read back as the patched document"
                    .to_string(),
            })
        }
    }
}

/// Replaces or inserts `key: value` among the `entries` of a block mapping.
/// Returns `None` when the entries do not start their own lines, as in a
/// `- Key: value` sequence item.
fn splice_entry(
    text: &str,
    entries: &[Entry],
    key: &str,
    value: &Node,
    before: Option<&str>,
) -> Result<Option<String>> {
    let lines = Lines::new(text);
    let find = |name: &str| entries.iter().find(|e| e.key.as_deref() == Some(name));

    if let Some(existing) = find(key) {
        if !lines.starts_line(existing) {
            return Ok(None);
        }
        let start = lines.offset(existing.mark.line);
        let end = lines.entry_end(existing.mark.line, existing.mark.column);
        let rendered = emitter::entry(key, value, existing.mark.column)?;
        return Ok(Some(format!("{}{}{}", &text[..start], rendered, &text[end..])));
    }

    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        return Ok(None);
    };
    if !lines.starts_line(first) {
        return Ok(None);
    }
    let at = match before.and_then(find) {
        Some(next) => lines.offset(lines.comments_above(next.mark.line)),
        None => lines.entry_end(last.mark.line, last.mark.column),
    };

    let mut out = String::with_capacity(text.len() + 256);
    out.push_str(&text[..at]);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&emitter::entry(key, value, first.mark.column)?);
    out.push_str(&text[at..]);
    Ok(Some(out))
}

/// Line index over a text, for turning parser marks into byte offsets.
struct Lines<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.match_indices('\n')
                .map(|(i, _)| i + 1)
                .filter(|&i| i < text.len()),
        );
        Lines { text, starts }
    }

    fn count(&self) -> usize {
        self.starts.len()
    }

    fn offset(&self, line: usize) -> usize {
        self.starts.get(line).copied().unwrap_or(self.text.len())
    }

    fn line(&self, line: usize) -> &'a str {
        let text = &self.text[self.offset(line)..self.offset(line + 1)];
        text.trim_end_matches(['\r', '\n'])
    }

    /// True when only spaces precede the entry's key on its line.
    fn starts_line(&self, entry: &Entry) -> bool {
        let line = self.line(entry.mark.line);
        line.chars().count() >= entry.mark.column
            && line.chars().take(entry.mark.column).all(|c| c == ' ')
    }

    /// Byte offset just past the entry whose key starts at `line`/`column`.
    /// Blank and comment lines trailing the entry are left out, since they
    /// usually introduce whatever follows.
    fn entry_end(&self, line: usize, column: usize) -> usize {
        let mut end = line + 1;
        while end < self.count() && !ends_entry(self.line(end), column) {
            end += 1;
        }
        while end > line + 1 && is_blank_or_comment(self.line(end - 1)) {
            end -= 1;
        }
        self.offset(end)
    }

    /// First line of the comment block directly above `line`.
    fn comments_above(&self, line: usize) -> usize {
        let mut first = line;
        while first > 0 && is_comment(self.line(first - 1)) {
            first -= 1;
        }
        first
    }
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_blank_or_comment(line: &str) -> bool {
    line.trim().is_empty() || is_comment(line)
}

/// Whether `line` belongs to something after an entry whose key sits at
/// `column`. A block sequence may start at the key's own column.
fn ends_entry(line: &str, column: usize) -> bool {
    if is_blank_or_comment(line) {
        return false;
    }
    if line.starts_with("---") || line.starts_with("...") {
        return true;
    }
    let indent = line.len() - line.trim_start_matches(' ').len();
    let rest = &line[indent..];
    indent < column || (indent == column && rest != "-" && !rest.starts_with("- "))
}
