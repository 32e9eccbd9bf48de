use indexmap::IndexMap;
use std::fmt;

/// 1-based position in a template, used in parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Location { line, column }
    }

    /// Converts a 0-based parser mark.
    pub(crate) fn from_zero_based(line: usize, column: usize) -> Self {
        Location::new(line + 1, column + 1)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Location { line, column } = self;
        write!(f, "line {line}, column {column}")
    }
}

/// A local YAML tag such as `!Ref`, stored without the leading `!`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.strip_prefix('!') {
            Some(stripped) => Tag(stripped.to_string()),
            None => Tag(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{}", self.0)
    }
}

/// Scalar payload of a node. Numbers keep their canonical text so scalars
/// stay hashable and can be used as mapping keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(String),
    String(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

pub type Mapping = IndexMap<Scalar, Node>;

/// A node of a loaded template. Every variant carries an optional tag, so
/// `!FindInMap [...]`, `!Ref x` and tags nobody here has heard of all go
/// through the same code paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Option<Tag>, Scalar),
    Sequence(Option<Tag>, Vec<Node>),
    Mapping(Option<Tag>, Mapping),
}

impl Node {
    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(None, Scalar::String(value.into()))
    }

    pub fn mapping() -> Self {
        Node::Mapping(None, Mapping::new())
    }

    /// `!Ref <name>`
    pub fn reference(name: &str) -> Self {
        Node::Scalar(Some(Tag::new("Ref")), Scalar::from(name))
    }

    /// `!FindInMap [ <table>, <top_level_key>, <second_level_key> ]`
    pub fn find_in_map(table: &str, top_level_key: Node, second_level_key: &str) -> Self {
        Node::Sequence(
            Some(Tag::new("FindInMap")),
            vec![
                Node::string(table),
                top_level_key,
                Node::string(second_level_key),
            ],
        )
    }

    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Node::Scalar(tag, _) | Node::Sequence(tag, _) | Node::Mapping(tag, _) => tag.as_ref(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(None, scalar) => scalar.as_str(),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(_, map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(_, map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Sequence(_, items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a string key in a mapping node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping()
            .and_then(|map| map.get(&Scalar::String(key.to_string())))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.as_mapping_mut()
            .and_then(|map| map.get_mut(&Scalar::String(key.to_string())))
    }

    /// Follows string keys down from this node. An empty path is the node
    /// itself.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| node.get(key.as_ref()))
    }

    pub fn get_path_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Node> {
        path.iter()
            .try_fold(self, |node, key| node.get_mut(key.as_ref()))
    }

    /// Inserts into a mapping node, keeping the slot of an existing key.
    /// Returns `false` when the node is not a mapping.
    pub fn insert(&mut self, key: &str, value: Node) -> bool {
        match self.as_mapping_mut() {
            Some(map) => {
                map.insert(Scalar::String(key.to_string()), value);
                true
            }
            None => false,
        }
    }
}
