use super::types::{Location, Mapping, Node, Scalar, Tag};
use crate::errors::{Error, InternalError, Result};
use serde_yml::Value;
use std::path::PathBuf;

/// Turns YAML text into a [`Node`] tree, keeping local tags as tagged nodes.
pub(crate) struct Loader;

impl Loader {
    pub(crate) fn new() -> Self {
        Loader
    }

    pub(crate) fn load(&mut self, content: &str) -> Result<Node> {
        let value: Value = serde_yml::from_str(content).map_err(|e| Error::Parse {
            path: PathBuf::new(),
            location: e.location().map(|l| Location::new(l.line(), l.column())),
            reason: e.to_string(),
        })?;

        self.convert(value).map_err(|e| Error::Parse {
            path: PathBuf::new(),
            location: None,
            reason: e.to_string(),
        })
    }

    fn convert(&mut self, value: Value) -> std::result::Result<Node, InternalError> {
        match value {
            Value::Tagged(tagged) => {
                let tag = Tag::new(tagged.tag.to_string());
                Ok(match self.convert(tagged.value)? {
                    Node::Scalar(_, scalar) => Node::Scalar(Some(tag), scalar),
                    Node::Sequence(_, items) => Node::Sequence(Some(tag), items),
                    Node::Mapping(_, map) => Node::Mapping(Some(tag), map),
                })
            }
            Value::Sequence(items) => {
                let items = items
                    .into_iter()
                    .map(|item| self.convert(item))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Node::Sequence(None, items))
            }
            Value::Mapping(entries) => {
                let mut map = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.convert_key(key)?;
                    let value = self.convert(value)?;
                    map.insert(key, value);
                }
                Ok(Node::Mapping(None, map))
            }
            scalar => Ok(Node::Scalar(None, self.convert_scalar(scalar)?)),
        }
    }

    fn convert_key(&mut self, key: Value) -> std::result::Result<Scalar, InternalError> {
        match key {
            Value::Tagged(tagged) => Err(InternalError::InvalidKeyType(format!(
                "tagged key {}",
                tagged.tag
            ))),
            Value::Sequence(_) => Err(InternalError::InvalidKeyType("sequence".to_string())),
            Value::Mapping(_) => Err(InternalError::InvalidKeyType("mapping".to_string())),
            scalar => self.convert_scalar(scalar),
        }
    }

    fn convert_scalar(&mut self, value: Value) -> std::result::Result<Scalar, InternalError> {
        match value {
            Value::Null => Ok(Scalar::Null),
            Value::Bool(b) => Ok(Scalar::Bool(b)),
            Value::Number(n) => Ok(Scalar::Number(n.to_string())),
            Value::String(s) => Ok(Scalar::String(s)),
            other => Err(InternalError::InvalidKeyType(format!("{:?}", other))),
        }
    }
}
