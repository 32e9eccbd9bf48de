use super::types::{Node, Scalar};
use crate::errors::{Error, Result};
use serde_yml::value::{Tag as YamlTag, TaggedValue};
use serde_yml::{Mapping, Value};
use std::path::PathBuf;

/// Converts a node back into a `serde_yml` value. Tags become
/// `Value::Tagged`, which the serializer writes in short `!Name` form.
pub(crate) fn to_value(node: &Node) -> Value {
    let (tag, value) = match node {
        Node::Scalar(tag, scalar) => (tag, scalar_value(scalar)),
        Node::Sequence(tag, items) => (tag, Value::Sequence(items.iter().map(to_value).collect())),
        Node::Mapping(tag, entries) => {
            let mut map = Mapping::new();
            for (key, value) in entries {
                map.insert(scalar_value(key), to_value(value));
            }
            (tag, Value::Mapping(map))
        }
    };
    match tag {
        Some(tag) => Value::Tagged(Box::new(TaggedValue {
            tag: YamlTag::new(tag.name()),
            value,
        })),
        None => value,
    }
}

fn scalar_value(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Number(text) => match serde_yml::from_str::<Value>(text) {
            Ok(number @ Value::Number(_)) => number,
            _ => Value::String(text.clone()),
        },
        Scalar::String(s) => Value::String(s.clone()),
    }
}

/// Serialises a whole document.
pub(crate) fn document(root: &Node) -> Result<String> {
    serialize(&to_value(root))
}

/// Serialises the single mapping entry `key: value`, every line indented by
/// `indent` spaces so it can sit inside a block mapping at that column.
pub(crate) fn entry(key: &str, value: &Node, indent: usize) -> Result<String> {
    let mut map = Mapping::new();
    map.insert(Value::String(key.to_string()), to_value(value));
    let text = serialize(&Value::Mapping(map))?;

    let pad = " ".repeat(indent);
    Ok(text
        .split_inclusive('\n')
        .map(|line| {
            if line.trim_end_matches(['\r', '\n']).is_empty() {
                line.to_string()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect())
}

fn serialize(value: &Value) -> Result<String> {
    let text = serde_yml::to_string(value).map_err(|e| Error::Parse {
        path: PathBuf::new(),
        location: None,
        reason: format!("cannot serialise template: {}", e),
    })?;
    let text = text.strip_prefix("---\n").unwrap_or(&text);
    if text.ends_with('\n') {
        Ok(text.to_string())
    } else {
        Ok(format!("{}\n", text))
    }
}
