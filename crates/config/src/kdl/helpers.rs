//! Shared accessors for KDL nodes.

use kdl::{KdlNode, KdlValue};

use crate::ConfigError;

/// First positional argument of a node
pub fn first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|entry| entry.name().is_none())
        .map(|entry| entry.value())
}

/// First positional argument as a string, e.g. `scanner "local" { ... }`
pub fn get_first_arg_string(node: &KdlNode) -> Option<String> {
    first_arg(node)
        .and_then(|value| value.as_string())
        .map(str::to_string)
}

/// Child node `name` inside a node's block
pub fn get_child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == name)
}

/// String value of child node `name`, e.g. `pattern "/srv/*.csr"`
pub fn get_string_entry(node: &KdlNode, name: &str) -> Option<String> {
    get_child(node, name).and_then(get_first_arg_string)
}

/// Non-negative integer argument of a node
pub fn node_u64(node: &KdlNode) -> Result<u64, ConfigError> {
    let name = node.name().value();
    let value = first_arg(node)
        .and_then(|value| value.as_integer())
        .ok_or_else(|| {
            ConfigError::Invalid(format!("'{name}' requires an integer argument, e.g. {name} 5"))
        })?;
    u64::try_from(value).map_err(|_| {
        ConfigError::Invalid(format!("'{name}' must be a non-negative integer, got {value}"))
    })
}

/// Non-negative integer value of child node `name`, if present
pub fn get_u64_entry(node: &KdlNode, name: &str) -> Result<Option<u64>, ConfigError> {
    get_child(node, name).map(node_u64).transpose()
}

/// Child nodes of a block, empty when the node has no block
pub fn children(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|doc| doc.nodes()).unwrap_or(&[])
}
