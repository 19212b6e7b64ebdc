use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml_ng::{Mapping, Value};
use std::fmt;

/// Separator between node names in a node path (`PipelinePlugins/{...}`).
pub const NODE_PATH_SEPARATOR: &str = "/";

/// A scalar stored in a configuration layer.
///
/// Booleans are written as `0`/`1` integers; the `Boolean` variant exists so that a
/// hand-edited `true` in a layer file is still understood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl SettingValue {
    pub fn from_bool(value: bool) -> Self {
        SettingValue::Integer(i64::from(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            SettingValue::Integer(n) => Some(*n != 0),
            SettingValue::Text(text) => text.trim().parse::<i64>().ok().map(|n| n != 0),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingValue::Boolean(b) => Some(i64::from(*b)),
            SettingValue::Integer(n) => Some(*n),
            SettingValue::Text(text) => text.trim().parse().ok(),
        }
    }

    /// Stored text only; see [`to_text`](Self::to_text) for fields that hold text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Any scalar as text. A hand-written `Description: 2024` reads as `"2024"`.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Convert one YAML scalar. Numbers that are not integers become text; nulls and
    /// collections have no scalar form.
    pub fn from_yaml(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(SettingValue::Boolean(*b)),
            Value::Number(number) => Some(match number.as_i64() {
                Some(n) => SettingValue::Integer(n),
                None => SettingValue::Text(number.to_string()),
            }),
            Value::String(text) => Some(SettingValue::Text(text.clone())),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for SettingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SettingValue::from_yaml(&value)
            .ok_or_else(|| serde::de::Error::custom("expected a scalar setting value"))
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::from_bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Integer(i64::from(value))
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Boolean(b) => write!(f, "{}", b),
            SettingValue::Integer(n) => write!(f, "{}", n),
            SettingValue::Text(text) => f.write_str(text),
        }
    }
}

/// Tree of named nodes, each holding named values. This is the on-disk shape of a
/// configuration layer.
///
/// Deserialization is lenient: entries that are not scalars, and nodes that are not
/// mappings, are dropped with a warning instead of failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayerNode {
    #[serde(rename = "Values", default, skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, SettingValue>,

    #[serde(rename = "Nodes", default, skip_serializing_if = "IndexMap::is_empty")]
    pub nodes: IndexMap<String, LayerNode>,
}

impl<'de> Deserialize<'de> for LayerNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(LayerNode::from_yaml(&value, ""))
    }
}

impl LayerNode {
    /// Build a node from a parsed YAML document. `path` is only used in log messages.
    pub fn from_yaml(value: &Value, path: &str) -> Self {
        let mut node = LayerNode::default();
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => return node,
            Value::Tagged(tagged) => return Self::from_yaml(&tagged.value, path),
            _ => {
                tracing::warn!("Settings node {:?} is not a mapping, ignoring it", path);
                return node;
            }
        };

        for (key, entry) in mapping {
            match key_name(key).as_deref() {
                Some("Values") => node.values = values_from_yaml(entry, path),
                Some("Nodes") => {
                    let Some(children) = as_mapping(entry, path) else {
                        continue;
                    };
                    for (child_key, child) in children {
                        let Some(name) = key_name(child_key) else {
                            tracing::warn!("Ignoring settings node with key {:?} under {:?}", child_key, path);
                            continue;
                        };
                        let nested = child_path(path, &name);
                        node.nodes.insert(name, LayerNode::from_yaml(child, &nested));
                    }
                }
                _ => tracing::debug!("Ignoring unknown key {:?} in settings node {:?}", key, path),
            }
        }
        node
    }

    /// Node at `path`, or `self` for the empty path.
    pub fn node(&self, path: &str) -> Option<&LayerNode> {
        split_path(path).try_fold(self, |node, name| node.nodes.get(name))
    }

    /// Node at `path`, creating missing nodes on the way.
    pub fn node_mut_or_create(&mut self, path: &str) -> &mut LayerNode {
        split_path(path).fold(self, |node, name| {
            node.nodes.entry(name.to_string()).or_default()
        })
    }

    pub fn node_mut(&mut self, path: &str) -> Option<&mut LayerNode> {
        let mut current = self;
        for name in split_path(path) {
            current = current.nodes.get_mut(name)?;
        }
        Some(current)
    }

    /// Remove the node at `path` and everything below it.
    pub fn remove_node(&mut self, path: &str) -> bool {
        let mut names: Vec<&str> = split_path(path).collect();
        let Some(leaf) = names.pop() else {
            return false;
        };
        let parent_path = names.join(NODE_PATH_SEPARATOR);
        match self.node_mut(&parent_path) {
            Some(parent) => parent.nodes.shift_remove(leaf).is_some(),
            None => false,
        }
    }
}

/// Join a parent node path and a child name.
pub fn child_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}{}{}", parent, NODE_PATH_SEPARATOR, child)
    }
}

fn values_from_yaml(value: &Value, path: &str) -> IndexMap<String, SettingValue> {
    let mut values = IndexMap::new();
    let Some(mapping) = as_mapping(value, path) else {
        return values;
    };

    for (key, entry) in mapping {
        let Some(name) = key_name(key) else {
            tracing::warn!("Ignoring setting with key {:?} under {:?}", key, path);
            continue;
        };
        match SettingValue::from_yaml(entry) {
            Some(setting) => {
                values.insert(name, setting);
            }
            None => tracing::warn!(
                "Ignoring setting {:?} under {:?}: not a scalar ({:?})",
                name,
                path,
                entry
            ),
        }
    }
    values
}

fn as_mapping<'a>(value: &'a Value, path: &str) -> Option<&'a Mapping> {
    match value {
        Value::Mapping(mapping) => Some(mapping),
        Value::Null => None,
        other => {
            tracing::warn!("Expected a mapping under {:?}, found {:?}", path, other);
            None
        }
    }
}

/// Mapping keys are names; a `~` key is the unnamed (default) value.
fn key_name(key: &Value) -> Option<String> {
    match key {
        Value::String(name) => Some(name.clone()),
        Value::Null => Some(String::new()),
        Value::Bool(_) | Value::Number(_) => SettingValue::from_yaml(key).map(|v| v.to_text()),
        _ => None,
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(NODE_PATH_SEPARATOR).filter(|name| !name.is_empty())
}
