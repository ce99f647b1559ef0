//! The JSON-LD-shaped value type shared by the section tree and the
//! flattened document.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Key holding a record's normalized template identity.
pub const TEMPLATE_KEY: &str = "@template";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(String),
    /// Presence-only value, serialized as `true`.
    Flag,
    List(Vec<Node>),
    Object(NodeMap),
}

impl Node {
    pub fn leaf(s: impl Into<String>) -> Self {
        Node::Leaf(s.into())
    }

    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            Node::Leaf(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&NodeMap> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    /// The template identity if this is a template record.
    pub fn template_id(&self) -> Option<&str> {
        self.as_object()?.get(TEMPLATE_KEY)?.as_leaf()
    }
}

/// Insertion-ordered string map. Re-inserting an existing key replaces the
/// value in place, keeping its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMap {
    entries: Vec<(String, Node)>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write `value` at a nested path, creating objects along the way. A
    /// non-object found mid-path is replaced by an object.
    pub fn insert_path<S: AsRef<str>>(&mut self, path: &[S], value: Node) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut map = self;
        for segment in parents {
            let segment = segment.as_ref();
            if !matches!(map.get(segment), Some(Node::Object(_))) {
                map.insert(segment, Node::Object(NodeMap::new()));
            }
            map = match map.get_mut(segment) {
                Some(Node::Object(inner)) => inner,
                _ => return,
            };
        }
        map.insert(last.as_ref(), value);
    }
}

impl FromIterator<(String, Node)> for NodeMap {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut map = NodeMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for NodeMap {
    type Item = (String, Node);
    type IntoIter = std::vec::IntoIter<(String, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for NodeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Leaf(s) => serializer.serialize_str(s),
            Node::Flag => serializer.serialize_bool(true),
            Node::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Object(map) => map.serialize(serializer),
        }
    }
}
