//! Configuration tree
//!
//! [`ConfigNode`] is the immutable, addressable unit of configuration: an
//! optional scalar string plus ordered named children. Nodes are shared
//! through `Arc` and never change after they are built, so any number of
//! activation threads can read them without synchronisation.
//!
//! Keys are `:`-separated paths (`components:0:parameters:count`). Lookups
//! ignore ASCII case, declaration order is preserved.

use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::errors::{BindingError, BindingResult};

/// Path separator used by configuration keys
pub const KEY_DELIMITER: char = ':';

/// Immutable configuration node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigNode {
    value: Option<String>,
    children: Vec<(String, Arc<ConfigNode>)>,
}

impl ConfigNode {
    /// Empty node: no value, no children
    pub fn empty() -> Self {
        Self::default()
    }

    /// Node holding only a scalar value
    pub fn leaf(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    pub fn builder() -> ConfigNodeBuilder {
        ConfigNodeBuilder::default()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// True when the node carries neither a value nor children
    pub fn is_absent(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Children in declaration order
    pub fn children(&self) -> impl Iterator<Item = (&str, &Arc<ConfigNode>)> + '_ {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Direct child by name (case-insensitive)
    pub fn child(&self, name: &str) -> Option<&Arc<ConfigNode>> {
        self.children
            .iter()
            .find(|(child, _)| child.eq_ignore_ascii_case(name))
            .map(|(_, node)| node)
    }

    /// Descendant addressed by a `:`-separated path. The empty path is `self`.
    pub fn section(&self, path: &str) -> Option<&ConfigNode> {
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for segment in path.split(KEY_DELIMITER) {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Scalar value of a descendant
    pub fn get(&self, path: &str) -> Option<&str> {
        self.section(path).and_then(ConfigNode::value)
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, name: &str, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match &self.value {
            Some(value) => writeln!(f, "{indent}{name} = {value:?}")?,
            None => writeln!(f, "{indent}{name}")?,
        }
        for (child_name, child) in &self.children {
            child.write_tree(f, child_name, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => writeln!(f, "{value:?}")?,
            None => writeln!(f, "<root>")?,
        }
        for (name, child) in &self.children {
            child.write_tree(f, name, 1)?;
        }
        Ok(())
    }
}

/// Leaves serialize as their value (or `null`), sections as ordered maps.
/// A section that also carries a value keeps it under the empty key.
impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.children.is_empty() {
            return match &self.value {
                Some(value) => serializer.serialize_str(value),
                None => serializer.serialize_none(),
            };
        }
        let extra = usize::from(self.value.is_some());
        let mut map = serializer.serialize_map(Some(self.children.len() + extra))?;
        if let Some(value) = &self.value {
            map.serialize_entry("", value)?;
        }
        for (name, child) in &self.children {
            map.serialize_entry(name, child.as_ref())?;
        }
        map.end()
    }
}

/// Mutable staging area for building a [`ConfigNode`]
///
/// Intermediate nodes are created on demand; setting a key twice keeps the
/// original position of the child and replaces its value.
#[derive(Debug, Clone, Default)]
pub struct ConfigNodeBuilder {
    value: Option<String>,
    children: Vec<(String, ConfigNodeBuilder)>,
}

impl ConfigNodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scalar value at `path`, creating intermediate nodes
    pub fn set(mut self, path: &str, value: impl Into<String>) -> Self {
        self.entry(path).value = Some(value.into());
        self
    }

    /// Create `path` without assigning a value (explicit null/empty section)
    pub fn touch(mut self, path: &str) -> Self {
        self.entry(path);
        self
    }

    /// Set the value of this node itself
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// In-place variant of [`ConfigNodeBuilder::set`] for loaders
    pub fn insert(&mut self, path: &str, value: Option<String>) {
        let entry = self.entry(path);
        if value.is_some() {
            entry.value = value;
        }
    }

    /// Append a sequence of values under `path` as children `0..n`
    pub fn list<I, S>(mut self, path: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let offset = self.entry(path).children.len();
        for (index, item) in items.into_iter().enumerate() {
            self.entry(&join_key(path, &(offset + index).to_string()))
                .value = Some(item.into());
        }
        self
    }

    fn entry(&mut self, path: &str) -> &mut ConfigNodeBuilder {
        if path.is_empty() {
            return self;
        }
        let mut current = self;
        for segment in path.split(KEY_DELIMITER) {
            let position = current
                .children
                .iter()
                .position(|(name, _)| name.eq_ignore_ascii_case(segment));
            let index = match position {
                Some(index) => index,
                None => {
                    current
                        .children
                        .push((segment.to_string(), ConfigNodeBuilder::default()));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index].1;
        }
        current
    }

    pub fn build(self) -> ConfigNode {
        ConfigNode {
            value: self.value,
            children: self
                .children
                .into_iter()
                .map(|(name, child)| (name, Arc::new(child.build())))
                .collect(),
        }
    }

    pub fn build_tree(self) -> ConfigTree {
        ConfigTree::new(self.build())
    }
}

/// Read-only view of a loaded configuration, as consumed by the binder
pub trait ConfigStore: Send + Sync {
    /// Scalar value at `key`
    fn get(&self, key: &str) -> Option<String>;

    /// Direct children of `key`, in declaration order. Missing key → empty.
    fn children(&self, key: &str) -> Vec<(String, Arc<ConfigNode>)>;

    /// Node at `key`
    fn section(&self, key: &str) -> Option<Arc<ConfigNode>>;
}

/// Root of a loaded configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    root: Arc<ConfigNode>,
}

impl ConfigTree {
    pub fn new(root: ConfigNode) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Arc<ConfigNode> {
        &self.root
    }

    fn locate(&self, key: &str) -> Option<Arc<ConfigNode>> {
        if key.is_empty() {
            return Some(Arc::clone(&self.root));
        }
        let mut current = &self.root;
        for segment in key.split(KEY_DELIMITER) {
            current = current.child(segment)?;
        }
        Some(Arc::clone(current))
    }
}

impl ConfigStore for ConfigTree {
    fn get(&self, key: &str) -> Option<String> {
        self.root.get(key).map(str::to_string)
    }

    fn children(&self, key: &str) -> Vec<(String, Arc<ConfigNode>)> {
        self.locate(key)
            .map(|node| {
                node.children()
                    .map(|(name, child)| (name.to_string(), Arc::clone(child)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn section(&self, key: &str) -> Option<Arc<ConfigNode>> {
        self.locate(key)
    }
}

/// Reject empty or whitespace-only configuration keys
pub fn require_key(key: &str) -> BindingResult<()> {
    if key.trim().is_empty() {
        return Err(BindingError::argument(
            "key",
            "configuration key may not be empty",
        ));
    }
    Ok(())
}

/// Join two key segments with the configuration delimiter
pub fn join_key(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}{KEY_DELIMITER}{child}")
    }
}
