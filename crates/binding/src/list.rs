//! Sequence materialisation
//!
//! A sequence node lists its entries as ordered children (`0`, `1`, … for
//! arrays loaded from JSON/TOML/YAML). Entries are coerced one by one with the
//! element descriptor into a local buffer that is only handed out once every
//! element has converted; a failing element drops the whole buffer.

use tracing::trace;

use crate::coercion::CoercionEngine;
use crate::errors::{BindingError, BindingResult};
use crate::node::ConfigNode;
use crate::types::{Shape, TypeDescriptor, Value};

/// Where the entries of a sequence live inside its node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLayout {
    /// Child holding the entries (`item` for element-style sources); `None` → the node itself
    pub item_key: Option<String>,
    /// Nested key read when an entry carries no scalar value of its own
    pub value_key: Option<String>,
}

impl Default for ListLayout {
    fn default() -> Self {
        Self {
            item_key: None,
            value_key: Some("value".to_string()),
        }
    }
}

impl ListLayout {
    /// Entries under `item`, each entry's value under `value`
    pub fn nested(item_key: impl Into<String>, value_key: impl Into<String>) -> Self {
        Self {
            item_key: Some(item_key.into()),
            value_key: Some(value_key.into()),
        }
    }

    /// Entries are the direct children and are coerced as they are
    pub fn flat() -> Self {
        Self {
            item_key: None,
            value_key: None,
        }
    }
}

pub struct ListMaterializer<'e> {
    engine: &'e CoercionEngine,
}

impl<'e> ListMaterializer<'e> {
    pub fn new(engine: &'e CoercionEngine) -> Self {
        Self { engine }
    }

    /// Build the sequence described by `destination` from `node`'s children
    pub fn materialize(&self, node: &ConfigNode, destination: &TypeDescriptor) -> BindingResult<Value> {
        let (family, element) = match destination.shape() {
            Shape::Sequence { family, element } => (family, element),
            _ => {
                return Err(BindingError::unsupported_shape(
                    destination.name(),
                    "not a sequence",
                ))
            }
        };
        let strategy = self.engine.shapes().sequence(family, destination.name())?;

        let entries = self.entries(node);
        let mut buffer = Vec::with_capacity(entries.child_count());
        for (name, entry) in entries.children() {
            let item = self
                .engine
                .coerce_node(self.element_node(entry, element), element, None)
                .map_err(|e| e.at_key(name))?;
            buffer.push(item);
        }

        trace!(
            destination = %destination,
            concrete = %strategy.concrete,
            items = buffer.len(),
            "sequence materialized"
        );
        Ok(strategy.finish(buffer))
    }

    fn entries<'n>(&self, node: &'n ConfigNode) -> &'n ConfigNode {
        match &self.engine.layout().item_key {
            Some(item_key) => node.child(item_key).map(|child| &**child).unwrap_or(node),
            None => node,
        }
    }

    /// The entry itself, or its nested value node when the entry only wraps a scalar.
    ///
    /// A structured element keeps the whole entry unless the value key is its
    /// only child, so a map element that happens to contain that key is not lost.
    fn element_node<'n>(&self, entry: &'n ConfigNode, element: &TypeDescriptor) -> &'n ConfigNode {
        if entry.value().is_some() {
            return entry;
        }
        let Some(value_key) = &self.engine.layout().value_key else {
            return entry;
        };
        let Some(nested) = entry.child(value_key) else {
            return entry;
        };
        if is_structured(element) && entry.child_count() > 1 {
            return entry;
        }
        nested
    }
}

fn is_structured(descriptor: &TypeDescriptor) -> bool {
    match descriptor.shape() {
        Shape::Sequence { .. } | Shape::Map { .. } => true,
        Shape::Optional(inner) => is_structured(inner),
        _ => false,
    }
}
