//! Shape registry
//!
//! Maps the family name of a sequence or map descriptor (`Vec`, `HashSet`,
//! `BTreeMap`, `IndexMap`, …) to the strategy used to build it. Abstract contracts such
//! as `Sequence` or `Set` are registered as aliases of a concrete family; a
//! family with no registration cannot be materialised and is reported as an
//! unsupported collection shape.

use std::collections::HashMap;

use crate::errors::{BindingError, BindingResult};
use crate::types::Value;

/// How a sequence family is assembled from coerced elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceStrategy {
    /// Concrete container the family resolves to
    pub concrete: String,
    /// Drop repeated elements, keeping the first occurrence
    pub unique: bool,
}

impl SequenceStrategy {
    pub fn list(concrete: impl Into<String>) -> Self {
        Self {
            concrete: concrete.into(),
            unique: false,
        }
    }

    pub fn set(concrete: impl Into<String>) -> Self {
        Self {
            concrete: concrete.into(),
            unique: true,
        }
    }

    /// Turn the fully built element buffer into the family's value
    pub fn finish(&self, items: Vec<Value>) -> Value {
        if !self.unique {
            return Value::List(items);
        }
        let mut distinct: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !distinct.contains(&item) {
                distinct.push(item);
            }
        }
        Value::List(distinct)
    }
}

/// How a map family is assembled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapStrategy {
    pub concrete: String,
}

impl MapStrategy {
    pub fn new(concrete: impl Into<String>) -> Self {
        Self {
            concrete: concrete.into(),
        }
    }
}

/// Lookup from collection family to construction strategy
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    sequences: HashMap<String, SequenceStrategy>,
    maps: HashMap<String, MapStrategy>,
}

impl ShapeRegistry {
    /// Registry with no families at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Standard library collections plus the `Sequence`/`Set`/`Map` contracts
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_sequence("Vec", SequenceStrategy::list("Vec"));
        registry.register_sequence("VecDeque", SequenceStrategy::list("VecDeque"));
        registry.register_sequence("LinkedList", SequenceStrategy::list("LinkedList"));
        registry.register_sequence("HashSet", SequenceStrategy::set("HashSet"));
        registry.register_sequence("BTreeSet", SequenceStrategy::set("BTreeSet"));
        registry.register_map("HashMap", MapStrategy::new("HashMap"));
        registry.register_map("BTreeMap", MapStrategy::new("BTreeMap"));
        registry.register_map("IndexMap", MapStrategy::new("IndexMap"));

        // abstract contracts
        registry.alias_sequence("Sequence", "Vec");
        registry.alias_sequence("List", "Vec");
        registry.alias_sequence("Slice", "Vec");
        registry.alias_sequence("Set", "HashSet");
        registry.alias_map("Map", "IndexMap");
        registry
    }

    pub fn register_sequence(&mut self, family: impl Into<String>, strategy: SequenceStrategy) {
        self.sequences.insert(family.into(), strategy);
    }

    pub fn register_map(&mut self, family: impl Into<String>, strategy: MapStrategy) {
        self.maps.insert(family.into(), strategy);
    }

    /// Resolve `contract` through an already registered sequence family.
    /// Returns false when `target` is unknown.
    pub fn alias_sequence(&mut self, contract: impl Into<String>, target: &str) -> bool {
        match self.sequences.get(target).cloned() {
            Some(strategy) => {
                self.sequences.insert(contract.into(), strategy);
                true
            }
            None => false,
        }
    }

    pub fn alias_map(&mut self, contract: impl Into<String>, target: &str) -> bool {
        match self.maps.get(target).cloned() {
            Some(strategy) => {
                self.maps.insert(contract.into(), strategy);
                true
            }
            None => false,
        }
    }

    pub fn sequence(&self, family: &str, destination: &str) -> BindingResult<&SequenceStrategy> {
        self.sequences
            .get(family)
            .ok_or_else(|| BindingError::unsupported_shape(destination, family))
    }

    pub fn map(&self, family: &str, destination: &str) -> BindingResult<&MapStrategy> {
        self.maps
            .get(family)
            .ok_or_else(|| BindingError::unsupported_shape(destination, family))
    }

    pub fn is_sequence(&self, family: &str) -> bool {
        self.sequences.contains_key(family)
    }

    pub fn is_map(&self, family: &str) -> bool {
        self.maps.contains_key(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_resolves_to_concrete_family() {
        let registry = ShapeRegistry::with_defaults();
        let strategy = registry
            .sequence("Sequence", "Sequence<i32>")
            .expect("contract should resolve");
        assert_eq!(strategy.concrete, "Vec");
        assert_eq!(
            registry.map("Map", "Map<String, i32>").map(|m| m.concrete.as_str()),
            Ok("IndexMap")
        );
    }

    #[test]
    fn test_unknown_family_is_unsupported() {
        let registry = ShapeRegistry::with_defaults();
        let err = registry
            .sequence("BinaryHeap", "BinaryHeap<i32>")
            .expect_err("BinaryHeap is not registered");
        assert!(matches!(err, BindingError::UnsupportedCollectionShape { .. }));
        assert!(err.to_string().contains("BinaryHeap<i32>"));
    }

    #[test]
    fn test_alias_requires_known_target() {
        let mut registry = ShapeRegistry::empty();
        assert!(!registry.alias_sequence("Sequence", "Vec"));
        registry.register_sequence("Vec", SequenceStrategy::list("Vec"));
        assert!(registry.alias_sequence("Sequence", "Vec"));
        assert!(registry.is_sequence("Sequence"));
        assert!(!registry.is_map("Sequence"));
    }

    #[test]
    fn test_set_strategy_keeps_first_occurrence() {
        let set = SequenceStrategy::set("HashSet");
        let value = set.finish(vec![Value::Int(2), Value::Int(1), Value::Int(2)]);
        assert_eq!(value, Value::List(vec![Value::Int(2), Value::Int(1)]));
    }
}
