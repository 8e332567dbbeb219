//! Type coercion engine
//!
//! Converts a raw [`ConfigNode`] into a [`Value`] for a destination
//! [`TypeDescriptor`]. Rules are tried in a fixed order:
//!
//! 0. per-member converter override, when the request carries a matching hint
//! 1. identity: string destinations get the raw value back untouched
//! 2. sequence shapes, delegated to the [`ListMaterializer`]
//! 3. map shapes: child names become keys, child nodes become values
//! 4. scalars: `Option` unwrapping, booleans, numbers, chars, enums, then the
//!    converter registry
//!
//! The engine holds no mutable state; coercing the same node to the same
//! destination always yields an equal value.

use tracing::{debug, trace};

use crate::converters::{ConverterRegistry, MemberHint};
use crate::errors::{BindingError, BindingResult};
use crate::list::{ListLayout, ListMaterializer};
use crate::node::ConfigNode;
use crate::shapes::ShapeRegistry;
use crate::types::{Bindable, Shape, TypeDescriptor, Value};

/// Everything a single coercion needs
#[derive(Debug, Clone, Copy)]
pub struct CoercionRequest<'a> {
    pub node: &'a ConfigNode,
    pub destination: &'a TypeDescriptor,
    pub hint: Option<&'a MemberHint>,
}

impl<'a> CoercionRequest<'a> {
    pub fn new(node: &'a ConfigNode, destination: &'a TypeDescriptor) -> Self {
        Self {
            node,
            destination,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<&'a MemberHint>) -> Self {
        self.hint = hint;
        self
    }
}

/// Configuration-to-type coercion
#[derive(Debug, Clone)]
pub struct CoercionEngine {
    shapes: ShapeRegistry,
    converters: ConverterRegistry,
    layout: ListLayout,
}

impl Default for CoercionEngine {
    fn default() -> Self {
        Self::new(ShapeRegistry::with_defaults(), ConverterRegistry::with_defaults())
    }
}

impl CoercionEngine {
    pub fn new(shapes: ShapeRegistry, converters: ConverterRegistry) -> Self {
        Self {
            shapes,
            converters,
            layout: ListLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: ListLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn layout(&self) -> &ListLayout {
        &self.layout
    }

    /// Coerce the request's node into its destination type
    pub fn coerce(&self, request: CoercionRequest<'_>) -> BindingResult<Value> {
        let result = self.coerce_node(request.node, request.destination, request.hint);
        if let Err(err) = &result {
            debug!(
                destination = %request.destination,
                hint = ?request.hint,
                error = %err,
                "coercion failed"
            );
        }
        result
    }

    /// Coerce straight into a Rust type
    pub fn coerce_as<T: Bindable>(
        &self,
        node: &ConfigNode,
        hint: Option<&MemberHint>,
    ) -> BindingResult<T> {
        let destination = T::descriptor();
        let value = self.coerce(CoercionRequest::new(node, &destination).with_hint(hint))?;
        T::from_value(value)
    }

    /// Coerce a bare string, as if it were a leaf node
    pub fn coerce_str(&self, raw: &str, destination: &TypeDescriptor) -> BindingResult<Value> {
        self.coerce_node(&ConfigNode::leaf(raw), destination, None)
    }

    pub(crate) fn coerce_node(
        &self,
        node: &ConfigNode,
        destination: &TypeDescriptor,
        hint: Option<&MemberHint>,
    ) -> BindingResult<Value> {
        trace!(destination = %destination, raw = ?node.value(), "coercing");

        if let Some(hint) = hint {
            if let Some(converter) = self.converters.for_member(hint) {
                if matches!(destination.shape(), Shape::Optional(_)) && is_blank(node) {
                    return Ok(Value::None);
                }
                let raw = required_value(node, destination)?;
                return converter
                    .convert(raw)
                    .map_err(|reason| BindingError::coercion(destination.name(), Some(raw), reason));
            }
        }

        match destination.shape() {
            Shape::Text if node.is_absent() => Ok(Value::Text(String::new())),
            Shape::Text => required_value(node, destination).map(|raw| Value::Text(raw.to_string())),
            Shape::Sequence { .. } => ListMaterializer::new(self).materialize(node, destination),
            Shape::Map { family, key, value } => {
                self.coerce_map(node, destination, family, key, value)
            }
            _ => self.coerce_scalar(node, destination, hint),
        }
    }

    fn coerce_map(
        &self,
        node: &ConfigNode,
        destination: &TypeDescriptor,
        family: &str,
        key: &TypeDescriptor,
        value: &TypeDescriptor,
    ) -> BindingResult<Value> {
        let strategy = self.shapes.map(family, destination.name())?;
        let mut entries: Vec<(Value, Value)> = Vec::with_capacity(node.child_count());
        for (name, child) in node.children() {
            let entry_key = self.coerce_str(name, key).map_err(|e| e.at_key(name))?;
            if entries.iter().any(|(existing, _)| *existing == entry_key) {
                return Err(BindingError::coercion(
                    destination.name(),
                    Some(name),
                    "duplicate key after conversion",
                ));
            }
            let entry_value = self
                .coerce_node(child, value, None)
                .map_err(|e| e.at_key(name))?;
            entries.push((entry_key, entry_value));
        }
        trace!(concrete = %strategy.concrete, entries = entries.len(), "map materialized");
        Ok(Value::Map(entries))
    }

    fn coerce_scalar(
        &self,
        node: &ConfigNode,
        destination: &TypeDescriptor,
        hint: Option<&MemberHint>,
    ) -> BindingResult<Value> {
        match destination.shape() {
            Shape::Optional(inner) => {
                if is_blank(node) {
                    Ok(Value::None)
                } else {
                    self.coerce_node(node, inner, hint)
                }
            }
            Shape::Bool => {
                let raw = required_value(node, destination)?;
                let token = raw.trim();
                if token.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if token.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(BindingError::coercion(
                        destination.name(),
                        Some(raw),
                        "expected 'true' or 'false'",
                    ))
                }
            }
            Shape::Number(kind) => {
                let raw = required_value(node, destination)?;
                kind.parse(raw.trim())
                    .map_err(|reason| BindingError::coercion(destination.name(), Some(raw), reason))
            }
            Shape::Char => {
                let raw = required_value(node, destination)?;
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Value::Char(ch)),
                    _ => Err(BindingError::coercion(
                        destination.name(),
                        Some(raw),
                        "expected exactly one character",
                    )),
                }
            }
            Shape::Enum(variants) => {
                let raw = required_value(node, destination)?;
                let token = raw.trim();
                variants
                    .iter()
                    .copied()
                    .find(|variant| *variant == token)
                    .map(Value::Enum)
                    .ok_or_else(|| {
                        BindingError::coercion(
                            destination.name(),
                            Some(raw),
                            format!("expected one of: {}", variants.join(", ")),
                        )
                    })
            }
            Shape::Scalar(key) => {
                let converter = self
                    .converters
                    .for_type(key)
                    .ok_or_else(|| BindingError::missing_converter(destination.name(), node.value()))?;
                let raw = required_value(node, destination)?;
                converter
                    .convert(raw)
                    .map_err(|reason| BindingError::coercion(destination.name(), Some(raw), reason))
            }
            Shape::Text | Shape::Sequence { .. } | Shape::Map { .. } => {
                self.coerce_node(node, destination, hint)
            }
        }
    }
}

/// Raw scalar of a node whose destination has no empty representation
/// No usable raw value and nothing nested
fn is_blank(node: &ConfigNode) -> bool {
    node.value().map_or(true, |raw| raw.trim().is_empty()) && !node.has_children()
}

fn required_value<'n>(node: &'n ConfigNode, destination: &TypeDescriptor) -> BindingResult<&'n str> {
    match node.value() {
        Some(raw) => Ok(raw),
        None if node.has_children() => Err(BindingError::coercion(
            destination.name(),
            None,
            format!(
                "expected a scalar value, found a section with {} children",
                node.child_count()
            ),
        )),
        None => Err(BindingError::coercion(destination.name(), None, "no value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NumberKind;
    use indexmap::IndexMap;
    use std::collections::HashMap;

    fn engine() -> CoercionEngine {
        CoercionEngine::default()
    }

    #[test]
    fn test_string_identity_keeps_whitespace() {
        let node = ConfigNode::leaf("  padded value ");
        let value: String = engine().coerce_as(&node, None).expect("string coercion");
        assert_eq!(value, "  padded value ");
    }

    #[test]
    fn test_absent_string_is_empty() {
        let value: String = engine().coerce_as(&ConfigNode::empty(), None).expect("empty string");
        assert!(value.is_empty());
    }

    #[test]
    fn test_bool_accepts_only_true_false() {
        let engine = engine();
        assert_eq!(engine.coerce_as::<bool>(&ConfigNode::leaf("TRUE"), None), Ok(true));
        assert_eq!(engine.coerce_as::<bool>(&ConfigNode::leaf(" false "), None), Ok(false));
        for token in ["yes", "1", "", "no"] {
            let err = engine
                .coerce_as::<bool>(&ConfigNode::leaf(token), None)
                .expect_err("only true/false are booleans");
            assert!(matches!(err, BindingError::Coercion { .. }), "{token}: {err:?}");
        }
    }

    #[test]
    fn test_absent_number_fails() {
        let err = engine()
            .coerce_as::<i32>(&ConfigNode::empty(), None)
            .expect_err("no zero default for numbers");
        assert!(matches!(err, BindingError::Coercion { raw: None, .. }));
    }

    #[test]
    fn test_optional_absent_is_none() {
        let engine = engine();
        assert_eq!(engine.coerce_as::<Option<i32>>(&ConfigNode::empty(), None), Ok(None));
        assert_eq!(engine.coerce_as::<Option<i32>>(&ConfigNode::leaf(" "), None), Ok(None));
        assert_eq!(engine.coerce_as::<Option<i32>>(&ConfigNode::leaf("7"), None), Ok(Some(7)));
    }

    #[test]
    fn test_char_requires_single_character() {
        let engine = engine();
        assert_eq!(engine.coerce_as::<char>(&ConfigNode::leaf("x"), None), Ok('x'));
        assert!(engine.coerce_as::<char>(&ConfigNode::leaf("xy"), None).is_err());
    }

    #[test]
    fn test_enum_is_case_sensitive() {
        let desc = TypeDescriptor::enumeration("Level", &["Debug", "Info"]);
        let engine = engine();
        assert_eq!(engine.coerce_str("Info", &desc), Ok(Value::Enum("Info")));
        assert!(engine.coerce_str("info", &desc).is_err());
    }

    #[test]
    fn test_map_uses_child_names_as_keys() {
        let node = ConfigNode::builder()
            .set("b", "2")
            .set("a", "1")
            .build();
        let desc = TypeDescriptor::map(
            "HashMap",
            TypeDescriptor::text(),
            TypeDescriptor::number(NumberKind::U8),
        );
        let value = engine()
            .coerce(CoercionRequest::new(&node, &desc))
            .expect("map coercion");
        assert_eq!(
            value,
            Value::Map(vec![
                (Value::Text("b".into()), Value::Int(2)),
                (Value::Text("a".into()), Value::Int(1)),
            ])
        );
        let typed: HashMap<String, u8> = engine().coerce_as(&node, None).expect("typed map");
        assert_eq!(typed.get("a"), Some(&1));
    }

    #[test]
    fn test_index_map_keeps_declaration_order() {
        let node = ConfigNode::builder()
            .set("z", "3")
            .set("a", "1")
            .set("m", "2")
            .build();
        let typed: IndexMap<String, u8> = engine().coerce_as(&node, None).expect("ordered map");
        let keys: Vec<&str> = typed.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(typed.get("m"), Some(&2));
    }

    #[test]
    fn test_map_rejects_duplicate_converted_keys() {
        let node = ConfigNode::builder().set("1", "a").set("01", "b").build();
        let err = engine()
            .coerce_as::<HashMap<u8, String>>(&node, None)
            .expect_err("1 and 01 collide");
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_map_value_failure_carries_key() {
        let node = ConfigNode::builder().set("ok", "1").set("broken", "x").build();
        let err = engine()
            .coerce_as::<HashMap<String, i32>>(&node, None)
            .expect_err("x is not a number");
        match err {
            BindingError::Coercion { key, raw, .. } => {
                assert_eq!(key.as_deref(), Some("broken"));
                assert_eq!(raw.as_deref(), Some("x"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unregistered_scalar_is_missing_converter() {
        #[derive(Debug, Clone, PartialEq)]
        struct Email(String);
        crate::bindable_scalar!(Email, "Email");

        let err = engine()
            .coerce_as::<Email>(&ConfigNode::leaf("a@b.c"), None)
            .expect_err("no converter for Email");
        assert!(matches!(err, BindingError::MissingConverter { .. }));

        let mut converters = ConverterRegistry::with_defaults();
        converters.register::<Email, _, _>(|raw| {
            if raw.contains('@') {
                Ok(Email(raw.to_string()))
            } else {
                Err("missing @")
            }
        });
        let engine = CoercionEngine::new(ShapeRegistry::with_defaults(), converters);
        assert_eq!(
            engine.coerce_as::<Email>(&ConfigNode::leaf("a@b.c"), None),
            Ok(Email("a@b.c".into()))
        );
        assert!(engine.coerce_as::<Email>(&ConfigNode::leaf("nope"), None).is_err());
    }

    #[test]
    fn test_member_override_takes_precedence() {
        let mut converters = ConverterRegistry::with_defaults();
        converters.register_for_member::<String, _, _>("Greeter", "message", |raw| {
            Ok::<_, String>(raw.to_uppercase())
        });
        let engine = CoercionEngine::new(ShapeRegistry::with_defaults(), converters);
        let hint = MemberHint::new("Greeter", "message");
        let node = ConfigNode::leaf("hello");
        assert_eq!(engine.coerce_as::<String>(&node, Some(&hint)), Ok("HELLO".to_string()));
        assert_eq!(engine.coerce_as::<String>(&node, None), Ok("hello".to_string()));
    }

    #[test]
    fn test_member_override_leaves_absent_optional_empty() {
        let mut converters = ConverterRegistry::with_defaults();
        converters.register_for_member::<String, _, _>("Greeter", "nickname", |raw| {
            Ok::<_, String>(raw.to_uppercase())
        });
        let engine = CoercionEngine::new(ShapeRegistry::with_defaults(), converters);
        let hint = MemberHint::new("Greeter", "nickname");
        assert_eq!(
            engine.coerce_as::<Option<String>>(&ConfigNode::empty(), Some(&hint)),
            Ok(None)
        );
        assert_eq!(
            engine.coerce_as::<Option<String>>(&ConfigNode::leaf("bob"), Some(&hint)),
            Ok(Some("BOB".to_string()))
        );
    }

    #[test]
    fn test_section_is_not_text() {
        let node = ConfigNode::builder().set("a", "1").build();
        let err = engine()
            .coerce_as::<String>(&node, None)
            .expect_err("a section has no text");
        assert!(matches!(err, BindingError::Coercion { .. }));
        assert!(err.to_string().contains("section"));
    }

    #[test]
    fn test_scalar_with_children_reports_section() {
        let node = ConfigNode::builder().set("0", "1").build();
        let err = engine()
            .coerce_as::<i32>(&node, None)
            .expect_err("a section is not a number");
        assert!(err.to_string().contains("section"));
    }
}
