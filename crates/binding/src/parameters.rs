//! Deferred parameter binding
//!
//! Configuration names the values a component should receive (`count = 5`)
//! long before the container knows which constructor it will call. The
//! [`ParameterBinder`] turns each configured entry into a [`DeferredParameter`]:
//! a capability object that answers "is this member mine?" and, once the host
//! has picked a member, coerces its captured node into the member's declared
//! type.
//!
//! Both halves are pure. A deferred parameter owns an `Arc` of its own raw node
//! and never changes after construction, so the host may query it any number
//! of times, in any order, from any thread.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::coercion::{CoercionEngine, CoercionRequest};
use crate::converters::MemberHint;
use crate::errors::BindingResult;
use crate::node::{require_key, ConfigNode, ConfigStore};
use crate::types::{Bindable, TypeDescriptor, Value};

/// Kind of member a candidate stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    ConstructorParameter,
    Property,
}

/// Type that declares candidate members
pub trait MemberOwner {
    fn type_name(&self) -> &str;

    /// Names of the settable properties, in declaration order
    fn property_names(&self) -> Vec<&str>;
}

/// A member the host is trying to fill
#[derive(Clone, Copy)]
pub struct Candidate<'a> {
    pub name: &'a str,
    pub kind: MemberKind,
    pub declared_type: &'a TypeDescriptor,
    pub declaring: &'a dyn MemberOwner,
}

impl<'a> Candidate<'a> {
    pub fn new(
        name: &'a str,
        kind: MemberKind,
        declared_type: &'a TypeDescriptor,
        declaring: &'a dyn MemberOwner,
    ) -> Self {
        Self {
            name,
            kind,
            declared_type,
            declaring,
        }
    }

    /// Property a constructor parameter initialises: the property named like the
    /// parameter, compared exactly first and then ignoring ASCII case
    pub fn declaring_property(&self) -> Option<&'a str> {
        if self.kind != MemberKind::ConstructorParameter {
            return None;
        }
        let properties = self.declaring.property_names();
        properties
            .iter()
            .copied()
            .find(|property| *property == self.name)
            .or_else(|| {
                properties
                    .iter()
                    .copied()
                    .find(|property| property.eq_ignore_ascii_case(self.name))
            })
    }

    /// Member used to look up per-member converter overrides
    pub fn member_hint(&self) -> MemberHint {
        let member = self.declaring_property().unwrap_or(self.name);
        MemberHint::new(self.declaring.type_name(), member)
    }
}

impl fmt::Debug for Candidate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("declared_type", &self.declared_type.name())
            .field("declaring", &self.declaring.type_name())
            .finish()
    }
}

/// Matching capability handed to the host for member selection
pub trait ParameterCapability: Send + Sync + fmt::Debug {
    /// Name the configuration used for this value
    fn source_name(&self) -> &str;

    fn matches(&self, candidate: &Candidate<'_>) -> bool;

    /// Produce the value for `member`, typed as `destination`
    fn resolve(&self, destination: &TypeDescriptor, member: &Candidate<'_>) -> BindingResult<Value>;
}

/// Which members a binding competes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingScope {
    /// Constructor parameters, by name or by the property they initialise
    Parameters,
    /// Properties, by exact name
    Properties,
}

impl BindingScope {
    fn matches(self, source_name: &str, candidate: &Candidate<'_>) -> bool {
        match (self, candidate.kind) {
            (Self::Parameters, MemberKind::ConstructorParameter) => {
                candidate.name == source_name
                    || candidate.declaring_property() == Some(source_name)
            }
            (Self::Properties, MemberKind::Property) => candidate.name == source_name,
            _ => false,
        }
    }
}

impl fmt::Display for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameters => write!(f, "parameters"),
            Self::Properties => write!(f, "properties"),
        }
    }
}

/// Configured value waiting for the member it will be bound to
#[derive(Clone)]
pub struct DeferredParameter {
    source_name: Arc<str>,
    scope: BindingScope,
    node: Arc<ConfigNode>,
    engine: Arc<CoercionEngine>,
}

impl DeferredParameter {
    pub fn new(
        source_name: impl Into<Arc<str>>,
        scope: BindingScope,
        node: Arc<ConfigNode>,
        engine: Arc<CoercionEngine>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            scope,
            node,
            engine,
        }
    }

    pub fn scope(&self) -> BindingScope {
        self.scope
    }

    /// Captured raw node
    pub fn node(&self) -> &Arc<ConfigNode> {
        &self.node
    }

    /// Typed resolution for callers that know the member's Rust type
    pub fn resolve_as<T: Bindable>(&self, member: &Candidate<'_>) -> BindingResult<T> {
        let value = self.resolve(&T::descriptor(), member)?;
        T::from_value(value)
    }
}

impl ParameterCapability for DeferredParameter {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        self.scope.matches(&self.source_name, candidate)
    }

    fn resolve(&self, destination: &TypeDescriptor, member: &Candidate<'_>) -> BindingResult<Value> {
        let hint = member.member_hint();
        trace!(source = %self.source_name, member = %hint, "resolving deferred parameter");
        self.engine
            .coerce(CoercionRequest::new(&self.node, destination).with_hint(Some(&hint)))
            .map_err(|e| e.at_key(&self.source_name))
    }
}

impl fmt::Debug for DeferredParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredParameter")
            .field("source_name", &self.source_name)
            .field("scope", &self.scope)
            .field("raw", &self.node.value())
            .field("children", &self.node.child_count())
            .finish()
    }
}

/// Already-typed value supplied in code, matched like a configured one
#[derive(Debug, Clone)]
pub struct NamedValue {
    name: Arc<str>,
    scope: BindingScope,
    value: Value,
}

impl NamedValue {
    pub fn parameter<T: Bindable>(name: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            name: name.into(),
            scope: BindingScope::Parameters,
            value: value.into_value(),
        }
    }

    pub fn property<T: Bindable>(name: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            name: name.into(),
            scope: BindingScope::Properties,
            value: value.into_value(),
        }
    }
}

impl ParameterCapability for NamedValue {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        self.scope.matches(&self.name, candidate)
    }

    fn resolve(&self, _destination: &TypeDescriptor, _member: &Candidate<'_>) -> BindingResult<Value> {
        Ok(self.value.clone())
    }
}

/// Builds deferred parameters from configuration sections
#[derive(Debug, Clone, Default)]
pub struct ParameterBinder {
    engine: Arc<CoercionEngine>,
}

impl ParameterBinder {
    pub fn new(engine: Arc<CoercionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<CoercionEngine> {
        &self.engine
    }

    /// Constructor-parameter bindings, one per child of `key`
    pub fn parameters(&self, store: &dyn ConfigStore, key: &str) -> BindingResult<Vec<DeferredParameter>> {
        self.bind(store, key, BindingScope::Parameters)
    }

    /// Property bindings, one per child of `key`
    pub fn properties(&self, store: &dyn ConfigStore, key: &str) -> BindingResult<Vec<DeferredParameter>> {
        self.bind(store, key, BindingScope::Properties)
    }

    /// One binding per child of `key`; a missing section yields none.
    ///
    /// Array entries of the form `{ name, value }` bind `value` under `name`;
    /// any other child binds itself under its own key.
    pub fn bind(
        &self,
        store: &dyn ConfigStore,
        key: &str,
        scope: BindingScope,
    ) -> BindingResult<Vec<DeferredParameter>> {
        require_key(key)?;
        let bindings: Vec<DeferredParameter> = store
            .children(key)
            .into_iter()
            .map(|(child_key, child)| {
                let (name, node) = split_entry(child_key, child);
                DeferredParameter::new(name, scope, node, Arc::clone(&self.engine))
            })
            .collect();
        debug!(key, %scope, count = bindings.len(), "deferred bindings created");
        Ok(bindings)
    }
}

fn split_entry(child_key: String, child: Arc<ConfigNode>) -> (String, Arc<ConfigNode>) {
    if child_key.parse::<usize>().is_ok() {
        if let Some(name) = child.get("name").filter(|name| !name.trim().is_empty()) {
            let value = child
                .child("value")
                .cloned()
                .unwrap_or_else(|| Arc::new(ConfigNode::empty()));
            return (name.to_string(), value);
        }
    }
    (child_key, child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BindingError;
    use crate::node::ConfigTree;

    struct Owner {
        name: &'static str,
        properties: Vec<&'static str>,
    }

    impl MemberOwner for Owner {
        fn type_name(&self) -> &str {
            self.name
        }

        fn property_names(&self) -> Vec<&str> {
            self.properties.clone()
        }
    }

    fn owner() -> Owner {
        Owner {
            name: "SimpleComponent",
            properties: vec!["Count", "Message"],
        }
    }

    fn tree() -> ConfigTree {
        ConfigNode::builder()
            .set("a:parameters:count", "5")
            .set("b:parameters:count", "10")
            .set("c:parameters:0:name", "count")
            .set("c:parameters:0:value", "7")
            .set("c:properties:Message", "hello")
            .build_tree()
    }

    fn binder() -> ParameterBinder {
        ParameterBinder::default()
    }

    #[test]
    fn test_resolves_configured_count() {
        let bindings = binder().parameters(&tree(), "a:parameters").expect("bindings");
        assert_eq!(bindings.len(), 1);

        let owner = owner();
        let int = TypeDescriptor::number(crate::types::NumberKind::I32);
        let candidate = Candidate::new("count", MemberKind::ConstructorParameter, &int, &owner);
        assert!(bindings[0].matches(&candidate));
        assert_eq!(bindings[0].resolve(&int, &candidate), Ok(Value::Int(5)));
        assert_eq!(bindings[0].resolve_as::<i32>(&candidate), Ok(5));
    }

    #[test]
    fn test_independent_sections_do_not_leak() {
        let tree = tree();
        let first = binder().parameters(&tree, "a:parameters").expect("first");
        let second = binder().parameters(&tree, "b:parameters").expect("second");

        let owner = owner();
        let int = TypeDescriptor::number(crate::types::NumberKind::I64);
        let candidate = Candidate::new("count", MemberKind::ConstructorParameter, &int, &owner);
        assert_eq!(second[0].resolve_as::<i64>(&candidate), Ok(10));
        assert_eq!(first[0].resolve_as::<i64>(&candidate), Ok(5));
        assert_eq!(second[0].resolve_as::<i64>(&candidate), Ok(10));
    }

    #[test]
    fn test_matches_is_pure_and_order_independent() {
        let bindings = binder().parameters(&tree(), "a:parameters").expect("bindings");
        let owner = owner();
        let int = TypeDescriptor::number(crate::types::NumberKind::I32);
        let candidates = [
            Candidate::new("other", MemberKind::ConstructorParameter, &int, &owner),
            Candidate::new("count", MemberKind::ConstructorParameter, &int, &owner),
            Candidate::new("count", MemberKind::Property, &int, &owner),
        ];
        let forward: Vec<bool> = candidates.iter().map(|c| bindings[0].matches(c)).collect();
        let backward: Vec<bool> = candidates.iter().rev().map(|c| bindings[0].matches(c)).collect();
        let backward: Vec<bool> = backward.into_iter().rev().collect();
        assert_eq!(forward, vec![false, true, false]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_matches_through_declaring_property() {
        let tree = ConfigNode::builder().set("parameters:Count", "3").build_tree();
        let bindings = binder().parameters(&tree, "parameters").expect("bindings");
        let owner = owner();
        let int = TypeDescriptor::number(crate::types::NumberKind::U8);
        let parameter = Candidate::new("count", MemberKind::ConstructorParameter, &int, &owner);
        assert_eq!(parameter.declaring_property(), Some("Count"));
        assert!(bindings[0].matches(&parameter));
        assert_eq!(bindings[0].resolve(&int, &parameter), Ok(Value::Int(3)));
    }

    #[test]
    fn test_element_format_uses_name_and_value() {
        let bindings = binder().parameters(&tree(), "c:parameters").expect("bindings");
        assert_eq!(bindings[0].source_name(), "count");
        assert_eq!(bindings[0].node().value(), Some("7"));
    }

    #[test]
    fn test_property_bindings_match_properties_only() {
        let bindings = binder().properties(&tree(), "c:properties").expect("bindings");
        let owner = owner();
        let text = TypeDescriptor::text();
        let property = Candidate::new("Message", MemberKind::Property, &text, &owner);
        let parameter = Candidate::new("Message", MemberKind::ConstructorParameter, &text, &owner);
        assert!(bindings[0].matches(&property));
        assert!(!bindings[0].matches(&parameter));
        assert_eq!(
            bindings[0].resolve(&text, &property),
            Ok(Value::Text("hello".into()))
        );
    }

    #[test]
    fn test_blank_key_is_rejected() {
        let err = binder().parameters(&tree(), "  ").expect_err("blank key");
        assert!(matches!(err, BindingError::Argument { .. }));
    }

    #[test]
    fn test_missing_section_yields_nothing() {
        let bindings = binder().parameters(&tree(), "z:parameters").expect("empty");
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_resolve_failure_names_source() {
        let tree = ConfigNode::builder().set("parameters:count", "abc").build_tree();
        let bindings = binder().parameters(&tree, "parameters").expect("bindings");
        let owner = owner();
        let int = TypeDescriptor::number(crate::types::NumberKind::I32);
        let candidate = Candidate::new("count", MemberKind::ConstructorParameter, &int, &owner);
        let err = bindings[0].resolve(&int, &candidate).expect_err("abc");
        assert!(matches!(err, BindingError::Coercion { key: Some(ref key), .. } if key == "count"));
    }

    #[test]
    fn test_named_value_ignores_destination() {
        let value = NamedValue::parameter("count", 12u32);
        let owner = owner();
        let int = TypeDescriptor::number(crate::types::NumberKind::U32);
        let candidate = Candidate::new("count", MemberKind::ConstructorParameter, &int, &owner);
        assert!(value.matches(&candidate));
        assert_eq!(value.resolve(&int, &candidate), Ok(Value::Int(12)));
    }
}
