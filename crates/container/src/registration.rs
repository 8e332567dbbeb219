//! Registrations: which component provides which services, and how

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use binding::{ParameterCapability, Value};

use crate::component::ComponentType;

/// Key a component is resolved by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Service {
    Typed(String),
    Keyed { key: String, type_name: String },
    /// Named collection a registration joins in addition to its own services
    Collection(String),
}

impl Service {
    pub fn typed(type_name: impl Into<String>) -> Self {
        Self::Typed(type_name.into())
    }

    pub fn keyed(key: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::Keyed {
            key: key.into(),
            type_name: type_name.into(),
        }
    }

    pub fn collection(name: impl Into<String>) -> Self {
        Self::Collection(name.into())
    }

    /// Type name for typed and keyed services, the collection name otherwise
    pub fn type_name(&self) -> &str {
        match self {
            Self::Typed(type_name) | Self::Keyed { type_name, .. } => type_name,
            Self::Collection(name) => name,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed(type_name) => f.write_str(type_name),
            Self::Keyed { key, type_name } => write!(f, "{type_name} (key '{key}')"),
            Self::Collection(name) => write!(f, "collection '{name}'"),
        }
    }
}

/// How many instances a registration produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// A fresh instance per resolution
    #[default]
    PerDependency,
    /// One instance for the whole container
    SingleInstance,
    /// One instance per lifetime scope
    PerLifetimeScope,
}

/// Who releases an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// The scope that created the instance keeps it until the scope ends
    #[default]
    OwnedByLifetimeScope,
    /// The container hands the instance out and forgets it
    ExternallyOwned,
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Lifetime {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match normalize(raw).as_str() {
            "perdependency" | "instanceperdependency" => Ok(Self::PerDependency),
            "singleinstance" | "singleton" => Ok(Self::SingleInstance),
            "perlifetimescope" | "instanceperlifetimescope" => Ok(Self::PerLifetimeScope),
            _ => Err(format!(
                "unknown instance scope '{raw}' (expected single-instance, per-dependency or per-lifetime-scope)"
            )),
        }
    }
}

impl FromStr for Ownership {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match normalize(raw).as_str() {
            "lifetimescope" | "ownedbylifetimescope" => Ok(Self::OwnedByLifetimeScope),
            "external" | "externallyowned" => Ok(Self::ExternallyOwned),
            _ => Err(format!(
                "unknown ownership '{raw}' (expected lifetime-scope or external)"
            )),
        }
    }
}

/// One component registration
#[derive(Clone)]
pub struct Registration {
    component: Arc<ComponentType>,
    services: Vec<Service>,
    lifetime: Lifetime,
    ownership: Ownership,
    metadata: Vec<(String, Value)>,
    auto_activate: bool,
    inject_properties: bool,
    parameters: Vec<Arc<dyn ParameterCapability>>,
    properties: Vec<Arc<dyn ParameterCapability>>,
}

impl Registration {
    pub fn new(component: Arc<ComponentType>) -> Self {
        Self {
            component,
            services: Vec::new(),
            lifetime: Lifetime::default(),
            ownership: Ownership::default(),
            metadata: Vec::new(),
            auto_activate: false,
            inject_properties: false,
            parameters: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn as_service(mut self, service: Service) -> Self {
        if !self.services.contains(&service) {
            self.services.push(service);
        }
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Attach metadata; a repeated key replaces the earlier value
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        match self.metadata.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.metadata.push((key, value)),
        }
        self
    }

    pub fn auto_activate(mut self, enabled: bool) -> Self {
        self.auto_activate = enabled;
        self
    }

    pub fn inject_properties(mut self, enabled: bool) -> Self {
        self.inject_properties = enabled;
        self
    }

    /// Binding offered to constructor parameters
    pub fn with_parameter(mut self, parameter: Arc<dyn ParameterCapability>) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Binding offered to properties after construction
    pub fn with_property(mut self, property: Arc<dyn ParameterCapability>) -> Self {
        self.properties.push(property);
        self
    }

    pub fn component(&self) -> &Arc<ComponentType> {
        &self.component
    }

    /// Services exposed; a registration with no typed or keyed service is
    /// exposed as its own type, collection memberships notwithstanding
    pub fn services(&self) -> Vec<Service> {
        if self.services.iter().all(Service::is_collection) {
            let mut services = vec![Service::typed(self.component.name())];
            services.extend(self.services.iter().cloned());
            services
        } else {
            self.services.clone()
        }
    }

    pub fn lifetime_kind(&self) -> Lifetime {
        self.lifetime
    }

    pub fn ownership_kind(&self) -> Ownership {
        self.ownership
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn metadata_entries(&self) -> &[(String, Value)] {
        &self.metadata
    }

    pub fn is_auto_activated(&self) -> bool {
        self.auto_activate
    }

    pub fn injects_properties(&self) -> bool {
        self.inject_properties
    }

    pub fn parameters(&self) -> &[Arc<dyn ParameterCapability>] {
        &self.parameters
    }

    pub fn properties(&self) -> &[Arc<dyn ParameterCapability>] {
        &self.properties
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("component", &self.component.name())
            .field("services", &self.services())
            .field("lifetime", &self.lifetime)
            .field("ownership", &self.ownership)
            .field("metadata", &self.metadata)
            .field("auto_activate", &self.auto_activate)
            .field("inject_properties", &self.inject_properties)
            .field("parameters", &self.parameters)
            .field("properties", &self.properties)
            .finish()
    }
}
