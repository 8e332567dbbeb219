//! Registers components described in configuration
//!
//! ```json
//! { "components": [ {
//!     "type": "SimpleComponent",
//!     "services": [ { "type": "ITestComponent", "key": "a" } ],
//!     "memberOf": "named-collection",
//!     "instanceScope": "single-instance",
//!     "ownership": "external",
//!     "autoActivate": true,
//!     "injectProperties": true,
//!     "parameters": { "input": 1 },
//!     "properties": { "Message": "hello" },
//!     "metadata": [ { "key": "answer", "value": 42, "type": "i32" } ]
//! } ] }
//! ```

use std::str::FromStr;
use std::sync::Arc;

use binding::{
    CoercionRequest, ConfigNode, ConfigStore, ParameterBinder, ParameterCapability,
    TypeDescriptor, Value,
};
use tracing::{debug, info};

use crate::component::TypeCatalog;
use crate::container::ContainerBuilder;
use crate::errors::{ContainerError, ContainerResult};
use crate::registration::{Lifetime, Ownership, Registration, Service};

const COMPONENTS: &str = "components";

/// Turns `components` sections into registrations
#[derive(Debug, Clone)]
pub struct ComponentRegistrar {
    catalog: Arc<TypeCatalog>,
    binder: ParameterBinder,
}

impl ComponentRegistrar {
    pub fn new(catalog: Arc<TypeCatalog>, binder: ParameterBinder) -> Self {
        Self { catalog, binder }
    }

    /// Registrar with the default coercion engine
    pub fn with_catalog(catalog: TypeCatalog) -> Self {
        Self::new(Arc::new(catalog), ParameterBinder::default())
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Register every configured component; returns how many were added
    pub fn register_components(
        &self,
        store: &dyn ConfigStore,
        builder: &mut ContainerBuilder,
    ) -> ContainerResult<usize> {
        let sections = store.children(COMPONENTS);
        for (index, _) in &sections {
            let key = format!("{COMPONENTS}:{index}");
            let registration = self.registration(store, &key)?;
            debug!(
                key = %key,
                component = registration.component().name(),
                services = ?registration.services(),
                lifetime = ?registration.lifetime_kind(),
                "component registered"
            );
            builder.register(registration);
        }
        info!(count = sections.len(), "components registered from configuration");
        Ok(sections.len())
    }

    fn registration(&self, store: &dyn ConfigStore, key: &str) -> ContainerResult<Registration> {
        let type_key = format!("{key}:type");
        let type_name = non_blank(store.get(&type_key))
            .ok_or_else(|| ContainerError::configuration(&type_key, "component type is required"))?;
        let component = self
            .catalog
            .get(&type_name)
            .ok_or_else(|| ContainerError::UnknownType {
                name: type_name.clone(),
                key: type_key.clone(),
            })?;

        let mut registration = Registration::new(Arc::clone(&component));

        for (index, _) in store.children(&format!("{key}:services")) {
            let service_key = format!("{key}:services:{index}");
            let service_type_key = format!("{service_key}:type");
            let service_type = non_blank(store.get(&service_type_key)).ok_or_else(|| {
                ContainerError::configuration(&service_type_key, "service type is required")
            })?;
            if !component.can_expose(&service_type) {
                return Err(ContainerError::configuration(
                    &service_type_key,
                    format!("{} cannot be exposed as {service_type}", component.name()),
                ));
            }
            let service = match non_blank(store.get(&format!("{service_key}:key"))) {
                Some(service_name) => Service::keyed(service_name, service_type),
                None => Service::typed(service_type),
            };
            registration = registration.as_service(service);
        }

        for collection in member_of(store, &format!("{key}:memberOf")) {
            registration = registration.as_service(Service::collection(collection));
        }

        if let Some(lifetime) = parsed::<Lifetime>(store, &format!("{key}:instanceScope"))? {
            registration = registration.lifetime(lifetime);
        }
        if let Some(ownership) = parsed::<Ownership>(store, &format!("{key}:ownership"))? {
            registration = registration.ownership(ownership);
        }
        if let Some(enabled) = self.flag(store, &format!("{key}:autoActivate"))? {
            registration = registration.auto_activate(enabled);
        }
        if let Some(enabled) = self.flag(store, &format!("{key}:injectProperties"))? {
            registration = registration.inject_properties(enabled);
        }

        for parameter in self.binder.parameters(store, &format!("{key}:parameters"))? {
            registration = registration.with_parameter(Arc::new(parameter) as Arc<dyn ParameterCapability>);
        }
        for property in self.binder.properties(store, &format!("{key}:properties"))? {
            registration = registration.with_property(Arc::new(property) as Arc<dyn ParameterCapability>);
        }

        for (index, _) in store.children(&format!("{key}:metadata")) {
            let (name, value) = self.metadata(store, &format!("{key}:metadata:{index}"))?;
            registration = registration.with_metadata(name, value);
        }

        Ok(registration)
    }

    fn flag(&self, store: &dyn ConfigStore, key: &str) -> ContainerResult<Option<bool>> {
        let Some(raw) = non_blank(store.get(key)) else {
            return Ok(None);
        };
        match self.binder.engine().coerce_str(&raw, &TypeDescriptor::boolean()) {
            Ok(Value::Bool(enabled)) => Ok(Some(enabled)),
            Ok(other) => Err(ContainerError::configuration(key, format!("expected a boolean, got {other:?}"))),
            Err(err) => Err(err.at_key(key).into()),
        }
    }

    fn metadata(&self, store: &dyn ConfigStore, key: &str) -> ContainerResult<(String, Value)> {
        let name_key = format!("{key}:key");
        let name = non_blank(store.get(&name_key))
            .ok_or_else(|| ContainerError::configuration(&name_key, "metadata key is required"))?;

        let type_key = format!("{key}:type");
        let descriptor = match non_blank(store.get(&type_key)) {
            Some(type_name) => TypeDescriptor::from_type_name(&type_name).ok_or_else(|| {
                ContainerError::configuration(&type_key, format!("unknown metadata type '{type_name}'"))
            })?,
            None => TypeDescriptor::text(),
        };

        let value_key = format!("{key}:value");
        let node = store
            .section(&value_key)
            .unwrap_or_else(|| Arc::new(ConfigNode::empty()));
        let value = self
            .binder
            .engine()
            .coerce(CoercionRequest::new(&node, &descriptor))
            .map_err(|err| err.at_key(&value_key))?;
        Ok((name, value))
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

/// Collection names from a single string or a list of strings
fn member_of(store: &dyn ConfigStore, key: &str) -> Vec<String> {
    match non_blank(store.get(key)) {
        Some(name) => vec![name],
        None => store
            .children(key)
            .into_iter()
            .filter_map(|(index, _)| non_blank(store.get(&format!("{key}:{index}"))))
            .collect(),
    }
}

fn parsed<T>(store: &dyn ConfigStore, key: &str) -> ContainerResult<Option<T>>
where
    T: FromStr<Err = String>,
{
    non_blank(store.get(key))
        .map(|raw| raw.parse::<T>().map_err(|reason| ContainerError::configuration(key, reason)))
        .transpose()
}
