//! Component types
//!
//! Rust cannot discover constructors or properties at runtime, so each
//! component the container can build is described once in code: its
//! constructors (parameter names, declared types, factory) and its settable
//! properties. The [`TypeCatalog`] maps the type names used in configuration
//! to these descriptions.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use binding::{Bindable, MemberOwner, Shape, TypeDescriptor, TypeKey, Value};

use crate::errors::{ContainerError, ContainerResult};

/// Shared component instance
pub type Instance = Arc<dyn Any + Send + Sync>;

type BoxedInstance = Box<dyn Any + Send + Sync>;
type Factory = dyn Fn(&Arguments) -> ContainerResult<BoxedInstance> + Send + Sync;
type Setter = dyn Fn(&mut (dyn Any + Send + Sync), ArgValue) -> ContainerResult<()> + Send + Sync;

/// Descriptor used for members that receive another component
pub fn service_descriptor(service_type: &str) -> TypeDescriptor {
    TypeDescriptor::new(
        service_type.to_string(),
        Shape::Scalar(TypeKey::of::<Instance>()),
    )
}

/// Value handed to a constructor or setter
#[derive(Clone)]
pub enum ArgValue {
    Value(Value),
    Instance(Instance),
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value:?}"),
            Self::Instance(_) => f.write_str("<instance>"),
        }
    }
}

/// Fully resolved constructor arguments, in parameter order
#[derive(Debug, Default, Clone)]
pub struct Arguments {
    component: String,
    entries: Vec<(String, ArgValue)>,
}

impl Arguments {
    pub(crate) fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: ArgValue) {
        self.entries.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> ContainerResult<&ArgValue> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                ContainerError::activation(&self.component, format!("no argument named '{name}'"))
            })
    }

    /// Typed value argument
    pub fn get<T: Bindable>(&self, name: &str) -> ContainerResult<T> {
        match self.entry(name)? {
            ArgValue::Value(value) => Ok(T::from_value(value.clone())?),
            ArgValue::Instance(_) => Err(ContainerError::activation(
                &self.component,
                format!("argument '{name}' is a service, not a value"),
            )),
        }
    }

    /// Service argument downcast to its concrete type
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        match self.entry(name)? {
            ArgValue::Instance(instance) => downcast_instance(&self.component, Arc::clone(instance)),
            ArgValue::Value(_) => Err(ContainerError::activation(
                &self.component,
                format!("argument '{name}' is a value, not a service"),
            )),
        }
    }

    /// Service argument as the shared, type-erased instance
    pub fn instance(&self, name: &str) -> ContainerResult<Instance> {
        match self.entry(name)? {
            ArgValue::Instance(instance) => Ok(Arc::clone(instance)),
            ArgValue::Value(_) => Err(ContainerError::activation(
                &self.component,
                format!("argument '{name}' is a value, not a service"),
            )),
        }
    }
}

pub(crate) fn downcast_instance<T: Any + Send + Sync>(
    component: &str,
    instance: Instance,
) -> ContainerResult<Arc<T>> {
    instance.downcast::<T>().map_err(|_| {
        ContainerError::activation(
            component,
            format!("instance is not a {}", std::any::type_name::<T>()),
        )
    })
}

/// Constructor parameter
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub descriptor: TypeDescriptor,
    /// Service the container supplies when no binding matches
    pub service: Option<String>,
}

pub struct Constructor {
    parameters: Vec<ParameterDescriptor>,
    factory: Arc<Factory>,
}

impl Constructor {
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub(crate) fn invoke(&self, arguments: &Arguments) -> ContainerResult<BoxedInstance> {
        (self.factory)(arguments)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();
        f.debug_struct("Constructor").field("parameters", &names).finish()
    }
}

pub struct PropertyDescriptor {
    pub name: String,
    pub descriptor: TypeDescriptor,
    /// Service injected when property injection is enabled
    pub service: Option<String>,
    setter: Arc<Setter>,
}

impl PropertyDescriptor {
    pub(crate) fn apply(&self, target: &mut (dyn Any + Send + Sync), value: ArgValue) -> ContainerResult<()> {
        (self.setter)(target, value)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("type", &self.descriptor.name())
            .field("service", &self.service)
            .finish()
    }
}

/// A concrete type the container knows how to build
#[derive(Debug)]
pub struct ComponentType {
    name: String,
    exposes: Vec<String>,
    constructors: Vec<Constructor>,
    properties: Vec<PropertyDescriptor>,
}

impl ComponentType {
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> ComponentTypeBuilder<T> {
        ComponentTypeBuilder {
            component: ComponentType {
                name: name.into(),
                exposes: Vec::new(),
                constructors: Vec::new(),
                properties: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this type may be registered as `service_type`
    pub fn can_expose(&self, service_type: &str) -> bool {
        service_type == self.name
            || service_type == "object"
            || self.exposes.iter().any(|exposed| exposed == service_type)
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }
}

impl MemberOwner for ComponentType {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Typed builder so factories and setters see the concrete `T`
pub struct ComponentTypeBuilder<T> {
    component: ComponentType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ComponentTypeBuilder<T> {
    /// Service type (interface) instances of `T` may be exposed as
    pub fn exposes(mut self, service_type: impl Into<String>) -> Self {
        self.component.exposes.push(service_type.into());
        self
    }

    pub fn constructor<F>(mut self, parameters: Vec<ParameterDescriptor>, factory: F) -> Self
    where
        F: Fn(&Arguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.component.constructors.push(Constructor {
            parameters,
            factory: Arc::new(move |args| factory(args).map(|t| Box::new(t) as BoxedInstance)),
        });
        self
    }

    /// Value property of Rust type `V`
    pub fn property<V, F>(mut self, name: impl Into<String>, set: F) -> Self
    where
        V: Bindable,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let name = name.into();
        let component = self.component.name.clone();
        let property = name.clone();
        let setter = move |target: &mut (dyn Any + Send + Sync), value: ArgValue| {
            let target = downcast_target::<T>(&component, target)?;
            match value {
                ArgValue::Value(value) => {
                    set(target, V::from_value(value)?);
                    Ok(())
                }
                ArgValue::Instance(_) => Err(ContainerError::activation(
                    &component,
                    format!("property '{property}' expects a value"),
                )),
            }
        };
        self.component.properties.push(PropertyDescriptor {
            name,
            descriptor: V::descriptor(),
            service: None,
            setter: Arc::new(setter),
        });
        self
    }

    /// Property receiving another component, injected when enabled on the registration
    pub fn service_property<F>(mut self, name: impl Into<String>, service_type: impl Into<String>, set: F) -> Self
    where
        F: Fn(&mut T, Instance) + Send + Sync + 'static,
    {
        let name = name.into();
        let service_type = service_type.into();
        let component = self.component.name.clone();
        let property = name.clone();
        let setter = move |target: &mut (dyn Any + Send + Sync), value: ArgValue| {
            let target = downcast_target::<T>(&component, target)?;
            match value {
                ArgValue::Instance(instance) => {
                    set(target, instance);
                    Ok(())
                }
                ArgValue::Value(_) => Err(ContainerError::activation(
                    &component,
                    format!("property '{property}' expects a service"),
                )),
            }
        };
        self.component.properties.push(PropertyDescriptor {
            name,
            descriptor: service_descriptor(&service_type),
            service: Some(service_type),
            setter: Arc::new(setter),
        });
        self
    }

    pub fn build(self) -> ComponentType {
        self.component
    }
}

fn downcast_target<'t, T: Any>(
    component: &str,
    target: &'t mut (dyn Any + Send + Sync),
) -> ContainerResult<&'t mut T> {
    target
        .downcast_mut::<T>()
        .ok_or_else(|| ContainerError::activation(component, "factory produced an unexpected type"))
}

impl ParameterDescriptor {
    /// Parameter bound from configuration, typed as `V`
    pub fn value<V: Bindable>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: V::descriptor(),
            service: None,
        }
    }

    /// Parameter with an explicit descriptor
    pub fn described(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            service: None,
        }
    }

    /// Parameter satisfied by another registered component
    pub fn service(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        let service_type = service_type.into();
        Self {
            name: name.into(),
            descriptor: service_descriptor(&service_type),
            service: Some(service_type),
        }
    }
}

/// Type name → component description
#[derive(Debug, Default)]
pub struct TypeCatalog {
    types: HashMap<String, Arc<ComponentType>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, component: ComponentType) -> &mut Self {
        self.types
            .insert(component.name.clone(), Arc::new(component));
        self
    }

    pub fn with(mut self, component: ComponentType) -> Self {
        self.add(component);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<ComponentType>> {
        self.types.get(name.trim()).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
