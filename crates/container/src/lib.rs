//! Configuration-driven component container
//!
//! Components are described once in a [`TypeCatalog`]; the
//! [`ComponentRegistrar`] reads `components` sections from configuration and
//! turns them into [`Registration`]s whose constructor parameters and
//! properties are filled by deferred bindings at resolution time.

pub mod component;
pub mod container;
pub mod errors;
pub mod registrar;
pub mod registration;

pub use component::{
    service_descriptor, ArgValue, Arguments, ComponentType, ComponentTypeBuilder, Constructor,
    Instance, ParameterDescriptor, PropertyDescriptor, TypeCatalog,
};
pub use container::{Container, ContainerBuilder, ContainerStats, LifetimeScope};
pub use errors::{ContainerError, ContainerResult};
pub use registrar::ComponentRegistrar;
pub use registration::{Lifetime, Ownership, Registration, Service};
