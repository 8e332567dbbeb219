//! Container and lifetime scopes
//!
//! Registrations are frozen at [`ContainerBuilder::build`]. Resolution walks
//! a registration's constructors from most to fewest parameters and picks the
//! first one whose every parameter is either claimed by a binding or can be
//! supplied by another registration. All argument and property values are
//! resolved before the factory runs, so a failing binding never leaves a
//! half-built instance behind.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use binding::{Candidate, MemberKind, ParameterCapability, Shape, Value};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::component::{downcast_instance, ArgValue, Arguments, ComponentType, Constructor, Instance};
use crate::errors::{ContainerError, ContainerResult};
use crate::registration::{Lifetime, Ownership, Registration, Service};

/// Collects registrations before the container is built
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    name: Option<String>,
    registrations: Vec<Registration>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn register(&mut self, registration: Registration) -> &mut Self {
        self.registrations.push(registration);
        self
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Freeze the registrations and activate the auto-activated ones
    pub fn build(self) -> ContainerResult<Container> {
        let mut by_service: HashMap<Service, Vec<usize>> = HashMap::new();
        let registrations: Vec<Arc<Registration>> =
            self.registrations.into_iter().map(Arc::new).collect();
        for (index, registration) in registrations.iter().enumerate() {
            for service in registration.services() {
                by_service.entry(service).or_default().push(index);
            }
        }

        let registry = Arc::new(Registry {
            registrations,
            by_service,
        });
        let root = LifetimeScope {
            name: self.name.unwrap_or_else(|| "root".to_string()),
            registry: Arc::clone(&registry),
            singletons: Arc::new(Mutex::new(HashMap::new())),
            scoped: Arc::new(Mutex::new(HashMap::new())),
            owned: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(Counters::default()),
            is_root: true,
        };

        let auto: Vec<usize> = registry
            .registrations
            .iter()
            .enumerate()
            .filter(|(_, registration)| registration.is_auto_activated())
            .map(|(index, _)| index)
            .collect();
        for index in auto {
            root.activate(index, &mut Vec::new())?;
        }

        debug!(
            scope = %root.name,
            registrations = registry.registrations.len(),
            services = registry.by_service.len(),
            "container built"
        );
        Ok(Container { root })
    }
}

#[derive(Debug)]
struct Registry {
    registrations: Vec<Arc<Registration>>,
    by_service: HashMap<Service, Vec<usize>>,
}

impl Registry {
    fn indices(&self, service: &Service) -> &[usize] {
        self.by_service
            .get(service)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn contains(&self, service: &Service) -> bool {
        !self.indices(service).is_empty()
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_resolutions: AtomicU64,
    failed_resolutions: AtomicU64,
    cache_hits: AtomicU64,
}

/// Container diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStats {
    pub name: String,
    pub registration_count: usize,
    pub service_count: usize,
    pub total_resolutions: u64,
    pub failed_resolutions: u64,
    pub cached_singletons: usize,
    pub cache_hits: u64,
    /// Instances held by this scope until it ends
    pub owned_instances: usize,
}

/// Root scope plus its registry
#[derive(Debug)]
pub struct Container {
    root: LifetimeScope,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn resolve(&self, service: &Service) -> ContainerResult<Instance> {
        self.root.resolve(service)
    }

    pub fn resolve_as<T: Any + Send + Sync>(&self, service: &Service) -> ContainerResult<Arc<T>> {
        self.root.resolve_as(service)
    }

    pub fn resolve_all(&self, service: &Service) -> ContainerResult<Vec<Instance>> {
        self.root.resolve_all(service)
    }

    pub fn is_registered(&self, service: &Service) -> bool {
        self.root.is_registered(service)
    }

    pub fn registration(&self, service: &Service) -> Option<Arc<Registration>> {
        self.root.registration(service)
    }

    pub fn begin_lifetime_scope(&self, name: impl Into<String>) -> LifetimeScope {
        self.root.begin_lifetime_scope(name)
    }

    pub fn root(&self) -> &LifetimeScope {
        &self.root
    }

    pub fn stats(&self) -> ContainerStats {
        self.root.stats()
    }
}

/// Resolution scope: shares singletons with the root, owns its scoped instances
#[derive(Debug)]
pub struct LifetimeScope {
    name: String,
    registry: Arc<Registry>,
    singletons: Arc<Mutex<HashMap<usize, Instance>>>,
    scoped: Arc<Mutex<HashMap<usize, Instance>>>,
    owned: Arc<Mutex<Vec<Instance>>>,
    counters: Arc<Counters>,
    /// The root lives as long as the container and never releases per-dependency instances
    is_root: bool,
}

/// Where an argument comes from, decided before anything is resolved
enum Slot<'r> {
    Binding(&'r Arc<dyn ParameterCapability>),
    Service(Service),
    Absent,
}

impl LifetimeScope {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nested scope; singletons stay shared, per-scope instances do not
    pub fn begin_lifetime_scope(&self, name: impl Into<String>) -> LifetimeScope {
        LifetimeScope {
            name: name.into(),
            registry: Arc::clone(&self.registry),
            singletons: Arc::clone(&self.singletons),
            scoped: Arc::new(Mutex::new(HashMap::new())),
            owned: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::clone(&self.counters),
            is_root: false,
        }
    }

    /// Resolve the last registration for `service`
    pub fn resolve(&self, service: &Service) -> ContainerResult<Instance> {
        let result = self.resolve_service(service, &mut Vec::new());
        self.record(&result);
        result
    }

    pub fn resolve_as<T: Any + Send + Sync>(&self, service: &Service) -> ContainerResult<Arc<T>> {
        let instance = self.resolve(service)?;
        downcast_instance(service.type_name(), instance)
    }

    /// Every registration for `service`, in registration order
    pub fn resolve_all(&self, service: &Service) -> ContainerResult<Vec<Instance>> {
        let result = self
            .registry
            .indices(service)
            .iter()
            .map(|&index| self.activate(index, &mut Vec::new()))
            .collect::<ContainerResult<Vec<_>>>();
        self.record(&result);
        result
    }

    pub fn is_registered(&self, service: &Service) -> bool {
        self.registry.contains(service)
    }

    pub fn registration(&self, service: &Service) -> Option<Arc<Registration>> {
        self.registry
            .indices(service)
            .last()
            .map(|&index| Arc::clone(&self.registry.registrations[index]))
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            name: self.name.clone(),
            registration_count: self.registry.registrations.len(),
            service_count: self.registry.by_service.len(),
            total_resolutions: self.counters.total_resolutions.load(Ordering::Relaxed),
            failed_resolutions: self.counters.failed_resolutions.load(Ordering::Relaxed),
            cached_singletons: self.singletons.lock().len(),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            owned_instances: self.owned.lock().len(),
        }
    }

    fn record<T>(&self, result: &ContainerResult<T>) {
        self.counters.total_resolutions.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.counters.failed_resolutions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn resolve_service(&self, service: &Service, path: &mut Vec<usize>) -> ContainerResult<Instance> {
        let index = self
            .registry
            .indices(service)
            .last()
            .copied()
            .ok_or_else(|| ContainerError::ServiceNotFound {
                service: service.to_string(),
            })?;
        self.activate(index, path)
    }

    fn activate(&self, index: usize, path: &mut Vec<usize>) -> ContainerResult<Instance> {
        let registration = Arc::clone(&self.registry.registrations[index]);
        let cache = match registration.lifetime_kind() {
            Lifetime::PerDependency => None,
            Lifetime::SingleInstance => Some(&self.singletons),
            Lifetime::PerLifetimeScope => Some(&self.scoped),
        };

        if let Some(cache) = cache {
            if let Some(instance) = cache.lock().get(&index) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(instance));
            }
        }

        let instance = self.create(index, &registration, path)?;

        // Another thread may have won the race; keep the first instance stored.
        let (instance, created) = match cache {
            Some(cache) => match cache.lock().entry(index) {
                Entry::Occupied(stored) => (Arc::clone(stored.get()), false),
                Entry::Vacant(slot) => (Arc::clone(slot.insert(instance)), true),
            },
            None => (instance, true),
        };
        if created && self.tracks(&registration) {
            self.owned.lock().push(Arc::clone(&instance));
        }
        Ok(instance)
    }

    /// Whether this scope keeps the instance alive until it ends.
    ///
    /// Per-dependency instances resolved from the root are left to their
    /// callers, otherwise the root would accumulate one per resolution.
    fn tracks(&self, registration: &Registration) -> bool {
        registration.ownership_kind() == Ownership::OwnedByLifetimeScope
            && !(self.is_root && registration.lifetime_kind() == Lifetime::PerDependency)
    }

    fn create(
        &self,
        index: usize,
        registration: &Registration,
        path: &mut Vec<usize>,
    ) -> ContainerResult<Instance> {
        let component = registration.component();
        if path.contains(&index) {
            let mut chain: Vec<String> = path
                .iter()
                .map(|&i| self.registry.registrations[i].component().name().to_string())
                .collect();
            chain.push(component.name().to_string());
            return Err(ContainerError::CircularDependency { chain });
        }

        path.push(index);
        let result = self.construct(registration, path);
        path.pop();
        result
    }

    fn construct(&self, registration: &Registration, path: &mut Vec<usize>) -> ContainerResult<Instance> {
        let component: &ComponentType = registration.component();
        let (constructor, slots) = self.select_constructor(registration)?;

        let mut arguments = Arguments::new(component.name());
        for (parameter, slot) in constructor.parameters().iter().zip(slots) {
            let value = match slot {
                Slot::Binding(capability) => {
                    let candidate = Candidate::new(
                        &parameter.name,
                        MemberKind::ConstructorParameter,
                        &parameter.descriptor,
                        component,
                    );
                    ArgValue::Value(capability.resolve(&parameter.descriptor, &candidate)?)
                }
                Slot::Service(service) => ArgValue::Instance(self.resolve_service(&service, path)?),
                Slot::Absent => ArgValue::Value(Value::None),
            };
            arguments.push(parameter.name.clone(), value);
        }

        let properties = self.property_values(registration, path)?;

        let mut instance = constructor.invoke(&arguments)?;
        for (property, value) in properties {
            component.properties()[property].apply(instance.as_mut(), value)?;
        }

        trace!(component = component.name(), arguments = arguments.len(), "component activated");
        Ok(Arc::from(instance))
    }

    fn select_constructor<'r>(
        &self,
        registration: &'r Registration,
    ) -> ContainerResult<(&'r Constructor, Vec<Slot<'r>>)> {
        let component: &ComponentType = registration.component();
        let mut order: Vec<&Constructor> = component.constructors().iter().collect();
        order.sort_by_key(|constructor| std::cmp::Reverse(constructor.parameters().len()));

        let mut unmatched: Vec<String> = Vec::new();
        for constructor in order {
            let mut slots = Vec::with_capacity(constructor.parameters().len());
            let mut missing = None;
            for parameter in constructor.parameters() {
                let candidate = Candidate::new(
                    &parameter.name,
                    MemberKind::ConstructorParameter,
                    &parameter.descriptor,
                    component,
                );
                let slot = if let Some(capability) =
                    registration.parameters().iter().find(|b| b.matches(&candidate))
                {
                    Slot::Binding(capability)
                } else if let Some(service) = parameter
                    .service
                    .as_ref()
                    .map(|service_type| Service::typed(service_type.as_str()))
                    .filter(|service| self.registry.contains(service))
                {
                    Slot::Service(service)
                } else if matches!(parameter.descriptor.shape(), Shape::Optional(_)) {
                    Slot::Absent
                } else {
                    missing = Some(parameter.name.clone());
                    break;
                };
                slots.push(slot);
            }
            match missing {
                None => return Ok((constructor, slots)),
                Some(name) => {
                    if !unmatched.contains(&name) {
                        unmatched.push(name);
                    }
                }
            }
        }

        Err(ContainerError::NoViableConstructor {
            component: component.name().to_string(),
            unmatched,
        })
    }

    /// Configured property values, then injected services for unset service properties
    fn property_values(
        &self,
        registration: &Registration,
        path: &mut Vec<usize>,
    ) -> ContainerResult<Vec<(usize, ArgValue)>> {
        let component: &ComponentType = registration.component();
        let mut values: Vec<(usize, ArgValue)> = Vec::new();

        for (index, property) in component.properties().iter().enumerate() {
            let candidate = Candidate::new(
                &property.name,
                MemberKind::Property,
                &property.descriptor,
                component,
            );
            if let Some(capability) = registration.properties().iter().find(|b| b.matches(&candidate)) {
                let value = capability.resolve(&property.descriptor, &candidate)?;
                values.push((index, ArgValue::Value(value)));
                continue;
            }
            if !registration.injects_properties() {
                continue;
            }
            if let Some(service) = property.service.as_ref().map(|s| Service::typed(s.as_str())) {
                if self.registry.contains(&service) {
                    let instance = self.resolve_service(&service, path)?;
                    values.push((index, ArgValue::Instance(instance)));
                }
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ParameterDescriptor;
    use binding::NamedValue;

    #[derive(Debug)]
    struct Counter {
        start: i32,
    }

    fn counter_type() -> Arc<ComponentType> {
        Arc::new(
            ComponentType::builder::<Counter>("Counter")
                .constructor(vec![], |_| Ok(Counter { start: 0 }))
                .constructor(vec![ParameterDescriptor::value::<i32>("start")], |args| {
                    Ok(Counter {
                        start: args.get("start")?,
                    })
                })
                .build(),
        )
    }

    #[test]
    fn test_most_parameters_first_when_bound() {
        let mut builder = ContainerBuilder::new();
        builder.register(
            Registration::new(counter_type()).with_parameter(Arc::new(NamedValue::parameter("start", 7i32))),
        );
        let container = builder.build().expect("container");
        let counter = container
            .resolve_as::<Counter>(&Service::typed("Counter"))
            .expect("resolved");
        assert_eq!(counter.start, 7);
    }

    #[test]
    fn test_falls_back_to_fewer_parameters() {
        let mut builder = ContainerBuilder::new();
        builder.register(Registration::new(counter_type()));
        let container = builder.build().expect("container");
        let counter = container
            .resolve_as::<Counter>(&Service::typed("Counter"))
            .expect("resolved");
        assert_eq!(counter.start, 0);
    }

    #[test]
    fn test_cycle_is_reported() {
        struct Node;
        let a = ComponentType::builder::<Node>("A")
            .constructor(vec![ParameterDescriptor::service("b", "B")], |_| Ok(Node))
            .build();
        let b = ComponentType::builder::<Node>("B")
            .constructor(vec![ParameterDescriptor::service("a", "A")], |_| Ok(Node))
            .build();
        let mut builder = ContainerBuilder::new();
        builder
            .register(Registration::new(Arc::new(a)))
            .register(Registration::new(Arc::new(b)));
        let container = builder.build().expect("container");
        let err = container
            .resolve(&Service::typed("A"))
            .expect_err("A needs B needs A");
        assert_eq!(
            err,
            ContainerError::CircularDependency {
                chain: vec!["A".into(), "B".into(), "A".into()]
            }
        );
        assert_eq!(container.stats().failed_resolutions, 1);
    }

    #[test]
    fn test_per_lifetime_scope_instances() {
        let mut builder = ContainerBuilder::new();
        builder.register(Registration::new(counter_type()).lifetime(Lifetime::PerLifetimeScope));
        let container = builder.build().expect("container");
        let service = Service::typed("Counter");

        let scope = container.begin_lifetime_scope("request");
        let first = scope.resolve(&service).expect("first");
        let again = scope.resolve(&service).expect("again");
        let other = container.begin_lifetime_scope("other").resolve(&service).expect("other");
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(scope.stats().owned_instances, 1);
    }

    #[test]
    fn test_root_does_not_hold_per_dependency_instances() {
        let mut builder = ContainerBuilder::new();
        builder.register(Registration::new(counter_type()));
        let container = builder.build().expect("container");
        let service = Service::typed("Counter");

        for _ in 0..3 {
            container.resolve(&service).expect("resolved");
        }
        assert_eq!(container.stats().owned_instances, 0);

        let scope = container.begin_lifetime_scope("request");
        scope.resolve(&service).expect("first");
        scope.resolve(&service).expect("second");
        assert_eq!(scope.stats().owned_instances, 2);
    }

    #[test]
    fn test_unknown_service() {
        let container = ContainerBuilder::new().build().expect("empty container");
        let err = container
            .resolve(&Service::typed("Missing"))
            .expect_err("nothing registered");
        assert!(matches!(err, ContainerError::ServiceNotFound { .. }));
    }
}
