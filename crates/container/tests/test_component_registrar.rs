use std::sync::Arc;

use anyhow::Result;
use binding::{ConfigurationLoader, Value};
use container::{
    ComponentRegistrar, ComponentType, Container, ContainerBuilder, ContainerError, Instance,
    ParameterDescriptor, Service, TypeCatalog,
};
use parking_lot::Mutex;
use rstest::*;

#[derive(Debug, Default)]
struct SimpleComponent {
    input: i32,
    message: Option<String>,
    a_bool: bool,
}

#[derive(Default)]
struct ComponentConsumer {
    component: Option<Instance>,
}

struct Looping;

fn activations() -> &'static Mutex<Vec<String>> {
    static ACTIVATIONS: Mutex<Vec<String>> = Mutex::new(Vec::new());
    &ACTIVATIONS
}

struct Tracked;

fn catalog() -> TypeCatalog {
    TypeCatalog::new()
        .with(
            ComponentType::builder::<SimpleComponent>("SimpleComponent")
                .exposes("ITestComponent")
                .constructor(vec![], |_| Ok(SimpleComponent::default()))
                .constructor(vec![ParameterDescriptor::value::<i32>("input")], |args| {
                    Ok(SimpleComponent {
                        input: args.get("input")?,
                        ..SimpleComponent::default()
                    })
                })
                .property::<bool, _>("ABool", |c, value| c.a_bool = value)
                .property::<i32, _>("Input", |c, value| c.input = value)
                .property::<Option<String>, _>("Message", |c, value| c.message = value)
                .build(),
        )
        .with(
            ComponentType::builder::<ComponentConsumer>("ComponentConsumer")
                .constructor(vec![], |_| Ok(ComponentConsumer::default()))
                .service_property("Component", "ITestComponent", |c, instance| {
                    c.component = Some(instance)
                })
                .build(),
        )
        .with(
            ComponentType::builder::<Tracked>("Tracked")
                .constructor(vec![ParameterDescriptor::value::<String>("tag")], |args| {
                    activations().lock().push(args.get("tag")?);
                    Ok(Tracked)
                })
                .build(),
        )
        .with(
            ComponentType::builder::<Looping>("Looping")
                .constructor(vec![ParameterDescriptor::service("next", "Looping")], |_| Ok(Looping))
                .build(),
        )
}

#[fixture]
fn registrar() -> ComponentRegistrar {
    common::init_test_logging();
    ComponentRegistrar::with_catalog(catalog())
}

fn container_from(registrar: &ComponentRegistrar, json: &str) -> Result<Container> {
    let tree = ConfigurationLoader::new().load_from_json(json)?;
    let mut builder = ContainerBuilder::new();
    registrar.register_components(&tree, &mut builder)?;
    Ok(builder.build()?)
}

fn test_component() -> Service {
    Service::typed("ITestComponent")
}

#[rstest]
fn test_same_type_registered_twice(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [
            { "type": "SimpleComponent", "services": [{ "type": "ITestComponent" }], "parameters": { "input": 5 } },
            { "type": "SimpleComponent", "services": [{ "type": "ITestComponent" }], "parameters": { "input": 10 } }
        ] }"#,
    )?;

    let all = container.resolve_all(&test_component())?;
    let inputs: Vec<i32> = all
        .into_iter()
        .map(|instance| instance.downcast::<SimpleComponent>().map(|c| c.input))
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| anyhow::anyhow!("not a SimpleComponent"))?;
    assert_eq!(inputs, vec![5, 10]);

    let last = container.resolve_as::<SimpleComponent>(&test_component())?;
    assert_eq!(last.input, 10);
    Ok(())
}

#[rstest]
fn test_auto_activation(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [
            { "type": "Tracked", "services": [{ "type": "object", "key": "a" }], "autoActivate": true, "parameters": { "tag": "a" } },
            { "type": "Tracked", "services": [{ "type": "object", "key": "b" }], "autoActivate": false, "parameters": { "tag": "b" } }
        ] }"#,
    )?;

    {
        let seen = activations().lock();
        assert!(seen.iter().any(|tag| tag == "a"));
        assert!(!seen.iter().any(|tag| tag == "b"));
    }

    container.resolve(&Service::keyed("b", "object"))?;
    assert!(activations().lock().iter().any(|tag| tag == "b"));
    Ok(())
}

#[rstest]
fn test_constructor_injection(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [ { "type": "SimpleComponent", "parameters": { "input": 1 } } ] }"#,
    )?;
    let component = container.resolve_as::<SimpleComponent>(&Service::typed("SimpleComponent"))?;
    assert_eq!(component.input, 1);
    Ok(())
}

#[rstest]
fn test_parameters_in_element_format(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [ { "type": "SimpleComponent",
            "parameters": [ { "name": "input", "value": "3" } ] } ] }"#,
    )?;
    let component = container.resolve_as::<SimpleComponent>(&Service::typed("SimpleComponent"))?;
    assert_eq!(component.input, 3);
    Ok(())
}

#[rstest]
fn test_external_ownership(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [
            { "type": "SimpleComponent", "services": [{ "type": "ITestComponent" }], "ownership": "external" },
            { "type": "SimpleComponent" }
        ] }"#,
    )?;

    let scope = container.begin_lifetime_scope("request");
    scope.resolve(&test_component())?;
    assert_eq!(scope.stats().owned_instances, 0);
    scope.resolve(&Service::typed("SimpleComponent"))?;
    assert_eq!(scope.stats().owned_instances, 1);

    // the root never holds per-dependency instances
    container.resolve(&Service::typed("SimpleComponent"))?;
    assert_eq!(container.stats().owned_instances, 0);
    Ok(())
}

#[rstest]
#[case::per_dependency("per-dependency", false)]
#[case::single_instance("single-instance", true)]
fn test_instance_scope(
    registrar: ComponentRegistrar,
    #[case] scope: &str,
    #[case] shared: bool,
) -> Result<()> {
    let json = format!(
        r#"{{ "components": [ {{ "type": "SimpleComponent", "instanceScope": "{scope}" }} ] }}"#
    );
    let container = container_from(&registrar, &json)?;
    let service = Service::typed("SimpleComponent");
    let first = container.resolve(&service)?;
    let second = container.resolve(&service)?;
    assert_eq!(Arc::ptr_eq(&first, &second), shared);
    Ok(())
}

#[rstest]
fn test_property_injection(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [
            { "type": "SimpleComponent", "services": [{ "type": "ITestComponent" }] },
            { "type": "ComponentConsumer", "injectProperties": true }
        ] }"#,
    )?;
    let consumer = container.resolve_as::<ComponentConsumer>(&Service::typed("ComponentConsumer"))?;
    let injected = consumer.component.clone().expect("service property injected");
    assert!(injected.downcast::<SimpleComponent>().is_ok());
    Ok(())
}

#[rstest]
fn test_property_injection_disabled_by_default(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [
            { "type": "SimpleComponent", "services": [{ "type": "ITestComponent" }] },
            { "type": "ComponentConsumer" }
        ] }"#,
    )?;
    let consumer = container.resolve_as::<ComponentConsumer>(&Service::typed("ComponentConsumer"))?;
    assert!(consumer.component.is_none());
    Ok(())
}

#[rstest]
fn test_configured_property_values(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [ { "type": "SimpleComponent",
            "properties": { "Message": "hello", "ABool": "true" } } ] }"#,
    )?;
    let component = container.resolve_as::<SimpleComponent>(&Service::typed("SimpleComponent"))?;
    assert_eq!(component.message.as_deref(), Some("hello"));
    assert!(component.a_bool);
    Ok(())
}

#[rstest]
fn test_metadata(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [ { "type": "SimpleComponent",
            "metadata": [ { "key": "answer", "value": 42, "type": "i32" },
                          { "key": "label", "value": "plain" } ] } ] }"#,
    )?;
    let registration = container
        .registration(&Service::typed("SimpleComponent"))
        .expect("registered");
    assert_eq!(registration.metadata("answer"), Some(&Value::Int(42)));
    assert_eq!(registration.metadata("label"), Some(&Value::Text("plain".into())));
    Ok(())
}

#[rstest]
fn test_two_services_share_a_singleton(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [ { "type": "SimpleComponent", "instanceScope": "single-instance",
            "services": [ { "type": "ITestComponent" }, { "type": "object" } ] } ] }"#,
    )?;
    let as_interface = container.resolve(&test_component())?;
    let as_object = container.resolve(&Service::typed("object"))?;
    assert!(Arc::ptr_eq(&as_interface, &as_object));
    assert!(!container.is_registered(&Service::typed("SimpleComponent")));
    Ok(())
}

#[rstest]
fn test_member_of(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [
            { "type": "SimpleComponent", "services": [{ "type": "ITestComponent" }],
              "memberOf": "named-collection", "parameters": { "input": 1 } },
            { "type": "SimpleComponent", "memberOf": ["named-collection"], "parameters": { "input": 2 } },
            { "type": "SimpleComponent", "parameters": { "input": 3 } }
        ] }"#,
    )?;

    let members = container.resolve_all(&Service::collection("named-collection"))?;
    let inputs: Vec<i32> = members
        .into_iter()
        .map(|instance| instance.downcast::<SimpleComponent>().map(|c| c.input))
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| anyhow::anyhow!("not a SimpleComponent"))?;
    assert_eq!(inputs, vec![1, 2]);

    // membership does not replace the component's own services
    assert_eq!(container.resolve_as::<SimpleComponent>(&test_component())?.input, 1);
    assert_eq!(container.resolve_all(&Service::typed("SimpleComponent"))?.len(), 2);
    Ok(())
}

#[rstest]
fn test_unknown_type(registrar: ComponentRegistrar) {
    let err = container_from(
        &registrar,
        r#"{ "components": [ { "type": "NoSuchComponent" } ] }"#,
    )
    .expect_err("type is not in the catalog");
    assert_eq!(
        err.downcast_ref::<ContainerError>(),
        Some(&ContainerError::UnknownType {
            name: "NoSuchComponent".into(),
            key: "components:0:type".into(),
        })
    );
}

#[rstest]
fn test_bad_instance_scope(registrar: ComponentRegistrar) {
    let err = container_from(
        &registrar,
        r#"{ "components": [ { "type": "SimpleComponent", "instanceScope": "forever" } ] }"#,
    )
    .expect_err("unknown scope");
    assert!(matches!(
        err.downcast_ref::<ContainerError>(),
        Some(ContainerError::Configuration { key, .. }) if key == "components:0:instanceScope"
    ));
}

#[rstest]
fn test_bad_parameter_value_names_its_key(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(
        &registrar,
        r#"{ "components": [ { "type": "SimpleComponent", "parameters": { "input": "abc" } } ] }"#,
    )?;
    let err = container
        .resolve(&Service::typed("SimpleComponent"))
        .expect_err("'abc' is not an i32");
    assert!(matches!(err, ContainerError::Binding(_)));
    assert!(err.to_string().contains("abc"));
    Ok(())
}

#[rstest]
fn test_circular_dependency(registrar: ComponentRegistrar) -> Result<()> {
    let container = container_from(&registrar, r#"{ "components": [ { "type": "Looping" } ] }"#)?;
    let err = container
        .resolve(&Service::typed("Looping"))
        .expect_err("Looping needs itself");
    assert_eq!(
        err,
        ContainerError::CircularDependency {
            chain: vec!["Looping".into(), "Looping".into()]
        }
    );
    Ok(())
}
