#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use brrtforge::builder::{BuildError, ForgeBuilder};
use brrtforge::definition::HandlerDefinition;
use brrtforge::registry::{
    configure_request_handlers, DynamicDiscovery, RegistryError, StaticDiscovery, TypeDiscovery,
};
use brrtforge::types::{ModuleOrigin, TypeRef};
use http::Method;

use common::{catalog, config, create_user, get_value, ping};

fn discovery() -> DynamicDiscovery<StaticDiscovery> {
    DynamicDiscovery::new(StaticDiscovery::from_catalog(&catalog()))
}

fn endpoint_names(discovery: &dyn TypeDiscovery) -> Vec<String> {
    discovery
        .endpoint_types(&discovery.modules())
        .iter()
        .map(|t| format!("{}::{}", t.module, t.name))
        .collect()
}

#[test]
fn test_host_discovery_alone_never_sees_generated_types() {
    let builder = ForgeBuilder::new(catalog(), config());
    let module = builder.build(&[get_value()]).unwrap();
    let host = StaticDiscovery::from_catalog(&catalog());

    let mut modules = host.modules();
    modules.push(Arc::clone(module.module()));
    let names: Vec<_> = host.endpoint_types(&modules).iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, ["StatusController"]);
}

#[test]
fn test_configure_registers_generated_controller() {
    let discovery = discovery();
    let builder = ForgeBuilder::new(catalog(), config());
    let host_modules = discovery.modules().len();

    let module = configure_request_handlers(&discovery, &builder, &[get_value(), create_user()]).unwrap();

    assert_eq!(module.module().origin, ModuleOrigin::Dynamic);
    assert_eq!(discovery.modules().len(), host_modules + 1);
    assert_eq!(
        endpoint_names(&discovery),
        ["app.ping::StatusController", "forge.generated::GeneratedController"]
    );
}

#[test]
fn test_registration_is_idempotent() {
    let discovery = discovery();
    let module = ForgeBuilder::new(catalog(), config()).build(&[get_value()]).unwrap();

    assert!(discovery.register_compiled(&module).unwrap());
    assert!(!discovery.register_compiled(&module).unwrap());
    assert_eq!(discovery.registered().len(), 1);
    assert_eq!(endpoint_names(&discovery).len(), 2);
}

#[test]
fn test_failed_build_registers_nothing() {
    let discovery = discovery();
    let builder = ForgeBuilder::new(catalog(), config());
    let unresolvable = HandlerDefinition::new(
        TypeRef::named("app.values", "GetValue"),
        TypeRef::named("scratch", "Temp"),
        Method::GET,
        "/temp",
    );

    let err = configure_request_handlers(&discovery, &builder, &[get_value(), unresolvable]).unwrap_err();
    assert!(matches!(err, BuildError::Unresolvable(_)));
    assert!(discovery.registered().is_empty());
    assert_eq!(endpoint_names(&discovery), ["app.ping::StatusController"]);
}

#[test]
fn test_second_build_with_same_identity_conflicts() {
    let discovery = discovery();
    let builder = ForgeBuilder::new(catalog(), config());
    configure_request_handlers(&discovery, &builder, &[get_value()]).unwrap();

    let err = configure_request_handlers(&discovery, &builder, &[ping("app.ping", "/ping")]).unwrap_err();
    match err {
        BuildError::Registry(RegistryError::ModuleIdConflict { id }) => {
            assert_eq!(id.as_str(), "forge.generated");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(discovery.registered().len(), 1);
}

#[test]
fn test_independent_builds_use_distinct_modules() {
    let discovery = discovery();
    let mut second = config();
    second.module_name = "forge.generated.admin".to_string();

    configure_request_handlers(&discovery, &ForgeBuilder::new(catalog(), config()), &[get_value()]).unwrap();
    configure_request_handlers(
        &discovery,
        &ForgeBuilder::new(catalog(), second),
        &[ping("app.ping", "/ping")],
    )
    .unwrap();

    assert_eq!(discovery.registered().len(), 2);
    assert_eq!(endpoint_names(&discovery).len(), 3);
}
