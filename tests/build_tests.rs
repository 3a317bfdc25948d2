#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::fs;

use brrtforge::builder::{BuildError, ForgeBuilder};
use brrtforge::compiler::BuildMode;
use brrtforge::definition::{
    expand_request_definitions, BindingKind, DefinitionError, HandlerDefinition, ParameterBinding,
    RequestDefinition, RouteAttribute,
};
use brrtforge::synth::SurrogateMode;
use brrtforge::types::{Module, ModuleOrigin, TypeInfo, TypeRef};
use http::Method;

use common::{catalog, config, create_user, get_value, ping, string};

#[test]
fn test_build_exposes_one_operation_per_definition() {
    let builder = ForgeBuilder::new(catalog(), config());
    let module = builder.build(&[get_value(), create_user()]).unwrap();

    assert_eq!(module.controller().name, "GeneratedController");
    let names: Vec<_> = module.operations().map(|op| op.name().to_string()).collect();
    assert_eq!(names, ["GetValue", "CreateUser"]);

    let get = module.operation("GetValue").unwrap();
    assert_eq!(get.route().method, Method::GET);
    assert_eq!(get.route().template, "/values/{id}");
    assert_eq!(
        get.route().produces,
        Some(TypeRef::named("app.values", "Value"))
    );

    // the carrier shape is exported alongside the controller
    assert!(module.types().iter().any(|t| t.name == "CreateUserBody_0002"));
}

#[test]
fn test_shared_base_name_gets_numeric_suffix() {
    let builder = ForgeBuilder::new(catalog(), config());
    let module = builder
        .build(&[ping("app.ping", "/ping"), ping("app.legacy", "/legacy/ping")])
        .unwrap();

    let first = module.operation("Ping").unwrap();
    let second = module.operation("Ping2").unwrap();
    assert_eq!(first.route().template, "/ping");
    assert_eq!(second.route().template, "/legacy/ping");
}

#[test]
fn test_sequential_synthesis_is_byte_identical() {
    let defs = [get_value(), create_user(), ping("app.ping", "/ping")];
    let first = ForgeBuilder::new(catalog(), config()).synthesize(&defs).unwrap();
    let second = ForgeBuilder::new(catalog(), config()).synthesize(&defs).unwrap();
    assert_eq!(first, second);

    let random = config().with_surrogates(SurrogateMode::Random);
    let a = ForgeBuilder::new(catalog(), random.clone()).synthesize(&defs).unwrap();
    let b = ForgeBuilder::new(catalog(), random).synthesize(&defs).unwrap();
    assert_ne!(a[1].auxiliary_shape_name, b[1].auxiliary_shape_name);
}

#[test]
fn test_compilation_error_carries_every_unit() {
    let mismatched = HandlerDefinition::new(
        TypeRef::named("app.values", "GetValue"),
        TypeRef::named("app.values", "Value"),
        Method::GET,
        "/values/{id}",
    )
    .with_parameter(ParameterBinding::new(
        "Id",
        "id",
        BindingKind::FromQueryOrPath,
        string(),
    ));

    let builder = ForgeBuilder::new(catalog(), config());
    let err = builder
        .build(&[ping("app.ping", "/ping"), mismatched])
        .unwrap_err();
    let BuildError::Compilation(err) = err else {
        panic!("expected a compilation error, got {err}");
    };

    let codes: Vec<_> = err.errors().map(|d| (d.unit.as_str(), d.code)).collect();
    assert_eq!(codes, [("GetValue", "E0304")]);
    assert_eq!(err.units.len(), 2);

    let rendered = err.to_string();
    assert!(rendered.contains("E0304"));
    assert!(rendered.contains(err.unit_text("Ping").unwrap()));
    assert!(rendered.contains(err.unit_text("GetValue").unwrap()));
}

#[test]
fn test_unresolvable_type_fails_before_compiling() {
    let def = HandlerDefinition::new(
        TypeRef::named("app.values", "GetValue"),
        TypeRef::named("scratch", "Temp"),
        Method::GET,
        "/temp",
    );
    let dir = tempfile::tempdir().unwrap();
    let builder = ForgeBuilder::new(
        catalog(),
        config().with_mode(BuildMode::Debug).with_debug_dir(dir.path()),
    );

    let err = builder.build(&[def]).unwrap_err();
    assert!(matches!(err, BuildError::Unresolvable(_)));
    assert!(err.to_string().contains("scratch::Temp"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_debug_build_persists_units_and_locations() {
    let dir = tempfile::tempdir().unwrap();
    let builder = ForgeBuilder::new(
        catalog(),
        config().with_mode(BuildMode::Debug).with_debug_dir(dir.path()),
    );
    let module = builder.build(&[get_value(), create_user()]).unwrap();

    assert_eq!(module.mode(), BuildMode::Debug);
    assert!(module.symbols().is_some());
    for name in ["GetValue", "CreateUserBody_0002", "CreateUser"] {
        assert!(dir.path().join(format!("rc_{name}.fg")).is_file(), "missing {name}");
    }

    let location = module.operation("GetValue").unwrap().source_location().unwrap();
    assert_eq!(location.path.as_deref(), Some(dir.path().join("rc_GetValue.fg").as_path()));
    assert_eq!(location.line, 3);
}

#[test]
fn test_release_build_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let builder = ForgeBuilder::new(catalog(), config().with_debug_dir(dir.path()));
    let module = builder.build(&[get_value()]).unwrap();

    assert_eq!(module.mode(), BuildMode::Release);
    assert!(module.symbols().is_none());
    assert!(module.operation("GetValue").unwrap().source_location().is_none());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_unusable_property_names_fail_as_definition_errors() {
    for field in ["new", "async", "return", "page-size"] {
        let mut catalog = catalog();
        catalog.insert(
            Module::new("app.kw", ModuleOrigin::Static { path: None })
                .with_type(TypeInfo::new("app.kw", "Search").with_field(field, string())),
        );
        let defs = expand_request_definitions(
            &[RequestDefinition {
                request_type: TypeRef::named("app.kw", "Search"),
                response_type: TypeRef::named("app.values", "Value"),
                routes: vec![RouteAttribute::new(Method::GET, "/search")],
            }],
            &catalog,
        )
        .unwrap();

        let err = ForgeBuilder::new(catalog, config()).build(&defs).unwrap_err();
        match err {
            BuildError::Definition(DefinitionError::InvalidPropertyName { property, .. }) => {
                assert_eq!(property, field);
            }
            other => panic!("{field}: unexpected error: {other}"),
        }
    }
}
