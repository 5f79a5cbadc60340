//! The host environment description: the fixed table of built-in
//! classes/interfaces and functions the reflection facade can answer queries
//! about without any source having declared them.
//!
//! This is deliberately small — just enough of the standard library surface
//! for the seed scenarios and the magic-method / `Stringable` / `Countable`
//! rules named in the component design to have something concrete to query.

use super::registry::GlobalConstant;
use super::{ClassInfo, ClassKind, ClassSource, FunctionSig, GlobalRegistry, Parameter};
use crate::types::Type;
use indexmap::{IndexMap, IndexSet};

const HOST_INTERFACES: &[&str] = &[
    "Stringable",
    "BackedEnum",
    "Throwable",
    "Countable",
    "ArrayAccess",
    "Iterator",
    "Traversable",
];

pub fn is_host_class(name: &str) -> bool {
    let folded = name.to_ascii_lowercase();
    HOST_INTERFACES.iter().any(|n| n.to_ascii_lowercase() == folded)
}

fn host_interface(name: &str, extends: &[&str]) -> ClassInfo {
    let closure: IndexSet<String> = extends.iter().map(|s| s.to_string()).collect();
    ClassInfo {
        qualified_name: name.to_string(),
        kind: ClassKind::Interface,
        is_abstract: false,
        is_final: false,
        parent: None,
        interfaces: Vec::new(),
        traits: Vec::new(),
        properties: IndexMap::new(),
        constants: IndexMap::new(),
        methods: IndexMap::new(),
        enum_backing: None,
        interface_names_closure: closure,
        source: ClassSource::Host,
        initialized: true,
        poisoned: false,
        resolving: false,
    }
}

fn param(name: &str, ty: Type) -> Parameter {
    Parameter {
        name: name.to_string(),
        ty: Some(ty),
        by_reference: false,
        optional: false,
        variadic: false,
        has_default: false,
        default: None,
    }
}

fn optional_param(name: &str, ty: Type) -> Parameter {
    let mut p = param(name, ty);
    p.optional = true;
    p.has_default = true;
    p
}

fn variadic_param(name: &str, ty: Type) -> Parameter {
    let mut p = param(name, ty);
    p.optional = true;
    p.variadic = true;
    p
}

fn function(name: &str, parameters: Vec<Parameter>, return_type: Type) -> FunctionSig {
    FunctionSig {
        qualified_name: name.to_string(),
        parameters,
        return_type: Some(return_type),
        is_variadic: false,
        is_generator: false,
        is_abstract: false,
        is_static: false,
        declaring_class: None,
    }
}

/// Populates `registry` with the fixed host class/function table. Called
/// once, before any file is loaded.
pub fn install_host_environment(registry: &mut GlobalRegistry) {
    registry.insert_class(host_interface("Traversable", &[]));
    registry.insert_class(host_interface("Stringable", &[]));
    registry.insert_class(host_interface("Countable", &[]));
    registry.insert_class(host_interface("ArrayAccess", &[]));
    registry.insert_class(host_interface("Throwable", &["Stringable"]));
    registry.insert_class(host_interface("Iterator", &["Traversable"]));

    let int = || Type::simple("int");
    let string = || Type::simple("string");
    let bool_ty = || Type::simple("bool");
    let array = || Type::simple("array");
    let mixed = Type::Unknown;

    let mut backed_enum = host_interface("BackedEnum", &[]);
    let scalar = Type::union_of([int(), string()]);
    backed_enum.methods.insert(
        "from".to_string(),
        function("from", vec![param("value", scalar.clone())], mixed.clone()),
    );
    backed_enum.methods.insert(
        "tryfrom".to_string(),
        function("tryFrom", vec![param("value", scalar)], mixed.clone()),
    );
    registry.insert_class(backed_enum);

    registry.insert_function(function("count", vec![param("value", array())], int()));
    registry.insert_function(function("is_array", vec![param("value", mixed.clone())], bool_ty()));
    registry.insert_function(function(
        "array_map",
        vec![param("callback", Type::simple("callable")), variadic_param("arrays", array())],
        array(),
    ));
    registry.insert_function(function("array_keys", vec![param("array", array())], array()));
    registry.insert_function(function(
        "sprintf",
        vec![param("format", string()), variadic_param("values", mixed.clone())],
        string(),
    ));
    registry.insert_function(function("strlen", vec![param("string", string())], int()));
    registry.insert_function(function(
        "in_array",
        vec![
            param("needle", mixed.clone()),
            param("haystack", array()),
            optional_param("strict", bool_ty()),
        ],
        bool_ty(),
    ));
    registry.insert_function(function("is_string", vec![param("value", mixed.clone())], bool_ty()));
    registry.insert_function(function("is_int", vec![param("value", mixed.clone())], bool_ty()));
    registry.insert_function(function(
        "array_merge",
        vec![variadic_param("arrays", array())],
        array(),
    ));

    registry.insert_constant(GlobalConstant {
        qualified_name: "PHP_EOL".to_string(),
        value: None,
        ty: Some(string()),
    });
    registry.insert_constant(GlobalConstant {
        qualified_name: "PHP_VERSION".to_string(),
        value: None,
        ty: Some(string()),
    });
}
