//! Initializes every user-defined class: resolves interfaces and parent,
//! merges inherited members, validates property/constant/method groups, and
//! applies the `own > traits > parent > interfaces` precedence cascade.
//!
//! Invoked once per class, guarded by `ClassInfo::initialized` /
//! `ClassInfo::resolving` so the on-demand, interface/parent-first ordering
//! is idempotent and tolerant of being entered more than once.

use crate::ast::{self, ClassMember, Modifiers};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::name::fold;
use crate::reflection::{
    self, ClassId, ClassSource, ConstInfo, FunctionSig, GlobalRegistry, PropInfo,
};
use crate::types::{subtype, type_to_string, Type};
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;

pub fn resolve_all(registry: &mut GlobalRegistry, sink: &RefCell<DiagnosticSink>) {
    let ids: Vec<ClassId> = registry.all_class_ids().collect();
    for id in ids {
        resolve_class(registry, id, sink);
    }
}

pub fn resolve_class(registry: &mut GlobalRegistry, id: ClassId, sink: &RefCell<DiagnosticSink>) {
    {
        let info = registry.class(id);
        if info.initialized || info.poisoned || info.resolving {
            return;
        }
    }
    registry.class_mut(id).resolving = true;

    let (decl, namespace, use_aliases, file) = match registry.class(id).source.clone() {
        ClassSource::Host => {
            registry.class_mut(id).initialized = true;
            registry.class_mut(id).resolving = false;
            return;
        }
        ClassSource::UserDefined { decl, namespace, use_aliases, file } => (decl, namespace, use_aliases, file),
    };

    let resolve_name = |name: &str| -> String {
        if crate::name::is_fully_qualified(name) {
            return crate::name::strip_leading_backslash(name).to_string();
        }
        let (first, rest) = crate::name::split_first_segment(name);
        if let Some(fqn) = use_aliases.get(&fold(first)) {
            return if rest.is_empty() {
                fqn.clone()
            } else {
                crate::name::join_namespace(fqn, rest)
            };
        }
        crate::name::join_namespace(&namespace, name)
    };

    let emit = |sink: &RefCell<DiagnosticSink>, line: u32, msg: String| {
        sink.borrow_mut().push(Diagnostic::error(file.clone(), line, msg));
    };

    let is_interface = decl.kind == ast::ClassKind::Interface;
    let is_enum = decl.kind == ast::ClassKind::Enum;

    // ---- step 1: interfaces ----
    let mut interfaces = Vec::new();
    let mut iface_methods: IndexMap<String, FunctionSig> = IndexMap::new();
    let mut iface_constants: IndexMap<String, ConstInfo> = IndexMap::new();
    let mut interface_closure: IndexSet<String> = IndexSet::new();
    for iface_name in &decl.interfaces {
        let resolved = resolve_name(iface_name);
        match registry.class_id(&resolved) {
            Some(iid) => {
                resolve_class(registry, iid, sink);
                interfaces.push(iid);
                let iface = registry.class(iid);
                interface_closure.insert(iface.qualified_name.clone());
                interface_closure.extend(iface.interface_names_closure.iter().cloned());
                for (k, v) in &iface.methods {
                    iface_methods.entry(k.clone()).or_insert_with(|| v.clone());
                }
                for (k, v) in &iface.constants {
                    iface_constants.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            None => emit(sink, decl.line, format!("Interface `{iface_name}` does not exist")),
        }
    }

    // ---- step 2: parent ----
    let mut parent_id = None;
    let mut parent_methods: IndexMap<String, FunctionSig> = IndexMap::new();
    let mut parent_constants: IndexMap<String, ConstInfo> = IndexMap::new();
    let mut parent_properties: IndexMap<String, PropInfo> = IndexMap::new();
    if let Some(parent_name) = &decl.parent {
        let resolved = resolve_name(parent_name);
        match registry.class_id(&resolved) {
            Some(pid) => {
                resolve_class(registry, pid, sink);
                let parent = registry.class(pid);
                if parent.is_final {
                    emit(
                        sink,
                        decl.line,
                        format!("Class `{}` cannot extend final class `{}`", decl.name, parent.qualified_name),
                    );
                }
                parent_methods = parent.methods.clone();
                parent_constants = parent.constants.clone();
                parent_properties = parent.properties.clone();
                interface_closure.extend(parent.interface_names_closure.iter().cloned());
                parent_id = Some(pid);
            }
            None => emit(sink, decl.line, format!("Class `{parent_name}` does not exist")),
        }
    }

    // ---- step 3: own members ----
    let mut own_properties: IndexMap<String, PropInfo> = IndexMap::new();
    let mut own_constants: IndexMap<String, ConstInfo> = IndexMap::new();
    let mut own_methods: IndexMap<String, FunctionSig> = IndexMap::new();

    for member in &decl.members {
        match member {
            ClassMember::Property(p) => {
                if is_interface {
                    emit(sink, p.line, "Interfaces cannot declare properties".to_string());
                    continue;
                }
                let readonly = p.modifiers.contains(Modifiers::READONLY);
                let ty = p.type_hint.as_ref().map(reflection::type_from_node);
                for (name, default) in &p.items {
                    if own_properties.contains_key(name) {
                        emit(sink, p.line, format!("Property `${name}` is already declared"));
                        continue;
                    }
                    if readonly && ty.is_none() {
                        emit(sink, p.line, format!("Readonly property `${name}` must have a declared type"));
                    }
                    if readonly && default.is_some() {
                        emit(sink, p.line, format!("Readonly property `${name}` cannot have a default value"));
                    }
                    if let (Some(default_expr), Some(t)) = (default, &ty) {
                        if let Some(lt) = reflection::literal_type(default_expr) {
                            if !subtype(&lt, t, registry) {
                                emit(
                                    sink,
                                    p.line,
                                    format!(
                                        "Default value of type `{}` is incompatible with declared type `{}` for property `${name}`",
                                        type_to_string(&lt, false),
                                        type_to_string(t, false)
                                    ),
                                );
                            }
                        }
                    }
                    own_properties.insert(
                        name.clone(),
                        PropInfo { name: name.clone(), ty: ty.clone(), default: default.clone(), modifiers: p.modifiers },
                    );
                }
            }
            ClassMember::Constant(c) => {
                let ty = c.type_hint.as_ref().map(reflection::type_from_node);
                for (name, value) in &c.items {
                    if own_constants.contains_key(name) {
                        emit(sink, c.line, format!("Constant `{name}` is already declared"));
                        continue;
                    }
                    if let (Some(t), Some(lt)) = (&ty, reflection::literal_type(value)) {
                        if !subtype(&lt, t, registry) {
                            emit(
                                sink,
                                c.line,
                                format!(
                                    "Value of type `{}` is incompatible with declared type `{}` for constant `{name}`",
                                    type_to_string(&lt, false),
                                    type_to_string(t, false)
                                ),
                            );
                        }
                    }
                    own_constants.insert(name.clone(), ConstInfo { name: name.clone(), ty: ty.clone(), modifiers: c.modifiers });
                }
            }
            ClassMember::Method(m) => {
                let is_abstract = m.modifiers.contains(Modifiers::ABSTRACT);
                if is_abstract {
                    if m.body.is_some() {
                        emit(sink, m.line, format!("Abstract method `{}` cannot have a body", m.name));
                    }
                    if m.modifiers.contains(Modifiers::PRIVATE) {
                        emit(sink, m.line, format!("Abstract method `{}` cannot be private", m.name));
                    }
                }
                if is_interface {
                    if m.body.is_some() {
                        emit(sink, m.line, format!("Interface method `{}` cannot have a body", m.name));
                    }
                    if m.modifiers.contains(Modifiers::PRIVATE) || m.modifiers.contains(Modifiers::PROTECTED) {
                        emit(sink, m.line, format!("Interface method `{}` must be public", m.name));
                    }
                }
                if parent_methods.contains_key(&fold(&m.name)) {
                    // final-override check needs the parent's own modifiers,
                    // which we don't retain on FunctionSig; approximate via a
                    // name-based lookup against the parent class directly.
                    if let Some(pid) = parent_id {
                        if let ClassSource::UserDefined { decl: pdecl, .. } = &registry.class(pid).source {
                            if let Some(pm) = pdecl.members.iter().find_map(|mem| match mem {
                                ClassMember::Method(pm) if fold(&pm.name) == fold(&m.name) => Some(pm),
                                _ => None,
                            }) {
                                if pm.modifiers.contains(Modifiers::FINAL) {
                                    emit(sink, m.line, format!("Cannot override final method `{}`", m.name));
                                }
                            }
                        }
                    }
                }

                let is_static = m.modifiers.contains(Modifiers::STATIC);
                let sig = reflection::build_function_sig(
                    m.name.clone(),
                    &m.params,
                    &m.return_type,
                    m.body.is_some(),
                    is_abstract,
                    is_static,
                    Some(id),
                );

                if let Some(iface_sig) = iface_methods.get(&fold(&m.name)) {
                    check_interface_conformance(sink, &file, m.line, &m.name, &sig, iface_sig);
                }

                if fold(&m.name) == "__construct" {
                    for param in &m.params {
                        if let Some(vis) = param.visibility {
                            own_properties.insert(
                                param.name.clone(),
                                PropInfo {
                                    name: param.name.clone(),
                                    ty: param.type_hint.as_ref().map(reflection::type_from_node),
                                    default: param.default.clone(),
                                    modifiers: vis,
                                },
                            );
                        }
                    }
                }

                own_methods.insert(fold(&m.name), sig);
            }
            ClassMember::EnumCase(e) => {
                if !is_enum {
                    emit(sink, e.line, format!("Enum case `{}` declared outside an enum", e.name));
                    continue;
                }
                let backing = decl.enum_backing.as_ref().map(reflection::type_from_node);
                match (&backing, &e.value) {
                    (Some(b), Some(v)) => {
                        if let Some(lt) = reflection::literal_type(v) {
                            if !subtype(&lt, b, registry) {
                                emit(
                                    sink,
                                    e.line,
                                    format!(
                                        "Enum case `{}` value type `{}` does not match backing type `{}`",
                                        e.name,
                                        type_to_string(&lt, false),
                                        type_to_string(b, false)
                                    ),
                                );
                            }
                        }
                    }
                    (Some(_), None) => emit(sink, e.line, format!("Backed enum case `{}` must have a value", e.name)),
                    (None, Some(_)) => emit(sink, e.line, format!("Non-backed enum case `{}` cannot have a value", e.name)),
                    (None, None) => {}
                }
                own_constants.insert(
                    e.name.clone(),
                    ConstInfo { name: e.name.clone(), ty: Some(Type::simple(decl.name.clone())), modifiers: Modifiers::PUBLIC | Modifiers::STATIC },
                );
            }
            ClassMember::TraitUse(_) => {}
        }
    }

    // ---- step 4: traits ----
    let mut trait_methods: IndexMap<String, FunctionSig> = IndexMap::new();
    let mut trait_properties: IndexMap<String, PropInfo> = IndexMap::new();
    let mut traits = Vec::new();
    for member in &decl.members {
        let ClassMember::TraitUse(use_decl) = member else { continue };
        let mut skip: IndexSet<(String, String)> = IndexSet::new();
        for adaptation in &use_decl.adaptations {
            for over in &adaptation.insteadof {
                skip.insert((fold(over), fold(&adaptation.method)));
            }
        }
        for trait_name in &use_decl.traits {
            let resolved = resolve_name(trait_name);
            match registry.class_id(&resolved) {
                Some(tid) => {
                    resolve_class(registry, tid, sink);
                    traits.push(tid);
                    let t = registry.class(tid);
                    for (k, v) in &t.methods {
                        if skip.contains(&(fold(trait_name), k.clone())) {
                            continue;
                        }
                        if trait_methods.contains_key(k) && !own_methods.contains_key(k) {
                            emit(
                                sink,
                                use_decl.line,
                                format!("Method `{k}` is defined by multiple traits; add an explicit override or `insteadof` rule"),
                            );
                        }
                        trait_methods.insert(k.clone(), v.clone());
                    }
                    for (k, v) in &t.properties {
                        trait_properties.insert(k.clone(), v.clone());
                    }
                }
                None => emit(sink, use_decl.line, format!("Trait `{trait_name}` does not exist")),
            }
        }
    }

    // ---- step 5: precedence cascade ----
    let mut methods = iface_methods;
    for (k, v) in parent_methods {
        methods.insert(k, v);
    }
    for (k, v) in trait_methods {
        methods.insert(k, v);
    }
    for (k, v) in own_methods {
        methods.insert(k, v);
    }

    let mut constants = iface_constants;
    for (k, v) in parent_constants {
        constants.insert(k, v);
    }
    for (k, v) in own_constants {
        constants.insert(k, v);
    }

    let mut properties = parent_properties;
    for (k, v) in trait_properties {
        properties.insert(k, v);
    }
    for (k, v) in own_properties {
        properties.insert(k, v);
    }

    // ---- step 6: abstract-method obligation ----
    let is_concrete = !is_interface && !is_abstract_class(&decl);
    if is_concrete {
        for (name, sig) in &methods {
            if sig.is_abstract {
                emit(sink, decl.line, format!("Class `{}` must implement abstract method `{}`", decl.name, name));
            }
        }
    }

    // ---- step 7: Stringable auto-marker ----
    if methods.contains_key("__tostring") {
        interface_closure.insert("Stringable".to_string());
    }

    // ---- step 8: backed enums ----
    let mut enum_backing = None;
    if is_enum {
        if let Some(backing_node) = &decl.enum_backing {
            let backing = reflection::type_from_node(backing_node);
            properties.insert(
                "value".to_string(),
                PropInfo { name: "value".to_string(), ty: Some(backing.clone()), default: None, modifiers: Modifiers::PUBLIC | Modifiers::READONLY },
            );
            if let Some(backed_enum) = registry.get_class("BackedEnum") {
                for (k, v) in &backed_enum.methods {
                    methods.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            interface_closure.insert("BackedEnum".to_string());
            enum_backing = Some(backing);
        }
    }

    let info = registry.class_mut(id);
    info.interfaces = interfaces;
    info.traits = traits;
    info.parent = parent_id;
    info.properties = properties;
    info.constants = constants;
    info.methods = methods;
    info.enum_backing = enum_backing;
    info.interface_names_closure = interface_closure;
    info.initialized = true;
    info.resolving = false;
}

fn is_abstract_class(decl: &ast::ClassDecl) -> bool {
    decl.modifiers.contains(Modifiers::ABSTRACT)
}

/// Cross-checks an overriding method's signature against the interface
/// method of the same name: modifiers (XOR, ignoring `abstract`), parameter
/// count/types (strict string-equality after sorted-union pretty-print,
/// variadic absorbs the tail), and return type (strict equality).
fn check_interface_conformance(
    sink: &RefCell<DiagnosticSink>,
    file: &camino::Utf8Path,
    line: u32,
    name: &str,
    own: &FunctionSig,
    iface: &FunctionSig,
) {
    if own.is_static != iface.is_static {
        sink.borrow_mut().push(Diagnostic::error(
            file.to_path_buf(),
            line,
            format!("Method `{name}` must{} be static to match the definition in the interface", if iface.is_static { "" } else { " not" }),
        ));
        return;
    }
    let own_len = own.parameters.len();
    let iface_len = iface.parameters.len();
    let count_mismatches = if own.is_variadic || iface.is_variadic {
        false
    } else {
        own_len != iface_len
    };
    if count_mismatches {
        sink.borrow_mut().push(Diagnostic::error(
            file.to_path_buf(),
            line,
            format!("Method `{name}` has a different number of parameters compared to the definition in the interface"),
        ));
        return;
    }
    for (a, b) in own.parameters.iter().zip(iface.parameters.iter()) {
        let ta = a.ty.as_ref().map(|t| type_to_string(t, true)).unwrap_or_default();
        let tb = b.ty.as_ref().map(|t| type_to_string(t, true)).unwrap_or_default();
        if ta != tb {
            sink.borrow_mut().push(Diagnostic::error(
                file.to_path_buf(),
                line,
                format!("Method `{name}` has different parameter types compared to the definition in the interface"),
            ));
            return;
        }
    }
    let ra = own.return_type.as_ref().map(|t| type_to_string(t, true)).unwrap_or_default();
    let rb = iface.return_type.as_ref().map(|t| type_to_string(t, true)).unwrap_or_default();
    if ra != rb {
        sink.borrow_mut().push(Diagnostic::error(
            file.to_path_buf(),
            line,
            format!("Method `{name}` has a different return type compared to the definition in the interface"),
        ));
    }
}
