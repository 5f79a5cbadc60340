//! Uniform read-only view of classes, functions, methods, properties and
//! constants, whether they come from analyzed source or the host environment
//! description ([`host`]).
//!
//! Per the design notes, there is no separate reflection class hierarchy for
//! host vs. user-defined symbols: [`ClassInfo`] and [`FunctionSig`] are a
//! single sum type, distinguished by [`ClassSource`], and every cross
//! reference between classes is a [`ClassId`] into [`GlobalRegistry`]'s
//! arena rather than an owned pointer — that is what breaks the
//! class/method/parameter/class reference cycle.

pub mod host;
mod registry;

pub use registry::{ClassId, GlobalConstant, GlobalRegistry};

use crate::ast::{ClassDecl, Expr, Literal, Param, TypeNode};
use crate::name::FoldedName;
use crate::types::Type;
use camino::Utf8PathBuf;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;

pub type Modifiers = crate::ast::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

impl From<crate::ast::ClassKind> for ClassKind {
    fn from(k: crate::ast::ClassKind) -> Self {
        match k {
            crate::ast::ClassKind::Class => ClassKind::Class,
            crate::ast::ClassKind::Interface => ClassKind::Interface,
            crate::ast::ClassKind::Trait => ClassKind::Trait,
            crate::ast::ClassKind::Enum => ClassKind::Enum,
        }
    }
}

/// `{name, type: Option<Type>, by_reference, optional, variadic, has_default,
/// default}`.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: Option<Type>,
    pub by_reference: bool,
    pub optional: bool,
    pub variadic: bool,
    pub has_default: bool,
    pub default: Option<Expr>,
}

/// `{qualified_name, parameters, return_type, is_variadic, is_generator,
/// is_abstract, is_static, declaring_class}`.
#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub qualified_name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<Type>,
    pub is_variadic: bool,
    pub is_generator: bool,
    pub is_abstract: bool,
    pub is_static: bool,
    pub declaring_class: Option<ClassId>,
}

impl FunctionSig {
    /// Non-optional parameters the caller must supply (no default, not
    /// variadic).
    pub fn required_param_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| !p.optional && !p.variadic)
            .count()
    }

    pub fn is_return_required(&self, has_body: bool) -> bool {
        has_body
            && !self.is_abstract
            && !self.is_generator
            && matches!(
                &self.return_type,
                Some(t) if !matches!(t, Type::Named(n) if matches!(n.folded().as_str(), "void" | "never"))
            )
    }
}

#[derive(Debug, Clone)]
pub struct PropInfo {
    pub name: String,
    pub ty: Option<Type>,
    pub default: Option<Expr>,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone)]
pub struct ConstInfo {
    pub name: String,
    pub ty: Option<Type>,
    pub modifiers: Modifiers,
}

/// Where a `ClassInfo` came from: the fixed host environment table, or a
/// parsed class declaration awaiting (or having completed) resolution by
/// `class_resolver`.
#[derive(Debug, Clone)]
pub enum ClassSource {
    Host,
    UserDefined {
        decl: Box<ClassDecl>,
        namespace: String,
        use_aliases: FxHashMap<String, String>,
        file: Utf8PathBuf,
    },
}

/// `{qualified_name, kind, is_abstract, is_final, parent, interfaces, traits,
/// properties, constants, methods, enum_backing, interface_names_closure}`.
///
/// Method names are indexed case-insensitively (already folded as map keys);
/// property and constant names keep their source casing.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub qualified_name: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub is_final: bool,
    pub parent: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub traits: Vec<ClassId>,
    pub properties: IndexMap<String, PropInfo>,
    pub constants: IndexMap<String, ConstInfo>,
    pub methods: IndexMap<String, FunctionSig>,
    pub enum_backing: Option<Type>,
    pub interface_names_closure: IndexSet<String>,
    pub source: ClassSource,
    pub initialized: bool,
    /// Set when the class was a duplicate declaration; skipped by the
    /// resolver and validator.
    pub poisoned: bool,
    /// Re-entrancy guard for `class_resolver::resolve_class` — `extends`
    /// cycles are rejected by the loader's parser contract, but the guard is
    /// kept because a malformed input could still construct one.
    pub resolving: bool,
}

/// Converts a parsed type hint into the lattice representation. Lives here
/// rather than in `types` because it is the one place that bridges the AST
/// and the lattice; `types` itself stays AST-free.
pub fn type_from_node(node: &TypeNode) -> Type {
    match node {
        TypeNode::Named(name, nullable) => Type::named(name.clone(), *nullable),
        TypeNode::Union(members) => Type::union_of(members.iter().map(type_from_node)),
        TypeNode::Intersection(members) => Type::intersection_of(members.iter().filter_map(|m| match m {
            TypeNode::Named(name, _) => Some(crate::types::NamedType::non_nullable(name.clone())),
            _ => None,
        })),
    }
}

/// The primitive type of a literal expression, for default-value and
/// constant-value subtype checks.
pub fn literal_type(expr: &Expr) -> Option<Type> {
    match expr {
        Expr::Literal(Literal::Int(_), _) => Some(Type::simple("int")),
        Expr::Literal(Literal::Float(_), _) => Some(Type::simple("float")),
        Expr::Literal(Literal::Str(_), _) => Some(Type::simple("string")),
        Expr::Literal(Literal::Bool(true), _) => Some(Type::simple("true")),
        Expr::Literal(Literal::Bool(false), _) => Some(Type::simple("false")),
        Expr::Literal(Literal::Null, _) => Some(Type::simple("null")),
        Expr::ArrayLit(..) => Some(Type::simple("array")),
        _ => None,
    }
}

/// Builds parameters from AST param nodes, applying the `4.6` default-null
/// widening quirk: a non-nullable declared type with a literal `null`
/// default is widened to `Union(declared, null)`, surfaced verbatim rather
/// than silently hidden.
pub fn parameters_from_ast(params: &[Param]) -> Vec<Parameter> {
    params
        .iter()
        .map(|p| {
            let mut ty = p.type_hint.as_ref().map(type_from_node);
            let is_null_default = matches!(p.default, Some(Expr::Literal(Literal::Null, _)));
            if is_null_default {
                if let Some(declared) = ty.clone() {
                    let already_nullable = matches!(&declared, Type::Named(n) if n.nullable)
                        || matches!(&declared, Type::Named(n) if n.folded() == "null");
                    if !already_nullable {
                        ty = Some(Type::union_of([declared, Type::simple("null")]));
                    }
                }
            }
            Parameter {
                name: p.name.clone(),
                ty,
                by_reference: p.by_reference,
                variadic: p.variadic,
                has_default: p.default.is_some(),
                optional: p.variadic || p.default.is_some(),
                default: p.default.clone(),
            }
        })
        .collect()
}

/// Builds a [`FunctionSig`] from a function or method declaration, per the
/// `FunctionSig` construction rules. `is_generator` is always `false`: the
/// bundled parser does not recognize `yield`, so generator detection (an
/// ambient pre-scan flag per the component design) has nothing to observe.
pub fn build_function_sig(
    qualified_name: String,
    params: &[Param],
    return_type: &Option<TypeNode>,
    has_body: bool,
    is_abstract: bool,
    is_static: bool,
    declaring_class: Option<ClassId>,
) -> FunctionSig {
    FunctionSig {
        qualified_name,
        parameters: parameters_from_ast(params),
        return_type: return_type.as_ref().map(type_from_node),
        is_variadic: params.last().is_some_and(|p| p.variadic),
        is_generator: false,
        is_abstract: is_abstract || !has_body,
        is_static,
        declaring_class,
    }
}

impl ClassInfo {
    pub fn folded_name(&self) -> String {
        FoldedName::new(&self.qualified_name).folded().to_string()
    }

    pub fn get_method(&self, name: &str) -> Option<&FunctionSig> {
        self.methods.get(&crate::name::fold(name))
    }

    pub fn get_property(&self, name: &str) -> Option<&PropInfo> {
        self.properties.get(name)
    }

    pub fn get_constant(&self, name: &str) -> Option<&ConstInfo> {
        self.constants.get(name)
    }

    pub fn has_magic(&self, name: &str) -> bool {
        self.methods.contains_key(&crate::name::fold(name))
    }
}
