//! The expression typer: `possible_types(expr)` computes the set of types an
//! expression might evaluate to, from whatever has already been registered or
//! inferred — it never walks into sub-expressions the validator hasn't
//! already visited, and it never widens the actual runtime semantics of the
//! language; `{Unknown}` is the honest answer whenever the checker cannot
//! know better, not an excuse to guess.

use crate::ast::{BinOp, ClassRef, Expr};
use crate::context::Context;
use crate::reflection::{ClassInfo, FunctionSig};
use crate::types::{PossibleTypes, Type};

/// The set of types `expr` might evaluate to, given everything already known
/// in `ctx` (defined variables, registered classes/functions/constants).
pub fn possible_types(ctx: &mut Context, expr: &Expr) -> PossibleTypes {
    match expr {
        Expr::Literal(..) | Expr::ArrayLit(..) => crate::reflection::literal_type(expr)
            .map(PossibleTypes::single)
            .unwrap_or_else(PossibleTypes::unknown),

        Expr::Variable(name, _) => ctx
            .lookup_variable(name)
            .map(|v| v.possible_types.clone())
            .unwrap_or_else(PossibleTypes::invalid),

        Expr::ConstFetch(name, line) => const_fetch_types(ctx, name, *line),

        Expr::New { class, args, line } => {
            let _ = args;
            match resolve_class_ref(ctx, class, *line) {
                Some(fqcn) => PossibleTypes::single(Type::simple(fqcn)),
                None => PossibleTypes::invalid(),
            }
        }

        Expr::Call { callee, args, .. } => {
            let _ = args;
            match callee.as_ref() {
                Expr::ConstFetch(name, line) => call_fetch_types(ctx, name, *line),
                other => {
                    possible_types(ctx, other);
                    PossibleTypes::unknown()
                }
            }
        }

        Expr::MethodCall { object, method, .. } => {
            let object_types = possible_types(ctx, object);
            method_call_types(ctx, &object_types, method)
        }

        Expr::StaticCall { class, method, line, .. } => match resolve_class_ref(ctx, class, *line) {
            Some(fqcn) => class_method_return_types(ctx, &fqcn, method),
            None => PossibleTypes::invalid(),
        },

        Expr::PropertyFetch { object, property, .. } => {
            let object_types = possible_types(ctx, object);
            property_fetch_types(ctx, &object_types, property)
        }

        Expr::StaticPropertyFetch { class, property, line } => {
            match resolve_class_ref(ctx, class, *line) {
                Some(fqcn) => static_property_types(ctx, &fqcn, property, *line),
                None => PossibleTypes::invalid(),
            }
        }

        Expr::ClassConstFetch { class, constant, line } => {
            if constant.eq_ignore_ascii_case("class") {
                return PossibleTypes::single(Type::simple("string"));
            }
            match resolve_class_ref(ctx, class, *line) {
                Some(fqcn) => class_const_types(ctx, &fqcn, constant),
                None => PossibleTypes::invalid(),
            }
        }

        Expr::Index { base, index, .. } => {
            possible_types(ctx, base);
            if let Some(idx) = index {
                possible_types(ctx, idx);
            }
            PossibleTypes::unknown()
        }

        Expr::Assign { value, .. } => possible_types(ctx, value),

        Expr::Binary { op, left, right, .. } => {
            possible_types(ctx, left);
            possible_types(ctx, right);
            match op {
                BinOp::Identical | BinOp::NotIdentical => PossibleTypes::single(Type::simple("bool")),
                BinOp::Other => PossibleTypes::unknown(),
            }
        }

        Expr::InstanceOf { expr, .. } => {
            possible_types(ctx, expr);
            PossibleTypes::single(Type::simple("bool"))
        }

        Expr::Closure { .. } | Expr::ArrowFunction { .. } => PossibleTypes::single(Type::simple("Closure")),

        Expr::Spread(inner, _) => possible_types(ctx, inner),
    }
}

pub(crate) fn const_fetch_types(ctx: &mut Context, name: &str, line: u32) -> PossibleTypes {
    if matches!(name.to_ascii_lowercase().as_str(), "true" | "false") {
        return PossibleTypes::single(Type::simple("bool"));
    }
    let registry = ctx.registry;
    let qualified = ctx.resolve_value_name(name, |n| registry.constant_exists(n));
    match registry.get_constant(&qualified) {
        Some(c) => c
            .ty
            .clone()
            .map(PossibleTypes::single)
            .unwrap_or_else(PossibleTypes::unknown),
        None => {
            ctx.error(line, format!("Undefined constant `{name}`"));
            PossibleTypes::invalid()
        }
    }
}

pub(crate) fn call_fetch_types(ctx: &mut Context, name: &str, line: u32) -> PossibleTypes {
    let registry = ctx.registry;
    let qualified = ctx.resolve_value_name(name, |n| registry.function_exists(n));
    match registry.get_function(&qualified) {
        Some(sig) => sig
            .return_type
            .clone()
            .map(PossibleTypes::single)
            .unwrap_or_else(PossibleTypes::unknown),
        None => {
            ctx.error(line, format!("Call to undefined function `{name}`()"));
            PossibleTypes::invalid()
        }
    }
}

/// Resolves a `ClassRef` to a fully qualified name, handling `self` /
/// `parent` / `static` and ordinary names through [`Context::fq_class_name`].
/// A dynamic class reference (`$var::`, `(expr)::`) cannot be resolved
/// statically and yields `None` without reporting an error.
pub(crate) fn resolve_class_ref(ctx: &mut Context, class: &ClassRef, line: u32) -> Option<String> {
    match class {
        ClassRef::Name(name, _) => ctx.fq_class_name(name, line, true),
        ClassRef::Dynamic(expr) => {
            possible_types(ctx, expr);
            None
        }
    }
}

pub(crate) fn named_classes_in(types: &PossibleTypes) -> Vec<String> {
    types
        .types()
        .iter()
        .filter_map(|t| match t {
            Type::Named(n) if n.is_class_like() => Some(n.name.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn method_call_types(ctx: &Context, object_types: &PossibleTypes, method: &str) -> PossibleTypes {
    if object_types.is_unknown() || object_types.is_invalid() {
        return PossibleTypes::unknown();
    }
    let names = named_classes_in(object_types);
    if names.is_empty() {
        // mixed/object/primitive receiver: nothing more to say.
        return PossibleTypes::unknown();
    }
    let mut out = PossibleTypes::invalid();
    for name in names {
        out.merge(&class_method_return_types(ctx, &name, method));
    }
    out
}

pub(crate) fn class_method_return_types(ctx: &Context, class_name: &str, method: &str) -> PossibleTypes {
    let Some(class) = ctx.registry.get_class(class_name) else {
        return PossibleTypes::unknown();
    };
    if class.has_magic("__call") || class.has_magic("__callstatic") {
        return PossibleTypes::unknown();
    }
    match class.get_method(method) {
        Some(sig) => function_return_types(sig),
        None => PossibleTypes::unknown(),
    }
}

fn function_return_types(sig: &FunctionSig) -> PossibleTypes {
    sig.return_type
        .clone()
        .map(PossibleTypes::single)
        .unwrap_or_else(PossibleTypes::unknown)
}

pub(crate) fn property_fetch_types(ctx: &Context, object_types: &PossibleTypes, property: &str) -> PossibleTypes {
    if object_types.is_unknown() || object_types.is_invalid() {
        return PossibleTypes::unknown();
    }
    let names = named_classes_in(object_types);
    if names.is_empty() {
        return PossibleTypes::unknown();
    }
    let mut out = PossibleTypes::invalid();
    for name in names {
        out.merge(&class_property_types(ctx, &name, property));
    }
    out
}

fn class_property_types(ctx: &Context, class_name: &str, property: &str) -> PossibleTypes {
    let Some(class) = ctx.registry.get_class(class_name) else {
        return PossibleTypes::unknown();
    };
    if class.has_magic("__get") {
        return PossibleTypes::unknown();
    }
    match class.get_property(property) {
        Some(p) => p
            .ty
            .clone()
            .map(PossibleTypes::single)
            .unwrap_or_else(PossibleTypes::unknown),
        // Optimistic: an unrecognized property on a known class might still
        // exist at runtime (dynamic properties), so this is not diagnosed
        // here. The validator's writability checks are the place undefined
        // property *writes* get flagged.
        None => PossibleTypes::unknown(),
    }
}

pub(crate) fn static_property_types(ctx: &mut Context, class_name: &str, property: &str, line: u32) -> PossibleTypes {
    let Some(class) = ctx.registry.get_class(class_name) else {
        return PossibleTypes::unknown();
    };
    match class.get_property(property) {
        Some(p) => {
            if !p.modifiers.contains(crate::reflection::Modifiers::STATIC) {
                ctx.error(
                    line,
                    format!("Cannot access non-static property `{class_name}::${property}` statically"),
                );
                return PossibleTypes::invalid();
            }
            p.ty.clone().map(PossibleTypes::single).unwrap_or_else(PossibleTypes::unknown)
        }
        None => PossibleTypes::unknown(),
    }
}

pub(crate) fn class_const_types(ctx: &Context, class_name: &str, constant: &str) -> PossibleTypes {
    let Some(class) = ctx.registry.get_class(class_name) else {
        return PossibleTypes::unknown();
    };
    match class.get_constant(constant) {
        Some(c) => c.ty.clone().map(PossibleTypes::single).unwrap_or_else(PossibleTypes::unknown),
        None => PossibleTypes::unknown(),
    }
}

/// Whether `class` (or anything in its ancestor/interface closure) declares
/// `__toString`, used by the validator for implicit-string-conversion checks
/// that don't go through the subtype relation's `implements_stringable`.
pub fn declares_to_string(class: &ClassInfo) -> bool {
    class.has_magic("__tostring")
}
