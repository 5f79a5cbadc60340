//! The statement and expression validator: the second pass over each loaded
//! module, now that every class has been resolved by `class_resolver`.
//!
//! Unlike the loader and the class resolver, the validator threads a single
//! mutable [`Context`] through a function/method/closure body in program
//! order — an `if`, `foreach` or `try`/`catch` does not get its own clone,
//! so a variable assigned in one branch is visible to code that follows it,
//! matching the language's flow-insensitive, dynamically-scoped variables.
//! Only entering a class, function, method, closure, arrow function or
//! braced namespace clones the context, per the cloning rule: the clone's
//! `has_error` is OR'd back into the parent when the nested scope finishes,
//! everything else about the nested scope is discarded.

pub mod arguments;

use crate::ast::{self, ClassDecl, ClassMember, ClassRef, Expr, Modifiers, Param, Stmt};
use crate::context::{Context, DefinedVariable};
use crate::diagnostics::DiagnosticSink;
use crate::name::fold;
use crate::reflection::{self, ClassId, ClassKind, FunctionSig};
use crate::types::{type_to_string, PossibleTypes, Type};
use crate::{prescan, typer};
use camino::Utf8PathBuf;
use std::cell::RefCell;

/// Runs the validator over every loaded module, in the order the loader
/// produced them.
pub fn validate_modules(
    registry: &crate::reflection::GlobalRegistry,
    sink: &RefCell<DiagnosticSink>,
    modules: &[(Utf8PathBuf, ast::Module)],
) {
    for (file, module) in modules {
        let mut ctx = Context::new(file.clone(), registry, sink);
        walk_stmts(&mut ctx, &module.stmts);
    }
}

fn walk_stmts(ctx: &mut Context, stmts: &[Stmt]) {
    for stmt in stmts {
        walk_stmt(ctx, stmt);
    }
}

fn walk_stmt(ctx: &mut Context, stmt: &Stmt) {
    match stmt {
        Stmt::Namespace { name, body, .. } => {
            let ns = name.clone().unwrap_or_default();
            match body {
                Some(stmts) => {
                    let mut child = ctx.enter_scope();
                    child.current_namespace = ns;
                    child.use_aliases.clear();
                    walk_stmts(&mut child, stmts);
                    ctx.absorb_child(&child);
                }
                None => {
                    ctx.current_namespace = ns;
                    ctx.use_aliases.clear();
                }
            }
        }
        Stmt::Use { alias, target, .. } => {
            ctx.use_aliases.insert(fold(alias), target.clone());
        }
        Stmt::ConstDecl { items, .. } => {
            for (_, value) in items {
                validate_expr(ctx, value);
            }
        }
        Stmt::FunctionDecl(decl) => {
            if let Some(body) = &decl.body {
                let fq = crate::name::join_namespace(&ctx.current_namespace, &decl.name);
                if let Some(sig) = ctx.registry.get_function(&fq).cloned() {
                    validate_function_like(ctx, sig, &decl.params, body, false, None, decl.line);
                }
            }
        }
        Stmt::ClassDecl(decl) => validate_class(ctx, decl),
        Stmt::ExprStmt { expr, .. } => {
            validate_expr(ctx, expr);
        }
        Stmt::Return { value, line } => {
            ctx.has_return = true;
            let actual = match value {
                Some(v) => validate_expr(ctx, v),
                None => PossibleTypes::single(Type::simple("null")),
            };
            if let Some(sig) = ctx.current_function.clone() {
                if let Some(expected) = &sig.return_type {
                    if !actual.is_subtype_of(expected, ctx.registry) {
                        ctx.error(
                            *line,
                            format!(
                                "Return type mismatch: expected `{}`, got `{}`",
                                type_to_string(expected, false),
                                type_to_string(&actual.as_type(), false),
                            ),
                        );
                    }
                }
            }
        }
        Stmt::If { cond, then_body, else_body, .. } => {
            validate_expr(ctx, cond);
            narrow_instanceof(ctx, cond);
            walk_stmts(ctx, then_body);
            walk_stmts(ctx, else_body);
        }
        Stmt::Foreach { array, key, value, body, .. } => {
            validate_expr(ctx, array);
            if let Some(k) = key {
                let prev = ctx.suspend_assignment_flag();
                validate_lvalue(ctx, k, PossibleTypes::unknown());
                ctx.restore_assignment_flag(prev);
            }
            let prev = ctx.suspend_assignment_flag();
            validate_lvalue(ctx, value, PossibleTypes::unknown());
            ctx.restore_assignment_flag(prev);
            walk_stmts(ctx, body);
        }
        Stmt::TryCatch { body, catches, finally, .. } => {
            walk_stmts(ctx, body);
            for catch in catches {
                let mut resolved = Vec::new();
                for tname in &catch.types {
                    let fq = ctx.resolve_class_like_name(tname);
                    if ctx.registry.class_exists(&fq) || reflection::host::is_host_class(&fq) {
                        resolved.push(Type::simple(fq));
                    } else {
                        ctx.error(catch.line, format!("Class `{tname}` does not exist"));
                    }
                }
                if let Some(var) = &catch.var {
                    let ty = if resolved.is_empty() {
                        PossibleTypes::unknown()
                    } else {
                        PossibleTypes::from_types(resolved)
                    };
                    ctx.add_defined_variable(var, ty);
                }
                walk_stmts(ctx, &catch.body);
            }
            walk_stmts(ctx, finally);
        }
        Stmt::Global { names, .. } => {
            for n in names {
                let ty = ctx
                    .global_scope_variables
                    .get(n)
                    .map(|v| v.possible_types.clone())
                    .unwrap_or_else(PossibleTypes::unknown);
                ctx.add_defined_variable(n, ty);
            }
        }
        Stmt::StaticVar { items, .. } => {
            for (name, default) in items {
                let ty = match default {
                    Some(d) => validate_expr(ctx, d),
                    None => PossibleTypes::unknown(),
                };
                ctx.add_defined_variable(name, ty);
            }
        }
        Stmt::Include { expr, .. } => {
            validate_expr(ctx, expr);
        }
        Stmt::Block { stmts, .. } => walk_stmts(ctx, stmts),
    }
}

/// `$x instanceof Foo` narrows `$x` to `Foo` for the remainder of the
/// `then` branch. This is a single-class, one-shot narrowing: there is no
/// branch-sensitive restore afterward, so the narrowed type is simply what
/// `$x` carries once the `if` has been walked.
fn narrow_instanceof(ctx: &mut Context, cond: &Expr) {
    if let Expr::InstanceOf { expr: inner, class, line } = cond {
        if let Expr::Variable(name, _) = inner.as_ref() {
            if let Some(fqcn) = typer::resolve_class_ref(ctx, class, *line) {
                ctx.defined_variables.insert(
                    name.clone(),
                    DefinedVariable {
                        name: name.clone(),
                        possible_types: PossibleTypes::single(Type::simple(fqcn)),
                    },
                );
            }
        }
    }
}

fn validate_class(ctx: &mut Context, decl: &ClassDecl) {
    let fq = crate::name::join_namespace(&ctx.current_namespace, &decl.name);
    let Some(id) = ctx.registry.class_id(&fq) else {
        return;
    };
    if ctx.registry.class(id).poisoned {
        return;
    }
    for member in &decl.members {
        if let ClassMember::Method(m) = member {
            if let Some(body) = &m.body {
                let Some(sig) = ctx.registry.class(id).get_method(&m.name).cloned() else {
                    continue;
                };
                let is_static = m.modifiers.contains(Modifiers::STATIC);
                validate_function_like(ctx, sig, &m.params, body, is_static, Some(id), m.line);
            }
        }
    }
}

fn validate_function_like(
    parent: &mut Context,
    sig: FunctionSig,
    params: &[Param],
    body: &[Stmt],
    is_static: bool,
    current_class: Option<ClassId>,
    line: u32,
) {
    let mut child = parent.enter_scope();
    child.current_class = current_class;
    child.current_method_is_static = is_static;
    child.reset_defined_variables();
    child.has_return = false;

    for p in params {
        let ty = param_type(p);
        child
            .defined_variables
            .insert(p.name.clone(), DefinedVariable { name: p.name.clone(), possible_types: ty });
    }

    child.current_function = Some(sig.clone());
    if child.is_instance_method_scope() {
        if let Some(cid) = current_class {
            let cname = child.registry.class(cid).qualified_name.clone();
            child
                .defined_variables
                .insert("this".to_string(), DefinedVariable {
                    name: "this".to_string(),
                    possible_types: PossibleTypes::single(Type::simple(cname)),
                });
        }
    }

    for name in prescan::written_variables(body) {
        if !child.defined_variables.contains_key(&name) {
            child.defined_variables.insert(name.clone(), DefinedVariable::new(name));
        }
    }

    walk_stmts(&mut child, body);

    if sig.is_return_required(true) && !child.has_return {
        child.error(line, "Missing return statement");
    }

    parent.absorb_child(&child);
}

fn param_type(p: &Param) -> PossibleTypes {
    p.type_hint
        .as_ref()
        .map(reflection::type_from_node)
        .map(PossibleTypes::single)
        .unwrap_or_else(PossibleTypes::unknown)
}

/// Validates and types `expr`, recursing into every sub-expression exactly
/// once: leaf resolution (what type does a constant/method/property
/// resolve to) is delegated to `typer`'s per-node helpers, while this
/// function owns the tree walk so it can additionally check call arity,
/// by-reference arguments, lvalue writability and identity-comparison
/// tautologies as it goes.
fn validate_expr(ctx: &mut Context, expr: &Expr) -> PossibleTypes {
    match expr {
        Expr::Literal(..) | Expr::ArrayLit(..) => crate::reflection::literal_type(expr)
            .map(PossibleTypes::single)
            .unwrap_or_else(PossibleTypes::unknown),

        Expr::Variable(name, line) => match ctx.lookup_variable(name) {
            Some(v) => v.possible_types.clone(),
            None => {
                if !ctx.is_in_assignment {
                    ctx.error(*line, format!("Undefined variable `${name}`"));
                }
                PossibleTypes::invalid()
            }
        },

        Expr::ConstFetch(name, line) => typer::const_fetch_types(ctx, name, *line),

        Expr::New { class, args, line } => {
            let arg_types: Vec<PossibleTypes> = args.iter().map(|a| validate_expr(ctx, &a.value)).collect();
            match typer::resolve_class_ref(ctx, class, *line) {
                Some(fqcn) => {
                    if let Some(cls) = ctx.registry.get_class(&fqcn) {
                        if cls.is_abstract || matches!(cls.kind, ClassKind::Interface | ClassKind::Trait) {
                            ctx.error(*line, format!("Cannot instantiate abstract class `{fqcn}`"));
                        }
                        if let Some(ctor) = cls.get_method("__construct").cloned() {
                            arguments::check_args(ctx, &ctor, args, &arg_types, *line);
                        }
                    } else if !reflection::host::is_host_class(&fqcn) {
                        ctx.error(*line, format!("Class `{fqcn}` does not exist"));
                    }
                    PossibleTypes::single(Type::simple(fqcn))
                }
                None => PossibleTypes::invalid(),
            }
        }

        Expr::Call { callee, args, line } => {
            let arg_types: Vec<PossibleTypes> = args.iter().map(|a| validate_expr(ctx, &a.value)).collect();
            match callee.as_ref() {
                Expr::ConstFetch(name, cline) => {
                    let result = typer::call_fetch_types(ctx, name, *cline);
                    let registry = ctx.registry;
                    let fq = ctx.resolve_value_name(name, |n| registry.function_exists(n));
                    if let Some(sig) = registry.get_function(&fq).cloned() {
                        arguments::check_args(ctx, &sig, args, &arg_types, *line);
                    }
                    result
                }
                other => {
                    validate_expr(ctx, other);
                    PossibleTypes::unknown()
                }
            }
        }

        Expr::MethodCall { object, method, args, line } => {
            let object_types = validate_expr(ctx, object);
            let arg_types: Vec<PossibleTypes> = args.iter().map(|a| validate_expr(ctx, &a.value)).collect();
            if let Some(sig) = resolve_single_method(ctx, &object_types, method) {
                arguments::check_args(ctx, &sig, args, &arg_types, *line);
            }
            typer::method_call_types(ctx, &object_types, method)
        }

        Expr::StaticCall { class, method, args, line } => {
            let arg_types: Vec<PossibleTypes> = args.iter().map(|a| validate_expr(ctx, &a.value)).collect();
            let fq = typer::resolve_class_ref(ctx, class, *line);
            if let Some(fqcn) = &fq {
                if let Some(sig) = ctx.registry.get_class(fqcn).and_then(|c| c.get_method(method)).cloned() {
                    if !sig_is_callable_statically(&sig, class, ctx) {
                        ctx.error(*line, format!("Cannot call non-static method `{method}` statically"));
                    }
                    arguments::check_args(ctx, &sig, args, &arg_types, *line);
                }
            }
            match fq {
                Some(fqcn) => typer::class_method_return_types(ctx, &fqcn, method),
                None => PossibleTypes::invalid(),
            }
        }

        Expr::PropertyFetch { object, property, .. } => {
            let object_types = validate_expr(ctx, object);
            typer::property_fetch_types(ctx, &object_types, property)
        }

        Expr::StaticPropertyFetch { class, property, line } => match typer::resolve_class_ref(ctx, class, *line) {
            Some(fqcn) => typer::static_property_types(ctx, &fqcn, property, *line),
            None => PossibleTypes::invalid(),
        },

        Expr::ClassConstFetch { class, constant, line } => {
            if constant.eq_ignore_ascii_case("class") {
                return PossibleTypes::single(Type::simple("string"));
            }
            match typer::resolve_class_ref(ctx, class, *line) {
                Some(fqcn) => typer::class_const_types(ctx, &fqcn, constant),
                None => PossibleTypes::invalid(),
            }
        }

        Expr::Index { base, index, .. } => {
            validate_expr(ctx, base);
            if let Some(i) = index {
                validate_expr(ctx, i);
            }
            PossibleTypes::unknown()
        }

        Expr::Assign { target, value, .. } => {
            let value_types = validate_expr(ctx, value);
            let prev = ctx.is_in_assignment;
            ctx.is_in_assignment = true;
            validate_lvalue(ctx, target, value_types.clone());
            ctx.is_in_assignment = prev;
            value_types
        }

        Expr::Binary { op, left, right, line } => {
            let lt = validate_expr(ctx, left);
            let rt = validate_expr(ctx, right);
            if matches!(op, ast::BinOp::Identical | ast::BinOp::NotIdentical) && !lt.may_overlap(&rt, ctx.registry) {
                let verdict = if *op == ast::BinOp::Identical { "false" } else { "true" };
                ctx.error(*line, format!("This comparison is always {verdict}: the operand types never overlap"));
            }
            match op {
                ast::BinOp::Identical | ast::BinOp::NotIdentical => PossibleTypes::single(Type::simple("bool")),
                ast::BinOp::Other => PossibleTypes::unknown(),
            }
        }

        Expr::InstanceOf { expr: inner, .. } => {
            validate_expr(ctx, inner);
            PossibleTypes::single(Type::simple("bool"))
        }

        Expr::Closure { params, uses, body, return_type, line } => {
            let mut child = ctx.enter_scope();
            child.current_class = None;
            child.current_method_is_static = true;
            child.reset_defined_variables();
            for p in params {
                let ty = param_type(p);
                child
                    .defined_variables
                    .insert(p.name.clone(), DefinedVariable { name: p.name.clone(), possible_types: ty });
            }
            for u in uses {
                let ty = ctx
                    .lookup_variable(&u.name)
                    .map(|v| v.possible_types.clone())
                    .unwrap_or_else(PossibleTypes::unknown);
                child
                    .defined_variables
                    .insert(u.name.clone(), DefinedVariable { name: u.name.clone(), possible_types: ty });
            }
            child.current_function = Some(FunctionSig {
                qualified_name: "{closure}".to_string(),
                parameters: reflection::parameters_from_ast(params),
                return_type: return_type.as_ref().map(reflection::type_from_node),
                is_variadic: params.last().is_some_and(|p| p.variadic),
                is_generator: false,
                is_abstract: false,
                is_static: true,
                declaring_class: None,
            });
            for name in prescan::written_variables(body) {
                if !child.defined_variables.contains_key(&name) {
                    child.defined_variables.insert(name.clone(), DefinedVariable::new(name));
                }
            }
            walk_stmts(&mut child, body);
            let sig = child.current_function.clone();
            if let Some(sig) = sig {
                if sig.is_return_required(true) && !child.has_return {
                    child.error(*line, "Missing return statement");
                }
            }
            ctx.absorb_child(&child);
            PossibleTypes::single(Type::simple("Closure"))
        }

        Expr::ArrowFunction { params, body, .. } => {
            let mut child = ctx.enter_scope();
            for p in params {
                let ty = param_type(p);
                child
                    .defined_variables
                    .insert(p.name.clone(), DefinedVariable { name: p.name.clone(), possible_types: ty });
            }
            validate_expr(&mut child, body);
            ctx.absorb_child(&child);
            PossibleTypes::single(Type::simple("Closure"))
        }

        Expr::Spread(inner, _) => validate_expr(ctx, inner),
    }
}

/// Validates an lvalue and records the effect an assignment through it has
/// on the variable/property map, without raising "undefined variable" for
/// the part being defined — assigning to `$x` is what makes `$x` defined.
fn validate_lvalue(ctx: &mut Context, expr: &Expr, value_types: PossibleTypes) {
    match expr {
        Expr::Variable(name, _) => {
            ctx.add_defined_variable(name, value_types);
        }
        Expr::ArrayLit(items, _) => {
            for (k, v) in items {
                if let Some(k) = k {
                    validate_expr(ctx, k);
                }
                validate_lvalue(ctx, v, PossibleTypes::unknown());
            }
        }
        Expr::Index { base, index, .. } => {
            if let Some(i) = index {
                validate_expr(ctx, i);
            }
            validate_lvalue(ctx, base, PossibleTypes::unknown());
        }
        Expr::PropertyFetch { object, property, line } => {
            let object_types = validate_expr(ctx, object);
            check_property_writable(ctx, &object_types, property, *line, &value_types);
        }
        Expr::StaticPropertyFetch { class, property, line } => {
            if let Some(fqcn) = typer::resolve_class_ref(ctx, class, *line) {
                typer::static_property_types(ctx, &fqcn, property, *line);
            }
        }
        _ => {
            validate_expr(ctx, expr);
        }
    }
}

fn check_property_writable(
    ctx: &mut Context,
    object_types: &PossibleTypes,
    property: &str,
    line: u32,
    value_types: &PossibleTypes,
) {
    if object_types.is_unknown() || object_types.is_invalid() {
        return;
    }
    for class_name in typer::named_classes_in(object_types) {
        let Some(cls) = ctx.registry.get_class(&class_name) else {
            continue;
        };
        if cls.has_magic("__set") {
            continue;
        }
        match cls.get_property(property) {
            Some(p) => {
                if p.modifiers.contains(Modifiers::READONLY) {
                    let own_scope = ctx
                        .current_class
                        .map(|id| ctx.registry.class(id).folded_name() == fold(&class_name))
                        .unwrap_or(false);
                    if !own_scope {
                        ctx.error(
                            line,
                            format!("Cannot modify readonly property `{class_name}::${property}` outside its declaring class"),
                        );
                    }
                }
                if let Some(expected) = &p.ty {
                    if !value_types.is_subtype_of(expected, ctx.registry) {
                        ctx.error(
                            line,
                            format!(
                                "Cannot assign `{}` to property `{}::${}` of type `{}`",
                                type_to_string(&value_types.as_type(), false),
                                class_name,
                                property,
                                type_to_string(expected, false),
                            ),
                        );
                    }
                }
            }
            None => {
                ctx.error(line, format!("Undefined property `{class_name}::${property}`"));
            }
        }
    }
}

fn resolve_single_method(ctx: &Context, object_types: &PossibleTypes, method: &str) -> Option<FunctionSig> {
    let names = typer::named_classes_in(object_types);
    if names.len() != 1 {
        return None;
    }
    ctx.registry.get_class(&names[0]).and_then(|c| c.get_method(method)).cloned()
}

/// Whether a `Class::method()` call is permitted given the method's own
/// `static` modifier and, for `self`/`parent`/`static`, whether the call
/// site is itself inside an instance method (where calling a non-static
/// method non-statically through those keywords is allowed, `$this` being
/// implicitly available).
fn sig_is_callable_statically(sig: &FunctionSig, class_ref: &ClassRef, ctx: &Context) -> bool {
    if sig.is_static {
        return true;
    }
    let keyword_ref =
        matches!(class_ref, ClassRef::Name(n, _) if matches!(n.to_ascii_lowercase().as_str(), "self" | "parent" | "static"));
    keyword_ref && ctx.is_instance_method_scope()
}
