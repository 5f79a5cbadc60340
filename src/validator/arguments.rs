//! Call-site argument checking against a resolved [`FunctionSig`]: matches
//! positional and named arguments to parameters, flags by-reference
//! parameters bound to non-lvalue arguments, checks arity, and checks each
//! argument's type against its parameter's declared type.
//!
//! A spread argument (`...$args`) makes the final argument count
//! unknowable at analysis time, so it disables the rest of this check
//! entirely rather than risk a false arity diagnostic.

use crate::ast::{Arg, Expr};
use crate::context::Context;
use crate::reflection::FunctionSig;
use crate::types::{type_to_string, PossibleTypes};
use smallvec::SmallVec;

/// Checks `args` against `sig`, reporting diagnostics through `ctx`.
/// `arg_types` holds the already-computed type of each argument in `args`,
/// in the same order — the caller has already walked each argument
/// expression once via `validate_expr` and this avoids walking it again.
/// `line` is the call site's line, used for arity diagnostics that aren't
/// tied to a single argument.
pub fn check_args(ctx: &mut Context, sig: &FunctionSig, args: &[Arg], arg_types: &[PossibleTypes], line: u32) {
    if args.iter().any(|a| a.spread) {
        return;
    }

    let mut filled: SmallVec<[bool; 8]> = SmallVec::from_elem(false, sig.parameters.len());
    let mut positional_index = 0usize;

    for (arg, arg_type) in args.iter().zip(arg_types) {
        match &arg.name {
            Some(name) => match sig.parameters.iter().position(|p| p.name == *name) {
                Some(idx) => {
                    filled[idx] = true;
                    check_by_reference(ctx, sig, idx, arg, line);
                    check_type(ctx, sig, idx, arg_type, line);
                }
                None => ctx.error(line, format!("Unknown named parameter `${name}`")),
            },
            None => {
                if positional_index < sig.parameters.len() {
                    filled[positional_index] = true;
                    check_by_reference(ctx, sig, positional_index, arg, line);
                    check_type(ctx, sig, positional_index, arg_type, line);
                }
                positional_index += 1;
            }
        }
    }

    if !sig.is_variadic && positional_index > sig.parameters.len() {
        ctx.error(
            line,
            format!(
                "Too many arguments for `{}()`: expected at most {}, got {}",
                sig.qualified_name,
                sig.parameters.len(),
                positional_index
            ),
        );
    }

    for (idx, param) in sig.parameters.iter().enumerate() {
        if !param.optional && !filled[idx] {
            ctx.error(
                line,
                format!(
                    "Too few arguments for `{}()`: missing required parameter `${}`",
                    sig.qualified_name, param.name
                ),
            );
        }
    }
}

fn check_by_reference(ctx: &mut Context, sig: &FunctionSig, param_idx: usize, arg: &Arg, line: u32) {
    let Some(param) = sig.parameters.get(param_idx) else {
        return;
    };
    if !param.by_reference {
        return;
    }
    if !is_lvalue(&arg.value) {
        ctx.error(
            line,
            format!(
                "Argument for by-reference parameter `${}` of `{}()` must be a variable",
                param.name, sig.qualified_name
            ),
        );
    }
}

fn check_type(ctx: &mut Context, sig: &FunctionSig, param_idx: usize, arg_type: &PossibleTypes, line: u32) {
    if arg_type.is_unknown() || arg_type.is_invalid() {
        return;
    }
    let Some(param) = sig.parameters.get(param_idx) else {
        return;
    };
    let Some(expected) = &param.ty else {
        return;
    };
    if !arg_type.is_subtype_of(expected, ctx.registry) {
        ctx.error(
            line,
            format!(
                "Argument `{}` of `{}()` expects `{}`, got `{}`",
                param.name,
                sig.qualified_name,
                type_to_string(expected, false),
                type_to_string(&arg_type.as_type(), false),
            ),
        );
    }
}

fn is_lvalue(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Variable(..) | Expr::Index { .. } | Expr::PropertyFetch { .. } | Expr::StaticPropertyFetch { .. }
    )
}
