//! Scope pre-scan: before the validator walks a function, method or closure
//! body in program order, it needs to know every variable the body *ever*
//! writes to — not just the ones already assigned at the point a read is
//! reached. Without this, a variable set only inside one branch of an `if`,
//! or captured by reference into a nested call, would read as undefined on
//! every reference that lexically precedes its assignment, even though a
//! PHP-style dynamically scoped variable is perfectly legal to use that way
//! once the interpreter has actually run the assignment.
//!
//! The pre-scan does not enter nested class or top-level function
//! declarations (those get their own scope and their own pre-scan when the
//! validator reaches them) but does enter closures, since a closure that
//! captures a by-reference `use` binding writes into the *enclosing* scope.

use crate::ast::{Expr, Stmt};
use rustc_hash::FxHashSet;

/// Every variable name the given body writes to, directly or through a
/// by-reference binding, ignoring declaration order.
pub fn written_variables(body: &[Stmt]) -> FxHashSet<String> {
    let mut out = FxHashSet::default();
    for stmt in body {
        walk_stmt(stmt, &mut out);
    }
    out
}

fn walk_stmt(stmt: &Stmt, out: &mut FxHashSet<String>) {
    match stmt {
        Stmt::ExprStmt { expr, .. } => walk_expr(expr, out),
        Stmt::Return { value, .. } => {
            if let Some(v) = value {
                walk_expr(v, out);
            }
        }
        Stmt::If { cond, then_body, else_body, .. } => {
            walk_expr(cond, out);
            for s in then_body {
                walk_stmt(s, out);
            }
            for s in else_body {
                walk_stmt(s, out);
            }
        }
        Stmt::Foreach { array, key, value, body, .. } => {
            walk_expr(array, out);
            if let Some(k) = key {
                collect_lvalue(k, out);
            }
            collect_lvalue(value, out);
            for s in body {
                walk_stmt(s, out);
            }
        }
        Stmt::TryCatch { body, catches, finally, .. } => {
            for s in body {
                walk_stmt(s, out);
            }
            for catch in catches {
                if let Some(var) = &catch.var {
                    out.insert(var.clone());
                }
                for s in &catch.body {
                    walk_stmt(s, out);
                }
            }
            for s in finally {
                walk_stmt(s, out);
            }
        }
        Stmt::Global { names, .. } => {
            for n in names {
                out.insert(n.clone());
            }
        }
        Stmt::StaticVar { items, .. } => {
            for (name, default) in items {
                out.insert(name.clone());
                if let Some(d) = default {
                    walk_expr(d, out);
                }
            }
        }
        Stmt::Block { stmts, .. } => {
            for s in stmts {
                walk_stmt(s, out);
            }
        }
        Stmt::Include { expr, .. } => walk_expr(expr, out),
        Stmt::ConstDecl { .. } | Stmt::FunctionDecl(_) | Stmt::ClassDecl(_) | Stmt::Namespace { .. } | Stmt::Use { .. } => {}
    }
}

fn walk_expr(expr: &Expr, out: &mut FxHashSet<String>) {
    match expr {
        Expr::Assign { target, value, by_ref, .. } => {
            collect_lvalue(target, out);
            let _ = by_ref;
            walk_expr(value, out);
        }
        Expr::ArrayLit(items, _) => {
            for (k, v) in items {
                if let Some(k) = k {
                    walk_expr(k, out);
                }
                walk_expr(v, out);
            }
        }
        Expr::New { args, .. } => walk_args(args, out),
        Expr::Call { callee, args, .. } => {
            walk_expr(callee, out);
            walk_args_by_ref_aware(args, out);
        }
        Expr::MethodCall { object, args, .. } => {
            walk_expr(object, out);
            walk_args_by_ref_aware(args, out);
        }
        Expr::StaticCall { args, .. } => walk_args_by_ref_aware(args, out),
        Expr::PropertyFetch { object, .. } => walk_expr(object, out),
        Expr::Index { base, index, .. } => {
            walk_expr(base, out);
            if let Some(i) = index {
                walk_expr(i, out);
            }
        }
        Expr::Binary { left, right, .. } => {
            walk_expr(left, out);
            walk_expr(right, out);
        }
        Expr::InstanceOf { expr, .. } => walk_expr(expr, out),
        Expr::Spread(inner, _) => walk_expr(inner, out),
        Expr::Closure { uses, body, .. } => {
            for u in uses {
                if u.by_reference {
                    out.insert(u.name.clone());
                }
            }
            for s in body {
                walk_stmt(s, out);
            }
        }
        Expr::ArrowFunction { body, .. } => walk_expr(body, out),
        Expr::Literal(..)
        | Expr::Variable(..)
        | Expr::ConstFetch(..)
        | Expr::StaticPropertyFetch { .. }
        | Expr::ClassConstFetch { .. } => {}
    }
}

fn walk_args(args: &[crate::ast::Arg], out: &mut FxHashSet<String>) {
    for arg in args {
        walk_expr(&arg.value, out);
    }
}

/// A plain call can write into the caller's scope only if the callee binds
/// that parameter by reference, which we cannot know without resolving the
/// callee first. As a conservative approximation, any bare variable argument
/// is treated as a potential write — the validator's actual undefined-read
/// check only consults this set to decide whether to *suppress* a warning,
/// so over-approximating here trades a few missed diagnostics for never
/// flagging a variable that a by-ref out-parameter legitimately defines.
fn walk_args_by_ref_aware(args: &[crate::ast::Arg], out: &mut FxHashSet<String>) {
    for arg in args {
        if let Expr::Variable(name, _) = &arg.value {
            out.insert(name.clone());
        }
        walk_expr(&arg.value, out);
    }
}

/// Records every variable name written to by an lvalue expression, including
/// array-destructuring (`[$a, $b] = ...` / `list($a, $b) = ...`, both of
/// which parse to `Expr::ArrayLit`).
fn collect_lvalue(expr: &Expr, out: &mut FxHashSet<String>) {
    match expr {
        Expr::Variable(name, _) => {
            out.insert(name.clone());
        }
        Expr::ArrayLit(items, _) => {
            for (key, value) in items {
                if let Some(k) = key {
                    walk_expr(k, out);
                }
                collect_lvalue(value, out);
            }
        }
        Expr::Index { base, index, .. } => {
            collect_lvalue(base, out);
            if let Some(i) = index {
                walk_expr(i, out);
            }
        }
        Expr::PropertyFetch { object, .. } => walk_expr(object, out),
        _ => walk_expr(expr, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_module;

    #[test]
    fn collects_assignment_and_foreach_targets() {
        let module = parse_module(
            r#"<?php
            function f() {
                if (true) {
                    $a = 1;
                }
                foreach ($items as $k => $v) {}
                try {} catch (\Exception $e) {}
            }
            "#,
        )
        .unwrap();
        let crate::ast::Stmt::FunctionDecl(decl) = &module.stmts[0] else {
            panic!("expected function decl");
        };
        let written = written_variables(decl.body.as_ref().unwrap());
        for name in ["a", "k", "v", "e"] {
            assert!(written.contains(name), "expected `{name}` in {written:?}");
        }
    }

    #[test]
    fn collects_closure_by_reference_use() {
        let module = parse_module(
            r#"<?php
            function f() {
                $total = 0;
                $add = function ($x) use (&$total) { $total = $total + $x; };
            }
            "#,
        )
        .unwrap();
        let crate::ast::Stmt::FunctionDecl(decl) = &module.stmts[0] else {
            panic!("expected function decl");
        };
        let written = written_variables(decl.body.as_ref().unwrap());
        assert!(written.contains("total"));
        assert!(written.contains("add"));
    }
}
