//! Per-file, per-scope analysis state.
//!
//! `Context` is a value threaded by the validator, not a singleton: entering
//! a class body, function body, closure, arrow-function, or braced namespace
//! clones it, and the clone's `has_error` is OR'd back into the parent when
//! the nested scope finishes (see the cloning rule in the component design).
//! The registry and diagnostic sink are borrowed, never cloned, so there is
//! exactly one of each across the whole analysis run.

use crate::ast::Expr;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::name::fold;
use crate::reflection::{ClassId, FunctionSig, GlobalRegistry};
use crate::types::PossibleTypes;
use camino::Utf8PathBuf;
use rustc_hash::FxHashMap;
use std::cell::RefCell;

/// Variables considered pre-defined in every new scope, per the component
/// design's data model.
pub const SUPERGLOBALS: &[&str] = &[
    "_GET", "_ENV", "_POST", "_FILES", "_COOKIE", "_SERVER", "_GLOBALS", "_REQUEST", "_SESSION",
];

#[derive(Debug, Clone)]
pub struct DefinedVariable {
    pub name: String,
    pub possible_types: PossibleTypes,
}

impl DefinedVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            possible_types: PossibleTypes::invalid(),
        }
    }
}

#[derive(Clone)]
pub struct Context<'a> {
    pub registry: &'a GlobalRegistry,
    sink: &'a RefCell<DiagnosticSink>,
    pub current_file: Utf8PathBuf,
    pub current_namespace: String,
    pub use_aliases: FxHashMap<String, String>,
    pub current_class: Option<ClassId>,
    pub current_function: Option<FunctionSig>,
    pub defined_variables: FxHashMap<String, DefinedVariable>,
    pub global_scope_variables: FxHashMap<String, DefinedVariable>,
    pub has_return: bool,
    pub is_in_assignment: bool,
    /// Whether the method currently being validated is `static` — instance
    /// methods seed `$this`, static ones do not.
    pub current_method_is_static: bool,
    /// Mirrors the shared sink's error flag for this scope's subtree;
    /// OR'd into the parent's copy when a nested scope finishes.
    pub has_error: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        file: impl Into<Utf8PathBuf>,
        registry: &'a GlobalRegistry,
        sink: &'a RefCell<DiagnosticSink>,
    ) -> Self {
        let mut ctx = Self {
            registry,
            sink,
            current_file: file.into(),
            current_namespace: String::new(),
            use_aliases: FxHashMap::default(),
            current_class: None,
            current_function: None,
            defined_variables: FxHashMap::default(),
            global_scope_variables: FxHashMap::default(),
            has_return: false,
            is_in_assignment: false,
            current_method_is_static: false,
            has_error: false,
        };
        ctx.reset_defined_variables();
        ctx
    }

    /// Clones `self` for a nested scope. Callers must call
    /// [`Self::absorb_child`] with the clone once the nested scope finishes.
    pub fn enter_scope(&self) -> Self {
        self.clone()
    }

    /// OR's a finished child scope's error flag back into `self`, per the
    /// cloning rule (diagnostics themselves are already visible through the
    /// shared sink; only the convenience flag needs merging).
    pub fn absorb_child(&mut self, child: &Context<'a>) {
        self.has_error |= child.has_error;
    }

    pub fn error(&mut self, line: u32, message: impl Into<String>) {
        self.has_error = true;
        self.sink
            .borrow_mut()
            .push(Diagnostic::error(self.current_file.clone(), line, message));
    }

    pub fn warning(&mut self, line: u32, message: impl Into<String>) {
        self.sink
            .borrow_mut()
            .push(Diagnostic::warning(self.current_file.clone(), line, message));
    }

    /// `add_defined_variable`: create on first write, ignore new info if
    /// already `Unknown`, otherwise union the types (dedup) — all of which
    /// `PossibleTypes::merge`/`add` already implement.
    pub fn add_defined_variable(&mut self, name: &str, types: PossibleTypes) {
        let entry = self
            .defined_variables
            .entry(name.to_string())
            .or_insert_with(|| DefinedVariable::new(name));
        entry.possible_types.merge(&types);
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&DefinedVariable> {
        self.defined_variables.get(name)
    }

    /// Snapshots the current map into `global_scope_variables`, clears it,
    /// and preloads the super-globals as `array`.
    pub fn reset_defined_variables(&mut self) {
        self.global_scope_variables = std::mem::take(&mut self.defined_variables);
        for name in SUPERGLOBALS {
            self.defined_variables.insert(
                (*name).to_string(),
                DefinedVariable {
                    name: (*name).to_string(),
                    possible_types: PossibleTypes::single(crate::types::Type::simple("array")),
                },
            );
        }
    }

    /// Clears `is_in_assignment`, returning the previous value so the caller
    /// can restore it on the way back out of a nested variable/property/index
    /// node (per the Open Question resolution).
    pub fn suspend_assignment_flag(&mut self) -> bool {
        std::mem::replace(&mut self.is_in_assignment, false)
    }

    pub fn restore_assignment_flag(&mut self, previous: bool) {
        self.is_in_assignment = previous;
    }

    /// Name lookup steps 1-2-3 from the reflection facade contract, with no
    /// step-4 global-namespace fallback — the asymmetry is deliberate: class
    /// names never fall back, only constants and functions do.
    pub fn resolve_class_like_name(&self, name: &str) -> String {
        if crate::name::is_fully_qualified(name) {
            return crate::name::strip_leading_backslash(name).to_string();
        }
        let (first, rest) = crate::name::split_first_segment(name);
        if let Some(fqn) = self.use_aliases.get(&fold(first)) {
            return if rest.is_empty() {
                fqn.clone()
            } else {
                crate::name::join_namespace(&fqn, rest)
            };
        }
        crate::name::join_namespace(&self.current_namespace, name)
    }

    /// Same as [`Self::resolve_class_like_name`] but with the step-4
    /// fallback to the bare (global-namespace) name used for constants and
    /// functions.
    pub fn resolve_value_name(&self, name: &str, exists: impl Fn(&str) -> bool) -> String {
        let namespaced = self.resolve_class_like_name(name);
        if exists(&namespaced) {
            namespaced
        } else {
            crate::name::strip_leading_backslash(name).to_string()
        }
    }

    /// `fq_class_name`: resolves `self`/`parent`/`static` against
    /// `current_class`, reporting the appropriate error if the class scope
    /// is absent or the parent is missing; otherwise delegates to the
    /// ordinary class-name resolution order.
    pub fn fq_class_name(&mut self, name: &str, line: u32, report_errors: bool) -> Option<String> {
        match name.to_ascii_lowercase().as_str() {
            "self" | "static" => match self.current_class {
                Some(id) => Some(self.registry.class(id).qualified_name.clone()),
                None => {
                    if report_errors {
                        self.error(line, format!("Cannot use `{name}` outside of a class scope"));
                    }
                    None
                }
            },
            "parent" => match self.current_class.and_then(|id| self.registry.class(id).parent) {
                Some(parent_id) => Some(self.registry.class(parent_id).qualified_name.clone()),
                None => {
                    if report_errors {
                        self.error(line, "Cannot use `parent` outside of a class with a parent");
                    }
                    None
                }
            },
            _ => Some(self.resolve_class_like_name(name)),
        }
    }

    /// True if the current scope is an instance method body — the condition
    /// under which `$this` is seeded.
    pub fn is_instance_method_scope(&self) -> bool {
        self.current_class.is_some() && self.current_function.is_some() && !self.current_method_is_static
    }

    pub fn default_expr_line(expr: &Expr) -> u32 {
        expr.line()
    }
}
