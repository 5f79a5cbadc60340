//! First pass: parse each input file, walk its top level (recursing into
//! namespace blocks and statically resolvable `include`s), and register
//! every class, function and constant declaration it finds.
//!
//! The loader does not resolve inheritance or cross-check anything beyond
//! "is this name already taken" — that is `class_resolver`'s job, run after
//! every file has contributed its declarations.

use crate::ast::{self, ClassDecl, Expr, FunctionDecl, IncludeKind, Literal, Module, Stmt};
use crate::checker::CheckerConfig;
use crate::diagnostics::{AnalysisError, Diagnostic, DiagnosticSink};
use crate::name::fold;
use crate::reflection::{self, ClassInfo, ClassSource, GlobalConstant, GlobalRegistry};
use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashMap;
use std::cell::RefCell;

const RESERVED_CONSTANTS: &[&str] = &["null", "true", "false"];

/// Per-walk namespace/alias state, independent of the validator's `Context`
/// (the loader runs before any `Context` exists).
#[derive(Clone, Default)]
struct WalkState {
    namespace: String,
    use_aliases: FxHashMap<String, String>,
}

pub struct Loader<'a> {
    registry: &'a mut GlobalRegistry,
    sink: &'a RefCell<DiagnosticSink>,
    config: &'a CheckerConfig,
    pub modules: Vec<(Utf8PathBuf, Module)>,
}

impl<'a> Loader<'a> {
    pub fn new(registry: &'a mut GlobalRegistry, sink: &'a RefCell<DiagnosticSink>, config: &'a CheckerConfig) -> Self {
        Self {
            registry,
            sink,
            config,
            modules: Vec::new(),
        }
    }

    fn is_ignored(&self, path: &Utf8Path) -> bool {
        self.config
            .ignored_prefixes
            .iter()
            .any(|prefix| path.as_str().starts_with(prefix.as_str()))
    }

    fn error(&self, file: &Utf8Path, line: u32, message: impl Into<String>) {
        self.sink
            .borrow_mut()
            .push(Diagnostic::error(file.to_path_buf(), line, message));
    }

    fn warning(&self, file: &Utf8Path, line: u32, message: impl Into<String>) {
        self.sink
            .borrow_mut()
            .push(Diagnostic::warning(file.to_path_buf(), line, message));
    }

    pub fn load_file(&mut self, path: &Utf8Path) -> Result<(), AnalysisError> {
        self.load_file_inner(path)
    }

    fn load_file_inner(&mut self, path: &Utf8Path) -> Result<(), AnalysisError> {
        let canonical = canonicalize(path)?;
        if self.is_ignored(&canonical) {
            tracing::debug!(file = %canonical, "ignored by --ignore-file-prefix");
            return Ok(());
        }
        if self.registry.is_loaded(&canonical) {
            return Ok(());
        }
        self.registry.mark_loaded(canonical.clone());

        tracing::debug!(file = %canonical, "loading");
        let source = std::fs::read_to_string(&canonical).map_err(|source| AnalysisError::Io {
            path: canonical.clone(),
            source,
        })?;

        let module = match ast::parse_module(&source) {
            Ok(m) => m,
            Err(e) => {
                self.error(&canonical, e.line, e.message);
                return Ok(());
            }
        };

        let mut state = WalkState::default();
        self.walk_stmts(&canonical, &module.stmts, &mut state);
        self.modules.push((canonical.clone(), module));
        tracing::debug!(file = %canonical, "loaded");
        Ok(())
    }

    fn walk_stmts(&mut self, file: &Utf8Path, stmts: &[Stmt], state: &mut WalkState) {
        for stmt in stmts {
            self.walk_stmt(file, stmt, state);
        }
    }

    fn walk_stmt(&mut self, file: &Utf8Path, stmt: &Stmt, state: &mut WalkState) {
        match stmt {
            Stmt::Namespace { name, body, .. } => {
                let ns = name.clone().unwrap_or_default();
                match body {
                    Some(body) => {
                        let mut inner = WalkState {
                            namespace: ns,
                            use_aliases: FxHashMap::default(),
                        };
                        self.walk_stmts(file, body, &mut inner);
                    }
                    None => {
                        state.namespace = ns;
                        state.use_aliases.clear();
                    }
                }
            }
            Stmt::Use { alias, target, .. } => {
                state.use_aliases.insert(fold(alias), target.clone());
            }
            Stmt::ConstDecl { items, line } => {
                for (name, value) in items {
                    self.register_constant(file, *line, &state.namespace, name, value);
                }
            }
            Stmt::FunctionDecl(decl) => self.register_function(file, decl, state),
            Stmt::ClassDecl(decl) => self.register_class(file, decl, state),
            Stmt::Include { kind, expr, line } => self.follow_include(file, *kind, expr, *line, state),
            Stmt::Block { stmts, .. } => self.walk_stmts(file, stmts, state),
            _ => {}
        }
    }

    fn register_constant(&mut self, file: &Utf8Path, line: u32, namespace: &str, name: &str, value: &Expr) {
        if RESERVED_CONSTANTS.contains(&name.to_ascii_lowercase().as_str()) {
            self.error(file, line, format!("Cannot redeclare reserved constant `{name}`"));
            return;
        }
        let qualified = crate::name::join_namespace(namespace, name);
        if self.registry.constant_exists(&qualified) && !self.config.self_check {
            self.error(file, line, format!("Constant `{name}` has already been declared"));
            return;
        }
        self.registry.insert_constant(GlobalConstant {
            qualified_name: qualified,
            value: Some(value.clone()),
            ty: reflection::literal_type(value),
        });
    }

    fn register_function(&mut self, file: &Utf8Path, decl: &FunctionDecl, state: &WalkState) {
        let qualified = crate::name::join_namespace(&state.namespace, &decl.name);
        if self.registry.function_exists(&qualified) && !self.config.self_check {
            self.error(file, decl.line, format!("Function `{}` has already been declared", decl.name));
            return;
        }
        let sig = reflection::build_function_sig(
            qualified,
            &decl.params,
            &decl.return_type,
            decl.body.is_some(),
            false,
            false,
            None,
        );
        self.registry.insert_function(sig);
    }

    fn register_class(&mut self, file: &Utf8Path, decl: &ClassDecl, state: &WalkState) {
        let qualified = crate::name::join_namespace(&state.namespace, &decl.name);
        if self.registry.class_exists(&qualified) && !self.config.self_check {
            self.error(file, decl.line, format!("Cannot declare class `{}`, name is already in use", decl.name));
            return;
        }
        let info = ClassInfo {
            qualified_name: qualified,
            kind: decl.kind.into(),
            is_abstract: decl.modifiers.contains(ast::Modifiers::ABSTRACT),
            is_final: decl.modifiers.contains(ast::Modifiers::FINAL),
            parent: None,
            interfaces: Vec::new(),
            traits: Vec::new(),
            properties: indexmap::IndexMap::new(),
            constants: indexmap::IndexMap::new(),
            methods: indexmap::IndexMap::new(),
            enum_backing: None,
            interface_names_closure: indexmap::IndexSet::new(),
            source: ClassSource::UserDefined {
                decl: Box::new(decl.clone()),
                namespace: state.namespace.clone(),
                use_aliases: state.use_aliases.clone(),
                file: file.to_path_buf(),
            },
            initialized: false,
            poisoned: false,
            resolving: false,
        };
        self.registry.insert_class(info);
    }

    fn follow_include(&mut self, file: &Utf8Path, _kind: IncludeKind, expr: &Expr, line: u32, state: &mut WalkState) {
        match resolve_static_include_path(expr, file) {
            Some(target) => {
                if let Err(e) = self.load_file_inner(&target) {
                    self.error(file, line, format!("failed to load included file: {e}"));
                }
            }
            None => {
                self.warning(file, line, "include target is not a statically resolvable path, skipped");
            }
        }
        let _ = state;
    }
}

fn canonicalize(path: &Utf8Path) -> Result<Utf8PathBuf, AnalysisError> {
    let canonical = std::fs::canonicalize(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Utf8PathBuf::from_path_buf(canonical).map_err(|p| {
        AnalysisError::Internal(format!("non-UTF-8 path: {}", p.display()))
    })
}

/// Tries to statically evaluate an include expression into a path: a string
/// literal, `__FILE__`/`__DIR__`, or a concatenation of such pieces.
fn resolve_static_include_path(expr: &Expr, current_file: &Utf8Path) -> Option<Utf8PathBuf> {
    let text = resolve_static_string(expr, current_file)?;
    let candidate = Utf8PathBuf::from(text);
    let resolved = if candidate.is_absolute() {
        candidate
    } else {
        current_file.parent().unwrap_or_else(|| Utf8Path::new(".")).join(candidate)
    };
    if resolved.exists() {
        Some(resolved)
    } else {
        None
    }
}

fn resolve_static_string(expr: &Expr, current_file: &Utf8Path) -> Option<String> {
    match expr {
        Expr::Literal(Literal::Str(s), _) => Some(s.clone()),
        Expr::ConstFetch(name, _) if name.eq_ignore_ascii_case("__FILE__") => {
            Some(current_file.as_str().to_string())
        }
        Expr::ConstFetch(name, _) if name.eq_ignore_ascii_case("__DIR__") => Some(
            current_file
                .parent()
                .unwrap_or_else(|| Utf8Path::new("."))
                .as_str()
                .to_string(),
        ),
        Expr::Binary { left, right, .. } => {
            let mut out = resolve_static_string(left, current_file)?;
            out.push_str(&resolve_static_string(right, current_file)?);
            Some(out)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_constant_name_is_rejected() {
        assert!(RESERVED_CONSTANTS.contains(&"null"));
        assert!(RESERVED_CONSTANTS.contains(&"true"));
    }
}
