//! Orchestrates a full analysis run: installs the host environment, loads
//! every input file (recursing into statically resolvable `include`s),
//! resolves every user-defined class, then validates each loaded module.
//!
//! This is the only place all four passes are wired together; `main`/`cli`
//! only build a [`CheckerConfig`] and hand it to [`run_checker`].

use crate::class_resolver;
use crate::diagnostics::{AnalysisError, Diagnostic, DiagnosticSink};
use crate::loader::Loader;
use crate::reflection::{self, GlobalRegistry};
use crate::validator;
use camino::Utf8PathBuf;
use std::cell::RefCell;

/// Options that change how loading and validation behave, set from the
/// command line.
#[derive(Debug, Clone, Default)]
pub struct CheckerConfig {
    /// Tolerate redeclaration of an already-registered class, function or
    /// constant instead of reporting it as an error — used when re-running
    /// the checker over its own already-analyzed output.
    pub self_check: bool,
    /// Files whose canonical path starts with one of these prefixes are
    /// skipped entirely, as though never passed on the command line.
    pub ignored_prefixes: Vec<Utf8PathBuf>,
}

/// The result of a full analysis run.
#[derive(Debug, Clone)]
pub struct CheckerOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub files_analyzed: usize,
}

/// Runs the full pipeline over `paths`, returning once every file (and
/// everything it statically includes) has been loaded, resolved and
/// validated.
pub fn run_checker(paths: &[Utf8PathBuf], config: &CheckerConfig) -> Result<CheckerOutcome, AnalysisError> {
    let mut registry = GlobalRegistry::new();
    reflection::host::install_host_environment(&mut registry);

    let sink = RefCell::new(DiagnosticSink::default());

    let modules = {
        let mut loader = Loader::new(&mut registry, &sink, config);
        for path in paths {
            loader.load_file(path)?;
        }
        loader.modules
    };

    tracing::info!(files = modules.len(), "load pass complete");

    class_resolver::resolve_all(&mut registry, &sink);
    tracing::info!("class resolution pass complete");

    validator::validate_modules(&registry, &sink, &modules);
    tracing::info!("validation pass complete");

    let files_analyzed = registry.loaded_files().count();
    let sink = sink.into_inner();
    Ok(CheckerOutcome {
        has_error: sink.has_error(),
        diagnostics: sink.into_diagnostics(),
        files_analyzed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_ignored_prefixes() {
        let config = CheckerConfig::default();
        assert!(!config.self_check);
        assert!(config.ignored_prefixes.is_empty());
    }
}
