//! The unified error-reporting channel.
//!
//! Every defect the checker finds funnels through [`Diagnostic`]; there is no
//! exception-style unwinding anywhere in the engine (`context::Context::error`
//! is the only place diagnostics are constructed, per the propagation policy).

use camino::Utf8PathBuf;
use std::fmt;

/// Failures distinct from recoverable [`Diagnostic`]s: I/O errors reading a
/// source file, and internal-invariant violations (the only "fatal" case in
/// the failure model — every user-facing defect is a `Diagnostic`, never an
/// `Err`).
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// A single recoverable defect found while analyzing a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: Utf8PathBuf,
    pub line: u32,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(file: impl Into<Utf8PathBuf>, line: u32, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(file: impl Into<Utf8PathBuf>, line: u32, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl fmt::Display for Diagnostic {
    /// Matches the wire format from the external interfaces contract:
    /// `` `<path>` line <N>:\n<message> ``
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "`{}` line {}:", self.file, self.line)?;
        write!(f, "{}", self.message)
    }
}

/// Appends diagnostics and tracks whether any `Severity::Error` was seen, the
/// flag that ultimately decides the process exit code.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    has_error: bool,
}

impl DiagnosticSink {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.has_error = true;
        }
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(file = %diagnostic.file, line = diagnostic.line, "{}", diagnostic.message),
            Severity::Error => tracing::debug!(file = %diagnostic.file, line = diagnostic.line, "{}", diagnostic.message),
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Merges another scope's sink into this one (used when a cloned child
    /// `Context` finishes: `has_error` is OR'd back into the parent, per the
    /// cloning rule).
    pub fn absorb(&mut self, other: DiagnosticSink) {
        self.has_error |= other.has_error;
        self.diagnostics.extend(other.diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_format() {
        let d = Diagnostic::error("./foo.php", 3, "Undefined variable `$x`");
        assert_eq!(d.to_string(), "`./foo.php` line 3:\nUndefined variable `$x`");
    }

    #[test]
    fn warning_does_not_flip_has_error() {
        let mut sink = DiagnosticSink::default();
        sink.push(Diagnostic::warning("a.php", 1, "dynamic include skipped"));
        assert!(!sink.has_error());
        sink.push(Diagnostic::error("a.php", 2, "Undefined variable `$x`"));
        assert!(sink.has_error());
    }
}
