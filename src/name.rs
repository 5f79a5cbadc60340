//! Name and fully-qualified-name helpers.
//!
//! Class, function, constant and namespace identifiers are case-insensitive;
//! variable and property identifiers are case-sensitive. We keep the original
//! spelling around for diagnostics and display, but index lookups through a
//! [`FoldedName`] so the two concerns never get mixed up by accident.

use std::borrow::Borrow;
use std::fmt;

/// A name as authored in source, compared and hashed case-insensitively.
///
/// Used for map keys where the language folds case: class, interface, trait,
/// enum, function, constant and namespace segment names. Method names are
/// folded the same way (lowercased); property and variable names never are.
#[derive(Debug, Clone)]
pub struct FoldedName {
    original: String,
    folded: String,
}

impl FoldedName {
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        let folded = original.to_ascii_lowercase();
        Self { original, folded }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }
}

impl fmt::Display for FoldedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for FoldedName {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}
impl Eq for FoldedName {}

impl std::hash::Hash for FoldedName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl Borrow<str> for FoldedName {
    /// Borrows the *folded* form so `map.get("Foo")` and `map.get("foo")`
    /// land on the same entry when `map: HashMap<FoldedName, _>` is probed
    /// with an already-lowercased key. Callers that hold an arbitrary-case
    /// string should fold it first via [`fold`].
    fn borrow(&self) -> &str {
        &self.folded
    }
}

/// Lowercase a name for use as a lookup key against maps keyed by
/// [`FoldedName`] (or plain `String` maps that store folded keys directly).
pub fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Joins a namespace and a bare name into a fully qualified name, e.g.
/// `(Some("App\\Models"), "User")` -> `"App\\Models\\User"`.
pub fn join_namespace(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}\\{name}")
    }
}

/// Splits a possibly-qualified name into (leading namespace, last segment).
pub fn split_last_segment(name: &str) -> (&str, &str) {
    match name.rfind('\\') {
        Some(idx) => (&name[..idx], &name[idx + 1..]),
        None => ("", name),
    }
}

/// Splits a possibly-qualified name into (first segment, remaining tail).
/// Used for `use`-alias substitution, which only ever matches against the
/// first segment of a qualified name (`M\Sub\Base` aliases on `M`, not on
/// `M\Sub`), unlike [`split_last_segment`]'s default-alias extraction.
pub fn split_first_segment(name: &str) -> (&str, &str) {
    match name.find('\\') {
        Some(idx) => (&name[..idx], &name[idx + 1..]),
        None => (name, ""),
    }
}

pub fn is_fully_qualified(name: &str) -> bool {
    name.starts_with('\\')
}

pub fn strip_leading_backslash(name: &str) -> &str {
    name.strip_prefix('\\').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folded_name_equality_is_case_insensitive() {
        assert_eq!(FoldedName::new("Foo"), FoldedName::new("FOO"));
        assert_ne!(FoldedName::new("Foo"), FoldedName::new("Bar"));
    }

    #[test]
    fn split_last_segment_handles_bare_and_qualified() {
        assert_eq!(split_last_segment("User"), ("", "User"));
        assert_eq!(split_last_segment("App\\Models\\User"), ("App\\Models", "User"));
    }

    #[test]
    fn split_first_segment_handles_bare_and_qualified() {
        assert_eq!(split_first_segment("User"), ("User", ""));
        assert_eq!(split_first_segment("M\\Sub\\Base"), ("M", "Sub\\Base"));
    }
}
