//! The type lattice: type representation, the subtype relation, and
//! pretty-printing.
//!
//! This module has no dependents inside the crate and is deliberately kept
//! free of any reference to [`crate::context`] or the AST — everything here
//! is pure data plus pure functions over that data, queried through the small
//! [`ClassQuery`] trait so the subtype relation can ask "is `Foo` a subclass
//! of `Bar`?" without depending on the reflection facade's concrete types.

mod display;
mod possible;
mod subtype;

pub use display::type_to_string;
pub use possible::PossibleTypes;
pub use subtype::{subtype, ClassQuery};

use itertools::Itertools;
use std::collections::BTreeSet;

/// Primitive type tags recognized by the lattice, in addition to class-like
/// names (which are stored as-is in `NamedType::name`).
pub const PRIMITIVE_TAGS: &[&str] = &[
    "int", "float", "string", "bool", "true", "false", "null", "array", "object", "callable",
    "iterable", "void", "never", "mixed", "resource", "self", "static", "parent",
];

pub fn is_primitive_tag(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PRIMITIVE_TAGS.contains(&lower.as_str())
}

/// A primitive tag or a fully qualified class/interface/trait/enum name,
/// optionally nullable.
#[derive(Debug, Clone)]
pub struct NamedType {
    pub name: String,
    pub nullable: bool,
}

impl NamedType {
    pub fn new(name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            nullable,
        }
    }

    pub fn non_nullable(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    /// This type with `nullable` stripped, name unchanged.
    pub fn non_null(&self) -> Self {
        Self::new(self.name.clone(), false)
    }

    pub fn folded(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    pub fn is_primitive(&self) -> bool {
        is_primitive_tag(&self.name)
    }

    pub fn is_class_like(&self) -> bool {
        !self.is_primitive()
    }
}

impl PartialEq for NamedType {
    /// Names compare case-insensitively (the language folds class, interface,
    /// function and constant identifiers); nullability is part of identity.
    fn eq(&self, other: &Self) -> bool {
        self.nullable == other.nullable && self.folded() == other.folded()
    }
}
impl Eq for NamedType {}

impl std::hash::Hash for NamedType {
    /// Matches `PartialEq`: hashes the folded (case-insensitive) name plus
    /// nullability, not the original-case spelling.
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.nullable.hash(state);
        self.folded().hash(state);
    }
}

/// A closed variant over the shapes the type lattice supports. See the crate
/// design documents for the full invariants (`Union` never nests `Union`;
/// `Intersection` only holds non-nullable `Named` members; `Union` is never
/// empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Named(NamedType),
    Union(Vec<Type>),
    Intersection(Vec<NamedType>),
    /// Sentinel distinguishing "not inferred" from the definite type `never`.
    Unknown,
}

impl Type {
    pub fn named(name: impl Into<String>, nullable: bool) -> Self {
        Type::Named(NamedType::new(name, nullable))
    }

    pub fn simple(name: impl Into<String>) -> Self {
        Type::named(name, false)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, Type::Named(n) if n.folded() == "mixed")
    }

    /// Builds a `Union` from a non-empty collection of types, flattening
    /// nested unions and deduplicating members (case-insensitively, by
    /// name+nullability). Collapses to the bare member when only one
    /// distinct type remains.
    pub fn union_of(members: impl IntoIterator<Item = Type>) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        for member in members {
            match member {
                Type::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        let deduped: Vec<Type> = flat.into_iter().unique().collect();
        match deduped.len() {
            0 => Type::Unknown,
            1 => deduped.into_iter().next().unwrap(),
            _ => Type::Union(deduped),
        }
    }

    pub fn intersection_of(members: impl IntoIterator<Item = NamedType>) -> Type {
        let mut seen = BTreeSet::new();
        let mut deduped = Vec::new();
        for mut member in members {
            member.nullable = false;
            let key = member.folded();
            if seen.insert(key) {
                deduped.push(member);
            }
        }
        match deduped.len() {
            0 => Type::Unknown,
            1 => Type::Named(deduped.into_iter().next().unwrap()),
            _ => Type::Intersection(deduped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_of_flattens_and_dedupes() {
        let t = Type::union_of([
            Type::simple("int"),
            Type::Union(vec![Type::simple("INT"), Type::simple("string")]),
        ]);
        assert_eq!(t, Type::Union(vec![Type::simple("int"), Type::simple("string")]));
    }

    #[test]
    fn union_of_singleton_collapses() {
        let t = Type::union_of([Type::simple("int"), Type::simple("int")]);
        assert_eq!(t, Type::simple("int"));
    }
}
