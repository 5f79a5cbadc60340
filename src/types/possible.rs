//! `PossibleTypes`: the set of types a variable or expression might hold at
//! runtime, attached to [`crate::context::DefinedVariable`] and returned by
//! the expression typer.
//!
//! Semantics: the value has one of these types. Empty means "known invalid"
//! (e.g. an undefined variable); a set containing [`Type::Unknown`] means
//! "not determinable" and is absorbing under further unions.

use super::{subtype, ClassQuery, Type};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PossibleTypes {
    types: Vec<Type>,
}

impl PossibleTypes {
    /// The empty set: "known invalid".
    pub fn invalid() -> Self {
        Self { types: Vec::new() }
    }

    /// `{Unknown}`: "not determinable".
    pub fn unknown() -> Self {
        Self {
            types: vec![Type::Unknown],
        }
    }

    pub fn single(ty: Type) -> Self {
        if ty.is_unknown() {
            return Self::unknown();
        }
        Self { types: vec![ty] }
    }

    pub fn from_types(types: impl IntoIterator<Item = Type>) -> Self {
        let mut out = Self::invalid();
        for ty in types {
            out.add(ty);
        }
        out
    }

    pub fn is_invalid(&self) -> bool {
        self.types.is_empty()
    }

    pub fn is_unknown(&self) -> bool {
        self.types.iter().any(Type::is_unknown)
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    /// Adds a type to the set, deduplicating. Once the set contains
    /// `Unknown` it stays `{Unknown}` (absorbing), matching the monotone
    /// variable-widening lifecycle (`Defined(Unknown)` never narrows back).
    pub fn add(&mut self, ty: Type) {
        if self.is_unknown() {
            return;
        }
        if ty.is_unknown() {
            self.types = vec![Type::Unknown];
            return;
        }
        if !self.types.contains(&ty) {
            self.types.push(ty);
        }
    }

    /// Unions another `PossibleTypes` into this one in place.
    pub fn merge(&mut self, other: &PossibleTypes) {
        for ty in &other.types {
            self.add(ty.clone());
        }
    }

    /// Collapses the set into a single `Type`, for feeding into `subtype`.
    /// `Invalid` collapses to `Type::Unknown` since there is nothing left to
    /// check against (a prior error already fired for the invalid source).
    pub fn as_type(&self) -> Type {
        match self.types.len() {
            0 => Type::Unknown,
            1 => self.types[0].clone(),
            _ => Type::Union(self.types.clone()),
        }
    }

    /// `subtype(self, expected)`, per the typer contract: every possible
    /// type of `self` must be acceptable where `expected` is required.
    pub fn is_subtype_of(&self, expected: &Type, env: &dyn ClassQuery) -> bool {
        subtype(&self.as_type(), expected, env)
    }

    /// True if any member of `self` and any member of `other` could be equal
    /// at runtime under `===`, used for tautology/contradiction detection:
    /// two sets are "possibly equal" unless they are provably disjoint.
    pub fn may_overlap(&self, other: &PossibleTypes, env: &dyn ClassQuery) -> bool {
        if self.is_unknown() || other.is_unknown() {
            return true;
        }
        if self.is_invalid() || other.is_invalid() {
            return true;
        }
        self.types.iter().any(|a| {
            other
                .types
                .iter()
                .any(|b| subtype(a, b, env) || subtype(b, a, env))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::subtype::NoClasses;

    #[test]
    fn unknown_is_absorbing() {
        let mut p = PossibleTypes::single(Type::simple("int"));
        p.add(Type::Unknown);
        assert!(p.is_unknown());
        p.add(Type::simple("string"));
        assert!(p.is_unknown());
        assert_eq!(p.types().len(), 1);
    }

    #[test]
    fn invalid_is_empty() {
        assert!(PossibleTypes::invalid().is_invalid());
        assert!(!PossibleTypes::unknown().is_invalid());
    }

    #[test]
    fn may_overlap_detects_disjoint_sets() {
        let env = NoClasses;
        let ints = PossibleTypes::single(Type::simple("int"));
        let strings = PossibleTypes::single(Type::simple("string"));
        assert!(!ints.may_overlap(&strings, &env));
        assert!(ints.may_overlap(&ints.clone(), &env));
    }
}
