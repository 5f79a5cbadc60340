//! The subtype relation: "is every runtime value of type `a` also acceptable
//! where type `b` is expected?"

use super::{NamedType, Type};

/// What the subtype relation needs to know about user-defined and
/// host-provided classes, kept abstract so `types` does not depend on
/// `reflection`.
pub trait ClassQuery {
    /// Whether `name` refers to a known class, interface, trait or enum
    /// (case-insensitive).
    fn is_class_like(&self, name: &str) -> bool;

    /// The transitive closure of interfaces implemented/extended by `name`,
    /// plus the ancestor chain of `name` itself, all folded to lowercase.
    /// Used for "is `m` an ancestor or implemented interface of `n`".
    fn is_instance_of(&self, name: &str, target: &str) -> bool;

    /// Whether `name` (transitively) implements the `Stringable` marker.
    fn implements_stringable(&self, name: &str) -> bool;
}

/// A `ClassQuery` that knows about no classes at all: every class-like name
/// is "unknown", so class/interface checks beyond exact identity fail. Useful
/// for tests of the lattice in isolation.
pub struct NoClasses;

impl ClassQuery for NoClasses {
    fn is_class_like(&self, _name: &str) -> bool {
        false
    }
    fn is_instance_of(&self, _name: &str, _target: &str) -> bool {
        false
    }
    fn implements_stringable(&self, _name: &str) -> bool {
        false
    }
}

pub fn subtype(a: &Type, b: &Type, env: &dyn ClassQuery) -> bool {
    if a.is_unknown() || b.is_unknown() {
        return true;
    }
    if a.is_mixed() || b.is_mixed() {
        return true;
    }

    match (a, b) {
        (Type::Union(members), _) => members.iter().all(|x| subtype(x, b, env)),
        (_, Type::Union(members)) => members.iter().any(|y| subtype(a, y, env)),
        (_, Type::Intersection(members)) => members
            .iter()
            .all(|y| subtype(a, &Type::Named(y.clone()), env)),
        (Type::Intersection(members), _) => members
            .iter()
            .any(|x| subtype(&Type::Named(x.clone()), b, env)),
        (Type::Named(na), Type::Named(nb)) => named_subtype(na, nb, env),
        (Type::Unknown, _) | (_, Type::Unknown) => true,
    }
}

fn named_subtype(a: &NamedType, b: &NamedType, env: &dyn ClassQuery) -> bool {
    let (fa, fb) = (a.folded(), b.folded());

    // Identity is checked on the name alone; the checker is intentionally
    // optimistic about nullability mismatches rather than risk a false
    // positive (see NON-GOALS).
    if fa == fb {
        return true;
    }

    if fa == "null" {
        return b.nullable;
    }
    if a.nullable && b.nullable {
        return named_subtype(&a.non_null(), &b.non_null(), env);
    }
    if a.nullable && fb == "null" {
        return true;
    }

    if fa == "int" && fb == "float" {
        return true;
    }
    if (fa == "true" || fa == "false") && fb == "bool" {
        return true;
    }
    if (fa == "closure" && fb == "callable") || (fa == "callable" && fb == "closure") {
        return true;
    }
    if fa == "string" && fb == "callable" {
        return true;
    }

    let a_is_class = a.is_class_like();
    let b_is_class = b.is_class_like();
    if a_is_class && fb == "object" {
        return true;
    }
    if fa == "object" && b_is_class {
        return true;
    }

    if a_is_class && b_is_class && env.is_instance_of(&a.name, &b.name) {
        return true;
    }

    if fa == "string" && b_is_class && env.implements_stringable(&b.name) {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    struct Classes;
    impl ClassQuery for Classes {
        fn is_class_like(&self, name: &str) -> bool {
            matches!(name.to_ascii_lowercase().as_str(), "animal" | "dog" | "stringable")
        }
        fn is_instance_of(&self, name: &str, target: &str) -> bool {
            let name = name.to_ascii_lowercase();
            let target = target.to_ascii_lowercase();
            name == target || (name == "dog" && target == "animal")
        }
        fn implements_stringable(&self, name: &str) -> bool {
            name.eq_ignore_ascii_case("dog")
        }
    }

    #[test]
    fn reflexivity() {
        let env = NoClasses;
        for name in ["int", "string", "bool", "Foo"] {
            let t = Type::simple(name);
            assert!(subtype(&t, &t, &env), "{name} <: {name}");
        }
    }

    #[test]
    fn mixed_absorbs() {
        let env = NoClasses;
        let mixed = Type::simple("mixed");
        let int = Type::simple("int");
        assert!(subtype(&int, &mixed, &env));
        assert!(subtype(&mixed, &int, &env));
    }

    #[test]
    fn unknown_is_optimistic() {
        let env = NoClasses;
        assert!(subtype(&Type::Unknown, &Type::simple("int"), &env));
        assert!(subtype(&Type::simple("int"), &Type::Unknown, &env));
    }

    #[test]
    fn int_widens_to_float_but_not_reverse() {
        let env = NoClasses;
        assert!(subtype(&Type::simple("int"), &Type::simple("float"), &env));
        assert!(!subtype(&Type::simple("float"), &Type::simple("int"), &env));
    }

    #[test]
    fn class_inheritance() {
        let env = Classes;
        assert!(subtype(&Type::simple("Dog"), &Type::simple("Animal"), &env));
        assert!(!subtype(&Type::simple("Animal"), &Type::simple("Dog"), &env));
    }

    #[test]
    fn string_passes_for_stringable() {
        let env = Classes;
        assert!(subtype(&Type::simple("string"), &Type::simple("Dog"), &env));
    }

    #[test]
    fn nullable_subtype_checks_non_null_parts() {
        let env = Classes;
        let nullable_dog = Type::named("Dog", true);
        let nullable_animal = Type::named("Animal", true);
        let nullable_stdclass = Type::named("Stdclass", true);
        assert!(subtype(&nullable_dog, &nullable_animal, &env));
        assert!(!subtype(&nullable_dog, &nullable_stdclass, &env));
    }

    #[test]
    fn union_left_requires_all_members() {
        let env = NoClasses;
        let u = Type::Union(vec![Type::simple("int"), Type::simple("string")]);
        assert!(!subtype(&u, &Type::simple("int"), &env));
        let number = Type::Union(vec![Type::simple("int"), Type::simple("float")]);
        assert!(subtype(&number, &Type::simple("float"), &env));
    }

    #[test]
    fn union_right_requires_any_member() {
        let env = NoClasses;
        let u = Type::Union(vec![Type::simple("int"), Type::simple("string")]);
        assert!(subtype(&Type::simple("int"), &u, &env));
        assert!(!subtype(&Type::simple("bool"), &u, &env));
    }
}
