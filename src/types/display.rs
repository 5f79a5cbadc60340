//! Pretty-printing of types, for both diagnostics (author order preserved)
//! and structural comparisons (sorted, so permutations of a union compare
//! equal as strings).

use super::{NamedType, Type};

pub fn type_to_string(ty: &Type, sort: bool) -> String {
    match ty {
        Type::Unknown => "mixed".to_string(),
        Type::Named(n) => named_to_string(n),
        Type::Union(members) => {
            let mut parts: Vec<String> = members.iter().map(|m| type_to_string(m, sort)).collect();
            if sort {
                parts.sort();
            }
            parts.join("|")
        }
        Type::Intersection(members) => {
            let mut parts: Vec<String> = members.iter().map(named_to_string).collect();
            if sort {
                parts.sort();
            }
            parts.join("&")
        }
    }
}

fn named_to_string(n: &NamedType) -> String {
    if n.nullable {
        format!("?{}", n.name)
    } else {
        n.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_union_is_stable_under_permutation() {
        let a = Type::Union(vec![Type::simple("string"), Type::simple("int")]);
        let b = Type::Union(vec![Type::simple("int"), Type::simple("string")]);
        assert_eq!(type_to_string(&a, true), type_to_string(&b, true));
    }

    #[test]
    fn unsorted_union_preserves_author_order() {
        let a = Type::Union(vec![Type::simple("string"), Type::simple("int")]);
        assert_eq!(type_to_string(&a, false), "string|int");
    }

    #[test]
    fn nullable_named_prefixes_question_mark() {
        assert_eq!(type_to_string(&Type::named("User", true), false), "?User");
    }
}
