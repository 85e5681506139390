//! `TypeSignature`: the key generic instantiations are cached under (spec
//! §4.2 "looks up or creates an instantiation keyed by `(func_name,
//! instance, signature)`").
//!
//! AST types aren't `Hash` (an `Array` size is an arbitrary expression, and
//! hashing arbitrary expression trees isn't something the rest of the crate
//! needs), so a signature is compared/hashed structurally by hand rather
//! than by deriving. Array sizes only need to agree when they're the same
//! literal; non-literal sizes fall back to node identity.

use std::hash::Hash as _;

use crate::ast::{Expr, ExprKind, Type, TypeKind};
use crate::intern::Interner;

/// The concrete argument types a call was made with, used both as a cache
/// key and to build the mangled name of the instantiation it produces.
#[derive(Debug, Clone)]
pub struct TypeSignature {
    pub param_types: Vec<Type>,
}

impl TypeSignature {
    pub fn new(param_types: Vec<Type>) -> Self {
        Self { param_types }
    }
}

impl PartialEq for TypeSignature {
    fn eq(&self, other: &Self) -> bool {
        self.param_types.len() == other.param_types.len()
            && self.param_types.iter().zip(&other.param_types).all(|(a, b)| types_structurally_equal(a, b))
    }
}

impl Eq for TypeSignature {}

impl std::hash::Hash for TypeSignature {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.param_types.len().hash(state);
        for t in &self.param_types {
            hash_type(t, state);
        }
    }
}

fn literal_i64(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::IntLiteral { value, .. } => Some(*value),
        ExprKind::UIntLiteral { value, .. } => i64::try_from(*value).ok(),
        _ => None,
    }
}

pub fn types_structurally_equal(a: &Type, b: &Type) -> bool {
    match (&a.kind, &b.kind) {
        (TypeKind::Primitive(x), TypeKind::Primitive(y)) => x == y,
        (TypeKind::Named(x), TypeKind::Named(y)) | (TypeKind::TypeVar(x), TypeKind::TypeVar(y)) => x == y,
        (TypeKind::Array { elem: e1, size: s1 }, TypeKind::Array { elem: e2, size: s2 }) => {
            if !types_structurally_equal(e1, e2) {
                return false;
            }
            match (literal_i64(s1), literal_i64(s2)) {
                (Some(x), Some(y)) => x == y,
                _ => std::rc::Rc::ptr_eq(s1, s2),
            }
        }
        (TypeKind::TypeOf(e1), TypeKind::TypeOf(e2)) => std::rc::Rc::ptr_eq(e1, e2),
        _ => false,
    }
}

fn hash_type<H: std::hash::Hasher>(ty: &Type, state: &mut H) {
    match &ty.kind {
        TypeKind::Primitive(p) => {
            0u8.hash(state);
            p.hash(state);
        }
        TypeKind::Named(n) => {
            1u8.hash(state);
            n.index().hash(state);
        }
        TypeKind::TypeVar(n) => {
            2u8.hash(state);
            n.index().hash(state);
        }
        TypeKind::Array { elem, size } => {
            3u8.hash(state);
            hash_type(elem, state);
            literal_i64(size).hash(state);
        }
        TypeKind::TypeOf(e) => {
            4u8.hash(state);
            (std::rc::Rc::as_ptr(e) as usize).hash(state);
        }
    }
}

/// Builds the deterministic, collision-resistant mangled name of a generic
/// instantiation: `base_name$T1$T2...` (spec §4.2: "assigns a mangled
/// name").
pub fn mangle_generic_name(interner: &Interner, base_name: &str, types: &[Type]) -> String {
    let mut out = String::from(base_name);
    for t in types {
        out.push('$');
        out.push_str(&type_mangle_fragment(interner, t));
    }
    out
}

pub fn type_mangle_fragment(interner: &Interner, ty: &Type) -> String {
    match &ty.kind {
        TypeKind::Primitive(p) => p.to_string(),
        TypeKind::Named(n) | TypeKind::TypeVar(n) => interner.resolve(*n).to_owned(),
        TypeKind::Array { elem, size } => {
            let size_str = literal_i64(size).map_or_else(|| "?".to_owned(), |n| n.to_string());
            format!("arr{}x{}", type_mangle_fragment(interner, elem), size_str)
        }
        TypeKind::TypeOf(_) => "typeof".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PrimitiveType, make_primitive, make_typevar, make_uint};
    use crate::common::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.strata", 1, 1)
    }

    #[test]
    fn signatures_with_same_primitives_are_equal() {
        let a = TypeSignature::new(vec![make_primitive(PrimitiveType::Unsigned(8), loc())]);
        let b = TypeSignature::new(vec![make_primitive(PrimitiveType::Unsigned(8), loc())]);
        assert_eq!(a, b);
    }

    #[test]
    fn signatures_with_different_widths_are_distinct() {
        let a = TypeSignature::new(vec![make_primitive(PrimitiveType::Unsigned(8), loc())]);
        let b = TypeSignature::new(vec![make_primitive(PrimitiveType::Signed(16), loc())]);
        assert_ne!(a, b);
    }

    #[test]
    fn mangled_names_differ_per_instantiation() {
        let interner = Interner::new();
        let u8_ty = make_primitive(PrimitiveType::Unsigned(8), loc());
        let i16_ty = make_primitive(PrimitiveType::Signed(16), loc());
        let a = mangle_generic_name(&interner, "id", &[u8_ty]);
        let b = mangle_generic_name(&interner, "id", &[i16_ty]);
        assert_ne!(a, b);
    }

    #[test]
    fn array_types_with_literal_sizes_compare_by_value() {
        let elem = make_primitive(PrimitiveType::Unsigned(8), loc());
        let a = crate::ast::make_array(elem.clone(), make_uint(4, "4", loc()), loc());
        let b = crate::ast::make_array(elem, make_uint(4, "4", loc()), loc());
        assert!(types_structurally_equal(&a, &b));
    }

    #[test]
    fn typevars_with_different_names_are_distinct() {
        let mut interner = Interner::new();
        let t = interner.intern("T");
        let u = interner.intern("U");
        let a = make_typevar(t, loc());
        let b = make_typevar(u, loc());
        assert!(!types_structurally_equal(&a, &b));
    }
}
