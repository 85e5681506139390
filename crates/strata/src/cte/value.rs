//! `CTValue` (spec §3/§4.5): the compile-time value domain the evaluator
//! produces and consumes.
//!
//! Composites and arrays are reference-counted (`Rc`) rather than deep-owned,
//! mirroring the original's `shared_ptr<CTComposite>`/`shared_ptr<CTArray>`
//! (spec §4.5: "Composites and arrays are logically owned by the
//! evaluator's stack and must support structural copy-on-write semantics
//! when mutated through a nested lvalue"). `Rc::make_mut` gives exactly that:
//! cloning happens only when a write target isn't uniquely held.

use std::rc::Rc;

use ahash::AHashMap;

/// A compile-time record value: its declared type name plus its fields.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CtComposite {
    pub type_name: String,
    pub fields: AHashMap<String, CTValue>,
}

/// A compile-time array value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CtArray {
    pub elements: Vec<CTValue>,
}

/// The compile-time value domain (spec §3 "CTValue").
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CTValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    /// An lvalue slot that has been declared but never written; reading one
    /// is always an evaluation failure (spec §4.5 "a failed evaluation
    /// restores all pre-call state").
    Uninitialized,
    Composite(Rc<CtComposite>),
    Array(Rc<CtArray>),
}

impl CTValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Uninitialized => "uninitialized",
            Self::Composite(_) => "composite",
            Self::Array(_) => "array",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int(_) | Self::UInt(_))
    }

    /// Scalar truthiness (spec supplement 5 / original `cte_scalar_to_bool`):
    /// ints/uints/floats are truthy when nonzero, `bool` passes through.
    /// Composites, arrays, strings and uninitialized values have no
    /// compile-time truthiness.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Int(n) => Some(*n != 0),
            Self::UInt(n) => Some(*n != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Widens a numeric/bool scalar to `i64`, truncating floats towards zero
    /// (original's `to_int`).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::UInt(n) => Some(*n as i64),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Widens a numeric scalar to `f64` (original's `to_float`).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            Self::UInt(n) => Some(*n as f64),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

/// Deep-clones a composite/array value; scalars are `Clone`-cheap already.
/// Used when an lvalue write needs a uniquely-owned target composite/array
/// but the evaluator holds only a shared `Rc` to it.
pub fn clone_ct_value(value: &CTValue) -> CTValue {
    match value {
        CTValue::Composite(c) => CTValue::Composite(Rc::new(CtComposite {
            type_name: c.type_name.clone(),
            fields: c.fields.iter().map(|(k, v)| (k.clone(), clone_ct_value(v))).collect(),
        })),
        CTValue::Array(a) => CTValue::Array(Rc::new(CtArray {
            elements: a.elements.iter().map(clone_ct_value).collect(),
        })),
        other => other.clone(),
    }
}
