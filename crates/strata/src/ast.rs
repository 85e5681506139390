//! The immutable-after-construction syntax tree: `Type`, `Expr`, `Stmt`.
//!
//! AST nodes are produced by the lexer/parser (an external collaborator,
//! see the crate docs) and live for the whole compilation. They are shared
//! across module instances (spec §3: "each AST subtree belongs to exactly
//! one module but may be referenced by multiple instances"), so nodes are
//! reference-counted (`Rc`) rather than owned by a single parent the way a
//! `Box` tree would be.
//!
//! Per the design note in spec §9 ("keep nodes logically immutable after
//! parse... Avoid ownership cycles entirely: symbols never own AST, AST
//! never owns symbols"), nodes carry no resolved-symbol or resolved-type
//! field. Those are cross-cutting, instance-scoped, pass-produced facts and
//! live in the side tables in [`crate::bindings`] instead — exactly the
//! `(instance_id, node) -> Symbol*` design the spec calls for, generalized
//! to also carry types, mutability flags, and optimizer facts.
//!
//! The lowerer/residualizer still need to *rewrite* the tree (spec §4.4,
//! §4.6). Since nodes are immutable, rewriting means building new `Rc`
//! nodes and splicing them in; a subtree that a rewrite leaves untouched is
//! cloned by `Rc::clone` (cheap, and preserves node identity for anything
//! keyed by pointer that still cares about that subtree).

use std::rc::Rc;

use crate::common::SourceLocation;
use crate::intern::NameId;

/// Opaque identity for an AST node, used as a side-table key.
///
/// Derived from the node's `Rc` pointer. Two `Rc` clones of the same node
/// produce the same `NodeKey`; a freshly rewritten node gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

pub fn expr_key(e: &Expr) -> NodeKey {
    NodeKey(Rc::as_ptr(e) as usize)
}

pub fn stmt_key(s: &Stmt) -> NodeKey {
    NodeKey(Rc::as_ptr(s) as usize)
}

pub fn type_key(t: &Type) -> NodeKey {
    NodeKey(Rc::as_ptr(t) as usize)
}

/// An annotation attached to a declaration: `[[name]]` or `[[name(arg,...)]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<String>,
    pub location: SourceLocation,
}

impl Annotation {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            location,
        }
    }
}

/// The fixed set of annotations the frontend understands (spec §4.2).
/// Anything else is accepted syntactically and produces a warning, not an
/// error (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum KnownAnnotation {
    Reentrant,
    Nonreentrant,
    Nonbanked,
    Inline,
    Noinline,
    Hot,
    Cold,
    Export,
}

// ---------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Signed(u32),
    Unsigned(u32),
    F16,
    F32,
    F64,
    Bool,
    String,
}

impl PrimitiveType {
    /// Bit width, or `-1` for the unbounded `string` primitive (mirrors the
    /// original's `type_bits`, §3 "Primitives carry an integer-bit-width").
    pub fn bits(self) -> i64 {
        match self {
            Self::Signed(n) | Self::Unsigned(n) => i64::from(n),
            Self::Bool => 1,
            Self::F16 => 16,
            Self::F32 => 32,
            Self::F64 => 64,
            Self::String => -1,
        }
    }

    pub fn is_signed_int(self) -> bool {
        matches!(self, Self::Signed(_))
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(self, Self::Unsigned(_))
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32 | Self::F64)
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signed(n) => write!(f, "i{n}"),
            Self::Unsigned(n) => write!(f, "u{n}"),
            Self::F16 => write!(f, "f16"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Bool => write!(f, "bool"),
            Self::String => write!(f, "string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(PrimitiveType),
    Array { elem: Type, size: Expr },
    Named(NameId),
    TypeVar(NameId),
    TypeOf(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeData {
    pub kind: TypeKind,
    pub location: SourceLocation,
}

pub type Type = Rc<TypeData>;

pub fn make_primitive(p: PrimitiveType, location: SourceLocation) -> Type {
    Rc::new(TypeData {
        kind: TypeKind::Primitive(p),
        location,
    })
}

pub fn make_array(elem: Type, size: Expr, location: SourceLocation) -> Type {
    Rc::new(TypeData {
        kind: TypeKind::Array { elem, size },
        location,
    })
}

pub fn make_named(name: NameId, location: SourceLocation) -> Type {
    Rc::new(TypeData {
        kind: TypeKind::Named(name),
        location,
    })
}

pub fn make_typevar(name: NameId, location: SourceLocation) -> Type {
    Rc::new(TypeData {
        kind: TypeKind::TypeVar(name),
        location,
    })
}

pub fn make_typeof(expr: Expr, location: SourceLocation) -> Type {
    Rc::new(TypeData {
        kind: TypeKind::TypeOf(expr),
        location,
    })
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_arithmetic_or_bitwise(self) -> bool {
        !self.is_comparison() && !self.is_logical()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    IntLiteral { value: i64, raw: String },
    UIntLiteral { value: u64, raw: String },
    FloatLiteral { value: f64, raw: String },
    CharLiteral { value: u32 },
    StringLiteral { value: String },
    Identifier { name: NameId },
    Binary { op: BinOp, left: Expr, right: Expr },
    Unary { op: UnOp, operand: Expr },
    /// `callee(args)`, or `receiver.callee(args)` when `receivers` is
    /// non-empty (method-call / ref-parameter receiver syntax, spec §6).
    Call { callee: Expr, args: Vec<Expr>, receivers: Vec<Expr> },
    Index { base: Expr, index: Expr },
    Member { base: Expr, field: NameId },
    ArrayLiteral { elements: Vec<Expr> },
    TupleLiteral { elements: Vec<Expr> },
    Block { statements: Vec<Stmt>, result: Option<Expr> },
    Conditional { condition: Expr, true_expr: Expr, false_expr: Expr },
    Cast { target: Type, operand: Expr },
    Assignment { lhs: Expr, rhs: Expr },
    Range { start: Expr, end: Expr },
    Length { operand: Expr },
    /// `subject @ body`, optionally `@@` for sorted iteration.
    Iteration { subject: Expr, body: Expr, sorted: bool },
    /// `condition @ { body }`.
    Repeat { condition: Expr, body: Expr },
    ResourcePath { segments: Vec<NameId> },
    Process { command: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprData {
    pub kind: ExprKind,
    pub location: SourceLocation,
    pub annotations: Vec<Annotation>,
}

pub type Expr = Rc<ExprData>;

fn expr(kind: ExprKind, location: SourceLocation) -> Expr {
    Rc::new(ExprData {
        kind,
        location,
        annotations: Vec::new(),
    })
}

pub fn make_int(value: i64, raw: impl Into<String>, location: SourceLocation) -> Expr {
    expr(
        ExprKind::IntLiteral {
            value,
            raw: raw.into(),
        },
        location,
    )
}

pub fn make_uint(value: u64, raw: impl Into<String>, location: SourceLocation) -> Expr {
    expr(
        ExprKind::UIntLiteral {
            value,
            raw: raw.into(),
        },
        location,
    )
}

pub fn make_float(value: f64, raw: impl Into<String>, location: SourceLocation) -> Expr {
    expr(
        ExprKind::FloatLiteral {
            value,
            raw: raw.into(),
        },
        location,
    )
}

pub fn make_char(value: u32, location: SourceLocation) -> Expr {
    expr(ExprKind::CharLiteral { value }, location)
}

pub fn make_string(value: impl Into<String>, location: SourceLocation) -> Expr {
    expr(
        ExprKind::StringLiteral { value: value.into() },
        location,
    )
}

pub fn make_identifier(name: NameId, location: SourceLocation) -> Expr {
    expr(ExprKind::Identifier { name }, location)
}

pub fn make_binary(op: BinOp, left: Expr, right: Expr, location: SourceLocation) -> Expr {
    expr(ExprKind::Binary { op, left, right }, location)
}

pub fn make_unary(op: UnOp, operand: Expr, location: SourceLocation) -> Expr {
    expr(ExprKind::Unary { op, operand }, location)
}

pub fn make_call(callee: Expr, args: Vec<Expr>, receivers: Vec<Expr>, location: SourceLocation) -> Expr {
    expr(
        ExprKind::Call {
            callee,
            args,
            receivers,
        },
        location,
    )
}

pub fn make_index(base: Expr, index: Expr, location: SourceLocation) -> Expr {
    expr(ExprKind::Index { base, index }, location)
}

pub fn make_member(base: Expr, field: NameId, location: SourceLocation) -> Expr {
    expr(ExprKind::Member { base, field }, location)
}

pub fn make_array_literal(elements: Vec<Expr>, location: SourceLocation) -> Expr {
    expr(ExprKind::ArrayLiteral { elements }, location)
}

pub fn make_tuple_literal(elements: Vec<Expr>, location: SourceLocation) -> Expr {
    expr(ExprKind::TupleLiteral { elements }, location)
}

pub fn make_block(statements: Vec<Stmt>, result: Option<Expr>, location: SourceLocation) -> Expr {
    expr(ExprKind::Block { statements, result }, location)
}

pub fn make_conditional(condition: Expr, true_expr: Expr, false_expr: Expr, location: SourceLocation) -> Expr {
    expr(
        ExprKind::Conditional {
            condition,
            true_expr,
            false_expr,
        },
        location,
    )
}

pub fn make_cast(target: Type, operand: Expr, location: SourceLocation) -> Expr {
    expr(ExprKind::Cast { target, operand }, location)
}

pub fn make_assignment(lhs: Expr, rhs: Expr, location: SourceLocation) -> Expr {
    expr(ExprKind::Assignment { lhs, rhs }, location)
}

pub fn make_range(start: Expr, end: Expr, location: SourceLocation) -> Expr {
    expr(ExprKind::Range { start, end }, location)
}

pub fn make_length(operand: Expr, location: SourceLocation) -> Expr {
    expr(ExprKind::Length { operand }, location)
}

pub fn make_iteration(subject: Expr, body: Expr, sorted: bool, location: SourceLocation) -> Expr {
    expr(
        ExprKind::Iteration { subject, body, sorted },
        location,
    )
}

pub fn make_repeat(condition: Expr, body: Expr, location: SourceLocation) -> Expr {
    expr(ExprKind::Repeat { condition, body }, location)
}

pub fn make_resource_path(segments: Vec<NameId>, location: SourceLocation) -> Expr {
    expr(ExprKind::ResourcePath { segments }, location)
}

pub fn make_process(command: impl Into<String>, location: SourceLocation) -> Expr {
    expr(
        ExprKind::Process {
            command: command.into(),
        },
        location,
    )
}

/// Returns `true` for the literal `()`-like "no value" expression used as a
/// block's implicit trailing result when nothing is produced. The Source
/// has no unit literal syntax; an empty tuple literal plays that role.
pub fn is_none(e: &Expr) -> bool {
    matches!(&e.kind, ExprKind::TupleLiteral { elements } if elements.is_empty())
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: NameId,
    pub ty: Type,
    /// True for a by-reference receiver parameter (spec GLOSSARY:
    /// "method-style first argument or explicit ref slot").
    pub is_ref: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: NameId,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    ExprStmt(Expr),
    Return(Option<Expr>),
    Break,
    Continue,
    VarDecl {
        name: NameId,
        declared_type: Option<Type>,
        is_mutable: bool,
        is_exported: bool,
        is_external: bool,
        init: Option<Expr>,
    },
    FuncDecl {
        name: NameId,
        params: Vec<Parameter>,
        return_type: Option<Type>,
        body: Option<Expr>,
        is_external: bool,
        is_exported: bool,
    },
    TypeDecl {
        name: NameId,
        fields: Vec<FieldDecl>,
    },
    Import {
        path: Vec<NameId>,
    },
    ConditionalStmt {
        condition: Expr,
        then_block: Vec<Stmt>,
        else_block: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StmtData {
    pub kind: StmtKind,
    pub location: SourceLocation,
    pub annotations: Vec<Annotation>,
}

pub type Stmt = Rc<StmtData>;

fn stmt(kind: StmtKind, location: SourceLocation) -> Stmt {
    Rc::new(StmtData {
        kind,
        location,
        annotations: Vec::new(),
    })
}

pub fn make_expr_stmt(e: Expr, location: SourceLocation) -> Stmt {
    stmt(StmtKind::ExprStmt(e), location)
}

pub fn make_return(value: Option<Expr>, location: SourceLocation) -> Stmt {
    stmt(StmtKind::Return(value), location)
}

pub fn make_break(location: SourceLocation) -> Stmt {
    stmt(StmtKind::Break, location)
}

pub fn make_continue(location: SourceLocation) -> Stmt {
    stmt(StmtKind::Continue, location)
}

#[allow(clippy::too_many_arguments)]
pub fn make_var_decl(
    name: NameId,
    declared_type: Option<Type>,
    is_mutable: bool,
    is_exported: bool,
    is_external: bool,
    init: Option<Expr>,
    annotations: Vec<Annotation>,
    location: SourceLocation,
) -> Stmt {
    Rc::new(StmtData {
        kind: StmtKind::VarDecl {
            name,
            declared_type,
            is_mutable,
            is_exported,
            is_external,
            init,
        },
        location,
        annotations,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn make_func_decl(
    name: NameId,
    params: Vec<Parameter>,
    return_type: Option<Type>,
    body: Option<Expr>,
    is_external: bool,
    is_exported: bool,
    annotations: Vec<Annotation>,
    location: SourceLocation,
) -> Stmt {
    Rc::new(StmtData {
        kind: StmtKind::FuncDecl {
            name,
            params,
            return_type,
            body,
            is_external,
            is_exported,
        },
        location,
        annotations,
    })
}

pub fn make_type_decl(name: NameId, fields: Vec<FieldDecl>, location: SourceLocation) -> Stmt {
    stmt(StmtKind::TypeDecl { name, fields }, location)
}

pub fn make_import(path: Vec<NameId>, location: SourceLocation) -> Stmt {
    stmt(StmtKind::Import { path }, location)
}

pub fn make_conditional_stmt(condition: Expr, then_block: Vec<Stmt>, else_block: Vec<Stmt>, location: SourceLocation) -> Stmt {
    stmt(
        StmtKind::ConditionalStmt {
            condition,
            then_block,
            else_block,
        },
        location,
    )
}

/// True iff `func` is generic: some parameter or return type is a type
/// variable, or mentions one (spec §4.2).
pub fn is_generic_function(params: &[Parameter], return_type: Option<&Type>) -> bool {
    params.iter().any(|p| type_mentions_typevar(&p.ty)) || return_type.is_some_and(type_mentions_typevar)
}

pub fn type_mentions_typevar(ty: &Type) -> bool {
    match &ty.kind {
        TypeKind::TypeVar(_) => true,
        TypeKind::Array { elem, .. } => type_mentions_typevar(elem),
        TypeKind::Primitive(_) | TypeKind::Named(_) | TypeKind::TypeOf(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.strata", 1, 1)
    }

    #[test]
    fn expr_key_is_stable_across_clones() {
        let e = make_int(1, "1", loc());
        let clone = Rc::clone(&e);
        assert_eq!(expr_key(&e), expr_key(&clone));
    }

    #[test]
    fn distinct_nodes_get_distinct_keys() {
        let a = make_int(1, "1", loc());
        let b = make_int(1, "1", loc());
        assert_ne!(expr_key(&a), expr_key(&b));
    }

    #[test]
    fn generic_detection_looks_inside_array_element_types() {
        let mut interner = crate::intern::Interner::new();
        let t_var = interner.intern("T");
        let array_of_t = make_array(make_typevar(t_var, loc()), make_uint(4, "4", loc()), loc());
        let params = vec![Parameter {
            name: interner.intern("x"),
            ty: array_of_t,
            is_ref: false,
            location: loc(),
        }];
        assert!(is_generic_function(&params, None));
    }

    #[test]
    fn non_generic_function_is_not_generic() {
        let mut interner = crate::intern::Interner::new();
        let params = vec![Parameter {
            name: interner.intern("x"),
            ty: make_primitive(PrimitiveType::Signed(32), loc()),
            is_ref: false,
            location: loc(),
        }];
        assert!(!is_generic_function(&params, None));
    }
}
