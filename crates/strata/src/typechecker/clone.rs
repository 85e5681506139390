//! Full-tree cloning with type-variable substitution, used to build a
//! monomorphized copy of a generic function (spec §4.2: "clones the
//! function AST, substitutes type variables").
//!
//! AST nodes are immutable `Rc`s (see `ast.rs`), so substitution can't
//! happen in place; every node on the path from the function's params/
//! return type/body down to any type-bearing leaf (`Cast`, nested function
//! signatures) is rebuilt. This is simpler than tracking which subtrees are
//! untouched and `Rc::clone`-sharing them, at the cost of allocating a full
//! copy per instantiation — acceptable since instantiations are created
//! once and cached by [`super::signature::TypeSignature`].

use ahash::AHashMap;

use crate::ast::*;
use crate::intern::NameId;

pub type Substitution = AHashMap<NameId, Type>;

pub fn substitute_type(ty: &Type, subst: &Substitution) -> Type {
    match &ty.kind {
        TypeKind::TypeVar(name) => subst.get(name).cloned().unwrap_or_else(|| ty.clone()),
        TypeKind::Primitive(_) | TypeKind::Named(_) => ty.clone(),
        TypeKind::Array { elem, size } => make_array(substitute_type(elem, subst), clone_expr(size, subst), ty.location.clone()),
        TypeKind::TypeOf(e) => make_typeof(clone_expr(e, subst), ty.location.clone()),
    }
}

fn clone_param(p: &Parameter, subst: &Substitution) -> Parameter {
    Parameter {
        name: p.name,
        ty: substitute_type(&p.ty, subst),
        is_ref: p.is_ref,
        location: p.location.clone(),
    }
}

pub fn clone_expr(expr: &Expr, subst: &Substitution) -> Expr {
    let kind = match &expr.kind {
        ExprKind::IntLiteral { value, raw } => ExprKind::IntLiteral { value: *value, raw: raw.clone() },
        ExprKind::UIntLiteral { value, raw } => ExprKind::UIntLiteral { value: *value, raw: raw.clone() },
        ExprKind::FloatLiteral { value, raw } => ExprKind::FloatLiteral { value: *value, raw: raw.clone() },
        ExprKind::CharLiteral { value } => ExprKind::CharLiteral { value: *value },
        ExprKind::StringLiteral { value } => ExprKind::StringLiteral { value: value.clone() },
        ExprKind::Identifier { name } => ExprKind::Identifier { name: *name },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: clone_expr(left, subst),
            right: clone_expr(right, subst),
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op: *op,
            operand: clone_expr(operand, subst),
        },
        ExprKind::Call { callee, args, receivers } => ExprKind::Call {
            callee: clone_expr(callee, subst),
            args: args.iter().map(|a| clone_expr(a, subst)).collect(),
            receivers: receivers.iter().map(|r| clone_expr(r, subst)).collect(),
        },
        ExprKind::Index { base, index } => ExprKind::Index {
            base: clone_expr(base, subst),
            index: clone_expr(index, subst),
        },
        ExprKind::Member { base, field } => ExprKind::Member {
            base: clone_expr(base, subst),
            field: *field,
        },
        ExprKind::ArrayLiteral { elements } => ExprKind::ArrayLiteral {
            elements: elements.iter().map(|e| clone_expr(e, subst)).collect(),
        },
        ExprKind::TupleLiteral { elements } => ExprKind::TupleLiteral {
            elements: elements.iter().map(|e| clone_expr(e, subst)).collect(),
        },
        ExprKind::Block { statements, result } => ExprKind::Block {
            statements: statements.iter().map(|s| clone_stmt(s, subst)).collect(),
            result: result.as_ref().map(|r| clone_expr(r, subst)),
        },
        ExprKind::Conditional { condition, true_expr, false_expr } => ExprKind::Conditional {
            condition: clone_expr(condition, subst),
            true_expr: clone_expr(true_expr, subst),
            false_expr: clone_expr(false_expr, subst),
        },
        ExprKind::Cast { target, operand } => ExprKind::Cast {
            target: substitute_type(target, subst),
            operand: clone_expr(operand, subst),
        },
        ExprKind::Assignment { lhs, rhs } => ExprKind::Assignment {
            lhs: clone_expr(lhs, subst),
            rhs: clone_expr(rhs, subst),
        },
        ExprKind::Range { start, end } => ExprKind::Range {
            start: clone_expr(start, subst),
            end: clone_expr(end, subst),
        },
        ExprKind::Length { operand } => ExprKind::Length {
            operand: clone_expr(operand, subst),
        },
        ExprKind::Iteration { subject, body, sorted } => ExprKind::Iteration {
            subject: clone_expr(subject, subst),
            body: clone_expr(body, subst),
            sorted: *sorted,
        },
        ExprKind::Repeat { condition, body } => ExprKind::Repeat {
            condition: clone_expr(condition, subst),
            body: clone_expr(body, subst),
        },
        ExprKind::ResourcePath { segments } => ExprKind::ResourcePath { segments: segments.clone() },
        ExprKind::Process { command } => ExprKind::Process { command: command.clone() },
    };
    std::rc::Rc::new(ExprData {
        kind,
        location: expr.location.clone(),
        annotations: expr.annotations.clone(),
    })
}

pub fn clone_stmt(stmt: &Stmt, subst: &Substitution) -> Stmt {
    let kind = match &stmt.kind {
        StmtKind::ExprStmt(e) => StmtKind::ExprStmt(clone_expr(e, subst)),
        StmtKind::Return(v) => StmtKind::Return(v.as_ref().map(|e| clone_expr(e, subst))),
        StmtKind::Break => StmtKind::Break,
        StmtKind::Continue => StmtKind::Continue,
        StmtKind::VarDecl {
            name,
            declared_type,
            is_mutable,
            is_exported,
            is_external,
            init,
        } => StmtKind::VarDecl {
            name: *name,
            declared_type: declared_type.as_ref().map(|t| substitute_type(t, subst)),
            is_mutable: *is_mutable,
            is_exported: *is_exported,
            is_external: *is_external,
            init: init.as_ref().map(|e| clone_expr(e, subst)),
        },
        StmtKind::FuncDecl {
            name,
            params,
            return_type,
            body,
            is_external,
            is_exported,
        } => StmtKind::FuncDecl {
            name: *name,
            params: params.iter().map(|p| clone_param(p, subst)).collect(),
            return_type: return_type.as_ref().map(|t| substitute_type(t, subst)),
            body: body.as_ref().map(|b| clone_expr(b, subst)),
            is_external: *is_external,
            is_exported: *is_exported,
        },
        StmtKind::TypeDecl { name, fields } => StmtKind::TypeDecl {
            name: *name,
            fields: fields
                .iter()
                .map(|f| FieldDecl {
                    name: f.name,
                    ty: substitute_type(&f.ty, subst),
                    location: f.location.clone(),
                })
                .collect(),
        },
        StmtKind::Import { path } => StmtKind::Import { path: path.clone() },
        StmtKind::ConditionalStmt { condition, then_block, else_block } => StmtKind::ConditionalStmt {
            condition: clone_expr(condition, subst),
            then_block: then_block.iter().map(|s| clone_stmt(s, subst)).collect(),
            else_block: else_block.iter().map(|s| clone_stmt(s, subst)).collect(),
        },
    };
    std::rc::Rc::new(StmtData {
        kind,
        location: stmt.location.clone(),
        annotations: stmt.annotations.clone(),
    })
}

/// Builds the substitution map for one instantiation: the generic
/// function's declared (param/return) type variables, positionally matched
/// against the concrete argument types a call site inferred.
pub fn build_substitution(params: &[Parameter], concrete: &[Type]) -> Substitution {
    let mut subst = Substitution::default();
    for (param, concrete_ty) in params.iter().zip(concrete) {
        collect_typevar_bindings(&param.ty, concrete_ty, &mut subst);
    }
    subst
}

fn collect_typevar_bindings(declared: &Type, concrete: &Type, out: &mut Substitution) {
    match (&declared.kind, &concrete.kind) {
        (TypeKind::TypeVar(name), _) => {
            out.entry(*name).or_insert_with(|| concrete.clone());
        }
        (TypeKind::Array { elem: e1, .. }, TypeKind::Array { elem: e2, .. }) => {
            collect_typevar_bindings(e1, e2, out);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PrimitiveType, make_primitive};
    use crate::common::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.strata", 1, 1)
    }

    #[test]
    fn substitutes_a_bare_typevar() {
        let mut interner = crate::intern::Interner::new();
        let t = interner.intern("T");
        let mut subst = Substitution::default();
        let u8_ty = make_primitive(PrimitiveType::Unsigned(8), loc());
        subst.insert(t, u8_ty.clone());
        let result = substitute_type(&make_typevar(t, loc()), &subst);
        assert_eq!(result, u8_ty);
    }

    #[test]
    fn substitutes_typevar_inside_array_element() {
        let mut interner = crate::intern::Interner::new();
        let t = interner.intern("T");
        let mut subst = Substitution::default();
        let i32_ty = make_primitive(PrimitiveType::Signed(32), loc());
        subst.insert(t, i32_ty.clone());
        let array_of_t = make_array(make_typevar(t, loc()), make_uint(4, "4", loc()), loc());
        let result = substitute_type(&array_of_t, &subst);
        let TypeKind::Array { elem, .. } = &result.kind else { unreachable!() };
        assert_eq!(**elem, *i32_ty);
    }

    #[test]
    fn build_substitution_matches_params_positionally() {
        let mut interner = crate::intern::Interner::new();
        let t = interner.intern("T");
        let x = interner.intern("x");
        let params = vec![Parameter {
            name: x,
            ty: make_typevar(t, loc()),
            is_ref: false,
            location: loc(),
        }];
        let u8_ty = make_primitive(PrimitiveType::Unsigned(8), loc());
        let subst = build_substitution(&params, &[u8_ty.clone()]);
        assert_eq!(subst.get(&t), Some(&u8_ty));
    }
}
