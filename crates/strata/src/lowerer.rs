//! Pure canonicalization pass (§4.4): wraps bare loop bodies in a block,
//! recursively lowers sub-expressions, and otherwise leaves the tree (and
//! every type) untouched.
//!
//! Runs once per module, after monomorphization has spliced in every
//! generic instantiation a call site needs, so the lowerer sees the final,
//! concrete set of declarations each module will keep.
//!
//! Nodes are `Rc`-shared and `Bindings`/`OptimizationFacts` key off their
//! pointer identity (`NodeKey`), recorded by the resolver and type checker
//! *before* this pass runs. Rebuilding a node unconditionally — even one
//! whose children didn't actually change — would silently orphan every fact
//! recorded about it and anything beneath it. Every `lower_*` function here
//! therefore returns the original `Rc::clone` when nothing below a node
//! changed, and only allocates a fresh node along the path that actually
//! did (the loop-body wrap, ultimately).

use std::rc::Rc;

use crate::ast::{self, Expr, ExprKind, Stmt, StmtKind};
use crate::program::Program;

/// Lowers every module's top-level statements in place.
pub fn lower(program: &mut Program) {
    for module in &mut program.modules {
        module.module.top_level = module.module.top_level.iter().map(|s| lower_stmt(s)).collect();
    }
}

fn rebuild_stmt(original: &Stmt, kind: StmtKind) -> Stmt {
    Rc::new(ast::StmtData {
        kind,
        location: original.location.clone(),
        annotations: original.annotations.clone(),
    })
}

fn rebuild_expr(original: &Expr, kind: ExprKind) -> Expr {
    Rc::new(ast::ExprData {
        kind,
        location: original.location.clone(),
        annotations: original.annotations.clone(),
    })
}

fn lower_stmt(stmt: &Stmt) -> Stmt {
    match &stmt.kind {
        StmtKind::ExprStmt(e) => {
            let new_e = lower_expr(e);
            if Rc::ptr_eq(&new_e, e) {
                return Rc::clone(stmt);
            }
            rebuild_stmt(stmt, StmtKind::ExprStmt(new_e))
        }
        StmtKind::Return(v) => {
            let new_v = v.as_ref().map(lower_expr);
            if same_opt(&new_v, v) {
                return Rc::clone(stmt);
            }
            rebuild_stmt(stmt, StmtKind::Return(new_v))
        }
        StmtKind::Break | StmtKind::Continue | StmtKind::TypeDecl { .. } | StmtKind::Import { .. } => Rc::clone(stmt),
        StmtKind::VarDecl {
            name,
            declared_type,
            is_mutable,
            is_exported,
            is_external,
            init,
        } => {
            let new_init = init.as_ref().map(lower_expr);
            if same_opt(&new_init, init) {
                return Rc::clone(stmt);
            }
            rebuild_stmt(
                stmt,
                StmtKind::VarDecl {
                    name: *name,
                    declared_type: declared_type.clone(),
                    is_mutable: *is_mutable,
                    is_exported: *is_exported,
                    is_external: *is_external,
                    init: new_init,
                },
            )
        }
        StmtKind::FuncDecl {
            name,
            params,
            return_type,
            body,
            is_external,
            is_exported,
        } => {
            let new_body = body.as_ref().map(lower_expr);
            if same_opt(&new_body, body) {
                return Rc::clone(stmt);
            }
            rebuild_stmt(
                stmt,
                StmtKind::FuncDecl {
                    name: *name,
                    params: params.clone(),
                    return_type: return_type.clone(),
                    body: new_body,
                    is_external: *is_external,
                    is_exported: *is_exported,
                },
            )
        }
        StmtKind::ConditionalStmt { condition, then_block, else_block } => {
            let new_cond = lower_expr(condition);
            let new_then = lower_stmt_list(then_block);
            let new_else = lower_stmt_list(else_block);
            if Rc::ptr_eq(&new_cond, condition) && same_stmt_list(&new_then, then_block) && same_stmt_list(&new_else, else_block) {
                return Rc::clone(stmt);
            }
            rebuild_stmt(
                stmt,
                StmtKind::ConditionalStmt {
                    condition: new_cond,
                    then_block: new_then,
                    else_block: new_else,
                },
            )
        }
    }
}

fn lower_stmt_list(stmts: &[Stmt]) -> Vec<Stmt> {
    stmts.iter().map(lower_stmt).collect()
}

fn same_stmt_list(new: &[Stmt], original: &[Stmt]) -> bool {
    new.len() == original.len() && new.iter().zip(original).all(|(a, b)| Rc::ptr_eq(a, b))
}

fn same_opt(new: &Option<Expr>, original: &Option<Expr>) -> bool {
    match (new, original) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn lower_expr(expr: &Expr) -> Expr {
    match &expr.kind {
        ExprKind::IntLiteral { .. }
        | ExprKind::UIntLiteral { .. }
        | ExprKind::FloatLiteral { .. }
        | ExprKind::CharLiteral { .. }
        | ExprKind::StringLiteral { .. }
        | ExprKind::Identifier { .. }
        | ExprKind::ResourcePath { .. }
        | ExprKind::Process { .. } => Rc::clone(expr),

        ExprKind::Binary { op, left, right } => {
            let new_left = lower_expr(left);
            let new_right = lower_expr(right);
            if Rc::ptr_eq(&new_left, left) && Rc::ptr_eq(&new_right, right) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Binary { op: *op, left: new_left, right: new_right })
        }
        ExprKind::Assignment { lhs, rhs } => {
            let new_lhs = lower_expr(lhs);
            let new_rhs = lower_expr(rhs);
            if Rc::ptr_eq(&new_lhs, lhs) && Rc::ptr_eq(&new_rhs, rhs) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Assignment { lhs: new_lhs, rhs: new_rhs })
        }
        ExprKind::Range { start, end } => {
            let new_start = lower_expr(start);
            let new_end = lower_expr(end);
            if Rc::ptr_eq(&new_start, start) && Rc::ptr_eq(&new_end, end) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Range { start: new_start, end: new_end })
        }
        ExprKind::Unary { op, operand } => {
            let new_operand = lower_expr(operand);
            if Rc::ptr_eq(&new_operand, operand) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Unary { op: *op, operand: new_operand })
        }
        ExprKind::Cast { target, operand } => {
            let new_operand = lower_expr(operand);
            if Rc::ptr_eq(&new_operand, operand) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Cast { target: target.clone(), operand: new_operand })
        }
        ExprKind::Length { operand } => {
            let new_operand = lower_expr(operand);
            if Rc::ptr_eq(&new_operand, operand) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Length { operand: new_operand })
        }
        ExprKind::Member { base, field } => {
            let new_base = lower_expr(base);
            if Rc::ptr_eq(&new_base, base) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Member { base: new_base, field: *field })
        }
        ExprKind::Call { callee, args, receivers } => {
            let new_callee = lower_expr(callee);
            let new_args: Vec<Expr> = args.iter().map(lower_expr).collect();
            let new_receivers: Vec<Expr> = receivers.iter().map(lower_expr).collect();
            if Rc::ptr_eq(&new_callee, callee) && same_expr_list(&new_args, args) && same_expr_list(&new_receivers, receivers) {
                return Rc::clone(expr);
            }
            rebuild_expr(
                expr,
                ExprKind::Call {
                    callee: new_callee,
                    args: new_args,
                    receivers: new_receivers,
                },
            )
        }
        ExprKind::Index { base, index } => {
            let new_base = lower_expr(base);
            let new_index = lower_expr(index);
            if Rc::ptr_eq(&new_base, base) && Rc::ptr_eq(&new_index, index) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Index { base: new_base, index: new_index })
        }
        ExprKind::ArrayLiteral { elements } => {
            let new_elements: Vec<Expr> = elements.iter().map(lower_expr).collect();
            if same_expr_list(&new_elements, elements) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::ArrayLiteral { elements: new_elements })
        }
        ExprKind::TupleLiteral { elements } => {
            let new_elements: Vec<Expr> = elements.iter().map(lower_expr).collect();
            if same_expr_list(&new_elements, elements) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::TupleLiteral { elements: new_elements })
        }
        ExprKind::Block { statements, result } => {
            let new_statements = lower_stmt_list(statements);
            let new_result = result.as_ref().map(lower_expr);
            if same_stmt_list(&new_statements, statements) && same_opt(&new_result, result) {
                return Rc::clone(expr);
            }
            rebuild_expr(
                expr,
                ExprKind::Block {
                    statements: new_statements,
                    result: new_result,
                },
            )
        }
        ExprKind::Conditional { condition, true_expr, false_expr } => {
            let new_condition = lower_expr(condition);
            let new_true = lower_expr(true_expr);
            let new_false = lower_expr(false_expr);
            if Rc::ptr_eq(&new_condition, condition) && Rc::ptr_eq(&new_true, true_expr) && Rc::ptr_eq(&new_false, false_expr) {
                return Rc::clone(expr);
            }
            rebuild_expr(
                expr,
                ExprKind::Conditional {
                    condition: new_condition,
                    true_expr: new_true,
                    false_expr: new_false,
                },
            )
        }
        ExprKind::Iteration { subject, body, sorted } => {
            let new_subject = lower_expr(subject);
            let new_body = wrap_in_block(lower_expr(body));
            if Rc::ptr_eq(&new_subject, subject) && Rc::ptr_eq(&new_body, body) {
                return Rc::clone(expr);
            }
            rebuild_expr(
                expr,
                ExprKind::Iteration {
                    subject: new_subject,
                    body: new_body,
                    sorted: *sorted,
                },
            )
        }
        ExprKind::Repeat { condition, body } => {
            let new_condition = lower_expr(condition);
            let new_body = wrap_in_block(lower_expr(body));
            if Rc::ptr_eq(&new_condition, condition) && Rc::ptr_eq(&new_body, body) {
                return Rc::clone(expr);
            }
            rebuild_expr(expr, ExprKind::Repeat { condition: new_condition, body: new_body })
        }
    }
}

fn same_expr_list(new: &[Expr], original: &[Expr]) -> bool {
    new.len() == original.len() && new.iter().zip(original).all(|(a, b)| Rc::ptr_eq(a, b))
}

/// Wraps a loop body in a block statement unless it already is one (§4.4:
/// "Loop bodies are wrapped in a block statement if they are not already.").
fn wrap_in_block(body: Expr) -> Expr {
    if matches!(body.kind, ExprKind::Block { .. }) {
        return body;
    }
    let location = body.location.clone();
    ast::make_block(vec![], Some(body), location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::common::SourceLocation;
    use crate::program::{Module, Program};

    fn loc() -> SourceLocation {
        SourceLocation::new("t.strata", 1, 1)
    }

    #[test]
    fn bare_iteration_body_is_wrapped_in_a_block() {
        let mut program = Program::new();
        let x = program.interner.intern("x");
        let subject = make_identifier(x, loc());
        let body = make_identifier(x, loc());
        let iteration = make_iteration(subject, body, false, loc());
        let stmt = make_expr_stmt(iteration, loc());
        let module_id = program.add_module("t.strata", Module { top_level: vec![stmt] });

        lower(&mut program);

        let StmtKind::ExprStmt(lowered) = &program.module(module_id).unwrap().module.top_level[0].kind else {
            panic!("expected an expr statement");
        };
        let ExprKind::Iteration { body, .. } = &lowered.kind else {
            panic!("expected an iteration expression");
        };
        assert!(matches!(body.kind, ExprKind::Block { .. }));
    }

    #[test]
    fn block_bodied_loop_is_left_alone() {
        let mut program = Program::new();
        let x = program.interner.intern("x");
        let cond = make_identifier(x, loc());
        let body = make_block(vec![make_expr_stmt(make_identifier(x, loc()), loc())], None, loc());
        let repeat = make_repeat(cond, body, loc());
        let stmt = make_expr_stmt(repeat, loc());
        let module_id = program.add_module("t.strata", Module { top_level: vec![stmt] });

        lower(&mut program);

        let StmtKind::ExprStmt(lowered) = &program.module(module_id).unwrap().module.top_level[0].kind else {
            panic!("expected an expr statement");
        };
        let ExprKind::Repeat { body, .. } = &lowered.kind else {
            panic!("expected a repeat expression");
        };
        let ExprKind::Block { statements, .. } = &body.kind else {
            panic!("expected the original block to survive unwrapped");
        };
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn nested_sub_expressions_are_lowered_recursively() {
        let mut program = Program::new();
        let x = program.interner.intern("x");
        let inner_body = make_identifier(x, loc());
        let inner_repeat = make_repeat(make_identifier(x, loc()), inner_body, loc());
        let outer_body = make_block(vec![make_expr_stmt(inner_repeat, loc())], None, loc());
        let outer_repeat = make_repeat(make_identifier(x, loc()), outer_body, loc());
        let stmt = make_expr_stmt(outer_repeat, loc());
        let module_id = program.add_module("t.strata", Module { top_level: vec![stmt] });

        lower(&mut program);

        let StmtKind::ExprStmt(lowered) = &program.module(module_id).unwrap().module.top_level[0].kind else {
            panic!("expected an expr statement");
        };
        let ExprKind::Repeat { body: outer_block, .. } = &lowered.kind else {
            panic!("expected a repeat expression");
        };
        let ExprKind::Block { statements, .. } = &outer_block.kind else {
            panic!("expected the outer block to survive");
        };
        let StmtKind::ExprStmt(inner) = &statements[0].kind else {
            panic!("expected the inner expr statement");
        };
        let ExprKind::Repeat { body: inner_block, .. } = &inner.kind else {
            panic!("expected the inner repeat");
        };
        assert!(matches!(inner_block.kind, ExprKind::Block { .. }));
    }

    #[test]
    fn an_already_lowered_subtree_keeps_its_node_identity() {
        // Identity preservation matters downstream: `Bindings`/`OptimizationFacts`
        // are keyed by `Rc` pointer, recorded against the pre-lowering nodes.
        let mut program = Program::new();
        let x = program.interner.intern("x");
        let ident = make_identifier(x, loc());
        let stmt = make_expr_stmt(ident.clone(), loc());
        let module_id = program.add_module("t.strata", Module { top_level: vec![stmt] });

        lower(&mut program);

        let StmtKind::ExprStmt(lowered) = &program.module(module_id).unwrap().module.top_level[0].kind else {
            panic!("expected an expr statement");
        };
        assert!(Rc::ptr_eq(lowered, &ident));
    }
}
