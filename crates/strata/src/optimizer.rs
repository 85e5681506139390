//! Walks every reachable expression, asking the compile-time evaluator
//! whether it folds, and caches what it learns for the residualizer to
//! consume. Runs once per `Program::instances` entry, threading each
//! instance's already-folded top-level constants forward as seed inputs so
//! later expressions in the same instance can reference them (mirrors
//! `optimizer.cpp`'s single forward pass over `mod.top_level`, generalized
//! from one shared module to one pass per importer since facts are recorded
//! per `(instance, node)`).
//!
//! A constant only ever gets seeded forward when it's immutable: a later
//! assignment to a mutable global would make seeding it unsound, and
//! "immutable and foldable" is exactly the `Constexpr` variable-mutability
//! category a later analysis pass assigns.

use ahash::{AHashMap, AHashSet};

use crate::ast::{Expr, ExprKind, Stmt, StmtKind, TypeKind, expr_key, stmt_key};
use crate::bindings::{Bindings, NodeFacts};
use crate::cte::{self, EvalOutcome};
use crate::cte::value::CTValue;
use crate::program::{InstanceId, Program};
use crate::symbols::SymbolId;

/// Per-expression and per-function compile-time facts.
#[derive(Debug, Default)]
pub struct OptimizationFacts {
    constexpr_values: NodeFacts<CTValue>,
    constexpr_inits: NodeFacts<bool>,
    constexpr_conditions: NodeFacts<bool>,
    foldable_functions: AHashSet<SymbolId>,
    fold_skip_reasons: AHashMap<SymbolId, String>,
}

impl OptimizationFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constexpr_value(&self, instance: InstanceId, expr: &Expr) -> Option<&CTValue> {
        self.constexpr_values.get(instance, expr_key(expr))
    }

    pub fn is_constexpr_init(&self, instance: InstanceId, stmt: &Stmt) -> bool {
        self.constexpr_inits.get(instance, stmt_key(stmt)).copied().unwrap_or(false)
    }

    /// Every `(instance, node)` pair recorded as a constexpr init, for
    /// `invariants::check_post_optimize` to confirm each still names a live
    /// `VarDecl` in the post-fixpoint tree.
    pub fn constexpr_init_keys(&self) -> impl Iterator<Item = (InstanceId, crate::ast::NodeKey)> + '_ {
        self.constexpr_inits.keys()
    }

    pub fn constexpr_condition(&self, instance: InstanceId, expr: &Expr) -> Option<bool> {
        self.constexpr_conditions.get(instance, expr_key(expr)).copied()
    }

    pub fn is_foldable_function(&self, sym: SymbolId) -> bool {
        self.foldable_functions.contains(&sym)
    }

    pub fn fold_skip_reason(&self, sym: SymbolId) -> Option<&str> {
        self.fold_skip_reasons.get(&sym).map(String::as_str)
    }
}

/// Runs the optimizer over every instance in `program`.
pub fn optimize(program: &Program, bindings: &Bindings) -> OptimizationFacts {
    let mut facts = OptimizationFacts::new();
    let instance_ids: Vec<InstanceId> = program.instances.iter().map(|i| i.id).collect();
    for instance in instance_ids {
        let module_id = program.instance(instance).expect("instance registered").module_id;
        let top_level = &program.module(module_id).expect("module registered").module.top_level;
        let mut seed: AHashMap<SymbolId, CTValue> = AHashMap::new();
        for stmt in top_level {
            visit_stmt(program, bindings, instance, &mut seed, &mut facts, stmt);
        }
    }
    facts
}

fn visit_stmt(
    program: &Program,
    bindings: &Bindings,
    instance: InstanceId,
    seed: &mut AHashMap<SymbolId, CTValue>,
    facts: &mut OptimizationFacts,
    stmt: &Stmt,
) {
    match &stmt.kind {
        StmtKind::FuncDecl { body, is_external, .. } => {
            if !*is_external {
                if let Some(body_expr) = body {
                    visit_expr(program, bindings, instance, seed, facts, body_expr);
                }
            }
        }
        StmtKind::VarDecl { is_mutable, init, .. } => {
            if let Some(init_expr) = init {
                mark_constexpr_init(program, bindings, instance, seed, facts, stmt, init_expr);
                visit_expr(program, bindings, instance, seed, facts, init_expr);
                if !*is_mutable && facts.is_constexpr_init(instance, stmt) {
                    if let (Some(sym), Some(value)) =
                        (bindings.lookup_stmt(instance, stmt), facts.constexpr_value(instance, init_expr))
                    {
                        seed.insert(sym, value.clone());
                    }
                }
            }
        }
        StmtKind::ExprStmt(e) => visit_expr(program, bindings, instance, seed, facts, e),
        StmtKind::Return(Some(e)) => visit_expr(program, bindings, instance, seed, facts, e),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Import { .. } | StmtKind::TypeDecl { .. } => {}
        StmtKind::ConditionalStmt { condition, then_block, else_block } => {
            visit_expr(program, bindings, instance, seed, facts, condition);
            record_constexpr_condition(instance, facts, condition);
            for s in then_block {
                visit_stmt(program, bindings, instance, seed, facts, s);
            }
            for s in else_block {
                visit_stmt(program, bindings, instance, seed, facts, s);
            }
        }
    }
}

/// A `VarDecl`'s initializer is a constexpr init either structurally (an
/// array-typed declaration initialized from an array literal or a range —
/// every element is a literal by construction, no evaluation needed) or
/// because it actually folds to a `CTValue`.
fn mark_constexpr_init(
    program: &Program,
    bindings: &Bindings,
    instance: InstanceId,
    seed: &AHashMap<SymbolId, CTValue>,
    facts: &mut OptimizationFacts,
    stmt: &Stmt,
    init: &Expr,
) {
    let StmtKind::VarDecl { declared_type, .. } = &stmt.kind else {
        return;
    };
    if let Some(ty) = declared_type {
        if matches!(&ty.kind, TypeKind::Array { .. }) && matches!(&init.kind, ExprKind::ArrayLiteral { .. } | ExprKind::Range { .. }) {
            facts.constexpr_inits.set(instance, stmt_key(stmt), true);
            return;
        }
    }
    if let EvalOutcome::Known(value) = cte::evaluate_outcome_seeded(program, bindings, instance, init, seed) {
        facts.constexpr_inits.set(instance, stmt_key(stmt), true);
        facts.constexpr_values.set(instance, expr_key(init), value);
    }
}

fn record_constexpr_condition(instance: InstanceId, facts: &mut OptimizationFacts, condition: &Expr) {
    if let Some(b) = facts.constexpr_value(instance, condition).and_then(CTValue::as_bool) {
        facts.constexpr_conditions.set(instance, expr_key(condition), b);
    }
}

fn visit_expr(
    program: &Program,
    bindings: &Bindings,
    instance: InstanceId,
    seed: &mut AHashMap<SymbolId, CTValue>,
    facts: &mut OptimizationFacts,
    expr: &Expr,
) {
    if !facts.constexpr_values.contains(instance, expr_key(expr)) {
        match cte::evaluate_outcome_seeded(program, bindings, instance, expr, seed) {
            EvalOutcome::Known(value) => {
                facts.constexpr_values.set(instance, expr_key(expr), value);
            }
            EvalOutcome::Unknown => {}
            EvalOutcome::Impure { reason } => {
                if let ExprKind::Call { callee, .. } = &expr.kind {
                    if let Some(sym) = bindings.lookup_expr(instance, callee) {
                        facts.fold_skip_reasons.insert(sym, reason);
                    }
                }
            }
        }
    }

    if let ExprKind::Call { callee, .. } = &expr.kind {
        if facts.constexpr_values.contains(instance, expr_key(expr)) {
            if let Some(sym) = bindings.lookup_expr(instance, callee) {
                facts.foldable_functions.insert(sym);
            }
        }
    }

    match &expr.kind {
        ExprKind::IntLiteral { .. }
        | ExprKind::UIntLiteral { .. }
        | ExprKind::FloatLiteral { .. }
        | ExprKind::CharLiteral { .. }
        | ExprKind::StringLiteral { .. }
        | ExprKind::Identifier { .. }
        | ExprKind::ResourcePath { .. }
        | ExprKind::Process { .. } => {}
        ExprKind::Binary { left, right, .. } | ExprKind::Assignment { lhs: left, rhs: right } | ExprKind::Range { start: left, end: right } => {
            visit_expr(program, bindings, instance, seed, facts, left);
            visit_expr(program, bindings, instance, seed, facts, right);
        }
        ExprKind::Unary { operand, .. }
        | ExprKind::Cast { operand, .. }
        | ExprKind::Length { operand }
        | ExprKind::Member { base: operand, .. } => {
            visit_expr(program, bindings, instance, seed, facts, operand);
        }
        ExprKind::Call { callee, args, receivers } => {
            visit_expr(program, bindings, instance, seed, facts, callee);
            for r in receivers {
                visit_expr(program, bindings, instance, seed, facts, r);
            }
            for a in args {
                visit_expr(program, bindings, instance, seed, facts, a);
            }
        }
        ExprKind::Index { base, index } => {
            visit_expr(program, bindings, instance, seed, facts, base);
            visit_expr(program, bindings, instance, seed, facts, index);
        }
        ExprKind::ArrayLiteral { elements } | ExprKind::TupleLiteral { elements } => {
            for e in elements {
                visit_expr(program, bindings, instance, seed, facts, e);
            }
        }
        ExprKind::Block { statements, result } => {
            for s in statements {
                visit_stmt(program, bindings, instance, seed, facts, s);
            }
            if let Some(r) = result {
                visit_expr(program, bindings, instance, seed, facts, r);
            }
        }
        ExprKind::Conditional { condition, true_expr, false_expr } => {
            visit_expr(program, bindings, instance, seed, facts, condition);
            record_constexpr_condition(instance, facts, condition);
            visit_expr(program, bindings, instance, seed, facts, true_expr);
            visit_expr(program, bindings, instance, seed, facts, false_expr);
        }
        ExprKind::Iteration { subject, body, .. } => {
            visit_expr(program, bindings, instance, seed, facts, subject);
            visit_expr(program, bindings, instance, seed, facts, body);
        }
        ExprKind::Repeat { condition, body } => {
            visit_expr(program, bindings, instance, seed, facts, condition);
            visit_expr(program, bindings, instance, seed, facts, body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::common::SourceLocation;
    use crate::program::{Module, Program};
    use crate::symbols::{Symbol, SymbolKind};

    fn loc() -> SourceLocation {
        SourceLocation::new("t.strata", 1, 1)
    }

    fn one_instance(top_level: Vec<Stmt>) -> (Program, InstanceId) {
        let mut program = Program::new();
        let module_id = program.add_module("t.strata", Module { top_level });
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);
        (program, instance)
    }

    #[test]
    fn arithmetic_on_literals_folds_to_a_known_value() {
        let expr = make_binary(BinOp::Add, make_int(1, "1", loc()), make_int(2, "2", loc()), loc());
        let stmt = make_expr_stmt(expr.clone(), loc());
        let (program, instance) = one_instance(vec![stmt]);
        let bindings = Bindings::new();

        let facts = optimize(&program, &bindings);
        assert_eq!(facts.constexpr_value(instance, &expr), Some(&CTValue::Int(3)));
    }

    #[test]
    fn process_expression_never_folds() {
        let process = make_process("build", loc());
        let stmt = make_expr_stmt(process.clone(), loc());
        let (program, instance) = one_instance(vec![stmt]);
        let bindings = Bindings::new();

        let facts = optimize(&program, &bindings);
        assert!(facts.constexpr_value(instance, &process).is_none());
    }

    #[test]
    fn conditional_with_a_folding_test_records_its_branch() {
        let cond = make_int(1, "1", loc());
        let then_e = make_int(10, "10", loc());
        let else_e = make_int(20, "20", loc());
        let conditional = make_conditional(cond.clone(), then_e, else_e, loc());
        let stmt = make_expr_stmt(conditional, loc());
        let (program, instance) = one_instance(vec![stmt]);
        let bindings = Bindings::new();

        let facts = optimize(&program, &bindings);
        assert_eq!(facts.constexpr_condition(instance, &cond), Some(true));
    }

    #[test]
    fn immutable_global_constant_seeds_later_top_level_expressions() {
        let mut program = Program::new();
        let name = program.interner.intern("k");
        let const_decl = make_var_decl(name, None, false, false, false, Some(make_int(7, "7", loc())), vec![], loc());
        let reader = make_identifier(name, loc());
        let reader_stmt = make_expr_stmt(reader.clone(), loc());
        let module_id = program.add_module("t.strata", Module { top_level: vec![const_decl.clone(), reader_stmt] });
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);

        let mut bindings = Bindings::new();
        let sym = program.symbols.alloc(Symbol {
            kind: SymbolKind::Variable,
            name,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            is_local: false,
            declaration: const_decl.clone(),
            module_id,
            instance_id: instance,
            reentrancy_annotation: None,
        });
        bindings.bind_stmt(instance, &const_decl, sym);
        bindings.bind_expr(instance, &reader, sym);

        let facts = optimize(&program, &bindings);
        assert_eq!(facts.constexpr_value(instance, &reader), Some(&CTValue::Int(7)));
    }

    #[test]
    fn mutable_global_is_never_seeded_even_if_its_initializer_folds() {
        let mut program = Program::new();
        let name = program.interner.intern("k");
        let mutable_decl = make_var_decl(name, None, true, false, false, Some(make_int(7, "7", loc())), vec![], loc());
        let reader = make_identifier(name, loc());
        let reader_stmt = make_expr_stmt(reader.clone(), loc());
        let module_id = program.add_module("t.strata", Module { top_level: vec![mutable_decl.clone(), reader_stmt] });
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);

        let mut bindings = Bindings::new();
        let sym = program.symbols.alloc(Symbol {
            kind: SymbolKind::Variable,
            name,
            ty: None,
            is_mutable: true,
            is_external: false,
            is_exported: false,
            is_local: false,
            declaration: mutable_decl.clone(),
            module_id,
            instance_id: instance,
            reentrancy_annotation: None,
        });
        bindings.bind_stmt(instance, &mutable_decl, sym);
        bindings.bind_expr(instance, &reader, sym);

        let facts = optimize(&program, &bindings);
        assert!(facts.is_constexpr_init(instance, &mutable_decl));
        assert!(facts.constexpr_value(instance, &reader).is_none());
    }

    #[test]
    fn array_literal_initializer_is_a_structural_constexpr_init_without_evaluation() {
        let elem_ty = make_primitive(PrimitiveType::Unsigned(8), loc());
        let arr_ty = make_array(elem_ty, make_uint(2, "2", loc()), loc());
        let name_src = "arr";
        let mut program = Program::new();
        let name = program.interner.intern(name_src);
        let init = make_array_literal(vec![make_uint(1, "1", loc()), make_uint(2, "2", loc())], loc());
        let decl = make_var_decl(name, Some(arr_ty), false, false, false, Some(init), vec![], loc());
        let (program, instance) = {
            let module_id = program.add_module("t.strata", Module { top_level: vec![decl.clone()] });
            let scope = program.scopes.push(None);
            let instance = program.add_instance(module_id, scope);
            (program, instance)
        };
        let bindings = Bindings::new();

        let facts = optimize(&program, &bindings);
        assert!(facts.is_constexpr_init(instance, &decl));
    }
}
