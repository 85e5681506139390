//! Six whole-program analysis passes run once the optimizer/residualizer
//! fixpoint has settled on a final tree (spec §4.7): reachability,
//! reentrancy, mutability, ref-variant call-site masks, effects
//! (purity/global-write), and usage (the set of globals and named types a
//! backend must still emit).
//!
//! Mirrors `optimizer.rs`'s `OptimizationFacts`/`optimize()` shape: one
//! `AnalysisFacts` result struct, a single [`analyze`] entry point, private
//! per-pass functions. Facts here are keyed by `SymbolId` — reachability,
//! mutability, purity, and so on are properties of a *declaration* — whereas
//! `Bindings`/`OptimizationFacts` key by `NodeKey`, a property of a single
//! *expression occurrence*. A declaration's `SymbolId` already carries its
//! owning `ModuleId`/`InstanceId` (`symbols::Symbol`), so unlike the
//! optimizer/residualizer passes, analysis facts need no `(instance, key)`
//! pair: the id alone is globally unique.
//!
//! Passes are gated by the [`AnalysisPass`] bitmask on [`AnalysisConfig`],
//! and reentrancy's entry/exit context at a module boundary is resolved
//! through a pluggable `reentrancy_mode_for_boundary` hook rather than this
//! module reading `[[reentrant]]`/`[[nonreentrant]]` annotations itself, so a
//! driver can override context at linkage boundaries without this module
//! knowing about linkage at all. `pipeline::compile` is the one caller that
//! matters in practice: it builds the hook from each symbol's own annotation
//! (recorded on `Symbol::reentrancy_annotation` by the type checker) whenever
//! a caller leaves the hook unset, so real annotated source is enforced
//! through the crate's public API without every caller hand-building one.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use bitflags::bitflags;

use crate::ast::{Expr, ExprKind, Stmt, StmtKind, Type, TypeKind};
use crate::bindings::Bindings;
use crate::common::{CompileError, CompileResult};
use crate::intern::NameId;
use crate::optimizer::OptimizationFacts;
use crate::program::{InstanceId, Program};
use crate::symbols::{SymbolId, SymbolKind};

bitflags! {
    /// Which of the six passes `analyze` runs (spec §4.7 "gated by a
    /// bitmask").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AnalysisPass: u32 {
        const REACHABILITY = 1 << 0;
        const REENTRANCY    = 1 << 1;
        const MUTABILITY    = 1 << 2;
        const REF_VARIANTS  = 1 << 3;
        const EFFECTS       = 1 << 4;
        const USAGE         = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReentrancyBoundaryKind {
    EntryPoint,
    ExitPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReentrancyMode {
    Default,
    Reentrant,
    NonReentrant,
}

/// Per-symbol write/fold status a variable ends up in once reachability and
/// mutability have both settled (spec §4.7 pass C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VarMutability {
    Mutable,
    NonMutableRuntime,
    Constexpr,
}

/// Gates which passes run and how reentrancy context is assigned at a
/// module's entry/exit boundary.
pub struct AnalysisConfig {
    pub enabled_passes: AnalysisPass,
    pub default_entry_context: char,
    pub default_exit_context: char,
    pub reentrancy_mode_for_boundary: Option<Box<dyn Fn(SymbolId, ReentrancyBoundaryKind) -> ReentrancyMode>>,
}

impl std::fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("enabled_passes", &self.enabled_passes)
            .field("default_entry_context", &self.default_entry_context)
            .field("default_exit_context", &self.default_exit_context)
            .field("reentrancy_mode_for_boundary", &self.reentrancy_mode_for_boundary.is_some())
            .finish()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled_passes: AnalysisPass::all(),
            default_entry_context: 'R',
            default_exit_context: 'R',
            reentrancy_mode_for_boundary: None,
        }
    }
}

/// The result of a complete analysis run (spec §4.7).
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisFacts {
    pub reachable_functions: AHashSet<SymbolId>,
    pub var_mutability: AHashMap<SymbolId, VarMutability>,
    pub receiver_mutates: AHashMap<SymbolId, Vec<bool>>,
    /// Per call site at a reachable call, an `M`/`N` mask over that
    /// function's ref parameters (`M` = this call passes a mutable lvalue),
    /// deduped into the set of distinct masks a function is ever called
    /// with.
    pub ref_variants: AHashMap<SymbolId, AHashSet<String>>,
    pub function_writes_global: AHashMap<SymbolId, bool>,
    pub function_is_pure: AHashMap<SymbolId, bool>,
    pub used_global_vars: AHashSet<SymbolId>,
    pub used_type_names: AHashSet<NameId>,
    pub reentrancy_variants: AHashMap<SymbolId, AHashSet<char>>,
}

/// Scratch data computed once after reachability and reused by passes B–F
/// (SPEC_FULL.md supplement 3), so they don't each re-walk the call graph.
#[derive(Debug, Default)]
struct RunSummary {
    reachable_function_decls: AHashMap<SymbolId, Stmt>,
    reachable_calls: AHashMap<SymbolId, AHashSet<SymbolId>>,
    runtime_initialized_globals: AHashSet<SymbolId>,
    global_initializer_calls: AHashMap<SymbolId, AHashSet<SymbolId>>,
}

struct Ctx<'a> {
    program: &'a Program,
    bindings: &'a Bindings,
    optimization: &'a OptimizationFacts,
    config: &'a AnalysisConfig,
}

impl Ctx<'_> {
    fn pass_enabled(&self, pass: AnalysisPass) -> bool {
        self.config.enabled_passes.contains(pass)
    }

    /// A global's initializer still has to run at runtime unless the
    /// optimizer already folded it to a known `CTValue`.
    fn global_initializer_runs_at_runtime(&self, instance: InstanceId, init: &Expr) -> bool {
        self.optimization.constexpr_value(instance, init).is_none()
    }

    fn binding_for(&self, instance: InstanceId, expr: &Expr) -> Option<SymbolId> {
        self.bindings.lookup_expr(instance, expr)
    }

    fn is_foldable(&self, sym: SymbolId) -> bool {
        self.optimization.is_foldable_function(sym)
    }
}

fn is_addressable_lvalue(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Identifier { .. } => true,
        ExprKind::Member { base, .. } | ExprKind::Index { base, .. } => is_addressable_lvalue(base),
        _ => false,
    }
}

fn is_mutable_lvalue(ctx: &Ctx, instance: InstanceId, expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Identifier { .. } => ctx
            .binding_for(instance, expr)
            .is_some_and(|sym| ctx.program.symbols.get(sym).is_mutable),
        ExprKind::Member { base, .. } | ExprKind::Index { base, .. } => is_mutable_lvalue(ctx, instance, base),
        _ => false,
    }
}

fn receiver_is_mutable_arg(ctx: &Ctx, instance: InstanceId, expr: &Expr) -> bool {
    is_addressable_lvalue(expr) && is_mutable_lvalue(ctx, instance, expr)
}

/// Walks through `Member`/`Index` base chains down to the root `Identifier`
/// and resolves its symbol.
fn base_identifier_symbol(ctx: &Ctx, instance: InstanceId, expr: &Expr) -> Option<SymbolId> {
    match &expr.kind {
        ExprKind::Identifier { .. } => ctx.binding_for(instance, expr),
        ExprKind::Member { base, .. } | ExprKind::Index { base, .. } => base_identifier_symbol(ctx, instance, base),
        _ => None,
    }
}

/// One node handed to a walk's visitor callback. A single callback (rather
/// than one per node kind) so a visitor only ever needs one capture of its
/// mutable state — two sibling closures passed into the same walk call would
/// each need their own exclusive borrow of that state, which the borrow
/// checker rejects the moment both need to mutate the same fact table.
enum Visit<'e> {
    Expr(&'e Expr),
    Stmt(&'e Stmt),
}

/// Visits every expression/statement reachable from `expr`, pruning the
/// branch a `Conditional`'s `constexpr_condition` rules out (SPEC_FULL.md
/// supplement 4). Used wherever visiting a residualizer-doomed dead branch
/// would double-count a fact (reachability, mutability, effects,
/// ref-variants).
fn walk_pruned_expr(ctx: &Ctx, instance: InstanceId, expr: &Expr, visit: &mut impl FnMut(Visit)) {
    visit(Visit::Expr(expr));

    if let ExprKind::Conditional { condition, true_expr, false_expr } = &expr.kind {
        match ctx.optimization.constexpr_condition(instance, condition) {
            Some(true) => walk_pruned_expr(ctx, instance, true_expr, visit),
            Some(false) => walk_pruned_expr(ctx, instance, false_expr, visit),
            None => {
                walk_pruned_expr(ctx, instance, condition, visit);
                walk_pruned_expr(ctx, instance, true_expr, visit);
                walk_pruned_expr(ctx, instance, false_expr, visit);
            }
        }
        return;
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
            walk_pruned_expr(ctx, instance, left, visit);
            walk_pruned_expr(ctx, instance, right, visit);
        }
        ExprKind::Unary { operand, .. }
        | ExprKind::Cast { operand, .. }
        | ExprKind::Length { operand }
        | ExprKind::Member { base: operand, .. } => {
            walk_pruned_expr(ctx, instance, operand, visit);
        }
        ExprKind::Call { callee, args, receivers } => {
            walk_pruned_expr(ctx, instance, callee, visit);
            for r in receivers {
                walk_pruned_expr(ctx, instance, r, visit);
            }
            for a in args {
                walk_pruned_expr(ctx, instance, a, visit);
            }
        }
        ExprKind::Index { base, index } => {
            walk_pruned_expr(ctx, instance, base, visit);
            walk_pruned_expr(ctx, instance, index, visit);
        }
        ExprKind::ArrayLiteral { elements } | ExprKind::TupleLiteral { elements } => {
            for e in elements {
                walk_pruned_expr(ctx, instance, e, visit);
            }
        }
        ExprKind::Block { statements, result } => {
            for s in statements {
                walk_pruned_stmt(ctx, instance, s, visit);
            }
            if let Some(r) = result {
                walk_pruned_expr(ctx, instance, r, visit);
            }
        }
        ExprKind::Conditional { .. } => unreachable!("handled above"),
        ExprKind::Iteration { subject, body, .. } => {
            walk_pruned_expr(ctx, instance, subject, visit);
            walk_pruned_expr(ctx, instance, body, visit);
        }
        ExprKind::Repeat { condition, body } => {
            walk_pruned_expr(ctx, instance, condition, visit);
            walk_pruned_expr(ctx, instance, body, visit);
        }
    }
}

fn walk_pruned_stmt(ctx: &Ctx, instance: InstanceId, stmt: &Stmt, visit: &mut impl FnMut(Visit)) {
    visit(Visit::Stmt(stmt));

    match &stmt.kind {
        StmtKind::ExprStmt(e) => walk_pruned_expr(ctx, instance, e, visit),
        StmtKind::Return(Some(e)) => walk_pruned_expr(ctx, instance, e, visit),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::TypeDecl { .. } | StmtKind::Import { .. } | StmtKind::FuncDecl { .. } => {}
        StmtKind::VarDecl { init, .. } => {
            if let Some(init) = init {
                walk_pruned_expr(ctx, instance, init, visit);
            }
        }
        StmtKind::ConditionalStmt { condition, then_block, else_block } => {
            match ctx.optimization.constexpr_condition(instance, condition) {
                Some(true) => {
                    for s in then_block {
                        walk_pruned_stmt(ctx, instance, s, visit);
                    }
                }
                Some(false) => {
                    for s in else_block {
                        walk_pruned_stmt(ctx, instance, s, visit);
                    }
                }
                None => {
                    walk_pruned_expr(ctx, instance, condition, visit);
                    for s in then_block {
                        walk_pruned_stmt(ctx, instance, s, visit);
                    }
                    for s in else_block {
                        walk_pruned_stmt(ctx, instance, s, visit);
                    }
                }
            }
        }
    }
}

/// Visits every expression/statement unconditionally, including a branch a
/// `constexpr_condition` would otherwise prune. Used where pruning would be
/// unsound: a backend-facing usage pass must mark a type/global used even if
/// it's only reachable through a branch this fixpoint iteration folded away,
/// since an earlier iteration's residualized tree may still reference it
/// (SPEC_FULL.md supplement 4). Currently call-for-call identical to the
/// pruned walker; kept as a distinct pair of functions so the two traversal
/// intents stay independently overridable.
fn walk_runtime_expr(ctx: &Ctx, instance: InstanceId, expr: &Expr, visit: &mut impl FnMut(Visit)) {
    walk_pruned_expr(ctx, instance, expr, visit);
}

fn collect_calls(ctx: &Ctx, instance: InstanceId, expr: &Expr, calls: &mut AHashSet<SymbolId>) {
    walk_pruned_expr(ctx, instance, expr, &mut |node| {
        let Visit::Expr(node) = node else { return };
        let ExprKind::Call { callee, .. } = &node.kind else { return };
        let ExprKind::Identifier { .. } = &callee.kind else { return };
        if let Some(sym) = ctx.binding_for(instance, callee) {
            if ctx.program.symbols.get(sym).kind == SymbolKind::Function {
                calls.insert(sym);
            }
        }
    });
}

/// Runs every pass [`AnalysisConfig::enabled_passes`] selects, in the fixed
/// dependency order reachability -> reentrancy -> mutability -> ref-variants
/// -> effects -> usage (spec §4.7).
pub fn analyze(
    program: &Program,
    bindings: &Bindings,
    optimization: &OptimizationFacts,
    config: &AnalysisConfig,
) -> CompileResult<AnalysisFacts> {
    let ctx = Ctx { program, bindings, optimization, config };
    let mut facts = AnalysisFacts::default();

    let needs_reachability = ctx.pass_enabled(AnalysisPass::REACHABILITY)
        || ctx.pass_enabled(AnalysisPass::REENTRANCY)
        || ctx.pass_enabled(AnalysisPass::MUTABILITY)
        || ctx.pass_enabled(AnalysisPass::REF_VARIANTS)
        || ctx.pass_enabled(AnalysisPass::EFFECTS)
        || ctx.pass_enabled(AnalysisPass::USAGE);

    let mut summary = RunSummary::default();
    if needs_reachability {
        analyze_reachability(&ctx, &mut facts);
        summary = build_run_summary(&ctx, &facts);
    }

    if ctx.pass_enabled(AnalysisPass::REENTRANCY) {
        analyze_reentrancy(&ctx, &summary, &mut facts)?;
    }

    let needs_mutability =
        ctx.pass_enabled(AnalysisPass::MUTABILITY) || ctx.pass_enabled(AnalysisPass::REF_VARIANTS) || ctx.pass_enabled(AnalysisPass::EFFECTS);
    if needs_mutability {
        analyze_mutability(&ctx, &mut facts);
    }

    if ctx.pass_enabled(AnalysisPass::REF_VARIANTS) {
        analyze_ref_variants(&ctx, &summary, &mut facts);
    }
    if ctx.pass_enabled(AnalysisPass::EFFECTS) {
        analyze_effects(&ctx, &summary, &mut facts);
    }
    if ctx.pass_enabled(AnalysisPass::USAGE) {
        analyze_usage(&ctx, &mut facts);
    }

    Ok(facts)
}

// ---------------------------------------------------------------------
// Pass A: reachability
// ---------------------------------------------------------------------

fn analyze_reachability(ctx: &Ctx, facts: &mut AnalysisFacts) {
    for instance in &ctx.program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = ctx.program.symbols.get(sym_id);
            if sym.kind == SymbolKind::Function && sym.is_exported {
                mark_reachable(ctx, sym_id, facts);
            }
        }
    }

    for instance in &ctx.program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = ctx.program.symbols.get(sym_id);
            if !matches!(sym.kind, SymbolKind::Variable | SymbolKind::Constant) {
                continue;
            }
            let StmtKind::VarDecl { init: Some(init), .. } = &sym.declaration.kind else {
                continue;
            };
            if !ctx.global_initializer_runs_at_runtime(sym.instance_id, init) {
                continue;
            }
            let mut calls = AHashSet::new();
            collect_calls(ctx, sym.instance_id, init, &mut calls);
            for callee in calls {
                mark_reachable(ctx, callee, facts);
            }
        }
    }
}

fn mark_reachable(ctx: &Ctx, func_sym: SymbolId, facts: &mut AnalysisFacts) {
    if !facts.reachable_functions.insert(func_sym) {
        return;
    }

    let sym = ctx.program.symbols.get(func_sym);
    if sym.kind != SymbolKind::Function || sym.is_external {
        return;
    }
    let StmtKind::FuncDecl { body: Some(body), .. } = &sym.declaration.kind else {
        return;
    };

    let mut calls = AHashSet::new();
    collect_calls(ctx, sym.instance_id, body, &mut calls);
    for callee in calls {
        mark_reachable(ctx, callee, facts);
    }
}

fn build_run_summary(ctx: &Ctx, facts: &AnalysisFacts) -> RunSummary {
    let mut summary = RunSummary::default();

    for instance in &ctx.program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = ctx.program.symbols.get(sym_id);

            if sym.kind == SymbolKind::Function {
                if sym.is_external || !facts.reachable_functions.contains(&sym_id) {
                    continue;
                }
                summary.reachable_function_decls.insert(sym_id, sym.declaration.clone());
                if let StmtKind::FuncDecl { body: Some(body), .. } = &sym.declaration.kind {
                    let mut calls = AHashSet::new();
                    collect_calls(ctx, sym.instance_id, body, &mut calls);
                    summary.reachable_calls.insert(sym_id, calls);
                }
                continue;
            }

            if !matches!(sym.kind, SymbolKind::Variable | SymbolKind::Constant) {
                continue;
            }
            let StmtKind::VarDecl { init: Some(init), .. } = &sym.declaration.kind else {
                continue;
            };
            if !ctx.global_initializer_runs_at_runtime(sym.instance_id, init) {
                continue;
            }
            summary.runtime_initialized_globals.insert(sym_id);
            let mut calls = AHashSet::new();
            collect_calls(ctx, sym.instance_id, init, &mut calls);
            summary.global_initializer_calls.insert(sym_id, calls);
        }
    }

    summary
}

// ---------------------------------------------------------------------
// Pass B: reentrancy
// ---------------------------------------------------------------------

fn boundary_ctx(ctx: &Ctx, sym: SymbolId, kind: ReentrancyBoundaryKind) -> char {
    let mode = ctx
        .config
        .reentrancy_mode_for_boundary
        .as_ref()
        .map_or(ReentrancyMode::Default, |hook| hook(sym, kind));
    let fallback = match kind {
        ReentrancyBoundaryKind::EntryPoint => ctx.config.default_entry_context,
        ReentrancyBoundaryKind::ExitPoint => ctx.config.default_exit_context,
    };
    match mode {
        ReentrancyMode::Reentrant => 'R',
        ReentrancyMode::NonReentrant => 'N',
        ReentrancyMode::Default => normalize_ctx(fallback, 'N'),
    }
}

fn normalize_ctx(ctx: char, fallback: char) -> char {
    if ctx == 'R' || ctx == 'N' {
        ctx
    } else if fallback == 'R' || fallback == 'N' {
        fallback
    } else {
        'N'
    }
}

fn analyze_reentrancy(ctx: &Ctx, summary: &RunSummary, facts: &mut AnalysisFacts) -> CompileResult<()> {
    let mut external_nonreentrant: AHashSet<SymbolId> = AHashSet::new();
    for instance in &ctx.program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = ctx.program.symbols.get(sym_id);
            if sym.kind != SymbolKind::Function || !sym.is_external {
                continue;
            }
            if boundary_ctx(ctx, sym_id, ReentrancyBoundaryKind::ExitPoint) == 'N' {
                external_nonreentrant.insert(sym_id);
            }
        }
    }

    let mut work: VecDeque<(SymbolId, char)> = VecDeque::new();

    for instance in &ctx.program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = ctx.program.symbols.get(sym_id);
            if sym.kind != SymbolKind::Function || !sym.is_exported {
                continue;
            }
            if !facts.reachable_functions.contains(&sym_id) {
                continue;
            }
            let entry_ctx = boundary_ctx(ctx, sym_id, ReentrancyBoundaryKind::EntryPoint);
            if facts.reentrancy_variants.entry(sym_id).or_default().insert(entry_ctx) {
                work.push_back((sym_id, entry_ctx));
            }
        }
    }

    for &sym_id in &summary.runtime_initialized_globals {
        let Some(calls) = summary.global_initializer_calls.get(&sym_id) else { continue };
        for &callee in calls {
            if facts.reentrancy_variants.entry(callee).or_default().insert('N') {
                work.push_back((callee, 'N'));
            }
        }
    }

    while let Some((func_sym, context)) = work.pop_front() {
        let Some(decl) = summary.reachable_function_decls.get(&func_sym) else {
            if context == 'R' && external_nonreentrant.contains(&func_sym) {
                let name = ctx.program.interner.resolve(ctx.program.symbols.get(func_sym).name);
                return Err(CompileError::new(
                    format!("reentrant path calls non-reentrant external function '{name}'"),
                    ctx.program.symbols.get(func_sym).declaration.location.clone(),
                ));
            }
            continue;
        };
        if ctx.is_foldable(func_sym) {
            continue;
        }
        let Some(calls) = summary.reachable_calls.get(&func_sym) else { continue };
        for &callee in calls {
            if context == 'R' && external_nonreentrant.contains(&callee) {
                return Err(CompileError::new(
                    format!(
                        "reentrant path calls non-reentrant external function '{}'",
                        ctx.program.interner.resolve(ctx.program.symbols.get(callee).name)
                    ),
                    decl.location.clone(),
                ));
            }
            if facts.reentrancy_variants.entry(callee).or_default().insert(context) {
                work.push_back((callee, context));
            }
        }
    }

    let fallback_ctx = normalize_ctx(ctx.config.default_entry_context, 'N');
    for &func_sym in summary.reachable_function_decls.keys() {
        let variants = facts.reentrancy_variants.entry(func_sym).or_default();
        if variants.is_empty() {
            variants.insert(fallback_ctx);
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------
// Pass C: mutability
// ---------------------------------------------------------------------

fn analyze_mutability(ctx: &Ctx, facts: &mut AnalysisFacts) {
    facts.var_mutability.clear();
    facts.receiver_mutates.clear();

    let mut function_map: AHashMap<SymbolId, Stmt> = AHashMap::new();
    let mut global_written: AHashMap<SymbolId, bool> = AHashMap::new();

    for instance in &ctx.program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = ctx.program.symbols.get(sym_id);
            match sym.kind {
                SymbolKind::Function => {
                    function_map.insert(sym_id, sym.declaration.clone());
                    if let StmtKind::FuncDecl { params, body, is_external, .. } = &sym.declaration.kind {
                        let ref_count = params.iter().filter(|p| p.is_ref).count();
                        if ref_count > 0 {
                            let mutates_all = *is_external || body.is_none();
                            facts.receiver_mutates.insert(sym_id, vec![mutates_all; ref_count]);
                        }
                    }
                }
                SymbolKind::Variable | SymbolKind::Constant if !sym.is_local => {
                    global_written.insert(sym_id, false);
                }
                _ => {}
            }
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for (&func_sym, func) in &function_map {
            let StmtKind::FuncDecl { params, body: Some(body), is_external: false, .. } = &func.kind else { continue };
            let ref_params: Vec<NameId> = params.iter().filter(|p| p.is_ref).map(|p| p.name).collect();
            if ref_params.is_empty() {
                continue;
            }
            let receiver_index: AHashMap<NameId, usize> = ref_params.iter().enumerate().map(|(i, &n)| (n, i)).collect();
            let sym = ctx.program.symbols.get(func_sym);

            let mut updated = facts.receiver_mutates.get(&func_sym).cloned().unwrap_or_else(|| vec![false; ref_params.len()]);
            walk_pruned_expr(ctx, sym.instance_id, body, &mut |node| {
                let Visit::Expr(expr) = node else { return };
                match &expr.kind {
                    ExprKind::Assignment { lhs, .. } => {
                        if let Some(name) = identifier_name(lhs) {
                            if let Some(&idx) = receiver_index.get(&name) {
                                updated[idx] = true;
                            }
                        }
                    }
                    ExprKind::Call { callee, receivers, .. } => {
                        let callee_sym = identifier_callee(ctx, sym.instance_id, callee);
                        let callee_mutates = callee_sym.and_then(|c| facts.receiver_mutates.get(&c));
                        for (i, rec) in receivers.iter().enumerate() {
                            let Some(name) = identifier_name(rec) else { continue };
                            let Some(&idx) = receiver_index.get(&name) else { continue };
                            let is_mut = callee_mutates.and_then(|m| m.get(i)).copied().unwrap_or(true);
                            if is_mut {
                                updated[idx] = true;
                            }
                        }
                    }
                    _ => {}
                }
            });

            if facts.receiver_mutates.get(&func_sym) != Some(&updated) {
                facts.receiver_mutates.insert(func_sym, updated);
                changed = true;
            }
        }
    }

    for (&func_sym, func) in &function_map {
        let StmtKind::FuncDecl { body: Some(body), .. } = &func.kind else { continue };
        if !facts.reachable_functions.contains(&func_sym) {
            continue;
        }
        let sym = ctx.program.symbols.get(func_sym);
        walk_pruned_expr(ctx, sym.instance_id, body, &mut |node| {
            let Visit::Expr(expr) = node else { return };
            match &expr.kind {
                ExprKind::Assignment { lhs, .. } => {
                    if let Some(base) = base_identifier_symbol(ctx, sym.instance_id, lhs) {
                        let base_sym = ctx.program.symbols.get(base);
                        if !base_sym.is_local && matches!(base_sym.kind, SymbolKind::Variable | SymbolKind::Constant) {
                            global_written.insert(base, true);
                        }
                    }
                }
                ExprKind::Call { callee, receivers, .. } => {
                    let callee_sym = identifier_callee(ctx, sym.instance_id, callee);
                    let callee_mutates = callee_sym.and_then(|c| facts.receiver_mutates.get(&c));
                    for (i, rec) in receivers.iter().enumerate() {
                        let is_mut = callee_mutates.and_then(|m| m.get(i)).copied().unwrap_or(true);
                        if !is_mut || !receiver_is_mutable_arg(ctx, sym.instance_id, rec) {
                            continue;
                        }
                        if let Some(base) = base_identifier_symbol(ctx, sym.instance_id, rec) {
                            let base_sym = ctx.program.symbols.get(base);
                            if !base_sym.is_local && matches!(base_sym.kind, SymbolKind::Variable | SymbolKind::Constant) {
                                global_written.insert(base, true);
                            }
                        }
                    }
                }
                _ => {}
            }
        });
    }

    for (sym_id, written) in global_written {
        let sym = ctx.program.symbols.get(sym_id);
        let StmtKind::VarDecl { declared_type, init, .. } = &sym.declaration.kind else { continue };
        let effective_mutable = sym.is_mutable && written;
        if effective_mutable {
            facts.var_mutability.insert(sym_id, VarMutability::Mutable);
            continue;
        }
        let constexpr_init = init.as_ref().is_some_and(|init| {
            let structural_array = matches!(declared_type.as_ref().map(|t| &t.kind), Some(TypeKind::Array { .. }))
                && matches!(init.kind, ExprKind::ArrayLiteral { .. } | ExprKind::Range { .. });
            structural_array || ctx.optimization.constexpr_value(sym.instance_id, init).is_some()
        });
        facts
            .var_mutability
            .insert(sym_id, if constexpr_init { VarMutability::Constexpr } else { VarMutability::NonMutableRuntime });
    }
}

/// An identifier expression's interned name, without resolving its symbol
/// (used for the by-name receiver-index lookup the original keys on).
fn identifier_name(expr: &Expr) -> Option<NameId> {
    match &expr.kind {
        ExprKind::Identifier { name } => Some(*name),
        _ => None,
    }
}

fn identifier_callee(ctx: &Ctx, instance: InstanceId, expr: &Expr) -> Option<SymbolId> {
    match &expr.kind {
        ExprKind::Identifier { .. } => ctx.binding_for(instance, expr),
        _ => None,
    }
}

// ---------------------------------------------------------------------
// Pass D: ref-variants
// ---------------------------------------------------------------------

fn analyze_ref_variants(ctx: &Ctx, summary: &RunSummary, facts: &mut AnalysisFacts) {
    facts.ref_variants.clear();

    let ref_variant_key = |ctx: &Ctx, instance: InstanceId, call: &Expr, ref_count: usize| -> String {
        let ExprKind::Call { receivers, .. } = &call.kind else {
            return "N".repeat(ref_count);
        };
        (0..ref_count)
            .map(|i| {
                let is_mut = receivers.get(i).is_some_and(|r| receiver_is_mutable_arg(ctx, instance, r));
                if is_mut { 'M' } else { 'N' }
            })
            .collect()
    };

    let record_call = |facts: &mut AnalysisFacts, instance: InstanceId, node: Visit| {
        let Visit::Expr(expr) = node else { return };
        let ExprKind::Call { callee, .. } = &expr.kind else { return };
        let Some(callee_sym) = identifier_callee(ctx, instance, callee) else { return };
        let Some(decl) = summary.reachable_function_decls.get(&callee_sym) else {
            return;
        };
        let StmtKind::FuncDecl { params, .. } = &decl.kind else { return };
        let ref_count = params.iter().filter(|p| p.is_ref).count();
        if ref_count == 0 {
            return;
        }
        let key = ref_variant_key(ctx, instance, expr, ref_count);
        facts.ref_variants.entry(callee_sym).or_default().insert(key);
    };

    for (&func_sym, func_decl) in &summary.reachable_function_decls {
        if ctx.is_foldable(func_sym) {
            continue;
        }
        let StmtKind::FuncDecl { body: Some(body), .. } = &func_decl.kind else { continue };
        let instance = ctx.program.symbols.get(func_sym).instance_id;
        walk_pruned_expr(ctx, instance, body, &mut |e| record_call(facts, instance, e));
    }

    for &sym_id in &summary.runtime_initialized_globals {
        let sym = ctx.program.symbols.get(sym_id);
        let StmtKind::VarDecl { init: Some(init), .. } = &sym.declaration.kind else { continue };
        walk_pruned_expr(ctx, sym.instance_id, init, &mut |e| record_call(facts, sym.instance_id, e));
    }
}

// ---------------------------------------------------------------------
// Pass E: effects (purity / global writes)
// ---------------------------------------------------------------------

fn analyze_effects(ctx: &Ctx, summary: &RunSummary, facts: &mut AnalysisFacts) {
    facts.function_writes_global.clear();
    facts.function_is_pure.clear();

    let mut external_functions: AHashSet<SymbolId> = AHashSet::new();
    for instance in &ctx.program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = ctx.program.symbols.get(sym_id);
            if sym.kind == SymbolKind::Function && sym.is_external {
                external_functions.insert(sym_id);
            }
        }
    }

    let mut direct_writes: AHashMap<SymbolId, bool> = AHashMap::new();
    let mut direct_impure: AHashMap<SymbolId, bool> = AHashMap::new();
    let mut unknown_call: AHashMap<SymbolId, bool> = AHashMap::new();
    let mut mutates_receiver: AHashMap<SymbolId, bool> = AHashMap::new();

    for &func_sym in summary.reachable_function_decls.keys() {
        mutates_receiver.insert(
            func_sym,
            facts.receiver_mutates.get(&func_sym).is_some_and(|m| m.iter().any(|&v| v)),
        );
    }

    for (&func_sym, func_decl) in &summary.reachable_function_decls {
        if ctx.is_foldable(func_sym) {
            direct_writes.insert(func_sym, false);
            direct_impure.insert(func_sym, false);
            unknown_call.insert(func_sym, false);
            continue;
        }
        let StmtKind::FuncDecl { body, .. } = &func_decl.kind else { continue };
        let Some(body) = body else {
            direct_impure.insert(func_sym, true);
            unknown_call.insert(func_sym, true);
            continue;
        };

        let mut write = false;
        let mut impure = false;
        let mut unknown = false;
        let instance = ctx.program.symbols.get(func_sym).instance_id;

        walk_pruned_expr(ctx, instance, body, &mut |node| {
            let Visit::Expr(expr) = node else { return };
            match &expr.kind {
                ExprKind::Assignment { lhs, .. } => {
                    if ctx.bindings.creates_new_variable(instance, expr) && matches!(lhs.kind, ExprKind::Identifier { .. }) {
                        return;
                    }
                    if let Some(base) = base_identifier_symbol(ctx, instance, lhs) {
                        let base_sym = ctx.program.symbols.get(base);
                        if !base_sym.is_local && matches!(base_sym.kind, SymbolKind::Variable | SymbolKind::Constant) && base_sym.is_mutable {
                            write = true;
                        }
                    }
                }
                ExprKind::Call { callee, receivers, .. } => {
                    let Some(callee_sym) = identifier_callee(ctx, instance, callee) else {
                        unknown = true;
                        impure = true;
                        return;
                    };
                    let callee_mutates = facts.receiver_mutates.get(&callee_sym);
                    for (i, rec) in receivers.iter().enumerate() {
                        let is_mut = callee_mutates.and_then(|m| m.get(i)).copied().unwrap_or(true);
                        if !is_mut || !receiver_is_mutable_arg(ctx, instance, rec) {
                            continue;
                        }
                        if let Some(base) = base_identifier_symbol(ctx, instance, rec) {
                            let base_sym = ctx.program.symbols.get(base);
                            if !base_sym.is_local && matches!(base_sym.kind, SymbolKind::Variable | SymbolKind::Constant) {
                                write = true;
                            }
                        }
                    }
                }
                ExprKind::Process { .. } => impure = true,
                _ => {}
            }
        });

        direct_writes.insert(func_sym, write);
        direct_impure.insert(func_sym, impure);
        unknown_call.insert(func_sym, unknown);
    }

    for &func_sym in summary.reachable_function_decls.keys() {
        let writes = direct_writes.get(&func_sym).copied().unwrap_or(false) || unknown_call.get(&func_sym).copied().unwrap_or(false);
        facts.function_writes_global.insert(func_sym, writes);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &func_sym in summary.reachable_function_decls.keys() {
            let mut writes =
                direct_writes.get(&func_sym).copied().unwrap_or(false) || unknown_call.get(&func_sym).copied().unwrap_or(false);
            if !writes {
                if let Some(calls) = summary.reachable_calls.get(&func_sym) {
                    for callee in calls {
                        if external_functions.contains(callee) || !summary.reachable_function_decls.contains_key(callee) {
                            writes = true;
                            break;
                        }
                        if facts.function_writes_global.get(callee).copied().unwrap_or(false) {
                            writes = true;
                            break;
                        }
                    }
                }
            }
            if facts.function_writes_global.get(&func_sym).copied().unwrap_or(false) != writes {
                facts.function_writes_global.insert(func_sym, writes);
                changed = true;
            }
        }
    }

    for &func_sym in summary.reachable_function_decls.keys() {
        let base = !facts.function_writes_global.get(&func_sym).copied().unwrap_or(false)
            && !direct_impure.get(&func_sym).copied().unwrap_or(false)
            && !mutates_receiver.get(&func_sym).copied().unwrap_or(false);
        facts.function_is_pure.insert(func_sym, base);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &func_sym in summary.reachable_function_decls.keys() {
            let base = !facts.function_writes_global.get(&func_sym).copied().unwrap_or(false)
                && !direct_impure.get(&func_sym).copied().unwrap_or(false)
                && !mutates_receiver.get(&func_sym).copied().unwrap_or(false);
            let mut pure = base;
            if pure {
                if let Some(calls) = summary.reachable_calls.get(&func_sym) {
                    for callee in calls {
                        if external_functions.contains(callee) || !summary.reachable_function_decls.contains_key(callee) {
                            pure = false;
                            break;
                        }
                        if !facts.function_is_pure.get(callee).copied().unwrap_or(false) {
                            pure = false;
                            break;
                        }
                    }
                }
            }
            if facts.function_is_pure.get(&func_sym).copied().unwrap_or(false) != pure {
                facts.function_is_pure.insert(func_sym, pure);
                changed = true;
            }
        }
    }
}

// ---------------------------------------------------------------------
// Pass F: usage
// ---------------------------------------------------------------------

fn analyze_usage(ctx: &Ctx, facts: &mut AnalysisFacts) {
    facts.used_global_vars.clear();
    facts.used_type_names.clear();

    let mut type_decls: AHashMap<NameId, Stmt> = AHashMap::new();
    for module in &ctx.program.modules {
        for stmt in &module.module.top_level {
            if let StmtKind::TypeDecl { name, .. } = &stmt.kind {
                type_decls.insert(*name, stmt.clone());
            }
        }
    }

    let mut type_worklist: VecDeque<NameId> = VecDeque::new();

    fn mark_type(facts: &mut AnalysisFacts, worklist: &mut VecDeque<NameId>, ty: &Type) {
        match &ty.kind {
            TypeKind::Named(name) => {
                if facts.used_type_names.insert(*name) {
                    worklist.push_back(*name);
                }
            }
            TypeKind::Array { elem, .. } => mark_type(facts, worklist, elem),
            TypeKind::Primitive(_) | TypeKind::TypeVar(_) | TypeKind::TypeOf(_) => {}
        }
    }

    let mut global_worklist: VecDeque<SymbolId> = VecDeque::new();
    let mut note_global = |facts: &mut AnalysisFacts, sym: SymbolId| {
        if facts.used_global_vars.insert(sym) {
            global_worklist.push_back(sym);
        }
    };

    for instance in &ctx.program.instances {
        for &sym_id in instance.symbols.values() {
            let sym = ctx.program.symbols.get(sym_id);
            if sym.is_exported && !sym.is_local && matches!(sym.kind, SymbolKind::Variable | SymbolKind::Constant) {
                note_global(facts, sym_id);
            }
        }
    }

    for &func_sym in &facts.reachable_functions.clone() {
        let sym = ctx.program.symbols.get(func_sym);
        let StmtKind::FuncDecl { params, return_type, body, .. } = &sym.declaration.kind else { continue };
        if let Some(body) = body {
            walk_runtime_expr(ctx, sym.instance_id, body, &mut |node| match node {
                Visit::Expr(expr) => {
                    if let Some(ty) = ctx.bindings.expr_type(sym.instance_id, expr) {
                        mark_type(facts, &mut type_worklist, &ty);
                    }
                    if let ExprKind::Identifier { .. } = &expr.kind {
                        if let Some(used_sym) = ctx.binding_for(sym.instance_id, expr) {
                            let used = ctx.program.symbols.get(used_sym);
                            if !used.is_local && matches!(used.kind, SymbolKind::Variable | SymbolKind::Constant) {
                                note_global(facts, used_sym);
                            }
                        }
                    }
                }
                Visit::Stmt(stmt) => {
                    if let StmtKind::VarDecl { declared_type: Some(ty), .. } = &stmt.kind {
                        mark_type(facts, &mut type_worklist, ty);
                    }
                }
            });
        }
        for param in params {
            mark_type(facts, &mut type_worklist, &param.ty);
        }
        if let Some(rt) = return_type {
            mark_type(facts, &mut type_worklist, rt);
        }
    }

    while let Some(sym_id) = global_worklist.pop_front() {
        let sym = ctx.program.symbols.get(sym_id);
        let StmtKind::VarDecl { declared_type, init, .. } = &sym.declaration.kind else { continue };
        if let Some(ty) = declared_type {
            mark_type(facts, &mut type_worklist, ty);
        }
        if let Some(init) = init {
            walk_runtime_expr(ctx, sym.instance_id, init, &mut |node| match node {
                Visit::Expr(expr) => {
                    if let Some(ty) = ctx.bindings.expr_type(sym.instance_id, expr) {
                        mark_type(facts, &mut type_worklist, &ty);
                    }
                    if let ExprKind::Identifier { .. } = &expr.kind {
                        if let Some(used_sym) = ctx.binding_for(sym.instance_id, expr) {
                            let used = ctx.program.symbols.get(used_sym);
                            if !used.is_local && matches!(used.kind, SymbolKind::Variable | SymbolKind::Constant) {
                                note_global(facts, used_sym);
                            }
                        }
                    }
                }
                Visit::Stmt(stmt) => {
                    if let StmtKind::VarDecl { declared_type: Some(ty), .. } = &stmt.kind {
                        mark_type(facts, &mut type_worklist, ty);
                    }
                }
            });
        }
    }

    while let Some(name) = type_worklist.pop_front() {
        let Some(decl) = type_decls.get(&name) else { continue };
        let StmtKind::TypeDecl { fields, .. } = &decl.kind else { continue };
        for field in fields {
            mark_type(facts, &mut type_worklist, &field.ty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::common::SourceLocation;
    use crate::program::{Module, Program};
    use crate::symbols::Symbol;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.strata", 1, 1)
    }

    /// Minimal one-instance, one-module harness with no generics/imports,
    /// mirroring `optimizer.rs`'s own test setup.
    struct Harness {
        program: Program,
        bindings: Bindings,
        instance: InstanceId,
    }

    impl Harness {
        fn new(top_level: Vec<Stmt>) -> Self {
            let mut program = Program::new();
            let module_id = program.add_module("t.strata", Module { top_level });
            let scope = program.scopes.push(None);
            let instance = program.add_instance(module_id, scope);
            Self {
                program,
                bindings: Bindings::new(),
                instance,
            }
        }

        fn declare_function(&mut self, name: NameId, decl: &Stmt, is_exported: bool, is_external: bool) -> SymbolId {
            let module_id = self.program.instance(self.instance).unwrap().module_id;
            let sym = self.program.symbols.alloc(Symbol {
                kind: SymbolKind::Function,
                name,
                ty: None,
                is_mutable: false,
                is_external,
                is_exported,
                is_local: false,
                declaration: decl.clone(),
                module_id,
                instance_id: self.instance,
                reentrancy_annotation: None,
            });
            self.program.instance_mut(self.instance).unwrap().symbols.insert(name, sym);
            sym
        }

        fn declare_global(&mut self, name: NameId, decl: &Stmt, is_mutable: bool, is_exported: bool) -> SymbolId {
            let module_id = self.program.instance(self.instance).unwrap().module_id;
            let sym = self.program.symbols.alloc(Symbol {
                kind: SymbolKind::Variable,
                name,
                ty: None,
                is_mutable,
                is_external: false,
                is_exported,
                is_local: false,
                declaration: decl.clone(),
                module_id,
                instance_id: self.instance,
                reentrancy_annotation: None,
            });
            self.program.instance_mut(self.instance).unwrap().symbols.insert(name, sym);
            sym
        }

        /// Binds every `Identifier`/`Call` expression in `expr` that names a
        /// declared symbol, recursively, so `binding_for` resolves them the
        /// way the resolver would have.
        fn bind_identifier(&mut self, expr: &Expr, sym: SymbolId) {
            self.bindings.bind_expr(self.instance, expr, sym);
        }

        fn analyze(&self, config: &AnalysisConfig) -> CompileResult<AnalysisFacts> {
            let optimization = OptimizationFacts::default();
            analyze(&self.program, &self.bindings, &optimization, config)
        }
    }

    #[test]
    fn only_functions_reachable_from_an_exported_entry_point_are_marked_reachable() {
        let mut h = Harness::new(vec![]);
        let helper_name = h.program.interner.intern("helper");
        let dead_name = h.program.interner.intern("dead");
        let main_name = h.program.interner.intern("main");

        let helper_decl = make_func_decl(helper_name, vec![], None, Some(make_block(vec![], None, loc())), false, false, vec![], loc());
        let dead_decl = make_func_decl(dead_name, vec![], None, Some(make_block(vec![], None, loc())), false, false, vec![], loc());
        let helper_call = make_call(make_identifier(helper_name, loc()), vec![], vec![], loc());
        let main_body = make_block(vec![make_expr_stmt(helper_call.clone(), loc())], None, loc());
        let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

        let helper_sym = h.declare_function(helper_name, &helper_decl, false, false);
        let _dead_sym = h.declare_function(dead_name, &dead_decl, false, false);
        let main_sym = h.declare_function(main_name, &main_decl, true, false);
        h.bind_identifier(&helper_call.clone(), helper_sym);
        if let ExprKind::Call { callee, .. } = &helper_call.kind {
            h.bind_identifier(callee, helper_sym);
        }

        let facts = h.analyze(&AnalysisConfig::default()).expect("analysis succeeds");
        assert!(facts.reachable_functions.contains(&main_sym));
        assert!(facts.reachable_functions.contains(&helper_sym));
        assert_eq!(facts.reachable_functions.len(), 2);
    }

    #[test]
    fn assigning_through_a_reachable_function_marks_the_target_global_mutable() {
        let mut h = Harness::new(vec![]);
        let global_name = h.program.interner.intern("counter");
        let main_name = h.program.interner.intern("main");

        let global_decl = make_var_decl(global_name, None, true, false, false, Some(make_int(0, "0", loc())), vec![], loc());
        let assign = make_assignment(make_identifier(global_name, loc()), make_int(1, "1", loc()), loc());
        let main_body = make_block(vec![make_expr_stmt(assign.clone(), loc())], None, loc());
        let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

        let global_sym = h.declare_global(global_name, &global_decl, true, false);
        let main_sym = h.declare_function(main_name, &main_decl, true, false);
        let _ = main_sym;

        let ExprKind::Assignment { lhs, .. } = &assign.kind else { unreachable!() };
        h.bind_identifier(lhs, global_sym);

        let facts = h.analyze(&AnalysisConfig::default()).expect("analysis succeeds");
        assert_eq!(facts.var_mutability.get(&global_sym), Some(&VarMutability::Mutable));
    }

    #[test]
    fn a_function_with_no_side_effects_is_marked_pure() {
        let mut h = Harness::new(vec![]);
        let main_name = h.program.interner.intern("main");
        let main_body = make_block(vec![], Some(make_int(0, "0", loc())), loc());
        let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());
        let main_sym = h.declare_function(main_name, &main_decl, true, false);

        let facts = h.analyze(&AnalysisConfig::default()).expect("analysis succeeds");
        assert_eq!(facts.function_is_pure.get(&main_sym), Some(&true));
        assert_eq!(facts.function_writes_global.get(&main_sym), Some(&false));
    }

    #[test]
    fn a_reentrant_path_calling_a_nonreentrant_external_function_is_rejected() {
        let mut h = Harness::new(vec![]);
        let external_name = h.program.interner.intern("halt");
        let main_name = h.program.interner.intern("main");

        let external_decl = make_func_decl(external_name, vec![], None, None, true, false, vec![], loc());
        let call = make_call(make_identifier(external_name, loc()), vec![], vec![], loc());
        let main_body = make_block(vec![make_expr_stmt(call.clone(), loc())], None, loc());
        let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

        let external_sym = h.declare_function(external_name, &external_decl, false, true);
        let _main_sym = h.declare_function(main_name, &main_decl, true, false);
        if let ExprKind::Call { callee, .. } = &call.kind {
            h.bind_identifier(callee, external_sym);
        }

        let mut config = AnalysisConfig::default();
        config.reentrancy_mode_for_boundary = Some(Box::new(|_sym, kind| match kind {
            ReentrancyBoundaryKind::ExitPoint => ReentrancyMode::NonReentrant,
            ReentrancyBoundaryKind::EntryPoint => ReentrancyMode::Default,
        }));

        let result = h.analyze(&config);
        assert!(result.is_err());
    }

    #[test]
    fn an_unreferenced_private_global_is_not_marked_used() {
        let mut h = Harness::new(vec![]);
        let used_name = h.program.interner.intern("used");
        let unused_name = h.program.interner.intern("unused");
        let main_name = h.program.interner.intern("main");

        let used_decl = make_var_decl(used_name, None, false, false, false, Some(make_int(1, "1", loc())), vec![], loc());
        let unused_decl = make_var_decl(unused_name, None, false, false, false, Some(make_int(2, "2", loc())), vec![], loc());
        let reader = make_identifier(used_name, loc());
        let main_body = make_block(vec![], Some(reader.clone()), loc());
        let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

        let used_sym = h.declare_global(used_name, &used_decl, false, false);
        let _unused_sym = h.declare_global(unused_name, &unused_decl, false, false);
        let _main_sym = h.declare_function(main_name, &main_decl, true, false);
        h.bind_identifier(&reader, used_sym);

        let facts = h.analyze(&AnalysisConfig::default()).expect("analysis succeeds");
        assert!(facts.used_global_vars.contains(&used_sym));
        assert_eq!(facts.used_global_vars.len(), 1);
    }
}
