//! Drives every stage in order and produces the frozen [`AnalyzedProgram`]
//! handoff (spec §4: load -> resolve -> typecheck -> monomorphize -> lower
//! -> optimize/residualize fixpoint -> analyze), checking the matching
//! `invariants` validator at each of the nine stage boundaries (spec §4.8).
//!
//! Mirrors `ouros`'s own top-level `run`/`prepare` entry points: one public
//! function, every stage's own module owns its logic, this file only
//! sequences them and threads `Program`/`Bindings` through.

use ahash::AHashMap;

use crate::analysis::{self, AnalysisConfig, ReentrancyMode};
use crate::analyzed_program::AnalyzedProgram;
use crate::bindings::Bindings;
use crate::common::{CompileResult, Diagnostic};
use crate::invariants;
use crate::lowerer;
use crate::monomorphizer;
use crate::program::{ModuleId, Program};
use crate::residualizer;
use crate::resolver;
use crate::symbols::SymbolId;
use crate::typechecker;

/// Builds the default `reentrancy_mode_for_boundary` hook from every
/// `Symbol::reentrancy_annotation` the type checker recorded, so a caller who
/// leaves `config.reentrancy_mode_for_boundary` unset still gets spec
/// invariant 8 enforced against real `[[reentrant]]`/`[[nonreentrant]]`
/// source annotations rather than needing to hand-build a hook itself.
fn annotation_backed_config(program: &Program, config: &AnalysisConfig) -> AnalysisConfig {
    let table: AHashMap<SymbolId, bool> = program
        .symbols
        .iter()
        .filter_map(|(id, sym)| sym.reentrancy_annotation.map(|annotated| (id, annotated)))
        .collect();
    AnalysisConfig {
        enabled_passes: config.enabled_passes,
        default_entry_context: config.default_entry_context,
        default_exit_context: config.default_exit_context,
        reentrancy_mode_for_boundary: Some(Box::new(move |sym, _kind| match table.get(&sym) {
            Some(true) => ReentrancyMode::Reentrant,
            Some(false) => ReentrancyMode::NonReentrant,
            None => ReentrancyMode::Default,
        })),
    }
}

/// Result of a full compilation: the frozen backend handoff plus any
/// non-fatal diagnostics collected along the way (spec §7: "Annotations
/// unknown to the compiler are warnings... do not fail").
pub struct CompileOutput {
    pub analyzed: AnalyzedProgram,
    pub diagnostics: Vec<Diagnostic>,
}

/// Loads nothing itself — module loading from disk is an external
/// collaborator (spec §1) and `program` must already contain every module
/// `entry_module` could transitively import, registered by path. Runs every
/// pipeline stage against it and returns the frozen [`AnalyzedProgram`], or
/// the first `CompileError` any stage raises.
pub fn compile(mut program: Program, entry_module: ModuleId, config: &AnalysisConfig) -> CompileResult<CompileOutput> {
    invariants::check_post_load(&program)?;

    let mut bindings = Bindings::new();
    let entry_instance = resolver::resolve(&mut program, &mut bindings, entry_module)?;
    invariants::check_post_resolve(&program, &bindings)?;

    let type_check = typechecker::check(&mut program, &mut bindings)?;
    invariants::check_post_typecheck(&program, &bindings)?;

    monomorphizer::monomorphize(&mut program, type_check.pending_instantiations);
    invariants::check_post_monomorphize(&program)?;

    let pre_lower_counts: Vec<usize> = program.modules.iter().map(|m| m.module.top_level.len()).collect();
    lowerer::lower(&mut program);
    invariants::check_post_lower(&pre_lower_counts, &program)?;

    let optimization = residualizer::optimize_and_residualize(&mut program, &bindings)?;
    invariants::check_post_optimize(&program, &optimization)?;

    let owned_config;
    let config = if config.reentrancy_mode_for_boundary.is_some() {
        config
    } else {
        owned_config = annotation_backed_config(&program, config);
        &owned_config
    };
    let facts = analysis::analyze(&program, &bindings, &optimization, config)?;
    invariants::check_post_analysis(&program, &facts)?;
    invariants::check_post_type_use(&program, &bindings)?;

    let analyzed = AnalyzedProgram::new(program, bindings, facts, optimization, entry_instance, type_check.forced_tuple_types);
    invariants::check_post_dce_prune(analyzed.merged_module(), analyzed.analysis(), analyzed.program())?;

    Ok(CompileOutput {
        analyzed,
        diagnostics: type_check.diagnostics,
    })
}
