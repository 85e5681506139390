//! The frozen backend handoff (spec §4.9): once the optimizer/residualizer
//! fixpoint and all six analysis passes have run, nothing downstream may
//! mutate the module again. `AnalyzedProgram` owns everything a backend
//! needs — `Program`, `Bindings`, the final `AnalysisFacts`/
//! `OptimizationFacts`, the entry instance, the `forced_tuple_types` table,
//! and the pruned `MergedModule` — behind a read-only API, the way
//! `ouros`'s `Interpreter` hands a caller a `Value`/`Namespace` snapshot
//! instead of its live mutable execution state.

use ahash::{AHashMap, AHashSet};

use crate::analysis::AnalysisFacts;
use crate::ast::{Expr, Stmt, StmtKind, Type, TypeKind};
use crate::bindings::Bindings;
use crate::cte;
use crate::cte::value::CTValue;
use crate::intern::NameId;
use crate::optimizer::OptimizationFacts;
use crate::program::{InstanceId, Program};
use crate::symbols::{Symbol, SymbolKind};

/// The post-DCE set of declarations a backend should actually emit (spec
/// §4.7 Pass F: "Unused globals and types are dropped at merge time").
/// Built once from `AnalysisFacts.{reachable_functions, used_global_vars,
/// used_type_names}`; every other top-level declaration across every loaded
/// module is dead and left out.
#[derive(Debug, Default, Clone)]
pub struct MergedModule {
    pub declarations: Vec<Stmt>,
}

pub struct AnalyzedProgram {
    program: Program,
    bindings: Bindings,
    merged_module: MergedModule,
    analysis: AnalysisFacts,
    optimization: OptimizationFacts,
    entry_instance: InstanceId,
    forced_tuple_types: AHashMap<String, Vec<Type>>,
}

impl AnalyzedProgram {
    pub(crate) fn new(
        program: Program,
        bindings: Bindings,
        analysis: AnalysisFacts,
        optimization: OptimizationFacts,
        entry_instance: InstanceId,
        forced_tuple_types: AHashMap<String, Vec<Type>>,
    ) -> Self {
        let merged_module = build_merged_module(&program, &analysis);
        Self {
            program,
            bindings,
            merged_module,
            analysis,
            optimization,
            entry_instance,
            forced_tuple_types,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn merged_module(&self) -> &MergedModule {
        &self.merged_module
    }

    pub fn analysis(&self) -> &AnalysisFacts {
        &self.analysis
    }

    pub fn optimization(&self) -> &OptimizationFacts {
        &self.optimization
    }

    pub fn entry_instance(&self) -> InstanceId {
        self.entry_instance
    }

    pub fn forced_tuple_types(&self) -> &AHashMap<String, Vec<Type>> {
        &self.forced_tuple_types
    }

    /// spec §4.9 `binding_for(instance, node) -> Symbol?`.
    pub fn binding_for(&self, instance: InstanceId, node: &Expr) -> Option<&Symbol> {
        let sym = self.bindings.lookup_expr(instance, node)?;
        Some(self.program.symbols.get(sym))
    }

    /// spec §4.9 `resolve_type(Type) -> Type`: collapses a `TypeOf(expr)`
    /// occurrence into the expression's own checked type, recursively
    /// through `Array` element types; every other `TypeKind` is already
    /// concrete and is returned unchanged.
    ///
    /// Departs from spec.md's literal one-argument signature by taking an
    /// `instance` alongside the type (see DESIGN.md, "Open Questions"):
    /// `TypeOf`'s inner expression is looked up in `Bindings` by `(instance,
    /// node)`, the same pair every other fact table in this crate keys on,
    /// because the same shared `Expr` can carry a different checked type in
    /// each of a generic function's instantiating instances.
    pub fn resolve_type(&self, instance: InstanceId, ty: &Type) -> Type {
        match &ty.kind {
            TypeKind::TypeOf(expr) => match self.bindings.expr_type(instance, expr) {
                Some(resolved) => self.resolve_type(instance, &resolved),
                None => ty.clone(),
            },
            TypeKind::Array { elem, size } => {
                let resolved_elem = self.resolve_type(instance, elem);
                if std::rc::Rc::ptr_eq(&resolved_elem, elem) {
                    ty.clone()
                } else {
                    crate::ast::make_array(resolved_elem, size.clone(), ty.location.clone())
                }
            }
            TypeKind::Primitive(_) | TypeKind::Named(_) | TypeKind::TypeVar(_) => ty.clone(),
        }
    }

    /// spec §4.9 `constexpr_condition(instance, expr) -> bool?`.
    pub fn constexpr_condition(&self, instance: InstanceId, expr: &Expr) -> Option<bool> {
        self.optimization.constexpr_condition(instance, expr)
    }

    /// spec §4.9 `try_evaluate(instance, expr) -> CTValue?`.
    pub fn try_evaluate(&self, instance: InstanceId, expr: &Expr) -> Option<CTValue> {
        cte::try_evaluate(&self.program, &self.bindings, instance, expr)
    }

    /// spec §4.9 `lookup_type_symbol(instance, name) -> Symbol?`.
    pub fn lookup_type_symbol(&self, instance: InstanceId, name: NameId) -> Option<&Symbol> {
        let sym_id = *self.program.instance(instance)?.symbols.get(&name)?;
        let sym = self.program.symbols.get(sym_id);
        (sym.kind == SymbolKind::Type).then_some(sym)
    }

    /// Supplemental query hook (SPEC_FULL.md §3): a checked expression's own
    /// inferred type, already run through `resolve_type` so a caller never
    /// has to handle `TypeOf` itself.
    pub fn type_of(&self, instance: InstanceId, expr: &Expr) -> Option<Type> {
        let ty = self.bindings.expr_type(instance, expr)?;
        Some(self.resolve_type(instance, &ty))
    }
}

fn build_merged_module(program: &Program, analysis: &AnalysisFacts) -> MergedModule {
    let mut declarations = Vec::new();

    for &sym_id in &analysis.reachable_functions {
        let sym = program.symbols.get(sym_id);
        if sym.kind == SymbolKind::Function {
            declarations.push(sym.declaration.clone());
        }
    }

    for &sym_id in &analysis.used_global_vars {
        let sym = program.symbols.get(sym_id);
        declarations.push(sym.declaration.clone());
    }

    let mut seen_types: AHashSet<NameId> = AHashSet::new();
    for module in &program.modules {
        for stmt in &module.module.top_level {
            if let StmtKind::TypeDecl { name, .. } = &stmt.kind {
                if analysis.used_type_names.contains(name) && seen_types.insert(*name) {
                    declarations.push(stmt.clone());
                }
            }
        }
    }

    MergedModule { declarations }
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

    #[test]
    fn merged_module_keeps_only_reachable_functions_and_used_globals() {
        let mut program = Program::new();
        let kept_name = program.interner.intern("kept");
        let dead_name = program.interner.intern("dead");
        let kept_decl = make_func_decl(kept_name, vec![], None, Some(make_block(vec![], None, loc())), false, true, vec![], loc());
        let dead_decl = make_func_decl(dead_name, vec![], None, Some(make_block(vec![], None, loc())), false, false, vec![], loc());
        let module_id = program.add_module(
            "t.strata",
            Module {
                top_level: vec![kept_decl.clone(), dead_decl.clone()],
            },
        );
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);

        let kept_sym = program.symbols.alloc(Symbol {
            kind: SymbolKind::Function,
            name: kept_name,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: true,
            is_local: false,
            declaration: kept_decl.clone(),
            module_id,
            instance_id: instance,
            reentrancy_annotation: None,
        });
        let _dead_sym = program.symbols.alloc(Symbol {
            kind: SymbolKind::Function,
            name: dead_name,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            is_local: false,
            declaration: dead_decl,
            module_id,
            instance_id: instance,
            reentrancy_annotation: None,
        });

        let mut analysis = AnalysisFacts::default();
        analysis.reachable_functions.insert(kept_sym);

        let merged = build_merged_module(&program, &analysis);
        assert_eq!(merged.declarations.len(), 1);
        assert!(std::rc::Rc::ptr_eq(&merged.declarations[0], &kept_decl));
    }

    #[test]
    fn resolve_type_collapses_typeof_to_the_bound_expression_type() {
        let mut program = Program::new();
        let module_id = program.add_module("t.strata", Module::default());
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);

        let expr = make_int(1, "1", loc());
        let concrete = make_primitive(PrimitiveType::Unsigned(32), loc());
        let typeof_ty = make_typeof(expr.clone(), loc());

        let mut bindings = Bindings::new();
        bindings.set_expr_type(instance, &expr, concrete.clone());

        let analyzed = AnalyzedProgram::new(
            program,
            bindings,
            AnalysisFacts::default(),
            OptimizationFacts::default(),
            instance,
            AHashMap::default(),
        );

        let resolved = analyzed.resolve_type(instance, &typeof_ty);
        assert_eq!(resolved.kind, concrete.kind);
    }
}
