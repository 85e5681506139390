//! Splices the type checker's generic instantiations into their modules
//! (spec §4.3): "Drains the checker's `pending_instantiations` into the
//! module's top-level list, repeating until empty."
//!
//! The type checker itself already drains `pending_instantiations` to
//! discover and check transitively-generic clones (a clone's own body can
//! call another generic function) before returning
//! [`crate::typechecker::TypeCheckOutput`]; by the time this module runs, the
//! list is a flat, fully-checked set. This pass's job is narrower: make each
//! clone visible to later stages as an ordinary top-level declaration in the
//! module it belongs to, rather than a detached statement living only in the
//! checker's output.

use ahash::AHashSet;

use crate::ast::{Stmt, StmtKind};
use crate::program::{InstanceId, Program};

/// Appends every pending instantiation to its owning module's top-level
/// list. Returns the number of declarations actually spliced in (duplicates
/// — the same mangled name reaching the module twice, e.g. because two
/// instances of it produced the same instantiation — are skipped).
///
/// Guarantee upheld: every surviving generic call site now refers to a
/// concrete declaration reachable from its module; the generic original
/// stays in place (callers may still reference it symbolically) but nothing
/// emits it unless something still calls it directly.
pub fn monomorphize(program: &mut Program, pending_instantiations: Vec<(InstanceId, Stmt)>) -> usize {
    let mut spliced = 0;
    for (instance, stmt) in pending_instantiations {
        let Some(module_id) = program.instance(instance).map(|i| i.module_id) else {
            continue;
        };
        let Some(module) = program.module_mut(module_id) else {
            continue;
        };
        if already_present(&module.module.top_level, &stmt) {
            continue;
        }
        module.module.top_level.push(stmt);
        spliced += 1;
    }
    spliced
}

fn already_present(top_level: &[Stmt], candidate: &Stmt) -> bool {
    let StmtKind::FuncDecl { name: candidate_name, .. } = &candidate.kind else {
        return false;
    };
    top_level.iter().any(|s| matches!(&s.kind, StmtKind::FuncDecl { name, .. } if name == candidate_name))
}

/// Every symbol name a module's top-level list declares, used by tests and
/// diagnostics to confirm a clone made it in without re-walking `Stmt`s by
/// hand each time.
#[cfg(test)]
fn declared_names(program: &Program, module_id: crate::program::ModuleId) -> AHashSet<String> {
    let module = program.module(module_id).expect("module registered");
    module
        .module
        .top_level
        .iter()
        .filter_map(|s| match &s.kind {
            StmtKind::FuncDecl { name, .. } => Some(program.interner.resolve(*name).to_owned()),
            _ => None,
        })
        .collect()
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

    fn one_module_program() -> (Program, crate::program::ModuleId, InstanceId) {
        let mut program = Program::new();
        let module_id = program.add_module("t.strata", Module::default());
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);
        (program, module_id, instance)
    }

    fn func_stmt(program: &mut Program, name: &str) -> Stmt {
        let name_id = program.interner.intern(name);
        make_func_decl(name_id, vec![], None, Some(make_block(vec![], None, loc())), false, false, vec![], loc())
    }

    #[test]
    fn splices_a_pending_instantiation_into_its_module() {
        let (mut program, module_id, instance) = one_module_program();
        let clone = func_stmt(&mut program, "identity$u8");
        let spliced = monomorphize(&mut program, vec![(instance, clone)]);
        assert_eq!(spliced, 1);
        assert!(declared_names(&program, module_id).contains("identity$u8"));
    }

    #[test]
    fn does_not_duplicate_an_already_present_instantiation() {
        let (mut program, module_id, instance) = one_module_program();
        let first = func_stmt(&mut program, "identity$u8");
        program.module_mut(module_id).unwrap().module.top_level.push(first);

        let second = func_stmt(&mut program, "identity$u8");
        let spliced = monomorphize(&mut program, vec![(instance, second)]);
        assert_eq!(spliced, 0);
        assert_eq!(program.module(module_id).unwrap().module.top_level.len(), 1);
    }

    #[test]
    fn distinct_instantiations_both_land() {
        let (mut program, module_id, instance) = one_module_program();
        let a = func_stmt(&mut program, "identity$u8");
        let b = func_stmt(&mut program, "identity$f32");
        let spliced = monomorphize(&mut program, vec![(instance, a), (instance, b)]);
        assert_eq!(spliced, 2);
        let names = declared_names(&program, module_id);
        assert!(names.contains("identity$u8") && names.contains("identity$f32"));
    }
}
