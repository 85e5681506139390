//! `Program`, `ModuleInfo`, `ModuleInstance` (spec §3 "ModuleInfo",
//! "ModuleInstance"): the set of loaded modules and their per-importer
//! instantiations.

use ahash::AHashMap;

use crate::ast::Stmt;
use crate::intern::{Interner, NameId};
use crate::symbols::{ScopeArena, ScopeId, SymbolArena, SymbolId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ModuleId(u32);

impl ModuleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct InstanceId(u32);

impl InstanceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The top-level declarations parsed out of one source file. Owned by the
/// `ModuleInfo` that loaded it; referenced (never owned) by every
/// `ModuleInstance` over it.
#[derive(Debug, Default, Clone)]
pub struct Module {
    pub top_level: Vec<Stmt>,
}

#[derive(Debug)]
pub struct ModuleInfo {
    pub id: ModuleId,
    pub path: String,
    pub module: Module,
}

/// A per-importer materialization of a module: its own scope and its own
/// name -> symbol table, because two importers of the same module can see
/// different sets of (re-)exported names depending on what they imported
/// (spec §3 "ModuleInstance").
#[derive(Debug)]
pub struct ModuleInstance {
    pub id: InstanceId,
    pub module_id: ModuleId,
    pub scope_id: ScopeId,
    pub symbols: AHashMap<NameId, SymbolId>,
}

/// Owns every loaded module, every instance of it, the symbol arena, the
/// scope arena, and the string interner, for one compilation (spec §3
/// "Program").
#[derive(Debug, Default)]
pub struct Program {
    pub modules: Vec<ModuleInfo>,
    pub path_to_id: AHashMap<String, ModuleId>,
    pub instances: Vec<ModuleInstance>,
    pub symbols: SymbolArena,
    pub scopes: ScopeArena,
    pub interner: Interner,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleInfo> {
        self.modules.get(id.index())
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut ModuleInfo> {
        self.modules.get_mut(id.index())
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ModuleInstance> {
        self.instances.get(id.index())
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut ModuleInstance> {
        self.instances.get_mut(id.index())
    }

    /// Registers a freshly parsed module (external collaborator output)
    /// under `path`, returning its fresh `ModuleId`. A module is loaded at
    /// most once; re-importing the same path reuses this id.
    pub fn add_module(&mut self, path: impl Into<String>, module: Module) -> ModuleId {
        let path = path.into();
        if let Some(&id) = self.path_to_id.get(&path) {
            return id;
        }
        let id = ModuleId(u32::try_from(self.modules.len()).expect("too many modules"));
        self.modules.push(ModuleInfo {
            id,
            path: path.clone(),
            module,
        });
        self.path_to_id.insert(path, id);
        id
    }

    pub fn add_instance(&mut self, module_id: ModuleId, scope_id: ScopeId) -> InstanceId {
        let id = InstanceId(u32::try_from(self.instances.len()).expect("too many instances"));
        self.instances.push(ModuleInstance {
            id,
            module_id,
            scope_id,
            symbols: AHashMap::new(),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reimporting_the_same_path_reuses_the_module_id() {
        let mut program = Program::new();
        let a = program.add_module("a.strata", Module::default());
        let b = program.add_module("a.strata", Module::default());
        assert_eq!(a, b);
        assert_eq!(program.modules.len(), 1);
    }

    #[test]
    fn distinct_paths_get_distinct_module_ids() {
        let mut program = Program::new();
        let a = program.add_module("a.strata", Module::default());
        let b = program.add_module("b.strata", Module::default());
        assert_ne!(a, b);
    }
}
