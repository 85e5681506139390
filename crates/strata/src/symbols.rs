//! The symbol model (spec §3 "Symbol", "Scope") and the arena that owns it.
//!
//! The original C++ frontend references symbols by raw pointer (`Symbol*`)
//! into a `Program`-owned `std::vector<std::unique_ptr<Symbol>>`. The
//! idiomatic Rust substitute (see DESIGN.md, "Open Questions") is a stable
//! arena index, `SymbolId`, the same trade the teacher's own `NamespaceId`/
//! `StringId` make for namespace slots and interned strings: an index is
//! `Copy`, hashes cheaply, and sidesteps any lifetime entanglement between
//! the symbol arena and everything that references it.

use ahash::AHashMap;

use crate::ast::{Stmt, Type};
use crate::intern::NameId;
use crate::program::{InstanceId, ModuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct SymbolId(u32);

impl SymbolId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum SymbolKind {
    Variable,
    Function,
    Type,
    Constant,
}

/// A resolved declaration (spec §3 "Symbol").
#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: NameId,
    pub ty: Option<Type>,
    pub is_mutable: bool,
    pub is_external: bool,
    pub is_exported: bool,
    pub is_local: bool,
    pub declaration: Stmt,
    pub module_id: ModuleId,
    pub instance_id: InstanceId,
    /// `Some(true)` for `[[reentrant]]`, `Some(false)` for `[[nonreentrant]]`,
    /// `None` when unannotated. Set by the type checker's
    /// `validate_annotations` once the symbol already exists; `pipeline::compile`
    /// builds its default reentrancy-boundary hook from this field.
    pub reentrancy_annotation: Option<bool>,
}

/// Owns every `Symbol` created during resolution. Lives for the whole
/// compilation; never shrinks. `Program` owns exactly one of these.
#[derive(Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(u32::try_from(self.symbols.len()).expect("symbol arena overflowed u32"));
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(u32::try_from(i).expect("symbol arena overflowed u32")), s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A lexical scope. Scopes form a tree via `parent`; `lookup` walks up to
/// the root (spec §3: "Tree of lexical scopes with a unique integer id;
/// `lookup` walks parents. Duplicate names within a scope are rejected.").
#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub symbols: AHashMap<NameId, SymbolId>,
}

/// Owns every `Scope` created while resolving one `Program`.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope arena overflowed u32"));
        self.scopes.push(Scope {
            id,
            parent,
            symbols: AHashMap::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// Walks from `scope` up through its parents looking for `name`.
    pub fn lookup(&self, scope: ScopeId, name: NameId) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if let Some(&sym) = s.symbols.get(&name) {
                return Some(sym);
            }
            current = s.parent;
        }
        None
    }

    pub fn exists_in_current(&self, scope: ScopeId, name: NameId) -> bool {
        self.get(scope).symbols.contains_key(&name)
    }

    /// Defines `name` in `scope`. Returns `false` if `name` is already
    /// defined in this exact scope (duplicate names within a scope are
    /// rejected, spec §3); the caller turns that into a `CompileError`.
    pub fn define(&mut self, scope: ScopeId, name: NameId, sym: SymbolId) -> bool {
        let s = self.get_mut(scope);
        if s.symbols.contains_key(&name) {
            return false;
        }
        s.symbols.insert(name, sym);
        true
    }
}
