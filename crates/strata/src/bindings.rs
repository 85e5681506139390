//! Side tables keyed by `(instance, AST node)` (spec §3 "Bindings", §9
//! "Per-instance binding namespace").
//!
//! Every cross-pass fact that's scoped to a single `(instance, node)` pair
//! — the resolved symbol an identifier binds to, whether an assignment
//! creates a new variable, a checked expression's inferred type, a folded
//! compile-time value — is modeled the same way: a hash map keyed by
//! `(InstanceId, NodeKey)` rather than a field embedded in the shared AST
//! node. [`NodeFacts`] is the one generic building block; [`Bindings`]
//! wraps three instances of it for the three facts the resolver/checker
//! record per spec §3/§4.2.

use ahash::AHashMap;

use crate::ast::{Expr, NodeKey, Stmt, Type, expr_key, stmt_key};
use crate::program::InstanceId;
use crate::symbols::SymbolId;

/// A generic `(instance, node) -> V` side table.
#[derive(Debug)]
pub struct NodeFacts<V> {
    table: AHashMap<(InstanceId, NodeKey), V>,
}

impl<V> Default for NodeFacts<V> {
    fn default() -> Self {
        Self { table: AHashMap::new() }
    }
}

impl<V: Clone> NodeFacts<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, instance: InstanceId, key: NodeKey, value: V) {
        self.table.insert((instance, key), value);
    }

    pub fn get(&self, instance: InstanceId, key: NodeKey) -> Option<&V> {
        self.table.get(&(instance, key))
    }

    pub fn contains(&self, instance: InstanceId, key: NodeKey) -> bool {
        self.table.contains_key(&(instance, key))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = (InstanceId, NodeKey)> + '_ {
        self.table.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// `(instance, node) -> Symbol` bindings, plus the per-identifier and
/// per-expression side-facts the resolver and type checker record alongside
/// them (spec §4.2: "Records each declaration's symbol, each typed
/// expression's type, each identifier's `is_mutable_binding`...").
#[derive(Debug, Default)]
pub struct Bindings {
    symbol_of: NodeFacts<SymbolId>,
    creates_new_variable: NodeFacts<bool>,
    is_mutable_binding: NodeFacts<bool>,
    expr_type: NodeFacts<Type>,
    /// A `FuncDecl` stmt's parameter symbols, in declaration order
    /// (`Parameter` carries no symbol id of its own — the body's own
    /// function scope is where each param's `SymbolId` actually lives, so
    /// this is the only place a caller can recover "param N's symbol" from
    /// just the declaration, which the CTE needs to bind argument values).
    param_symbols: NodeFacts<Vec<SymbolId>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_expr(&mut self, instance: InstanceId, node: &Expr, sym: SymbolId) {
        self.symbol_of.set(instance, expr_key(node), sym);
    }

    pub fn bind_stmt(&mut self, instance: InstanceId, node: &Stmt, sym: SymbolId) {
        self.symbol_of.set(instance, stmt_key(node), sym);
    }

    pub fn lookup_expr(&self, instance: InstanceId, node: &Expr) -> Option<SymbolId> {
        self.symbol_of.get(instance, expr_key(node)).copied()
    }

    pub fn lookup_stmt(&self, instance: InstanceId, node: &Stmt) -> Option<SymbolId> {
        self.symbol_of.get(instance, stmt_key(node)).copied()
    }

    /// Marks whether an assignment expression's LHS identifier introduces a
    /// new variable (spec §4.1 step 3, invariant #4 in §8).
    pub fn set_creates_new_variable(&mut self, instance: InstanceId, node: &Expr, value: bool) {
        self.creates_new_variable.set(instance, expr_key(node), value);
    }

    pub fn creates_new_variable(&self, instance: InstanceId, node: &Expr) -> bool {
        self.creates_new_variable.get(instance, expr_key(node)).copied().unwrap_or(false)
    }

    pub fn set_mutable_binding(&mut self, instance: InstanceId, node: &Expr, value: bool) {
        self.is_mutable_binding.set(instance, expr_key(node), value);
    }

    pub fn is_mutable_binding(&self, instance: InstanceId, node: &Expr) -> bool {
        self.is_mutable_binding.get(instance, expr_key(node)).copied().unwrap_or(false)
    }

    /// Records a checked expression's inferred type (spec §4.2, §4.9
    /// `resolve_type`/query hooks). Value-producing expressions always get
    /// one; `Iteration`/`Repeat` and result-less blocks never do (spec §9
    /// invariant note on `TypeChecker`).
    pub fn set_expr_type(&mut self, instance: InstanceId, node: &Expr, ty: Type) {
        self.expr_type.set(instance, expr_key(node), ty);
    }

    pub fn expr_type(&self, instance: InstanceId, node: &Expr) -> Option<Type> {
        self.expr_type.get(instance, expr_key(node)).cloned()
    }

    pub fn set_param_symbols(&mut self, instance: InstanceId, func_decl: &Stmt, symbols: Vec<SymbolId>) {
        self.param_symbols.set(instance, stmt_key(func_decl), symbols);
    }

    pub fn param_symbols(&self, instance: InstanceId, func_decl: &Stmt) -> Option<&[SymbolId]> {
        self.param_symbols.get(instance, stmt_key(func_decl)).map(Vec::as_slice)
    }
}
