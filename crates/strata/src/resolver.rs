//! The resolver (spec §4.1): predeclares top-level names, walks every
//! statement binding identifiers to symbols, and expands `import`s into
//! per-importer `ModuleInstance`s.
//!
//! Module loading from disk is an external collaborator (crate docs, §1):
//! by the time [`resolve`] runs, every module an `import` could possibly
//! reach is already sitting in `Program.modules`, keyed by path. The
//! resolver's job for an `import` statement is purely: look the path up,
//! detect cycles, and materialize (or reuse) the importer-scoped instance.

use ahash::{AHashMap, AHashSet};

use crate::ast::{Expr, ExprKind, NodeKey, Stmt, StmtKind, Type, TypeKind, make_var_decl, stmt_key};
use crate::bindings::Bindings;
use crate::common::{CompileError, CompileResult, SourceLocation};
use crate::intern::NameId;
use crate::program::{InstanceId, ModuleId, Program};
use crate::symbols::{ScopeId, Symbol, SymbolId, SymbolKind};

/// Resolver-local scratch state. Does not hold `Program`/`Bindings`
/// references directly (see module docs) so every method takes them as
/// explicit parameters; this keeps the borrow graph simple even though
/// resolving an `import` recurses back into `resolve_instance_body`.
#[derive(Debug, Default)]
pub struct Resolver {
    /// Modules currently being walked, used for import-cycle detection.
    resolving_modules: Vec<ModuleId>,
    /// `(imported module, importer scope)` -> the instance created for it.
    instance_cache: AHashMap<(ModuleId, ScopeId), InstanceId>,
    /// Instances whose body has already been predeclared + walked.
    resolved_instances: AHashSet<InstanceId>,
    /// Top-level nodes already given a symbol by `predeclare_instance_symbols`,
    /// so `resolve_stmt` doesn't redefine (and duplicate-name-reject) them.
    predeclared: AHashSet<NodeKey>,
    current_instance: InstanceId,
    current_scope: ScopeId,
}

/// Resolves `entry_module` (and everything it transitively imports) into a
/// fresh root `ModuleInstance`, returning that instance's id.
pub fn resolve(program: &mut Program, bindings: &mut Bindings, entry_module: ModuleId) -> CompileResult<InstanceId> {
    let mut resolver = Resolver::default();
    resolver.create_root_instance(program, bindings, entry_module)
}

/// Resolves a single top-level statement against an already-resolved
/// instance's scope, without predeclaring or re-walking the rest of the
/// module. Used by the type checker to re-run resolution on a monomorphized
/// clone (spec §4.2: "...pushes it to `pending_instantiations`, and re-runs
/// resolution on the clone"); the clone's own symbol is assumed already
/// defined by the caller, so it is marked predeclared up front.
pub fn resolve_instantiation(program: &mut Program, bindings: &mut Bindings, instance: InstanceId, stmt: &Stmt) -> CompileResult<()> {
    let mut resolver = Resolver::default();
    resolver.current_instance = instance;
    resolver.current_scope = program.instance(instance).expect("instance exists").scope_id;
    resolver.predeclared.insert(stmt_key(stmt));
    resolver.resolve_stmt(program, bindings, stmt)
}

impl Resolver {
    fn create_root_instance(
        &mut self,
        program: &mut Program,
        bindings: &mut Bindings,
        module_id: ModuleId,
    ) -> CompileResult<InstanceId> {
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);
        self.resolving_modules.push(module_id);
        let result = self.resolve_instance_body(program, bindings, instance);
        self.resolving_modules.pop();
        result?;
        Ok(instance)
    }

    /// Returns the instance of `module_id` visible from `importer_scope`,
    /// creating it (and recursively resolving it) on first sight.
    fn get_or_create_imported_instance(
        &mut self,
        program: &mut Program,
        bindings: &mut Bindings,
        module_id: ModuleId,
        importer_scope: ScopeId,
        loc: &SourceLocation,
    ) -> CompileResult<InstanceId> {
        if let Some(&cached) = self.instance_cache.get(&(module_id, importer_scope)) {
            return Ok(cached);
        }
        if self.resolving_modules.contains(&module_id) {
            let path = program.module(module_id).map(|m| m.path.clone()).unwrap_or_default();
            return Err(CompileError::new(format!("cyclic import: {path}"), loc.clone()));
        }
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);
        self.instance_cache.insert((module_id, importer_scope), instance);
        self.resolving_modules.push(module_id);
        let result = self.resolve_instance_body(program, bindings, instance);
        self.resolving_modules.pop();
        result?;
        Ok(instance)
    }

    fn resolve_instance_body(&mut self, program: &mut Program, bindings: &mut Bindings, instance: InstanceId) -> CompileResult<()> {
        if self.resolved_instances.contains(&instance) {
            return Ok(());
        }
        self.resolved_instances.insert(instance);
        let saved_instance = self.current_instance;
        let saved_scope = self.current_scope;
        self.current_instance = instance;
        self.current_scope = program.instance(instance).expect("instance just created").scope_id;

        self.predeclare_instance_symbols(program, bindings, instance)?;

        let module_id = program.instance(instance).unwrap().module_id;
        let top_level: Vec<Stmt> = program.module(module_id).expect("module registered").module.top_level.clone();
        for stmt in &top_level {
            self.resolve_stmt(program, bindings, stmt)?;
        }

        // Publish the names this instance exports, for whoever imports it.
        let own_scope = program.instance(instance).unwrap().scope_id;
        let exported: Vec<(NameId, SymbolId)> = program
            .scopes
            .get(own_scope)
            .symbols
            .iter()
            .filter(|(_, sym)| program.symbols.get(**sym).is_exported)
            .map(|(n, s)| (*n, *s))
            .collect();
        let instance_mut = program.instance_mut(instance).unwrap();
        for (name, sym_id) in exported {
            instance_mut.symbols.insert(name, sym_id);
        }

        self.current_instance = saved_instance;
        self.current_scope = saved_scope;
        Ok(())
    }

    /// Predeclares all top-level function, type, and external symbols
    /// (spec §4.1 step 1) so order-independent references work.
    fn predeclare_instance_symbols(&mut self, program: &mut Program, bindings: &mut Bindings, instance: InstanceId) -> CompileResult<()> {
        let module_id = program.instance(instance).unwrap().module_id;
        let scope = program.instance(instance).unwrap().scope_id;
        let top_level: Vec<Stmt> = program.module(module_id).expect("module registered").module.top_level.clone();
        for stmt in &top_level {
            let predeclare_info: Option<(NameId, SymbolKind, bool, bool, bool)> = match &stmt.kind {
                StmtKind::FuncDecl {
                    name,
                    is_exported,
                    is_external,
                    ..
                } => Some((*name, SymbolKind::Function, false, *is_exported, *is_external)),
                StmtKind::TypeDecl { name, .. } => Some((*name, SymbolKind::Type, false, false, false)),
                StmtKind::VarDecl {
                    name,
                    is_mutable,
                    is_exported,
                    is_external,
                    ..
                } if *is_external => Some((*name, SymbolKind::Variable, *is_mutable, *is_exported, true)),
                _ => None,
            };
            let Some((name, kind, is_mutable, is_exported, is_external)) = predeclare_info else {
                continue;
            };
            let ty = match &stmt.kind {
                StmtKind::FuncDecl { .. } | StmtKind::TypeDecl { .. } => None,
                StmtKind::VarDecl { declared_type, .. } => declared_type.clone(),
                _ => unreachable!(),
            };
            let sym_id = program.symbols.alloc(Symbol {
                kind,
                name,
                ty,
                is_mutable,
                is_external,
                is_exported,
                is_local: false,
                declaration: stmt.clone(),
                module_id,
                instance_id: instance,
                reentrancy_annotation: None,
            });
            if !program.scopes.define(scope, name, sym_id) {
                let display = program.interner.resolve(name).to_owned();
                return Err(CompileError::new(format!("duplicate name: {display}"), stmt.location.clone()));
            }
            bindings.bind_stmt(instance, stmt, sym_id);
            self.predeclared.insert(stmt_key(stmt));
        }
        Ok(())
    }

    fn push_scope(&mut self, program: &mut Program) -> ScopeId {
        let parent = self.current_scope;
        let new_scope = program.scopes.push(Some(parent));
        self.current_scope = new_scope;
        new_scope
    }

    fn pop_scope(&mut self, program: &Program, scope: ScopeId) {
        self.current_scope = program.scopes.get(scope).parent.expect("pushed scope always has a parent");
    }

    fn verify_no_shadowing(&self, program: &Program, name: NameId, loc: &SourceLocation) -> CompileResult<()> {
        if program.scopes.exists_in_current(self.current_scope, name) {
            let display = program.interner.resolve(name).to_owned();
            return Err(CompileError::new(format!("duplicate name: {display}"), loc.clone()));
        }
        Ok(())
    }

    fn define_local(&mut self, program: &mut Program, name: NameId, sym: Symbol, loc: &SourceLocation) -> CompileResult<SymbolId> {
        self.verify_no_shadowing(program, name, loc)?;
        let sym_id = program.symbols.alloc(sym);
        program.scopes.define(self.current_scope, name, sym_id);
        Ok(sym_id)
    }

    /// Predeclares the implicit, read-only loop variable an iteration body
    /// binds each element to. It has no name in the AST (`Iteration` carries
    /// no bound-variable field), but the body can still reference it by the
    /// conventional name `_`; declaring it here is what lets that identifier
    /// resolve instead of failing as unbound.
    fn define_iteration_variable(&mut self, program: &mut Program, loc: &SourceLocation) -> CompileResult<SymbolId> {
        let name = program.interner.intern("_");
        let module_id = program.instance(self.current_instance).unwrap().module_id;
        let declaration = make_var_decl(name, None, false, false, false, None, vec![], loc.clone());
        let sym = Symbol {
            kind: SymbolKind::Variable,
            name,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            is_local: true,
            declaration,
            module_id,
            instance_id: self.current_instance,
            reentrancy_annotation: None,
        };
        self.define_local(program, name, sym, loc)
    }

    fn resolve_stmt(&mut self, program: &mut Program, bindings: &mut Bindings, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::ExprStmt(e) => self.resolve_expr(program, bindings, e)?,
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    self.resolve_expr(program, bindings, v)?;
                }
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::VarDecl {
                name,
                declared_type,
                is_mutable,
                is_exported,
                is_external,
                init,
            } => {
                if let Some(ty) = declared_type {
                    self.resolve_type(program, bindings, ty)?;
                }
                if *is_external {
                    // Already predeclared; nothing left to walk (external
                    // vars have no initializer per the VarDecl invariant).
                    return Ok(());
                }
                if let Some(init_expr) = init {
                    self.resolve_expr(program, bindings, init_expr)?;
                }
                let module_id = program.instance(self.current_instance).unwrap().module_id;
                let sym = Symbol {
                    kind: SymbolKind::Variable,
                    name: *name,
                    ty: declared_type.clone(),
                    is_mutable: *is_mutable,
                    is_external: false,
                    is_exported: *is_exported,
                    is_local: self.current_scope != program.instance(self.current_instance).unwrap().scope_id,
                    declaration: stmt.clone(),
                    module_id,
                    instance_id: self.current_instance,
                    reentrancy_annotation: None,
                };
                let sym_id = self.define_local(program, *name, sym, &stmt.location)?;
                bindings.bind_stmt(self.current_instance, stmt, sym_id);
            }
            StmtKind::FuncDecl { name, params, return_type, body, is_external, is_exported } => {
                let already = self.predeclared.contains(&stmt_key(stmt));
                if !already {
                    let module_id = program.instance(self.current_instance).unwrap().module_id;
                    let sym = Symbol {
                        kind: SymbolKind::Function,
                        name: *name,
                        ty: None,
                        is_mutable: false,
                        is_external: *is_external,
                        is_exported: *is_exported,
                        is_local: true,
                        declaration: stmt.clone(),
                        module_id,
                        instance_id: self.current_instance,
                        reentrancy_annotation: None,
                    };
                    let sym_id = self.define_local(program, *name, sym, &stmt.location)?;
                    bindings.bind_stmt(self.current_instance, stmt, sym_id);
                }
                for param in params {
                    self.resolve_type(program, bindings, &param.ty)?;
                }
                if let Some(rt) = return_type {
                    self.resolve_type(program, bindings, rt)?;
                }
                if let Some(body_expr) = body {
                    let fn_scope = self.push_scope(program);
                    let mut param_sym_ids = Vec::with_capacity(params.len());
                    for param in params {
                        let module_id = program.instance(self.current_instance).unwrap().module_id;
                        let param_sym = Symbol {
                            kind: SymbolKind::Variable,
                            name: param.name,
                            ty: Some(param.ty.clone()),
                            is_mutable: param.is_ref,
                            is_external: false,
                            is_exported: false,
                            is_local: true,
                            declaration: stmt.clone(),
                            module_id,
                            instance_id: self.current_instance,
                            reentrancy_annotation: None,
                        };
                        self.verify_no_shadowing(program, param.name, &param.location)?;
                        let param_sym_id = program.symbols.alloc(param_sym);
                        program.scopes.define(fn_scope, param.name, param_sym_id);
                        param_sym_ids.push(param_sym_id);
                    }
                    bindings.set_param_symbols(self.current_instance, stmt, param_sym_ids);
                    self.resolve_expr(program, bindings, body_expr)?;
                    self.pop_scope(program, fn_scope);
                } else if !*is_external {
                    return Err(CompileError::new(
                        format!("non-external function '{}' has no body", program.interner.resolve(*name)),
                        stmt.location.clone(),
                    ));
                } else if *is_external && body.is_some() {
                    return Err(CompileError::new("external function has a body", stmt.location.clone()));
                }
            }
            StmtKind::TypeDecl { fields, .. } => {
                for field in fields {
                    self.resolve_type(program, bindings, &field.ty)?;
                }
            }
            StmtKind::Import { path } => self.handle_import(program, bindings, stmt, path)?,
            StmtKind::ConditionalStmt { condition, then_block, else_block } => {
                self.resolve_expr(program, bindings, condition)?;
                let then_scope = self.push_scope(program);
                for s in then_block {
                    self.resolve_stmt(program, bindings, s)?;
                }
                self.pop_scope(program, then_scope);
                let else_scope = self.push_scope(program);
                for s in else_block {
                    self.resolve_stmt(program, bindings, s)?;
                }
                self.pop_scope(program, else_scope);
            }
        }
        Ok(())
    }

    fn handle_import(&mut self, program: &mut Program, bindings: &mut Bindings, stmt: &Stmt, path: &[NameId]) -> CompileResult<()> {
        let joined = path
            .iter()
            .map(|n| program.interner.resolve(*n).to_owned())
            .collect::<Vec<_>>()
            .join("::");
        let Some(&target_module) = program.path_to_id.get(&joined) else {
            return Err(CompileError::new(format!("unknown module: {joined}"), stmt.location.clone()));
        };
        let importer_scope = self.current_scope;
        let target_instance = self.get_or_create_imported_instance(program, bindings, target_module, importer_scope, &stmt.location)?;

        let exported: Vec<(NameId, SymbolId)> = program
            .instance(target_instance)
            .unwrap()
            .symbols
            .iter()
            .map(|(n, s)| (*n, *s))
            .collect();
        for (name, sym_id) in exported {
            self.verify_no_shadowing(program, name, &stmt.location)?;
            program.scopes.define(importer_scope, name, sym_id);
        }
        let _ = bindings;
        Ok(())
    }

    fn resolve_type(&mut self, program: &mut Program, bindings: &mut Bindings, ty: &Type) -> CompileResult<()> {
        match &ty.kind {
            TypeKind::Primitive(_) | TypeKind::TypeVar(_) => {}
            TypeKind::Named(name) => {
                if program.scopes.lookup(self.current_scope, *name).is_none() {
                    return Err(CompileError::new(
                        format!("unknown type: {}", program.interner.resolve(*name)),
                        ty.location.clone(),
                    ));
                }
            }
            TypeKind::Array { elem, size } => {
                self.resolve_type(program, bindings, elem)?;
                self.resolve_expr(program, bindings, size)?;
            }
            TypeKind::TypeOf(expr) => self.resolve_expr(program, bindings, expr)?,
        }
        Ok(())
    }

    fn resolve_expr(&mut self, program: &mut Program, bindings: &mut Bindings, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral { .. }
            | ExprKind::UIntLiteral { .. }
            | ExprKind::FloatLiteral { .. }
            | ExprKind::CharLiteral { .. }
            | ExprKind::StringLiteral { .. }
            | ExprKind::ResourcePath { .. }
            | ExprKind::Process { .. } => {}
            ExprKind::Identifier { name } => {
                self.bind_identifier(program, bindings, expr, *name, true)?;
            }
            ExprKind::Binary { left, right, .. } => {
                self.resolve_expr(program, bindings, left)?;
                self.resolve_expr(program, bindings, right)?;
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(program, bindings, operand)?,
            ExprKind::Call { callee, args, receivers } => {
                if let ExprKind::Identifier { name } = &callee.kind {
                    // A callee identifier is allowed to survive unresolved:
                    // the type checker re-checks it when looking up/creating
                    // a monomorphized instantiation (spec §4.1).
                    self.bind_identifier(program, bindings, callee, *name, false)?;
                } else {
                    self.resolve_expr(program, bindings, callee)?;
                }
                for r in receivers {
                    self.resolve_expr(program, bindings, r)?;
                }
                for a in args {
                    self.resolve_expr(program, bindings, a)?;
                }
            }
            ExprKind::Index { base, index } => {
                self.resolve_expr(program, bindings, base)?;
                self.resolve_expr(program, bindings, index)?;
            }
            ExprKind::Member { base, .. } => self.resolve_expr(program, bindings, base)?,
            ExprKind::ArrayLiteral { elements } | ExprKind::TupleLiteral { elements } => {
                for e in elements {
                    self.resolve_expr(program, bindings, e)?;
                }
            }
            ExprKind::Block { statements, result } => {
                let scope = self.push_scope(program);
                for s in statements {
                    self.resolve_stmt(program, bindings, s)?;
                }
                if let Some(r) = result {
                    self.resolve_expr(program, bindings, r)?;
                }
                self.pop_scope(program, scope);
            }
            ExprKind::Conditional { condition, true_expr, false_expr } => {
                self.resolve_expr(program, bindings, condition)?;
                self.resolve_expr(program, bindings, true_expr)?;
                self.resolve_expr(program, bindings, false_expr)?;
            }
            ExprKind::Cast { target, operand } => {
                self.resolve_type(program, bindings, target)?;
                self.resolve_expr(program, bindings, operand)?;
            }
            ExprKind::Assignment { lhs, rhs } => {
                self.resolve_expr(program, bindings, rhs)?;
                self.resolve_assignment_lhs(program, bindings, lhs)?;
            }
            ExprKind::Range { start, end } => {
                self.resolve_expr(program, bindings, start)?;
                self.resolve_expr(program, bindings, end)?;
            }
            ExprKind::Length { operand } => self.resolve_expr(program, bindings, operand)?,
            ExprKind::Iteration { subject, body, .. } => {
                self.resolve_expr(program, bindings, subject)?;
                let scope = self.push_scope(program);
                let loop_var = self.define_iteration_variable(program, &expr.location)?;
                // Recorded on the `Iteration` node itself rather than on an
                // identifier (the body may never spell `_` out), so the CTE
                // can bind each element to the right symbol without having
                // to re-walk the body looking for references to it.
                bindings.bind_expr(self.current_instance, expr, loop_var);
                self.resolve_expr(program, bindings, body)?;
                self.pop_scope(program, scope);
            }
            ExprKind::Repeat { condition, body } => {
                self.resolve_expr(program, bindings, condition)?;
                let scope = self.push_scope(program);
                self.resolve_expr(program, bindings, body)?;
                self.pop_scope(program, scope);
            }
        }
        Ok(())
    }

    /// Resolves a plain identifier reference. `required` controls whether a
    /// lookup miss is a hard error or is left unbound for a later pass.
    fn bind_identifier(&mut self, program: &mut Program, bindings: &mut Bindings, expr: &Expr, name: NameId, required: bool) -> CompileResult<()> {
        match program.scopes.lookup(self.current_scope, name) {
            Some(sym_id) => {
                bindings.bind_expr(self.current_instance, expr, sym_id);
                let is_mutable = program.symbols.get(sym_id).is_mutable;
                bindings.set_mutable_binding(self.current_instance, expr, is_mutable);
                Ok(())
            }
            None if required => Err(CompileError::new(
                format!("unresolved identifier: {}", program.interner.resolve(name)),
                expr.location.clone(),
            )),
            None => Ok(()),
        }
    }

    fn resolve_assignment_lhs(&mut self, program: &mut Program, bindings: &mut Bindings, lhs: &Expr) -> CompileResult<()> {
        let ExprKind::Identifier { name } = &lhs.kind else {
            // Not an identifier: an lvalue path (`a.b[i]`); walk it like an
            // ordinary read so its base gets bound, but no new-variable flag.
            return self.resolve_expr(program, bindings, lhs);
        };
        match program.scopes.lookup(self.current_scope, *name) {
            Some(sym_id) => {
                bindings.bind_expr(self.current_instance, lhs, sym_id);
                bindings.set_creates_new_variable(self.current_instance, lhs, false);
                let is_mutable = program.symbols.get(sym_id).is_mutable;
                bindings.set_mutable_binding(self.current_instance, lhs, is_mutable);
            }
            None => {
                let module_id = program.instance(self.current_instance).unwrap().module_id;
                let sym = Symbol {
                    kind: SymbolKind::Variable,
                    name: *name,
                    ty: None,
                    is_mutable: true,
                    is_external: false,
                    is_exported: false,
                    is_local: true,
                    declaration: crate::ast::make_expr_stmt(lhs.clone(), lhs.location.clone()),
                    module_id,
                    instance_id: self.current_instance,
                    reentrancy_annotation: None,
                };
                let sym_id = program.symbols.alloc(sym);
                program.scopes.define(self.current_scope, *name, sym_id);
                bindings.bind_expr(self.current_instance, lhs, sym_id);
                bindings.set_creates_new_variable(self.current_instance, lhs, true);
                bindings.set_mutable_binding(self.current_instance, lhs, true);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::program::Module;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.strata", 1, 1)
    }

    fn one_module_program(top_level: Vec<Stmt>) -> (Program, ModuleId) {
        let mut program = Program::new();
        let module_id = program.add_module("t.strata", Module { top_level });
        (program, module_id)
    }

    #[test]
    fn resolves_a_simple_var_decl_initializer() {
        let (mut program, module_id) = one_module_program(vec![]);
        let x = program.interner.intern("x");
        let init = make_int(10, "10", loc());
        let decl = make_var_decl(x, None, false, false, false, Some(init), vec![], loc());
        program.module_mut(module_id).unwrap().module.top_level.push(decl);

        let mut bindings = Bindings::new();
        let instance = resolve(&mut program, &mut bindings, module_id).unwrap();
        assert_eq!(program.instances.len(), 1);
        let _ = instance;
    }

    #[test]
    fn forward_reference_to_a_later_global_fails() {
        let (mut program, module_id) = one_module_program(vec![]);
        let x = program.interner.intern("x");
        let y = program.interner.intern("y");
        let use_x = make_identifier(x, loc());
        let decl_y = make_var_decl(y, None, false, false, false, Some(use_x), vec![], loc());
        let decl_x = make_var_decl(x, None, false, false, false, Some(make_int(1, "1", loc())), vec![], loc());
        program.module_mut(module_id).unwrap().module.top_level.push(decl_y);
        program.module_mut(module_id).unwrap().module.top_level.push(decl_x);

        let mut bindings = Bindings::new();
        let result = resolve(&mut program, &mut bindings, module_id);
        assert!(result.is_err());
    }

    #[test]
    fn function_predeclaration_allows_forward_calls() {
        let (mut program, module_id) = one_module_program(vec![]);
        let f = program.interner.intern("f");
        let g = program.interner.intern("g");
        // func f() { g(); }
        let call_g = make_call(make_identifier(g, loc()), vec![], vec![], loc());
        let f_body = make_block(vec![make_expr_stmt(call_g, loc())], None, loc());
        let f_decl = make_func_decl(f, vec![], None, Some(f_body), false, false, vec![], loc());
        // func g() { }
        let g_body = make_block(vec![], None, loc());
        let g_decl = make_func_decl(g, vec![], None, Some(g_body), false, false, vec![], loc());
        program.module_mut(module_id).unwrap().module.top_level.push(f_decl);
        program.module_mut(module_id).unwrap().module.top_level.push(g_decl);

        let mut bindings = Bindings::new();
        let result = resolve(&mut program, &mut bindings, module_id);
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn assignment_to_undefined_name_creates_new_variable() {
        let (mut program, module_id) = one_module_program(vec![]);
        let f = program.interner.intern("f");
        let x = program.interner.intern("x");
        let assign = make_assignment(make_identifier(x, loc()), make_int(1, "1", loc()), loc());
        let body = make_block(vec![make_expr_stmt(assign.clone(), loc())], None, loc());
        let f_decl = make_func_decl(f, vec![], None, Some(body), false, false, vec![], loc());
        program.module_mut(module_id).unwrap().module.top_level.push(f_decl);

        let mut bindings = Bindings::new();
        let instance = resolve(&mut program, &mut bindings, module_id).unwrap();
        let ExprKind::Assignment { lhs, .. } = &assign.kind else { unreachable!() };
        assert!(bindings.creates_new_variable(instance, lhs));
    }

    #[test]
    fn duplicate_top_level_names_are_rejected() {
        let (mut program, module_id) = one_module_program(vec![]);
        let f = program.interner.intern("f");
        let decl_a = make_func_decl(f, vec![], None, Some(make_block(vec![], None, loc())), false, false, vec![], loc());
        let decl_b = make_func_decl(f, vec![], None, Some(make_block(vec![], None, loc())), false, false, vec![], loc());
        program.module_mut(module_id).unwrap().module.top_level.push(decl_a);
        program.module_mut(module_id).unwrap().module.top_level.push(decl_b);

        let mut bindings = Bindings::new();
        let result = resolve(&mut program, &mut bindings, module_id);
        assert!(result.is_err());
    }

    #[test]
    fn self_importing_module_is_a_cycle() {
        let mut program = Program::new();
        // Registered under the same single-segment path it will import.
        let module_id = program.add_module("t", Module::default());
        let path = program.interner.intern("t");
        let import_stmt = make_import(vec![path], loc());
        program.module_mut(module_id).unwrap().module.top_level.push(import_stmt);

        let mut bindings = Bindings::new();
        let result = resolve(&mut program, &mut bindings, module_id);
        assert!(result.is_err());
    }

    #[test]
    fn diamond_import_reuses_the_shared_module_instance() {
        let mut program = Program::new();
        let shared = program.add_module("shared", Module::default());
        let shared_name = program.interner.intern("value");
        let shared_decl = make_var_decl(shared_name, None, false, true, false, Some(make_int(1, "1", loc())), vec![], loc());
        program.module_mut(shared).unwrap().module.top_level.push(shared_decl);

        let shared_path = program.interner.intern("shared");
        let root = program.add_module("root", Module::default());
        program
            .module_mut(root)
            .unwrap()
            .module
            .top_level
            .push(make_import(vec![shared_path], loc()));

        let mut bindings = Bindings::new();
        let instance = resolve(&mut program, &mut bindings, root).unwrap();
        let _ = instance;
        // `shared` was resolved exactly once: its own instance plus root's.
        assert_eq!(program.instances.len(), 2);
    }

    #[test]
    fn iteration_body_can_reference_the_implicit_loop_variable() {
        let (mut program, module_id) = one_module_program(vec![]);
        let f = program.interner.intern("f");
        let xs = program.interner.intern("xs");
        let underscore = program.interner.intern("_");
        let subject = make_identifier(xs, loc());
        let body = make_identifier(underscore, loc());
        let iteration = make_iteration(subject, body.clone(), false, loc());
        let f_body = make_block(vec![make_expr_stmt(iteration.clone(), loc())], None, loc());
        let xs_decl = make_var_decl(xs, None, false, false, false, Some(make_int(0, "0", loc())), vec![], loc());
        let f_decl = make_func_decl(f, vec![], None, Some(f_body), false, false, vec![], loc());
        program.module_mut(module_id).unwrap().module.top_level.push(xs_decl);
        program.module_mut(module_id).unwrap().module.top_level.push(f_decl);

        let mut bindings = Bindings::new();
        let instance = resolve(&mut program, &mut bindings, module_id).unwrap();
        // The `Iteration` node itself is bound to the same symbol its body's
        // `_` reference resolved to.
        let loop_sym = bindings.lookup_expr(instance, &iteration).expect("iteration node bound to its loop variable");
        assert_eq!(bindings.lookup_expr(instance, &body), Some(loop_sym));
    }
}
