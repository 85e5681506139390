//! The type checker (spec §4.2): one pass over every instance's top-level
//! statements, with expression-level inference, generic monomorphization,
//! and annotation validation.
//!
//! Mirrors `resolver.rs`'s shape: `TypeChecker` is scratch state only,
//! `Program`/`Bindings` are threaded through as explicit parameters.

mod clone;
pub mod signature;

use ahash::AHashMap;

use crate::ast::{self, BinOp, Expr, ExprKind, KnownAnnotation, PrimitiveType, Stmt, StmtKind, Type, TypeKind, UnOp};
use crate::bindings::Bindings;
use crate::common::{CompileError, CompileResult, Diagnostic, SourceLocation};
use crate::intern::NameId;
use crate::program::{InstanceId, Program};
use crate::symbols::{SymbolId, SymbolKind};
use signature::{TypeSignature, mangle_generic_name, types_structurally_equal};

/// A completed generic instantiation: the specialized declaration (its
/// mangled name is its `FuncDecl::name`), so a second call site with the
/// same signature can read its return type back out without re-cloning or
/// re-resolving.
#[derive(Debug, Clone)]
struct GenericInstantiation {
    declaration: Stmt,
}

/// Output of a full type-check pass: what the monomorphizer (§4.3) drains
/// and what later stages (residualizer's synthetic tuple types) consult.
#[derive(Debug, Default)]
pub struct TypeCheckOutput {
    /// New top-level declarations produced by monomorphization, each tagged
    /// with the instance whose module they belong in.
    pub pending_instantiations: Vec<(InstanceId, Stmt)>,
    /// `__tup{N}_T1_..._TN` composite name -> its element types (spec §4.2).
    pub forced_tuple_types: AHashMap<String, Vec<Type>>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Default)]
pub struct TypeChecker {
    current_instance: InstanceId,
    instantiations: AHashMap<(NameId, InstanceId), AHashMap<TypeSignature, GenericInstantiation>>,
    output: TypeCheckOutput,
    /// True inside a loop body (`@`/`@@`), gating `break`/`continue` — not
    /// currently enforced as an error since the lowerer/parser boundary
    /// already guarantees structural placement, kept for symmetry with the
    /// original's `loop_depth` and available for a future diagnostic.
    loop_depth: u32,
}

/// Type-checks every instance of `program`, draining generic instantiations
/// until none remain (new ones can be discovered while checking earlier
/// ones, same as the monomorphizer's own drain loop in spec §4.3, run here
/// inline so each instantiation's body is checked before the pass returns).
pub fn check(program: &mut Program, bindings: &mut Bindings) -> CompileResult<TypeCheckOutput> {
    let mut checker = TypeChecker::default();
    let instance_ids: Vec<InstanceId> = program.instances.iter().map(|i| i.id).collect();
    for instance in instance_ids {
        checker.current_instance = instance;
        let module_id = program.instance(instance).unwrap().module_id;
        let top_level: Vec<Stmt> = program.module(module_id).expect("module registered").module.top_level.clone();
        for stmt in &top_level {
            checker.check_stmt(program, bindings, stmt)?;
        }
    }

    // Drain newly discovered instantiations; checking one clone's body can
    // reveal further generic calls (spec §4.3: "new instantiations may be
    // discovered while type-checking earlier ones").
    let mut cursor = 0;
    while cursor < checker.output.pending_instantiations.len() {
        let (instance, stmt) = checker.output.pending_instantiations[cursor].clone();
        checker.current_instance = instance;
        checker.check_stmt(program, bindings, &stmt)?;
        cursor += 1;
    }

    Ok(std::mem::take(&mut checker.output))
}

impl TypeChecker {
    fn check_stmt(&mut self, program: &mut Program, bindings: &mut Bindings, stmt: &Stmt) -> CompileResult<()> {
        let reentrancy_annotation = self.validate_annotations(&stmt.annotations, &stmt.location)?;
        if let (Some(is_reentrant), StmtKind::FuncDecl { name, .. }) = (reentrancy_annotation, &stmt.kind) {
            let scope = program.instance(self.current_instance).unwrap().scope_id;
            if let Some(sym_id) = program.scopes.lookup(scope, *name) {
                program.symbols.get_mut(sym_id).reentrancy_annotation = Some(is_reentrant);
            }
        }
        match &stmt.kind {
            StmtKind::ExprStmt(e) => {
                self.check_expr(program, bindings, e)?;
            }
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    self.check_expr(program, bindings, v)?;
                }
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Import { .. } => {}
            StmtKind::VarDecl { declared_type, init, .. } => {
                let declared = declared_type.clone();
                let init_ty = match init {
                    Some(e) => Some(self.check_expr(program, bindings, e)?),
                    None => None,
                };
                if let (Some(declared), Some(init_ty)) = (&declared, &init_ty) {
                    if let Some(init_expr) = init {
                        self.reconcile_literal(bindings, init_expr, declared, init_ty);
                    }
                    if !self.types_unify(declared, init_ty) {
                        return Err(CompileError::new(
                            format!("cannot initialize '{}' with a value of a different type", self.display_type(program, declared)),
                            stmt.location.clone(),
                        ));
                    }
                }
            }
            StmtKind::FuncDecl { params, return_type, body, .. } => {
                if ast::is_generic_function(params, return_type.as_ref()) {
                    // The generic original is never checked directly; each
                    // call site drives a concrete instantiation instead.
                    return Ok(());
                }
                if let Some(body_expr) = body {
                    let body_ty = self.check_expr(program, bindings, body_expr)?;
                    if let Some(expected) = return_type {
                        if !self.types_unify(expected, &body_ty) {
                            return Err(CompileError::new(
                                format!("function body type does not match declared return type '{}'", self.display_type(program, expected)),
                                stmt.location.clone(),
                            ));
                        }
                    }
                }
            }
            StmtKind::TypeDecl { name, fields } => {
                self.check_recursive_type(program, *name, fields, &stmt.location)?;
            }
            StmtKind::ConditionalStmt { condition, then_block, else_block } => {
                let cond_ty = self.check_expr(program, bindings, condition)?;
                self.require_bool(program, &cond_ty, &condition.location)?;
                for s in then_block {
                    self.check_stmt(program, bindings, s)?;
                }
                for s in else_block {
                    self.check_stmt(program, bindings, s)?;
                }
            }
        }
        Ok(())
    }

    /// Parses `[[reentrant]]`/`[[nonreentrant]]` off one declaration's
    /// annotations, rejecting a same-declaration conflict and warning on
    /// anything else unrecognized. Returns `Some(true)`/`Some(false)` when one
    /// of the two applies, `None` otherwise; `check_stmt` persists that value
    /// onto the declaration's own `Symbol` so `pipeline::compile` can build
    /// its default reentrancy-boundary hook from real annotations instead of
    /// requiring every caller to supply one.
    fn validate_annotations(&mut self, annotations: &[ast::Annotation], loc: &SourceLocation) -> CompileResult<Option<bool>> {
        let mut reentrant = false;
        let mut nonreentrant = false;
        for a in annotations {
            match a.name.parse::<KnownAnnotation>() {
                Ok(KnownAnnotation::Reentrant) => reentrant = true,
                Ok(KnownAnnotation::Nonreentrant) => nonreentrant = true,
                Ok(_) => {}
                Err(_) => {
                    self.output
                        .diagnostics
                        .push(Diagnostic::warning(format!("unknown annotation '{}'", a.name), a.location.clone()));
                }
            }
        }
        if reentrant && nonreentrant {
            return Err(CompileError::new("'reentrant' and 'nonreentrant' cannot both apply to the same declaration", loc.clone()));
        }
        Ok(if reentrant {
            Some(true)
        } else if nonreentrant {
            Some(false)
        } else {
            None
        })
    }

    /// Rejects a record type whose fields transitively contain itself
    /// without indirection (SPEC_FULL.md supplemental feature 7).
    fn check_recursive_type(&self, program: &Program, name: NameId, fields: &[ast::FieldDecl], loc: &SourceLocation) -> CompileResult<()> {
        let mut stack = vec![name];
        for field in fields {
            if self.type_contains_named(program, &field.ty, &mut stack) {
                return Err(CompileError::new(
                    format!("type '{}' is recursive without indirection", program.interner.resolve(name)),
                    loc.clone(),
                ));
            }
        }
        Ok(())
    }

    fn type_contains_named(&self, program: &Program, ty: &Type, stack: &mut Vec<NameId>) -> bool {
        match &ty.kind {
            TypeKind::Named(n) => {
                if stack.contains(n) {
                    return true;
                }
                let Some(sym_id) = program.scopes.lookup(program.instance(self.current_instance).unwrap().scope_id, *n) else {
                    return false;
                };
                let StmtKind::TypeDecl { fields, .. } = &program.symbols.get(sym_id).declaration.kind else {
                    return false;
                };
                stack.push(*n);
                let hit = fields.iter().any(|f| self.type_contains_named(program, &f.ty, stack));
                stack.pop();
                hit
            }
            TypeKind::Array { elem, .. } => self.type_contains_named(program, elem, stack),
            TypeKind::Primitive(_) | TypeKind::TypeVar(_) | TypeKind::TypeOf(_) => false,
        }
    }

    fn check_expr(&mut self, program: &mut Program, bindings: &mut Bindings, expr: &Expr) -> CompileResult<Type> {
        let ty = self.infer_expr(program, bindings, expr)?;
        bindings.set_expr_type(self.current_instance, expr, ty.clone());
        Ok(ty)
    }

    fn infer_expr(&mut self, program: &mut Program, bindings: &mut Bindings, expr: &Expr) -> CompileResult<Type> {
        match &expr.kind {
            ExprKind::IntLiteral { .. } => Ok(default_int_type(&expr.location)),
            ExprKind::UIntLiteral { .. } => Ok(ast::make_primitive(PrimitiveType::Unsigned(64), expr.location.clone())),
            ExprKind::FloatLiteral { .. } => Ok(ast::make_primitive(PrimitiveType::F64, expr.location.clone())),
            ExprKind::CharLiteral { .. } => Ok(ast::make_primitive(PrimitiveType::Unsigned(32), expr.location.clone())),
            ExprKind::StringLiteral { .. } => Ok(ast::make_primitive(PrimitiveType::String, expr.location.clone())),
            ExprKind::Identifier { .. } => self.type_of_bound_symbol(program, bindings, expr),
            ExprKind::Binary { op, left, right } => self.check_binary(program, bindings, *op, left, right, &expr.location),
            ExprKind::Unary { op, operand } => self.check_unary(program, bindings, *op, operand),
            ExprKind::Call { callee, args, receivers } => self.check_call(program, bindings, callee, args, receivers, &expr.location),
            ExprKind::Index { base, index } => self.check_index(program, bindings, base, index, &expr.location),
            ExprKind::Member { base, field } => self.check_member(program, bindings, base, *field, &expr.location),
            ExprKind::ArrayLiteral { elements } => self.check_array_literal(program, bindings, elements, &expr.location),
            ExprKind::TupleLiteral { elements } => self.check_tuple_literal(program, bindings, elements, &expr.location),
            ExprKind::Block { statements, result } => {
                for s in statements {
                    self.check_stmt(program, bindings, s)?;
                }
                match result {
                    Some(r) => self.check_expr(program, bindings, r),
                    None => Ok(unit_type(&expr.location)),
                }
            }
            ExprKind::Conditional { condition, true_expr, false_expr } => {
                let cond_ty = self.check_expr(program, bindings, condition)?;
                self.require_bool(program, &cond_ty, &condition.location)?;
                let a = self.check_expr(program, bindings, true_expr)?;
                let b = self.check_expr(program, bindings, false_expr)?;
                if !self.types_unify(&a, &b) {
                    return Err(CompileError::new("conditional branches have different types", expr.location.clone()));
                }
                Ok(a)
            }
            ExprKind::Cast { target, operand } => {
                self.check_expr(program, bindings, operand)?;
                Ok(target.clone())
            }
            ExprKind::Assignment { lhs, rhs } => {
                let rhs_ty = self.check_expr(program, bindings, rhs)?;
                let lhs_ty = self.check_expr(program, bindings, lhs)?;
                if !bindings.creates_new_variable(self.current_instance, lhs) && !self.types_unify(&lhs_ty, &rhs_ty) {
                    return Err(CompileError::new("assignment type mismatch", expr.location.clone()));
                }
                Ok(rhs_ty)
            }
            ExprKind::Range { start, end } => {
                let start_ty = self.check_expr(program, bindings, start)?;
                self.check_expr(program, bindings, end)?;
                Ok(start_ty)
            }
            ExprKind::Length { operand } => {
                self.check_expr(program, bindings, operand)?;
                Ok(ast::make_primitive(PrimitiveType::Unsigned(64), expr.location.clone()))
            }
            ExprKind::Iteration { subject, body, .. } => {
                let subject_ty = self.check_expr(program, bindings, subject)?;
                if let TypeKind::Named(_) = &subject_ty.kind {
                    self.try_custom_iteration(program, bindings, &subject_ty, expr)?;
                }
                self.check_expr(program, bindings, body)?;
                Ok(unit_type(&expr.location))
            }
            ExprKind::Repeat { condition, body } => {
                let cond_ty = self.check_expr(program, bindings, condition)?;
                self.require_bool(program, &cond_ty, &condition.location)?;
                self.loop_depth += 1;
                let result = self.check_expr(program, bindings, body);
                self.loop_depth -= 1;
                result?;
                Ok(unit_type(&expr.location))
            }
            ExprKind::ResourcePath { .. } => Ok(ast::make_primitive(PrimitiveType::String, expr.location.clone())),
            ExprKind::Process { .. } => Ok(unit_type(&expr.location)),
        }
    }

    fn type_of_bound_symbol(&self, program: &Program, bindings: &Bindings, expr: &Expr) -> CompileResult<Type> {
        match bindings.lookup_expr(self.current_instance, expr) {
            Some(sym_id) => match &program.symbols.get(sym_id).ty {
                Some(ty) => Ok(ty.clone()),
                None => Ok(ast::make_typevar(program.symbols.get(sym_id).name, expr.location.clone())),
            },
            // Unresolved callee identifiers are allowed to survive the
            // resolver (spec §4.1); by the time a bare read reaches here
            // unresolved, it is a genuine error.
            None => Err(CompileError::new("reference to an unresolved identifier", expr.location.clone())),
        }
    }

    fn check_binary(&mut self, program: &mut Program, bindings: &mut Bindings, op: BinOp, left: &Expr, right: &Expr, loc: &SourceLocation) -> CompileResult<Type> {
        let left_ty = self.check_expr(program, bindings, left)?;
        let right_ty = self.check_expr(program, bindings, right)?;
        self.reconcile_literal(bindings, left, &right_ty, &left_ty);
        self.reconcile_literal(bindings, right, &left_ty, &right_ty);

        if op.is_logical() {
            self.require_bool(program, &left_ty, &left.location)?;
            self.require_bool(program, &right_ty, &right.location)?;
            return Ok(ast::make_primitive(PrimitiveType::Bool, loc.clone()));
        }
        if let TypeKind::Named(_) = &left_ty.kind {
            if let Some(result_ty) = self.try_operator_overload(program, op, &left_ty, &right_ty)? {
                return Ok(result_ty);
            }
        }
        let (Some(lf), Some(rf)) = (type_family(&left_ty), type_family(&right_ty)) else {
            return Err(CompileError::new(format!("operator '{op}' requires primitive numeric operands"), loc.clone()));
        };
        if lf != rf {
            return Err(CompileError::new(format!("operator '{op}' requires operands of the same type family"), loc.clone()));
        }
        if op.is_comparison() {
            return Ok(ast::make_primitive(PrimitiveType::Bool, loc.clone()));
        }
        Ok(left_ty)
    }

    fn check_unary(&mut self, program: &mut Program, bindings: &mut Bindings, op: UnOp, operand: &Expr) -> CompileResult<Type> {
        let ty = self.check_expr(program, bindings, operand)?;
        match op {
            UnOp::Not => {
                self.require_bool(program, &ty, &operand.location)?;
                Ok(ty)
            }
            UnOp::Neg | UnOp::BitNot => Ok(ty),
        }
    }

    /// SPEC_FULL.md supplemental feature 6: a binary op on a named type
    /// falls back to a module-scoped `op_<name>` function taking the
    /// left-hand operand as its first (ref) parameter, before failing.
    fn try_operator_overload(&mut self, program: &mut Program, op: BinOp, receiver_ty: &Type, right_ty: &Type) -> CompileResult<Option<Type>> {
        let fn_name = format!("op_{op}");
        let Some(sym_id) = self.lookup_method(program, &fn_name) else {
            return Ok(None);
        };
        let StmtKind::FuncDecl { params, return_type, .. } = &program.symbols.get(sym_id).declaration.kind else {
            return Ok(None);
        };
        if params.len() != 2 || !self.types_unify(&params[0].ty, receiver_ty) || !self.types_unify(&params[1].ty, right_ty) {
            return Ok(None);
        }
        Ok(return_type.clone())
    }

    /// SPEC_FULL.md supplemental feature 6: an iteration subject typed as a
    /// named type falls back to a module-scoped `iter` function taking the
    /// subject as its sole (ref) parameter and returning an array, before
    /// the loop variable (resolver.rs's `_`) is left untyped. Only the
    /// typechecking half is implemented — the CTE's `eval_iteration` still
    /// only folds a subject that evaluates to an actual `CTValue::Array`,
    /// so a custom-iterable subject type checks but is never constant-folded.
    fn try_custom_iteration(&mut self, program: &mut Program, bindings: &Bindings, subject_ty: &Type, iteration_expr: &Expr) -> CompileResult<()> {
        let Some(sym_id) = self.lookup_method(program, "iter") else {
            return Ok(());
        };
        let StmtKind::FuncDecl { params, return_type, .. } = &program.symbols.get(sym_id).declaration.kind else {
            return Ok(());
        };
        if params.len() != 1 || !self.types_unify(&params[0].ty, subject_ty) {
            return Ok(());
        }
        let Some(elem_ty) = return_type.as_ref().and_then(|ty| match &ty.kind {
            TypeKind::Array { elem, .. } => Some(elem.clone()),
            _ => None,
        }) else {
            return Ok(());
        };
        if let Some(loop_sym) = bindings.lookup_expr(self.current_instance, iteration_expr) {
            program.symbols.get_mut(loop_sym).ty = Some(elem_ty);
        }
        Ok(())
    }

    fn lookup_method(&self, program: &mut Program, name: &str) -> Option<SymbolId> {
        let scope = program.instance(self.current_instance).unwrap().scope_id;
        let name_id = program.interner.intern(name);
        let sym_id = program.scopes.lookup(scope, name_id)?;
        matches!(program.symbols.get(sym_id).kind, SymbolKind::Function).then_some(sym_id)
    }

    fn check_call(&mut self, program: &mut Program, bindings: &mut Bindings, callee: &Expr, args: &[Expr], receivers: &[Expr], loc: &SourceLocation) -> CompileResult<Type> {
        // Receivers bind to the callee's leading (ref) parameters
        // (SPEC_FULL.md supplemental feature 6: "left-hand receiver as first
        // ref-parameter").
        let arg_types: Vec<Type> = receivers
            .iter()
            .chain(args.iter())
            .map(|a| self.check_expr(program, bindings, a))
            .collect::<CompileResult<_>>()?;

        let ExprKind::Identifier { .. } = &callee.kind else {
            self.check_expr(program, bindings, callee)?;
            return Err(CompileError::new("call target is not a function", loc.clone()));
        };
        let Some(sym_id) = bindings.lookup_expr(self.current_instance, callee) else {
            return Err(CompileError::new("call to an unresolved function", loc.clone()));
        };
        let symbol = program.symbols.get(sym_id).clone();
        let StmtKind::FuncDecl { params, return_type, .. } = &symbol.declaration.kind else {
            return Err(CompileError::new("call target is not a function", loc.clone()));
        };

        if ast::is_generic_function(params, return_type.as_ref()) {
            return self.instantiate_generic(program, bindings, &symbol, sym_id, &arg_types, loc);
        }

        if params.len() != arg_types.len() {
            return Err(CompileError::new(
                format!("function '{}' expects {} argument(s), got {}", program.interner.resolve(symbol.name), params.len(), arg_types.len()),
                loc.clone(),
            ));
        }
        for (param, arg_ty) in params.iter().zip(&arg_types) {
            if !self.types_unify(&param.ty, arg_ty) {
                return Err(CompileError::new(
                    format!("argument type does not match parameter '{}'", program.interner.resolve(param.name)),
                    loc.clone(),
                ));
            }
        }
        Ok(return_type.clone().unwrap_or_else(|| unit_type(loc)))
    }

    /// Looks up or creates the monomorphized instantiation for this call
    /// site (spec §4.2 "Generic monomorphization").
    fn instantiate_generic(
        &mut self,
        program: &mut Program,
        bindings: &mut Bindings,
        symbol: &crate::symbols::Symbol,
        _sym_id: SymbolId,
        arg_types: &[Type],
        loc: &SourceLocation,
    ) -> CompileResult<Type> {
        let StmtKind::FuncDecl { params, return_type, .. } = &symbol.declaration.kind else {
            unreachable!("generic callee symbol always refers to a FuncDecl");
        };
        if params.len() != arg_types.len() {
            return Err(CompileError::new(
                format!("generic function '{}' expects {} argument(s), got {}", program.interner.resolve(symbol.name), params.len(), arg_types.len()),
                loc.clone(),
            ));
        }
        let signature = TypeSignature::new(arg_types.to_vec());
        let key = (symbol.name, self.current_instance);

        if let Some(existing) = self.instantiations.get(&key).and_then(|m| m.get(&signature)) {
            let StmtKind::FuncDecl { return_type: concrete_return, .. } = &existing.declaration.kind else {
                unreachable!("a cached instantiation always records a FuncDecl");
            };
            return Ok(concrete_return.clone().unwrap_or_else(|| unit_type(loc)));
        }

        let subst = clone::build_substitution(params, arg_types);
        let mangled_name = mangle_generic_name(&program.interner, program.interner.resolve(symbol.name), arg_types);
        let mangled_id = program.interner.intern(&mangled_name);

        let specialized = clone::clone_stmt(&symbol.declaration, &subst);
        let specialized = rename_func_decl(&specialized, mangled_id);

        self.instantiations
            .entry(key)
            .or_default()
            .insert(signature, GenericInstantiation { declaration: specialized.clone() });

        // Define the clone's own symbol up front so recursive generic calls
        // within its body resolve against it, then re-run resolution over
        // the clone (spec §4.2: "re-runs resolution on the clone") before
        // queuing it for the drain loop in `check`, which will type-check
        // its body once `Bindings` has been populated for its nodes.
        let scope = program.instance(self.current_instance).unwrap().scope_id;
        let new_sym = crate::symbols::Symbol {
            kind: SymbolKind::Function,
            name: mangled_id,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            is_local: false,
            declaration: specialized.clone(),
            module_id: program.instance(self.current_instance).unwrap().module_id,
            instance_id: self.current_instance,
            reentrancy_annotation: None,
        };
        let new_sym_id = program.symbols.alloc(new_sym);
        program.scopes.define(scope, mangled_id, new_sym_id);
        bindings.bind_stmt(self.current_instance, &specialized, new_sym_id);
        crate::resolver::resolve_instantiation(program, bindings, self.current_instance, &specialized)?;

        self.output.pending_instantiations.push((self.current_instance, specialized));

        Ok(return_type.clone().unwrap_or_else(|| unit_type(loc)))
    }

    fn check_index(&mut self, program: &mut Program, bindings: &mut Bindings, base: &Expr, index: &Expr, loc: &SourceLocation) -> CompileResult<Type> {
        let base_ty = self.check_expr(program, bindings, base)?;
        let index_ty = self.check_expr(program, bindings, index)?;
        let is_int_index = matches!(type_family(&index_ty), Some(TypeFamily::Signed) | Some(TypeFamily::Unsigned));
        if !is_int_index {
            return Err(CompileError::new("array index must be an integer", index.location.clone()));
        }
        match &base_ty.kind {
            TypeKind::Array { elem, .. } => Ok(elem.clone()),
            _ => Err(CompileError::new(format!("cannot index into a value of type '{}'", self.display_type(program, &base_ty)), loc.clone())),
        }
    }

    fn check_member(&mut self, program: &mut Program, bindings: &mut Bindings, base: &Expr, field: NameId, loc: &SourceLocation) -> CompileResult<Type> {
        let base_ty = self.check_expr(program, bindings, base)?;
        let TypeKind::Named(type_name) = &base_ty.kind else {
            return Err(CompileError::new("member access on a non-record type", loc.clone()));
        };
        let scope = program.instance(self.current_instance).unwrap().scope_id;
        let Some(sym_id) = program.scopes.lookup(scope, *type_name) else {
            return Err(CompileError::new(format!("unknown type: {}", program.interner.resolve(*type_name)), loc.clone()));
        };
        let StmtKind::TypeDecl { fields, .. } = &program.symbols.get(sym_id).declaration.kind else {
            return Err(CompileError::new("member access on a non-record type", loc.clone()));
        };
        match fields.iter().find(|f| f.name == field) {
            Some(f) => Ok(f.ty.clone()),
            None => Err(CompileError::new(format!("no field named '{}' on type '{}'", program.interner.resolve(field), program.interner.resolve(*type_name)), loc.clone())),
        }
    }

    fn check_array_literal(&mut self, program: &mut Program, bindings: &mut Bindings, elements: &[Expr], loc: &SourceLocation) -> CompileResult<Type> {
        if elements.is_empty() {
            return Err(CompileError::new("array literal must have at least one element to infer its type", loc.clone()));
        }
        let mut elem_ty = self.check_expr(program, bindings, &elements[0])?;
        for e in &elements[1..] {
            let ty = self.check_expr(program, bindings, e)?;
            self.reconcile_literal(bindings, e, &elem_ty, &ty);
            if !self.types_unify(&elem_ty, &ty) {
                return Err(CompileError::new("array literal elements have mismatched types", loc.clone()));
            }
            elem_ty = ty;
        }
        let size = ast::make_uint(elements.len() as u64, elements.len().to_string(), loc.clone());
        Ok(ast::make_array(elem_ty, size, loc.clone()))
    }

    /// Materializes (and records) the synthetic `__tup{N}_T1_..._TN`
    /// composite for a tuple literal (spec §4.2).
    fn check_tuple_literal(&mut self, program: &mut Program, bindings: &mut Bindings, elements: &[Expr], loc: &SourceLocation) -> CompileResult<Type> {
        let elem_types: Vec<Type> = elements.iter().map(|e| self.check_expr(program, bindings, e)).collect::<CompileResult<_>>()?;
        let tuple_name = tuple_type_name(program, &elem_types);
        self.output.forced_tuple_types.entry(tuple_name.clone()).or_insert_with(|| elem_types.clone());
        let name_id = program.interner.intern(&tuple_name);
        Ok(ast::make_named(name_id, loc.clone()))
    }

    fn require_bool(&self, program: &Program, ty: &Type, loc: &SourceLocation) -> CompileResult<()> {
        if matches!(ty.kind, TypeKind::Primitive(PrimitiveType::Bool)) {
            Ok(())
        } else {
            Err(CompileError::new(format!("expected 'bool', found '{}'", self.display_type(program, ty)), loc.clone()))
        }
    }

    /// Integer literals are polymorphic (spec §4.2): if one side of a
    /// comparison/assignment/arithmetic pair is a concrete int type and the
    /// other is still the literal's defaulted width, re-tag the literal's
    /// recorded type to the target rather than rejecting the mismatch.
    fn reconcile_literal(&self, bindings: &mut Bindings, literal_expr: &Expr, target: &Type, current: &Type) {
        if !matches!(literal_expr.kind, ExprKind::IntLiteral { .. } | ExprKind::UIntLiteral { .. }) {
            return;
        }
        if let (TypeKind::Primitive(t), TypeKind::Primitive(c)) = (&target.kind, &current.kind) {
            if t.is_integer() && c.is_integer() && t != c {
                bindings.set_expr_type(self.current_instance, literal_expr, target.clone());
            }
        }
    }

    fn types_unify(&self, a: &Type, b: &Type) -> bool {
        if matches!(a.kind, TypeKind::TypeVar(_)) || matches!(b.kind, TypeKind::TypeVar(_)) {
            return true;
        }
        types_structurally_equal(a, b)
    }

    fn display_type(&self, program: &Program, ty: &Type) -> String {
        signature::type_mangle_fragment(&program.interner, ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeFamily {
    Signed,
    Unsigned,
    Float,
}

fn type_family(ty: &Type) -> Option<TypeFamily> {
    match &ty.kind {
        TypeKind::Primitive(PrimitiveType::Signed(_)) => Some(TypeFamily::Signed),
        TypeKind::Primitive(PrimitiveType::Unsigned(_)) => Some(TypeFamily::Unsigned),
        TypeKind::Primitive(PrimitiveType::F16 | PrimitiveType::F32 | PrimitiveType::F64) => Some(TypeFamily::Float),
        _ => None,
    }
}

/// An integer literal defaults to the largest signed integer that
/// represents it (spec §4.2) when no target type is available yet; `i64` is
/// the widest width the language allows, so this is unconditional.
fn default_int_type(loc: &SourceLocation) -> Type {
    ast::make_primitive(PrimitiveType::Signed(64), loc.clone())
}

/// The "no value" type: an empty array, mirroring the empty tuple literal
/// `ast::is_none` already uses as the Source's unit value at the expression
/// level. Not a `Primitive`, so `type_family` correctly refuses it in
/// arithmetic/comparison contexts.
fn unit_type(loc: &SourceLocation) -> Type {
    ast::make_array(ast::make_primitive(PrimitiveType::Bool, loc.clone()), ast::make_uint(0, "0", loc.clone()), loc.clone())
}

fn tuple_type_name(program: &Program, elem_types: &[Type]) -> String {
    let mut out = format!("__tup{}", elem_types.len());
    for t in elem_types {
        out.push('_');
        out.push_str(&signature::type_mangle_fragment(&program.interner, t));
    }
    out
}

/// Rebuilds a `FuncDecl` statement with its name replaced by the mangled
/// instantiation name, reusing every other field from the substituted clone.
fn rename_func_decl(stmt: &Stmt, new_name: NameId) -> Stmt {
    let StmtKind::FuncDecl { params, return_type, body, is_external, is_exported, .. } = &stmt.kind else {
        return stmt.clone();
    };
    ast::make_func_decl(
        new_name,
        params.clone(),
        return_type.clone(),
        body.clone(),
        *is_external,
        *is_exported,
        stmt.annotations.clone(),
        stmt.location.clone(),
    )
}
