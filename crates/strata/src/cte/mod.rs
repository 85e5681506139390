//! The compile-time evaluator (spec §4.5): a bounded tree-walking
//! interpreter over the AST that produces structured [`value::CTValue`]s for
//! expressions reachable along only pure, finite paths from known inputs.
//!
//! The original drives control flow (`return`/`break`/`continue`) with C++
//! exceptions and snapshots/restores a raw symbol table on failure. Neither
//! translates directly: Rust has no unwinding-with-payload, and a snapshot
//! of a whole table is wasteful when a `Result` already tells the caller to
//! discard everything the failed call touched. [`Signal`] plays the
//! exception's role as the `Err` arm of every internal `eval*` call; the
//! transactional-rollback guarantee falls out for free because a failed
//! block just never applies its statements' writes to an outer frame (each
//! frame is pushed fresh and popped on both the success and failure path).

pub mod value;

use ahash::{AHashMap, AHashSet};

use crate::ast::{BinOp, Expr, ExprKind, Stmt, StmtKind, Type, TypeKind, UnOp};
use crate::bindings::Bindings;
use crate::program::{InstanceId, Program};
use crate::symbols::SymbolId;
use value::{CTValue, CtArray, CtComposite, clone_ct_value};

/// Recursion depth cap for nested calls (spec §4.5 "hard depth cap
/// (recursion limit 1000)").
const MAX_RECURSION_DEPTH: u32 = 1000;

/// Iteration cap for `Iteration`/`Repeat` bodies (spec §4.5 "hard iteration
/// cap (10^6)").
const MAX_LOOP_ITERATIONS: u64 = 1_000_000;

/// The public, three-way result of trying to fold an expression (SPEC_FULL.md
/// supplement 5): `Known` and `Unknown` both correspond to the public
/// `Option<CTValue>` contract's `Some`/`None`, but the optimizer additionally
/// needs to tell "not foldable along this path" apart from "provably
/// impure", which a bare `Option` can't express.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    Known(CTValue),
    Unknown,
    Impure { reason: String },
}

/// Internal control-flow/failure signal, threaded through every `eval*`
/// method as the `Err` arm of `Result<CTValue, Signal>`.
#[derive(Debug, Clone)]
enum Signal {
    /// The expression isn't foldable along this path (missing input, a loop
    /// or recursion cap was hit, a type mismatch, division by zero, ...).
    NotFoldable(String),
    /// The expression touched something the evaluator can never treat as
    /// pure: `Process`, an external call, or a write to an immutable
    /// binding.
    Impure(String),
    Return(CTValue),
    Break,
    Continue,
}

impl Signal {
    fn into_outcome(self) -> EvalOutcome {
        match self {
            Self::Impure(reason) => EvalOutcome::Impure { reason },
            Self::NotFoldable(_) => EvalOutcome::Unknown,
            // `return`/`break`/`continue` escaping the expression being
            // evaluated is a malformed query, not a fact about foldability;
            // treat it the same as "not foldable" rather than panicking.
            Self::Return(_) | Self::Break | Self::Continue => EvalOutcome::Unknown,
        }
    }
}

/// Scratch state for one evaluation attempt. Frame 0 holds the seed map the
/// caller supplied (already-folded `constexpr` globals, spec §4.5 "Inputs: a
/// map `Symbol* -> CTValue`"); later frames are pushed per block/call.
struct Evaluator {
    frames: Vec<AHashMap<SymbolId, CTValue>>,
    /// Symbols currently bound as a by-ref receiver/parameter of an active
    /// call (spec §4.5 purity rule: ref params can't be mutated through a
    /// foldable path, mirroring the original's `push_ref_params`/
    /// `is_ref_param`).
    ref_params: Vec<AHashSet<SymbolId>>,
    recursion_depth: u32,
}

impl Evaluator {
    fn new(seed: AHashMap<SymbolId, CTValue>) -> Self {
        Self {
            frames: vec![seed],
            ref_params: Vec::new(),
            recursion_depth: 0,
        }
    }

    fn lookup(&self, sym: SymbolId) -> Option<&CTValue> {
        self.frames.iter().rev().find_map(|frame| frame.get(&sym))
    }

    /// Writes `value` into whichever already-pushed frame owns `sym`,
    /// falling back to the innermost frame for a symbol seen for the first
    /// time. A given `SymbolId` only ever lives in one frame at a time, so
    /// this single rule handles both "declare a new local" and "mutate an
    /// existing one" without the caller needing to say which.
    fn write(&mut self, sym: SymbolId, value: CTValue) {
        for frame in self.frames.iter_mut().rev() {
            if frame.contains_key(&sym) {
                frame.insert(sym, value);
                return;
            }
        }
        self.frames.last_mut().expect("at least the seed frame is always present").insert(sym, value);
    }

    fn is_ref_param(&self, sym: SymbolId) -> bool {
        self.ref_params.iter().any(|set| set.contains(&sym))
    }

    fn push_frame(&mut self) {
        self.frames.push(AHashMap::new());
    }

    fn pop_frame(&mut self) {
        self.frames.pop();
    }
}

/// Public entry point (spec §4.5: "`try_evaluate(expr) -> Option<CTValue>`").
/// No seed constants; used where the caller has nothing already folded to
/// hand in (e.g. a quick foldability probe).
pub fn try_evaluate(program: &Program, bindings: &Bindings, instance: InstanceId, expr: &Expr) -> Option<CTValue> {
    match evaluate_outcome(program, bindings, instance, expr) {
        EvalOutcome::Known(v) => Some(v),
        EvalOutcome::Unknown | EvalOutcome::Impure { .. } => None,
    }
}

/// Like [`try_evaluate`] but returns the full tri-state outcome the
/// optimizer needs (SPEC_FULL.md supplement 5).
pub fn evaluate_outcome(program: &Program, bindings: &Bindings, instance: InstanceId, expr: &Expr) -> EvalOutcome {
    evaluate_outcome_seeded(program, bindings, instance, expr, &AHashMap::new())
}

/// Full form: `seed` supplies already-folded `constexpr` globals (spec §4.5
/// "Inputs: a map `Symbol* -> CTValue` of seeded constants").
pub fn evaluate_outcome_seeded(
    program: &Program,
    bindings: &Bindings,
    instance: InstanceId,
    expr: &Expr,
    seed: &AHashMap<SymbolId, CTValue>,
) -> EvalOutcome {
    let mut evaluator = Evaluator::new(seed.clone());
    match evaluator.eval(program, bindings, instance, expr) {
        Ok(v) => EvalOutcome::Known(v),
        Err(signal) => signal.into_outcome(),
    }
}

impl Evaluator {
    fn eval(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, expr: &Expr) -> Result<CTValue, Signal> {
        match &expr.kind {
            ExprKind::IntLiteral { value, .. } => Ok(CTValue::Int(*value)),
            ExprKind::UIntLiteral { value, .. } => Ok(CTValue::UInt(*value)),
            ExprKind::FloatLiteral { value, .. } => Ok(CTValue::Float(*value)),
            ExprKind::CharLiteral { value } => Ok(CTValue::UInt(u64::from(*value))),
            ExprKind::StringLiteral { value } => Ok(CTValue::String(value.clone())),
            ExprKind::Identifier { .. } => self.eval_identifier(bindings, instance, expr),
            ExprKind::Binary { op, left, right } => self.eval_binary(program, bindings, instance, *op, left, right),
            ExprKind::Unary { op, operand } => self.eval_unary(program, bindings, instance, *op, operand),
            ExprKind::Call { callee, args, receivers } => self.eval_call(program, bindings, instance, callee, args, receivers),
            ExprKind::Index { base, index } => self.eval_index(program, bindings, instance, base, index),
            ExprKind::Member { base, field } => self.eval_member(program, bindings, instance, base, *field),
            ExprKind::ArrayLiteral { elements } => self.eval_array_literal(program, bindings, instance, elements),
            ExprKind::TupleLiteral { elements } => self.eval_tuple_literal(program, bindings, instance, elements),
            ExprKind::Block { statements, result } => self.eval_block(program, bindings, instance, statements, result.as_ref()),
            ExprKind::Conditional { condition, true_expr, false_expr } => {
                self.eval_conditional(program, bindings, instance, condition, true_expr, false_expr)
            }
            ExprKind::Cast { target, operand } => self.eval_cast(program, bindings, instance, target, operand),
            ExprKind::Assignment { lhs, rhs } => self.eval_assignment(program, bindings, instance, lhs, rhs),
            ExprKind::Range { start, end } => self.eval_range(program, bindings, instance, start, end),
            ExprKind::Length { operand } => self.eval_length(program, bindings, instance, operand),
            ExprKind::Iteration { subject, body, sorted } => self.eval_iteration(program, bindings, instance, expr, subject, body, *sorted),
            ExprKind::Repeat { condition, body } => self.eval_repeat(program, bindings, instance, condition, body),
            ExprKind::ResourcePath { .. } => Err(Signal::Impure("a resource path is not a compile-time value".to_owned())),
            ExprKind::Process { .. } => Err(Signal::Impure("process invocation is never pure".to_owned())),
        }
    }

    fn eval_identifier(&self, bindings: &Bindings, instance: InstanceId, expr: &Expr) -> Result<CTValue, Signal> {
        let sym = bindings
            .lookup_expr(instance, expr)
            .ok_or_else(|| Signal::NotFoldable("identifier has no resolved symbol".to_owned()))?;
        match self.lookup(sym) {
            None | Some(CTValue::Uninitialized) => Err(Signal::NotFoldable("read of a value not known at compile time".to_owned())),
            Some(v) => Ok(clone_ct_value(v)),
        }
    }

    // -- binary / unary -------------------------------------------------

    fn eval_binary(
        &mut self,
        program: &Program,
        bindings: &Bindings,
        instance: InstanceId,
        op: BinOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<CTValue, Signal> {
        if matches!(op, BinOp::And | BinOp::Or) {
            let lv = self.eval(program, bindings, instance, left)?;
            let lb = scalar_to_bool(&lv)?;
            if op == BinOp::And && !lb {
                return Ok(CTValue::Bool(false));
            }
            if op == BinOp::Or && lb {
                return Ok(CTValue::Bool(true));
            }
            let rv = self.eval(program, bindings, instance, right)?;
            return Ok(CTValue::Bool(scalar_to_bool(&rv)?));
        }

        let lv = self.eval(program, bindings, instance, left)?;
        let rv = self.eval(program, bindings, instance, right)?;

        if matches!(op, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr) {
            let unsigned = matches!(lv, CTValue::UInt(_)) || matches!(rv, CTValue::UInt(_));
            let lb = as_u64_bits(&lv)?;
            let rb = as_u64_bits(&rv)?;
            let shift = (rb & 63) as u32;
            let out = match op {
                BinOp::BitAnd => lb & rb,
                BinOp::BitOr => lb | rb,
                BinOp::BitXor => lb ^ rb,
                BinOp::Shl => lb.wrapping_shl(shift),
                BinOp::Shr => lb.wrapping_shr(shift),
                _ => unreachable!("guarded by the outer matches!"),
            };
            return Ok(if unsigned { CTValue::UInt(out) } else { CTValue::Int(out as i64) });
        }

        if matches!(lv, CTValue::UInt(_)) || matches!(rv, CTValue::UInt(_)) {
            let lb = as_u64_bits(&lv)?;
            let rb = as_u64_bits(&rv)?;
            return eval_unsigned_arith(op, lb, rb);
        }
        if let (CTValue::String(ls), CTValue::String(rs)) = (&lv, &rv) {
            return eval_string_compare(op, ls, rs);
        }
        if let (CTValue::Int(l), CTValue::Int(r)) = (&lv, &rv) {
            return eval_signed_arith(op, *l, *r);
        }
        if matches!(lv, CTValue::Bool(_)) || matches!(rv, CTValue::Bool(_)) {
            let l = lv.as_i64().ok_or_else(|| not_numeric(&lv))?;
            let r = rv.as_i64().ok_or_else(|| not_numeric(&rv))?;
            return eval_signed_arith(op, l, r);
        }
        if matches!(lv, CTValue::Float(_)) || matches!(rv, CTValue::Float(_)) {
            let l = lv.as_f64().ok_or_else(|| not_numeric(&lv))?;
            let r = rv.as_f64().ok_or_else(|| not_numeric(&rv))?;
            return eval_float_arith(op, l, r);
        }
        Err(Signal::NotFoldable(format!(
            "binary operator '{op}' has no compile-time meaning for {} and {}",
            lv.kind_name(),
            rv.kind_name()
        )))
    }

    fn eval_unary(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, op: UnOp, operand: &Expr) -> Result<CTValue, Signal> {
        let v = self.eval(program, bindings, instance, operand)?;
        match op {
            // The type checker only accepts `Bool`-typed operands for `!`
            // (`check_unary`), so there is nothing else to coerce here.
            UnOp::Not => match v {
                CTValue::Bool(b) => Ok(CTValue::Bool(!b)),
                other => Err(Signal::NotFoldable(format!("'!' has no compile-time meaning for {}", other.kind_name()))),
            },
            UnOp::Neg => match v {
                CTValue::Int(n) => Ok(CTValue::Int(n.wrapping_neg())),
                CTValue::UInt(n) => Ok(CTValue::UInt(n.wrapping_neg())),
                CTValue::Float(f) => Ok(CTValue::Float(-f)),
                other => Err(Signal::NotFoldable(format!("'-' has no compile-time meaning for {}", other.kind_name()))),
            },
            UnOp::BitNot => match v {
                CTValue::Int(n) => Ok(CTValue::Int(!n)),
                CTValue::UInt(n) => Ok(CTValue::UInt(!n)),
                other => Err(Signal::NotFoldable(format!("'~' has no compile-time meaning for {}", other.kind_name()))),
            },
        }
    }

    // -- casts (spec §4.5 + §6) ------------------------------------------

    fn eval_cast(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, target: &Type, operand: &Expr) -> Result<CTValue, Signal> {
        let value = self.eval(program, bindings, instance, operand)?;

        // Priority 1: primitive integer -> fixed-size big-endian byte array
        // (spec §4.5 "Primitive -> fixed-size byte-array casts produce
        // big-endian bytes"). Driven by the operand's statically inferred
        // type, since the runtime `CTValue` itself carries no width.
        if let TypeKind::Array { elem, size } = &target.kind {
            if let TypeKind::Primitive(crate::ast::PrimitiveType::Unsigned(8)) = &elem.kind {
                if let Some(operand_ty) = bindings.expr_type(instance, operand) {
                    if let TypeKind::Primitive(p) = &operand_ty.kind {
                        if p.is_integer() {
                            return cast_int_to_byte_array(program, bindings, instance, self, &value, p.bits(), size);
                        }
                    }
                }
            }
        }

        // Priority 2: Array<Bool, N> -> Unsigned(N) bit-packing (spec §4.5
        // "Boolean-array <-> unsigned-integer casts perform bit packing
        // (index 0 = MSB)").
        if let TypeKind::Primitive(crate::ast::PrimitiveType::Unsigned(width)) = &target.kind {
            if let CTValue::Array(arr) = &value {
                return cast_bool_array_to_uint(arr, *width);
            }
        }

        // Priority 3: ordinary primitive-to-primitive scalar cast.
        if let TypeKind::Primitive(p) = &target.kind {
            return cast_scalar(&value, *p);
        }

        Err(Signal::NotFoldable("cast target has no compile-time meaning".to_owned()))
    }

    // -- calls ------------------------------------------------------------

    fn eval_call(
        &mut self,
        program: &Program,
        bindings: &Bindings,
        instance: InstanceId,
        callee: &Expr,
        args: &[Expr],
        receivers: &[Expr],
    ) -> Result<CTValue, Signal> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            self.recursion_depth -= 1;
            return Err(Signal::NotFoldable("exceeded the compile-time recursion limit".to_owned()));
        }
        let result = self.eval_call_inner(program, bindings, instance, callee, args, receivers);
        self.recursion_depth -= 1;
        result
    }

    fn eval_call_inner(
        &mut self,
        program: &Program,
        bindings: &Bindings,
        instance: InstanceId,
        callee: &Expr,
        args: &[Expr],
        receivers: &[Expr],
    ) -> Result<CTValue, Signal> {
        let sym_id = bindings
            .lookup_expr(instance, callee)
            .ok_or_else(|| Signal::NotFoldable("call to an unresolved function".to_owned()))?;
        let symbol = program.symbols.get(sym_id);
        // Type-constructor calls are deliberately out of scope here (see
        // DESIGN.md); everything else that isn't a plain function can never
        // be pure.
        if !matches!(symbol.kind, crate::symbols::SymbolKind::Function) {
            return Err(Signal::NotFoldable("call target is not a function".to_owned()));
        }
        if symbol.is_external {
            return Err(Signal::Impure(format!("'{}' is an external function", program.interner.resolve(symbol.name))));
        }
        let StmtKind::FuncDecl { params, body, .. } = &symbol.declaration.kind else {
            return Err(Signal::NotFoldable("call target is not a function".to_owned()));
        };
        let Some(body) = body else {
            return Err(Signal::Impure("function has no body to evaluate".to_owned()));
        };
        // Do not reject calls with a whole-function purity pre-check here:
        // evaluation is path-sensitive, and a function that's impure along
        // one branch may still fold for arguments that only exercise a pure
        // one. Let the body fail naturally instead.
        let param_syms = bindings
            .param_symbols(instance, &symbol.declaration)
            .ok_or_else(|| Signal::NotFoldable("function parameters were never resolved".to_owned()))?;

        let bound: Vec<Expr> = receivers.iter().chain(args.iter()).cloned().collect();
        if bound.len() != param_syms.len() {
            return Err(Signal::NotFoldable("argument count does not match parameter count".to_owned()));
        }
        let mut values = Vec::with_capacity(bound.len());
        for arg in &bound {
            values.push(self.eval(program, bindings, instance, arg)?);
        }

        self.push_frame();
        let mut ref_set = AHashSet::new();
        for (i, (param, value)) in params.iter().zip(values).enumerate() {
            let sym = param_syms[i];
            if param.is_ref {
                ref_set.insert(sym);
            }
            self.frames.last_mut().expect("frame just pushed").insert(sym, value);
        }
        self.ref_params.push(ref_set);

        let result = self.eval(program, bindings, instance, body);
        self.ref_params.pop();
        self.pop_frame();

        match result {
            Ok(v) => Ok(v),
            Err(Signal::Return(v)) => Ok(v),
            Err(other) => Err(other),
        }
    }

    // -- blocks / control flow -------------------------------------------

    fn eval_block(
        &mut self,
        program: &Program,
        bindings: &Bindings,
        instance: InstanceId,
        statements: &[Stmt],
        result: Option<&Expr>,
    ) -> Result<CTValue, Signal> {
        self.push_frame();
        for stmt in statements {
            if let Err(signal) = self.eval_stmt(program, bindings, instance, stmt) {
                self.pop_frame();
                return Err(signal);
            }
        }
        let value = match result {
            Some(expr) => self.eval(program, bindings, instance, expr),
            // A result-less block never records a type for itself (spec §9
            // invariant note); its value is never meant to be read, so a
            // harmless sentinel is conservatively correct here.
            None => Ok(CTValue::Uninitialized),
        };
        self.pop_frame();
        value
    }

    fn eval_stmt(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, stmt: &Stmt) -> Result<(), Signal> {
        match &stmt.kind {
            StmtKind::ExprStmt(e) => {
                self.eval(program, bindings, instance, e)?;
                Ok(())
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval(program, bindings, instance, e)?,
                    None => CTValue::Uninitialized,
                };
                Err(Signal::Return(v))
            }
            StmtKind::Break => Err(Signal::Break),
            StmtKind::Continue => Err(Signal::Continue),
            StmtKind::VarDecl { init, .. } => {
                let sym = bindings
                    .lookup_stmt(instance, stmt)
                    .ok_or_else(|| Signal::NotFoldable("variable declaration has no resolved symbol".to_owned()))?;
                let value = match init {
                    Some(e) => self.eval(program, bindings, instance, e)?,
                    None => CTValue::Uninitialized,
                };
                self.frames.last_mut().expect("block pushes a frame before statements run").insert(sym, value);
                Ok(())
            }
            StmtKind::ConditionalStmt { condition, then_block, else_block } => {
                let test = self.eval(program, bindings, instance, condition)?;
                let taken = scalar_to_bool(&test)?;
                let branch = if taken { then_block } else { else_block };
                self.push_frame();
                for s in branch {
                    if let Err(signal) = self.eval_stmt(program, bindings, instance, s) {
                        self.pop_frame();
                        return Err(signal);
                    }
                }
                self.pop_frame();
                Ok(())
            }
            // Neither declares a compile-time value nor can be evaluated in
            // isolation; a top-level statement list never contains one once
            // resolved.
            StmtKind::FuncDecl { .. } | StmtKind::TypeDecl { .. } | StmtKind::Import { .. } => {
                Err(Signal::NotFoldable("declaration statements have no compile-time value".to_owned()))
            }
        }
    }

    fn eval_conditional(
        &mut self,
        program: &Program,
        bindings: &Bindings,
        instance: InstanceId,
        condition: &Expr,
        true_expr: &Expr,
        false_expr: &Expr,
    ) -> Result<CTValue, Signal> {
        let test = self.eval(program, bindings, instance, condition)?;
        if scalar_to_bool(&test)? {
            self.eval(program, bindings, instance, true_expr)
        } else {
            self.eval(program, bindings, instance, false_expr)
        }
    }

    // -- assignment / lvalues ---------------------------------------------

    fn eval_assignment(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, lhs: &Expr, rhs: &Expr) -> Result<CTValue, Signal> {
        let value = self.eval(program, bindings, instance, rhs)?;
        self.assign_lvalue(program, bindings, instance, lhs, value.clone())?;
        Ok(value)
    }

    /// Copy-on-write lvalue assignment (spec §4.5: "copy-on-write the owning
    /// composite/array unless uniquely owned at that evaluation frame, then
    /// write in place"). A from-scratch safe-Rust redesign of the original's
    /// raw `CTValue*` slot-pointer recursion: `Rc::make_mut` gives the same
    /// "clone only if shared" behavior the original gets from
    /// `shared_ptr::unique()` checks, without unsafe code.
    fn assign_lvalue(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, lhs: &Expr, value: CTValue) -> Result<(), Signal> {
        match &lhs.kind {
            ExprKind::Identifier { .. } => {
                let sym = bindings
                    .lookup_expr(instance, lhs)
                    .ok_or_else(|| Signal::NotFoldable("assignment target has no resolved symbol".to_owned()))?;
                if self.is_ref_param(sym) {
                    return Err(Signal::Impure("cannot mutate a by-reference parameter through a foldable path".to_owned()));
                }
                if !bindings.creates_new_variable(instance, lhs) && !bindings.is_mutable_binding(instance, lhs) {
                    return Err(Signal::Impure("cannot assign to an immutable binding".to_owned()));
                }
                self.write(sym, value);
                Ok(())
            }
            ExprKind::Member { base, field } => {
                let mut base_value = self.eval(program, bindings, instance, base)?;
                let CTValue::Composite(rc) = &mut base_value else {
                    return Err(Signal::NotFoldable("member assignment target is not a composite".to_owned()));
                };
                let field_name = program.interner.resolve(*field).to_owned();
                let composite = std::rc::Rc::make_mut(rc);
                composite.fields.insert(field_name, value);
                self.assign_lvalue(program, bindings, instance, base, base_value)
            }
            ExprKind::Index { base, index } => {
                let mut base_value = self.eval(program, bindings, instance, base)?;
                let index_value = self.eval(program, bindings, instance, index)?;
                let idx = index_value.as_i64().ok_or_else(|| Signal::NotFoldable("array index is not an integer".to_owned()))?;
                let CTValue::Array(rc) = &mut base_value else {
                    return Err(Signal::NotFoldable("index assignment target is not an array".to_owned()));
                };
                let array = std::rc::Rc::make_mut(rc);
                let idx = usize::try_from(idx).map_err(|_| Signal::NotFoldable("array index is negative".to_owned()))?;
                let slot = array.elements.get_mut(idx).ok_or_else(|| Signal::NotFoldable("array index out of bounds".to_owned()))?;
                *slot = value;
                self.assign_lvalue(program, bindings, instance, base, base_value)
            }
            _ => Err(Signal::NotFoldable("unsupported assignment target".to_owned())),
        }
    }

    // -- composites / collections ------------------------------------------

    fn eval_array_literal(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, elements: &[Expr]) -> Result<CTValue, Signal> {
        let mut out = Vec::with_capacity(elements.len());
        for e in elements {
            out.push(self.eval(program, bindings, instance, e)?);
        }
        Ok(CTValue::Array(std::rc::Rc::new(CtArray { elements: out })))
    }

    /// Tuple literals fold to a synthetic composite with positional field
    /// names, matching the `__tup{N}_*` composite the type checker invents
    /// for the static type (spec §4.2/§4.5). The exact field-name spelling
    /// used here (`_0`, `_1`, ...) is internal to the evaluator — nothing
    /// outside it ever needs to parse the name back out — so it need not
    /// match any external mangling convention, only be internally
    /// consistent between construction here and call-return repacking.
    fn eval_tuple_literal(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, elements: &[Expr]) -> Result<CTValue, Signal> {
        let mut fields = AHashMap::new();
        for (i, e) in elements.iter().enumerate() {
            fields.insert(format!("_{i}"), self.eval(program, bindings, instance, e)?);
        }
        Ok(CTValue::Composite(std::rc::Rc::new(CtComposite {
            type_name: format!("__tup{}", elements.len()),
            fields,
        })))
    }

    fn eval_member(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, base: &Expr, field: crate::intern::NameId) -> Result<CTValue, Signal> {
        let base_value = self.eval(program, bindings, instance, base)?;
        let CTValue::Composite(composite) = &base_value else {
            return Err(Signal::NotFoldable("member access target is not a composite".to_owned()));
        };
        let field_name = program.interner.resolve(field);
        composite
            .fields
            .get(field_name)
            .map(clone_ct_value)
            .ok_or_else(|| Signal::NotFoldable(format!("composite has no field '{field_name}'")))
    }

    fn eval_index(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, base: &Expr, index: &Expr) -> Result<CTValue, Signal> {
        let base_value = self.eval(program, bindings, instance, base)?;
        let index_value = self.eval(program, bindings, instance, index)?;
        let idx = index_value.as_i64().ok_or_else(|| Signal::NotFoldable("array index is not an integer".to_owned()))?;
        let CTValue::Array(array) = &base_value else {
            return Err(Signal::NotFoldable("index target is not an array".to_owned()));
        };
        let idx = usize::try_from(idx).map_err(|_| Signal::NotFoldable("array index is negative".to_owned()))?;
        array
            .elements
            .get(idx)
            .map(clone_ct_value)
            .ok_or_else(|| Signal::NotFoldable("array index out of bounds".to_owned()))
    }

    fn eval_length(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, operand: &Expr) -> Result<CTValue, Signal> {
        let value = self.eval(program, bindings, instance, operand)?;
        match value {
            CTValue::Array(arr) => Ok(CTValue::UInt(arr.elements.len() as u64)),
            CTValue::String(s) => Ok(CTValue::UInt(s.len() as u64)),
            other => Err(Signal::NotFoldable(format!("'#' has no compile-time meaning for {}", other.kind_name()))),
        }
    }

    /// Ranges have no dedicated `CTValue` variant (neither the original nor
    /// this evaluator's domain has one); a half-open range folds eagerly to
    /// an array of its integer elements, which lets indexing/length/
    /// iteration over it reuse the array machinery unchanged.
    fn eval_range(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, start: &Expr, end: &Expr) -> Result<CTValue, Signal> {
        let start_v = self.eval(program, bindings, instance, start)?;
        let end_v = self.eval(program, bindings, instance, end)?;
        let lo = start_v.as_i64().ok_or_else(|| Signal::NotFoldable("range start is not an integer".to_owned()))?;
        let hi = end_v.as_i64().ok_or_else(|| Signal::NotFoldable("range end is not an integer".to_owned()))?;
        if hi < lo {
            return Ok(CTValue::Array(std::rc::Rc::new(CtArray { elements: vec![] })));
        }
        let count = (hi - lo) as u64;
        if count > MAX_LOOP_ITERATIONS {
            return Err(Signal::NotFoldable("range exceeds the compile-time iteration limit".to_owned()));
        }
        let unsigned = matches!(start_v, CTValue::UInt(_)) && matches!(end_v, CTValue::UInt(_));
        let elements = (lo..hi).map(|n| if unsigned { CTValue::UInt(n as u64) } else { CTValue::Int(n) }).collect();
        Ok(CTValue::Array(std::rc::Rc::new(CtArray { elements })))
    }

    fn eval_iteration(
        &mut self,
        program: &Program,
        bindings: &Bindings,
        instance: InstanceId,
        iteration_expr: &Expr,
        subject: &Expr,
        body: &Expr,
        sorted: bool,
    ) -> Result<CTValue, Signal> {
        let subject_value = self.eval(program, bindings, instance, subject)?;
        let CTValue::Array(array) = &subject_value else {
            return Err(Signal::NotFoldable("iteration subject is not an array".to_owned()));
        };
        let loop_sym = bindings
            .lookup_expr(instance, iteration_expr)
            .ok_or_else(|| Signal::NotFoldable("iteration has no resolved loop variable".to_owned()))?;

        let mut elements = array.elements.clone();
        if sorted {
            sort_ct_values(&mut elements)?;
        }
        if elements.len() as u64 > MAX_LOOP_ITERATIONS {
            return Err(Signal::NotFoldable("iteration exceeds the compile-time iteration limit".to_owned()));
        }

        let mut result = CTValue::Uninitialized;
        for element in elements {
            self.push_frame();
            self.frames.last_mut().expect("frame just pushed").insert(loop_sym, element);
            let outcome = self.eval(program, bindings, instance, body);
            self.pop_frame();
            match outcome {
                Ok(v) => result = v,
                Err(Signal::Break) => break,
                Err(Signal::Continue) => continue,
                Err(other) => return Err(other),
            }
        }
        Ok(result)
    }

    fn eval_repeat(&mut self, program: &Program, bindings: &Bindings, instance: InstanceId, condition: &Expr, body: &Expr) -> Result<CTValue, Signal> {
        let mut result = CTValue::Uninitialized;
        let mut iterations: u64 = 0;
        loop {
            let test = self.eval(program, bindings, instance, condition)?;
            if !scalar_to_bool(&test)? {
                break;
            }
            iterations += 1;
            if iterations > MAX_LOOP_ITERATIONS {
                return Err(Signal::NotFoldable("loop exceeds the compile-time iteration limit".to_owned()));
            }
            match self.eval(program, bindings, instance, body) {
                Ok(v) => result = v,
                Err(Signal::Break) => break,
                Err(Signal::Continue) => continue,
                Err(other) => return Err(other),
            }
        }
        Ok(result)
    }
}

fn not_numeric(v: &CTValue) -> Signal {
    Signal::NotFoldable(format!("expected a number, found {}", v.kind_name()))
}

fn scalar_to_bool(v: &CTValue) -> Result<bool, Signal> {
    v.as_bool().ok_or_else(|| Signal::NotFoldable(format!("{} has no compile-time truthiness", v.kind_name())))
}

fn as_u64_bits(v: &CTValue) -> Result<u64, Signal> {
    match v {
        CTValue::UInt(n) => Ok(*n),
        CTValue::Int(n) => Ok(*n as u64),
        CTValue::Bool(b) => Ok(u64::from(*b)),
        other => Err(Signal::NotFoldable(format!("expected an integer, found {}", other.kind_name()))),
    }
}

fn eval_unsigned_arith(op: BinOp, l: u64, r: u64) -> Result<CTValue, Signal> {
    Ok(match op {
        BinOp::Add => CTValue::UInt(l.wrapping_add(r)),
        BinOp::Sub => CTValue::UInt(l.wrapping_sub(r)),
        BinOp::Mul => CTValue::UInt(l.wrapping_mul(r)),
        BinOp::Div => {
            if r == 0 {
                return Err(Signal::NotFoldable("division by zero".to_owned()));
            }
            CTValue::UInt(l / r)
        }
        BinOp::Mod => {
            if r == 0 {
                return Err(Signal::NotFoldable("modulo by zero".to_owned()));
            }
            CTValue::UInt(l % r)
        }
        BinOp::Eq => CTValue::Bool(l == r),
        BinOp::Ne => CTValue::Bool(l != r),
        BinOp::Lt => CTValue::Bool(l < r),
        BinOp::Le => CTValue::Bool(l <= r),
        BinOp::Gt => CTValue::Bool(l > r),
        BinOp::Ge => CTValue::Bool(l >= r),
        _ => return Err(Signal::NotFoldable(format!("'{op}' has no unsigned-integer meaning"))),
    })
}

fn eval_signed_arith(op: BinOp, l: i64, r: i64) -> Result<CTValue, Signal> {
    Ok(match op {
        BinOp::Add => CTValue::Int(l.wrapping_add(r)),
        BinOp::Sub => CTValue::Int(l.wrapping_sub(r)),
        BinOp::Mul => CTValue::Int(l.wrapping_mul(r)),
        BinOp::Div => {
            if r == 0 {
                return Err(Signal::NotFoldable("division by zero".to_owned()));
            }
            CTValue::Int(l.wrapping_div(r))
        }
        BinOp::Mod => {
            if r == 0 {
                return Err(Signal::NotFoldable("modulo by zero".to_owned()));
            }
            CTValue::Int(l.wrapping_rem(r))
        }
        BinOp::Eq => CTValue::Bool(l == r),
        BinOp::Ne => CTValue::Bool(l != r),
        BinOp::Lt => CTValue::Bool(l < r),
        BinOp::Le => CTValue::Bool(l <= r),
        BinOp::Gt => CTValue::Bool(l > r),
        BinOp::Ge => CTValue::Bool(l >= r),
        _ => return Err(Signal::NotFoldable(format!("'{op}' has no signed-integer meaning"))),
    })
}

fn eval_float_arith(op: BinOp, l: f64, r: f64) -> Result<CTValue, Signal> {
    Ok(match op {
        BinOp::Add => CTValue::Float(l + r),
        BinOp::Sub => CTValue::Float(l - r),
        BinOp::Mul => CTValue::Float(l * r),
        BinOp::Div => CTValue::Float(l / r),
        BinOp::Mod => CTValue::Float(l % r),
        BinOp::Eq => CTValue::Bool(l == r),
        BinOp::Ne => CTValue::Bool(l != r),
        BinOp::Lt => CTValue::Bool(l < r),
        BinOp::Le => CTValue::Bool(l <= r),
        BinOp::Gt => CTValue::Bool(l > r),
        BinOp::Ge => CTValue::Bool(l >= r),
        _ => return Err(Signal::NotFoldable(format!("'{op}' has no floating-point meaning"))),
    })
}

/// String operands only ever support comparison, never arithmetic (spec §6).
fn eval_string_compare(op: BinOp, l: &str, r: &str) -> Result<CTValue, Signal> {
    Ok(match op {
        BinOp::Eq => CTValue::Bool(l == r),
        BinOp::Ne => CTValue::Bool(l != r),
        BinOp::Lt => CTValue::Bool(l < r),
        BinOp::Le => CTValue::Bool(l <= r),
        BinOp::Gt => CTValue::Bool(l > r),
        BinOp::Ge => CTValue::Bool(l >= r),
        _ => return Err(Signal::NotFoldable(format!("'{op}' has no meaning for strings"))),
    })
}

/// Orders scalar `CTValue`s for `@@` sorted iteration. Composites and arrays
/// have no compile-time ordering.
fn sort_ct_values(values: &mut [CTValue]) -> Result<(), Signal> {
    for v in values.iter() {
        if matches!(v, CTValue::Composite(_) | CTValue::Array(_) | CTValue::Uninitialized) {
            return Err(Signal::NotFoldable(format!("{} has no compile-time ordering", v.kind_name())));
        }
    }
    let mut err = None;
    values.sort_by(|a, b| match scalar_cmp(a, b) {
        Ok(ord) => ord,
        Err(e) => {
            err = Some(e);
            std::cmp::Ordering::Equal
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn scalar_cmp(a: &CTValue, b: &CTValue) -> Result<std::cmp::Ordering, Signal> {
    match (a, b) {
        (CTValue::String(x), CTValue::String(y)) => Ok(x.cmp(y)),
        _ => {
            let x = a.as_f64().ok_or_else(|| not_numeric(a))?;
            let y = b.as_f64().ok_or_else(|| not_numeric(b))?;
            x.partial_cmp(&y).ok_or_else(|| Signal::NotFoldable("NaN has no compile-time ordering".to_owned()))
        }
    }
}

/// Priority 1 cast: a primitive integer operand to a fixed-size
/// `Array<u8, N>` target, big-endian (spec §4.5).
fn cast_int_to_byte_array(
    program: &Program,
    bindings: &Bindings,
    instance: InstanceId,
    evaluator: &mut Evaluator,
    value: &CTValue,
    operand_bits: i64,
    size_expr: &Expr,
) -> Result<CTValue, Signal> {
    let size_value = evaluator.eval(program, bindings, instance, size_expr)?;
    let n = size_value.as_i64().ok_or_else(|| Signal::NotFoldable("array size is not an integer".to_owned()))?;
    let width = u32::try_from(operand_bits).map_err(|_| Signal::NotFoldable("invalid integer width".to_owned()))?;
    if width == 0 || width > 64 {
        return Err(Signal::NotFoldable("integer width out of compile-time range".to_owned()));
    }
    if i64::from(width) / 8 != n {
        return Err(Signal::NotFoldable("byte-array size does not match the integer's width".to_owned()));
    }
    let bits = as_u64_bits(value)?;
    let masked = if width == 64 { bits } else { bits & ((1u64 << width) - 1) };
    let byte_count = n as usize;
    let mut bytes = vec![CTValue::UInt(0); byte_count];
    for (i, slot) in bytes.iter_mut().enumerate() {
        let shift = (byte_count - 1 - i) * 8;
        *slot = CTValue::UInt((masked >> shift) & 0xFF);
    }
    Ok(CTValue::Array(std::rc::Rc::new(CtArray { elements: bytes })))
}

/// Priority 2 cast: `Array<Bool, N>` to `Unsigned(N)`, MSB-first bit packing
/// (spec §4.5).
fn cast_bool_array_to_uint(array: &CtArray, width: u32) -> Result<CTValue, Signal> {
    if width == 0 || width > 64 {
        return Err(Signal::NotFoldable("unsigned width out of compile-time range".to_owned()));
    }
    if array.elements.len() as u32 != width {
        return Err(Signal::NotFoldable("bool-array length does not match the target width".to_owned()));
    }
    let mut out: u64 = 0;
    for element in &array.elements {
        let CTValue::Bool(b) = element else {
            return Err(Signal::NotFoldable("bool-array element is not a bool".to_owned()));
        };
        out = (out << 1) | u64::from(*b);
    }
    Ok(CTValue::UInt(out))
}

/// Priority 3 cast: ordinary primitive-to-primitive scalar cast (spec §6
/// "width-clamping and sign-extension").
fn cast_scalar(value: &CTValue, target: crate::ast::PrimitiveType) -> Result<CTValue, Signal> {
    use crate::ast::PrimitiveType;

    if target.is_float() {
        let f = value.as_f64().ok_or_else(|| not_numeric(value))?;
        return Ok(CTValue::Float(f));
    }
    if target == PrimitiveType::Bool {
        let b = value.as_bool().unwrap_or_else(|| value.as_i64().is_some_and(|n| n != 0));
        return Ok(CTValue::Bool(b));
    }

    let width = u32::try_from(target.bits()).map_err(|_| Signal::NotFoldable("cast target has an invalid width".to_owned()))?;
    if width == 0 || width > 64 {
        return Err(Signal::NotFoldable("cast target width out of compile-time range".to_owned()));
    }
    let raw = as_u64_bits(value).or_else(|_| value.as_f64().map(|f| f as i64 as u64).ok_or_else(|| not_numeric(value)))?;
    let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
    let masked = raw & mask;

    if target.is_signed_int() {
        let sign_bit = 1u64 << (width - 1);
        let signed = if width == 64 {
            masked as i64
        } else if masked & sign_bit != 0 {
            (masked | !mask) as i64
        } else {
            masked as i64
        };
        Ok(CTValue::Int(signed))
    } else {
        Ok(CTValue::UInt(masked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::bindings::Bindings;
    use crate::common::SourceLocation;
    use crate::program::{Module, Program};
    use crate::symbols::{Symbol, SymbolKind};

    fn loc() -> SourceLocation {
        SourceLocation::new("t.strata", 1, 1)
    }

    fn empty_program() -> (Program, InstanceId) {
        let mut program = Program::new();
        let module_id = program.add_module("t.strata", Module::default());
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);
        (program, instance)
    }

    #[test]
    fn literal_folds_to_itself() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        let expr = make_int(42, "42", loc());
        assert_eq!(try_evaluate(&program, &bindings, instance, &expr), Some(CTValue::Int(42)));
    }

    #[test]
    fn signed_arithmetic_folds() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        let expr = make_binary(BinOp::Add, make_int(2, "2", loc()), make_binary(BinOp::Mul, make_int(3, "3", loc()), make_int(4, "4", loc()), loc()), loc());
        assert_eq!(try_evaluate(&program, &bindings, instance, &expr), Some(CTValue::Int(14)));
    }

    #[test]
    fn division_by_zero_is_not_foldable() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        let expr = make_binary(BinOp::Div, make_int(1, "1", loc()), make_int(0, "0", loc()), loc());
        assert_eq!(evaluate_outcome(&program, &bindings, instance, &expr), EvalOutcome::Unknown);
    }

    #[test]
    fn and_short_circuits_without_evaluating_the_right_operand() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        // `1 == 2` folds to `false`; the right operand divides by zero and
        // would fail if evaluated, so this only folds if `&&` short-circuits.
        let false_cond = make_binary(BinOp::Eq, make_int(1, "1", loc()), make_int(2, "2", loc()), loc());
        let poison = make_binary(BinOp::Div, make_int(1, "1", loc()), make_int(0, "0", loc()), loc());
        let expr = make_binary(BinOp::And, false_cond, poison, loc());
        assert_eq!(try_evaluate(&program, &bindings, instance, &expr), Some(CTValue::Bool(false)));
    }

    #[test]
    fn cast_truncates_and_sign_extends() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        let target = make_primitive(crate::ast::PrimitiveType::Signed(8), loc());
        let expr = make_cast(target, make_int(-1, "-1", loc()), loc());
        assert_eq!(try_evaluate(&program, &bindings, instance, &expr), Some(CTValue::Int(-1)));

        let target = make_primitive(crate::ast::PrimitiveType::Unsigned(8), loc());
        let expr = make_cast(target, make_int(257, "257", loc()), loc());
        assert_eq!(try_evaluate(&program, &bindings, instance, &expr), Some(CTValue::UInt(1)));
    }

    #[test]
    fn bool_array_packs_into_unsigned_msb_first() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        let bits = make_array_literal(
            vec![
                make_binary(BinOp::Eq, make_int(1, "1", loc()), make_int(1, "1", loc()), loc()),
                make_binary(BinOp::Eq, make_int(1, "1", loc()), make_int(0, "0", loc()), loc()),
                make_binary(BinOp::Eq, make_int(1, "1", loc()), make_int(1, "1", loc()), loc()),
            ],
            loc(),
        );
        let target = make_primitive(crate::ast::PrimitiveType::Unsigned(3), loc());
        let expr = make_cast(target, bits, loc());
        assert_eq!(try_evaluate(&program, &bindings, instance, &expr), Some(CTValue::UInt(0b101)));
    }

    #[test]
    fn block_without_a_result_expr_yields_uninitialized() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        let expr = make_block(vec![make_expr_stmt(make_int(1, "1", loc()), loc())], None, loc());
        assert_eq!(try_evaluate(&program, &bindings, instance, &expr), Some(CTValue::Uninitialized));
    }

    #[test]
    fn range_materializes_as_an_array() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        let expr = make_range(make_int(0, "0", loc()), make_int(3, "3", loc()), loc());
        let Some(CTValue::Array(arr)) = try_evaluate(&program, &bindings, instance, &expr) else {
            panic!("expected an array");
        };
        assert_eq!(arr.elements, vec![CTValue::Int(0), CTValue::Int(1), CTValue::Int(2)]);
    }

    #[test]
    fn iteration_binds_each_element_to_the_loop_variable() {
        let (mut program, instance) = empty_program();
        let mut bindings = Bindings::new();
        let underscore = program.interner.intern("_");
        let loop_sym = program.symbols.alloc(Symbol {
            kind: SymbolKind::Variable,
            name: underscore,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            is_local: true,
            declaration: make_return(None, loc()),
            module_id: program.instance(instance).unwrap().module_id,
            instance_id: instance,
            reentrancy_annotation: None,
        });
        let subject = make_range(make_int(0, "0", loc()), make_int(3, "3", loc()), loc());
        let body = make_identifier(underscore, loc());
        let iteration = make_iteration(subject, body.clone(), false, loc());
        bindings.bind_expr(instance, &iteration, loop_sym);
        bindings.bind_expr(instance, &body, loop_sym);
        assert_eq!(try_evaluate(&program, &bindings, instance, &iteration), Some(CTValue::Int(2)));
    }

    #[test]
    fn recursion_cap_rejects_unbounded_recursion() {
        let mut program = Program::new();
        let module_id = program.add_module("t.strata", Module::default());
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);
        let mut bindings = Bindings::new();

        let f_name = program.interner.intern("f");
        let callee = make_identifier(f_name, loc());
        let call = make_call(callee.clone(), vec![], vec![], loc());
        let body = make_block(vec![], Some(call.clone()), loc());
        let f_decl = make_func_decl(f_name, vec![], None, Some(body), false, false, vec![], loc());
        program.module_mut(module_id).unwrap().module.top_level.push(f_decl.clone());

        let sym = program.symbols.alloc(Symbol {
            kind: SymbolKind::Function,
            name: f_name,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            is_local: true,
            declaration: f_decl.clone(),
            module_id,
            instance_id: instance,
            reentrancy_annotation: None,
        });
        bindings.bind_expr(instance, &callee, sym);
        bindings.set_param_symbols(instance, &f_decl, vec![]);

        assert_eq!(evaluate_outcome(&program, &bindings, instance, &call), EvalOutcome::Unknown);
    }

    #[test]
    fn external_call_is_reported_as_impure() {
        let mut program = Program::new();
        let module_id = program.add_module("t.strata", Module::default());
        let scope = program.scopes.push(None);
        let instance = program.add_instance(module_id, scope);
        let mut bindings = Bindings::new();

        let f_name = program.interner.intern("read_sensor");
        let f_decl = make_func_decl(f_name, vec![], None, None, true, false, vec![], loc());
        let sym = program.symbols.alloc(Symbol {
            kind: SymbolKind::Function,
            name: f_name,
            ty: None,
            is_mutable: false,
            is_external: true,
            is_exported: false,
            is_local: true,
            declaration: f_decl,
            module_id,
            instance_id: instance,
            reentrancy_annotation: None,
        });
        let callee = make_identifier(f_name, loc());
        let call = make_call(callee.clone(), vec![], vec![], loc());
        bindings.bind_expr(instance, &callee, sym);

        match evaluate_outcome(&program, &bindings, instance, &call) {
            EvalOutcome::Impure { .. } => {}
            other => panic!("expected Impure, got {other:?}"),
        }
    }

    #[test]
    fn process_expression_is_always_impure() {
        let (program, instance) = empty_program();
        let bindings = Bindings::new();
        let expr = make_process("ls", loc());
        match evaluate_outcome(&program, &bindings, instance, &expr) {
            EvalOutcome::Impure { .. } => {}
            other => panic!("expected Impure, got {other:?}"),
        }
    }

    #[test]
    fn assignment_to_an_immutable_binding_is_impure() {
        let (mut program, instance) = empty_program();
        let mut bindings = Bindings::new();
        let x = program.interner.intern("x");
        let sym = program.symbols.alloc(Symbol {
            kind: SymbolKind::Variable,
            name: x,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            is_local: true,
            declaration: make_return(None, loc()),
            module_id: program.instance(instance).unwrap().module_id,
            instance_id: instance,
            reentrancy_annotation: None,
        });
        let lhs = make_identifier(x, loc());
        bindings.bind_expr(instance, &lhs, sym);
        bindings.set_creates_new_variable(instance, &lhs, false);
        bindings.set_mutable_binding(instance, &lhs, false);
        let expr = make_assignment(lhs, make_int(1, "1", loc()), loc());
        match evaluate_outcome(&program, &bindings, instance, &expr) {
            EvalOutcome::Impure { .. } => {}
            other => panic!("expected Impure, got {other:?}"),
        }
    }
}
