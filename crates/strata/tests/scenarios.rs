//! End-to-end scenarios from spec.md §8 (S1-S6), each built as a small
//! hand-constructed `Program` (no parser exists — see `strata-cli`) pushed
//! through the full `strata::compile` pipeline.

use pretty_assertions::assert_eq;

use strata::analysis::VarMutability;
use strata::ast::*;
use strata::cte::value::CTValue;
use strata::program::{Module, Program};
use strata::{AnalysisConfig, CompileError, compile};

fn loc() -> SourceLocation {
    SourceLocation::new("scenario.strata", 1, 1)
}

/// S1 (const folding). `var x: i32 = 2 * 3 + 4;` -> `var_mutability[x] =
/// Constexpr`, the initializer folds to `10`.
#[test]
fn s1_const_folding_marks_the_global_constexpr() {
    let mut program = Program::new();
    let x_name = program.interner.intern("x");
    let i32_ty = make_primitive(PrimitiveType::Signed(32), loc());

    let mul = make_binary(BinOp::Mul, make_int(2, "2", loc()), make_int(3, "3", loc()), loc());
    let sum = make_binary(BinOp::Add, mul, make_int(4, "4", loc()), loc());
    let decl = make_var_decl(x_name, Some(i32_ty), false, true, false, Some(sum), vec![], loc());
    let module_id = program.add_module("scenario.strata", Module { top_level: vec![decl] });

    let output = compile(program, module_id, &AnalysisConfig::default()).expect("compiles");
    let analyzed = &output.analyzed;
    let instance = analyzed.entry_instance();
    let sym_id = *analyzed.program().instance(instance).unwrap().symbols.get(&x_name).unwrap();

    assert_eq!(analyzed.analysis().var_mutability.get(&sym_id), Some(&VarMutability::Constexpr));

    let kept_init = analyzed
        .merged_module()
        .declarations
        .iter()
        .find_map(|stmt| match &stmt.kind {
            StmtKind::VarDecl { name, init, .. } if *name == x_name => init.clone(),
            _ => None,
        })
        .expect("x is kept in the merged module");

    let value = analyzed.try_evaluate(instance, &kept_init).expect("folds to a known value");
    assert_eq!(value, CTValue::Int(10));
}

/// S2 (dead branch). `if (0 == 1) { call_impure(); }` -> post-residualization
/// the branch is dropped and `call_impure` is unreachable.
#[test]
fn s2_dead_branch_drops_its_only_caller_from_reachability() {
    let mut program = Program::new();
    let main_name = program.interner.intern("main");
    let dead_name = program.interner.intern("call_impure");

    let dead_decl = make_func_decl(dead_name, vec![], None, Some(make_block(vec![], None, loc())), false, false, vec![], loc());

    let always_false = make_binary(BinOp::Eq, make_int(0, "0", loc()), make_int(1, "1", loc()), loc());
    let dead_call = make_expr_stmt(make_call(make_identifier(dead_name, loc()), vec![], vec![], loc()), loc());
    let guarded = make_conditional_stmt(always_false, vec![dead_call], vec![], loc());
    let main_body = make_block(vec![guarded], None, loc());
    let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

    let module_id = program.add_module(
        "scenario.strata",
        Module {
            top_level: vec![dead_decl, main_decl],
        },
    );

    let output = compile(program, module_id, &AnalysisConfig::default()).expect("compiles");
    let analyzed = &output.analyzed;
    let dead_sym = *analyzed.program().instance(analyzed.entry_instance()).unwrap().symbols.get(&dead_name).unwrap();
    assert!(!analyzed.analysis().reachable_functions.contains(&dead_sym));
}

/// S3 (generic instantiation). `func id<T>(x: T) -> T { return x; }` called
/// once with an `IntLiteral` (defaults to `i64`) and once with a
/// `UIntLiteral` (always `u64`) -> two distinct mangled clones in the merged
/// module, the generic original absent.
#[test]
fn s3_generic_calls_with_distinct_types_each_get_their_own_clone() {
    let mut program = Program::new();
    let id_name = program.interner.intern("id");
    let t_name = program.interner.intern("T");
    let x_name = program.interner.intern("x");
    let main_name = program.interner.intern("main");

    let t_var = make_typevar(t_name, loc());
    let param = Parameter {
        name: x_name,
        ty: t_var.clone(),
        is_ref: false,
        location: loc(),
    };
    let id_body = make_block(vec![make_return(Some(make_identifier(x_name, loc())), loc())], None, loc());
    let id_decl = make_func_decl(id_name, vec![param], Some(t_var), Some(id_body), false, false, vec![], loc());

    let call_signed = make_expr_stmt(make_call(make_identifier(id_name, loc()), vec![make_int(1, "1", loc())], vec![], loc()), loc());
    let call_unsigned = make_expr_stmt(make_call(make_identifier(id_name, loc()), vec![make_uint(2, "2", loc())], vec![], loc()), loc());
    let main_body = make_block(vec![call_signed, call_unsigned], None, loc());
    let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

    let module_id = program.add_module(
        "scenario.strata",
        Module {
            top_level: vec![id_decl, main_decl],
        },
    );

    let output = compile(program, module_id, &AnalysisConfig::default()).expect("compiles");
    let analyzed = &output.analyzed;

    let clone_names: Vec<String> = analyzed
        .merged_module()
        .declarations
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StmtKind::FuncDecl { name, .. } => {
                let resolved = analyzed.program().interner.resolve(*name);
                resolved.starts_with("id$").then(|| resolved.to_owned())
            }
            _ => None,
        })
        .collect();
    assert_eq!(clone_names.len(), 2, "expected two distinct clones, got {clone_names:?}");

    let generic_kept = analyzed.merged_module().declarations.iter().any(|stmt| matches!(&stmt.kind, StmtKind::FuncDecl { name, .. } if *name == id_name));
    assert!(!generic_kept, "the unmonomorphized generic original should not be emitted");
}

/// S4 (reentrancy conflict). An exported entry point reachable in a
/// reentrant context calls an external function whose exit boundary is
/// forced non-reentrant -> `CompileError`.
///
/// `analysis.rs` never reads `[[reentrant]]`/`[[nonreentrant]]` annotations
/// itself (see its module docs): boundary context is driven by
/// `AnalysisConfig::reentrancy_mode_for_boundary`. With `AnalysisConfig::default()`
/// and no caller-supplied hook, `pipeline::compile` builds that hook from
/// `halt`'s own `[[nonreentrant]]` annotation, so this scenario is exercised
/// end to end through a real source annotation.
#[test]
fn s4_reentrant_path_into_a_forced_nonreentrant_external_is_rejected() {
    let mut program = Program::new();
    let external_name = program.interner.intern("halt");
    let main_name = program.interner.intern("main");

    let external_decl = make_func_decl(external_name, vec![], None, None, true, false, vec![Annotation::new("nonreentrant", loc())], loc());
    let call = make_call(make_identifier(external_name, loc()), vec![], vec![], loc());
    let main_body = make_block(vec![make_expr_stmt(call, loc())], None, loc());
    let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

    let module_id = program.add_module(
        "scenario.strata",
        Module {
            top_level: vec![external_decl, main_decl],
        },
    );

    let result = compile(program, module_id, &AnalysisConfig::default());
    match result {
        Err(CompileError { message, .. }) => assert!(message.contains("halt"), "error should name the external function: {message}"),
        Ok(_) => panic!("expected a reentrancy conflict"),
    }
}

/// S5 (ref-variant mask). A two-ref-param function called once with
/// `(mut, imm)` and once with `(imm, imm)` -> `ref_variants[f] = {"MN",
/// "NN"}`.
#[test]
fn s5_two_call_sites_produce_two_distinct_ref_variant_masks() {
    let mut program = Program::new();
    let f_name = program.interner.intern("f");
    let main_name = program.interner.intern("main");
    let mutable_name = program.interner.intern("mutable_global");
    let immutable_name = program.interner.intern("immutable_global");
    let a_name = program.interner.intern("a");
    let b_name = program.interner.intern("b");

    let i32_ty = make_primitive(PrimitiveType::Signed(32), loc());
    let mutable_decl = make_var_decl(mutable_name, Some(i32_ty.clone()), true, false, false, Some(make_int(0, "0", loc())), vec![], loc());
    let immutable_decl = make_var_decl(immutable_name, Some(i32_ty.clone()), false, false, false, Some(make_int(0, "0", loc())), vec![], loc());

    let f_params = vec![
        Parameter {
            name: a_name,
            ty: i32_ty.clone(),
            is_ref: true,
            location: loc(),
        },
        Parameter {
            name: b_name,
            ty: i32_ty,
            is_ref: true,
            location: loc(),
        },
    ];
    let f_decl = make_func_decl(f_name, f_params, None, Some(make_block(vec![], None, loc())), false, false, vec![], loc());

    let call_mn = make_expr_stmt(
        make_call(
            make_identifier(f_name, loc()),
            vec![],
            vec![make_identifier(mutable_name, loc()), make_identifier(immutable_name, loc())],
            loc(),
        ),
        loc(),
    );
    let call_nn = make_expr_stmt(
        make_call(
            make_identifier(f_name, loc()),
            vec![],
            vec![make_identifier(immutable_name, loc()), make_identifier(immutable_name, loc())],
            loc(),
        ),
        loc(),
    );
    let main_body = make_block(vec![call_mn, call_nn], None, loc());
    let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

    let module_id = program.add_module(
        "scenario.strata",
        Module {
            top_level: vec![mutable_decl, immutable_decl, f_decl, main_decl],
        },
    );

    let output = compile(program, module_id, &AnalysisConfig::default()).expect("compiles");
    let analyzed = &output.analyzed;
    let f_sym = *analyzed.program().instance(analyzed.entry_instance()).unwrap().symbols.get(&f_name).unwrap();

    let masks = analyzed.analysis().ref_variants.get(&f_sym).cloned().unwrap_or_default();
    assert_eq!(masks.len(), 2, "expected two distinct masks, got {masks:?}");
    assert!(masks.contains("MN"));
    assert!(masks.contains("NN"));
}

/// S6 (purity). `func f(x: i32) -> i32 { return x + 1; }` with no global
/// writes -> `function_is_pure[f] = true`. A sibling function that writes a
/// mutable global flips both `function_is_pure` and `function_writes_global`.
#[test]
fn s6_writing_a_mutable_global_flips_purity_and_writes_global() {
    let mut program = Program::new();
    let pure_name = program.interner.intern("pure_fn");
    let impure_name = program.interner.intern("impure_fn");
    let counter_name = program.interner.intern("counter");
    let main_name = program.interner.intern("main");
    let x_name = program.interner.intern("x");

    let i32_ty = make_primitive(PrimitiveType::Signed(32), loc());
    let counter_decl = make_var_decl(counter_name, Some(i32_ty.clone()), true, false, false, Some(make_int(0, "0", loc())), vec![], loc());

    let pure_param = Parameter {
        name: x_name,
        ty: i32_ty.clone(),
        is_ref: false,
        location: loc(),
    };
    let pure_body = make_block(
        vec![make_return(
            Some(make_binary(BinOp::Add, make_identifier(x_name, loc()), make_int(1, "1", loc()), loc())),
            loc(),
        )],
        None,
        loc(),
    );
    let pure_decl = make_func_decl(pure_name, vec![pure_param], Some(i32_ty), Some(pure_body), false, false, vec![], loc());

    let assign = make_assignment(make_identifier(counter_name, loc()), make_int(1, "1", loc()), loc());
    let impure_body = make_block(vec![make_expr_stmt(assign, loc())], None, loc());
    let impure_decl = make_func_decl(impure_name, vec![], None, Some(impure_body), false, false, vec![], loc());

    let call_pure = make_expr_stmt(make_call(make_identifier(pure_name, loc()), vec![make_int(1, "1", loc())], vec![], loc()), loc());
    let call_impure = make_expr_stmt(make_call(make_identifier(impure_name, loc()), vec![], vec![], loc()), loc());
    let main_body = make_block(vec![call_pure, call_impure], None, loc());
    let main_decl = make_func_decl(main_name, vec![], None, Some(main_body), false, true, vec![], loc());

    let module_id = program.add_module(
        "scenario.strata",
        Module {
            top_level: vec![counter_decl, pure_decl, impure_decl, main_decl],
        },
    );

    let output = compile(program, module_id, &AnalysisConfig::default()).expect("compiles");
    let analyzed = &output.analyzed;
    let instance = analyzed.entry_instance();
    let pure_sym = *analyzed.program().instance(instance).unwrap().symbols.get(&pure_name).unwrap();
    let impure_sym = *analyzed.program().instance(instance).unwrap().symbols.get(&impure_name).unwrap();

    assert_eq!(analyzed.analysis().function_is_pure.get(&pure_sym), Some(&true));
    assert_eq!(analyzed.analysis().function_writes_global.get(&pure_sym), Some(&false));

    assert_eq!(analyzed.analysis().function_is_pure.get(&impure_sym), Some(&false));
    assert_eq!(analyzed.analysis().function_writes_global.get(&impure_sym), Some(&true));
}
