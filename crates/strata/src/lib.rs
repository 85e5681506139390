#![doc = include_str!("../../../README.md")]

pub mod analysis;
pub mod analyzed_program;
pub mod ast;
pub mod bindings;
pub mod common;
pub mod cte;
pub mod intern;
pub mod invariants;
pub mod lowerer;
pub mod monomorphizer;
pub mod optimizer;
pub mod pipeline;
pub mod program;
pub mod residualizer;
pub mod resolver;
pub mod symbols;
pub mod typechecker;

pub use crate::{
    analysis::{AnalysisConfig, AnalysisFacts},
    analyzed_program::AnalyzedProgram,
    bindings::Bindings,
    common::{CompileError, CompileResult, Diagnostic, DiagnosticLevel, SourceLocation},
    pipeline::{CompileOutput, compile},
    program::{InstanceId, ModuleId, Program},
};
