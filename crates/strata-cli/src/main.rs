use std::{env, fs, process::ExitCode, time::Instant};

use strata::ast::{
    BinOp, PrimitiveType, make_binary, make_block, make_call, make_func_decl, make_identifier, make_int, make_primitive, make_return, make_var_decl,
};
use strata::program::{Module, Program};
use strata::{AnalysisConfig, SourceLocation, compile};

/// Strictness level for `--type-strictness`. Threading this through is the
/// driver's own business (spec.md §6: "not the core's responsibility"); the
/// core pipeline has no strictness knob to hand it to.
#[derive(Debug, Clone, Copy, Default)]
enum TypeStrictness {
    #[default]
    Off,
    Level(u8),
    Full,
}

#[derive(Debug, Default)]
struct Options {
    verbose: bool,
    allow_process: bool,
    type_strictness: TypeStrictness,
    file_path: Option<String>,
}

fn print_usage() {
    eprintln!("usage: strata [-v] [--allow-process] [--strict-types[=full]] [--type-strictness {{0|1|2}}] [-h] [FILE]");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" => opts.verbose = true,
            "--allow-process" => opts.allow_process = true,
            "--strict-types" => opts.type_strictness = TypeStrictness::Level(1),
            "--strict-types=full" => opts.type_strictness = TypeStrictness::Full,
            "--type-strictness" => {
                let level = iter.next().ok_or("--type-strictness requires an argument")?;
                let level: u8 = level.parse().map_err(|_| format!("invalid --type-strictness value: {level}"))?;
                opts.type_strictness = TypeStrictness::Level(level);
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other if opts.file_path.is_none() => opts.file_path = Some(other.to_owned()),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }
    Ok(opts)
}

fn read_file(file_path: &str) -> Result<String, String> {
    eprintln!("Reading file: {file_path}");
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("Error: {file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("Error reading {file_path}: {err}"));
        }
    }
    match fs::read_to_string(file_path) {
        Ok(contents) => Ok(contents),
        Err(err) => Err(format!("Error reading file: {err}")),
    }
}

/// Lexing and parsing are an external collaborator here (spec.md §1) — this
/// crate owns resolution onward, not source text. In place of a real parser,
/// this builds a small, fixed demo module so the driver has something real
/// to push through `strata::compile`; the file argument is still read and
/// validated (and its path becomes the registered module path) so the CLI's
/// surface matches what a real driver would expect.
fn demo_program(module_path: &str) -> (Program, strata::ModuleId) {
    let mut program = Program::new();
    let loc = SourceLocation::new(module_path, 1, 1);

    let compute_name = program.interner.intern("compute");
    let main_name = program.interner.intern("answer");
    let result_name = program.interner.intern("result");

    let i32_ty = make_primitive(PrimitiveType::Signed(32), loc.clone());
    let sum = make_binary(BinOp::Add, make_int(41, "41", loc.clone()), make_int(1, "1", loc.clone()), loc.clone());
    let compute_body = make_block(vec![make_return(Some(sum), loc.clone())], None, loc.clone());
    let compute_decl = make_func_decl(compute_name, vec![], Some(i32_ty.clone()), Some(compute_body), false, false, vec![], loc.clone());

    let call = make_call(make_identifier(compute_name, loc.clone()), vec![], vec![], loc.clone());
    let result_decl = make_var_decl(result_name, Some(i32_ty.clone()), false, false, false, Some(call), vec![], loc.clone());
    let main_body = make_block(
        vec![result_decl, make_return(Some(make_identifier(result_name, loc.clone())), loc.clone())],
        None,
        loc.clone(),
    );
    let main_decl = make_func_decl(main_name, vec![], Some(i32_ty), Some(main_body), false, true, vec![], loc);

    let module_id = program.add_module(
        module_path,
        Module {
            top_level: vec![compute_decl, main_decl],
        },
    );
    (program, module_id)
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("error: {err}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let file_path = opts.file_path.as_deref().unwrap_or("example.strata");
    if let Err(err) = read_file(file_path) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    if opts.verbose {
        eprintln!(
            "options: allow_process={} type_strictness={:?}",
            opts.allow_process, opts.type_strictness
        );
    }

    let (program, entry_module) = demo_program(file_path);
    let config = AnalysisConfig::default();

    let start = Instant::now();
    match compile(program, entry_module, &config) {
        Ok(output) => {
            let elapsed = start.elapsed();
            eprintln!("compiled successfully after: {elapsed:?}");
            for diagnostic in &output.diagnostics {
                eprintln!("{diagnostic}");
            }
            eprintln!(
                "merged module: {} declaration(s) kept",
                output.analyzed.merged_module().declarations.len()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let elapsed = start.elapsed();
            eprintln!("compilation failed after: {elapsed:?}\n{err}");
            ExitCode::FAILURE
        }
    }
}
