//! forthc command line driver.
//!
//! Compiles every Forth file named on the command line into `<base>.o`
//! through the GNU assembler, or projects identifiers through the mangler.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use bumpalo::Bump;
use clap::Parser;
use log::LevelFilter;

use forthc::{demangle, mangle, CompileResult, Definitions, Options, Program};

#[derive(Parser, Debug)]
#[command(name = "forthc", about = "Compile Forth source into 32-bit x86 objects")]
struct Cli {
    /// Emit stabs debug information
    #[arg(short = 'g')]
    debug: bool,

    /// Emit mcount profiling hooks
    #[arg(short = 'p')]
    profile: bool,

    /// Make word definitions weak symbols
    #[arg(short = 'w')]
    weak: bool,

    /// Generate position independent code
    #[arg(short = 'f', value_name = "PIC", value_parser = ["PIC", "pic"])]
    code_model: Option<String>,

    /// Optimize the intermediate code
    #[arg(short = 'O')]
    optimize: bool,

    /// Keep the intermediate listing as <base>.p
    #[arg(short = 'P')]
    listing: bool,

    /// Keep the generated assembly as <base>.s
    #[arg(short = 'S', short_alias = 's')]
    assembly: bool,

    /// Define an identifier for [IFDEF]
    #[arg(short = 'D', value_name = "NAME")]
    define: Vec<String>,

    /// Remove an identifier for [IFDEF]
    #[arg(short = 'U', value_name = "NAME")]
    undefine: Vec<String>,

    /// Print the mangled form of each argument
    #[arg(short = 'M')]
    mangle: bool,

    /// Print the demangled form of each argument
    #[arg(short = 'X')]
    demangle: bool,

    /// Log every recognized terminal
    #[arg(long = "trace-parser")]
    trace_parser: bool,

    /// Print version information
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Source files, or identifiers with -M and -X
    #[arg(value_name = "FILE")]
    inputs: Vec<String>,
}

impl Cli {
    fn options(&self) -> Options {
        let mut options = Options {
            debugging: self.debug,
            profiling: self.profile,
            weak_symbols: self.weak,
            position_independent: self.code_model.is_some(),
            optimize: self.optimize,
            save_intermediate: self.listing,
            save_assembly: self.assembly,
            trace_parser: self.trace_parser,
            mangle_only: self.mangle,
            demangle_only: self.demangle,
        };

        if options.debugging && options.profiling {
            log::warn!("-p ignored with -g");
            options.profiling = false;
        }
        if options.mangle_only && options.demangle_only {
            log::warn!("-X ignored with -M");
            options.demangle_only = false;
        }
        if !options.compiles() && !options.flag_names().is_empty() {
            log::warn!("compile flags ignored with -M or -X");
        }
        options
    }

    fn definitions(&self) -> Definitions {
        let mut definitions: Definitions = self.define.iter().collect();
        for name in &self.undefine {
            definitions.undefine(name);
        }
        definitions
    }
}

fn init_logging(trace_parser: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if trace_parser {
        builder.filter_module("forthc::forth", LevelFilter::Trace);
    }
    builder.format_timestamp(None).init();
}

/// `as` turns `<base>.s` into `<base>.o`.
fn assemble(assembly: &Path, object: &Path) -> CompileResult<bool> {
    let status = Command::new("as")
        .arg("--32")
        .arg("-o")
        .arg(object)
        .arg(assembly)
        .status()?;
    if !status.success() {
        log::error!("assembler failed on {}: {}", assembly.display(), status);
    }
    Ok(status.success())
}

fn compile_file(
    arena: &Bump,
    path: &str,
    options: &Options,
    definitions: &Definitions,
) -> CompileResult<bool> {
    let bytes = fs::read(path)?;
    let source = String::from_utf8_lossy(&bytes);
    let base = PathBuf::from(path).with_extension("");

    let mut program = Program::new(arena, path, options.clone());
    let built = program.build(&source, definitions);
    for line in program.diagnostics().rendered() {
        eprintln!("{line}");
    }
    log::debug!("{}", program.stats());

    if options.save_intermediate {
        fs::write(base.with_extension("p"), program.create_listing())?;
    }
    if !built {
        return Ok(false);
    }

    let assembly = base.with_extension("s");
    let mut out = BufWriter::new(File::create(&assembly)?);
    program.generate(&mut out)?;
    out.flush()?;
    drop(out);

    let assembled = assemble(&assembly, &base.with_extension("o"))?;
    if !options.save_assembly {
        fs::remove_file(&assembly)?;
    }
    Ok(assembled)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version {
        println!("forthc {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    init_logging(cli.trace_parser);
    let options = cli.options();

    if options.mangle_only || options.demangle_only {
        for name in &cli.inputs {
            if options.mangle_only {
                println!("{}", mangle(name));
            } else {
                println!("{}", demangle(name));
            }
        }
        return ExitCode::SUCCESS;
    }

    let definitions = cli.definitions();
    let mut arena = Bump::new();
    let mut failed = false;
    for path in &cli.inputs {
        match compile_file(&arena, path, &options, &definitions) {
            Ok(true) => {}
            Ok(false) => failed = true,
            Err(err) => {
                eprintln!("forthc: {path}: {err}");
                failed = true;
            }
        }
        arena.reset();
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
