use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use graft_core::front::ResolvedProgram;
use graft_core::ir::{Printer, Program};
use graft_core::{compile, PassConfig};

#[derive(Parser)]
#[command(name = "graft", about = "Cross-compiler middle tier driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a resolved frontend tree down to optimized IR.
    Compile {
        /// Path to a JSON resolved-program file.
        input: PathBuf,
        /// Where to write the output IR JSON; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Optimization passes to skip (e.g. "devirtualize", "cast-lower").
        #[arg(long = "skip-pass")]
        skip_passes: Vec<String>,
        /// Print the optimized IR in human-readable form instead of JSON.
        #[arg(long)]
        dump_ir: bool,
    },
    /// Print a JSON-serialized IR program in human-readable form.
    PrintIr {
        /// Path to a JSON IR program file.
        file: PathBuf,
    },
}

fn load_resolved(path: &Path) -> Result<ResolvedProgram> {
    let file = File::open(path)
        .with_context(|| format!("failed to open input: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse resolved program: {}", path.display()))
}

fn cmd_compile(
    input: &Path,
    output: Option<&Path>,
    skip_passes: &[String],
    dump_ir: bool,
) -> Result<()> {
    let resolved = load_resolved(input)?;
    let config = PassConfig::from_skip_list(skip_passes)?;
    let result = compile(&resolved, &config)?;

    if result.has_errors() {
        for diag in &result.diagnostics {
            eprintln!("error: {diag}");
        }
        bail!("compile failed with {} error(s)", result.diagnostics.len());
    }

    if dump_ir {
        print!("{}", Printer::new(&result.program).print_program());
        return Ok(());
    }
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &result.program)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            serde_json::to_writer(stdout.lock(), &result.program)?;
        }
    }
    Ok(())
}

fn cmd_print_ir(file: &Path) -> Result<()> {
    let f = File::open(file)
        .with_context(|| format!("failed to open IR file: {}", file.display()))?;
    let program: Program = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("failed to parse IR file: {}", file.display()))?;
    print!("{}", Printer::new(&program).print_program());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Compile {
            input,
            output,
            skip_passes,
            dump_ir,
        } => cmd_compile(input, output.as_deref(), skip_passes, *dump_ir),
        Command::PrintIr { file } => cmd_print_ir(file),
    }
}
