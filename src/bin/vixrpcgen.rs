//! Compile an RPC interface definition and emit target source.
//!
//! Usage:
//!   vixrpcgen [OPTIONS] INPUT
//!
//! Errors are printed as `INPUT:line:column: message`, one per line, and the process
//! exits with status 1. Without `--out-dir` the generated files go to stdout.

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vixrpcgen::generator::is_valid_name;
use vixrpcgen::{compile, generate, GeneratorConfig, Target};

#[derive(Parser, Debug)]
#[command(name = "vixrpcgen")]
#[command(about = "Generate code implementing an RPC interface")]
struct Cli {
    /// The input RPC definition file
    input: PathBuf,

    /// Protocol name (letters and underscores); defaults to the input file stem
    #[arg(long)]
    name: Option<String>,

    /// Target language: rust or c
    #[arg(long, default_value = "rust")]
    target: Target,

    /// Write generated files here instead of stdout
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Only compile and report errors
    #[arg(long)]
    check: bool,

    /// Runtime crate path used by generated Rust code
    #[arg(long, default_value = "vixrpcgen")]
    runtime_crate: String,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "vixrpcgen=debug",
        _ => "vixrpcgen=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string_lossy().into_owned())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let name = cli.name.clone().unwrap_or_else(|| default_name(&cli.input));
    if !is_valid_name(&name) {
        anyhow::bail!("invalid name: {:?}", name);
    }

    let source = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let model = match compile(&source) {
        Ok(m) => m,
        Err(errors) => {
            let path = cli.input.display();
            for e in errors.errors() {
                eprintln!("{}:{}", path, e);
            }
            std::process::exit(1);
        }
    };
    if cli.check {
        return Ok(());
    }

    let config = GeneratorConfig {
        name,
        runtime_crate: cli.runtime_crate.clone(),
    };
    let generated = generate(&model, cli.target, &config)
        .with_context(|| format!("generating {} for {}", cli.target, cli.input.display()))?;

    match &cli.out_dir {
        Some(dir) => {
            for path in generated.write_to_dir(dir)? {
                tracing::info!(path = %path.display(), "wrote");
            }
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            for (_, contents) in &generated.files {
                stdout.write_all(contents.as_bytes())?;
            }
        }
    }
    Ok(())
}
