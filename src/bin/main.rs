//! The `acornc` command: compiles every `.acorn` file of a source directory
//! into a single LLVM module.

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::{Command, ExitCode},
};

use acorn::driver::{Config, Diagnostic, Session};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const BUILD_DIR: &str = "build";
const OUTPUT_IR: &str = "output.ll";
const OUTPUT_BIN: &str = "a.out";

#[derive(Parser)]
#[command(name = "acornc", about = "The Acorn compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Compiles the sources without writing anything
    Check(Options),
    /// Writes the module to `build/output.ll`
    Build(Options),
    /// Builds, links with clang and runs the program
    Run(Options),
}

#[derive(Args)]
struct Options {
    /// Directory holding the `.acorn` sources
    #[arg(long, value_name = "DIR", default_value = "./src")]
    src: PathBuf,

    /// Surrounds the lowering of every node with IR comments
    #[arg(long)]
    annotate_ir: bool,

    /// Skips the standard prelude
    #[arg(long)]
    no_prelude: bool,

    #[arg(long, value_enum)]
    target: Option<Target>,
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
enum Target {
    x86_64_linux,
    aarch64_linux,
    x86_64_darwin,
    aarch64_darwin,
}

impl Target {
    const fn triple(self) -> &'static str {
        match self {
            Target::x86_64_linux => "x86_64-pc-linux-gnu",
            Target::aarch64_linux => "aarch64-unknown-linux-gnu",
            Target::x86_64_darwin => "x86_64-apple-macosx",
            Target::aarch64_darwin => "arm64-apple-macosx",
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum DriverError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Compile(#[from] Diagnostic),
    #[error("{0}")]
    Toolchain(String),
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run(mode: Mode) -> Result<ExitCode, DriverError> {
    let (options, write, execute) = match mode {
        Mode::Check(options) => (options, false, false),
        Mode::Build(options) => (options, true, false),
        Mode::Run(options) => (options, true, true),
    };

    let mut session = Session::new(Config {
        include_prelude: !options.no_prelude,
        annotate_ir: options.annotate_ir,
        target_triple: options.target.map(|target| target.triple().to_owned()),
    });
    for path in sources(&options.src)? {
        let contents = fs::read_to_string(&path)?;
        debug!(path = %path.display(), bytes = contents.len(), "adding source");
        session.add_file(&path.display().to_string(), &contents);
    }
    let ir = session.compile()?;

    if !write {
        println!("ok");
        return Ok(ExitCode::SUCCESS);
    }
    let build = Path::new(BUILD_DIR);
    fs::create_dir_all(build)?;
    let ir_path = build.join(OUTPUT_IR);
    fs::write(&ir_path, ir)?;
    info!(path = %ir_path.display(), "wrote module");

    if !execute {
        return Ok(ExitCode::SUCCESS);
    }
    let bin_path = build.join(OUTPUT_BIN);
    link(&ir_path, &bin_path)?;

    let status = Command::new(&bin_path).status()?;
    let code = status.code().unwrap_or(-1);
    println!("exit code: {code}");
    Ok(u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from))
}

/// Every `.acorn` file directly under `dir`, sorted by path.
fn sources(dir: &Path) -> Result<Vec<PathBuf>, DriverError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "acorn") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn link(ir_path: &Path, bin_path: &Path) -> Result<(), DriverError> {
    let out = Command::new("clang")
        .arg(ir_path)
        .arg("-o")
        .arg(bin_path)
        .output()
        .map_err(|error| DriverError::Toolchain(format!("failed to run clang: {error}")))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(DriverError::Toolchain(format!("clang failed:\n{stderr}")));
    }
    Ok(())
}
