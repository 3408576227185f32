use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;

use runescript_compiler::dsl::span::line_col;
use runescript_compiler::dsl::tokenizer::{Kind, Tokenizer};
use runescript_compiler::dsl::{Compiler, Input, Output};
use runescript_compiler::error::AppError;
use runescript_compiler::project::{self, SourceFile};
use runescript_compiler::settings::{self, CompilerSettings};
use runescript_compiler::paths;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "rsc-cli", about = "RuneScript compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to rsc.json in the working directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// More log output; repeat for trace level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile script and config files or directories
    Compile {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output directory for compiled binaries
        #[arg(long)]
        out: Option<PathBuf>,
        /// Check only, without generating code
        #[arg(long)]
        check: bool,
    },
    /// Dump the tokens of a script file
    Tokens { file: PathBuf },
    /// Print the optimized IR of every script in a file
    Ir { file: PathBuf },
    /// Print the JSON schema of the settings file
    Schema,
    /// Write a default settings file
    Init,
}

// ── Output ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    crc: u32,
    scripts: usize,
    configs: usize,
    errors: Vec<&'a runescript_compiler::dsl::error::CompileError>,
}

#[derive(Serialize)]
struct CompileReport<'a> {
    files: Vec<FileReport<'a>>,
    written: usize,
    cancelled: bool,
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn fail(e: &AppError, json: bool) -> ! {
    if json {
        print_json(e);
    } else {
        eprintln!("Error: {e}");
    }
    process::exit(1);
}

fn print_diagnostics(output: &Output) {
    for file in &output.files {
        for error in &file.errors {
            eprintln!("{}: {}", file.location.display(), error.format_with_source(&file.source));
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────

fn load_settings(path: Option<&Path>) -> Result<CompilerSettings, AppError> {
    let path = path.map_or_else(|| paths::settings_path(Path::new(".")), Path::to_path_buf);
    debug!(path = %path.display(), "loading settings");
    Ok(settings::load_settings(&path)?)
}

fn gather(compiler: &Compiler, roots: &[PathBuf]) -> Result<Vec<SourceFile>, AppError> {
    let mut files = Vec::new();
    for root in roots {
        files.extend(project::load_sources(root, |ext| compiler.accepts(ext))?);
    }
    if files.is_empty() {
        return Err(AppError::InvalidInput {
            message: "No source files found".into(),
        });
    }
    Ok(files)
}

fn run_compile(cli: &Cli, roots: &[PathBuf], out: Option<&Path>, check: bool) -> Result<(), AppError> {
    let compiler = Compiler::new(&load_settings(cli.settings.as_deref())?)?;
    let mut input = Input::new(gather(&compiler, roots)?);
    input.run_codegen = !check;
    let output = compiler.compile(&input);

    let mut written = 0;
    if !check && output.error_count() == 0 {
        let dir = out.map_or_else(|| paths::default_output_dir(Path::new(".")), Path::to_path_buf);
        written = project::write_outputs(&dir, output.artifacts())?;
        info!(dir = %dir.display(), written, "outputs written");
    }

    if cli.json {
        let files = output
            .files
            .iter()
            .map(|f| FileReport {
                file: f.location.display().to_string(),
                crc: f.crc,
                scripts: f.scripts.len(),
                configs: f.configs.len(),
                errors: f.errors.iter().collect(),
            })
            .collect();
        print_json(&CompileReport {
            files,
            written,
            cancelled: output.cancelled,
        });
    } else {
        print_diagnostics(&output);
        let scripts: usize = output.files.iter().map(|f| f.scripts.len()).sum();
        let configs: usize = output.files.iter().map(|f| f.configs.len()).sum();
        println!(
            "{} files, {scripts} scripts, {configs} configs, {} errors, {written} written",
            output.files.len(),
            output.error_count()
        );
    }

    match output.files.iter().find(|f| f.has_errors()) {
        Some(file) => Err(AppError::Compile {
            file: file.location.display().to_string(),
            count: output.error_count(),
        }),
        None => Ok(()),
    }
}

fn run_tokens(cli: &Cli, file: &Path) -> Result<(), AppError> {
    let compiler = Compiler::new(&load_settings(cli.settings.as_deref())?)?;
    let source = String::from_utf8_lossy(&SourceFile::read(file)?.content).into_owned();
    let mut tokenizer = Tokenizer::new(compiler.script_table(), &source);
    loop {
        let token = tokenizer.parse();
        if token.kind == Kind::Eof {
            break;
        }
        let (line, col) = line_col(&source, token.span.start);
        println!("{line}:{col}\t{:?}\t{}", token.kind, token.text());
    }
    for error in tokenizer.take_errors() {
        eprintln!("{}", error.format_with_source(&source));
    }
    Ok(())
}

fn run_ir(cli: &Cli, file: &Path) -> Result<(), AppError> {
    let compiler = Compiler::new(&load_settings(cli.settings.as_deref())?)?;
    let output = compiler.compile(&Input::new(vec![SourceFile::read(file)?]));
    if cli.json {
        let code: Vec<_> = output
            .files
            .iter()
            .flat_map(|f| &f.scripts)
            .filter_map(|s| s.code.as_ref())
            .collect();
        print_json(&code);
    } else {
        print_diagnostics(&output);
        for script in output.files.iter().flat_map(|f| &f.scripts) {
            if let Some(code) = &script.code {
                println!("{code}");
            }
        }
    }
    Ok(())
}

fn run_init(cli: &Cli) -> Result<(), AppError> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(|| paths::settings_path(Path::new(".")));
    if path.exists() {
        return Err(AppError::InvalidInput {
            message: format!("{} already exists", path.display()),
        });
    }
    settings::save_settings(&path, &CompilerSettings::default())?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Compile { paths, out, check } => run_compile(&cli, paths, out.as_deref(), *check),
        Commands::Tokens { file } => run_tokens(&cli, file),
        Commands::Ir { file } => run_ir(&cli, file),
        Commands::Schema => {
            print_json(&settings::settings_schema());
            Ok(())
        }
        Commands::Init => run_init(&cli),
    };
    if let Err(e) = result {
        fail(&e, cli.json);
    }
}
