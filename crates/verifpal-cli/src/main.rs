//! Command-line interface for the Verifpal protocol verifier.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;
use verifpal_cli::json::{read_request_body, respond, Request};
use verifpal_cli::report::render_outcome;
use verifpal_cli::{check_model, load_model, CliError, CliResult};
use verifpal_engine::{verify, VerifyConfig};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERIFPAL_GIT_HASH"),
    " ",
    env!("VERIFPAL_GIT_DATE"),
    ", ",
    env!("VERIFPAL_BUILD_TARGET"),
    ")"
);

#[derive(Parser)]
#[command(name = "verifpal", version, long_version = LONG_VERSION)]
#[command(about = "Cryptographic protocol analysis for students and engineers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a model and report which queries fail
    Verify {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of worker threads (0 = use all available)
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Upper bound on mutation combinations per principal and stage
        #[arg(long, default_value_t = VerifyConfig::default().mutation_cap)]
        mutation_cap: usize,

        /// Last stage the active attacker may reach
        #[arg(long, default_value_t = VerifyConfig::default().max_stage)]
        max_stage: usize,

        /// Log every attacker deduction
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a model in canonical form
    Pretty {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Answer a JSON bridge request read from standard input
    #[command(hide = true)]
    Json {
        #[arg(value_enum)]
        request: Request,
    },
}

fn main() {
    // Install miette's fancy error handler
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let filter = match &cli.command {
        Commands::Verify { verbose: true, .. } => EnvFilter::new("debug"),
        // stdout carries the JSON answer, keep logs quiet
        Commands::Json { .. } => EnvFilter::new("warn"),
        _ => EnvFilter::new("info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Verify {
            file,
            threads,
            mutation_cap,
            max_stage,
            verbose: _,
        } => cmd_verify(&file, threads, mutation_cap, max_stage),
        Commands::Pretty { file } => cmd_pretty(&file),
        Commands::Json { request } => cmd_json(request),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}

fn cmd_verify(file: &PathBuf, threads: usize, mutation_cap: usize, max_stage: usize) -> CliResult<()> {
    let filename = file.display().to_string();
    let (model, source) = load_model(file)?;
    // surface sanity errors with their source context before any analysis
    check_model(&model, source, &filename)?;

    let config = VerifyConfig {
        threads,
        mutation_cap,
        max_stage,
        ..VerifyConfig::default()
    };
    let start = Instant::now();
    let outcome = verify(&model, &config)?;
    info!(
        "{} analyses in {:.2}s.",
        outcome.analyses,
        start.elapsed().as_secs_f64()
    );

    println!();
    print!("{}", render_outcome(&outcome));
    Ok(())
}

fn cmd_pretty(file: &PathBuf) -> CliResult<()> {
    let filename = file.display().to_string();
    let source = std::sync::Arc::new(std::fs::read_to_string(file).map_err(|e| CliError::IoError {
        message: format!("{filename}: {e}"),
    })?);
    let ast = verifpal_syntax::parse(&source)
        .map_err(|e| CliError::from_parse_error(e, source.clone(), &filename))?;
    print!("{}", verifpal_syntax::pretty_print(&ast));
    Ok(())
}

fn cmd_json(request: Request) -> CliResult<()> {
    let body = read_request_body(io::stdin().lock())?;
    let answer = respond(request, &body)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{answer}").map_err(|e| CliError::IoError { message: e.to_string() })?;
    Ok(())
}
