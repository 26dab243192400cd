//! gosyms CLI - find declared symbols in a Go source tree.
//!
//! Prints every func, type, var or const under ROOT whose name contains
//! QUERY (case-insensitive), as JSON by default.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::search::{Format, SearchOptions, StrategyArg};

/// gosyms: jump-to-symbol for Go source trees.
#[derive(Parser)]
#[command(name = "gosyms")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory to scan for packages
    root: PathBuf,

    /// Case-insensitive substring to search for (empty matches nothing)
    query: Option<String>,

    /// Extra build tags (comma separated)
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Target operating system (defaults to $GOOS, then the host)
    #[arg(long)]
    goos: Option<String>,

    /// Target architecture (defaults to $GOARCH, then the host)
    #[arg(long)]
    goarch: Option<String>,

    /// Exclude files that import "C"
    #[arg(long)]
    no_cgo: bool,

    /// Directory name to skip while scanning (repeatable; replaces the defaults)
    #[arg(long = "ignore", value_name = "NAME")]
    ignore: Vec<String>,

    /// Extraction pipeline
    #[arg(long, value_enum, default_value_t = StrategyArg::Syntax)]
    strategy: StrategyArg,

    /// Worker threads for the syntax pipeline (defaults to the CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let options = SearchOptions {
        root: cli.root,
        query: cli.query.unwrap_or_default(),
        tags: cli.tags,
        goos: cli.goos,
        goarch: cli.goarch,
        no_cgo: cli.no_cgo,
        ignore: cli.ignore,
        strategy: cli.strategy,
        workers: cli.workers,
        format: cli.format,
    };

    match cli::search::run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}
