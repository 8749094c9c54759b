mod analysis;
mod commands;
mod config;
mod diagnostics;
mod error;
mod fence;
mod fixer;
mod grammar;
mod outline;
mod prompt;
mod report;
mod resolver;
mod scanner;
mod source;
mod text;
mod types;
mod validator;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::fixer::FixPolicy;
use crate::report::OutputFormat;

/// Environment variable holding a tracing filter, e.g. `coderef=debug`.
const LOG_ENV: &str = "CODEREF_LOG";

/// Exit code for failures that stop a run before any reference is checked.
const EXIT_RUNTIME_ERROR: u8 = 3;

/// Keep code quoted in markdown in sync with its source.
#[derive(Parser)]
#[command(name = "coderef", version, about = "Keep code quoted in markdown in sync with its source")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// More log output on stderr (-v info, -vv debug); CODEREF_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

/// Subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Validate every CODE_REF marker and report mismatches
    Check {
        /// Markdown files or directories (default: the whole project)
        paths: Vec<PathBuf>,
        /// Report format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Update quoted code and line numbers to match the source
    Fix {
        /// Markdown files or directories (default: the whole project)
        paths: Vec<PathBuf>,
        /// Print the diff without writing anything
        #[arg(long, conflicts_with = "yes")]
        dry_run: bool,
        /// Apply every fix without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// List symbols in a source file, or print the marker and code for a selector
    Resolve {
        /// Source file
        file: PathBuf,
        /// `start-end`, `name`, or `Class#method`, optionally followed by `:start-end`
        selector: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Check { paths, format } => commands::check(&paths, format),
        Commands::Fix { paths, dry_run, yes } => {
            let policy = if dry_run {
                FixPolicy::Preview
            } else if yes {
                FixPolicy::Unconditional
            } else {
                FixPolicy::Confirm
            };
            commands::fix(&paths, policy)
        },
        Commands::Resolve { file, selector } => {
            commands::resolve(&file, selector.as_deref()).map(|()| ExitCode::SUCCESS)
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        },
    }
}

/// Install the stderr log subscriber. `CODEREF_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_err| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
