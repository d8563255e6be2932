//! Arbor - behavior-tree execution core
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use arbor::cli::config_cmd::{ConfigCommand, ConfigOptions};
use arbor::cli::simulate::{ChildPattern, SimulateCommand, SimulateOptions};
use arbor::config::{arbor_home, Config};
use arbor::error::exit_codes;

// =============================================================================
// CLI Definition
// =============================================================================

/// Arbor - behavior-tree execution core
#[derive(Parser)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step a repeat decorator over a scripted child and print the trace
    Simulate {
        /// Repeat count distribution, e.g. "constant,3" or "uniform,1,5"
        #[arg(long)]
        times: Option<String>,
        /// Child behavior: succeed, fail, alternate or running:K
        #[arg(long, default_value = "succeed")]
        child: ChildPattern,
        /// Maximum number of ticks
        #[arg(long)]
        ticks: Option<u64>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    arbor::logging::init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("arbor error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, appends to `$ARBOR_HOME/crash.log` and exits with the error
/// code.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("arbor panic: {}", info);

        if let Some(home) = arbor_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::ERROR);
    }));
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            times,
            child,
            ticks,
            json,
            quiet,
        } => run_simulate(SimulateOptions {
            times,
            child,
            ticks,
            json,
            quiet,
        }),
        Commands::Config { json } => run_config(json),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn run_simulate(options: SimulateOptions) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load_fail_open();
    let cmd = SimulateCommand::new(config);

    let output = cmd.run(&options);
    let formatted = cmd.format_output(&output, &options);

    if !formatted.is_empty() {
        println!("{}", formatted);
    }

    Ok(ExitCode::from(output.exit_code() as u8))
}

fn run_config(json: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load_fail_open();
    let cmd = ConfigCommand::new(config);
    let options = ConfigOptions { json, quiet: false };

    let output = cmd.run();
    println!("{}", cmd.format_output(&output, &options));

    Ok(ExitCode::from(exit_codes::SUCCESS as u8))
}
