//! Spillway CLI - Command-line interface
//!
//! Runs the bounded producer, consumer, escalator pipeline from the command
//! line and manages its configuration file.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::config::ConfigArgs;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "spillway")]
#[command(version, about = "Bounded producer/consumer pipeline with retry escalation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and print a summary
    Run {
        /// Config file (default: ~/.spillway/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of items to produce
        #[arg(long, short = 'n')]
        items: Option<u64>,

        /// Capacity of both queues (0 = unbounded)
        #[arg(long)]
        capacity: Option<usize>,

        /// Capacity of the error queue (0 = unbounded)
        #[arg(long)]
        error_capacity: Option<usize>,

        /// Use unbounded queues
        #[arg(long, conflicts_with_all = ["capacity", "error_capacity"])]
        unbounded: bool,

        /// Escalator attempts per failed item
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Fixed delay between escalator attempts, in milliseconds
        #[arg(long)]
        retry_delay_ms: Option<u64>,

        /// Delay after producing each item, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Seed for random fault injection
        #[arg(long)]
        seed: Option<u64>,

        /// Disable fault injection
        #[arg(long)]
        no_faults: bool,

        /// Drop failed items when the error queue is full instead of waiting
        #[arg(long)]
        best_effort: bool,

        /// Log filter (overridden by RUST_LOG)
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Show the effective configuration or create a default config file
    Config {
        /// Config file (default: ~/.spillway/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the configuration as INI
        #[arg(long)]
        print: bool,

        /// Write a default config file
        #[arg(long, conflicts_with = "print")]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            items,
            capacity,
            error_capacity,
            unbounded,
            max_attempts,
            retry_delay_ms,
            delay_ms,
            seed,
            no_faults,
            best_effort,
            log_level,
        } => commands::run::run(RunArgs {
            config,
            items,
            capacity,
            error_capacity,
            unbounded,
            max_attempts,
            retry_delay_ms,
            delay_ms,
            seed,
            no_faults,
            best_effort,
            log_level,
        }),
        Commands::Config {
            config,
            print,
            init,
        } => commands::config::run(ConfigArgs {
            config,
            print,
            init,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
