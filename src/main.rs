//! Vizor - dev-time orchestrator for multi-size visual builds.

#![allow(dead_code)]

mod bundler;
mod cli;
mod config;
mod core;
mod logger;
mod markup;
mod ports;
mod registry;
mod schema;
mod session;
mod status;
mod supervisor;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        log!("error"; "{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    match &cli.command {
        Commands::Dev { args } => cli::dev::run(&cli, args),
        Commands::Validate { args } => cli::validate::run(&cli, args),
    }
}
