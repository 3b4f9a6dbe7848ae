//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Vizor multi-size visual dev orchestrator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Project root containing src/ and dist/
    #[arg(short, long, global = true, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub root: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the dev orchestrator for one visual
    #[command(visible_alias = "d")]
    Dev {
        #[command(flatten)]
        args: DevArgs,
    },

    /// Validate a visual's config and schema
    #[command(visible_alias = "v")]
    Validate {
        #[command(flatten)]
        args: ValidateArgs,
    },
}

/// Dev command arguments
#[derive(clap::Args, Debug, Clone)]
pub struct DevArgs {
    /// Verbose lifecycle logging
    #[arg(short, long)]
    pub debug: bool,

    /// Prefer the pinned newest visual
    #[arg(short, long)]
    pub newest: bool,

    /// Skip confirmation and resume the last visual
    #[arg(short, long)]
    pub latest: bool,

    /// Point injected script URLs at local dev servers instead of the CDN
    #[arg(short = 'L', long)]
    pub local: bool,
}

/// Validate command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the visual directory (the one holding config.json)
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub visual: PathBuf,
}

#[allow(unused)]
impl Cli {
    pub const fn is_dev(&self) -> bool {
        matches!(self.command, Commands::Dev { .. })
    }
    pub const fn is_validate(&self) -> bool {
        matches!(self.command, Commands::Validate { .. })
    }
}
