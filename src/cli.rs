//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Package manager for AI coding agent skills
#[derive(Parser)]
#[command(name = "sk", version, about, long_about = None)]
pub struct Cli {
    /// Operate on this directory instead of the current one
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync every configured agent with the manifest
    Sync(SyncArgs),
    /// List managed skills per configured agent
    List(ListArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Compute and report the plan without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress the fetch progress bar
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {}
