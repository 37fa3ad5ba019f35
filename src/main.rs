//! sk - package manager for AI coding agent skills
//!
//! Resolves skill dependencies declared in skills.toml (registry specs,
//! GitHub, git, local paths, Claude marketplace plugins) and keeps each
//! configured agent's installed skill set in sync across runs.

use clap::Parser;

mod agent;
mod cli;
mod commands;
mod common;
mod detect;
mod error;
mod extract;
mod fetcher;
mod frontmatter;
mod git;
mod install;
mod manifest;
mod marketplace;
mod progress;
mod resolver;
mod state;
mod sync;
mod temp;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync(args) => commands::sync::run(cli.workspace, args),
        Commands::List(args) => commands::list::run(cli.workspace, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
