//! `sk sync` command

use std::path::PathBuf;

use console::style;

use crate::agent::AgentRegistry;
use crate::cli::SyncArgs;
use crate::sync::{self, SyncOptions};

pub fn run(workspace: Option<PathBuf>, args: SyncArgs) -> miette::Result<()> {
    let start = super::start_dir(workspace);
    let registry = AgentRegistry::for_current_user();
    let options = SyncOptions {
        dry_run: args.dry_run,
        show_progress: !args.quiet && console::Term::stderr().is_term(),
    };

    let report = sync::run(&start, &registry, options)?;

    let mut failures = 0;
    for outcome in &report.outcomes {
        let label = style(&outcome.agent.display_name).bold();
        match &outcome.result {
            Ok(agent_report) => {
                for warning in &agent_report.warnings {
                    println!("  {} {warning}", style("warning:").yellow());
                }
                if agent_report.no_dependencies {
                    println!("{label}: no dependencies declared, nothing to sync");
                } else {
                    let suffix = if agent_report.dry_run { " (dry-run)" } else { "" };
                    println!(
                        "{label}: {} installed, {} removed{suffix}",
                        agent_report.installed, agent_report.removed
                    );
                    if agent_report.dry_run {
                        for target in &agent_report.targets {
                            println!("  would install {target}");
                        }
                    }
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{label}: {}", style(e).red());
            }
        }
    }

    if failures > 0 {
        return Err(miette::miette!("sync failed for {failures} agent(s)"));
    }
    Ok(())
}
