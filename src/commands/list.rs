//! `sk list` command

use std::path::PathBuf;

use console::style;

use crate::agent::AgentRegistry;
use crate::cli::ListArgs;
use crate::manifest::{self, Manifest};
use crate::state::AgentInstallState;

pub fn run(workspace: Option<PathBuf>, _args: ListArgs) -> miette::Result<()> {
    let start = super::start_dir(workspace);
    let manifest_path = manifest::discover_manifest(&start)?;
    let manifest = Manifest::load(&manifest_path)?;
    let registry = AgentRegistry::for_current_user();
    let agents = registry.select(&manifest.agents)?;

    for agent in &agents {
        println!("{}", style(&agent.display_name).bold());
        match AgentInstallState::load(&agent.skills_path)? {
            None => println!("  no managed skills"),
            Some(state) if state.skills.is_empty() => println!("  no managed skills"),
            Some(state) => {
                for skill in &state.skills {
                    println!("  {skill}");
                }
            }
        }
    }
    Ok(())
}
