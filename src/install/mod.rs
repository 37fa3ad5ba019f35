//! Install planning and application
//!
//! Planning is a pure mapping from extracted skills to the target filesystem
//! layout; the same plan serves dry-run preview and real execution. Target
//! names are alias-prefixed so two packages exporting the same skill name
//! cannot collide on disk.

use std::path::Path;

use crate::common::fs::{CopyOptions, copy_dir_recursive};
use crate::error::{Result, SkError};
use crate::extract::Skill;

/// One planned install: a skill directory copied to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTask {
    pub target_name: String,
    pub target_path: std::path::PathBuf,
    pub source_path: std::path::PathBuf,
}

/// The full install plan for one agent.
#[derive(Debug, Clone, Default)]
pub struct AgentInstallPlan {
    pub tasks: Vec<InstallTask>,
}

impl AgentInstallPlan {
    pub fn target_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.target_name.clone()).collect()
    }
}

/// The on-disk name for a skill coming from a given package alias.
pub fn target_name(alias: &str, skill_name: &str) -> String {
    format!("{alias}-{skill_name}")
}

/// Build the install plan for one agent. Pure; no filesystem access.
pub fn plan_install(skills_root: &Path, extracted: &[(String, Skill)]) -> AgentInstallPlan {
    let tasks = extracted
        .iter()
        .map(|(alias, skill)| {
            let name = target_name(alias, &skill.name);
            InstallTask {
                target_path: skills_root.join(&name),
                target_name: name,
                source_path: skill.source_path.clone(),
            }
        })
        .collect();
    AgentInstallPlan { tasks }
}

/// Reject plans where two packages produce the same target name.
pub fn check_target_collisions(extracted: &[(String, Skill)]) -> Result<()> {
    let mut seen: std::collections::HashMap<String, &str> = std::collections::HashMap::new();
    for (alias, skill) in extracted {
        let name = target_name(alias, &skill.name);
        if let Some(first) = seen.insert(name.clone(), alias) {
            return Err(SkError::SkillNameCollision {
                name,
                first: first.to_string(),
                second: alias.clone(),
            });
        }
    }
    Ok(())
}

/// Copy one task's skill directory into place. `.git` directories never
/// travel with a skill.
pub fn apply_task(task: &InstallTask) -> Result<()> {
    copy_dir_recursive(
        &task.source_path,
        &task.target_path,
        &CopyOptions::exclude_git(),
    )
    .map_err(|e| SkError::FileWriteFailed {
        path: task.target_path.display().to_string(),
        reason: e.to_string(),
    })
}
