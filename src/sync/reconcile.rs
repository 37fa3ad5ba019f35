//! Preflight conflict guard and stale-skill reconciliation
//!
//! The invariant both halves protect: sk never deletes or overwrites a path
//! it does not own. Ownership is membership in the previous persisted state;
//! anything else on disk is left alone, and a planned target that collides
//! with an unmanaged path aborts the sync before a single write.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{Result, SkError};
use crate::install::AgentInstallPlan;
use crate::state::AgentInstallState;

/// Verify that every planned target either does not exist yet or is already
/// managed. Runs before any filesystem write; a failure leaves the agent's
/// skills directory untouched.
pub fn preflight(plan: &AgentInstallPlan, previous: Option<&AgentInstallState>) -> Result<()> {
    for task in &plan.tasks {
        if !task.target_path.exists() {
            continue;
        }
        let managed = previous.is_some_and(|state| state.contains(&task.target_name));
        if !managed {
            return Err(SkError::InstallConflict {
                path: task.target_path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Remove existing target paths so installs land on clean directories.
/// Preflight has already proven every one of them is managed.
pub fn remove_managed_targets(plan: &AgentInstallPlan) -> Result<()> {
    for task in &plan.tasks {
        if task.target_path.exists() {
            fs::remove_dir_all(&task.target_path).map_err(|e| SkError::IoError {
                message: format!(
                    "failed to remove managed skill {}: {e}",
                    task.target_path.display()
                ),
            })?;
        }
    }
    Ok(())
}

/// Remove managed skills that fell out of the desired set. Names absent from
/// both the previous state and the new set are never touched. Returns the
/// number of removals performed.
pub fn reconcile_removals(
    skills_root: &Path,
    previous: &AgentInstallState,
    desired: &BTreeSet<String>,
) -> Result<usize> {
    let mut removed = 0;
    for name in &previous.skills {
        if desired.contains(name) {
            continue;
        }
        if !is_safe_skill_name(name) {
            continue;
        }
        let path = skills_root.join(name);
        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| SkError::IoError {
                message: format!("failed to remove stale skill {}: {e}", path.display()),
            })?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Count the removals a reconcile pass would perform, for dry-run reporting.
pub fn count_stale(previous: Option<&AgentInstallState>, desired: &BTreeSet<String>) -> usize {
    previous.map_or(0, |state| {
        state
            .skills
            .iter()
            .filter(|name| !desired.contains(*name))
            .count()
    })
}

/// Guard against a tampered state file naming paths outside the skills root.
fn is_safe_skill_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::install::InstallTask;
    use tempfile::TempDir;

    fn temp() -> TempDir {
        TempDir::new_in(crate::temp::temp_dir_base()).unwrap()
    }

    fn plan_for(root: &Path, names: &[&str]) -> AgentInstallPlan {
        AgentInstallPlan {
            tasks: names
                .iter()
                .map(|name| InstallTask {
                    target_name: (*name).to_string(),
                    target_path: root.join(name),
                    source_path: root.join("src").join(name),
                })
                .collect(),
        }
    }

    fn state_with(names: &[&str]) -> AgentInstallState {
        AgentInstallState::new(names.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn test_preflight_passes_on_clean_root() {
        let temp = temp();
        let plan = plan_for(temp.path(), &["alpha-review"]);
        assert!(preflight(&plan, None).is_ok());
    }

    #[test]
    fn test_preflight_rejects_unmanaged_existing_target() {
        let temp = temp();
        fs::create_dir_all(temp.path().join("alpha-review")).unwrap();
        let plan = plan_for(temp.path(), &["alpha-review"]);

        let err = preflight(&plan, None).unwrap_err();
        assert!(matches!(err, SkError::InstallConflict { .. }));

        // Managed in a previous state: fine.
        let state = state_with(&["alpha-review"]);
        assert!(preflight(&plan, Some(&state)).is_ok());
    }

    #[test]
    fn test_preflight_rejects_target_missing_from_state() {
        let temp = temp();
        fs::create_dir_all(temp.path().join("alpha-review")).unwrap();
        let plan = plan_for(temp.path(), &["alpha-review"]);
        let state = state_with(&["beta-fmt"]);
        let err = preflight(&plan, Some(&state)).unwrap_err();
        assert!(matches!(err, SkError::InstallConflict { .. }));
    }

    #[test]
    fn test_remove_managed_targets() {
        let temp = temp();
        fs::create_dir_all(temp.path().join("alpha-review/nested")).unwrap();
        let plan = plan_for(temp.path(), &["alpha-review", "never-installed"]);
        remove_managed_targets(&plan).unwrap();
        assert!(!temp.path().join("alpha-review").exists());
    }

    #[test]
    fn test_reconcile_removes_only_stale_managed() {
        let temp = temp();
        fs::create_dir_all(temp.path().join("stale-skill")).unwrap();
        fs::create_dir_all(temp.path().join("kept-skill")).unwrap();
        fs::create_dir_all(temp.path().join("unmanaged")).unwrap();

        let previous = state_with(&["stale-skill", "kept-skill"]);
        let desired: BTreeSet<String> = ["kept-skill".to_string()].into();

        let removed = reconcile_removals(temp.path(), &previous, &desired).unwrap();
        assert_eq!(removed, 1);
        assert!(!temp.path().join("stale-skill").exists());
        assert!(temp.path().join("kept-skill").exists());
        assert!(temp.path().join("unmanaged").exists());
    }

    #[test]
    fn test_reconcile_skips_unsafe_names() {
        let temp = temp();
        let previous = state_with(&["../escape", "ok-name"]);
        let desired = BTreeSet::new();
        // nothing exists, nothing removed, and no traversal attempted
        let removed = reconcile_removals(temp.path(), &previous, &desired).unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_count_stale() {
        let previous = state_with(&["a", "b", "c"]);
        let desired: BTreeSet<String> = ["b".to_string()].into();
        assert_eq!(count_stale(Some(&previous), &desired), 2);
        assert_eq!(count_stale(None, &desired), 0);
    }
}
