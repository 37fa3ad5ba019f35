//! Git subprocess operations
//!
//! All repository access goes through the system `git` executable.
//! Sparse checkout and shallow-history deepening are subprocess-only
//! features, so there is no in-process git library here; stderr of a failed
//! command becomes the error reason.

use std::path::Path;
use std::process::Command;

use crate::error::{Result, SkError};
use crate::manifest::GitRef;

/// Identifies whose fetch a git failure belongs to.
#[derive(Debug, Clone)]
pub struct GitScope {
    pub alias: String,
    pub source: String,
}

impl GitScope {
    pub fn new(alias: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            source: source.into(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> SkError {
        SkError::GitCommandFailed {
            alias: self.alias.clone(),
            source_spec: self.source.clone(),
            reason: reason.into(),
        }
    }
}

/// Run git with `args`, optionally inside `cwd`. Non-zero exit becomes a
/// `git_error` carrying trimmed stderr.
fn run_git(scope: &GitScope, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = cwd {
        cmd.arg("-C").arg(dir);
    }
    cmd.args(args);
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    let output = cmd
        .output()
        .map_err(|e| scope.error(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = if stderr.trim().is_empty() {
            format!("git {} exited with {}", args.join(" "), output.status)
        } else {
            stderr.trim().to_string()
        };
        return Err(scope.error(reason));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Shallow-clone `url` into `dest` (depth 1). When `sparse` is set the clone
/// is also a partial one (`--filter=blob:none --sparse`) so only the
/// sparse-checkout set is materialized.
pub fn clone_shallow(scope: &GitScope, url: &str, dest: &Path, sparse: bool) -> Result<()> {
    let dest_str = dest.display().to_string();
    let mut args = vec!["clone", "--depth", "1"];
    if sparse {
        args.extend(["--filter=blob:none", "--sparse"]);
    }
    args.extend([url, dest_str.as_str()]);
    run_git(scope, None, &args)?;
    Ok(())
}

/// Configure cone-mode sparse checkout for the given paths.
pub fn sparse_checkout(scope: &GitScope, repo: &Path, paths: &[String]) -> Result<()> {
    run_git(scope, Some(repo), &["sparse-checkout", "init", "--cone"])?;
    let mut args = vec!["sparse-checkout", "set"];
    args.extend(paths.iter().map(String::as_str));
    run_git(scope, Some(repo), &args)?;
    Ok(())
}

/// Fetch and check out a specific ref in an already-cloned repository.
///
/// Each ref kind is fetched shallow first. If the subsequent checkout fails
/// (shallow history excluding the target is the usual cause), history is
/// deepened by 50 commits once and the checkout retried; there is no
/// unbounded retry loop.
pub fn checkout_reference(scope: &GitScope, repo: &Path, reference: &GitRef) -> Result<()> {
    let (fetch_spec, checkout_target) = match reference {
        GitRef::Tag(tag) => (
            format!("refs/tags/{tag}:refs/tags/{tag}"),
            format!("refs/tags/{tag}"),
        ),
        GitRef::Branch(branch) => (format!("refs/heads/{branch}"), "FETCH_HEAD".to_string()),
        GitRef::Rev(rev) => (rev.clone(), rev.clone()),
    };

    let fetch_result = run_git(
        scope,
        Some(repo),
        &["fetch", "--depth", "1", "origin", &fetch_spec],
    );
    if let Err(err) = fetch_result {
        // Many servers refuse fetching a bare commit id; the deepen retry
        // below still finds it in history.
        if !matches!(reference, GitRef::Rev(_)) {
            return Err(err);
        }
    }

    if checkout(scope, repo, &checkout_target).is_ok() {
        return Ok(());
    }

    run_git(scope, Some(repo), &["fetch", "--deepen", "50", "origin"])?;
    checkout(scope, repo, &checkout_target)
}

fn checkout(scope: &GitScope, repo: &Path, target: &str) -> Result<()> {
    run_git(
        scope,
        Some(repo),
        &["-c", "advice.detachedHead=false", "checkout", target],
    )?;
    Ok(())
}
