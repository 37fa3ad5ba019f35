//! Sync from git sources, using file:// repositories as the remote

mod common;

use std::path::Path;
use std::process::Command;

use common::TestWorkspace;
use predicates::prelude::*;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "."]);
    git(
        dir,
        &[
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@example.com",
            "commit",
            "-q",
            "-m",
            message,
        ],
    );
}

/// Create an upstream repository exporting the given skills on `main`.
fn create_upstream(ws: &TestWorkspace, name: &str, skills: &[&str]) -> String {
    ws.create_skill_package(name, skills);
    let dir = ws.path.join(name);
    git(&dir, &["init", "-q", "-b", "main"]);
    commit_all(&dir, "initial skills");
    format!("file://{}", dir.display())
}

#[test]
fn sync_installs_from_git_url() {
    let ws = TestWorkspace::new();
    let url = create_upstream(&ws, "upstream", &["review"]);
    ws.write_manifest(&format!("alpha = {{ git = \"{url}\" }}\n"));

    ws.sync()
        .assert()
        .success()
        .stdout(predicate::str::contains("1 installed, 0 removed"));
    assert!(ws.file_exists("agent-skills/alpha-review/SKILL.md"));
}

#[test]
fn sync_checks_out_requested_branch() {
    let ws = TestWorkspace::new();
    let url = create_upstream(&ws, "upstream", &["review"]);
    let dir = ws.path.join("upstream");
    git(&dir, &["checkout", "-q", "-b", "extra"]);
    ws.write_file("upstream/fmt/SKILL.md", "---\nname: fmt\n---\n\nBody.\n");
    commit_all(&dir, "add fmt skill");
    git(&dir, &["checkout", "-q", "main"]);

    ws.write_manifest(&format!(
        "alpha = {{ git = \"{url}\", branch = \"extra\" }}\n"
    ));

    ws.sync().assert().success();
    assert!(ws.file_exists("agent-skills/alpha-fmt/SKILL.md"));
    assert!(ws.file_exists("agent-skills/alpha-review/SKILL.md"));
}

#[test]
fn sync_checks_out_requested_tag() {
    let ws = TestWorkspace::new();
    let url = create_upstream(&ws, "upstream", &["review"]);
    let dir = ws.path.join("upstream");
    git(&dir, &["tag", "v1"]);
    ws.write_file(
        "upstream/review/SKILL.md",
        "---\nname: review\n---\n\nNewer content not in v1.\n",
    );
    commit_all(&dir, "update review");

    ws.write_manifest(&format!("alpha = {{ git = \"{url}\", tag = \"v1\" }}\n"));

    ws.sync().assert().success();
    let installed = ws.read_file("agent-skills/alpha-review/SKILL.md");
    assert!(!installed.contains("Newer content"));
}

#[test]
fn two_aliases_share_one_clone() {
    let ws = TestWorkspace::new();
    ws.create_skill_package("upstream/one", &["first"]);
    ws.create_skill_package("upstream/two", &["second"]);
    let dir = ws.path.join("upstream");
    git(&dir, &["init", "-q", "-b", "main"]);
    commit_all(&dir, "initial skills");
    let url = format!("file://{}", dir.display());

    // Same repo and ref, two subpaths: grouped into one fetch.
    ws.write_manifest(&format!(
        "a = {{ git = \"{url}\", path = \"one\" }}\nb = {{ git = \"{url}\", path = \"two\" }}\n"
    ));

    ws.sync()
        .assert()
        .success()
        .stdout(predicate::str::contains("2 installed, 0 removed"));
    assert!(ws.file_exists("agent-skills/a-first/SKILL.md"));
    assert!(ws.file_exists("agent-skills/b-second/SKILL.md"));
}

#[test]
fn traversal_subpath_is_rejected_before_fetch() {
    let ws = TestWorkspace::new();
    let url = create_upstream(&ws, "upstream", &["review"]);
    ws.write_manifest(&format!(
        "alpha = {{ git = \"{url}\", path = \"../escape\" }}\n"
    ));

    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("'..'"));
}

#[test]
fn missing_repository_fails_with_git_error() {
    let ws = TestWorkspace::new();
    ws.write_manifest(&format!(
        "alpha = {{ git = \"file://{}/no-such-repo\" }}\n",
        ws.path.display()
    ));

    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("fetch stage"))
        .stderr(predicate::str::contains("git failed for 'alpha'"));
}
