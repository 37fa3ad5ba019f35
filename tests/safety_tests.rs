//! The conflict guard and state-file safety invariants

mod common;

use common::TestWorkspace;
use predicates::prelude::*;

#[test]
fn refuses_to_overwrite_unmanaged_file() {
    let ws = TestWorkspace::new();
    ws.create_skill_package("pkg", &["review"]);
    ws.write_manifest("alpha = { path = \"./pkg\" }\n");
    ws.write_file("agent-skills/alpha-review/SKILL.md", "precious");

    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Refusing to overwrite"));

    // Zero filesystem writes happened.
    assert_eq!(ws.read_file("agent-skills/alpha-review/SKILL.md"), "precious");
    assert!(!ws.file_exists("agent-skills/.sk-state.json"));
}

#[test]
fn overwrites_target_once_managed() {
    let ws = TestWorkspace::new();
    ws.create_skill_package("pkg", &["review"]);
    ws.write_manifest("alpha = { path = \"./pkg\" }\n");
    ws.sync().assert().success();

    // Change the source; the managed target may be replaced freely.
    ws.write_file("pkg/review/SKILL.md", "---\nname: review\n---\n\nUpdated.\n");
    ws.sync().assert().success();
    assert!(ws.read_file("agent-skills/alpha-review/SKILL.md").contains("Updated."));
}

#[test]
fn unmanaged_neighbors_survive_sync_and_reconcile() {
    let ws = TestWorkspace::new();
    ws.create_skill_package("pkg", &["review"]);
    ws.write_manifest("alpha = { path = \"./pkg\" }\n");
    ws.write_file("agent-skills/hand-rolled/SKILL.md", "mine");

    ws.sync().assert().success();
    assert_eq!(ws.read_file("agent-skills/hand-rolled/SKILL.md"), "mine");

    // Reconciling down to zero still leaves the unmanaged neighbor alone.
    ws.write_file(
        "skills.toml",
        "[agents]\ncodex = { skills_path = \"./agent-skills\" }\n",
    );
    ws.sync().assert().success();
    assert_eq!(ws.read_file("agent-skills/hand-rolled/SKILL.md"), "mine");
}

#[test]
fn unsupported_state_version_is_fatal() {
    let ws = TestWorkspace::new();
    ws.create_skill_package("pkg", &["review"]);
    ws.write_manifest("alpha = { path = \"./pkg\" }\n");
    ws.write_file(
        "agent-skills/.sk-state.json",
        r#"{"version":99,"skills":[],"updatedAt":"2026-01-01T00:00:00Z"}"#,
    );

    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported version 99"));
}

#[test]
fn malformed_state_file_is_fatal() {
    let ws = TestWorkspace::new();
    ws.create_skill_package("pkg", &["review"]);
    ws.write_manifest("alpha = { path = \"./pkg\" }\n");
    ws.write_file("agent-skills/.sk-state.json", "{broken json");

    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("state file"));
}

#[test]
fn skill_name_collision_across_packages_fails_validate() {
    let ws = TestWorkspace::new();
    ws.create_skill_package("pkg", &["b-c"]);
    ws.create_skill_package("pkg2", &["c"]);
    ws.write_manifest("a = { path = \"./pkg\" }\n\"a-b\" = { path = \"./pkg2\" }\n");

    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("validate stage"));
}
