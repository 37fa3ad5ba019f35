//! Manifest parsing and coercion failures at the CLI boundary

mod common;

use common::TestWorkspace;
use predicates::prelude::*;

#[test]
fn missing_manifest_fails_at_discover() {
    let ws = TestWorkspace::new();
    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("discover stage"))
        .stderr(predicate::str::contains("Manifest not found"));
}

#[test]
fn toml_syntax_error_fails_at_parse() {
    let ws = TestWorkspace::new();
    ws.write_file("skills.toml", "[dependencies\nbroken");
    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse stage"));
}

#[test]
fn duplicate_alias_is_rejected_before_any_fetch() {
    let ws = TestWorkspace::new();
    ws.write_file(
        "skills.toml",
        "[agents]\ncodex = { skills_path = \"./agent-skills\" }\n\n[dependencies]\nx = \"a/b\"\nx = \"c/d\"\n",
    );
    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse stage"));
    assert!(!ws.file_exists("agent-skills"));
}

#[test]
fn ambiguous_ref_fields_fail_before_any_fetch() {
    let ws = TestWorkspace::new();
    ws.write_manifest("x = { gh = \"acme/tools\", tag = \"v1\", branch = \"main\" }\n");
    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("ref"))
        .stderr(predicate::str::contains("at most one"));
    assert!(!ws.file_exists("agent-skills"));
}

#[test]
fn unknown_dependency_shape_is_reported() {
    let ws = TestWorkspace::new();
    ws.write_manifest("x = \"just-a-word\"\n");
    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("known declaration shape"));
}

#[test]
fn alias_with_separator_is_rejected() {
    let ws = TestWorkspace::new();
    ws.write_manifest("\"bad.alias\" = \"acme/tools\"\n");
    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("alias"));
}

#[test]
fn unknown_agent_fails_at_agents_stage() {
    let ws = TestWorkspace::new();
    ws.write_file("skills.toml", "[agents]\nzed = true\n");
    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("agents stage"))
        .stderr(predicate::str::contains("Unknown agent: zed"));
}

#[test]
fn no_agents_configured_fails() {
    let ws = TestWorkspace::new();
    ws.write_file("skills.toml", "[dependencies]\n");
    ws.sync()
        .assert()
        .failure()
        .stderr(predicate::str::contains("No agents configured"));
}
