//! Common test utilities for sk integration tests

use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// A test workspace for integration tests
#[allow(dead_code)]
pub struct TestWorkspace {
    /// Temporary directory
    #[allow(dead_code)]
    pub temp: TempDir,
    /// Path to workspace root
    pub path: PathBuf,
}

#[allow(dead_code)]
impl TestWorkspace {
    /// Create a new test workspace
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        Self { temp, path }
    }

    /// Write a file in the workspace, creating parent directories
    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Read a file from the workspace
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }

    /// Check if a file exists in the workspace
    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// Write a manifest that targets the codex agent with a skills root
    /// inside the workspace, plus the given [dependencies] body.
    pub fn write_manifest(&self, dependencies: &str) {
        let manifest = format!(
            "[agents]\ncodex = {{ skills_path = \"./agent-skills\" }}\n\n[dependencies]\n{dependencies}"
        );
        self.write_file("skills.toml", &manifest);
    }

    /// Create a local package directory exporting one skill per name.
    pub fn create_skill_package(&self, package: &str, skills: &[&str]) {
        for skill in skills {
            self.write_file(
                &format!("{package}/{skill}/SKILL.md"),
                &format!("---\nname: {skill}\n---\n\nInstructions for {skill}.\n"),
            );
        }
    }

    /// An `sk` command running inside this workspace
    pub fn sk(&self) -> Command {
        let mut cmd = Command::cargo_bin("sk").expect("Failed to find sk binary");
        cmd.current_dir(&self.path);
        cmd
    }

    /// An `sk sync` command running inside this workspace
    pub fn sync(&self) -> Command {
        let mut cmd = self.sk();
        cmd.arg("sync").arg("--quiet");
        cmd
    }
}
