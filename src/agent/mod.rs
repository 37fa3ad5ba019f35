//! Agent descriptors and the built-in agent registry
//!
//! An [`Agent`] describes one coding-assistant environment: its id, display
//! name, the directory its skills live in, and optionally the host CLI that
//! installs Claude-marketplace plugins natively. Detection beyond the
//! descriptor shape (presence-checking an agent on disk) belongs to callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SkError};
use crate::manifest::AgentSelection;

/// Host CLI used for agents with native marketplace-plugin support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativePluginCli {
    /// Program to invoke (e.g. "claude").
    pub program: String,
}

/// A coding-assistant environment with its own skills-directory convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    /// Agent identifier (e.g. "claude-code", "codex", "opencode")
    pub id: String,

    /// Display name for the agent
    pub display_name: String,

    /// Directory skills are installed into
    pub skills_path: PathBuf,

    /// Present when the agent installs Claude-marketplace plugins itself
    pub native_plugin_cli: Option<NativePluginCli>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        skills_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            skills_path: skills_path.into(),
            native_plugin_cli: None,
        }
    }

    pub fn with_native_plugin_cli(mut self, program: impl Into<String>) -> Self {
        self.native_plugin_cli = Some(NativePluginCli {
            program: program.into(),
        });
        self
    }

    /// Whether this agent is present on disk (its skills parent exists).
    #[allow(dead_code)] // callers decide whether presence matters
    pub fn detect(&self) -> bool {
        self.skills_path
            .parent()
            .map(Path::exists)
            .unwrap_or(false)
    }
}

/// Registry of known agents
pub struct AgentRegistry {
    agents: Vec<Agent>,
    by_id: HashMap<String, usize>,
}

impl AgentRegistry {
    pub fn new(agents: Vec<Agent>) -> Self {
        let by_id: HashMap<String, usize> = agents
            .iter()
            .enumerate()
            .map(|(idx, a)| (a.id.clone(), idx))
            .collect();
        Self { agents, by_id }
    }

    /// Registry with the built-in agent set, skills roots under `home`.
    pub fn builtin(home: &Path) -> Self {
        Self::new(vec![
            Agent::new(
                "claude-code",
                "Claude Code",
                home.join(".claude").join("skills"),
            )
            .with_native_plugin_cli("claude"),
            Agent::new("codex", "Codex", home.join(".codex").join("skills")),
            Agent::new(
                "opencode",
                "OpenCode",
                home.join(".config").join("opencode").join("skills"),
            ),
            Agent::new("cursor", "Cursor", home.join(".cursor").join("skills")),
        ])
    }

    /// Registry with skills roots under the user's home directory.
    pub fn for_current_user() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::builtin(&home)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Agent> {
        self.by_id.get(id).and_then(|&idx| self.agents.get(idx))
    }

    #[allow(dead_code)]
    pub fn all(&self) -> &[Agent] {
        &self.agents
    }

    /// Resolve the manifest's `[agents]` selections against this registry,
    /// applying per-agent skills-path overrides.
    pub fn select(&self, selections: &[AgentSelection]) -> Result<Vec<Agent>> {
        if selections.is_empty() {
            return Err(SkError::NoAgentsConfigured);
        }
        let mut selected = Vec::new();
        for selection in selections {
            let mut agent = self
                .get_by_id(&selection.id)
                .cloned()
                .ok_or_else(|| SkError::AgentUnknown {
                    id: selection.id.clone(),
                })?;
            if let Some(path) = &selection.skills_path {
                agent.skills_path = path.clone();
            }
            selected.push(agent);
        }
        Ok(selected)
    }
}
