//! Package structure detection
//!
//! A fetched package tree can carry several structural signatures at once
//! (a repo may be both a plugin and a dev marketplace). Detection collects
//! every signature; selection picks exactly one winner by specificity: an
//! explicit manifest beats an explicit plugin boundary, which beats loose
//! directory conventions. A marketplace alone is never installable.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SkError};
use crate::manifest::MANIFEST_FILE;

/// File that declares a single skill.
pub const SKILL_FILE: &str = "SKILL.md";

/// Directory holding Claude plugin/marketplace metadata.
pub const CLAUDE_PLUGIN_DIR: &str = ".claude-plugin";

/// One structural signature found under a package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedStructure {
    /// skills.toml at the package root
    Manifest(PathBuf),
    /// .claude-plugin/plugin.json, with the conventional skills dir when present
    Plugin {
        plugin_json: PathBuf,
        skills_dir: Option<PathBuf>,
    },
    /// .claude-plugin/marketplace.json
    Marketplace(PathBuf),
    /// Immediate child directories containing skill files
    Subdir(PathBuf),
    /// A single skill at the package root
    Single(PathBuf),
}

/// Collect every structural signature under `root`. Order is irrelevant;
/// selection applies precedence.
pub fn detect_structures(root: &Path) -> Vec<DetectedStructure> {
    let mut found = Vec::new();

    let manifest = root.join(MANIFEST_FILE);
    if manifest.is_file() {
        found.push(DetectedStructure::Manifest(manifest));
    }

    let plugin_json = root.join(CLAUDE_PLUGIN_DIR).join("plugin.json");
    if plugin_json.is_file() {
        let skills_dir = root.join("skills");
        found.push(DetectedStructure::Plugin {
            plugin_json,
            skills_dir: skills_dir.is_dir().then_some(skills_dir),
        });
    }

    let marketplace_json = root.join(CLAUDE_PLUGIN_DIR).join("marketplace.json");
    if marketplace_json.is_file() {
        found.push(DetectedStructure::Marketplace(marketplace_json));
    }

    if has_skill_subdirs(root) {
        found.push(DetectedStructure::Subdir(root.to_path_buf()));
    }

    let root_skill = root.join(SKILL_FILE);
    if root_skill.is_file() {
        found.push(DetectedStructure::Single(root_skill));
    }

    found
}

/// True when any immediate child directory carries a skill file.
pub fn has_skill_subdirs(root: &Path) -> bool {
    let Ok(entries) = fs::read_dir(root) else {
        return false;
    };
    entries
        .flatten()
        .any(|e| e.path().is_dir() && e.path().join(SKILL_FILE).is_file())
}

/// Select exactly one structure for installation.
///
/// `require_plugin` is set for claude-plugin declarations, which bypass the
/// general precedence and accept nothing but a plugin structure.
pub fn select_structure(
    alias: &str,
    structures: &[DetectedStructure],
    require_plugin: bool,
) -> Result<DetectedStructure> {
    if require_plugin {
        return structures
            .iter()
            .find(|s| matches!(s, DetectedStructure::Plugin { .. }))
            .cloned()
            .ok_or_else(|| SkError::PluginStructureRequired {
                alias: alias.to_string(),
            });
    }

    // A manifest kept purely for dependency bookkeeping does not win.
    for structure in structures {
        if let DetectedStructure::Manifest(path) = structure {
            if manifest_declares_package(path)? {
                return Ok(structure.clone());
            }
        }
    }

    for structure in structures {
        if matches!(structure, DetectedStructure::Plugin { .. }) {
            return Ok(structure.clone());
        }
    }
    for structure in structures {
        if matches!(structure, DetectedStructure::Subdir(_)) {
            return Ok(structure.clone());
        }
    }
    for structure in structures {
        if matches!(structure, DetectedStructure::Single(_)) {
            return Ok(structure.clone());
        }
    }

    if structures
        .iter()
        .any(|s| matches!(s, DetectedStructure::Marketplace(_)))
    {
        return Err(SkError::MarketplaceNotInstallable {
            alias: alias.to_string(),
        });
    }

    Err(SkError::NotInstallable {
        alias: alias.to_string(),
        reason: "no manifest, plugin, or skill files found".to_string(),
    })
}

/// Light check for a `[package]` table, without coercing the whole manifest.
fn manifest_declares_package(path: &Path) -> Result<bool> {
    let content = crate::common::fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content).map_err(|e| SkError::ManifestParseFailed {
        path: path.display().to_string(),
        reason: e.message().to_string(),
    })?;
    Ok(value.get("package").is_some())
}
