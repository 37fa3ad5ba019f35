//! skills.toml parsing and serialization
//!
//! The manifest declares package metadata, target agents, dependencies, and
//! export rules. Parsing is a strict pipeline: TOML syntax, then schema
//! shape, then per-dependency semantic coercion. The first failure aborts
//! the whole parse; there are no partial manifests.

pub mod dependency;

pub use dependency::{
    Declaration, DependencyDecl, GitRef, PackageOrigin, RawDependency, RepoSlug,
};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::fs;
use crate::error::{Result, SkError};

/// Manifest file name looked up during discovery.
pub const MANIFEST_FILE: &str = "skills.toml";

/// `[package]` metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Raw `[agents]` entry: `claude-code = true` or
/// `opencode = { skills_path = "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAgentEntry {
    Enabled(bool),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skills_path: Option<String>,
    },
}

/// A selected agent from the `[agents]` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSelection {
    pub id: String,
    /// Absolute override of the agent's skills root, resolved against the
    /// manifest directory.
    pub skills_path: Option<PathBuf>,
}

/// Raw `[exports.auto_discover] skills` value: a directory or `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSkillsExport {
    Dir(String),
    Toggle(bool),
}

/// Coerced auto-discover rule for skills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillsExport {
    /// Discover skills under this directory (relative to the manifest dir).
    Dir(String),
    Disabled,
}

impl SkillsExport {
    /// Default discovery root when the manifest says nothing.
    pub const DEFAULT_DIR: &'static str = "./skills";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAutoDiscover {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skills: Option<RawSkillsExport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExports {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auto_discover: Option<RawAutoDiscover>,
}

/// Manifest as read from disk, before coercion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    package: Option<PackageSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agents: Option<BTreeMap<String, RawAgentEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<BTreeMap<String, RawDependency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exports: Option<RawExports>,
}

/// A fully parsed and coerced manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Absolute path of the manifest file.
    pub path: PathBuf,
    /// Directory containing the manifest; anchors all relative paths.
    pub dir: PathBuf,
    pub package: Option<PackageSection>,
    pub agents: Vec<AgentSelection>,
    pub dependencies: Vec<DependencyDecl>,
    pub skills_export: SkillsExport,
}

impl Manifest {
    /// Load and coerce a manifest from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SkError::ManifestNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Parse manifest content. `path` is used for error reporting and for
    /// resolving relative paths.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        // Stage 1: TOML syntax
        let value: toml::Value =
            toml::from_str(content).map_err(|e| SkError::ManifestParseFailed {
                path: path.display().to_string(),
                reason: e.message().to_string(),
            })?;

        // Stage 2: schema shape
        let raw: RawManifest =
            RawManifest::deserialize(value).map_err(|e| SkError::ManifestShapeInvalid {
                path: path.display().to_string(),
                reason: e.message().to_string(),
            })?;

        // Stage 3: semantic coercion
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut dependencies = Vec::new();
        for (alias, raw_dep) in raw.dependencies.iter().flatten() {
            let declaration = dependency::coerce(alias, raw_dep, &dir)?;
            dependencies.push(DependencyDecl {
                origin: PackageOrigin {
                    alias: alias.clone(),
                    manifest_path: path.to_path_buf(),
                },
                declaration,
            });
        }

        let mut agents = Vec::new();
        for (id, entry) in raw.agents.iter().flatten() {
            match entry {
                RawAgentEntry::Enabled(false) => {}
                RawAgentEntry::Enabled(true) => agents.push(AgentSelection {
                    id: id.clone(),
                    skills_path: None,
                }),
                RawAgentEntry::Detailed { skills_path } => agents.push(AgentSelection {
                    id: id.clone(),
                    skills_path: skills_path
                        .as_deref()
                        .map(|p| dependency::resolve_local_path(&dir, p)),
                }),
            }
        }

        let skills_export = match raw.exports.and_then(|e| e.auto_discover).and_then(|a| a.skills)
        {
            None => SkillsExport::Dir(SkillsExport::DEFAULT_DIR.to_string()),
            Some(RawSkillsExport::Toggle(false)) => SkillsExport::Disabled,
            Some(RawSkillsExport::Toggle(true)) => {
                SkillsExport::Dir(SkillsExport::DEFAULT_DIR.to_string())
            }
            Some(RawSkillsExport::Dir(d)) => {
                if d.is_empty() {
                    return Err(SkError::ManifestShapeInvalid {
                        path: path.display().to_string(),
                        reason: "exports.auto_discover.skills cannot be empty".to_string(),
                    });
                }
                SkillsExport::Dir(d)
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            dir,
            package: raw.package,
            agents,
            dependencies,
            skills_export,
        })
    }

    /// Whether this manifest declares a `[package]` table. A manifest kept
    /// purely for dependency bookkeeping does not.
    pub fn has_package(&self) -> bool {
        self.package.is_some()
    }

    /// Serialize back to canonical TOML. `parse(to_toml(parse(m)))` equals
    /// `parse(m)` for manifests written in canonical dependency forms.
    pub fn to_toml_string(&self) -> Result<String> {
        let mut dependencies = BTreeMap::new();
        for dep in &self.dependencies {
            dependencies.insert(dep.origin.alias.clone(), declaration_to_raw(&dep.declaration));
        }
        let mut agents = BTreeMap::new();
        for agent in &self.agents {
            let entry = match &agent.skills_path {
                None => RawAgentEntry::Enabled(true),
                Some(p) => RawAgentEntry::Detailed {
                    skills_path: Some(p.display().to_string()),
                },
            };
            agents.insert(agent.id.clone(), entry);
        }
        let raw = RawManifest {
            package: self.package.clone(),
            agents: (!agents.is_empty()).then_some(agents),
            dependencies: (!dependencies.is_empty()).then_some(dependencies),
            exports: match &self.skills_export {
                SkillsExport::Dir(d) if d == SkillsExport::DEFAULT_DIR => None,
                SkillsExport::Dir(d) => Some(RawExports {
                    auto_discover: Some(RawAutoDiscover {
                        skills: Some(RawSkillsExport::Dir(d.clone())),
                    }),
                }),
                SkillsExport::Disabled => Some(RawExports {
                    auto_discover: Some(RawAutoDiscover {
                        skills: Some(RawSkillsExport::Toggle(false)),
                    }),
                }),
            },
        };
        toml::to_string_pretty(&raw).map_err(|e| SkError::ManifestShapeInvalid {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn declaration_to_raw(declaration: &Declaration) -> RawDependency {
    match declaration {
        Declaration::Registry { org, name, version } => RawDependency::Spec(match org {
            Some(org) => format!("@{org}/{name}@{version}"),
            None => format!("{name}@{version}"),
        }),
        Declaration::Github {
            slug,
            reference,
            path,
        } => {
            if reference.is_none() && path.is_none() {
                RawDependency::Spec(slug.to_string())
            } else {
                let mut table = dependency::RawDependencyTable {
                    gh: Some(slug.to_string()),
                    path: path.clone(),
                    ..Default::default()
                };
                apply_ref(&mut table, reference.as_ref());
                RawDependency::Table(table)
            }
        }
        Declaration::Git {
            url,
            reference,
            path,
        } => {
            let mut table = dependency::RawDependencyTable {
                git: Some(url.clone()),
                path: path.clone(),
                ..Default::default()
            };
            apply_ref(&mut table, reference.as_ref());
            RawDependency::Table(table)
        }
        Declaration::Local { path } => RawDependency::Table(dependency::RawDependencyTable {
            path: Some(path.display().to_string()),
            ..Default::default()
        }),
        Declaration::ClaudePlugin {
            plugin,
            marketplace,
        } => RawDependency::Table(dependency::RawDependencyTable {
            kind: Some("claude-plugin".to_string()),
            plugin: Some(plugin.clone()),
            marketplace: Some(marketplace.clone()),
            ..Default::default()
        }),
    }
}

fn apply_ref(table: &mut dependency::RawDependencyTable, reference: Option<&GitRef>) {
    match reference {
        Some(GitRef::Tag(t)) => table.tag = Some(t.clone()),
        Some(GitRef::Branch(b)) => table.branch = Some(b.clone()),
        Some(GitRef::Rev(r)) => table.rev = Some(r.clone()),
        None => {}
    }
}

/// Walk up from `start` looking for a manifest file.
pub fn discover_manifest(start: &Path) -> Result<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        current = dir.parent();
    }
    Err(SkError::ManifestNotFound {
        path: start.join(MANIFEST_FILE).display().to_string(),
    })
}

/// Combine dependency lists from several manifests, enforcing alias
/// uniqueness across the whole set.
pub fn merge_dependencies(manifests: &[Manifest]) -> Result<Vec<DependencyDecl>> {
    let mut seen = std::collections::BTreeMap::new();
    let mut merged = Vec::new();
    for manifest in manifests {
        for dep in &manifest.dependencies {
            if seen
                .insert(dep.origin.alias.clone(), dep.origin.manifest_path.clone())
                .is_some()
            {
                return Err(SkError::DuplicateAlias {
                    alias: dep.origin.alias.clone(),
                });
            }
            merged.push(dep.clone());
        }
    }
    Ok(merged)
}
