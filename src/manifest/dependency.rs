//! Dependency declarations and their coercion
//!
//! A raw dependency value in skills.toml is either a bare spec string or an
//! inline table. Coercion dispatches on shape and produces an immutable
//! [`Declaration`]; everything downstream (resolver, fetcher) works on
//! declarations only and never re-validates.
//!
//! Supported forms:
//! - `"name@version"` / `"@org/name@version"` - registry spec
//! - `"owner/repo"` - GitHub shorthand
//! - `{ gh = "owner/repo", tag|branch|rev = "...", path = "..." }`
//! - `{ git = "https://... | git@... | file://...", tag|branch|rev, path }`
//! - `{ path = "../local-skills" }`
//! - `{ type = "claude-plugin", plugin = "...", marketplace = "..." }`

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkError};

/// A git reference; at most one of tag/branch/rev may be declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Tag(String),
    Branch(String),
    Rev(String),
}

impl GitRef {
    /// The bare ref string, without its kind.
    pub fn name(&self) -> &str {
        match self {
            GitRef::Tag(s) | GitRef::Branch(s) | GitRef::Rev(s) => s,
        }
    }

    /// Build from the three optional manifest fields, enforcing that at most
    /// one is present. A violation is a validation error naming field "ref".
    pub fn from_fields(
        alias: &str,
        tag: Option<&str>,
        branch: Option<&str>,
        rev: Option<&str>,
    ) -> Result<Option<Self>> {
        let set = [tag, branch, rev].iter().flatten().count();
        if set > 1 {
            return Err(SkError::DependencyInvalid {
                alias: alias.to_string(),
                field: "ref".to_string(),
                message: "at most one of 'tag', 'branch', 'rev' may be set".to_string(),
            });
        }
        let reference = if let Some(t) = tag {
            Some(GitRef::Tag(t.to_string()))
        } else if let Some(b) = branch {
            Some(GitRef::Branch(b.to_string()))
        } else {
            rev.map(|r| GitRef::Rev(r.to_string()))
        };
        if let Some(ref r) = reference {
            if r.name().is_empty() {
                return Err(SkError::DependencyInvalid {
                    alias: alias.to_string(),
                    field: "ref".to_string(),
                    message: "ref value cannot be empty".to_string(),
                });
            }
        }
        Ok(reference)
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitRef::Tag(s) => write!(f, "tag:{s}"),
            GitRef::Branch(s) => write!(f, "branch:{s}"),
            GitRef::Rev(s) => write!(f, "rev:{s}"),
        }
    }
}

/// A validated `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Parse an `owner/repo` slug: exactly two non-empty path segments,
    /// a trailing `.git` on the repo segment is stripped.
    pub fn parse(input: &str) -> std::result::Result<Self, String> {
        let trimmed = input.trim();
        let mut segments = trimmed.split('/');
        let owner = segments.next().unwrap_or("");
        let repo = segments.next().unwrap_or("");
        if segments.next().is_some() {
            return Err(format!("expected owner/repo, got '{trimmed}'"));
        }
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        if owner.is_empty() || repo.is_empty() {
            return Err(format!("expected owner/repo, got '{trimmed}'"));
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// The clone URL for this slug.
    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A validated, immutable dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Registry {
        org: Option<String>,
        name: String,
        version: String,
    },
    Github {
        slug: RepoSlug,
        reference: Option<GitRef>,
        path: Option<String>,
    },
    Git {
        url: String,
        reference: Option<GitRef>,
        path: Option<String>,
    },
    Local {
        path: PathBuf,
    },
    ClaudePlugin {
        plugin: String,
        marketplace: String,
    },
}

impl Declaration {
    /// Human-readable source string, used in error messages.
    pub fn source_display(&self) -> String {
        match self {
            Declaration::Registry { org, name, version } => match org {
                Some(org) => format!("@{org}/{name}@{version}"),
                None => format!("{name}@{version}"),
            },
            Declaration::Github { slug, .. } => slug.to_string(),
            Declaration::Git { url, .. } => url.clone(),
            Declaration::Local { path } => path.display().to_string(),
            Declaration::ClaudePlugin {
                plugin,
                marketplace,
            } => format!("{plugin}@{marketplace}"),
        }
    }
}

/// Identity of a declaration within one manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOrigin {
    pub alias: String,
    pub manifest_path: PathBuf,
}

/// A coerced dependency: where it was declared and what it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDecl {
    pub origin: PackageOrigin,
    pub declaration: Declaration,
}

/// Raw dependency value as it appears in skills.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDependency {
    Spec(String),
    Table(RawDependencyTable),
}

/// Raw inline-table dependency. Unknown keys are a schema error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDependencyTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketplace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

/// Validate an alias: non-empty and free of `/`, `.`, `:` so it is always
/// safe as a filesystem name component.
pub fn validate_alias(alias: &str) -> Result<()> {
    if alias.is_empty() {
        return Err(SkError::DependencyInvalid {
            alias: alias.to_string(),
            field: "alias".to_string(),
            message: "alias cannot be empty".to_string(),
        });
    }
    if let Some(bad) = alias.chars().find(|c| matches!(c, '/' | '.' | ':')) {
        return Err(SkError::DependencyInvalid {
            alias: alias.to_string(),
            field: "alias".to_string(),
            message: format!("alias may not contain '{bad}'"),
        });
    }
    Ok(())
}

/// Coerce one raw dependency into a [`Declaration`].
///
/// `manifest_dir` anchors relative local paths; downstream code never
/// re-resolves them.
pub fn coerce(alias: &str, raw: &RawDependency, manifest_dir: &Path) -> Result<Declaration> {
    validate_alias(alias)?;
    match raw {
        RawDependency::Spec(spec) => coerce_spec_string(alias, spec),
        RawDependency::Table(table) => coerce_table(alias, table, manifest_dir),
    }
}

fn coerce_spec_string(alias: &str, spec: &str) -> Result<Declaration> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(SkError::UnknownDependencyShape {
            alias: alias.to_string(),
        });
    }

    // `@org/name@version`
    if let Some(rest) = spec.strip_prefix('@') {
        let (org, name_ver) = rest.split_once('/').ok_or(SkError::UnknownDependencyShape {
            alias: alias.to_string(),
        })?;
        let (name, version) = name_ver
            .split_once('@')
            .ok_or(SkError::UnknownDependencyShape {
                alias: alias.to_string(),
            })?;
        if org.is_empty() || name.is_empty() || version.is_empty() || name.contains('/') {
            return Err(SkError::UnknownDependencyShape {
                alias: alias.to_string(),
            });
        }
        return Ok(Declaration::Registry {
            org: Some(org.to_string()),
            name: name.to_string(),
            version: version.to_string(),
        });
    }

    // `name@version`
    if let Some((name, version)) = spec.split_once('@') {
        if name.is_empty() || version.is_empty() || name.contains('/') {
            return Err(SkError::UnknownDependencyShape {
                alias: alias.to_string(),
            });
        }
        return Ok(Declaration::Registry {
            org: None,
            name: name.to_string(),
            version: version.to_string(),
        });
    }

    // `owner/repo` GitHub shorthand
    if spec.contains('/') {
        let slug = RepoSlug::parse(spec).map_err(|_| SkError::UnknownDependencyShape {
            alias: alias.to_string(),
        })?;
        return Ok(Declaration::Github {
            slug,
            reference: None,
            path: None,
        });
    }

    Err(SkError::UnknownDependencyShape {
        alias: alias.to_string(),
    })
}

fn coerce_table(alias: &str, table: &RawDependencyTable, manifest_dir: &Path) -> Result<Declaration> {
    if let Some(kind) = &table.kind {
        if kind != "claude-plugin" {
            return Err(SkError::DependencyInvalid {
                alias: alias.to_string(),
                field: "type".to_string(),
                message: format!("unknown dependency type '{kind}'"),
            });
        }
        return coerce_claude_plugin(alias, table);
    }

    if let Some(gh) = &table.gh {
        let slug = RepoSlug::parse(gh).map_err(|reason| SkError::DependencyInvalid {
            alias: alias.to_string(),
            field: "gh".to_string(),
            message: reason,
        })?;
        let reference = GitRef::from_fields(
            alias,
            table.tag.as_deref(),
            table.branch.as_deref(),
            table.rev.as_deref(),
        )?;
        let path = coerce_subpath(alias, table.path.as_deref())?;
        return Ok(Declaration::Github {
            slug,
            reference,
            path,
        });
    }

    if let Some(git) = &table.git {
        let url = normalize_git_url(git);
        if url.is_empty() {
            return Err(SkError::DependencyInvalid {
                alias: alias.to_string(),
                field: "git".to_string(),
                message: "git URL cannot be empty".to_string(),
            });
        }
        let reference = GitRef::from_fields(
            alias,
            table.tag.as_deref(),
            table.branch.as_deref(),
            table.rev.as_deref(),
        )?;
        let path = coerce_subpath(alias, table.path.as_deref())?;
        return Ok(Declaration::Git {
            url,
            reference,
            path,
        });
    }

    if let Some(path) = &table.path {
        if table.tag.is_some() || table.branch.is_some() || table.rev.is_some() {
            return Err(SkError::DependencyInvalid {
                alias: alias.to_string(),
                field: "ref".to_string(),
                message: "local path dependencies cannot have a git ref".to_string(),
            });
        }
        if path.is_empty() {
            return Err(SkError::DependencyInvalid {
                alias: alias.to_string(),
                field: "path".to_string(),
                message: "path cannot be empty".to_string(),
            });
        }
        return Ok(Declaration::Local {
            path: resolve_local_path(manifest_dir, path),
        });
    }

    Err(SkError::UnknownDependencyShape {
        alias: alias.to_string(),
    })
}

fn coerce_claude_plugin(alias: &str, table: &RawDependencyTable) -> Result<Declaration> {
    if table.gh.is_some() || table.git.is_some() || table.path.is_some() {
        return Err(SkError::DependencyInvalid {
            alias: alias.to_string(),
            field: "type".to_string(),
            message: "claude-plugin dependencies take only 'plugin' and 'marketplace'".to_string(),
        });
    }
    let plugin = table.plugin.as_deref().unwrap_or("");
    let marketplace = table.marketplace.as_deref().unwrap_or("");
    if plugin.is_empty() {
        return Err(SkError::DependencyInvalid {
            alias: alias.to_string(),
            field: "plugin".to_string(),
            message: "claude-plugin dependencies require a non-empty 'plugin'".to_string(),
        });
    }
    if marketplace.is_empty() {
        return Err(SkError::DependencyInvalid {
            alias: alias.to_string(),
            field: "marketplace".to_string(),
            message: "claude-plugin dependencies require a non-empty 'marketplace'".to_string(),
        });
    }
    Ok(Declaration::ClaudePlugin {
        plugin: plugin.to_string(),
        marketplace: marketplace.to_string(),
    })
}

fn coerce_subpath(alias: &str, path: Option<&str>) -> Result<Option<String>> {
    match path {
        None => Ok(None),
        Some(p) if p.is_empty() => Err(SkError::DependencyInvalid {
            alias: alias.to_string(),
            field: "path".to_string(),
            message: "path cannot be empty".to_string(),
        }),
        Some(p) => Ok(Some(p.to_string())),
    }
}

fn normalize_git_url(url: &str) -> String {
    let url = url.trim();
    url.strip_suffix('/').unwrap_or(url).to_string()
}

/// Join `relative` onto `manifest_dir` and collapse `.`/`..` components
/// lexically. The result is absolute whenever `manifest_dir` is.
pub fn resolve_local_path(manifest_dir: &Path, relative: &str) -> PathBuf {
    let candidate = Path::new(relative);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        manifest_dir.join(candidate)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    dunce::simplified(&out).to_path_buf()
}
