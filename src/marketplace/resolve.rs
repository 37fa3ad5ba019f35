//! Plugin lookup and source resolution
//!
//! Turns a marketplace plugin entry into an ordinary dependency declaration,
//! or delegates to the host agent's own plugin installer when the agent has
//! native support. The plugin→marketplace→declaration indirection is one
//! bounded step: a resolved declaration is never another claude-plugin.

use std::process::Command;

use crate::agent::Agent;
use crate::error::{Result, SkError};
use crate::manifest::{Declaration, RepoSlug};

use super::{LoadedMarketplace, MarketplacePlugin, PluginSource, StructuredSource};

/// Find a plugin by name. Linear scan; catalogs are small.
pub fn find_plugin<'a>(
    marketplace: &'a LoadedMarketplace,
    plugin: &str,
) -> Result<&'a MarketplacePlugin> {
    marketplace
        .info
        .plugins
        .iter()
        .find(|p| p.name == plugin)
        .ok_or_else(|| SkError::PluginNotFound {
            marketplace: marketplace.info.name.clone(),
            plugin: plugin.to_string(),
        })
}

/// Resolve a plugin's source into an ordinary declaration.
pub fn resolve_plugin_source(
    marketplace: &LoadedMarketplace,
    plugin: &MarketplacePlugin,
) -> Result<Declaration> {
    let declaration = match &plugin.source {
        PluginSource::Path(relative) => {
            let Some(root) = &marketplace.root else {
                // URL-backed catalogs have no directory to resolve against;
                // silently resolving against the cwd would install arbitrary
                // local files.
                return Err(SkError::PluginSourceInvalid {
                    plugin: plugin.name.clone(),
                    message: "relative source requires a filesystem-backed marketplace"
                        .to_string(),
                });
            };
            let dir = crate::manifest::dependency::resolve_local_path(root, relative);
            if !dir.is_dir() {
                return Err(SkError::PluginSourceInvalid {
                    plugin: plugin.name.clone(),
                    message: format!("source '{relative}' is not a directory under the plugin root"),
                });
            }
            if !dir.starts_with(root) {
                return Err(SkError::PluginSourceInvalid {
                    plugin: plugin.name.clone(),
                    message: format!("source '{relative}' escapes the plugin root"),
                });
            }
            Declaration::Local { path: dir }
        }
        PluginSource::Structured(StructuredSource::Github { repo }) => {
            let repo = repo
                .strip_prefix("github:")
                .or_else(|| repo.strip_prefix("gh:"))
                .unwrap_or(repo);
            let slug = RepoSlug::parse(repo).map_err(|reason| SkError::PluginSourceInvalid {
                plugin: plugin.name.clone(),
                message: reason,
            })?;
            Declaration::Github {
                slug,
                reference: None,
                path: None,
            }
        }
        PluginSource::Structured(StructuredSource::Url { url }) => {
            if url.is_empty() {
                return Err(SkError::PluginSourceInvalid {
                    plugin: plugin.name.clone(),
                    message: "url source cannot be empty".to_string(),
                });
            }
            Declaration::Git {
                url: url.clone(),
                reference: None,
                path: None,
            }
        }
    };

    // Plugin entries never reference another claude-plugin.
    debug_assert!(!matches!(declaration, Declaration::ClaudePlugin { .. }));
    Ok(declaration)
}

/// Delegate plugin installation to the agent's own CLI.
///
/// "Already installed" is success, not failure; repeated syncs stay
/// idempotent for native agents.
pub fn install_native_plugin(agent: &Agent, plugin: &str, marketplace: &str) -> Result<()> {
    let Some(cli) = &agent.native_plugin_cli else {
        return Err(SkError::HostPluginInstallFailed {
            agent: agent.id.clone(),
            plugin: plugin.to_string(),
            reason: "agent has no native plugin CLI".to_string(),
        });
    };

    let output = Command::new(&cli.program)
        .args(["plugin", "install", &format!("{plugin}@{marketplace}")])
        .output()
        .map_err(|e| SkError::HostPluginInstallFailed {
            agent: agent.id.clone(),
            plugin: plugin.to_string(),
            reason: format!("failed to run {}: {e}", cli.program),
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{stdout}\n{stderr}");
    if combined.to_lowercase().contains("already installed") {
        return Ok(());
    }

    Err(SkError::HostPluginInstallFailed {
        agent: agent.id.clone(),
        plugin: plugin.to_string(),
        reason: stderr.trim().to_string(),
    })
}
