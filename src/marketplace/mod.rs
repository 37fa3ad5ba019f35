//! Marketplace catalogs for claude-plugin dependencies
//!
//! A marketplace is a catalog of named plugins, each with a source
//! reference. The catalog itself can live in a local directory, a GitHub
//! repo, a generic git URL, or behind a plain URL serving the JSON directly.
//! Loading is memoized per spec string for the run, so a marketplace
//! referenced by many plugins is fetched and parsed once.

pub mod resolve;

pub use resolve::{find_plugin, install_native_plugin, resolve_plugin_source};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SkError};
use crate::git::{self, GitScope};
use crate::manifest::RepoSlug;

/// Relative location of the catalog inside a repository.
pub const MARKETPLACE_JSON: &str = ".claude-plugin/marketplace.json";

/// Upper bound on a marketplace URL fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(10_000);

/// A plugin's source reference inside marketplace.json.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PluginSource {
    /// Relative path under the marketplace's plugin root
    Path(String),
    Structured(StructuredSource),
}

/// Structured source forms: `{"source": "github", "repo": ...}` or
/// `{"source": "url", "url": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum StructuredSource {
    Github { repo: String },
    Url { url: String },
}

/// One catalog entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplacePlugin {
    pub name: String,
    pub source: PluginSource,
}

/// Parsed marketplace.json.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceInfo {
    pub name: String,
    pub plugins: Vec<MarketplacePlugin>,
    #[serde(default, rename = "pluginRoot")]
    pub plugin_root: Option<String>,
}

/// A loaded catalog plus the directory plugin paths resolve against.
/// URL-backed marketplaces have no filesystem backing.
#[derive(Debug, Clone)]
pub struct LoadedMarketplace {
    pub info: MarketplaceInfo,
    pub root: Option<PathBuf>,
}

/// Per-run memo cache keyed by the marketplace spec string.
#[derive(Default)]
pub struct MarketplaceCache {
    entries: HashMap<String, LoadedMarketplace>,
}

impl MarketplaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// How a marketplace spec string is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MarketplaceSource {
    Github(RepoSlug),
    Url(String),
    Git(String),
    Local(PathBuf),
}

fn classify(spec: &str, source_dir: &Path) -> Result<MarketplaceSource> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(SkError::MarketplaceInvalid {
            marketplace: spec.to_string(),
            message: "marketplace reference cannot be empty".to_string(),
        });
    }

    if let Some(slug) = spec
        .strip_prefix("github:")
        .or_else(|| spec.strip_prefix("gh:"))
    {
        let slug = RepoSlug::parse(slug).map_err(|reason| SkError::MarketplaceInvalid {
            marketplace: spec.to_string(),
            message: reason,
        })?;
        return Ok(MarketplaceSource::Github(slug));
    }

    if spec.starts_with("http://") || spec.starts_with("https://") {
        if spec.ends_with("marketplace.json") {
            return Ok(MarketplaceSource::Url(spec.to_string()));
        }
        return Ok(MarketplaceSource::Git(spec.to_string()));
    }

    if spec.starts_with("git@") || spec.starts_with("ssh://") || spec.starts_with("file://") {
        return Ok(MarketplaceSource::Git(spec.to_string()));
    }

    let local = crate::manifest::dependency::resolve_local_path(source_dir, spec);
    if local.is_dir() {
        return Ok(MarketplaceSource::Local(local));
    }

    let slug = RepoSlug::parse(spec).map_err(|_| SkError::MarketplaceInvalid {
        marketplace: spec.to_string(),
        message: "not a directory, URL, or owner/repo reference".to_string(),
    })?;
    Ok(MarketplaceSource::Github(slug))
}

/// Load a marketplace catalog, memoized per `spec` for the run.
///
/// `source_dir` anchors relative local specs (the directory of the manifest
/// declaring the plugin); `temp_root` receives any clones.
pub fn load_marketplace_info(
    spec: &str,
    source_dir: &Path,
    temp_root: &Path,
    cache: &mut MarketplaceCache,
) -> Result<LoadedMarketplace> {
    if let Some(loaded) = cache.entries.get(spec) {
        return Ok(loaded.clone());
    }

    let loaded = match classify(spec, source_dir)? {
        MarketplaceSource::Local(dir) => load_from_dir(spec, &dir)?,
        MarketplaceSource::Github(slug) => {
            let dest = clone_dest(temp_root, cache);
            let scope = GitScope::new(spec, slug.clone_url());
            git::clone_shallow(&scope, &slug.clone_url(), &dest, false)?;
            load_from_dir(spec, &dest)?
        }
        MarketplaceSource::Git(url) => {
            let dest = clone_dest(temp_root, cache);
            let scope = GitScope::new(spec, url.clone());
            git::clone_shallow(&scope, &url, &dest, false)?;
            load_from_dir(spec, &dest)?
        }
        MarketplaceSource::Url(url) => load_from_url(spec, &url)?,
    };

    cache.entries.insert(spec.to_string(), loaded.clone());
    Ok(loaded)
}

fn clone_dest(temp_root: &Path, cache: &MarketplaceCache) -> PathBuf {
    temp_root.join(format!("marketplace-{}", cache.entries.len()))
}

fn load_from_dir(spec: &str, repo_root: &Path) -> Result<LoadedMarketplace> {
    let json_path = repo_root.join(MARKETPLACE_JSON);
    if !json_path.is_file() {
        return Err(SkError::MarketplaceInvalid {
            marketplace: spec.to_string(),
            message: format!("missing {MARKETPLACE_JSON}"),
        });
    }
    let content = crate::common::fs::read_to_string(&json_path)?;
    let info = parse_info(spec, &content)?;

    let root = match &info.plugin_root {
        Some(plugin_root) => {
            let dir =
                crate::manifest::dependency::resolve_local_path(repo_root, plugin_root);
            if !dir.is_dir() {
                return Err(SkError::MarketplaceInvalid {
                    marketplace: spec.to_string(),
                    message: format!("pluginRoot '{plugin_root}' is not a directory"),
                });
            }
            dir
        }
        None => repo_root.to_path_buf(),
    };

    Ok(LoadedMarketplace {
        info,
        root: Some(root),
    })
}

fn load_from_url(spec: &str, url: &str) -> Result<LoadedMarketplace> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| SkError::MarketplaceFetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| SkError::MarketplaceFetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let content = response
        .text()
        .map_err(|e| SkError::MarketplaceFetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let info = parse_info(spec, &content)?;

    // No filesystem backing: relative plugin paths have nothing to resolve
    // against, so a pluginRoot makes no sense here.
    if info.plugin_root.is_some() {
        return Err(SkError::MarketplaceInvalid {
            marketplace: spec.to_string(),
            message: "URL-backed marketplaces cannot declare pluginRoot".to_string(),
        });
    }

    Ok(LoadedMarketplace { info, root: None })
}

fn parse_info(spec: &str, content: &str) -> Result<MarketplaceInfo> {
    serde_json::from_str(content).map_err(|e| SkError::MarketplaceInvalid {
        marketplace: spec.to_string(),
        message: format!("invalid marketplace.json: {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn temp() -> TempDir {
        TempDir::new_in(crate::temp::temp_dir_base()).unwrap()
    }

    const CATALOG: &str = r#"{
        "name": "acme-market",
        "plugins": [
            { "name": "linter", "source": "./plugins/linter" },
            { "name": "review", "source": { "source": "github", "repo": "acme/review" } },
            { "name": "docs", "source": { "source": "url", "url": "https://example.com/docs.git" } }
        ]
    }"#;

    #[test]
    fn test_parse_info_sources() {
        let info = parse_info("m", CATALOG).unwrap();
        assert_eq!(info.name, "acme-market");
        assert_eq!(info.plugins.len(), 3);
        assert_eq!(
            info.plugins[0].source,
            PluginSource::Path("./plugins/linter".to_string())
        );
        assert_eq!(
            info.plugins[1].source,
            PluginSource::Structured(StructuredSource::Github {
                repo: "acme/review".to_string()
            })
        );
        assert_eq!(
            info.plugins[2].source,
            PluginSource::Structured(StructuredSource::Url {
                url: "https://example.com/docs.git".to_string()
            })
        );
    }

    #[test]
    fn test_parse_info_rejects_unknown_source_shape() {
        let bad = r#"{"name":"m","plugins":[{"name":"x","source":{"source":"ftp","host":"h"}}]}"#;
        assert!(parse_info("m", bad).is_err());
    }

    #[test]
    fn test_classify_ladder() {
        let temp = temp();
        fs::create_dir_all(temp.path().join("market")).unwrap();

        assert!(matches!(
            classify("github:acme/market", temp.path()).unwrap(),
            MarketplaceSource::Github(_)
        ));
        assert!(matches!(
            classify("gh:acme/market", temp.path()).unwrap(),
            MarketplaceSource::Github(_)
        ));
        assert!(matches!(
            classify(
                "https://example.com/.claude-plugin/marketplace.json",
                temp.path()
            )
            .unwrap(),
            MarketplaceSource::Url(_)
        ));
        assert!(matches!(
            classify("https://example.com/repo.git", temp.path()).unwrap(),
            MarketplaceSource::Git(_)
        ));
        assert!(matches!(
            classify("git@github.com:acme/market.git", temp.path()).unwrap(),
            MarketplaceSource::Git(_)
        ));
        assert!(matches!(
            classify("./market", temp.path()).unwrap(),
            MarketplaceSource::Local(_)
        ));
        // Not a local dir, falls through to the slug attempt
        assert!(matches!(
            classify("acme/market", temp.path()).unwrap(),
            MarketplaceSource::Github(_)
        ));
        assert!(classify("not-a-thing", temp.path()).is_err());
    }

    #[test]
    fn test_load_local_marketplace_and_cache() {
        let temp = temp();
        let market = temp.path().join("market");
        fs::create_dir_all(market.join(".claude-plugin")).unwrap();
        fs::create_dir_all(market.join("plugins/linter")).unwrap();
        fs::write(market.join(MARKETPLACE_JSON), CATALOG).unwrap();

        let mut cache = MarketplaceCache::new();
        let loaded =
            load_marketplace_info("./market", temp.path(), temp.path(), &mut cache).unwrap();
        assert_eq!(loaded.info.name, "acme-market");
        assert_eq!(loaded.root.as_deref(), Some(market.as_path()));
        assert_eq!(cache.len(), 1);

        // Second load is served from the cache
        let again =
            load_marketplace_info("./market", temp.path(), temp.path(), &mut cache).unwrap();
        assert_eq!(again.info.name, "acme-market");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_plugin_root_override() {
        let temp = temp();
        let market = temp.path().join("market");
        fs::create_dir_all(market.join(".claude-plugin")).unwrap();
        fs::create_dir_all(market.join("catalog")).unwrap();
        let catalog = r#"{"name":"m","plugins":[],"pluginRoot":"./catalog"}"#;
        fs::write(market.join(MARKETPLACE_JSON), catalog).unwrap();

        let mut cache = MarketplaceCache::new();
        let loaded =
            load_marketplace_info("./market", temp.path(), temp.path(), &mut cache).unwrap();
        assert_eq!(loaded.root.as_deref(), Some(market.join("catalog").as_path()));
    }

    #[test]
    fn test_plugin_root_must_exist() {
        let temp = temp();
        let market = temp.path().join("market");
        fs::create_dir_all(market.join(".claude-plugin")).unwrap();
        let catalog = r#"{"name":"m","plugins":[],"pluginRoot":"./missing"}"#;
        fs::write(market.join(MARKETPLACE_JSON), catalog).unwrap();

        let mut cache = MarketplaceCache::new();
        let err = load_marketplace_info("./market", temp.path(), temp.path(), &mut cache)
            .unwrap_err();
        assert!(matches!(err, SkError::MarketplaceInvalid { .. }));
    }

    #[test]
    fn test_missing_marketplace_json() {
        let temp = temp();
        let market = temp.path().join("market");
        fs::create_dir_all(&market).unwrap();

        let mut cache = MarketplaceCache::new();
        let err = load_marketplace_info("./market", temp.path(), temp.path(), &mut cache)
            .unwrap_err();
        assert!(matches!(err, SkError::MarketplaceInvalid { .. }));
    }
}
