//! Package fetching
//!
//! Executes the fetch strategies chosen by the resolver. Remote packages
//! sharing a repository and ref are grouped and cloned once; the group's
//! sparse-checkout set is the union of all requested subpaths, and a single
//! member without a subpath widens the whole group to a full checkout.
//! Local packages are validated in place and never cloned.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, SkError};
use crate::git::{self, GitScope};
use crate::manifest::{Declaration, GitRef};
use crate::progress::FetchProgress;
use crate::resolver::{CanonicalPackage, FetchStrategy};

/// A package materialized on disk.
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    pub canonical: CanonicalPackage,
    /// Repository root; shared between packages fetched from one group.
    pub repo_path: PathBuf,
    /// Root of this package inside the repository.
    pub package_path: PathBuf,
}

/// One clone covering every package that shares repository and ref.
#[derive(Debug)]
pub struct FetchGroup {
    pub url: String,
    pub reference: Option<GitRef>,
    /// `None` means full checkout; otherwise the sparse-checkout set.
    pub sparse_paths: Option<BTreeSet<String>>,
    /// Indices into the input package slice.
    pub members: Vec<usize>,
}

/// Validate and normalize a sparse-checkout subpath.
///
/// Rejects empty values, absolute paths, and any `..` segment so a manifest
/// can never address files outside its repository. `./a/./b` normalizes to
/// `a/b`.
pub fn normalize_sparse_path(raw: &str) -> std::result::Result<String, String> {
    if raw.is_empty() {
        return Err("path cannot be empty".to_string());
    }
    if raw.starts_with('/') || raw.starts_with('\\') || Path::new(raw).is_absolute() {
        return Err(format!("path must be relative: '{raw}'"));
    }
    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(format!("path may not contain '..': '{raw}'")),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(format!("path has no components: '{raw}'"));
    }
    Ok(segments.join("/"))
}

fn remote_identity(declaration: &Declaration) -> Option<(String, Option<GitRef>)> {
    match declaration {
        Declaration::Github {
            slug, reference, ..
        } => Some((slug.clone_url(), reference.clone())),
        Declaration::Git { url, reference, .. } => Some((url.clone(), reference.clone())),
        _ => None,
    }
}

/// Group remote packages by `(identity, ref)` so each repository is cloned
/// exactly once per ref, whatever number of aliases reference it.
pub fn group_remote_packages(packages: &[CanonicalPackage]) -> Result<Vec<FetchGroup>> {
    let mut groups: Vec<FetchGroup> = Vec::new();
    for (index, package) in packages.iter().enumerate() {
        let Some((url, reference)) = remote_identity(&package.declaration) else {
            continue;
        };
        let ref_key = reference.as_ref().map(ToString::to_string);

        let subpath = match package.subpath() {
            Some(raw) => {
                Some(
                    normalize_sparse_path(raw).map_err(|reason| SkError::InvalidSource {
                        alias: package.origin.alias.clone(),
                        source_spec: package.source_display(),
                        reason,
                    })?,
                )
            }
            None => None,
        };

        let existing = groups.iter_mut().find(|g| {
            g.url == url && g.reference.as_ref().map(ToString::to_string) == ref_key
        });
        match existing {
            Some(group) => {
                match (&mut group.sparse_paths, subpath) {
                    // One member wanting the whole repo widens the group.
                    (paths, None) => *paths = None,
                    (Some(paths), Some(p)) => {
                        paths.insert(p);
                    }
                    (None, Some(_)) => {}
                }
                group.members.push(index);
            }
            None => groups.push(FetchGroup {
                url,
                reference,
                sparse_paths: subpath.map(|p| BTreeSet::from([p])),
                members: vec![index],
            }),
        }
    }
    Ok(groups)
}

/// Fetch every package into `temp_root`, returning them in input order.
pub fn fetch_packages(
    packages: &[CanonicalPackage],
    temp_root: &Path,
    progress: Option<&FetchProgress>,
) -> Result<Vec<FetchedPackage>> {
    // Non-clone strategies first: they fail fast and need no git.
    let mut fetched: Vec<Option<FetchedPackage>> = Vec::new();
    for package in packages {
        fetched.push(match (package.strategy, &package.declaration) {
            (FetchStrategy::Symlink, Declaration::Local { path }) => {
                Some(fetch_local(package, path)?)
            }
            (FetchStrategy::Symlink, _) | (_, Declaration::Local { .. }) => {
                debug_assert!(false, "symlink strategy is local-only");
                return Err(SkError::InvalidSource {
                    alias: package.origin.alias.clone(),
                    source_spec: package.source_display(),
                    reason: "inconsistent fetch strategy".to_string(),
                });
            }
            (_, Declaration::Registry { .. }) => {
                return Err(SkError::RegistryUnsupported {
                    alias: package.origin.alias.clone(),
                    spec: package.source_display(),
                });
            }
            (_, Declaration::ClaudePlugin { .. }) => {
                // Plugins are resolved into ordinary declarations before the
                // fetch stage; reaching here is a pipeline bug.
                debug_assert!(false, "unresolved claude-plugin reached fetcher");
                return Err(SkError::InvalidSource {
                    alias: package.origin.alias.clone(),
                    source_spec: package.source_display(),
                    reason: "plugin declaration was not resolved before fetch".to_string(),
                });
            }
            _ => None,
        });
    }

    let groups = group_remote_packages(packages)?;
    for (group_index, group) in groups.iter().enumerate() {
        if let Some(progress) = progress {
            progress.update_repo(&group.url, group_index + 1, groups.len());
        }
        let repo_path = fetch_group(packages, group, temp_root, group_index)?;
        for &member in &group.members {
            let package = &packages[member];
            let package_path = match package.subpath() {
                Some(raw) => {
                    // Already validated during grouping.
                    let sub = normalize_sparse_path(raw).map_err(|reason| {
                        SkError::InvalidSource {
                            alias: package.origin.alias.clone(),
                            source_spec: package.source_display(),
                            reason,
                        }
                    })?;
                    let full = repo_path.join(&sub);
                    if !full.is_dir() {
                        return Err(SkError::InvalidSource {
                            alias: package.origin.alias.clone(),
                            source_spec: package.source_display(),
                            reason: format!("path '{sub}' not found in repository"),
                        });
                    }
                    full
                }
                None => repo_path.clone(),
            };
            fetched[member] = Some(FetchedPackage {
                canonical: package.clone(),
                repo_path: repo_path.clone(),
                package_path,
            });
        }
        if let Some(progress) = progress {
            progress.inc_repo();
        }
    }

    Ok(fetched.into_iter().flatten().collect())
}

fn fetch_local(package: &CanonicalPackage, path: &Path) -> Result<FetchedPackage> {
    if !path.exists() {
        return Err(SkError::InvalidSource {
            alias: package.origin.alias.clone(),
            source_spec: package.source_display(),
            reason: "local path does not exist".to_string(),
        });
    }
    if !path.is_dir() {
        return Err(SkError::InvalidSource {
            alias: package.origin.alias.clone(),
            source_spec: package.source_display(),
            reason: "local path is not a directory".to_string(),
        });
    }
    Ok(FetchedPackage {
        canonical: package.clone(),
        repo_path: path.to_path_buf(),
        package_path: path.to_path_buf(),
    })
}

fn fetch_group(
    packages: &[CanonicalPackage],
    group: &FetchGroup,
    temp_root: &Path,
    group_index: usize,
) -> Result<PathBuf> {
    // Errors are attributed to the group's first member.
    let first = &packages[group.members[0]];
    let scope = GitScope::new(first.origin.alias.clone(), first.source_display());

    let dest = temp_root.join(format!("repo-{group_index}"));
    if dest.exists() {
        return Err(SkError::InvalidRepoDestination {
            path: dest.display().to_string(),
        });
    }

    let sparse = group.sparse_paths.is_some();
    git::clone_shallow(&scope, &group.url, &dest, sparse)?;

    if let Some(paths) = &group.sparse_paths {
        let paths: Vec<String> = paths.iter().cloned().collect();
        git::sparse_checkout(&scope, &dest, &paths)?;
    }

    if let Some(reference) = &group.reference {
        git::checkout_reference(&scope, &dest, reference)?;
    }

    Ok(dest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::manifest::dependency::RepoSlug;
    use crate::manifest::PackageOrigin;
    use crate::resolver;
    use crate::manifest::DependencyDecl;

    fn github_pkg(alias: &str, slug: &str, reference: Option<GitRef>, path: Option<&str>) -> CanonicalPackage {
        resolver::resolve(&DependencyDecl {
            origin: PackageOrigin {
                alias: alias.to_string(),
                manifest_path: "/w/skills.toml".into(),
            },
            declaration: Declaration::Github {
                slug: RepoSlug::parse(slug).unwrap(),
                reference,
                path: path.map(str::to_string),
            },
        })
    }

    #[test]
    fn test_normalize_sparse_path() {
        assert_eq!(normalize_sparse_path("a/b").unwrap(), "a/b");
        assert_eq!(normalize_sparse_path("./a/./b").unwrap(), "a/b");
        assert_eq!(normalize_sparse_path("a//b/").unwrap(), "a/b");
        assert!(normalize_sparse_path("").is_err());
        assert!(normalize_sparse_path("/x").is_err());
        assert!(normalize_sparse_path("../x").is_err());
        assert!(normalize_sparse_path("a/../x").is_err());
        assert!(normalize_sparse_path(".").is_err());
    }

    #[test]
    fn test_grouping_unions_sparse_paths() {
        let packages = vec![
            github_pkg("a", "acme/tools", None, Some("skills/one")),
            github_pkg("b", "acme/tools", None, Some("skills/two")),
        ];
        let groups = group_remote_packages(&packages).unwrap();
        assert_eq!(groups.len(), 1);
        let paths = groups[0].sparse_paths.as_ref().unwrap();
        assert_eq!(
            paths.iter().cloned().collect::<Vec<_>>(),
            vec!["skills/one".to_string(), "skills/two".to_string()]
        );
        assert_eq!(groups[0].members, vec![0, 1]);
    }

    #[test]
    fn test_grouping_widens_to_full_checkout() {
        let packages = vec![
            github_pkg("a", "acme/tools", None, Some("skills/one")),
            github_pkg("b", "acme/tools", None, None),
        ];
        let groups = group_remote_packages(&packages).unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].sparse_paths.is_none());
    }

    #[test]
    fn test_grouping_separates_refs() {
        let packages = vec![
            github_pkg("a", "acme/tools", Some(GitRef::Tag("v1".to_string())), None),
            github_pkg("b", "acme/tools", Some(GitRef::Tag("v2".to_string())), None),
            github_pkg("c", "acme/tools", Some(GitRef::Branch("v1".to_string())), None),
        ];
        let groups = group_remote_packages(&packages).unwrap();
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_grouping_rejects_traversal() {
        let packages = vec![github_pkg("a", "acme/tools", None, Some("../escape"))];
        let err = group_remote_packages(&packages).unwrap_err();
        assert!(matches!(err, SkError::InvalidSource { .. }));
    }

    #[test]
    fn test_fetch_local_missing_dir() {
        let temp = tempfile::TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        let package = resolver::resolve(&DependencyDecl {
            origin: PackageOrigin {
                alias: "local".to_string(),
                manifest_path: "/w/skills.toml".into(),
            },
            declaration: Declaration::Local {
                path: temp.path().join("missing"),
            },
        });
        let err = fetch_packages(&[package], temp.path(), None).unwrap_err();
        assert!(matches!(err, SkError::InvalidSource { .. }));
    }

    #[test]
    fn test_fetch_registry_rejected() {
        let temp = tempfile::TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        let package = resolver::resolve(&DependencyDecl {
            origin: PackageOrigin {
                alias: "fmt".to_string(),
                manifest_path: "/w/skills.toml".into(),
            },
            declaration: Declaration::Registry {
                org: None,
                name: "fmt".to_string(),
                version: "1.0".to_string(),
            },
        });
        let err = fetch_packages(&[package], temp.path(), None).unwrap_err();
        assert!(matches!(err, SkError::RegistryUnsupported { .. }));
    }

    #[test]
    fn test_fetch_local_package_in_place() {
        let temp = tempfile::TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        let pkg_dir = temp.path().join("pkg");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        let package = resolver::resolve(&DependencyDecl {
            origin: PackageOrigin {
                alias: "local".to_string(),
                manifest_path: "/w/skills.toml".into(),
            },
            declaration: Declaration::Local {
                path: pkg_dir.clone(),
            },
        });
        let fetched = fetch_packages(&[package], temp.path(), None).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].package_path, pkg_dir);
        assert_eq!(fetched[0].repo_path, pkg_dir);
    }
}
