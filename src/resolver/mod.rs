//! Declaration resolution
//!
//! Maps a validated [`Declaration`] to a [`CanonicalPackage`] carrying its
//! [`FetchStrategy`]. This is a pure mapping with no I/O; the fetcher is the
//! first place side effects happen.
//!
//! Strategy table:
//! - registry and claude-plugin packages always clone in full
//! - github/git packages clone sparse exactly when a subpath narrows them
//! - local packages are never cloned, they are used in place

use crate::manifest::{Declaration, DependencyDecl, PackageOrigin};

/// How a canonical package is materialized on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Clone { sparse: bool },
    Symlink,
}

/// A resolved package descriptor: the declaration plus its fetch strategy.
#[derive(Debug, Clone)]
pub struct CanonicalPackage {
    pub origin: PackageOrigin,
    pub declaration: Declaration,
    pub strategy: FetchStrategy,
}

impl CanonicalPackage {
    /// The remote subpath requested by this package, if any.
    pub fn subpath(&self) -> Option<&str> {
        match &self.declaration {
            Declaration::Github { path, .. } | Declaration::Git { path, .. } => path.as_deref(),
            _ => None,
        }
    }

    pub fn source_display(&self) -> String {
        self.declaration.source_display()
    }
}

/// Resolve one coerced dependency into a canonical package.
pub fn resolve(dep: &DependencyDecl) -> CanonicalPackage {
    let strategy = match &dep.declaration {
        Declaration::Registry { .. } | Declaration::ClaudePlugin { .. } => {
            FetchStrategy::Clone { sparse: false }
        }
        Declaration::Github { path, .. } | Declaration::Git { path, .. } => FetchStrategy::Clone {
            sparse: path.is_some(),
        },
        Declaration::Local { .. } => FetchStrategy::Symlink,
    };
    CanonicalPackage {
        origin: dep.origin.clone(),
        declaration: dep.declaration.clone(),
        strategy,
    }
}

/// Resolve a whole dependency list.
pub fn resolve_all(deps: &[DependencyDecl]) -> Vec<CanonicalPackage> {
    deps.iter().map(resolve).collect()
}
