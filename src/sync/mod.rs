//! Sync orchestration
//!
//! Drives the per-agent pipeline: resolve-plugins → fetch → detect+extract →
//! validate → plan → preflight → (dry-run stops) → remove-managed-targets →
//! apply-install → reconcile-removals → persist-state. Any stage failure
//! aborts that agent's sync with nothing partially applied; the stage is
//! recorded on the error. Agents sync sequentially, each with its own temp
//! root that is removed on every exit path.

pub mod reconcile;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::agent::{Agent, AgentRegistry};
use crate::detect;
use crate::error::stage::StageResultExt;
use crate::error::{Result, SkError, StagedError, SyncStage};
use crate::extract::{self, ExtractMode, Skill};
use crate::fetcher;
use crate::install;
use crate::manifest::{self, Declaration, DependencyDecl, Manifest, PackageOrigin};
use crate::marketplace::{self, MarketplaceCache};
use crate::progress::FetchProgress;
use crate::resolver;
use crate::state::AgentInstallState;

/// Options for a sync run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute and report everything, commit nothing.
    pub dry_run: bool,
    /// Show a progress bar over fetched repositories.
    pub show_progress: bool,
}

/// What one agent's sync did (or would do, under dry-run).
#[derive(Debug, Clone)]
pub struct AgentSyncReport {
    pub agent_id: String,
    pub installed: usize,
    pub removed: usize,
    /// Planned target names, in install order.
    pub targets: Vec<String>,
    pub warnings: Vec<String>,
    /// Zero dependencies and no prior state: nothing to reconcile against.
    pub no_dependencies: bool,
    pub dry_run: bool,
}

/// One agent's outcome within a run; failures carry their pipeline stage.
#[derive(Debug)]
pub struct AgentSyncOutcome {
    pub agent: Agent,
    pub result: std::result::Result<AgentSyncReport, StagedError>,
}

/// The whole run's outcomes, one per configured agent.
#[derive(Debug)]
pub struct SyncRunReport {
    pub outcomes: Vec<AgentSyncOutcome>,
}

/// Discover and parse the manifest, then sync every configured agent.
pub fn run(
    start_dir: &Path,
    registry: &AgentRegistry,
    options: SyncOptions,
) -> std::result::Result<SyncRunReport, StagedError> {
    let manifest_path = manifest::discover_manifest(start_dir).at_stage(SyncStage::Discover)?;
    let manifest = Manifest::load(&manifest_path).at_stage(SyncStage::Parse)?;
    let dependencies = manifest::merge_dependencies(std::slice::from_ref(&manifest))
        .at_stage(SyncStage::Merge)?;
    let agents = registry.select(&manifest.agents).at_stage(SyncStage::Agents)?;

    let mut outcomes = Vec::new();
    for agent in agents {
        let result = sync_agent(&agent, &manifest, &dependencies, options);
        outcomes.push(AgentSyncOutcome { agent, result });
    }
    Ok(SyncRunReport { outcomes })
}

/// A package ready for the ordinary fetch pipeline, remembering whether it
/// came through a claude-plugin declaration (which constrains detection).
struct PendingPackage {
    dep: DependencyDecl,
    require_plugin: bool,
}

/// Sync one agent.
pub fn sync_agent(
    agent: &Agent,
    manifest: &Manifest,
    dependencies: &[DependencyDecl],
    options: SyncOptions,
) -> std::result::Result<AgentSyncReport, StagedError> {
    // Temp root lives for the whole agent sync; TempDir removes it on every
    // exit path, including mid-pipeline failures.
    let temp_root = TempDir::new_in(crate::temp::temp_dir_base())
        .map_err(|e| SkError::IoError {
            message: format!("failed to create temp root: {e}"),
        })
        .at_stage(SyncStage::Resolve)?;

    let mut warnings = Vec::new();
    let pending = resolve_plugins(agent, manifest, dependencies, temp_root.path(), options)
        .at_stage(SyncStage::Resolve)?;

    let canonical: Vec<_> = pending.iter().map(|p| resolver::resolve(&p.dep)).collect();
    let require_flags: Vec<bool> = pending.iter().map(|p| p.require_plugin).collect();

    let fetched = fetch_with_progress(&canonical, temp_root.path(), options)
        .at_stage(SyncStage::Fetch)?;

    let mut extracted: Vec<(String, Skill)> = Vec::new();
    for (package, require_plugin) in fetched.iter().zip(require_flags) {
        let alias = package.canonical.origin.alias.clone();
        let structures = detect::detect_structures(&package.package_path);
        let selected = detect::select_structure(&alias, &structures, require_plugin)
            .at_stage(SyncStage::Detect)?;
        let extraction =
            extract::extract(&alias, &selected, ExtractMode::Bulk).at_stage(SyncStage::Extract)?;
        warnings.extend(extraction.warnings);
        extracted.extend(extraction.skills.into_iter().map(|s| (alias.clone(), s)));
    }

    install::check_target_collisions(&extracted).at_stage(SyncStage::Validate)?;

    let plan = install::plan_install(&agent.skills_path, &extracted);
    let desired: BTreeSet<String> = plan.target_names().into_iter().collect();

    let previous = AgentInstallState::load(&agent.skills_path).at_stage(SyncStage::Install)?;

    // Cold state plus an empty desired set is a distinguished outcome, not a
    // zero-removal reconcile.
    if plan.tasks.is_empty() && previous.is_none() {
        return Ok(AgentSyncReport {
            agent_id: agent.id.clone(),
            installed: 0,
            removed: 0,
            targets: Vec::new(),
            warnings,
            no_dependencies: true,
            dry_run: options.dry_run,
        });
    }

    reconcile::preflight(&plan, previous.as_ref()).at_stage(SyncStage::Install)?;

    if options.dry_run {
        return Ok(AgentSyncReport {
            agent_id: agent.id.clone(),
            installed: plan.tasks.len(),
            removed: reconcile::count_stale(previous.as_ref(), &desired),
            targets: plan.target_names(),
            warnings,
            no_dependencies: false,
            dry_run: true,
        });
    }

    fs::create_dir_all(&agent.skills_path)
        .map_err(|e| SkError::IoError {
            message: format!(
                "failed to create skills directory {}: {e}",
                agent.skills_path.display()
            ),
        })
        .at_stage(SyncStage::Install)?;

    reconcile::remove_managed_targets(&plan).at_stage(SyncStage::Install)?;
    for task in &plan.tasks {
        install::apply_task(task).at_stage(SyncStage::Install)?;
    }

    let removed = match &previous {
        Some(previous) => reconcile::reconcile_removals(&agent.skills_path, previous, &desired)
            .at_stage(SyncStage::Reconcile)?,
        // First run against a cold state never deletes anything.
        None => 0,
    };

    AgentInstallState::new(plan.target_names())
        .save(&agent.skills_path)
        .at_stage(SyncStage::Reconcile)?;

    Ok(AgentSyncReport {
        agent_id: agent.id.clone(),
        installed: plan.tasks.len(),
        removed,
        targets: plan.target_names(),
        warnings,
        no_dependencies: false,
        dry_run: false,
    })
}

/// Resolve claude-plugin declarations. Native agents delegate to their host
/// CLI (validated but contributing no managed skills); other agents get the
/// plugin's source as an ordinary declaration feeding the same pipeline.
fn resolve_plugins(
    agent: &Agent,
    manifest: &Manifest,
    dependencies: &[DependencyDecl],
    temp_root: &Path,
    options: SyncOptions,
) -> Result<Vec<PendingPackage>> {
    let mut cache = MarketplaceCache::new();
    let mut pending = Vec::new();

    for dep in dependencies {
        let Declaration::ClaudePlugin {
            plugin,
            marketplace,
        } = &dep.declaration
        else {
            pending.push(PendingPackage {
                dep: dep.clone(),
                require_plugin: false,
            });
            continue;
        };

        let loaded = marketplace::load_marketplace_info(
            marketplace,
            &manifest.dir,
            temp_root,
            &mut cache,
        )?;
        let entry = marketplace::find_plugin(&loaded, plugin)?;

        if agent.native_plugin_cli.is_some() {
            // The agent's own plugin system manages these skills; sk only
            // validates the reference. Dry-run must not touch the host CLI.
            if !options.dry_run {
                marketplace::install_native_plugin(agent, plugin, marketplace)?;
            }
            continue;
        }

        let declaration = marketplace::resolve_plugin_source(&loaded, entry)?;
        pending.push(PendingPackage {
            dep: DependencyDecl {
                origin: PackageOrigin {
                    alias: dep.origin.alias.clone(),
                    manifest_path: dep.origin.manifest_path.clone(),
                },
                declaration,
            },
            require_plugin: true,
        });
    }

    Ok(pending)
}

fn fetch_with_progress(
    canonical: &[resolver::CanonicalPackage],
    temp_root: &Path,
    options: SyncOptions,
) -> Result<Vec<fetcher::FetchedPackage>> {
    if !options.show_progress {
        return fetcher::fetch_packages(canonical, temp_root, None);
    }
    let groups = fetcher::group_remote_packages(canonical)?;
    let progress = FetchProgress::new(groups.len() as u64);
    let result = fetcher::fetch_packages(canonical, temp_root, Some(&progress));
    match &result {
        Ok(_) => progress.finish(),
        Err(_) => progress.abandon(),
    }
    result
}
