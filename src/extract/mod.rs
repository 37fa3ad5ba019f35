//! Skill extraction
//!
//! Turns a selected package structure into named skills. The skill file's
//! own frontmatter `name` is authoritative; the containing directory name is
//! a display fallback only. A plugin without skills is an extraction error,
//! downgraded to a warning during bulk sync so one empty plugin cannot sink
//! a whole run.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::detect::{DetectedStructure, SKILL_FILE};
use crate::error::{Result, SkError};
use crate::frontmatter;
use crate::manifest::{Manifest, SkillsExport};

/// A named unit of agent instruction content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    /// Directory containing the skill's files.
    pub source_path: PathBuf,
}

/// Whether a package arrived via bulk sync or an explicit single add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    Bulk,
    Explicit,
}

/// Extraction result: the skills plus any non-fatal warnings.
#[derive(Debug, Default)]
pub struct Extraction {
    pub skills: Vec<Skill>,
    pub warnings: Vec<String>,
}

/// Extract skills from a package according to its selected structure.
pub fn extract(
    alias: &str,
    structure: &DetectedStructure,
    mode: ExtractMode,
) -> Result<Extraction> {
    match structure {
        DetectedStructure::Manifest(path) => extract_from_manifest(alias, path),
        DetectedStructure::Plugin { skills_dir, .. } => {
            extract_from_plugin(alias, skills_dir.as_deref(), mode)
        }
        DetectedStructure::Subdir(root) => {
            let skills = extract_subdirs(root)?;
            if skills.is_empty() {
                return Err(SkError::NoSkillsFound {
                    alias: alias.to_string(),
                });
            }
            Ok(Extraction {
                skills,
                warnings: Vec::new(),
            })
        }
        DetectedStructure::Single(skill_file) => {
            let dir = skill_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let fallback = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| alias.to_string());
            let skill = read_skill(&fallback, &dir)?;
            Ok(Extraction {
                skills: vec![skill],
                warnings: Vec::new(),
            })
        }
        DetectedStructure::Marketplace(_) => Err(SkError::MarketplaceNotInstallable {
            alias: alias.to_string(),
        }),
    }
}

fn extract_from_manifest(alias: &str, manifest_path: &Path) -> Result<Extraction> {
    let manifest = Manifest::load(manifest_path)?;
    let root = match &manifest.skills_export {
        SkillsExport::Disabled => {
            return Err(SkError::NoSkillsFound {
                alias: alias.to_string(),
            });
        }
        SkillsExport::Dir(dir) => {
            crate::manifest::dependency::resolve_local_path(&manifest.dir, dir)
        }
    };
    if !root.is_dir() {
        return Err(SkError::NoSkillsFound {
            alias: alias.to_string(),
        });
    }
    let skills = extract_subdirs(&root)?;
    if skills.is_empty() {
        return Err(SkError::NoSkillsFound {
            alias: alias.to_string(),
        });
    }
    Ok(Extraction {
        skills,
        warnings: Vec::new(),
    })
}

fn extract_from_plugin(
    alias: &str,
    skills_dir: Option<&Path>,
    mode: ExtractMode,
) -> Result<Extraction> {
    let empty = |alias: &str, mode: ExtractMode| match mode {
        ExtractMode::Explicit => Err(SkError::NoSkillsFound {
            alias: alias.to_string(),
        }),
        ExtractMode::Bulk => Ok(Extraction {
            skills: Vec::new(),
            warnings: vec![format!("plugin '{alias}' has no skills, skipping")],
        }),
    };

    let Some(skills_dir) = skills_dir else {
        return empty(alias, mode);
    };
    let skills = extract_subdirs(skills_dir)?;
    if skills.is_empty() {
        return empty(alias, mode);
    }
    Ok(Extraction {
        skills,
        warnings: Vec::new(),
    })
}

/// Every immediate child directory carrying a skill file is one skill.
fn extract_subdirs(root: &Path) -> Result<Vec<Skill>> {
    if !root.is_dir() {
        return Err(SkError::FileReadFailed {
            path: root.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.is_dir() && p.join(SKILL_FILE).is_file())
        .collect();

    let mut skills = Vec::new();
    for dir in dirs {
        let fallback = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        skills.push(read_skill(&fallback, &dir)?);
    }
    Ok(skills)
}

/// Read and validate one skill directory. `fallback_name` is the display
/// identity used when the skill file declares none.
fn read_skill(fallback_name: &str, dir: &Path) -> Result<Skill> {
    let skill_file = dir.join(SKILL_FILE);
    let content = fs::read_to_string(&skill_file).map_err(|e| SkError::SkillInvalid {
        path: skill_file.display().to_string(),
        reason: e.to_string(),
    })?;

    let declared = frontmatter::parse_frontmatter_and_body(&content)
        .and_then(|(fm, _)| frontmatter::get_str(&fm, "name"));

    let name = match declared {
        Some(name) if name.is_empty() => {
            return Err(SkError::SkillInvalid {
                path: skill_file.display().to_string(),
                reason: "frontmatter 'name' cannot be empty".to_string(),
            });
        }
        Some(name) => name,
        None => fallback_name.to_string(),
    };

    if name.is_empty() {
        return Err(SkError::SkillInvalid {
            path: skill_file.display().to_string(),
            reason: "skill has no usable name".to_string(),
        });
    }
    if name.chars().any(|c| matches!(c, '/' | '\\' | ':')) {
        return Err(SkError::SkillInvalid {
            path: skill_file.display().to_string(),
            reason: format!("skill name '{name}' contains path separators"),
        });
    }

    Ok(Skill {
        name,
        source_path: dir.to_path_buf(),
    })
}
