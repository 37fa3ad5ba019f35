//! Error types and handling for sk
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Every expected failure is a value of [`SkError`]; operations return
//! [`Result`] rather than panicking. [`SkError::kind`] classifies each
//! variant into a coarse [`ErrorKind`] so callers (and tests) can branch on
//! failure class without matching individual variants. Sync-pipeline
//! failures are additionally tagged with the stage they occurred at, see
//! [`stage`].

pub mod stage;

pub use stage::{StagedError, SyncStage};

use miette::Diagnostic;
use thiserror::Error;

/// Coarse failure classification, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Io,
    Git,
    Network,
    Parse,
    NotFound,
    Conflict,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Io => "io",
            ErrorKind::Git => "git_error",
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
        };
        write!(f, "{s}")
    }
}

/// Main error type for sk operations
#[derive(Error, Diagnostic, Debug)]
pub enum SkError {
    // Manifest errors
    #[error("Manifest not found: {path}")]
    #[diagnostic(
        code(sk::manifest::not_found),
        help("Create a skills.toml with a [dependencies] table")
    )]
    ManifestNotFound { path: String },

    #[error("Failed to parse manifest {path}: {reason}")]
    #[diagnostic(code(sk::manifest::parse_failed))]
    ManifestParseFailed { path: String, reason: String },

    #[error("Invalid manifest {path}: {reason}")]
    #[diagnostic(code(sk::manifest::shape_invalid))]
    ManifestShapeInvalid { path: String, reason: String },

    #[error("Dependency '{alias}' is invalid ({field}): {message}")]
    #[diagnostic(code(sk::manifest::dependency_invalid))]
    DependencyInvalid {
        alias: String,
        /// Manifest field the failure is about (e.g. "ref", "path", "alias").
        field: String,
        message: String,
    },

    #[error("Dependency '{alias}' does not match any known declaration shape")]
    #[diagnostic(
        code(sk::manifest::unknown_shape),
        help(
            "Use \"name@version\", \"owner/repo\", or a table with one of 'gh', 'git', 'path', or type = \"claude-plugin\""
        )
    )]
    UnknownDependencyShape { alias: String },

    #[error("Dependency alias '{alias}' is declared more than once")]
    #[diagnostic(code(sk::manifest::duplicate_alias))]
    DuplicateAlias { alias: String },

    // Source / fetch errors
    #[error("Invalid source for '{alias}' ({source_spec}): {reason}")]
    #[diagnostic(code(sk::fetch::invalid_source))]
    InvalidSource {
        alias: String,
        source_spec: String,
        reason: String,
    },

    #[error("Fetch destination already exists: {path}")]
    #[diagnostic(code(sk::fetch::invalid_repo))]
    InvalidRepoDestination { path: String },

    #[error("git failed for '{alias}' ({source_spec}): {reason}")]
    #[diagnostic(
        code(sk::fetch::git_error),
        help("Check that the repository URL and ref are correct and you have access")
    )]
    GitCommandFailed {
        alias: String,
        source_spec: String,
        reason: String,
    },

    #[error("Registry packages are not supported yet: '{alias}' ({spec})")]
    #[diagnostic(
        code(sk::fetch::registry_unsupported),
        help("Declare the dependency as a GitHub, git, or local source instead")
    )]
    RegistryUnsupported { alias: String, spec: String },

    // Marketplace errors
    #[error("Invalid marketplace '{marketplace}': {message}")]
    #[diagnostic(code(sk::marketplace::invalid))]
    MarketplaceInvalid {
        marketplace: String,
        message: String,
    },

    #[error("Failed to fetch marketplace from {url}: {reason}")]
    #[diagnostic(code(sk::marketplace::fetch_failed))]
    MarketplaceFetchFailed { url: String, reason: String },

    #[error("Plugin '{plugin}' not found in marketplace '{marketplace}'")]
    #[diagnostic(code(sk::marketplace::plugin_not_found))]
    PluginNotFound { marketplace: String, plugin: String },

    #[error("Plugin '{plugin}' has an invalid source: {message}")]
    #[diagnostic(code(sk::marketplace::plugin_source_invalid))]
    PluginSourceInvalid { plugin: String, message: String },

    #[error("Host plugin install failed for '{plugin}' on {agent}: {reason}")]
    #[diagnostic(code(sk::marketplace::host_install_failed))]
    HostPluginInstallFailed {
        agent: String,
        plugin: String,
        reason: String,
    },

    // Structure / extraction errors
    #[error("Package '{alias}' is not installable: {reason}")]
    #[diagnostic(code(sk::detect::not_installable))]
    NotInstallable { alias: String, reason: String },

    #[error("Package '{alias}' is a marketplace, not an installable package")]
    #[diagnostic(
        code(sk::detect::marketplace_not_installable),
        help(
            "Add a specific plugin from it: {{ type = \"claude-plugin\", plugin = \"...\", marketplace = \"...\" }}"
        )
    )]
    MarketplaceNotInstallable { alias: String },

    #[error("Package '{alias}' does not contain a Claude plugin")]
    #[diagnostic(code(sk::detect::plugin_required))]
    PluginStructureRequired { alias: String },

    #[error("Package '{alias}' contains no skills")]
    #[diagnostic(code(sk::extract::no_skills))]
    NoSkillsFound { alias: String },

    #[error("Invalid skill file {path}: {reason}")]
    #[diagnostic(code(sk::extract::skill_invalid))]
    SkillInvalid { path: String, reason: String },

    #[error("Skill name '{name}' is produced by both '{first}' and '{second}'")]
    #[diagnostic(code(sk::validate::name_collision))]
    SkillNameCollision {
        name: String,
        first: String,
        second: String,
    },

    // Install / state errors
    #[error("Refusing to overwrite unmanaged path: {path}")]
    #[diagnostic(
        code(sk::install::conflict),
        help("The file exists but was not installed by sk; move it away or remove it manually")
    )]
    InstallConflict { path: String },

    #[error("Failed to read state file {path}: {reason}")]
    #[diagnostic(code(sk::state::parse_failed))]
    StateParseFailed { path: String, reason: String },

    #[error("State file {path} has unsupported version {version}")]
    #[diagnostic(
        code(sk::state::version_unsupported),
        help("This state file was written by a newer sk; upgrade sk")
    )]
    StateVersionUnsupported { path: String, version: u32 },

    // Agent errors
    #[error("Unknown agent: {id}")]
    #[diagnostic(
        code(sk::agent::unknown),
        help("Known agents: claude-code, codex, opencode, cursor")
    )]
    AgentUnknown { id: String },

    #[error("No agents configured")]
    #[diagnostic(
        code(sk::agent::none_configured),
        help("Add an [agents] table to skills.toml, e.g. claude-code = true")
    )]
    NoAgentsConfigured,

    // File system errors
    #[error("File not found: {path}")]
    #[diagnostic(code(sk::fs::not_found))]
    FileNotFound { path: String },

    #[error("Failed to read file {path}: {reason}")]
    #[diagnostic(code(sk::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file {path}: {reason}")]
    #[diagnostic(code(sk::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(sk::fs::io_error))]
    IoError { message: String },
}

impl SkError {
    /// Coarse classification of this error, independent of the exact variant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SkError::ManifestNotFound { .. }
            | SkError::PluginNotFound { .. }
            | SkError::FileNotFound { .. } => ErrorKind::NotFound,

            SkError::ManifestParseFailed { .. }
            | SkError::ManifestShapeInvalid { .. }
            | SkError::StateParseFailed { .. } => ErrorKind::Parse,

            SkError::DependencyInvalid { .. }
            | SkError::UnknownDependencyShape { .. }
            | SkError::DuplicateAlias { .. }
            | SkError::InvalidSource { .. }
            | SkError::RegistryUnsupported { .. }
            | SkError::MarketplaceInvalid { .. }
            | SkError::PluginSourceInvalid { .. }
            | SkError::NotInstallable { .. }
            | SkError::MarketplaceNotInstallable { .. }
            | SkError::PluginStructureRequired { .. }
            | SkError::NoSkillsFound { .. }
            | SkError::SkillInvalid { .. }
            | SkError::SkillNameCollision { .. }
            | SkError::StateVersionUnsupported { .. }
            | SkError::AgentUnknown { .. }
            | SkError::NoAgentsConfigured => ErrorKind::Validation,

            SkError::GitCommandFailed { .. } | SkError::HostPluginInstallFailed { .. } => {
                ErrorKind::Git
            }

            SkError::MarketplaceFetchFailed { .. } => ErrorKind::Network,

            SkError::InstallConflict { .. } | SkError::InvalidRepoDestination { .. } => {
                ErrorKind::Conflict
            }

            SkError::FileReadFailed { .. }
            | SkError::FileWriteFailed { .. }
            | SkError::IoError { .. } => ErrorKind::Io,
        }
    }
}

impl From<std::io::Error> for SkError {
    fn from(err: std::io::Error) -> Self {
        SkError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, SkError>;
