//! Sync pipeline stage tagging
//!
//! A sync run moves through a fixed sequence of stages. When a stage fails,
//! the error is wrapped in [`StagedError`] so the CLI boundary can report
//! exactly where the run stopped, while the original [`SkError`] stays
//! reachable as the cause.

use miette::Diagnostic;
use thiserror::Error;

use super::SkError;

/// The stage of the sync pipeline at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Discover,
    Parse,
    Merge,
    Resolve,
    Agents,
    Fetch,
    Detect,
    Extract,
    Validate,
    Install,
    Reconcile,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStage::Discover => "discover",
            SyncStage::Parse => "parse",
            SyncStage::Merge => "merge",
            SyncStage::Resolve => "resolve",
            SyncStage::Agents => "agents",
            SyncStage::Fetch => "fetch",
            SyncStage::Detect => "detect",
            SyncStage::Extract => "extract",
            SyncStage::Validate => "validate",
            SyncStage::Install => "install",
            SyncStage::Reconcile => "reconcile",
        };
        write!(f, "{s}")
    }
}

/// A sync failure tagged with the pipeline stage it occurred at.
#[derive(Error, Diagnostic, Debug)]
#[error("sync stopped at {stage} stage: {error}")]
pub struct StagedError {
    pub stage: SyncStage,
    #[diagnostic_source]
    pub error: SkError,
}

impl StagedError {
    pub fn new(stage: SyncStage, error: SkError) -> Self {
        Self { stage, error }
    }

    /// The wrapped cause.
    pub fn cause(&self) -> &SkError {
        &self.error
    }
}

/// Extension to tag a `Result`'s error with the stage it occurred at.
pub trait StageResultExt<T> {
    fn at_stage(self, stage: SyncStage) -> std::result::Result<T, StagedError>;
}

impl<T> StageResultExt<T> for std::result::Result<T, SkError> {
    fn at_stage(self, stage: SyncStage) -> std::result::Result<T, StagedError> {
        self.map_err(|e| StagedError::new(stage, e))
    }
}
