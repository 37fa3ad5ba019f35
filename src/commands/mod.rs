//! Command implementations dispatched from main

pub mod list;
pub mod sync;

use std::path::PathBuf;

/// Starting directory for manifest discovery: the --workspace override or
/// the process working directory.
pub fn start_dir(workspace: Option<PathBuf>) -> PathBuf {
    workspace.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
