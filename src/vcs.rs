//! Working-tree status diagnostic shown at the end of a build.
use std::path::Path;

use crate::stage::{run_stage, StageCommand, StageKind, StageOutcome};

/// Run the status command inside `repo`.
///
/// Purely informational: a missing tool or a non-zero exit is logged and
/// never fails the build.
pub fn show_working_tree_status(command: &StageCommand, repo: &Path) -> Option<StageOutcome> {
    if !repo.is_dir() {
        tracing::warn!(repo = %repo.display(), "repository directory missing; skipping status");
        return None;
    }
    match run_stage(StageKind::Status, command, &[], repo) {
        Ok(outcome) => {
            if !outcome.success {
                tracing::warn!(
                    command = %command,
                    exit_code = ?outcome.exit_code,
                    "status command failed"
                );
            }
            Some(outcome)
        }
        Err(err) => {
            tracing::warn!(command = %command, "status command unavailable: {err:#}");
            None
        }
    }
}
