//! Error types for the supervisor module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a job from being started.
///
/// None of these abort a run: the supervisor reports them as output
/// events and moves on to the next job.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Execution is disabled by configuration.
    #[error("execution skipped (skip_execution enabled)")]
    ExecutionDisabled,

    /// The marketplace has no automation executable configured.
    #[error("no executable configured")]
    NoExecutable,

    /// The executable is not present in the job folder.
    #[error("executable not found: {path}")]
    ExecutableNotFound { path: PathBuf },

    /// The launcher program could not be found.
    #[error("launcher not found: {launcher}")]
    LauncherNotFound { launcher: String },

    /// Spawning the process failed for another reason.
    #[error("failed to start process: {0}")]
    Spawn(#[from] std::io::Error),
}

impl SupervisorError {
    /// Whether the job counts as skipped rather than failed.
    pub fn is_skip(&self) -> bool {
        !matches!(self, Self::Spawn(_))
    }
}
