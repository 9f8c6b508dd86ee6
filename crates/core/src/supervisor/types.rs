use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::marketplace::Marketplace;

/// One automation job: run a marketplace executable inside a brand folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub marketplace: Marketplace,
    /// Working directory of the process; also where the executable lives.
    pub folder: PathBuf,
    /// Short name used to tag output lines.
    pub label: String,
    /// Executable file name relative to `folder`.
    pub executable: Option<String>,
    /// Program that runs the executable, e.g. `wine`.
    pub launcher: Option<String>,
}

impl JobSpec {
    /// Tag prefixed to every output line of this job.
    pub fn tag(&self) -> String {
        format!("{}/{}", self.marketplace.name(), self.label)
    }
}

/// Terminal status of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub marketplace: Marketplace,
    pub folder: PathBuf,
    /// Exit code, `None` when the job was skipped, killed by a signal, or
    /// could not be started.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub skipped: bool,
    pub duration_ms: u64,
}

/// Coarse outcome used for metrics and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Success,
    Failed,
    TimedOut,
    Skipped,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failed => "failed",
            JobOutcome::TimedOut => "timed_out",
            JobOutcome::Skipped => "skipped",
        }
    }
}

impl JobResult {
    pub fn outcome(&self) -> JobOutcome {
        if self.timed_out {
            JobOutcome::TimedOut
        } else if self.skipped {
            JobOutcome::Skipped
        } else if self.exit_code == Some(0) {
            JobOutcome::Success
        } else {
            JobOutcome::Failed
        }
    }
}
