//! Configuration for the process supervisor.

use serde::{Deserialize, Serialize};

/// Limits and switches for automation jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Wall-clock limit for a single job in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// How long a terminated job may take to exit before it is killed.
    #[serde(default = "default_terminate_grace")]
    pub terminate_grace_secs: u64,

    /// Route orders but do not launch any executable.
    #[serde(default)]
    pub skip_execution: bool,
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

fn default_terminate_grace() -> u64 {
    15
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            terminate_grace_secs: default_terminate_grace(),
            skip_execution: false,
        }
    }
}

impl SupervisorConfig {
    /// Sets the per-job timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the terminate grace period in seconds.
    pub fn with_terminate_grace(mut self, grace_secs: u64) -> Self {
        self.terminate_grace_secs = grace_secs;
        self
    }

    /// Enables or disables execution.
    pub fn with_skip_execution(mut self, skip: bool) -> Self {
        self.skip_execution = skip;
        self
    }
}
