//! Process supervisor for marketplace automation jobs.
//!
//! Runs one external executable per updated folder, either one after another
//! or through a bounded worker pool. Output lines, timeouts and exit statuses
//! are reported as session events; a run always ends with exactly one
//! `complete` event.

mod config;
mod error;
mod process;
mod types;

pub use config::SupervisorConfig;
pub use error::SupervisorError;
pub use types::{JobOutcome, JobResult, JobSpec};

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info};

use crate::session::SessionEvent;
use process::run_job;

/// Launches and supervises automation jobs.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run every job and return their results in job order.
    ///
    /// With `parallel`, up to `max_concurrency` jobs run at once; otherwise
    /// jobs run strictly in sequence. A failing or timed-out job never
    /// affects its siblings. The `complete` event is sent after the last job
    /// finishes.
    pub async fn run(
        &self,
        jobs: Vec<JobSpec>,
        parallel: bool,
        max_concurrency: usize,
        events: mpsc::Sender<SessionEvent>,
    ) -> Vec<JobResult> {
        info!(
            jobs = jobs.len(),
            parallel,
            max_concurrency,
            "Starting supervisor run"
        );

        let results = if parallel && jobs.len() > 1 {
            self.run_parallel(jobs, max_concurrency, &events).await
        } else {
            let mut results = Vec::with_capacity(jobs.len());
            for job in &jobs {
                results.push(run_job(job, &self.config, &events).await);
            }
            results
        };

        info!(jobs = results.len(), "Supervisor run finished");
        let _ = events.send(SessionEvent::complete()).await;
        results
    }

    async fn run_parallel(
        &self,
        jobs: Vec<JobSpec>,
        max_concurrency: usize,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Vec<JobResult> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let semaphore = Arc::clone(&semaphore);
            let config = self.config.clone();
            let events = events.clone();
            handles.push(tokio::spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                run_job(&job, &config, &events).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => error!(error = %e, "Job task panicked"),
            }
        }
        results
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::marketplace::Marketplace;
    use crate::session::EventKind;
    use std::path::Path;
    use tempfile::TempDir;

    fn job(folder: &Path, script: Option<&str>) -> JobSpec {
        JobSpec {
            marketplace: Marketplace::Desty,
            folder: folder.to_path_buf(),
            label: folder
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            executable: script.map(str::to_string),
            launcher: Some("sh".to_string()),
        }
    }

    fn brand_folder(root: &TempDir, name: &str, script: &str) -> std::path::PathBuf {
        let folder = root.path().join(name);
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("run.sh"), script).unwrap();
        folder
    }

    async fn collect(
        supervisor: &Supervisor,
        jobs: Vec<JobSpec>,
        parallel: bool,
        max: usize,
    ) -> (Vec<JobResult>, Vec<SessionEvent>) {
        let (tx, mut rx) = mpsc::channel(64);
        let drain = tokio::spawn(async move {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        });
        let results = supervisor.run(jobs, parallel, max, tx).await;
        (results, drain.await.unwrap())
    }

    #[tokio::test]
    async fn test_output_is_tagged_and_ordered() {
        let root = TempDir::new().unwrap();
        let folder = brand_folder(&root, "acme", "echo one\necho two\necho three\n");

        let (results, events) =
            collect(&Supervisor::default(), vec![job(&folder, Some("run.sh"))], false, 1).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].exit_code, Some(0));
        assert_eq!(results[0].outcome(), JobOutcome::Success);

        let lines: Vec<_> = events
            .iter()
            .filter(|e| e.content.starts_with("[Desty/acme] "))
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(
            lines,
            vec!["[Desty/acme] one", "[Desty/acme] two", "[Desty/acme] three"]
        );
        assert!(events.last().unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_working_directory_is_the_folder() {
        let root = TempDir::new().unwrap();
        let folder = brand_folder(&root, "cwd", "cat orderlist.txt\n");
        std::fs::write(folder.join("orderlist.txt"), "DST-1\n").unwrap();

        let (_, events) =
            collect(&Supervisor::default(), vec![job(&folder, Some("run.sh"))], false, 1).await;
        assert!(events.iter().any(|e| e.content == "[Desty/cwd] DST-1"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported_and_siblings_run() {
        let root = TempDir::new().unwrap();
        let bad = brand_folder(&root, "bad", "echo failing >&2\nexit 3\n");
        let good = brand_folder(&root, "good", "echo fine\n");

        let (results, events) = collect(
            &Supervisor::default(),
            vec![job(&bad, Some("run.sh")), job(&good, Some("run.sh"))],
            true,
            2,
        )
        .await;

        assert_eq!(results[0].exit_code, Some(3));
        assert_eq!(results[0].outcome(), JobOutcome::Failed);
        assert_eq!(results[1].outcome(), JobOutcome::Success);
        assert!(events
            .iter()
            .any(|e| e.content == "[X] Desty/bad: finished with error (exit code: 3)"));
        assert!(events.iter().any(|e| e.content == "[Desty/bad] failing"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_skipped() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("empty");
        std::fs::create_dir(&folder).unwrap();

        let (results, events) =
            collect(&Supervisor::default(), vec![job(&folder, Some("run.sh"))], false, 1).await;

        assert!(results[0].skipped);
        assert_eq!(results[0].outcome(), JobOutcome::Skipped);
        assert!(events[0].content.contains("executable not found"));
        assert_eq!(events[0].kind, EventKind::Output);
    }

    #[tokio::test]
    async fn test_unconfigured_executable_is_skipped() {
        let root = TempDir::new().unwrap();
        let (results, events) =
            collect(&Supervisor::default(), vec![job(root.path(), None)], false, 1).await;
        assert!(results[0].skipped);
        assert!(events[0].content.contains("no executable configured"));
    }

    #[tokio::test]
    async fn test_skip_execution() {
        let root = TempDir::new().unwrap();
        let folder = brand_folder(&root, "acme", "echo should-not-run\n");
        let supervisor = Supervisor::new(SupervisorConfig::default().with_skip_execution(true));

        let (results, events) =
            collect(&supervisor, vec![job(&folder, Some("run.sh"))], false, 1).await;
        assert!(results[0].skipped);
        assert!(!events.iter().any(|e| e.content.contains("should-not-run")));
    }

    #[tokio::test]
    async fn test_exactly_one_complete_event() {
        let root = TempDir::new().unwrap();
        let jobs: Vec<_> = (0..4)
            .map(|i| job(&brand_folder(&root, &format!("b{i}"), "echo hi\n"), Some("run.sh")))
            .collect();

        let (results, events) = collect(&Supervisor::default(), jobs, true, 2).await;
        assert_eq!(results.len(), 4);
        assert_eq!(events.iter().filter(|e| e.is_complete()).count(), 1);
        assert!(events.last().unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_empty_run_still_completes() {
        let (results, events) = collect(&Supervisor::default(), Vec::new(), true, 4).await;
        assert!(results.is_empty());
        assert_eq!(events, vec![SessionEvent::complete()]);
    }
}
