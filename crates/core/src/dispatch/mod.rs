//! Dispatcher: the operations exposed to the web layer.
//!
//! `check` classifies without side effects. `run` persists the input,
//! classifies and routes on the caller's path, then hands the supervisor
//! run to a background task tied to a new session and returns at once.

mod input;
mod transform;
mod types;

pub use input::{input_path, normalize_lines, INPUT_FILE};
pub use types::{BackingStoreReport, CheckReport, DispatchError, RunHandle};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classifier::{classify_with, parse_orders, RuleTable};
use crate::config::Config;
use crate::entity_cache::EntityIdCache;
use crate::marketplace::Marketplace;
use crate::router::{OrderRouter, RouteOutcome};
use crate::session::{
    subscribe, ExecutionSession, NewSession, SessionError, SessionEvent, SessionStore,
    SessionSummary, StreamedEvent,
};
use crate::supervisor::{JobOutcome, JobResult, JobSpec, Supervisor};

const EVENT_BUFFER: usize = 256;

/// Ids used to exercise the lookup path in backing-store checks.
const SAMPLE_IDS: [&str; 2] = ["DST-2508186F50VB7D", "DST-2508186F6HFKD6"];

/// Orchestrates classify → route → supervise runs and their sessions.
pub struct OrderDispatcher {
    config: Config,
    rules: RuleTable,
    router: OrderRouter,
    supervisor: Supervisor,
    sessions: Arc<dyn SessionStore>,
    entity_cache: Arc<EntityIdCache>,
}

impl OrderDispatcher {
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        entity_cache: Arc<EntityIdCache>,
    ) -> Self {
        let base_dirs = Marketplace::ALL
            .into_iter()
            .map(|m| (m, config.marketplace(m).base_dir))
            .collect();

        Self {
            router: OrderRouter::new(base_dirs),
            supervisor: Supervisor::new(config.supervisor.clone()),
            rules: RuleTable::standard(),
            config,
            sessions,
            entity_cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.sessions)
    }

    pub fn entity_cache(&self) -> &EntityIdCache {
        &self.entity_cache
    }

    /// Path of the canonical input file.
    pub fn input_path(&self) -> PathBuf {
        input::input_path(&self.config.dispatch.work_dir)
    }

    /// Classify `text`, or the existing input file when `text` is blank.
    pub fn check(&self, text: Option<&str>) -> Result<CheckReport, DispatchError> {
        let (text, source) = match text.filter(|t| !t.trim().is_empty()) {
            Some(text) => (text.to_string(), "from submitted text".to_string()),
            None => match self.read_input()? {
                Some(existing) => (existing, format!("from existing {INPUT_FILE}")),
                None => {
                    return Ok(CheckReport {
                        selected_marketplaces: Vec::new(),
                        diagnostic_info: format!("{INPUT_FILE} not found"),
                    })
                }
            },
        };

        let result = classify_with(&self.rules, &text);
        Ok(CheckReport {
            selected_marketplaces: result.selected(),
            diagnostic_info: format!("{} {source}", result.diagnostic),
        })
    }

    /// Start a run and return its session id without waiting for jobs.
    ///
    /// Non-blank `text` replaces the input file first; otherwise the
    /// existing file is used. Must be called within a tokio runtime.
    pub fn run(&self, text: Option<&str>) -> Result<RunHandle, DispatchError> {
        let mut notes = Vec::new();
        let work_dir = &self.config.dispatch.work_dir;

        match text.filter(|t| !t.trim().is_empty()) {
            Some(text) => {
                let saved = input::persist(work_dir, text).map_err(|source| {
                    DispatchError::InputWrite {
                        path: self.input_path(),
                        source,
                    }
                })?;
                notes.push(format!("[*] Input updated: {saved} lines saved to {INPUT_FILE}"));
            }
            None if self.input_path().exists() => {
                notes.push(format!("[*] No new input; using existing {INPUT_FILE}"));
            }
            None => {
                notes.push(format!("[!] No input provided and {INPUT_FILE} does not exist"));
            }
        }

        let text = self.read_input()?.unwrap_or_default();
        let classification = classify_with(&self.rules, &text);
        let selected = classification.selected();
        let lines = parse_orders(&text);
        notes.push(format!("[*] {}", classification.diagnostic));

        let mut jobs = Vec::new();
        for &marketplace in &selected {
            self.route_marketplace(marketplace, &lines, &mut jobs, &mut notes);
        }

        let session = self.sessions.create(NewSession {
            selected: selected.clone(),
            parallel: self.config.dispatch.parallel,
            max_concurrency: self.config.dispatch.max_concurrency,
        });
        info!(
            session_id = %session.id(),
            marketplaces = ?selected,
            jobs = jobs.len(),
            "Dispatch run started"
        );

        let handle = tokio::spawn(drive(
            Arc::clone(&session),
            self.supervisor.clone(),
            jobs,
            notes,
        ));
        session.attach_task(handle);

        Ok(RunHandle {
            session_id: session.id(),
        })
    }

    fn route_marketplace(
        &self,
        marketplace: Marketplace,
        lines: &[crate::classifier::OrderLine],
        jobs: &mut Vec<JobSpec>,
        notes: &mut Vec<String>,
    ) {
        let settings = self.config.marketplace(marketplace);
        if !settings.enabled {
            notes.push(format!("[!] {marketplace} is disabled; skipping"));
            return;
        }

        let prepared = transform::prepare(&settings, lines, &self.rules, &self.entity_cache);
        notes.extend(prepared.notes);

        let outcome = match self.router.route(marketplace, &prepared.orders) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%marketplace, error = %e, "Routing failed");
                notes.push(format!("[X] {marketplace}: {e}"));
                return;
            }
        };

        notes.extend(describe_outcome(marketplace, &outcome));
        jobs.extend(outcome.updated.into_iter().map(|folder| JobSpec {
            label: folder.label(),
            marketplace,
            folder: folder.folder,
            executable: settings.executable.clone(),
            launcher: settings.launcher.clone(),
        }));
    }

    fn read_input(&self) -> Result<Option<String>, DispatchError> {
        input::read(&self.config.dispatch.work_dir).map_err(|source| DispatchError::InputRead {
            path: self.input_path(),
            source,
        })
    }

    pub fn session(&self, id: Uuid) -> Option<Arc<ExecutionSession>> {
        self.sessions.get(id)
    }

    pub fn session_status(&self, id: Uuid) -> Result<SessionSummary, DispatchError> {
        self.sessions
            .get(id)
            .map(|s| s.summary())
            .ok_or(DispatchError::Session(SessionError::NotFound(id)))
    }

    /// Stream a session's events from log position `from`.
    pub fn subscribe(
        &self,
        id: Uuid,
        from: usize,
    ) -> impl Stream<Item = StreamedEvent> + Send + 'static {
        subscribe(
            self.sessions(),
            id,
            from,
            Duration::from_millis(self.config.dispatch.stream_poll_interval_ms),
        )
    }

    /// Check connectivity and lookups against the marketplace's order store.
    pub fn check_backing_store(&self, marketplace: Marketplace) -> BackingStoreReport {
        let report = |database_ok, lookup_ok, message: String| BackingStoreReport {
            marketplace,
            database_ok,
            lookup_ok,
            message,
        };

        if !self.config.marketplace(marketplace).entity_lookup {
            return report(
                false,
                false,
                format!("{marketplace} does not use entity id lookup"),
            );
        }
        let Some(store) = self.entity_cache.store() else {
            return report(false, false, "No order store configured".to_string());
        };

        let (database_ok, db_message) = match store.ping() {
            Ok(()) => (true, "Database connection successful".to_string()),
            Err(e) => (false, format!("Database connection failed: {e}")),
        };

        let sample: Vec<String> = SAMPLE_IDS.iter().map(|s| s.to_string()).collect();
        let (lookup_ok, lookup_message) = match store.find_entity_ids(&sample) {
            Ok(found) if found.is_empty() => (
                true,
                "Entity id lookup working but no test data found".to_string(),
            ),
            Ok(_) => (
                true,
                format!("Entity id lookup working (tested with {} ids)", sample.len()),
            ),
            Err(e) => (false, format!("Entity id lookup failed: {e}")),
        };

        report(database_ok, lookup_ok, format!("{db_message}; {lookup_message}"))
    }
}

/// Operator notes for one marketplace's routing outcome.
fn describe_outcome(marketplace: Marketplace, outcome: &RouteOutcome) -> Vec<String> {
    let mut notes = Vec::new();
    for brand in &outcome.unmatched {
        notes.push(format!(
            "[!] {marketplace}: no folder found for brand '{}' (normalized '{}')",
            brand.brand, brand.normalized
        ));
    }
    for failed in &outcome.failed {
        notes.push(format!(
            "[X] {marketplace}: failed to write order list in {}: {}",
            failed.folder.display(),
            failed.error
        ));
    }
    for folder in &outcome.unchanged {
        notes.push(format!(
            "[=] {marketplace}: order list unchanged in {}, not scheduled",
            folder.display()
        ));
    }
    for folder in &outcome.updated {
        notes.push(format!(
            "[OK] {marketplace}/{}: {} orders written to order list",
            folder.label(),
            folder.order_count
        ));
    }
    notes
}

/// Background task owning one session: narrate, supervise, complete.
async fn drive(
    session: Arc<ExecutionSession>,
    supervisor: Supervisor,
    jobs: Vec<JobSpec>,
    notes: Vec<String>,
) {
    let session_id = session.id();
    for note in notes {
        append(&session, SessionEvent::output(note));
    }

    if jobs.is_empty() {
        append(&session, SessionEvent::output("[*] No jobs detected"));
    } else {
        let names: Vec<String> = jobs.iter().map(JobSpec::tag).collect();
        append(
            &session,
            SessionEvent::output(format!("[*] Jobs to run: {}", names.join(", "))),
        );
    }

    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    let parallel = session.parallel();
    let max_concurrency = session.max_concurrency();
    let run = tokio::spawn(async move { supervisor.run(jobs, parallel, max_concurrency, tx).await });

    let mut complete = None;
    while let Some(event) = rx.recv().await {
        if event.is_complete() {
            complete = Some(event);
        } else {
            append(&session, event);
        }
    }

    let results = match run.await {
        Ok(results) => results,
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Supervisor task failed");
            append(
                &session,
                SessionEvent::error(format!("Supervisor task failed: {e}")),
            );
            Vec::new()
        }
    };

    if !results.is_empty() {
        append(&session, SessionEvent::output(summarize(&results)));
    }
    session.set_results(results);
    append(&session, complete.unwrap_or_else(SessionEvent::complete));
    info!(session_id = %session_id, "Dispatch run completed");
}

fn summarize(results: &[JobResult]) -> String {
    let count = |outcome: JobOutcome| results.iter().filter(|r| r.outcome() == outcome).count();
    format!(
        "[OK] DONE: all jobs finished ({} succeeded, {} failed, {} timed out, {} skipped)",
        count(JobOutcome::Success),
        count(JobOutcome::Failed),
        count(JobOutcome::TimedOut),
        count(JobOutcome::Skipped)
    )
}

fn append(session: &ExecutionSession, event: SessionEvent) {
    if let Err(e) = session.append(event) {
        warn!(session_id = %session.id(), error = %e, "Dropped session event");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::router::ORDERLIST_FILE;
    use crate::session::{EventKind, InMemorySessionStore, SessionState};
    use crate::testing::fixtures::{brand_folder, config_for};
    use crate::testing::MockOrderStore;
    use futures::StreamExt;
    use tempfile::TempDir;

    fn dispatcher(root: &TempDir, store: MockOrderStore) -> OrderDispatcher {
        OrderDispatcher::new(
            config_for(root.path()),
            Arc::new(InMemorySessionStore::new()),
            Arc::new(EntityIdCache::new(Arc::new(store))),
        )
    }

    async fn events_of(d: &OrderDispatcher, id: Uuid) -> Vec<SessionEvent> {
        d.subscribe(id, 0).map(|e| e.event).collect().await
    }

    #[test]
    fn test_check_submitted_text() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root, MockOrderStore::new());
        let report = d
            .check(Some("BrandA\tDST-12345\nBrandA\tGN-99\nBrandB\tTTS88"))
            .unwrap();
        assert_eq!(
            report.selected_marketplaces,
            vec![Marketplace::Desty, Marketplace::Ginee, Marketplace::Tiktok]
        );
        assert_eq!(report.diagnostic_info, "Found 3 valid lines from submitted text");
        assert!(!d.input_path().exists());
    }

    #[test]
    fn test_check_without_input_file() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root, MockOrderStore::new());
        let report = d.check(None).unwrap();
        assert!(report.selected_marketplaces.is_empty());
        assert_eq!(report.diagnostic_info, "input_orders.txt not found");
    }

    #[test]
    fn test_check_existing_file() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root, MockOrderStore::new());
        input::persist(&d.config().dispatch.work_dir, "A\tLZ-1").unwrap();
        let report = d.check(Some("   ")).unwrap();
        assert_eq!(
            report.selected_marketplaces,
            vec![Marketplace::Lazada, Marketplace::Jubelio]
        );
        assert!(report.diagnostic_info.ends_with("from existing input_orders.txt"));
    }

    #[tokio::test]
    async fn test_run_routes_and_streams_to_completion() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root, MockOrderStore::new().with_row("DST-1", "ENT-1"));
        let folder = brand_folder(
            &root.path().join("desty"),
            "Desty Acme",
            "echo processing\ncat orderlist.txt\n",
        );

        let handle = d.run(Some("Acme Official Store\tDST-1\nNobody\tDST-2\n")).unwrap();
        let events = events_of(&d, handle.session_id).await;

        assert_eq!(
            std::fs::read_to_string(folder.join(ORDERLIST_FILE)).unwrap(),
            "ENT-1\n"
        );
        let contents: Vec<_> = events.iter().map(|e| e.content.as_str()).collect();
        assert!(contents.contains(&"[Desty/Desty Acme] processing"));
        assert!(contents.contains(&"[Desty/Desty Acme] ENT-1"));
        assert!(contents
            .iter()
            .any(|c| c.contains("no folder found for brand 'Nobody'")));
        assert!(contents.contains(&"[*] Jobs to run: Desty/Desty Acme"));
        assert_eq!(events.iter().filter(|e| e.is_complete()).count(), 1);
        assert!(events.last().unwrap().is_complete());

        let session = d.session(handle.session_id).unwrap();
        session.wait().await;
        let status = d.session_status(handle.session_id).unwrap();
        assert_eq!(status.state, SessionState::Completed);
        assert_eq!(status.results.len(), 1);
        assert_eq!(status.results[0].exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_second_identical_run_has_no_jobs() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root, MockOrderStore::new());
        brand_folder(&root.path().join("lazada"), "acme", "echo lazada\n");

        let first = d.run(Some("Acme\t2641")).unwrap();
        let first_events = events_of(&d, first.session_id).await;
        assert!(first_events.iter().any(|e| e.content == "[Lazada/acme] lazada"));

        let second = d.run(None).unwrap();
        let second_events = events_of(&d, second.session_id).await;
        assert!(second_events.iter().any(|e| e.content == "[*] No jobs detected"));
        assert!(second_events
            .iter()
            .any(|e| e.content.contains("order list unchanged")));
        assert!(second_events.last().unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_run_persists_input_with_crlf() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root, MockOrderStore::new());
        let handle = d.run(Some("A\tXYZ\n\n")).unwrap();
        d.session(handle.session_id).unwrap().wait().await;
        assert_eq!(std::fs::read(d.input_path()).unwrap(), b"A\tXYZ\r\n");
    }

    #[tokio::test]
    async fn test_unknown_session_stream_yields_error() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root, MockOrderStore::new());
        let events = events_of(&d, Uuid::new_v4()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Error);
        assert!(matches!(
            d.session_status(Uuid::new_v4()),
            Err(DispatchError::Session(SessionError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_disabled_marketplace_is_not_routed() {
        let root = TempDir::new().unwrap();
        let mut config = config_for(root.path());
        config
            .marketplaces
            .get_mut(&Marketplace::Tiktok)
            .unwrap()
            .enabled = Some(false);
        let folder = brand_folder(&root.path().join("tiktok"), "acme", "echo hi\n");
        let d = OrderDispatcher::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(EntityIdCache::without_store()),
        );

        let handle = d.run(Some("Acme\tTTS1")).unwrap();
        let events = events_of(&d, handle.session_id).await;
        assert!(events.iter().any(|e| e.content == "[!] Tiktok is disabled; skipping"));
        assert!(!folder.join(ORDERLIST_FILE).exists());
    }

    #[test]
    fn test_backing_store_checks() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root, MockOrderStore::new());
        let ok = d.check_backing_store(Marketplace::Desty);
        assert!(ok.database_ok);
        assert!(ok.lookup_ok);
        assert!(ok.message.contains("no test data found"));

        let not_used = d.check_backing_store(Marketplace::Shopee);
        assert!(!not_used.database_ok);
        assert!(not_used.message.contains("does not use entity id lookup"));

        let down = dispatcher(&root, MockOrderStore::new().unreachable());
        let report = down.check_backing_store(Marketplace::Desty);
        assert!(!report.database_ok);
        assert!(!report.lookup_ok);
    }
}
