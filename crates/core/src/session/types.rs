//! Session and event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::marketplace::Marketplace;
use crate::supervisor::JobResult;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session with this id is held in the store.
    #[error("session not found: {0}")]
    NotFound(Uuid),

    /// The session already received its terminal event.
    #[error("session already completed: {0}")]
    Completed(Uuid),
}

/// Kind of a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Output,
    Complete,
    Error,
}

/// One entry in a session log, also the wire frame sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub content: String,
}

impl SessionEvent {
    pub fn output(content: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Output,
            content: content.into(),
        }
    }

    pub fn complete() -> Self {
        Self {
            kind: EventKind::Complete,
            content: String::new(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            content: content.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.kind == EventKind::Complete
    }
}

/// Lifecycle of a session while it is held in the store.
///
/// Expiry removes the session from the store, so there is no `Expired` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Running,
    Completed,
}

/// Parameters for a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub selected: Vec<Marketplace>,
    pub parallel: bool,
    pub max_concurrency: usize,
}

#[derive(Debug, Default)]
struct SessionLog {
    events: Vec<SessionEvent>,
    completed_at: Option<DateTime<Utc>>,
}

/// Server-held record of one dispatch run.
///
/// The log is append-only. It has one writer (the run's background task)
/// and any number of readers, each tracking its own cursor.
#[derive(Debug)]
pub struct ExecutionSession {
    id: Uuid,
    selected: Vec<Marketplace>,
    parallel: bool,
    max_concurrency: usize,
    created_at: DateTime<Utc>,
    log: RwLock<SessionLog>,
    started: AtomicBool,
    finished_tx: Mutex<Option<watch::Sender<bool>>>,
    finished: watch::Receiver<bool>,
    results: RwLock<Vec<JobResult>>,
}

impl ExecutionSession {
    pub fn new(new_session: NewSession) -> Self {
        let (finished_tx, finished) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            selected: new_session.selected,
            parallel: new_session.parallel,
            max_concurrency: new_session.max_concurrency,
            created_at: Utc::now(),
            log: RwLock::new(SessionLog::default()),
            started: AtomicBool::new(false),
            finished_tx: Mutex::new(Some(finished_tx)),
            finished,
            results: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn selected(&self) -> &[Marketplace] {
        &self.selected
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append an event, returning the new log length.
    ///
    /// A `complete` event marks the session completed; nothing may be
    /// appended after it.
    pub fn append(&self, event: SessionEvent) -> Result<usize, SessionError> {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        if log.completed_at.is_some() {
            return Err(SessionError::Completed(self.id));
        }
        if event.is_complete() {
            log.completed_at = Some(Utc::now());
        }
        log.events.push(event);
        Ok(log.events.len())
    }

    /// Events at and after `cursor`, plus whether the session is completed.
    ///
    /// Both values come from one snapshot, so a reader that sees
    /// `completed == true` has received every event.
    pub fn events_from(&self, cursor: usize) -> (Vec<SessionEvent>, bool) {
        let log = self.log.read().unwrap_or_else(PoisonError::into_inner);
        let start = cursor.min(log.events.len());
        (log.events[start..].to_vec(), log.completed_at.is_some())
    }

    pub fn len(&self) -> usize {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at().is_some()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .completed_at
    }

    pub fn state(&self) -> SessionState {
        if self.is_completed() {
            SessionState::Completed
        } else if self.started.load(Ordering::Acquire) {
            SessionState::Running
        } else {
            SessionState::Created
        }
    }

    /// Record the background task driving this session (`Created` → `Running`).
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach_task(&self, handle: JoinHandle<()>) {
        let finished_tx = self
            .finished_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.started.store(true, Ordering::Release);
        if let Some(finished_tx) = finished_tx {
            tokio::spawn(async move {
                let _ = handle.await;
                finished_tx.send_replace(true);
            });
        }
    }

    /// Wait for the background task to finish, including when it panicked.
    ///
    /// Any number of callers may wait at once. Returns immediately if no
    /// task is attached.
    pub async fn wait(&self) {
        if !self.started.load(Ordering::Acquire) {
            return;
        }
        let mut finished = self.finished.clone();
        let _ = finished.wait_for(|done| *done).await;
    }

    pub fn set_results(&self, results: Vec<JobResult>) {
        *self.results.write().unwrap_or_else(PoisonError::into_inner) = results;
    }

    pub fn results(&self) -> Vec<JobResult> {
        self.results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            state: self.state(),
            selected_marketplaces: self.selected.clone(),
            parallel: self.parallel,
            max_concurrency: self.max_concurrency,
            event_count: self.len(),
            created_at: self.created_at,
            completed_at: self.completed_at(),
            results: self.results(),
        }
    }
}

/// Point-in-time view of a session for status polling.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub state: SessionState,
    pub selected_marketplaces: Vec<Marketplace>,
    pub parallel: bool,
    pub max_concurrency: usize,
    pub event_count: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Vec<JobResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ExecutionSession {
        ExecutionSession::new(NewSession {
            selected: vec![Marketplace::Desty],
            parallel: true,
            max_concurrency: 2,
        })
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&SessionEvent::output("hello")).unwrap();
        assert_eq!(json, r#"{"type":"output","content":"hello"}"#);
        let json = serde_json::to_string(&SessionEvent::complete()).unwrap();
        assert_eq!(json, r#"{"type":"complete","content":""}"#);
    }

    #[test]
    fn test_append_is_monotonic_and_closes_on_complete() {
        let s = session();
        assert_eq!(s.state(), SessionState::Created);
        assert_eq!(s.append(SessionEvent::output("a")).unwrap(), 1);
        assert_eq!(s.append(SessionEvent::output("b")).unwrap(), 2);
        assert!(!s.is_completed());
        assert_eq!(s.append(SessionEvent::complete()).unwrap(), 3);
        assert!(s.is_completed());
        assert_eq!(s.state(), SessionState::Completed);

        let err = s.append(SessionEvent::output("late")).unwrap_err();
        assert!(matches!(err, SessionError::Completed(_)));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_events_from_cursor() {
        let s = session();
        s.append(SessionEvent::output("a")).unwrap();
        s.append(SessionEvent::output("b")).unwrap();

        let (events, completed) = s.events_from(1);
        assert_eq!(events, vec![SessionEvent::output("b")]);
        assert!(!completed);

        let (events, _) = s.events_from(10);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_attach_task_marks_running_and_wait_joins() {
        let s = session();
        let handle = tokio::spawn(async {});
        s.attach_task(handle);
        assert_eq!(s.state(), SessionState::Running);
        s.wait().await;
        s.wait().await;
    }

    #[tokio::test]
    async fn test_concurrent_waiters_all_block_until_task_ends() {
        let s = std::sync::Arc::new(session());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        s.attach_task(tokio::spawn(async move {
            let _ = release_rx.await;
        }));

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let s = std::sync::Arc::clone(&s);
                tokio::spawn(async move { s.wait().await })
            })
            .collect();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        release_tx.send(()).unwrap();
        for waiter in waiters {
            tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
                .await
                .expect("waiter released")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_wait_returns_after_task_panics() {
        let s = session();
        s.attach_task(tokio::spawn(async { panic!("job task failed") }));
        tokio::time::timeout(std::time::Duration::from_secs(5), s.wait())
            .await
            .expect("wait returns");
    }

    #[tokio::test]
    async fn test_wait_without_task_returns_immediately() {
        session().wait().await;
    }
}
