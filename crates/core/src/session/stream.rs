//! Per-subscriber replay of a session log.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use uuid::Uuid;

use super::store::SessionStore;
use super::types::{ExecutionSession, SessionEvent};

/// A session event with its position in the log.
///
/// `index` is `None` for frames that are not part of the log, such as the
/// error sent when the session does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedEvent {
    pub index: Option<usize>,
    pub event: SessionEvent,
}

impl StreamedEvent {
    /// The single frame sent for a session that does not exist.
    pub fn not_found() -> Self {
        Self {
            index: None,
            event: SessionEvent::error("Session not found"),
        }
    }
}

enum Cursor {
    Start {
        store: Arc<dyn SessionStore>,
        id: Uuid,
        from: usize,
    },
    Following {
        session: Arc<ExecutionSession>,
        next: usize,
        pending: VecDeque<StreamedEvent>,
    },
    Done,
}

/// Stream every event of session `id` starting at log position `from`.
///
/// Events already logged are replayed first, then new events are delivered
/// as they are appended, checking every `poll_interval`. The stream ends
/// after the `complete` event. An unknown session yields a single
/// `Session not found` error event.
///
/// Each call tracks its own cursor, so any number of subscribers can read
/// the same session independently.
pub fn subscribe(
    store: Arc<dyn SessionStore>,
    id: Uuid,
    from: usize,
    poll_interval: Duration,
) -> impl Stream<Item = StreamedEvent> + Send + 'static {
    stream::unfold(Cursor::Start { store, id, from }, move |cursor| async move {
        match cursor {
            Cursor::Start { store, id, from } => match store.get(id) {
                Some(session) => {
                    next_event(session, from, VecDeque::new(), poll_interval).await
                }
                None => Some((StreamedEvent::not_found(), Cursor::Done)),
            },
            Cursor::Following {
                session,
                next,
                pending,
            } => next_event(session, next, pending, poll_interval).await,
            Cursor::Done => None,
        }
    })
}

async fn next_event(
    session: Arc<ExecutionSession>,
    mut next: usize,
    mut pending: VecDeque<StreamedEvent>,
    poll_interval: Duration,
) -> Option<(StreamedEvent, Cursor)> {
    loop {
        if let Some(item) = pending.pop_front() {
            return Some((
                item,
                Cursor::Following {
                    session,
                    next,
                    pending,
                },
            ));
        }

        let (events, completed) = session.events_from(next);
        if !events.is_empty() {
            for event in events {
                pending.push_back(StreamedEvent {
                    index: Some(next),
                    event,
                });
                next += 1;
            }
            continue;
        }

        if completed {
            return None;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
