//! Server-sent event relay for session logs.
//!
//! Each frame's data is the JSON event `{type, content}`. Frames taken from
//! the log carry their log index as the SSE id, so a reconnecting client
//! that sends `Last-Event-ID: n` resumes at index `n + 1`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use orderflow_core::StreamedEvent;

use crate::metrics::{STREAMS_ACTIVE, STREAMS_TOTAL};
use crate::state::AppState;

const LAST_EVENT_ID: &str = "last-event-id";

/// GET /api/v1/dispatch/sessions/{id}/stream
pub async fn stream_session(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let from = resume_cursor(&headers);
    debug!(session_id = %raw_id, from, "Stream subscriber connected");

    // An id that is not a UUID names no session either.
    let source = match Uuid::parse_str(&raw_id) {
        Ok(id) => state.dispatcher().subscribe(id, from).boxed(),
        Err(_) => stream::once(async { StreamedEvent::not_found() }).boxed(),
    };

    let guard = StreamGuard::open(raw_id);
    let events = source.map(move |streamed| {
        let _guard = &guard;
        Ok(to_frame(streamed))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Log index to start from, given the client's `Last-Event-ID`.
fn resume_cursor(headers: &HeaderMap) -> usize {
    headers
        .get(LAST_EVENT_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map_or(0, |last| last.saturating_add(1))
}

fn to_frame(streamed: StreamedEvent) -> Event {
    let frame = match Event::default().json_data(&streamed.event) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Failed to serialize session event: {}", e);
            Event::default().data(streamed.event.content)
        }
    };
    match streamed.index {
        Some(index) => frame.id(index.to_string()),
        None => frame,
    }
}

/// Tracks one open stream for the lifetime of the response body.
struct StreamGuard {
    session_id: String,
}

impl StreamGuard {
    fn open(session_id: String) -> Self {
        STREAMS_TOTAL.inc();
        STREAMS_ACTIVE.inc();
        Self { session_id }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        STREAMS_ACTIVE.dec();
        debug!(session_id = %self.session_id, "Stream subscriber disconnected");
    }
}
