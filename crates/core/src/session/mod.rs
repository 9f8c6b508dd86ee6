//! Execution sessions.
//!
//! A session is the server-side record of one dispatch run: an append-only
//! event log written by the run's background task and replayed to any
//! number of stream subscribers. Completed sessions stay readable for a
//! grace period and are then evicted by the sweep loop.

mod store;
mod stream;
mod sweeper;
mod types;

pub use store::{InMemorySessionStore, SessionStore};
pub use stream::{subscribe, StreamedEvent};
pub use sweeper::spawn_sweeper;
pub use types::{
    EventKind, ExecutionSession, NewSession, SessionError, SessionEvent, SessionState,
    SessionSummary,
};
