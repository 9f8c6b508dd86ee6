use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::marketplace::Marketplace;
use crate::session::SessionError;

/// Errors surfaced to callers of the dispatcher.
///
/// Routing and job failures are not errors: they are reported as session
/// events.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to read {path}: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    InputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Result of a classification-only check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub selected_marketplaces: Vec<Marketplace>,
    pub diagnostic_info: String,
}

/// Handle returned by a run; the session keeps going in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunHandle {
    pub session_id: Uuid,
}

/// Health of a marketplace's entity id backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackingStoreReport {
    pub marketplace: Marketplace,
    pub database_ok: bool,
    pub lookup_ok: bool,
    pub message: String,
}
