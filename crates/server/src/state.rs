use std::sync::Arc;

use orderflow_core::{Config, EntityIdCache, OrderDispatcher};

/// Shared application state
pub struct AppState {
    dispatcher: Arc<OrderDispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Arc<OrderDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &OrderDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &Config {
        self.dispatcher.config()
    }

    pub fn entity_cache(&self) -> &EntityIdCache {
        self.dispatcher.entity_cache()
    }
}
