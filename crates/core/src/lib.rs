pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod entity_cache;
pub mod marketplace;
pub mod metrics;
pub mod router;
pub mod session;
pub mod supervisor;
pub mod testing;

pub use classifier::{classify, ClassificationResult, OrderLine, RuleTable};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, MarketplaceSettings,
};
pub use dispatch::{BackingStoreReport, CheckReport, DispatchError, OrderDispatcher, RunHandle};
pub use entity_cache::{CacheStats, EntityIdCache, OrderStore, OrderStoreError, SqliteOrderStore};
pub use marketplace::{Marketplace, UnknownMarketplace};
pub use router::{OrderRouter, RouteError, RouteOutcome, UpdatedFolder};
pub use session::{
    spawn_sweeper, EventKind, ExecutionSession, InMemorySessionStore, SessionError, SessionEvent,
    SessionState, SessionStore, SessionSummary, StreamedEvent,
};
pub use supervisor::{JobResult, JobSpec, Supervisor, SupervisorConfig, SupervisorError};
