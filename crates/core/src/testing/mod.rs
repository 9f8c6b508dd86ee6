//! Testing utilities and mock implementations.
//!
//! Provides a mock order store and filesystem fixtures so dispatch runs can
//! be exercised without a real order database or marketplace share.

mod mock_order_store;

pub use mock_order_store::MockOrderStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    use crate::config::{Config, DispatchConfig, MarketplaceConfig};
    use crate::marketplace::Marketplace;
    use crate::supervisor::SupervisorConfig;

    /// Name of the script written by [`brand_folder`].
    pub const SCRIPT_NAME: &str = "run.sh";

    /// Create `base/<name>` containing a shell script job.
    ///
    /// The script is run through the `sh` launcher, so it does not need to
    /// be executable.
    pub fn brand_folder(base: &Path, name: &str, script: &str) -> PathBuf {
        let folder = base.join(name);
        std::fs::create_dir_all(&folder).expect("create brand folder");
        std::fs::write(folder.join(SCRIPT_NAME), script).expect("write job script");
        folder
    }

    /// Config rooted at `root`: input file in `root/work`, every
    /// marketplace's base directory at `root/<key>` (created), and jobs
    /// launched as `sh run.sh`.
    pub fn config_for(root: &Path) -> Config {
        let mut marketplaces = BTreeMap::new();
        for marketplace in Marketplace::ALL {
            let base_dir = root.join(marketplace.key());
            std::fs::create_dir_all(&base_dir).expect("create base dir");
            marketplaces.insert(
                marketplace,
                MarketplaceConfig {
                    enabled: Some(true),
                    base_dir: Some(base_dir),
                    executable: Some(SCRIPT_NAME.to_string()),
                    launcher: Some("sh".to_string()),
                    entity_lookup: None,
                },
            );
        }

        Config {
            dispatch: DispatchConfig {
                work_dir: root.join("work"),
                stream_poll_interval_ms: 10,
                ..Default::default()
            },
            supervisor: SupervisorConfig::default()
                .with_timeout(30)
                .with_terminate_grace(1),
            marketplaces,
            ..Default::default()
        }
    }
}
