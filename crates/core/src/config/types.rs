use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::marketplace::Marketplace;
use crate::supervisor::SupervisorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Per-marketplace overrides. Missing entries use built-in defaults.
    #[serde(default)]
    pub marketplaces: BTreeMap<Marketplace, MarketplaceConfig>,
    /// Order database backing the entity id lookup.
    #[serde(default)]
    pub order_store: Option<OrderStoreConfig>,
}

impl Config {
    /// Resolved settings for one marketplace, merging overrides onto defaults.
    pub fn marketplace(&self, marketplace: Marketplace) -> MarketplaceSettings {
        let defaults = MarketplaceSettings::default_for(marketplace);
        match self.marketplaces.get(&marketplace) {
            Some(overrides) => defaults.apply(overrides),
            None => defaults,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Settings for dispatch runs and their sessions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Directory holding the canonical `input_orders.txt`.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Run marketplace jobs concurrently.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Upper bound on concurrently running jobs when `parallel` is set.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// How long a completed session stays readable before it is evicted.
    #[serde(default = "default_session_grace")]
    pub session_grace_secs: u64,

    /// How often a stream subscriber polls the session log for new events.
    #[serde(default = "default_stream_poll_interval")]
    pub stream_poll_interval_ms: u64,

    /// How often the expiry sweep runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_parallel() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    6
}

fn default_session_grace() -> u64 {
    30
}

fn default_stream_poll_interval() -> u64 {
    100
}

fn default_sweep_interval() -> u64 {
    5
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            parallel: default_parallel(),
            max_concurrency: default_max_concurrency(),
            session_grace_secs: default_session_grace(),
            stream_poll_interval_ms: default_stream_poll_interval(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Optional per-marketplace overrides, as written in the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MarketplaceConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Directory containing one subfolder per brand.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    /// Automation executable expected inside each brand folder.
    #[serde(default)]
    pub executable: Option<String>,
    /// Program used to launch the executable (e.g. `wine`).
    #[serde(default)]
    pub launcher: Option<String>,
    /// Map order tokens to entity ids through the order store before routing.
    #[serde(default)]
    pub entity_lookup: Option<bool>,
}

/// Fully resolved settings for one marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketplaceSettings {
    pub marketplace: Marketplace,
    pub enabled: bool,
    pub base_dir: PathBuf,
    pub executable: Option<String>,
    pub launcher: Option<String>,
    pub entity_lookup: bool,
}

impl MarketplaceSettings {
    /// Built-in defaults for a marketplace.
    pub fn default_for(marketplace: Marketplace) -> Self {
        let (base_dir, executable) = match marketplace {
            Marketplace::Desty => ("/mnt/share2/DESTY/DestyGetOrder", Some("Desty.Console.exe")),
            Marketplace::Ginee => ("/mnt/share2/GINEE", Some("Ginee.sync.exe")),
            Marketplace::Lazada => ("/mnt/share2/LAZADA/LazadaGetOrder", None),
            Marketplace::Shopee => ("/mnt/share2/SHOPEE/ShopeeManualPerShopV2 ( BRAND )", None),
            Marketplace::Tiktok => ("/mnt/share2/TIKTOK/GetOrderTiktok", None),
            Marketplace::Jubelio => ("/mnt/jubelio", Some("Jubelio_project.exe")),
        };

        Self {
            marketplace,
            enabled: true,
            base_dir: PathBuf::from(base_dir),
            executable: executable.map(str::to_string),
            launcher: None,
            entity_lookup: marketplace == Marketplace::Desty,
        }
    }

    fn apply(mut self, overrides: &MarketplaceConfig) -> Self {
        if let Some(enabled) = overrides.enabled {
            self.enabled = enabled;
        }
        if let Some(ref base_dir) = overrides.base_dir {
            self.base_dir = base_dir.clone();
        }
        if let Some(ref executable) = overrides.executable {
            self.executable = Some(executable.clone());
        }
        if let Some(ref launcher) = overrides.launcher {
            self.launcher = Some(launcher.clone());
        }
        if let Some(entity_lookup) = overrides.entity_lookup {
            self.entity_lookup = entity_lookup;
        }
        self
    }
}

/// SQLite order database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderStoreConfig {
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.dispatch.work_dir, PathBuf::from("data"));
        assert_eq!(config.dispatch.session_grace_secs, 30);
        assert_eq!(config.supervisor.timeout_secs, 600);
        assert!(config.order_store.is_none());
    }

    #[test]
    fn test_marketplace_defaults() {
        let config = Config::default();
        let desty = config.marketplace(Marketplace::Desty);
        assert!(desty.enabled);
        assert!(desty.entity_lookup);
        assert_eq!(desty.executable.as_deref(), Some("Desty.Console.exe"));

        let shopee = config.marketplace(Marketplace::Shopee);
        assert!(!shopee.entity_lookup);
        assert!(shopee.executable.is_none());
    }

    #[test]
    fn test_marketplace_partial_override_keeps_defaults() {
        let toml = r#"
[marketplaces.jubelio]
base_dir = "/data/jubelio"
launcher = "wine"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let jubelio = config.marketplace(Marketplace::Jubelio);
        assert_eq!(jubelio.base_dir, PathBuf::from("/data/jubelio"));
        assert_eq!(jubelio.launcher.as_deref(), Some("wine"));
        assert_eq!(jubelio.executable.as_deref(), Some("Jubelio_project.exe"));
        assert!(jubelio.enabled);
    }

    #[test]
    fn test_marketplace_disable() {
        let toml = r#"
[marketplaces.tiktok]
enabled = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.marketplace(Marketplace::Tiktok).enabled);
        assert!(config.marketplace(Marketplace::Lazada).enabled);
    }

    #[test]
    fn test_unknown_marketplace_key_fails() {
        let toml = r#"
[marketplaces.tokopedia]
enabled = true
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_order_store_path() {
        let toml = r#"
[order_store]
path = "/data/orders.sqlite"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.order_store.unwrap().path.to_str().unwrap(),
            "/data/orders.sqlite"
        );
    }
}
