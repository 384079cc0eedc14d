use crate::blockchain::address::Network;
use crate::constants::{
    ARCHIVE_TIMEOUT, DEFAULT_FEE_RATE, DEFAULT_ORDER_LOCK_PATTERN, DUST_LIMIT, LEASE_DURATION,
    MAX_SPLITS, TXN_TOPIC,
};
use crate::errors::LedgerError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const fn fee_rate() -> f64 {
    DEFAULT_FEE_RATE
}
const fn dust_limit() -> u64 {
    DUST_LIMIT
}
const fn lease_duration_secs() -> u64 {
    LEASE_DURATION.as_secs()
}
const fn max_splits() -> usize {
    MAX_SPLITS
}
fn order_lock_pattern() -> String {
    DEFAULT_ORDER_LOCK_PATTERN.to_string()
}
fn txn_topic() -> String {
    TXN_TOPIC.to_string()
}
fn asset_topic() -> String {
    "jig".to_string()
}
fn broadcast_queue() -> String {
    "broadcast".to_string()
}
fn metric_namespace() -> String {
    "ledger".to_string()
}
const fn node_timeout_secs() -> u64 {
    30
}
const fn archive_timeout_secs() -> u64 {
    ARCHIVE_TIMEOUT.as_secs()
}
const fn reconcile_interval_secs() -> u64 {
    60
}
const fn db_max_connections() -> u32 {
    10
}
fn database_url() -> String {
    "postgres://localhost/ledger".to_string()
}
fn node_rpc_url() -> String {
    "http://localhost:8332".to_string()
}
fn archive_path() -> String {
    "data/archive".to_string()
}
fn reconcile_journal() -> String {
    "data/reconcile.json".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub network: Network,
    #[serde(default = "fee_rate")]
    pub fee_rate: f64,
    #[serde(default = "dust_limit")]
    pub dust_limit: u64,
    #[serde(default = "lease_duration_secs")]
    pub lease_duration_secs: u64,
    #[serde(default = "max_splits")]
    pub max_splits: usize,
    #[serde(default = "order_lock_pattern")]
    pub order_lock_pattern: String,
    #[serde(default)]
    pub asset_app_tags: Vec<String>,
    #[serde(default = "txn_topic")]
    pub txn_topic: String,
    #[serde(default = "asset_topic")]
    pub asset_topic: String,
    #[serde(default = "broadcast_queue")]
    pub broadcast_queue: String,
    #[serde(default = "metric_namespace")]
    pub metric_namespace: String,
    #[serde(default = "node_timeout_secs")]
    pub node_timeout_secs: u64,
    #[serde(default = "archive_timeout_secs")]
    pub archive_timeout_secs: u64,
    #[serde(default = "reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "database_url")]
    pub database_url: String,
    #[serde(default = "db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "node_rpc_url")]
    pub node_rpc_url: String,
    #[serde(default)]
    pub node_rpc_user: Option<String>,
    #[serde(default)]
    pub node_rpc_password: Option<String>,
    #[serde(default)]
    pub mapi_url: Option<String>,
    #[serde(default)]
    pub mapi_key: Option<String>,
    #[serde(default)]
    pub rest_url: Option<String>,
    #[serde(default = "archive_path")]
    pub archive_path: String,
    #[serde(default = "reconcile_journal")]
    pub reconcile_journal: String,
}
impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            network: Network::default(),
            fee_rate: fee_rate(),
            dust_limit: dust_limit(),
            lease_duration_secs: lease_duration_secs(),
            max_splits: max_splits(),
            order_lock_pattern: order_lock_pattern(),
            asset_app_tags: vec![],
            txn_topic: txn_topic(),
            asset_topic: asset_topic(),
            broadcast_queue: broadcast_queue(),
            metric_namespace: metric_namespace(),
            node_timeout_secs: node_timeout_secs(),
            archive_timeout_secs: archive_timeout_secs(),
            reconcile_interval_secs: reconcile_interval_secs(),
            database_url: database_url(),
            db_max_connections: db_max_connections(),
            node_rpc_url: node_rpc_url(),
            node_rpc_user: None,
            node_rpc_password: None,
            mapi_url: None,
            mapi_key: None,
            rest_url: None,
            archive_path: archive_path(),
            reconcile_journal: reconcile_journal(),
        }
    }
}
impl LedgerConfig {
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            LedgerError::Config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Defaults overlaid with any `LEDGER_*` and service url variables present.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Some(v) = env_parse("LEDGER_NETWORK") {
            self.network = v;
        }
        if let Some(v) = env_parse("LEDGER_FEE_RATE") {
            self.fee_rate = v;
        }
        if let Some(v) = env_parse("LEDGER_DUST_LIMIT") {
            self.dust_limit = v;
        }
        if let Some(v) = env_parse("LEDGER_LEASE_SECS") {
            self.lease_duration_secs = v;
        }
        if let Some(v) = env_parse("LEDGER_MAX_SPLITS") {
            self.max_splits = v;
        }
        if let Ok(v) = env::var("LEDGER_ORDER_LOCK_PATTERN") {
            self.order_lock_pattern = v;
        }
        if let Ok(v) = env::var("LEDGER_ASSET_APPS") {
            self.asset_app_tags = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(v) = env::var("LEDGER_METRIC_NAMESPACE") {
            self.metric_namespace = v;
        }
        if let Some(v) = env_parse("LEDGER_NODE_TIMEOUT_SECS") {
            self.node_timeout_secs = v;
        }
        if let Some(v) = env_parse("LEDGER_ARCHIVE_TIMEOUT_SECS") {
            self.archive_timeout_secs = v;
        }
        if let Ok(v) = env::var("LEDGER_ARCHIVE_PATH") {
            self.archive_path = v;
        }
        if let Ok(v) = env::var("LEDGER_RECONCILE_JOURNAL") {
            self.reconcile_journal = v;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database_url = v;
        }
        if let Ok(v) = env::var("NODE_RPC_URL") {
            self.node_rpc_url = v;
        }
        if let Ok(v) = env::var("NODE_RPC_USER") {
            self.node_rpc_user = Some(v);
        }
        if let Ok(v) = env::var("NODE_RPC_PASSWORD") {
            self.node_rpc_password = Some(v);
        }
        if let Ok(v) = env::var("MAPI_URL") {
            self.mapi_url = Some(v);
        }
        if let Ok(v) = env::var("MAPI_KEY") {
            self.mapi_key = Some(v);
        }
        if let Ok(v) = env::var("REST_URL") {
            self.rest_url = Some(v);
        }
        self
    }

    #[must_use]
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }
    #[must_use]
    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }
    #[must_use]
    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let value = env::var(key).ok()?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparsable {key}={value}");
            None
        }
    }
}

#[test]
fn test_partial_config_uses_defaults() {
    let config: LedgerConfig =
        serde_yaml::from_str("fee_rate: 0.5\nasset_app_tags: [\"app\"]\n").expect("valid yaml");
    assert_eq!(config.fee_rate, 0.5);
    assert_eq!(config.dust_limit, DUST_LIMIT);
    assert_eq!(config.lease_duration(), LEASE_DURATION);
    assert_eq!(config.asset_app_tags, vec!["app".to_string()]);
    assert_eq!(config.network, Network::Main);
}
