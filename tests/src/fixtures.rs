use crate::mocks::{ManualClock, MockNode, RecordingNotifier};
use dg_utxo_core::blockchain::address::{Address, Network};
use dg_utxo_core::blockchain::coin::{CoinClass, UnspentCoin};
use dg_utxo_core::blockchain::derivation_record::DerivationRecord;
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::blockchain::transaction::{Transaction, SEQUENCE_FINAL};
use dg_utxo_core::constants::{DEFAULT_ORDER_LOCK_PATTERN, FUNDING_ROOT_PATH};
use dg_utxo_core::traits::services::NodeSubmitter;
use dg_utxo_ledger::archive::MemoryArchive;
use dg_utxo_ledger::broadcast::{BroadcastServices, BroadcastSettings, Broadcaster};
use dg_utxo_ledger::cache::MemoryTxCache;
use dg_utxo_ledger::classifier::OrderLockMatcher;
use dg_utxo_ledger::fetch::TransactionFetcher;
use dg_utxo_ledger::reconcile::ReconciliationQueue;
use dg_utxo_ledger::store::memory::MemoryDerivationIndex;
use dg_utxo_ledger::store::LedgerStore;
use simple_logger::SimpleLogger;
use std::sync::Arc;
use std::time::Duration;

pub const GENESIS_COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";
pub const GENESIS_TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

/// Installs the env driven logger once per test binary.
pub fn init_logging() {
    SimpleLogger::new().env().init().unwrap_or_default();
}

/// Compressed-looking public key filled with `seed`.
pub fn pubkey(seed: u8) -> Vec<u8> {
    let mut key = vec![0x02];
    key.extend([seed; 32]);
    key
}

pub fn address(seed: u8) -> Address {
    Address::from_pubkey(&pubkey(seed), Network::Main)
}

pub fn p2pkh(seed: u8) -> Script {
    address(seed).to_script()
}

/// `<sig> <pubkey>` unlock with a dummy signature.
pub fn unlock(pubkey: &[u8]) -> Script {
    let mut bytes = vec![71];
    bytes.extend([0x30; 71]);
    bytes.push(pubkey.len() as u8);
    bytes.extend(pubkey);
    Script::new(bytes)
}

pub fn outpoint(seed: u8, vout: u32) -> OutPoint {
    OutPoint::new(Bytes32::from([seed; 32]), vout)
}

/// Matches the default order lock prefix, suffix and nothing else.
pub fn order_lock_script() -> Script {
    let hex = "2097dfd76851bf465e8f715593b217714858bbe9570ff3bd5e33840a34e20ff0262102ba79df5f8ae7604a9830f03c7933028186aede0675a16f025dc4f8be8eec0382201008ce7480da41702918d1ec8e6849ba32b4d65b1e40dc669c31a1e6306b266c0000000000006c";
    Script::new(hex::decode(hex).expect("valid hex"))
}

pub fn root_record(seed: u8) -> DerivationRecord {
    DerivationRecord {
        script: p2pkh(seed),
        pubkey: pubkey(seed),
        path: FUNDING_ROOT_PATH.to_string(),
    }
}

pub fn asset_record(seed: u8) -> DerivationRecord {
    DerivationRecord {
        script: p2pkh(seed),
        pubkey: pubkey(seed),
        path: format!("m/1/{seed}"),
    }
}

pub fn fund_coin(outpoint: OutPoint, script: &Script, amount: u64) -> UnspentCoin {
    UnspentCoin::new(CoinClass::Fund, outpoint, script.script_hash(), amount)
}

/// Spends `inputs` owned by `owner` and pays `outputs`.
pub fn spend(owner: u8, inputs: &[OutPoint], outputs: &[(u64, Script)]) -> Transaction {
    let mut tx = Transaction::default();
    for input in inputs {
        tx.add_input(*input, unlock(&pubkey(owner)), SEQUENCE_FINAL);
    }
    for (value, script) in outputs {
        tx.add_output(*value, script.clone());
    }
    tx
}

pub fn test_settings() -> BroadcastSettings {
    BroadcastSettings {
        node_timeout: Duration::from_secs(2),
        archive_timeout: Duration::from_secs(2),
        txn_topic: "txn".to_string(),
        asset_topic: "jig".to_string(),
        asset_app_tags: vec!["demo".to_string()],
        broadcast_queue: "broadcast".to_string(),
        metric_namespace: "ledger".to_string(),
    }
}

/// A broadcaster over in-memory collaborators, each kept for inspection.
pub struct Harness {
    pub store: Arc<dyn LedgerStore + Send + Sync>,
    pub derivations: Arc<MemoryDerivationIndex>,
    pub node: Arc<MockNode>,
    pub archive: Arc<MemoryArchive>,
    pub cache: Arc<MemoryTxCache>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub fetcher: Arc<TransactionFetcher>,
    pub queue: Arc<ReconciliationQueue>,
    pub broadcaster: Broadcaster,
}
impl Harness {
    pub fn new(
        store: Arc<dyn LedgerStore + Send + Sync>,
        records: Vec<DerivationRecord>,
        node: MockNode,
    ) -> Self {
        Self::with_secondary(store, records, node, None)
    }

    pub fn with_secondary(
        store: Arc<dyn LedgerStore + Send + Sync>,
        records: Vec<DerivationRecord>,
        node: MockNode,
        secondary: Option<Arc<dyn NodeSubmitter + Send + Sync>>,
    ) -> Self {
        init_logging();
        let derivations = Arc::new(MemoryDerivationIndex::new(records));
        let node = Arc::new(node);
        let archive = Arc::new(MemoryArchive::new());
        let cache = Arc::new(MemoryTxCache::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::default());
        let fetcher = Arc::new(TransactionFetcher::new(
            cache.clone(),
            node.clone(),
            archive.clone(),
        ));
        let queue = Arc::new(ReconciliationQueue::new());
        let services = BroadcastServices {
            store: store.clone(),
            derivations: derivations.clone(),
            node: node.clone(),
            secondary,
            fetcher: fetcher.clone(),
            archive: archive.clone(),
            cache: cache.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
        };
        let order_lock = OrderLockMatcher::new(DEFAULT_ORDER_LOCK_PATTERN).expect("valid pattern");
        let broadcaster = Broadcaster::new(services, test_settings(), order_lock, queue.clone());
        Self {
            store,
            derivations,
            node,
            archive,
            cache,
            notifier,
            clock,
            fetcher,
            queue,
            broadcaster,
        }
    }
}
