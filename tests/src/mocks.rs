use async_trait::async_trait;
use dashmap::DashMap;
use dg_utxo_core::blockchain::coin::{CoinClass, LeasedCoin, SpentCoin, SpentMark, UnspentCoin};
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::blockchain::transaction_record::TransactionRecord;
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::{
    ArchiveStore, Clock, NodeSubmitter, Notifier, RawTransactionSource, SubmitOutcome,
};
use dg_utxo_ledger::classifier::ClassifiedTransaction;
use dg_utxo_ledger::store::memory::MemoryLedgerStore;
use dg_utxo_ledger::store::LedgerStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use time::OffsetDateTime;

pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}
impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }
    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().expect("clock lock") = now;
    }
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}
impl Default for ManualClock {
    fn default() -> Self {
        Self::new(OffsetDateTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }
}
impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("clock lock")
    }
}

/// Node that answers every submit with a fixed outcome and serves raw transactions it was given.
pub struct MockNode {
    outcome: Mutex<Result<SubmitOutcome, LedgerError>>,
    delay: Option<Duration>,
    pub transactions: DashMap<Bytes32, Vec<u8>>,
    submits: AtomicUsize,
    lookups: AtomicUsize,
}
impl MockNode {
    pub fn accepting() -> Self {
        Self::with_outcome(Ok(SubmitOutcome::Accepted))
    }
    pub fn with_outcome(outcome: Result<SubmitOutcome, LedgerError>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            delay: None,
            transactions: DashMap::new(),
            submits: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
    pub fn set_outcome(&self, outcome: Result<SubmitOutcome, LedgerError>) {
        *self.outcome.lock().expect("outcome lock") = outcome;
    }
    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}
#[async_trait]
impl NodeSubmitter for MockNode {
    fn name(&self) -> &str {
        "mock-node"
    }
    async fn submit(&self, _raw: &[u8]) -> Result<SubmitOutcome, LedgerError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.lock().expect("outcome lock").clone()
    }
}
#[async_trait]
impl RawTransactionSource for MockNode {
    async fn get_raw_transaction(&self, txid: &Bytes32) -> Result<Option<Vec<u8>>, LedgerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.transactions.get(txid).map(|r| r.value().clone()))
    }
}

/// Raw transaction source that counts lookups, used as the public index fallback.
#[derive(Default)]
pub struct MockSource {
    pub transactions: DashMap<Bytes32, Vec<u8>>,
    lookups: AtomicUsize,
}
impl MockSource {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}
#[async_trait]
impl RawTransactionSource for MockSource {
    async fn get_raw_transaction(&self, txid: &Bytes32) -> Result<Option<Vec<u8>>, LedgerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.transactions.get(txid).map(|r| r.value().clone()))
    }
}

/// Archive that answers only after `delay`.
pub struct SlowArchive {
    pub delay: Duration,
    pub entries: DashMap<String, Vec<u8>>,
}
impl SlowArchive {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            entries: DashMap::new(),
        }
    }
}
#[async_trait]
impl ArchiveStore for SlowArchive {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.entries.get(key).map(|r| r.value().clone()))
    }
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub published: Mutex<Vec<(String, String)>>,
    pub enqueued: Mutex<Vec<(String, String, String)>>,
    pub counters: DashMap<String, u64>,
}
impl RecordingNotifier {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).map(|c| *c).unwrap_or_default()
    }
    pub fn topics(&self) -> Vec<String> {
        self.published
            .lock()
            .expect("published lock")
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }
}
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), LedgerError> {
        self.published
            .lock()
            .expect("published lock")
            .push((topic.to_string(), message.to_string()));
        Ok(())
    }
    async fn enqueue(&self, queue: &str, message: &str, dedupe_key: &str) -> Result<(), LedgerError> {
        self.enqueued.lock().expect("enqueued lock").push((
            queue.to_string(),
            message.to_string(),
            dedupe_key.to_string(),
        ));
        Ok(())
    }
    async fn increment_counter(&self, name: &str) -> Result<(), LedgerError> {
        *self.counters.entry(name.to_string()).or_default() += 1;
        Ok(())
    }
}

/// Memory store whose next `failures` commits fail as if the database were down.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryLedgerStore,
    failures: AtomicUsize,
}
impl FlakyStore {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}
#[async_trait]
impl LedgerStore for FlakyStore {
    async fn find_spent(
        &self,
        class: CoinClass,
        outpoints: &[OutPoint],
    ) -> Result<Vec<SpentMark>, LedgerError> {
        self.inner.find_spent(class, outpoints).await
    }
    async fn commit(
        &self,
        classified: &ClassifiedTransaction,
        created_at: OffsetDateTime,
    ) -> Result<(), LedgerError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(LedgerError::Store("connection reset".to_string()));
        }
        self.inner.commit(classified, created_at).await
    }
    async fn get_transaction(&self, txid: &Bytes32) -> Result<Option<TransactionRecord>, LedgerError> {
        self.inner.get_transaction(txid).await
    }
    async fn mark_acknowledged(&self, txid: &Bytes32, at: OffsetDateTime) -> Result<(), LedgerError> {
        self.inner.mark_acknowledged(txid, at).await
    }
    async fn lease_one(
        &self,
        script_hash: &Bytes32,
        now: OffsetDateTime,
        expiry: OffsetDateTime,
    ) -> Result<Option<LeasedCoin>, LedgerError> {
        self.inner.lease_one(script_hash, now, expiry).await
    }
    async fn get_unspent(
        &self,
        class: CoinClass,
        outpoint: &OutPoint,
    ) -> Result<Option<UnspentCoin>, LedgerError> {
        self.inner.get_unspent(class, outpoint).await
    }
    async fn get_spent(
        &self,
        class: CoinClass,
        outpoint: &OutPoint,
    ) -> Result<Option<SpentCoin>, LedgerError> {
        self.inner.get_spent(class, outpoint).await
    }
    async fn unspent_by_script_hash(
        &self,
        class: CoinClass,
        script_hash: &Bytes32,
        limit: usize,
    ) -> Result<Vec<UnspentCoin>, LedgerError> {
        self.inner.unspent_by_script_hash(class, script_hash, limit).await
    }
    async fn unspent_count(&self, class: CoinClass, script_hash: &Bytes32) -> Result<u64, LedgerError> {
        self.inner.unspent_count(class, script_hash).await
    }
    async fn balance(&self, class: CoinClass, script_hash: &Bytes32) -> Result<u64, LedgerError> {
        self.inner.balance(class, script_hash).await
    }
}
