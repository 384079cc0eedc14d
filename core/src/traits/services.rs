use crate::blockchain::payment::PriorOutput;
use crate::blockchain::sized_bytes::Bytes32;
use crate::constants::ALREADY_KNOWN_REJECTIONS;
use crate::errors::LedgerError;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Key custody lives outside the ledger. The signer holds the keys for every
/// derivation path the ledger tracks.
#[async_trait]
pub trait TransactionSigner {
    async fn sign(&self, raw: &[u8], prior_outputs: &[PriorOutput]) -> Result<Vec<u8>, LedgerError>;
    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, LedgerError>;
    async fn verify_message(&self, message: &[u8], signature: &[u8]) -> Result<bool, LedgerError>;
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RejectionReason {
    pub code: Option<i64>,
    pub message: String,
}
impl RejectionReason {
    #[must_use]
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
    /// Node already has the transaction, which counts as accepted.
    #[must_use]
    pub fn is_already_known(&self) -> bool {
        ALREADY_KNOWN_REJECTIONS
            .iter()
            .any(|known| self.message.contains(known))
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SubmitOutcome {
    Accepted,
    Rejected(RejectionReason),
}

#[async_trait]
pub trait NodeSubmitter {
    fn name(&self) -> &str;
    /// Transport failures are errors; a node refusing the transaction is a `Rejected` outcome.
    async fn submit(&self, raw: &[u8]) -> Result<SubmitOutcome, LedgerError>;
}

#[async_trait]
pub trait RawTransactionSource {
    async fn get_raw_transaction(&self, txid: &Bytes32) -> Result<Option<Vec<u8>>, LedgerError>;
}

#[async_trait]
pub trait ArchiveStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait Notifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), LedgerError>;
    async fn enqueue(&self, queue: &str, message: &str, dedupe_key: &str) -> Result<(), LedgerError>;
    async fn increment_counter(&self, name: &str) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait TransactionCache {
    async fn get(&self, txid: &Bytes32) -> Option<Vec<u8>>;
    async fn set(&self, txid: &Bytes32, raw: &[u8]);
}

pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[test]
fn test_already_known_reasons() {
    assert!(RejectionReason::new(Some(-27), "Transaction already in the mempool").is_already_known());
    assert!(RejectionReason::new(Some(257), "257: txn-already-known").is_already_known());
    assert!(!RejectionReason::new(Some(-26), "258: txn-mempool-conflict").is_already_known());
}
