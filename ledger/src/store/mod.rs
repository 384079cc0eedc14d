pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use crate::classifier::ClassifiedTransaction;
use async_trait::async_trait;
use dg_utxo_core::blockchain::coin::{CoinClass, LeasedCoin, SpentCoin, SpentMark, UnspentCoin};
use dg_utxo_core::blockchain::derivation_record::DerivationRecord;
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::blockchain::transaction_record::TransactionRecord;
use dg_utxo_core::errors::LedgerError;
use time::OffsetDateTime;

#[async_trait]
pub trait LedgerStore {
    /// Spent rows of `class` matching any of `outpoints`, in one lookup.
    async fn find_spent(
        &self,
        class: CoinClass,
        outpoints: &[OutPoint],
    ) -> Result<Vec<SpentMark>, LedgerError>;
    /// Applies every spend, every new coin and the transaction record as one unit.
    /// Fails with `Conflict` and changes nothing when any consumed coin is
    /// already spent by another transaction.
    async fn commit(
        &self,
        classified: &ClassifiedTransaction,
        created_at: OffsetDateTime,
    ) -> Result<(), LedgerError>;
    async fn get_transaction(&self, txid: &Bytes32) -> Result<Option<TransactionRecord>, LedgerError>;
    async fn mark_acknowledged(&self, txid: &Bytes32, at: OffsetDateTime) -> Result<(), LedgerError>;
    /// Leases one fund coin of `script_hash` that is free at `now` until `expiry`.
    async fn lease_one(
        &self,
        script_hash: &Bytes32,
        now: OffsetDateTime,
        expiry: OffsetDateTime,
    ) -> Result<Option<LeasedCoin>, LedgerError>;
    async fn get_unspent(
        &self,
        class: CoinClass,
        outpoint: &OutPoint,
    ) -> Result<Option<UnspentCoin>, LedgerError>;
    async fn get_spent(
        &self,
        class: CoinClass,
        outpoint: &OutPoint,
    ) -> Result<Option<SpentCoin>, LedgerError>;
    async fn unspent_by_script_hash(
        &self,
        class: CoinClass,
        script_hash: &Bytes32,
        limit: usize,
    ) -> Result<Vec<UnspentCoin>, LedgerError>;
    async fn unspent_count(&self, class: CoinClass, script_hash: &Bytes32) -> Result<u64, LedgerError>;
    async fn balance(&self, class: CoinClass, script_hash: &Bytes32) -> Result<u64, LedgerError>;
}

/// Read-only view of key management's derivation records.
#[async_trait]
pub trait DerivationIndex {
    async fn derivations(
        &self,
        pubkeys: &[Vec<u8>],
        scripts: &[Script],
    ) -> Result<Vec<DerivationRecord>, LedgerError>;
}
