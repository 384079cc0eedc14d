use crate::store::LedgerStore;
use dg_utxo_core::blockchain::coin::{CoinClass, UnspentCoin};
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::payment::{calculate_script_hash, OwnerType};
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::errors::LedgerError;
use std::sync::Arc;

pub const DEFAULT_UTXO_LIMIT: usize = 1000;

/// Owner facing reads over the ledger.
pub struct LedgerQueries {
    store: Arc<dyn LedgerStore + Send + Sync>,
}
impl LedgerQueries {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore + Send + Sync>) -> Self {
        Self { store }
    }

    pub async fn utxos(
        &self,
        owner: &str,
        owner_type: OwnerType,
        limit: Option<usize>,
    ) -> Result<Vec<UnspentCoin>, LedgerError> {
        let script_hash = calculate_script_hash(owner, owner_type)?;
        self.store
            .unspent_by_script_hash(
                CoinClass::Fund,
                &script_hash,
                limit.unwrap_or(DEFAULT_UTXO_LIMIT),
            )
            .await
    }

    pub async fn utxo_count(&self, owner: &str, owner_type: OwnerType) -> Result<u64, LedgerError> {
        let script_hash = calculate_script_hash(owner, owner_type)?;
        self.store.unspent_count(CoinClass::Fund, &script_hash).await
    }

    pub async fn balance(&self, owner: &str, owner_type: OwnerType) -> Result<u64, LedgerError> {
        let script_hash = calculate_script_hash(owner, owner_type)?;
        self.store.balance(CoinClass::Fund, &script_hash).await
    }

    /// Transaction that spent asset output `txid:vout`, if any.
    pub async fn spends(&self, txid: &Bytes32, vout: u32) -> Result<Option<Bytes32>, LedgerError> {
        Ok(self
            .store
            .get_spent(CoinClass::Asset, &OutPoint::new(*txid, vout))
            .await?
            .map(|s| s.spend_txid))
    }
}
