use crate::store::LedgerStore;
use dg_utxo_core::blockchain::coin::LeasedCoin;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::Clock;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// Hands out fund coins under a time-boxed lease. Leases are never released
/// explicitly; an abandoned lease lapses on its own.
pub struct CoinAllocator {
    store: Arc<dyn LedgerStore + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
    lease_duration: Duration,
}
impl CoinAllocator {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
        lease_duration: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            lease_duration,
        }
    }

    pub async fn allocate_one(&self, script_hash: &Bytes32) -> Result<LeasedCoin, LedgerError> {
        debug!("Allocating coin for {script_hash}");
        let now = self.clock.now();
        let expiry = now + self.lease_duration;
        match self.store.lease_one(script_hash, now, expiry).await? {
            Some(coin) => {
                info!(
                    "UTXO Selected: {script_hash} {} {} sats until {}",
                    coin.outpoint, coin.amount, coin.lease_expiry
                );
                Ok(coin)
            }
            None => Err(LedgerError::InsufficientFunds {
                script_hash: *script_hash,
            }),
        }
    }
}
