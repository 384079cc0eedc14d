use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::payment::PriorOutput;
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::blockchain::transaction::{Transaction, TxOut};
use dg_utxo_core::constants::ARCHIVE_TIMEOUT;
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::{ArchiveStore, RawTransactionSource, TransactionCache};
use futures_util::future::try_join_all;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[must_use]
pub fn archive_key(txid: &Bytes32) -> String {
    format!("txns/{txid}")
}

/// Read-through lookup of raw transactions: cache, node, archive, then an
/// optional public index.
pub struct TransactionFetcher {
    cache: Arc<dyn TransactionCache + Send + Sync>,
    node: Arc<dyn RawTransactionSource + Send + Sync>,
    archive: Arc<dyn ArchiveStore + Send + Sync>,
    fallback: Option<Arc<dyn RawTransactionSource + Send + Sync>>,
    archive_timeout: Duration,
}
impl TransactionFetcher {
    #[must_use]
    pub fn new(
        cache: Arc<dyn TransactionCache + Send + Sync>,
        node: Arc<dyn RawTransactionSource + Send + Sync>,
        archive: Arc<dyn ArchiveStore + Send + Sync>,
    ) -> Self {
        Self {
            cache,
            node,
            archive,
            fallback: None,
            archive_timeout: ARCHIVE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_archive_timeout(mut self, archive_timeout: Duration) -> Self {
        self.archive_timeout = archive_timeout;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn RawTransactionSource + Send + Sync>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub async fn fetch(&self, txid: &Bytes32) -> Result<Vec<u8>, LedgerError> {
        debug!("Fetch: {txid}");
        if let Some(raw) = self.cache.get(txid).await {
            debug!("Found in cache: {txid}");
            return Ok(raw);
        }
        let raw = match self.node.get_raw_transaction(txid).await {
            Ok(Some(raw)) => {
                debug!("Loaded from node: {txid}");
                Some(raw)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Node lookup of {txid} failed: {e}");
                None
            }
        };
        let raw = match raw {
            Some(raw) => Some(raw),
            None => match timeout(self.archive_timeout, self.archive.get(&archive_key(txid))).await {
                Ok(Ok(Some(raw))) => {
                    debug!("Loaded from archive: {txid}");
                    Some(raw)
                }
                Ok(Ok(None)) => None,
                Ok(Err(e)) => {
                    warn!("Archive lookup of {txid} failed: {e}");
                    None
                }
                Err(_) => {
                    warn!("Archive lookup of {txid} timed out after {:?}", self.archive_timeout);
                    None
                }
            },
        };
        let raw = match (raw, &self.fallback) {
            (Some(raw), _) => raw,
            (None, Some(fallback)) => {
                let raw = fallback
                    .get_raw_transaction(txid)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound(format!("Transaction {txid}")))?;
                debug!("Loaded from fallback index: {txid}");
                match timeout(self.archive_timeout, self.archive.put(&archive_key(txid), raw.clone())).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Failed to archive {txid}: {e}"),
                    Err(_) => warn!("Archiving {txid} timed out after {:?}", self.archive_timeout),
                }
                raw
            }
            (None, None) => return Err(LedgerError::NotFound(format!("Transaction {txid}"))),
        };
        self.cache.set(txid, &raw).await;
        Ok(raw)
    }

    pub async fn fetch_transaction(&self, txid: &Bytes32) -> Result<Transaction, LedgerError> {
        let raw = self.fetch(txid).await?;
        let tx = Transaction::from_raw(&raw)
            .map_err(|e| LedgerError::Decode(format!("Stored transaction {txid}: {e}")))?;
        if tx.txid() != *txid {
            return Err(LedgerError::Decode(format!(
                "Transaction fetched for {txid} hashes to {}",
                tx.txid()
            )));
        }
        Ok(tx)
    }

    pub async fn prior_txout(&self, outpoint: &OutPoint) -> Result<TxOut, LedgerError> {
        let parent = self.fetch_transaction(&outpoint.txid).await?;
        parent
            .outputs
            .get(outpoint.vout as usize)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("Output {outpoint}")))
    }

    /// Locking script of the output `outpoint` spends, when it can be found.
    pub async fn parent_script(&self, outpoint: &OutPoint) -> Option<Script> {
        match self.prior_txout(outpoint).await {
            Ok(out) => Some(out.script_pubkey),
            Err(e) => {
                debug!("Parent of {outpoint} unresolved: {e}");
                None
            }
        }
    }

    /// Previous output of every input of `tx`, in input order.
    pub async fn load_parents(&self, tx: &Transaction) -> Result<Vec<PriorOutput>, LedgerError> {
        try_join_all(tx.inputs.iter().map(|input| async move {
            let out = self.prior_txout(&input.previous_output).await?;
            Ok::<_, LedgerError>(PriorOutput {
                script: out.script_pubkey,
                amount: out.value,
            })
        }))
        .await
    }

    pub async fn load_parents_raw(&self, raw: &[u8]) -> Result<Vec<PriorOutput>, LedgerError> {
        let tx = Transaction::from_raw(raw).map_err(|e| LedgerError::Decode(e.to_string()))?;
        self.load_parents(&tx).await
    }
}
