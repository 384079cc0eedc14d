use crate::classifier::{
    classify, derivation_lookup_keys, unsigned_inputs, ClassifiedTransaction, DerivationPaths,
    OrderLockMatcher,
};
use crate::fetch::{archive_key, TransactionFetcher};
use crate::reconcile::ReconciliationQueue;
use crate::store::{DerivationIndex, LedgerStore};
use crate::validator::validate_classified;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::blockchain::transaction::Transaction;
use dg_utxo_core::config::LedgerConfig;
use dg_utxo_core::constants::RUN_PROTOCOL_TAG;
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::{
    ArchiveStore, Clock, NodeSubmitter, Notifier, SubmitOutcome, TransactionCache,
};
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BroadcastStage {
    Decoded,
    Classified,
    Validated,
    Submitted,
    Persisted,
    Notified,
}
impl fmt::Display for BroadcastStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BroadcastStage::Decoded => "decoded",
            BroadcastStage::Classified => "classified",
            BroadcastStage::Validated => "validated",
            BroadcastStage::Submitted => "submitted",
            BroadcastStage::Persisted => "persisted",
            BroadcastStage::Notified => "notified",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BroadcastSettings {
    pub node_timeout: Duration,
    pub archive_timeout: Duration,
    pub txn_topic: String,
    pub asset_topic: String,
    pub asset_app_tags: Vec<String>,
    pub broadcast_queue: String,
    pub metric_namespace: String,
}
impl From<&LedgerConfig> for BroadcastSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            node_timeout: config.node_timeout(),
            archive_timeout: config.archive_timeout(),
            txn_topic: config.txn_topic.clone(),
            asset_topic: config.asset_topic.clone(),
            asset_app_tags: config.asset_app_tags.clone(),
            broadcast_queue: config.broadcast_queue.clone(),
            metric_namespace: config.metric_namespace.clone(),
        }
    }
}

/// Collaborators a [`Broadcaster`] drives.
#[derive(Clone)]
pub struct BroadcastServices {
    pub store: Arc<dyn LedgerStore + Send + Sync>,
    pub derivations: Arc<dyn DerivationIndex + Send + Sync>,
    pub node: Arc<dyn NodeSubmitter + Send + Sync>,
    pub secondary: Option<Arc<dyn NodeSubmitter + Send + Sync>>,
    pub fetcher: Arc<TransactionFetcher>,
    pub archive: Arc<dyn ArchiveStore + Send + Sync>,
    pub cache: Arc<dyn TransactionCache + Send + Sync>,
    pub notifier: Arc<dyn Notifier + Send + Sync>,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

#[derive(Debug)]
pub struct BroadcastReceipt {
    pub txid: Bytes32,
    /// A transaction record already existed, nothing was done.
    pub duplicate: bool,
    /// The node reported the transaction as already known.
    pub already_known: bool,
    notifications: Option<JoinHandle<()>>,
}
impl BroadcastReceipt {
    /// Waits for the best-effort notification tasks to finish.
    pub async fn notified(self) {
        if let Some(handle) = self.notifications {
            if let Err(e) = handle.await {
                warn!("{}: notification task failed: {e}", self.txid);
            }
        }
    }
}

/// Whether an output is a Run protocol data carrier of one of `app_tags`.
#[must_use]
pub fn is_tagged_asset(tx: &Transaction, app_tags: &[String]) -> bool {
    tx.outputs.iter().any(|out| {
        if !out.script_pubkey.is_safe_data_out() {
            return false;
        }
        let Ok(chunks) = out.script_pubkey.chunks() else {
            return false;
        };
        chunks.len() > 5
            && chunks[2].data.as_deref() == Some(RUN_PROTOCOL_TAG)
            && chunks[4]
                .data
                .as_deref()
                .map(|app| app_tags.iter().any(|t| t.as_bytes() == app))
                .unwrap_or(false)
    })
}

pub struct Broadcaster {
    services: BroadcastServices,
    settings: BroadcastSettings,
    order_lock: OrderLockMatcher,
    reconciliation: Arc<ReconciliationQueue>,
}
impl Broadcaster {
    #[must_use]
    pub fn new(
        services: BroadcastServices,
        settings: BroadcastSettings,
        order_lock: OrderLockMatcher,
        reconciliation: Arc<ReconciliationQueue>,
    ) -> Self {
        Self {
            services,
            settings,
            order_lock,
            reconciliation,
        }
    }

    pub fn from_config(
        services: BroadcastServices,
        config: &LedgerConfig,
        reconciliation: Arc<ReconciliationQueue>,
    ) -> Result<Self, LedgerError> {
        Ok(Self::new(
            services,
            BroadcastSettings::from(config),
            OrderLockMatcher::new(&config.order_lock_pattern)?,
            reconciliation,
        ))
    }

    #[must_use]
    pub fn reconciliation(&self) -> &Arc<ReconciliationQueue> {
        &self.reconciliation
    }

    fn stage(txid: &Bytes32, stage: BroadcastStage) {
        debug!("{txid}: {stage}");
    }

    /// Decodes and buckets `tx`, resolving parents of signature-less inputs.
    pub async fn classify(&self, tx: &Transaction) -> Result<ClassifiedTransaction, LedgerError> {
        let txid = tx.txid();
        let (pubkeys, scripts) = derivation_lookup_keys(tx);
        let records = self
            .services
            .derivations
            .derivations(&pubkeys, &scripts)
            .await?;
        debug!("{txid}: {} derivations matched", records.len());
        let paths = DerivationPaths::from_records(&records);
        let unsigned = unsigned_inputs(tx);
        let resolved = join_all(
            unsigned
                .iter()
                .map(|outpoint| self.services.fetcher.parent_script(outpoint)),
        )
        .await;
        let parent_scripts: HashMap<_, _> = unsigned
            .into_iter()
            .zip(resolved)
            .filter_map(|(outpoint, script)| script.map(|s| (outpoint, s)))
            .collect();
        let classified = classify(tx, &paths, &parent_scripts, &self.order_lock);
        if paths.is_empty() && !classified.has_market_effects() {
            info!("No pubkeys or scripts: {txid}");
            return Err(LedgerError::NotTracked { txid });
        }
        Ok(classified)
    }

    pub async fn broadcast(&self, raw: &[u8]) -> Result<BroadcastReceipt, LedgerError> {
        let tx = Transaction::from_raw(raw).map_err(|e| LedgerError::Decode(e.to_string()))?;
        let txid = tx.txid();
        info!("Broadcasting: {txid}");
        Self::stage(&txid, BroadcastStage::Decoded);

        if self.services.store.get_transaction(&txid).await?.is_some() {
            info!("{txid}: already recorded, skipping");
            return Ok(BroadcastReceipt {
                txid,
                duplicate: true,
                already_known: false,
                notifications: None,
            });
        }

        let classified = self.classify(&tx).await?;
        Self::stage(&txid, BroadcastStage::Classified);

        validate_classified(self.services.store.as_ref(), &classified).await?;
        Self::stage(&txid, BroadcastStage::Validated);

        let already_known = match self.submit(&txid, raw).await {
            Ok(already_known) => already_known,
            Err(e) => {
                self.count("broadcast-failure").await;
                return Err(e);
            }
        };
        self.count("broadcast-success").await;
        Self::stage(&txid, BroadcastStage::Submitted);

        let created_at = self.services.clock.now();
        match self.services.store.commit(&classified, created_at).await {
            Ok(()) => {}
            Err(e @ LedgerError::Conflict { .. }) => {
                error!("{txid}: accepted by node but lost the ledger race: {e}");
                return Err(e);
            }
            Err(e) => {
                error!("Error Saving TX Data: {txid}: {e}");
                self.reconciliation.push(classified, created_at, &e);
                return Err(LedgerError::PersistenceFailure {
                    txid,
                    reason: e.to_string(),
                });
            }
        }
        Self::stage(&txid, BroadcastStage::Persisted);

        let notifications = self.notify(tx, raw.to_vec());
        Ok(BroadcastReceipt {
            txid,
            duplicate: false,
            already_known,
            notifications: Some(notifications),
        })
    }

    /// Returns whether the node already had the transaction.
    async fn submit(&self, txid: &Bytes32, raw: &[u8]) -> Result<bool, LedgerError> {
        let node = &self.services.node;
        let outcome = timeout(self.settings.node_timeout, node.submit(raw))
            .await
            .map_err(|_| {
                LedgerError::remote(
                    node.name(),
                    format!("no response within {:?}", self.settings.node_timeout),
                )
            })??;
        match outcome {
            SubmitOutcome::Accepted => Ok(false),
            SubmitOutcome::Rejected(reason) if reason.is_already_known() => {
                info!("Error from sendrawtransaction: {}", reason.message);
                info!("{txid}: error is ignored, continuing");
                Ok(true)
            }
            SubmitOutcome::Rejected(reason) => {
                warn!("{txid}: rejected by {}: {}", node.name(), reason.message);
                Err(LedgerError::remote(node.name(), reason.message))
            }
        }
    }

    async fn count(&self, metric: &str) {
        let name = format!("{}-{metric}", self.settings.metric_namespace);
        if let Err(e) = self.services.notifier.increment_counter(&name).await {
            warn!("Failed to count {name}: {e}");
        }
    }

    fn notify(&self, tx: Transaction, raw: Vec<u8>) -> JoinHandle<()> {
        let services = self.services.clone();
        let settings = self.settings.clone();
        tokio::spawn(async move {
            let txid = tx.txid();
            let txid_hex = txid.to_string();
            let message = serde_json::json!({ "txid": txid_hex }).to_string();
            let archive = async {
                match timeout(
                    settings.archive_timeout,
                    services.archive.put(&archive_key(&txid), raw.clone()),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("{txid}: archive failed: {e}"),
                    Err(_) => warn!("{txid}: archive timed out"),
                }
            };
            let cache = services.cache.set(&txid, &raw);
            let publish = async {
                if let Err(e) = services.notifier.publish(&settings.txn_topic, &txid_hex).await {
                    warn!("{txid}: publish to {} failed: {e}", settings.txn_topic);
                }
                if is_tagged_asset(&tx, &settings.asset_app_tags) {
                    if let Err(e) = services.notifier.publish(&settings.asset_topic, &message).await {
                        warn!("{txid}: publish to {} failed: {e}", settings.asset_topic);
                    }
                }
            };
            let enqueue = async {
                if let Err(e) = services
                    .notifier
                    .enqueue(&settings.broadcast_queue, &message, &txid_hex)
                    .await
                {
                    warn!("{txid}: enqueue failed: {e}");
                }
            };
            let secondary = async {
                let Some(secondary) = &services.secondary else {
                    return;
                };
                match timeout(settings.node_timeout, secondary.submit(&raw)).await {
                    Ok(Ok(SubmitOutcome::Accepted)) => {}
                    Ok(Ok(SubmitOutcome::Rejected(reason))) if reason.is_already_known() => {}
                    Ok(Ok(SubmitOutcome::Rejected(reason))) => {
                        warn!("{txid}: {} rejected: {}", secondary.name(), reason.message);
                        return;
                    }
                    Ok(Err(e)) => {
                        warn!("{txid}: {} failed: {e}", secondary.name());
                        return;
                    }
                    Err(_) => {
                        warn!("{txid}: {} timed out", secondary.name());
                        return;
                    }
                }
                if let Err(e) = services
                    .store
                    .mark_acknowledged(&txid, services.clock.now())
                    .await
                {
                    warn!("{txid}: failed to record acknowledgement: {e}");
                }
            };
            tokio::join!(archive, cache, publish, enqueue, secondary);
            debug!("{txid}: {}", BroadcastStage::Notified);
        })
    }
}
