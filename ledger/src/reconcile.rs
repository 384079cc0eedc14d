use crate::classifier::ClassifiedTransaction;
use crate::store::LedgerStore;
use dashmap::DashMap;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::errors::LedgerError;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::select;

/// A commit the node already accepted but the store did not take.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingCommit {
    pub classified: ClassifiedTransaction,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub attempts: u32,
    pub last_error: String,
}

/// Commits awaiting a retry, shared with other processes through a JSON journal.
///
/// Txids this queue resolved are remembered so a merge with the journal does not
/// bring them back.
#[derive(Default)]
pub struct ReconciliationQueue {
    pending: DashMap<Bytes32, PendingCommit>,
    resolved: DashMap<Bytes32, ()>,
}
impl ReconciliationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&self, classified: ClassifiedTransaction, created_at: OffsetDateTime, reason: &LedgerError) {
        let txid = classified.txid;
        warn!("{txid}: queued for reconciliation: {reason}");
        self.resolved.remove(&txid);
        self.pending
            .entry(txid)
            .and_modify(|p| {
                p.attempts += 1;
                p.last_error = reason.to_string();
            })
            .or_insert_with(|| PendingCommit {
                classified,
                created_at,
                attempts: 1,
                last_error: reason.to_string(),
            });
    }
    #[must_use]
    pub fn contains(&self, txid: &Bytes32) -> bool {
        self.pending.contains_key(txid)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
    fn snapshot(&self) -> Vec<PendingCommit> {
        self.pending.iter().map(|e| e.value().clone()).collect()
    }

    fn resolve(&self, txid: &Bytes32) {
        self.pending.remove(txid);
        self.resolved.insert(*txid, ());
    }

    async fn read_journal(path: &Path) -> Result<Vec<PendingCommit>, LedgerError> {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(LedgerError::Store(format!("{}: {e}", path.display()))),
        };
        serde_json::from_slice(&contents)
            .map_err(|e| LedgerError::Decode(format!("{}: {e}", path.display())))
    }

    /// Loads a journal written by [`ReconciliationQueue::save`]. A missing file is an empty queue.
    pub async fn load(path: &Path) -> Result<Self, LedgerError> {
        let queue = Self::default();
        queue.merge(path).await?;
        Ok(queue)
    }

    /// Pulls in journal entries written by other processes since the last read.
    /// Entries this queue resolved are skipped. The higher attempt count wins.
    pub async fn merge(&self, path: &Path) -> Result<usize, LedgerError> {
        let mut added = 0;
        for commit in Self::read_journal(path).await? {
            let txid = commit.classified.txid;
            if self.resolved.contains_key(&txid) {
                continue;
            }
            match self.pending.get_mut(&txid) {
                Some(mut existing) => {
                    if commit.attempts > existing.attempts {
                        *existing = commit;
                    }
                }
                None => {
                    self.pending.insert(txid, commit);
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    /// Merges with the journal on disk then replaces it through a temp file and rename.
    pub async fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::Store(format!("{}: {e}", parent.display())))?;
        }
        self.merge(path).await?;
        let contents = serde_json::to_vec_pretty(&self.snapshot())
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}.tmp", std::process::id()));
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| LedgerError::Store(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| LedgerError::Store(format!("{}: {e}", path.display())))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub committed: usize,
    pub dropped: usize,
    pub remaining: usize,
}

pub struct Reconciler {
    queue: Arc<ReconciliationQueue>,
    store: Arc<dyn LedgerStore + Send + Sync>,
    journal: Option<PathBuf>,
}
impl Reconciler {
    #[must_use]
    pub fn new(queue: Arc<ReconciliationQueue>, store: Arc<dyn LedgerStore + Send + Sync>) -> Self {
        Self {
            queue,
            store,
            journal: None,
        }
    }

    /// Reloads `path` before and saves it after every watched sweep.
    #[must_use]
    pub fn with_journal(mut self, path: PathBuf) -> Self {
        self.journal = Some(path);
        self
    }

    /// Retries every queued commit once.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for pending in self.queue.snapshot() {
            let txid = pending.classified.txid;
            match self.store.commit(&pending.classified, pending.created_at).await {
                Ok(()) => {
                    info!("{txid}: reconciled after {} attempts", pending.attempts);
                    self.queue.resolve(&txid);
                    report.committed += 1;
                }
                Err(e @ LedgerError::Conflict { .. }) => {
                    error!("{txid}: accepted by node but conflicts in ledger, needs manual repair: {e}");
                    self.queue.resolve(&txid);
                    report.dropped += 1;
                }
                Err(e) => {
                    warn!("{txid}: reconciliation attempt failed: {e}");
                    if let Some(mut entry) = self.queue.pending.get_mut(&txid) {
                        entry.attempts += 1;
                        entry.last_error = e.to_string();
                    }
                }
            }
        }
        report.remaining = self.queue.len();
        report
    }

    /// Sweeps every `interval` until `shutdown` resolves.
    pub async fn watch(&self, interval: Duration, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        loop {
            select! {
                _ = &mut shutdown => {
                    info!("Reconciler stopping with {} pending", self.queue.len());
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(journal) = &self.journal {
                        if let Err(e) = self.queue.merge(journal).await {
                            warn!("Failed to reload {}: {e}", journal.display());
                        }
                    }
                    if !self.queue.is_empty() {
                        let report = self.sweep().await;
                        info!("Reconciliation sweep: {report:?}");
                        if let Some(journal) = &self.journal {
                            if let Err(e) = self.queue.save(journal).await {
                                error!("Failed to save {}: {e}", journal.display());
                            }
                        }
                    }
                }
            }
        }
    }
}
