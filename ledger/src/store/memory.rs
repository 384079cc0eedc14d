use crate::classifier::ClassifiedTransaction;
use crate::store::{DerivationIndex, LedgerStore};
use crate::validator::check_spent_marks;
use async_trait::async_trait;
use dg_utxo_core::blockchain::coin::{
    CoinClass, CoinExtra, LeasedCoin, SpentCoin, SpentMark, UnspentCoin,
};
use dg_utxo_core::blockchain::derivation_record::DerivationRecord;
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::blockchain::transaction_record::TransactionRecord;
use dg_utxo_core::errors::LedgerError;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct ClassTables {
    unspent: BTreeMap<OutPoint, UnspentCoin>,
    spent: BTreeMap<OutPoint, SpentCoin>,
}

#[derive(Default)]
struct Tables {
    fund: ClassTables,
    asset: ClassTables,
    market: ClassTables,
    transactions: HashMap<Bytes32, TransactionRecord>,
}
impl Tables {
    fn class(&self, class: CoinClass) -> &ClassTables {
        match class {
            CoinClass::Fund => &self.fund,
            CoinClass::Asset => &self.asset,
            CoinClass::Market => &self.market,
        }
    }
    fn class_mut(&mut self, class: CoinClass) -> &mut ClassTables {
        match class {
            CoinClass::Fund => &mut self.fund,
            CoinClass::Asset => &mut self.asset,
            CoinClass::Market => &mut self.market,
        }
    }
    fn spent_marks(&self, class: CoinClass, outpoints: &[OutPoint]) -> Vec<SpentMark> {
        let tables = self.class(class);
        outpoints
            .iter()
            .filter_map(|o| tables.spent.get(o))
            .map(|s| SpentMark {
                outpoint: s.outpoint,
                spend_txid: s.spend_txid,
            })
            .collect()
    }
}

/// Ledger tables held in process. Every commit validates and applies under one lock.
#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
}
impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an unspent coin directly, as an earlier accepted transaction would have.
    pub async fn insert_unspent(&self, class: CoinClass, coin: UnspentCoin) {
        let mut tables = self.tables.lock().await;
        tables.class_mut(class).unspent.insert(coin.outpoint, coin);
    }

    pub async fn unspent_len(&self, class: CoinClass) -> usize {
        self.tables.lock().await.class(class).unspent.len()
    }

    pub async fn spent_len(&self, class: CoinClass) -> usize {
        self.tables.lock().await.class(class).spent.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_spent(
        &self,
        class: CoinClass,
        outpoints: &[OutPoint],
    ) -> Result<Vec<SpentMark>, LedgerError> {
        Ok(self.tables.lock().await.spent_marks(class, outpoints))
    }

    async fn commit(
        &self,
        classified: &ClassifiedTransaction,
        created_at: OffsetDateTime,
    ) -> Result<(), LedgerError> {
        let txid = classified.txid;
        let mut tables = self.tables.lock().await;
        for class in CoinClass::ALL {
            let marks = tables.spent_marks(class, &classified.spent_outpoints(class));
            check_spent_marks(class, &marks, &txid)?;
        }
        for class in CoinClass::ALL {
            let class_tables = tables.class_mut(class);
            for spend in classified.spends(class) {
                if class_tables.spent.contains_key(&spend.outpoint) {
                    continue;
                }
                let unspent = class_tables.unspent.remove(&spend.outpoint);
                let spent = SpentCoin {
                    outpoint: spend.outpoint,
                    script_hash: unspent.as_ref().map(|u| u.script_hash),
                    amount: unspent.as_ref().map(|u| u.amount),
                    spend_txid: txid,
                    pubkey: if class.records_pubkey() {
                        spend.pubkey.clone()
                    } else {
                        None
                    },
                    extra: unspent
                        .map(|u| u.extra)
                        .unwrap_or_else(|| CoinExtra::empty_for(class)),
                };
                class_tables.spent.insert(spend.outpoint, spent);
            }
            for coin in classified.coins(class) {
                if class_tables.spent.contains_key(&coin.outpoint) {
                    continue;
                }
                class_tables
                    .unspent
                    .entry(coin.outpoint)
                    .or_insert_with(|| coin.clone());
            }
        }
        tables
            .transactions
            .entry(txid)
            .or_insert_with(|| TransactionRecord::new(txid, created_at));
        debug!("{txid}: committed to memory ledger");
        Ok(())
    }

    async fn get_transaction(&self, txid: &Bytes32) -> Result<Option<TransactionRecord>, LedgerError> {
        Ok(self.tables.lock().await.transactions.get(txid).cloned())
    }

    async fn mark_acknowledged(&self, txid: &Bytes32, at: OffsetDateTime) -> Result<(), LedgerError> {
        if let Some(record) = self.tables.lock().await.transactions.get_mut(txid) {
            record.node_ack_time = Some(at);
        }
        Ok(())
    }

    async fn lease_one(
        &self,
        script_hash: &Bytes32,
        now: OffsetDateTime,
        expiry: OffsetDateTime,
    ) -> Result<Option<LeasedCoin>, LedgerError> {
        let mut tables = self.tables.lock().await;
        let coin = tables
            .fund
            .unspent
            .values_mut()
            .find(|c| c.script_hash == *script_hash && c.is_leasable(now));
        Ok(coin.map(|coin| {
            coin.lease_expiry = Some(expiry);
            LeasedCoin {
                outpoint: coin.outpoint,
                script_hash: coin.script_hash,
                amount: coin.amount,
                lease_expiry: expiry,
            }
        }))
    }

    async fn get_unspent(
        &self,
        class: CoinClass,
        outpoint: &OutPoint,
    ) -> Result<Option<UnspentCoin>, LedgerError> {
        Ok(self.tables.lock().await.class(class).unspent.get(outpoint).cloned())
    }

    async fn get_spent(
        &self,
        class: CoinClass,
        outpoint: &OutPoint,
    ) -> Result<Option<SpentCoin>, LedgerError> {
        Ok(self.tables.lock().await.class(class).spent.get(outpoint).cloned())
    }

    async fn unspent_by_script_hash(
        &self,
        class: CoinClass,
        script_hash: &Bytes32,
        limit: usize,
    ) -> Result<Vec<UnspentCoin>, LedgerError> {
        Ok(self
            .tables
            .lock()
            .await
            .class(class)
            .unspent
            .values()
            .filter(|c| c.script_hash == *script_hash)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn unspent_count(&self, class: CoinClass, script_hash: &Bytes32) -> Result<u64, LedgerError> {
        Ok(self
            .tables
            .lock()
            .await
            .class(class)
            .unspent
            .values()
            .filter(|c| c.script_hash == *script_hash)
            .count() as u64)
    }

    async fn balance(&self, class: CoinClass, script_hash: &Bytes32) -> Result<u64, LedgerError> {
        Ok(self
            .tables
            .lock()
            .await
            .class(class)
            .unspent
            .values()
            .filter(|c| c.script_hash == *script_hash)
            .map(|c| c.amount)
            .sum())
    }
}

#[derive(Default)]
pub struct MemoryDerivationIndex {
    records: RwLock<Vec<DerivationRecord>>,
}
impl MemoryDerivationIndex {
    #[must_use]
    pub fn new(records: Vec<DerivationRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
    pub async fn insert(&self, record: DerivationRecord) {
        self.records.write().await.push(record);
    }
}
#[async_trait]
impl DerivationIndex for MemoryDerivationIndex {
    async fn derivations(
        &self,
        pubkeys: &[Vec<u8>],
        scripts: &[Script],
    ) -> Result<Vec<DerivationRecord>, LedgerError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| pubkeys.contains(&r.pubkey) || scripts.contains(&r.script))
            .cloned()
            .collect())
    }
}
