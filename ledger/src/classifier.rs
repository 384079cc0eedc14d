use dg_utxo_core::blockchain::coin::{CoinClass, SpendInput, UnspentCoin};
use dg_utxo_core::blockchain::derivation_record::DerivationRecord;
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::blockchain::transaction::Transaction;
use dg_utxo_core::constants::FUNDING_ROOT_PATH;
use dg_utxo_core::errors::LedgerError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Recognizes marketplace escrow scripts by matching their lowercase hex.
#[derive(Clone, Debug)]
pub struct OrderLockMatcher {
    pattern: Regex,
}
impl OrderLockMatcher {
    pub fn new(pattern: &str) -> Result<Self, LedgerError> {
        Regex::new(pattern)
            .map(|pattern| Self { pattern })
            .map_err(|e| LedgerError::Config(format!("Invalid order lock pattern: {e}")))
    }
    #[must_use]
    pub fn is_match(&self, script: &Script) -> bool {
        !script.is_empty() && self.pattern.is_match(&script.to_hex())
    }
}

/// Derivation paths of the keys and scripts a transaction touches.
#[derive(Clone, Debug, Default)]
pub struct DerivationPaths {
    by_pubkey: HashMap<Vec<u8>, String>,
    by_script: HashMap<Script, String>,
}
impl DerivationPaths {
    #[must_use]
    pub fn from_records(records: &[DerivationRecord]) -> Self {
        let mut paths = Self::default();
        for record in records {
            paths
                .by_pubkey
                .insert(record.pubkey.clone(), record.path.clone());
            paths
                .by_script
                .insert(record.script.clone(), record.path.clone());
        }
        paths
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_pubkey.is_empty() && self.by_script.is_empty()
    }
    #[must_use]
    pub fn pubkey_class(&self, pubkey: &[u8]) -> Option<CoinClass> {
        self.by_pubkey.get(pubkey).map(|p| path_class(p))
    }
    #[must_use]
    pub fn script_class(&self, script: &Script) -> Option<CoinClass> {
        self.by_script.get(script).map(|p| path_class(p))
    }
}

fn path_class(path: &str) -> CoinClass {
    if path == FUNDING_ROOT_PATH {
        CoinClass::Fund
    } else {
        CoinClass::Asset
    }
}

/// Ledger effects of one transaction, bucketed by coin class.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct ClassifiedTransaction {
    pub txid: Bytes32,
    pub fund_spends: Vec<SpendInput>,
    pub asset_spends: Vec<SpendInput>,
    pub market_spends: Vec<SpendInput>,
    pub fund_coins: Vec<UnspentCoin>,
    pub asset_coins: Vec<UnspentCoin>,
    pub market_coins: Vec<UnspentCoin>,
}
impl ClassifiedTransaction {
    #[must_use]
    pub fn new(txid: Bytes32) -> Self {
        Self {
            txid,
            fund_spends: vec![],
            asset_spends: vec![],
            market_spends: vec![],
            fund_coins: vec![],
            asset_coins: vec![],
            market_coins: vec![],
        }
    }
    #[must_use]
    pub fn spends(&self, class: CoinClass) -> &[SpendInput] {
        match class {
            CoinClass::Fund => &self.fund_spends,
            CoinClass::Asset => &self.asset_spends,
            CoinClass::Market => &self.market_spends,
        }
    }
    #[must_use]
    pub fn coins(&self, class: CoinClass) -> &[UnspentCoin] {
        match class {
            CoinClass::Fund => &self.fund_coins,
            CoinClass::Asset => &self.asset_coins,
            CoinClass::Market => &self.market_coins,
        }
    }
    #[must_use]
    pub fn spent_outpoints(&self, class: CoinClass) -> Vec<OutPoint> {
        self.spends(class).iter().map(|s| s.outpoint).collect()
    }
    fn spends_mut(&mut self, class: CoinClass) -> &mut Vec<SpendInput> {
        match class {
            CoinClass::Fund => &mut self.fund_spends,
            CoinClass::Asset => &mut self.asset_spends,
            CoinClass::Market => &mut self.market_spends,
        }
    }
    fn coins_mut(&mut self, class: CoinClass) -> &mut Vec<UnspentCoin> {
        match class {
            CoinClass::Fund => &mut self.fund_coins,
            CoinClass::Asset => &mut self.asset_coins,
            CoinClass::Market => &mut self.market_coins,
        }
    }
    #[must_use]
    pub fn has_market_effects(&self) -> bool {
        !self.market_spends.is_empty() || !self.market_coins.is_empty()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        CoinClass::ALL
            .iter()
            .all(|c| self.spends(*c).is_empty() && self.coins(*c).is_empty())
    }
}

/// Public keys of signature unlocks and pay-to-pubkey-hash output scripts, the
/// keys under which the derivation index is queried.
#[must_use]
pub fn derivation_lookup_keys(tx: &Transaction) -> (Vec<Vec<u8>>, Vec<Script>) {
    let pubkeys = tx
        .inputs
        .iter()
        .filter_map(|i| i.script_sig.pubkey_hash_in())
        .collect();
    let scripts = tx
        .outputs
        .iter()
        .filter(|o| o.script_pubkey.is_pubkey_hash_out())
        .map(|o| o.script_pubkey.clone())
        .collect();
    (pubkeys, scripts)
}

/// Inputs without a signature unlock. Only their parent scripts can route them.
#[must_use]
pub fn unsigned_inputs(tx: &Transaction) -> Vec<OutPoint> {
    tx.inputs
        .iter()
        .filter(|i| i.script_sig.pubkey_hash_in().is_none())
        .map(|i| i.previous_output)
        .collect()
}

/// Buckets inputs and outputs of `tx`. Anything unrecognized is left out.
#[must_use]
pub fn classify(
    tx: &Transaction,
    paths: &DerivationPaths,
    parent_scripts: &HashMap<OutPoint, Script>,
    order_lock: &OrderLockMatcher,
) -> ClassifiedTransaction {
    let txid = tx.txid();
    let mut classified = ClassifiedTransaction::new(txid);
    for input in &tx.inputs {
        let outpoint = input.previous_output;
        match input.script_sig.pubkey_hash_in() {
            Some(pubkey) => {
                if let Some(class) = paths.pubkey_class(&pubkey) {
                    classified.spends_mut(class).push(SpendInput {
                        outpoint,
                        pubkey: Some(pubkey),
                    });
                }
            }
            None => {
                let is_market = parent_scripts
                    .get(&outpoint)
                    .map(|s| order_lock.is_match(s))
                    .unwrap_or(false);
                if is_market {
                    classified.market_spends.push(SpendInput {
                        outpoint,
                        pubkey: None,
                    });
                }
            }
        }
    }
    for (vout, output) in tx.outputs.iter().enumerate() {
        let script = &output.script_pubkey;
        if script.is_safe_data_out() {
            continue;
        }
        let class = if script.is_pubkey_hash_out() {
            paths.script_class(script)
        } else if order_lock.is_match(script) {
            Some(CoinClass::Market)
        } else {
            None
        };
        if let Some(class) = class {
            classified.coins_mut(class).push(UnspentCoin::new(
                class,
                OutPoint::new(txid, vout as u32),
                script.script_hash(),
                output.value,
            ));
        }
    }
    classified
}
