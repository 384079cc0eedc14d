use crate::allocator::CoinAllocator;
use crate::fetch::TransactionFetcher;
use dg_utxo_core::blockchain::payment::{resolve_source_script, Payment, PriorOutput};
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::transaction::{Transaction, SEQUENCE_FINAL};
use dg_utxo_core::config::LedgerConfig;
use dg_utxo_core::constants::{
    DEFAULT_FEE_RATE, DUST_LIMIT, INPUT_SIZE, MAX_SPLITS, OUTPUT_SIZE, SIGNED_SCRIPT_THRESHOLD,
    SIG_SIZE,
};
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::utils::fee_for_size;
use log::{debug, info};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct FundedTransaction {
    pub transaction: Transaction,
    pub raw: Vec<u8>,
    /// Estimated size once every input is signed.
    pub size: usize,
    pub total_in: u64,
    pub total_out: u64,
    pub fee: u64,
    /// Previous output of every input, in input order, for the signer.
    pub prior_outputs: Vec<PriorOutput>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FundingSettings {
    pub dust_limit: u64,
    pub max_splits: usize,
    pub default_fee_rate: f64,
}
impl Default for FundingSettings {
    fn default() -> Self {
        Self {
            dust_limit: DUST_LIMIT,
            max_splits: MAX_SPLITS,
            default_fee_rate: DEFAULT_FEE_RATE,
        }
    }
}
impl From<&LedgerConfig> for FundingSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            dust_limit: config.dust_limit,
            max_splits: config.max_splits,
            default_fee_rate: config.fee_rate,
        }
    }
}

fn add_amounts(a: u64, b: u64) -> Result<u64, LedgerError> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::Decode(format!("Amount overflow adding {a} and {b}")))
}

/// Rejects rates that would price a transaction at no fee or nonsense.
pub fn check_fee_rate(fee_rate: f64) -> Result<f64, LedgerError> {
    if fee_rate.is_finite() && fee_rate >= 0.0 {
        Ok(fee_rate)
    } else {
        Err(LedgerError::Config(format!("Invalid fee rate: {fee_rate}")))
    }
}

/// Values of the change outputs paid back to the payer out of `change`.
///
/// Every output costs `ceil(OUTPUT_SIZE * fee_rate)` which comes out of the
/// change. Outputs of `split` satoshis are emitted while more than `split`
/// remains, up to `max_splits` of them, then a single output takes the rest.
/// Nothing at or below `dust` is ever emitted. A `split` at or below `dust`
/// disables splitting.
#[must_use]
pub fn plan_change(change: u64, fee_rate: f64, dust: u64, split: u64, max_splits: usize) -> Vec<u64> {
    let fee_per_output = fee_for_size(OUTPUT_SIZE, fee_rate);
    let split = if split > dust { split } else { 0 };
    let mut outputs = vec![];
    let mut change = change;
    let mut splits = 0usize;
    while change > fee_per_output && change - fee_per_output > dust {
        if split > 0 && change > split && splits < max_splits {
            splits += 1;
            outputs.push(split);
            change = change.saturating_sub(split + fee_per_output);
        } else {
            outputs.push(change - fee_per_output);
            change = 0;
        }
    }
    outputs
}

pub struct FundingEngine {
    allocator: Arc<CoinAllocator>,
    fetcher: Arc<TransactionFetcher>,
    settings: FundingSettings,
}
impl FundingEngine {
    #[must_use]
    pub fn new(
        allocator: Arc<CoinAllocator>,
        fetcher: Arc<TransactionFetcher>,
        settings: FundingSettings,
    ) -> Self {
        Self {
            allocator,
            fetcher,
            settings,
        }
    }

    /// Adds inputs for every payment and, with a `payer`, the inputs covering the
    /// fee plus the payer's change outputs.
    pub async fn apply_payments(
        &self,
        raw: &[u8],
        payments: &[Payment],
        payer: Option<&str>,
        change_split: u64,
        fee_rate: Option<f64>,
    ) -> Result<FundedTransaction, LedgerError> {
        let fee_rate = check_fee_rate(fee_rate.unwrap_or(self.settings.default_fee_rate))?;
        let dust = self.settings.dust_limit;
        let mut tx = Transaction::from_raw(raw).map_err(|e| LedgerError::Decode(e.to_string()))?;
        let txid = tx.txid();
        info!("PAY: {payer:?} {payments:?} {txid} split {change_split} rate {fee_rate}");

        let mut prior_outputs = self.fetcher.load_parents(&tx).await?;
        let mut size = tx.size();
        for input in &tx.inputs {
            if input.script_sig.len() <= SIGNED_SCRIPT_THRESHOLD {
                size += SIG_SIZE;
            }
        }
        let mut total_in = prior_outputs
            .iter()
            .try_fold(0u64, |total, p| add_amounts(total, p.amount))?;
        let mut total_out = tx
            .total_out()
            .ok_or_else(|| LedgerError::Decode(format!("Output values of {txid} overflow")))?;
        let payer_script = payer.map(resolve_source_script).transpose()?;

        for payment in payments {
            let script = resolve_source_script(&payment.from)?;
            let script_hash = script.script_hash();
            let mut allocated = 0u64;
            while allocated < payment.amount {
                let coin = self.allocator.allocate_one(&script_hash).await?;
                tx.add_input(coin.outpoint, Script::unsigned_placeholder(), SEQUENCE_FINAL);
                prior_outputs.push(PriorOutput {
                    script: script.clone(),
                    amount: coin.amount,
                });
                allocated = add_amounts(allocated, coin.amount)?;
                size += INPUT_SIZE;
            }
            total_in = add_amounts(total_in, allocated)?;
            let excess = allocated - payment.amount;
            if payer_script.as_ref() != Some(&script) && excess > dust {
                tx.add_output(excess, script);
                total_out = add_amounts(total_out, excess)?;
                size += OUTPUT_SIZE;
            }
        }

        if let (Some(payer), Some(script)) = (payer, payer_script) {
            let script_hash = script.script_hash();
            while total_in < add_amounts(total_out, fee_for_size(size, fee_rate))? {
                let coin = self.allocator.allocate_one(&script_hash).await?;
                tx.add_input(coin.outpoint, Script::unsigned_placeholder(), SEQUENCE_FINAL);
                prior_outputs.push(PriorOutput {
                    script: script.clone(),
                    amount: coin.amount,
                });
                total_in = add_amounts(total_in, coin.amount)?;
                size += INPUT_SIZE;
            }
            let required = add_amounts(total_out, fee_for_size(size, fee_rate))?;
            debug!("Size: {size} TotalIn: {total_in} TotalOut: {total_out} Required: {required}");
            if total_in < required {
                return Err(LedgerError::InadequateFunding {
                    payer: payer.to_string(),
                    shortfall: required - total_in,
                });
            }
            let change = total_in - required;
            for value in plan_change(
                change,
                fee_rate,
                dust,
                change_split,
                self.settings.max_splits,
            ) {
                tx.add_output(value, script.clone());
                total_out = add_amounts(total_out, value)?;
                size += OUTPUT_SIZE;
            }
        }

        let raw = tx.to_raw();
        let fee = total_in.saturating_sub(total_out);
        info!(
            "Funded {txid}: {} inputs {} outputs size {size} in {total_in} out {total_out} fee {fee}",
            tx.inputs.len(),
            tx.outputs.len()
        );
        Ok(FundedTransaction {
            transaction: tx,
            raw,
            size,
            total_in,
            total_out,
            fee,
            prior_outputs,
        })
    }
}

#[test]
fn test_check_fee_rate() {
    assert_eq!(check_fee_rate(0.25).ok(), Some(0.25));
    assert_eq!(check_fee_rate(0.0).ok(), Some(0.0));
    assert!(matches!(check_fee_rate(-0.5), Err(LedgerError::Config(_))));
    assert!(matches!(check_fee_rate(f64::NAN), Err(LedgerError::Config(_))));
    assert!(matches!(check_fee_rate(f64::INFINITY), Err(LedgerError::Config(_))));
}

#[test]
fn test_add_amounts_overflow() {
    assert_eq!(add_amounts(1, 2).ok(), Some(3));
    assert!(matches!(add_amounts(u64::MAX, 1), Err(LedgerError::Decode(_))));
}

#[test]
fn test_plan_change_single_output() {
    // 9 sats per output at 0.25
    assert_eq!(plan_change(1000, 0.25, DUST_LIMIT, 0, MAX_SPLITS), vec![991]);
    assert_eq!(plan_change(282, 0.25, DUST_LIMIT, 0, MAX_SPLITS), Vec::<u64>::new());
    assert_eq!(plan_change(283, 0.25, DUST_LIMIT, 0, MAX_SPLITS), vec![274]);
}

#[test]
fn test_plan_change_splits() {
    let outputs = plan_change(10_000, 0.25, DUST_LIMIT, 3000, MAX_SPLITS);
    assert_eq!(outputs, vec![3000, 3000, 3000, 964]);
    let capped = plan_change(10_000, 0.25, DUST_LIMIT, 1000, 2);
    assert_eq!(capped, vec![1000, 1000, 7982 - 9]);
    assert!(plan_change(10_000, 0.25, DUST_LIMIT, 100, MAX_SPLITS).len() == 1);
}
