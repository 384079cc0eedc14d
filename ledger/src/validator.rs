use crate::classifier::ClassifiedTransaction;
use crate::store::LedgerStore;
use dg_utxo_core::blockchain::coin::{CoinClass, SpentMark};
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::errors::LedgerError;
use log::{debug, warn};

/// Fails on the first mark left by a transaction other than `txid`.
/// Marks left by `txid` itself are a replay and pass.
pub fn check_spent_marks(
    class: CoinClass,
    marks: &[SpentMark],
    txid: &Bytes32,
) -> Result<(), LedgerError> {
    match marks.iter().find(|m| m.spend_txid != *txid) {
        Some(mark) => {
            warn!(
                "Input to {txid} already spent in {class}: {} spent in {}",
                mark.outpoint, mark.spend_txid
            );
            Err(LedgerError::Conflict {
                class,
                txid: *txid,
                outpoint: mark.outpoint,
                spent_by: mark.spend_txid,
            })
        }
        None => Ok(()),
    }
}

pub async fn validate<S: LedgerStore + Send + Sync + ?Sized>(
    store: &S,
    class: CoinClass,
    outpoints: &[OutPoint],
    txid: &Bytes32,
) -> Result<(), LedgerError> {
    if outpoints.is_empty() {
        return Ok(());
    }
    let marks = store.find_spent(class, outpoints).await?;
    debug!(
        "{txid}: {} of {} {class} inputs already marked spent",
        marks.len(),
        outpoints.len()
    );
    check_spent_marks(class, &marks, txid)
}

pub async fn validate_classified<S: LedgerStore + Send + Sync + ?Sized>(
    store: &S,
    classified: &ClassifiedTransaction,
) -> Result<(), LedgerError> {
    for class in CoinClass::ALL {
        validate(store, class, &classified.spent_outpoints(class), &classified.txid).await?;
    }
    Ok(())
}

#[test]
fn test_replay_marks_pass() {
    let txid = Bytes32::from([1u8; 32]);
    let other = Bytes32::from([2u8; 32]);
    let outpoint = OutPoint::new(Bytes32::from([3u8; 32]), 0);
    let own = SpentMark {
        outpoint,
        spend_txid: txid,
    };
    assert!(check_spent_marks(CoinClass::Fund, &[own], &txid).is_ok());
    let foreign = SpentMark {
        outpoint,
        spend_txid: other,
    };
    match check_spent_marks(CoinClass::Asset, &[own, foreign], &txid) {
        Err(LedgerError::Conflict {
            class, spent_by, ..
        }) => {
            assert_eq!(class, CoinClass::Asset);
            assert_eq!(spent_by, other);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}
