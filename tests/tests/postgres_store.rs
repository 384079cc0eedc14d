//! Runs against a live Postgres when `DATABASE_URL` is set, otherwise every test returns early.
#[cfg(test)]
mod tests {
    use dg_utxo_core::blockchain::coin::{CoinClass, SpendInput};
    use dg_utxo_core::blockchain::outpoint::OutPoint;
    use dg_utxo_core::blockchain::script::Script;
    use dg_utxo_core::blockchain::sized_bytes::Bytes32;
    use dg_utxo_core::constants::LEASE_DURATION;
    use dg_utxo_core::errors::LedgerError;
    use dg_utxo_core::utils::hash_256;
    use dg_utxo_ledger::classifier::ClassifiedTransaction;
    use dg_utxo_ledger::store::postgres::PgLedgerStore;
    use dg_utxo_ledger::store::LedgerStore;
    use dg_utxo_tests::fixtures::{fund_coin, init_logging, pubkey};
    use futures_util::future::join_all;
    use log::info;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use time::OffsetDateTime;

    static SEQUENCE: AtomicU64 = AtomicU64::new(0);

    async fn pg_store() -> Option<Arc<PgLedgerStore>> {
        init_logging();
        let Ok(url) = std::env::var("DATABASE_URL") else {
            info!("DATABASE_URL not set, skipping Postgres store test");
            return None;
        };
        let store = PgLedgerStore::connect(&url, 10).await.expect("connect");
        store.migrate().await.expect("migrate");
        Some(Arc::new(store))
    }

    /// Txid unique to this run so tests never see each other's rows.
    fn fresh_txid(tag: &str) -> Bytes32 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let seq = SEQUENCE.fetch_add(1, Ordering::SeqCst);
        let digest = hash_256(format!("{tag}-{}-{nanos}-{seq}", std::process::id()));
        Bytes32::try_from(digest.as_slice()).expect("32 bytes")
    }

    fn fresh_script(tag: &str) -> Script {
        Script::new(fresh_txid(tag).to_vec())
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp")
    }

    /// Funding transaction creating `amounts.len()` coins for `script`.
    fn seed(script: &Script, amounts: &[u64]) -> ClassifiedTransaction {
        let mut classified = ClassifiedTransaction::new(fresh_txid("seed"));
        for (vout, amount) in amounts.iter().enumerate() {
            classified.fund_coins.push(fund_coin(
                OutPoint::new(classified.txid, vout as u32),
                script,
                *amount,
            ));
        }
        classified
    }

    fn spending(inputs: &[OutPoint], change: Option<(&Script, u64)>) -> ClassifiedTransaction {
        let mut classified = ClassifiedTransaction::new(fresh_txid("spend"));
        for input in inputs {
            classified.fund_spends.push(SpendInput {
                outpoint: *input,
                pubkey: Some(pubkey(1)),
            });
        }
        if let Some((script, amount)) = change {
            classified
                .fund_coins
                .push(fund_coin(OutPoint::new(classified.txid, 0), script, amount));
        }
        classified
    }

    #[tokio::test]
    async fn test_pg_commit_replay_and_conflict() {
        let Some(store) = pg_store().await else {
            return;
        };
        let script = fresh_script("owner");
        let funding = seed(&script, &[1000, 2000]);
        store.commit(&funding, now()).await.expect("seed");
        let first = OutPoint::new(funding.txid, 0);
        let second = OutPoint::new(funding.txid, 1);

        let spend = spending(&[first], Some((&script, 900)));
        store.commit(&spend, now()).await.expect("spend");
        assert!(store.get_unspent(CoinClass::Fund, &first).await.unwrap().is_none());
        let spent = store
            .get_spent(CoinClass::Fund, &first)
            .await
            .unwrap()
            .expect("spent row");
        assert_eq!(spent.spend_txid, spend.txid);
        assert_eq!(spent.amount, Some(1000));
        assert_eq!(spent.script_hash, Some(script.script_hash()));
        assert_eq!(spent.pubkey, Some(pubkey(1)));

        // replays are no-ops and never bring a spent coin back
        store.commit(&funding, now()).await.expect("replay seed");
        store.commit(&spend, now()).await.expect("replay spend");
        assert!(store.get_unspent(CoinClass::Fund, &first).await.unwrap().is_none());
        assert_eq!(store.balance(CoinClass::Fund, &script.script_hash()).await.unwrap(), 2900);
        assert_eq!(store.unspent_count(CoinClass::Fund, &script.script_hash()).await.unwrap(), 2);

        let rival = spending(&[second, first], Some((&script, 50)));
        match store.commit(&rival, now()).await {
            Err(LedgerError::Conflict {
                outpoint, spent_by, ..
            }) => {
                assert_eq!(outpoint, first);
                assert_eq!(spent_by, spend.txid);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(store.get_unspent(CoinClass::Fund, &second).await.unwrap().is_some());
        assert!(store.get_spent(CoinClass::Fund, &second).await.unwrap().is_none());
        assert!(store
            .get_unspent(CoinClass::Fund, &OutPoint::new(rival.txid, 0))
            .await
            .unwrap()
            .is_none());
        assert!(store.get_transaction(&rival.txid).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pg_concurrent_leases_are_distinct() {
        let Some(store) = pg_store().await else {
            return;
        };
        let script = fresh_script("leases");
        let script_hash = script.script_hash();
        store
            .commit(&seed(&script, &[500; 8]), now())
            .await
            .expect("seed");
        let expiry = now() + LEASE_DURATION;
        let leases = join_all((0..8).map(|_| {
            let store = store.clone();
            async move { store.lease_one(&script_hash, now(), expiry).await }
        }))
        .await;
        let mut leased = HashSet::new();
        for lease in leases {
            let coin = lease.expect("lease").expect("coin");
            assert_eq!(coin.lease_expiry, expiry);
            assert!(leased.insert(coin.outpoint));
        }
        assert_eq!(leased.len(), 8);
        assert!(store.lease_one(&script_hash, now(), expiry).await.unwrap().is_none());

        // a lease is only free strictly after its expiry
        assert!(store.lease_one(&script_hash, expiry, expiry).await.unwrap().is_none());
        let later = expiry + Duration::from_secs(1);
        let relet = store
            .lease_one(&script_hash, later, later + LEASE_DURATION)
            .await
            .unwrap()
            .expect("coin after expiry");
        assert!(leased.contains(&relet.outpoint));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pg_concurrent_double_spend_has_one_winner() {
        let Some(store) = pg_store().await else {
            return;
        };
        let script = fresh_script("double");
        let funding = seed(&script, &[1000]);
        store.commit(&funding, now()).await.expect("seed");
        let coin = OutPoint::new(funding.txid, 0);
        let a = spending(&[coin], Some((&script, 400)));
        let b = spending(&[coin], Some((&script, 300)));
        let (ra, rb) = tokio::join!(store.commit(&a, now()), store.commit(&b, now()));
        let (winner, loser, lost) = match (ra, rb) {
            (Ok(()), Err(e)) => (&a, &b, e),
            (Err(e), Ok(())) => (&b, &a, e),
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert!(matches!(lost, LedgerError::Conflict { .. }));
        let spent = store
            .get_spent(CoinClass::Fund, &coin)
            .await
            .unwrap()
            .expect("spent row");
        assert_eq!(spent.spend_txid, winner.txid);
        assert!(store.get_transaction(&loser.txid).await.unwrap().is_none());
        assert!(store
            .get_unspent(CoinClass::Fund, &OutPoint::new(loser.txid, 0))
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store.balance(CoinClass::Fund, &script.script_hash()).await.unwrap(),
            winner.fund_coins[0].amount
        );
    }
}
