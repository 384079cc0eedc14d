#[cfg(test)]
mod tests {
    use dg_utxo_core::blockchain::coin::CoinClass;
    use dg_utxo_core::constants::LEASE_DURATION;
    use dg_utxo_core::errors::LedgerError;
    use dg_utxo_core::traits::services::Clock;
    use dg_utxo_ledger::allocator::CoinAllocator;
    use dg_utxo_ledger::store::memory::MemoryLedgerStore;
    use dg_utxo_ledger::store::LedgerStore;
    use dg_utxo_tests::fixtures::{fund_coin, outpoint, p2pkh};
    use dg_utxo_tests::mocks::ManualClock;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    async fn allocator_with(coins: u8) -> (Arc<CoinAllocator>, Arc<MemoryLedgerStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryLedgerStore::new());
        for seed in 0..coins {
            store
                .insert_unspent(
                    CoinClass::Fund,
                    fund_coin(outpoint(seed, 0), &p2pkh(1), 1000 + seed as u64),
                )
                .await;
        }
        let clock = Arc::new(ManualClock::default());
        let allocator = Arc::new(CoinAllocator::new(store.clone(), clock.clone(), LEASE_DURATION));
        (allocator, store, clock)
    }

    #[tokio::test]
    async fn test_no_coins_is_insufficient() {
        let (allocator, _, _) = allocator_with(0).await;
        let script_hash = p2pkh(1).script_hash();
        match allocator.allocate_one(&script_hash).await {
            Err(LedgerError::InsufficientFunds { script_hash: missing }) => {
                assert_eq!(missing, script_hash)
            }
            other => panic!("expected insufficient funds, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_owners_coins_are_not_leased() {
        let (allocator, _, _) = allocator_with(3).await;
        assert!(allocator.allocate_one(&p2pkh(2).script_hash()).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_distinct() {
        let (allocator, store, clock) = allocator_with(8).await;
        let script_hash = p2pkh(1).script_hash();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.allocate_one(&script_hash).await })
            })
            .collect();
        let mut leased = HashSet::new();
        for handle in handles {
            let coin = handle.await.expect("task").expect("coin");
            assert_eq!(coin.lease_expiry, clock.now() + LEASE_DURATION);
            assert!(leased.insert(coin.outpoint));
        }
        assert_eq!(leased.len(), 8);
        assert!(allocator.allocate_one(&script_hash).await.is_err());
        let coin = store
            .get_unspent(CoinClass::Fund, &outpoint(0, 0))
            .await
            .unwrap()
            .expect("coin");
        assert_eq!(coin.lease_expiry, Some(clock.now() + LEASE_DURATION));
    }

    #[tokio::test]
    async fn test_lease_lapses_strictly_after_expiry() {
        let (allocator, _, clock) = allocator_with(1).await;
        let script_hash = p2pkh(1).script_hash();
        let first = allocator.allocate_one(&script_hash).await.expect("first lease");
        clock.advance(Duration::from_secs(120));
        assert!(allocator.allocate_one(&script_hash).await.is_err());
        clock.set(first.lease_expiry);
        assert!(allocator.allocate_one(&script_hash).await.is_err());
        clock.advance(Duration::from_secs(1));
        let second = allocator.allocate_one(&script_hash).await.expect("lapsed lease");
        assert_eq!(second.outpoint, first.outpoint);
        assert_eq!(second.lease_expiry, first.lease_expiry + Duration::from_secs(1) + LEASE_DURATION);
    }
}
