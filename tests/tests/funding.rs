#[cfg(test)]
mod tests {
    use dg_utxo_core::blockchain::coin::CoinClass;
    use dg_utxo_core::blockchain::payment::Payment;
    use dg_utxo_core::blockchain::script::Script;
    use dg_utxo_core::blockchain::transaction::{Transaction, SEQUENCE_FINAL};
    use dg_utxo_core::constants::LEASE_DURATION;
    use dg_utxo_core::errors::LedgerError;
    use dg_utxo_core::traits::services::Clock;
    use dg_utxo_core::utils::fee_for_size;
    use dg_utxo_ledger::allocator::CoinAllocator;
    use dg_utxo_ledger::archive::MemoryArchive;
    use dg_utxo_ledger::cache::MemoryTxCache;
    use dg_utxo_ledger::fetch::TransactionFetcher;
    use dg_utxo_ledger::funding::{FundingEngine, FundingSettings};
    use dg_utxo_ledger::store::memory::MemoryLedgerStore;
    use dg_utxo_ledger::store::LedgerStore;
    use dg_utxo_tests::fixtures::{
        address, fund_coin, init_logging, outpoint, p2pkh, pubkey, unlock,
    };
    use dg_utxo_tests::mocks::{ManualClock, MockNode};
    use std::sync::Arc;

    struct Setup {
        store: Arc<MemoryLedgerStore>,
        node: Arc<MockNode>,
        clock: Arc<ManualClock>,
        engine: FundingEngine,
    }

    fn setup() -> Setup {
        init_logging();
        let store = Arc::new(MemoryLedgerStore::new());
        let node = Arc::new(MockNode::accepting());
        let clock = Arc::new(ManualClock::default());
        let fetcher = Arc::new(TransactionFetcher::new(
            Arc::new(MemoryTxCache::new()),
            node.clone(),
            Arc::new(MemoryArchive::new()),
        ));
        let allocator = Arc::new(CoinAllocator::new(store.clone(), clock.clone(), LEASE_DURATION));
        let engine = FundingEngine::new(allocator, fetcher, FundingSettings::default());
        Setup {
            store,
            node,
            clock,
            engine,
        }
    }

    fn assert_balanced(tx: &Transaction, total_in: u64, fee: u64, size: usize) {
        assert_eq!(Some(total_in), tx.total_out().map(|out| out + fee));
        assert!(fee >= fee_for_size(size, 0.25));
    }

    #[tokio::test]
    async fn test_payment_with_excess_and_payer_change() {
        let s = setup();
        s.store
            .insert_unspent(CoinClass::Fund, fund_coin(outpoint(1, 0), &p2pkh(1), 1500))
            .await;
        s.store
            .insert_unspent(CoinClass::Fund, fund_coin(outpoint(2, 0), &p2pkh(2), 10_000))
            .await;
        let mut tx = Transaction::default();
        tx.add_output(1000, p2pkh(3));
        let payments = vec![Payment {
            from: address(1).to_string(),
            amount: 1000,
        }];
        let payer = address(2).to_string();
        let funded = s
            .engine
            .apply_payments(&tx.to_raw(), &payments, Some(&payer), 0, None)
            .await
            .expect("funded");

        let outputs: Vec<(u64, Script)> = funded
            .transaction
            .outputs
            .iter()
            .map(|o| (o.value, o.script_pubkey.clone()))
            .collect();
        assert_eq!(
            outputs,
            vec![(1000, p2pkh(3)), (500, p2pkh(1)), (9897, p2pkh(2))]
        );
        assert_eq!(funded.size, 408);
        assert_eq!(funded.total_in, 11_500);
        assert_eq!(funded.fee, 103);
        assert_balanced(&funded.transaction, funded.total_in, funded.fee, funded.size);
        assert_eq!(funded.prior_outputs.len(), 2);
        assert_eq!(funded.prior_outputs[0].script, p2pkh(1));
        assert_eq!(funded.prior_outputs[1].amount, 10_000);

        let decoded = Transaction::from_raw(&funded.raw).expect("decodes");
        assert_eq!(decoded, funded.transaction);
        assert_eq!(decoded.inputs[0].previous_output, outpoint(1, 0));
        assert_eq!(decoded.inputs[1].previous_output, outpoint(2, 0));
        let leased = s
            .store
            .get_unspent(CoinClass::Fund, &outpoint(2, 0))
            .await
            .unwrap()
            .expect("still unspent");
        assert_eq!(leased.lease_expiry, Some(s.clock.now() + LEASE_DURATION));
    }

    #[tokio::test]
    async fn test_existing_inputs_are_priced() {
        let s = setup();
        let mut parent = Transaction::default();
        parent.add_output(5000, p2pkh(4));
        let parent_txid = parent.txid();
        s.node.transactions.insert(parent_txid, parent.to_raw());
        s.store
            .insert_unspent(CoinClass::Fund, fund_coin(outpoint(2, 0), &p2pkh(2), 600))
            .await;
        let mut tx = Transaction::default();
        tx.add_input(
            dg_utxo_core::blockchain::outpoint::OutPoint::new(parent_txid, 0),
            Script::unsigned_placeholder(),
            SEQUENCE_FINAL,
        );
        tx.add_output(4980, p2pkh(5));
        let payer = address(2).to_string();
        let funded = s
            .engine
            .apply_payments(&tx.to_raw(), &[], Some(&payer), 0, None)
            .await
            .expect("funded");
        assert_eq!(funded.prior_outputs[0].amount, 5000);
        assert_eq!(funded.prior_outputs[0].script, p2pkh(4));
        assert_eq!(funded.total_in, 5600);
        assert_eq!(funded.transaction.outputs.last().map(|o| o.value), Some(525));
        assert_balanced(&funded.transaction, funded.total_in, funded.fee, funded.size);
    }

    #[tokio::test]
    async fn test_signed_inputs_are_not_padded() {
        let s = setup();
        let mut parent = Transaction::default();
        parent.add_output(2000, p2pkh(1));
        s.node.transactions.insert(parent.txid(), parent.to_raw());
        let mut tx = Transaction::default();
        tx.add_input(
            dg_utxo_core::blockchain::outpoint::OutPoint::new(parent.txid(), 0),
            unlock(&pubkey(1)),
            SEQUENCE_FINAL,
        );
        let funded = s
            .engine
            .apply_payments(&tx.to_raw(), &[], None, 0, None)
            .await
            .expect("funded");
        assert_eq!(funded.size, tx.size());
        assert_eq!(funded.fee, 2000);
    }

    #[tokio::test]
    async fn test_change_split() {
        let s = setup();
        s.store
            .insert_unspent(CoinClass::Fund, fund_coin(outpoint(2, 0), &p2pkh(2), 10_000))
            .await;
        let payer = address(2).to_string();
        let funded = s
            .engine
            .apply_payments(&Transaction::default().to_raw(), &[], Some(&payer), 3000, None)
            .await
            .expect("funded");
        let values: Vec<u64> = funded.transaction.outputs.iter().map(|o| o.value).collect();
        assert_eq!(&values[..3], &[3000, 3000, 3000]);
        assert_eq!(values.len(), 4);
        assert!(values[3] > 273);
        assert_balanced(&funded.transaction, funded.total_in, funded.fee, funded.size);
    }

    #[tokio::test]
    async fn test_exhausted_payer_fails() {
        let s = setup();
        s.store
            .insert_unspent(CoinClass::Fund, fund_coin(outpoint(2, 0), &p2pkh(2), 50))
            .await;
        let mut tx = Transaction::default();
        tx.add_output(1000, p2pkh(3));
        let payer = address(2).to_string();
        let result = s
            .engine
            .apply_payments(&tx.to_raw(), &[], Some(&payer), 0, None)
            .await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_unknown_source_fails() {
        let s = setup();
        let payments = vec![Payment {
            from: "not-an-address".to_string(),
            amount: 10,
        }];
        let result = s
            .engine
            .apply_payments(&Transaction::default().to_raw(), &payments, None, 0, None)
            .await;
        assert!(matches!(result, Err(LedgerError::Decode(_))));
    }

    #[tokio::test]
    async fn test_payer_matched_by_script_not_spelling() {
        let s = setup();
        s.store
            .insert_unspent(CoinClass::Fund, fund_coin(outpoint(1, 0), &p2pkh(1), 1500))
            .await;
        let mut tx = Transaction::default();
        tx.add_output(1000, p2pkh(3));
        let payments = vec![Payment {
            from: address(1).to_string(),
            amount: 1000,
        }];
        let payer = p2pkh(1).to_hex();
        let funded = s
            .engine
            .apply_payments(&tx.to_raw(), &payments, Some(&payer), 0, None)
            .await
            .expect("funded");
        let outputs: Vec<(u64, Script)> = funded
            .transaction
            .outputs
            .iter()
            .map(|o| (o.value, o.script_pubkey.clone()))
            .collect();
        assert_eq!(outputs, vec![(1000, p2pkh(3)), (443, p2pkh(1))]);
        assert_balanced(&funded.transaction, funded.total_in, funded.fee, funded.size);
    }

    #[tokio::test]
    async fn test_output_overflow_is_rejected() {
        let s = setup();
        s.store
            .insert_unspent(CoinClass::Fund, fund_coin(outpoint(2, 0), &p2pkh(2), 10_000))
            .await;
        let mut tx = Transaction::default();
        tx.add_output(u64::MAX, p2pkh(3));
        tx.add_output(u64::MAX, p2pkh(3));
        let payer = address(2).to_string();
        let result = s
            .engine
            .apply_payments(&tx.to_raw(), &[], Some(&payer), 0, None)
            .await;
        assert!(matches!(result, Err(LedgerError::Decode(_))));
        let coin = s
            .store
            .get_unspent(CoinClass::Fund, &outpoint(2, 0))
            .await
            .unwrap()
            .expect("unspent");
        assert_eq!(coin.lease_expiry, None);
    }

    #[tokio::test]
    async fn test_invalid_fee_rate_is_rejected() {
        let s = setup();
        s.store
            .insert_unspent(CoinClass::Fund, fund_coin(outpoint(2, 0), &p2pkh(2), 10_000))
            .await;
        let payer = address(2).to_string();
        for rate in [-1.0, f64::NAN] {
            let result = s
                .engine
                .apply_payments(&Transaction::default().to_raw(), &[], Some(&payer), 0, Some(rate))
                .await;
            assert!(matches!(result, Err(LedgerError::Config(_))));
        }
    }
}
