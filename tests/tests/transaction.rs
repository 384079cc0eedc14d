#[cfg(test)]
mod tests {
    use dg_utxo_core::blockchain::address::{Address, Network};
    use dg_utxo_core::blockchain::sized_bytes::Bytes32;
    use dg_utxo_core::blockchain::transaction::{Transaction, SEQUENCE_FINAL};
    use dg_utxo_core::constants::{INPUT_SIZE, OUTPUT_SIZE};
    use dg_utxo_tests::fixtures::{outpoint, p2pkh, pubkey, GENESIS_COINBASE, GENESIS_TXID};
    use std::str::FromStr;

    #[test]
    fn test_genesis_coinbase_decodes() {
        let tx = Transaction::from_hex(GENESIS_COINBASE).expect("genesis decodes");
        assert_eq!(tx.version, 1);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.inputs[0].previous_output.txid, Bytes32::default());
        assert_eq!(tx.inputs[0].previous_output.vout, u32::MAX);
        assert_eq!(tx.inputs[0].sequence, SEQUENCE_FINAL);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, 5_000_000_000);
        assert_eq!(tx.lock_time, 0);
        assert_eq!(tx.size(), 204);
        assert_eq!(tx.txid().to_string(), GENESIS_TXID);
        assert_eq!(tx.to_hex(), GENESIS_COINBASE);
    }

    #[test]
    fn test_truncated_transaction_fails() {
        let raw = hex::decode(GENESIS_COINBASE).expect("valid hex");
        assert!(Transaction::from_raw(&raw[..raw.len() - 5]).is_err());
        assert!(Transaction::from_raw(&[]).is_err());
    }

    #[test]
    fn test_p2pkh_sizes_match_estimates() {
        let mut tx = Transaction::default();
        let empty = tx.size();
        tx.add_output(1000, p2pkh(1));
        assert_eq!(tx.size() - empty, OUTPUT_SIZE);
        let mut sig = vec![72];
        sig.extend([0x30; 72]);
        let key = pubkey(1);
        sig.push(key.len() as u8);
        sig.extend(&key);
        let before = tx.size();
        tx.add_input(outpoint(3, 0), sig.into(), SEQUENCE_FINAL);
        // 32 + 4 + 1 + 73 + 34 + 4
        assert_eq!(tx.size() - before, INPUT_SIZE);
    }

    #[test]
    fn test_address_round_trip() {
        let address = Address::from_pubkey(&pubkey(4), Network::Main);
        let parsed = Address::from_str(&address.to_string()).expect("address parses");
        assert_eq!(parsed, address);
        assert!(parsed.to_script().is_pubkey_hash_out());
        assert_eq!(parsed.to_script().pubkey_hash(), Some(address.pubkey_hash));
        assert!(Address::from_str("1BoatSLRHtKNngkdXEeobR76b53LETtpyX").is_err());
    }
}
