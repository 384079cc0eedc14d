#[cfg(test)]
mod tests {
    use dg_utxo_clients::api::BlockchainAPI;
    use dg_utxo_clients::rest::RestBlockchain;
    use dg_utxo_core::blockchain::address::Network;
    use dg_utxo_core::blockchain::sized_bytes::Bytes32;
    use dg_utxo_core::blockchain::transaction::Transaction;
    use dg_utxo_core::traits::services::RawTransactionSource;
    use dg_utxo_ledger::cache::MemoryTxCache;
    use dg_utxo_tests::fixtures::GENESIS_COINBASE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every request after `delay`, with the genesis hex for its txid and 404 otherwise.
    async fn serve(delay: Duration) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut request = vec![];
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    let request = String::from_utf8_lossy(&request).to_string();
                    let genesis = Transaction::from_hex(GENESIS_COINBASE).expect("genesis");
                    let path = format!("/main/tx/{}/hex", genesis.txid());
                    let response = if request.starts_with(&format!("GET {path} ")) {
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            GENESIS_COINBASE.len(),
                            GENESIS_COINBASE
                        )
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_request() {
        let (url, hits) = serve(Duration::from_millis(200)).await;
        let cache = Arc::new(MemoryTxCache::new());
        let client = RestBlockchain::new(&url, Network::Main, cache.clone(), Duration::from_secs(5), &None)
            .expect("client");
        let txid = Transaction::from_hex(GENESIS_COINBASE).expect("genesis").txid();
        let (a, b) = tokio::join!(client.fetch(&txid), client.fetch(&txid));
        let expected = hex::decode(GENESIS_COINBASE).expect("hex");
        assert_eq!(a.expect("first"), expected);
        assert_eq!(b.expect("second"), expected);
        assert_eq!(client.requests_sent(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&txid));

        client.fetch(&txid).await.expect("cached");
        assert_eq!(client.requests_sent(), 1);
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_none() {
        let (url, _) = serve(Duration::ZERO).await;
        let client = RestBlockchain::new(
            &url,
            Network::Main,
            Arc::new(MemoryTxCache::new()),
            Duration::from_secs(5),
            &None,
        )
        .expect("client");
        let missing = client
            .get_raw_transaction(&Bytes32::from([1u8; 32]))
            .await
            .expect("lookup");
        assert!(missing.is_none());
        assert_eq!(client.spends(&Bytes32::from([1u8; 32]), 0).await.expect("spends"), None);
    }
}
