use crate::api::{BlockchainAPI, IndexedUtxo};
use crate::rpc::{get_client, get_text, get_url, parse_json, post};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dg_utxo_core::blockchain::address::Network;
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::sized_bytes::{hex_to_bytes, Bytes32};
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::{RawTransactionSource, TransactionCache};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type InFlight = Shared<BoxFuture<'static, Result<Option<String>, String>>>;

#[derive(Deserialize)]
struct SpendResp {
    txid: Bytes32,
}

pub struct RestBlockchain {
    client: Client,
    pub base_url: String,
    pub additional_headers: Option<HashMap<String, String>>,
    cache: Arc<dyn TransactionCache + Send + Sync>,
    in_flight: DashMap<String, InFlight>,
    requests: AtomicUsize,
}
impl RestBlockchain {
    pub fn new(
        base_url: &str,
        network: Network,
        cache: Arc<dyn TransactionCache + Send + Sync>,
        timeout: Duration,
        additional_headers: &Option<HashMap<String, String>>,
    ) -> Result<Self, Error> {
        Ok(RestBlockchain {
            client: get_client(timeout)?,
            base_url: get_url(base_url, &network.to_string()),
            additional_headers: additional_headers.clone(),
            cache,
            in_flight: DashMap::new(),
            requests: AtomicUsize::new(0),
        })
    }

    /// Requests actually sent, after in-flight sharing.
    #[must_use]
    pub fn requests_sent(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    async fn get_shared(&self, uri: &str) -> Result<Option<String>, Error> {
        let url = get_url(&self.base_url, uri);
        let request = match self.in_flight.entry(url.clone()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                self.requests.fetch_add(1, Ordering::Relaxed);
                let client = self.client.clone();
                let headers = self.additional_headers.clone();
                let target = url.clone();
                let request = async move {
                    get_text(&client, &target, &headers)
                        .await
                        .map_err(|e| e.to_string())
                }
                .boxed()
                .shared();
                e.insert(request.clone());
                request
            }
        };
        let result = request.clone().await;
        self.in_flight.remove_if(&url, |_, r| r.ptr_eq(&request));
        result.map_err(|e| Error::new(ErrorKind::Other, e))
    }
}

#[async_trait]
impl BlockchainAPI for RestBlockchain {
    async fn fetch(&self, txid: &Bytes32) -> Result<Vec<u8>, Error> {
        if let Some(raw) = self.cache.get(txid).await {
            return Ok(raw);
        }
        let hex = self
            .get_shared(&format!("tx/{txid}/hex"))
            .await?
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("Transaction {txid}")))?;
        let raw = hex_to_bytes(hex.trim().trim_matches('"'))
            .map_err(|e| Error::new(ErrorKind::InvalidData, format!("Bad hex for {txid}: {e}")))?;
        debug!("Loaded from index: {txid}");
        self.cache.set(txid, &raw).await;
        Ok(raw)
    }

    async fn utxos(&self, script: &Script) -> Result<Vec<IndexedUtxo>, Error> {
        match self
            .get_shared(&format!("script/{}/unspent", script.script_hash()))
            .await?
        {
            Some(body) => parse_json(&body),
            None => Ok(vec![]),
        }
    }

    async fn spends(&self, txid: &Bytes32, vout: u32) -> Result<Option<Bytes32>, Error> {
        match self.get_shared(&format!("tx/{txid}/out/{vout}/spend")).await? {
            Some(body) => Ok(Some(parse_json::<SpendResp>(&body)?.txid)),
            None => Ok(None),
        }
    }

    async fn broadcast(&self, raw: &[u8]) -> Result<Bytes32, Error> {
        let txid: String = post(
            &self.client,
            &get_url(&self.base_url, "tx/raw"),
            &json!({ "txhex": hex::encode(raw) }),
            &self.additional_headers,
        )
        .await?;
        Bytes32::from_str(&txid)
    }
}

#[async_trait]
impl RawTransactionSource for RestBlockchain {
    async fn get_raw_transaction(&self, txid: &Bytes32) -> Result<Option<Vec<u8>>, LedgerError> {
        match self.fetch(txid).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LedgerError::remote("index", e)),
        }
    }
}
