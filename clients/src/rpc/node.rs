use crate::rpc::{get_client, header_map, parse_json};
use async_trait::async_trait;
use dg_utxo_core::blockchain::sized_bytes::{hex_to_bytes, Bytes32};
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::{
    NodeSubmitter, RawTransactionSource, RejectionReason, SubmitOutcome,
};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Error code a node answers with for unknown transactions.
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

#[derive(Serialize, Debug)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Deserialize, Debug)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

pub struct NodeRpcClient {
    client: Client,
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub additional_headers: Option<HashMap<String, String>>,
    next_id: AtomicU64,
}
impl NodeRpcClient {
    pub fn new(
        url: &str,
        user: Option<String>,
        password: Option<String>,
        timeout: Duration,
        additional_headers: &Option<HashMap<String, String>>,
    ) -> Result<Self, Error> {
        Ok(NodeRpcClient {
            client: get_client(timeout)?,
            url: url.to_string(),
            user,
            password,
            additional_headers: additional_headers.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Outer error is transport, inner error is the node's own answer.
    pub async fn call(&self, method: &str, params: Value) -> Result<Result<Value, RpcError>, Error> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("RPC {method} #{}", request.id);
        let mut builder = self
            .client
            .post(&self.url)
            .headers(header_map(&self.additional_headers)?)
            .json(&request);
        if let Some(user) = &self.user {
            builder = builder.basic_auth(user, self.password.as_ref());
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::new(ErrorKind::ConnectionRefused, format!("{:?}", e)))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;
        // Nodes report RPC errors with a 500 status and a JSON body.
        let parsed: RpcResponse = parse_json(&body).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Bad Status Code: {:?}, {e}", status),
            )
        })?;
        match (parsed.error, parsed.result) {
            (Some(error), _) => Ok(Err(error)),
            (None, Some(result)) => Ok(Ok(result)),
            (None, None) => Ok(Ok(Value::Null)),
        }
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<Result<Value, RpcError>, Error> {
        self.call("sendrawtransaction", json!([hex::encode(raw)])).await
    }

    pub async fn get_raw_transaction_hex(&self, txid: &Bytes32) -> Result<Result<Value, RpcError>, Error> {
        self.call("getrawtransaction", json!([txid.to_string(), false])).await
    }
}

#[async_trait]
impl NodeSubmitter for NodeRpcClient {
    fn name(&self) -> &str {
        "node"
    }
    async fn submit(&self, raw: &[u8]) -> Result<SubmitOutcome, LedgerError> {
        match self
            .send_raw_transaction(raw)
            .await
            .map_err(|e| LedgerError::remote("node", e))?
        {
            Ok(_) => Ok(SubmitOutcome::Accepted),
            Err(e) => Ok(SubmitOutcome::Rejected(RejectionReason::new(
                Some(e.code),
                e.message,
            ))),
        }
    }
}

#[async_trait]
impl RawTransactionSource for NodeRpcClient {
    async fn get_raw_transaction(&self, txid: &Bytes32) -> Result<Option<Vec<u8>>, LedgerError> {
        match self
            .get_raw_transaction_hex(txid)
            .await
            .map_err(|e| LedgerError::remote("node", e))?
        {
            Ok(Value::String(hex)) => hex_to_bytes(&hex)
                .map(Some)
                .map_err(|e| LedgerError::Decode(format!("Node returned bad hex for {txid}: {e}"))),
            Ok(other) => Err(LedgerError::Decode(format!(
                "Unexpected getrawtransaction result for {txid}: {other}"
            ))),
            Err(e) if e.code == RPC_INVALID_ADDRESS_OR_KEY => Ok(None),
            Err(e) => Err(LedgerError::remote("node", e.message)),
        }
    }
}
