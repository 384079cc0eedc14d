use async_trait::async_trait;
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use serde::{Deserialize, Serialize};
use std::io::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedUtxo {
    pub tx_hash: Bytes32,
    pub tx_pos: u32,
    pub value: u64,
    #[serde(default)]
    pub height: Option<u32>,
}
impl IndexedUtxo {
    #[must_use]
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_hash, self.tx_pos)
    }
}

/// Remote chain index. Reads are cached, concurrent identical reads share one request.
#[async_trait]
pub trait BlockchainAPI {
    async fn fetch(&self, txid: &Bytes32) -> Result<Vec<u8>, Error>;
    async fn utxos(&self, script: &Script) -> Result<Vec<IndexedUtxo>, Error>;
    async fn spends(&self, txid: &Bytes32, vout: u32) -> Result<Option<Bytes32>, Error>;
    async fn broadcast(&self, raw: &[u8]) -> Result<Bytes32, Error>;
}
