use crate::blockchain::sized_bytes::Bytes32;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct TransactionRecord {
    pub txid: Bytes32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub node_ack_time: Option<OffsetDateTime>,
}
impl TransactionRecord {
    #[must_use]
    pub fn new(txid: Bytes32, created_at: OffsetDateTime) -> Self {
        Self {
            txid,
            created_at,
            node_ack_time: None,
        }
    }
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.node_ack_time.is_some()
    }
}
