use crate::blockchain::sized_bytes::Bytes32;
use dg_utxo_serialize::TxSerialize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Error};

/// Coin identity. `txid` is kept in display order, the wire form is byte-reversed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
pub struct OutPoint {
    pub txid: Bytes32,
    pub vout: u32,
}
impl OutPoint {
    #[must_use]
    pub fn new(txid: Bytes32, vout: u32) -> Self {
        Self { txid, vout }
    }
}
impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_o{}", self.txid, self.vout)
    }
}

impl TxSerialize for OutPoint {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.txid.reversed().to_bytes();
        bytes.extend(self.vout.to_bytes());
        bytes
    }
    fn from_bytes<T: AsRef<[u8]>>(bytes: &mut Cursor<T>) -> Result<Self, Error> {
        let txid = Bytes32::from_bytes(bytes)?.reversed();
        let vout = u32::from_bytes(bytes)?;
        Ok(Self { txid, vout })
    }
}
