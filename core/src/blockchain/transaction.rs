use crate::blockchain::outpoint::OutPoint;
use crate::blockchain::script::Script;
use crate::blockchain::sized_bytes::{hex_to_bytes, Bytes32};
use dg_utxo_macros::TxSerial;
use dg_utxo_serialize::{double_hash_256, from_exact_bytes, TxSerialize};
use std::io::{Error, ErrorKind};

pub const SEQUENCE_FINAL: u32 = u32::MAX;

#[derive(TxSerial, Clone, PartialEq, Eq, Debug)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

#[derive(TxSerial, Clone, PartialEq, Eq, Debug)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Script,
}

#[derive(TxSerial, Clone, PartialEq, Eq, Debug)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}
impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: 1,
            inputs: vec![],
            outputs: vec![],
            lock_time: 0,
        }
    }
}
impl Transaction {
    pub fn from_raw(raw: &[u8]) -> Result<Self, Error> {
        from_exact_bytes(raw)
    }

    pub fn from_hex(raw_hex: &str) -> Result<Self, Error> {
        let raw = hex_to_bytes(raw_hex.trim()).map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid transaction hex: {e}"),
            )
        })?;
        Self::from_raw(&raw)
    }

    #[must_use]
    pub fn to_raw(&self) -> Vec<u8> {
        self.to_bytes()
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Double SHA-256 of the serialization in display (reversed) order.
    #[must_use]
    pub fn txid(&self) -> Bytes32 {
        Bytes32::from(double_hash_256(self.to_bytes())).reversed()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    pub fn add_input(&mut self, previous_output: OutPoint, script_sig: Script, sequence: u32) {
        self.inputs.push(TxIn {
            previous_output,
            script_sig,
            sequence,
        });
    }

    pub fn add_output(&mut self, value: u64, script_pubkey: Script) {
        self.outputs.push(TxOut {
            value,
            script_pubkey,
        });
    }

    /// Sum of output values, `None` when it does not fit in a `u64`.
    #[must_use]
    pub fn total_out(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, o| total.checked_add(o.value))
    }
}
