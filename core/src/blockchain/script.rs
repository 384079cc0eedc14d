use crate::blockchain::sized_bytes::{hex_to_bytes, Bytes20, Bytes32};
use crate::utils::hash_256;
use dg_utxo_macros::TxSerial;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::{Error, ErrorKind};
use std::str::FromStr;

pub const OP_0: u8 = 0x00;
pub const OP_FALSE: u8 = OP_0;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ScriptChunk {
    pub opcode: u8,
    pub data: Option<Vec<u8>>,
}
impl ScriptChunk {
    #[must_use]
    pub fn is_push(&self) -> bool {
        self.data.is_some()
    }
}

#[derive(TxSerial, Clone, PartialEq, Eq, Hash, Default)]
pub struct Script(pub Vec<u8>);

impl Script {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn pay_to_pubkey_hash(pubkey_hash: &Bytes20) -> Self {
        let mut bytes = Vec::with_capacity(25);
        bytes.extend([OP_DUP, OP_HASH160, 20]);
        bytes.extend(pubkey_hash.as_ref());
        bytes.extend([OP_EQUALVERIFY, OP_CHECKSIG]);
        Self(bytes)
    }

    /// Two empty pushes, the unsigned stand-in for a signature unlock.
    #[must_use]
    pub fn unsigned_placeholder() -> Self {
        Self(vec![OP_0, OP_0])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// SHA-256 of the script, byte-reversed, as indexers key it.
    #[must_use]
    pub fn script_hash(&self) -> Bytes32 {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash_256(&self.0));
        bytes.reverse();
        Bytes32::from(bytes)
    }

    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, Error> {
        let bytes = &self.0;
        let mut chunks = vec![];
        let mut pos = 0usize;
        while pos < bytes.len() {
            let opcode = bytes[pos];
            pos += 1;
            let push_len = match opcode {
                1..=0x4b => Some(opcode as usize),
                OP_PUSHDATA1 => Some(read_len(bytes, &mut pos, 1)?),
                OP_PUSHDATA2 => Some(read_len(bytes, &mut pos, 2)?),
                OP_PUSHDATA4 => Some(read_len(bytes, &mut pos, 4)?),
                _ => None,
            };
            match push_len {
                Some(len) => {
                    let end = pos.checked_add(len).filter(|end| *end <= bytes.len()).ok_or_else(|| {
                        Error::new(
                            ErrorKind::InvalidData,
                            format!("Push of {len} bytes at offset {pos} overruns script"),
                        )
                    })?;
                    chunks.push(ScriptChunk {
                        opcode,
                        data: Some(bytes[pos..end].to_vec()),
                    });
                    pos = end;
                }
                None if opcode == OP_0 => chunks.push(ScriptChunk {
                    opcode,
                    data: Some(vec![]),
                }),
                None => chunks.push(ScriptChunk { opcode, data: None }),
            }
        }
        Ok(chunks)
    }

    #[must_use]
    pub fn is_pubkey_hash_out(&self) -> bool {
        let b = &self.0;
        b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == 20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }

    #[must_use]
    pub fn pubkey_hash(&self) -> Option<Bytes20> {
        if self.is_pubkey_hash_out() {
            Bytes20::try_from(&self.0[3..23]).ok()
        } else {
            None
        }
    }

    /// Returns the pushed public key when this is a `<sig> <pubkey>` unlock.
    #[must_use]
    pub fn pubkey_hash_in(&self) -> Option<Vec<u8>> {
        let chunks = self.chunks().ok()?;
        match chunks.as_slice() {
            [sig, pubkey] if sig.is_push() => match &pubkey.data {
                Some(key) if key.len() == 33 || key.len() == 65 => Some(key.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn is_safe_data_out(&self) -> bool {
        match self.0.as_slice() {
            [OP_FALSE, OP_RETURN, ..] => true,
            [OP_RETURN, ..] => true,
            _ => false,
        }
    }

    /// Data pushes of a data-carrier output, in order.
    #[must_use]
    pub fn data_pushes(&self) -> Vec<Vec<u8>> {
        self.chunks()
            .map(|chunks| chunks.into_iter().filter_map(|c| c.data).collect())
            .unwrap_or_default()
    }
}

fn read_len(bytes: &[u8], pos: &mut usize, width: usize) -> Result<usize, Error> {
    if *pos + width > bytes.len() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "Truncated push length in script",
        ));
    }
    let mut len = 0usize;
    for (i, b) in bytes[*pos..*pos + width].iter().enumerate() {
        len |= (*b as usize) << (8 * i);
    }
    *pos += width;
    Ok(len)
}

impl FromStr for Script {
    type Err = Error;

    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        hex_to_bytes(hex)
            .map(Script)
            .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("Invalid script hex: {e}")))
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Script::from_str(&hex).map_err(serde::de::Error::custom)
    }
}
