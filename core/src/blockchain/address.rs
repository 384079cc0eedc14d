use crate::blockchain::script::Script;
use crate::blockchain::sized_bytes::Bytes20;
use crate::utils::hash_160;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Error, ErrorKind};
use std::str::FromStr;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Main,
    Test,
    Stn,
}
impl Network {
    #[must_use]
    pub fn pubkey_hash_version(&self) -> u8 {
        match self {
            Network::Main => 0x00,
            Network::Test | Network::Stn => 0x6f,
        }
    }
}
impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            "stn" => Ok(Network::Stn),
            other => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Unknown network: {other}"),
            )),
        }
    }
}
impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Main => write!(f, "main"),
            Network::Test => write!(f, "test"),
            Network::Stn => write!(f, "stn"),
        }
    }
}

/// Base58check pay-to-pubkey-hash address.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Address {
    pub version: u8,
    pub pubkey_hash: Bytes20,
}
impl Address {
    #[must_use]
    pub fn from_pubkey(pubkey: &[u8], network: Network) -> Self {
        Self {
            version: network.pubkey_hash_version(),
            pubkey_hash: hash_160(pubkey),
        }
    }

    #[must_use]
    pub fn to_script(&self) -> Script {
        Script::pay_to_pubkey_hash(&self.pubkey_hash)
    }
}
impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("Invalid address {s}: {e}")))?;
        if decoded.len() != 21 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid address length for {s}: {}", decoded.len()),
            ));
        }
        if decoded[0] != 0x00 && decoded[0] != 0x6f {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Unsupported address version {:#04x}", decoded[0]),
            ));
        }
        Ok(Self {
            version: decoded[0],
            pubkey_hash: Bytes20::try_from(&decoded[1..])?,
        })
    }
}
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.version);
        payload.extend(self.pubkey_hash.as_ref());
        write!(f, "{}", bs58::encode(payload).with_check().into_string())
    }
}
