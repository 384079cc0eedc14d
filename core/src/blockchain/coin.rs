use crate::blockchain::outpoint::OutPoint;
use crate::blockchain::sized_bytes::Bytes32;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Independent sub-ledgers. Each variant owns its own unspent/spent table pair.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum CoinClass {
    Fund,
    Asset,
    Market,
}
impl CoinClass {
    pub const ALL: [CoinClass; 3] = [CoinClass::Fund, CoinClass::Asset, CoinClass::Market];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CoinClass::Fund => "fund",
            CoinClass::Asset => "asset",
            CoinClass::Market => "market",
        }
    }
    #[must_use]
    pub fn unspent_table(&self) -> &'static str {
        match self {
            CoinClass::Fund => "fund_txos_unspent",
            CoinClass::Asset => "asset_txos_unspent",
            CoinClass::Market => "market_txos_unspent",
        }
    }
    #[must_use]
    pub fn spent_table(&self) -> &'static str {
        match self {
            CoinClass::Fund => "fund_txos_spent",
            CoinClass::Asset => "asset_txos_spent",
            CoinClass::Market => "market_txos_spent",
        }
    }
    #[must_use]
    pub fn records_pubkey(&self) -> bool {
        !matches!(self, CoinClass::Market)
    }
}
impl fmt::Display for CoinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct AssetExtra {
    pub origin: Option<String>,
    pub kind: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct MarketExtra {
    pub origin: Option<String>,
    pub user_id: Option<String>,
}

/// Class specific columns carried from the unspent row into the spent row.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub enum CoinExtra {
    #[default]
    None,
    Asset(AssetExtra),
    Market(MarketExtra),
}
impl CoinExtra {
    #[must_use]
    pub fn empty_for(class: CoinClass) -> Self {
        match class {
            CoinClass::Fund => CoinExtra::None,
            CoinClass::Asset => CoinExtra::Asset(AssetExtra::default()),
            CoinClass::Market => CoinExtra::Market(MarketExtra::default()),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct UnspentCoin {
    pub outpoint: OutPoint,
    pub script_hash: Bytes32,
    pub amount: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub lease_expiry: Option<OffsetDateTime>,
    pub extra: CoinExtra,
}
impl UnspentCoin {
    #[must_use]
    pub fn new(class: CoinClass, outpoint: OutPoint, script_hash: Bytes32, amount: u64) -> Self {
        Self {
            outpoint,
            script_hash,
            amount,
            lease_expiry: None,
            extra: CoinExtra::empty_for(class),
        }
    }
    /// A coin may be leased when it never was, or its lease lapsed strictly before `now`.
    #[must_use]
    pub fn is_leasable(&self, now: OffsetDateTime) -> bool {
        match self.lease_expiry {
            None => true,
            Some(expiry) => expiry < now,
        }
    }
}

/// Spent row. Amount and script hash are absent when the coin's creation was never observed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SpentCoin {
    pub outpoint: OutPoint,
    pub script_hash: Option<Bytes32>,
    pub amount: Option<u64>,
    pub spend_txid: Bytes32,
    pub pubkey: Option<Vec<u8>>,
    pub extra: CoinExtra,
}

/// An input that consumes a tracked coin.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SpendInput {
    pub outpoint: OutPoint,
    pub pubkey: Option<Vec<u8>>,
}

#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SpentMark {
    pub outpoint: OutPoint,
    pub spend_txid: Bytes32,
}

#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct LeasedCoin {
    pub outpoint: OutPoint,
    pub script_hash: Bytes32,
    pub amount: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub lease_expiry: OffsetDateTime,
}
