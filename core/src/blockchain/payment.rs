use crate::blockchain::address::Address;
use crate::blockchain::script::Script;
use crate::blockchain::sized_bytes::Bytes32;
use crate::errors::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A funding request: `amount` satoshis drawn from the coins of `from`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Payment {
    pub from: String,
    pub amount: u64,
}

/// Previous output of an input, as handed to the signing service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct PriorOutput {
    pub script: Script,
    #[serde(rename = "satoshis")]
    pub amount: u64,
}

#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    ScriptHash,
    Address,
    #[default]
    Script,
}
impl FromStr for OwnerType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scripthash" => Ok(OwnerType::ScriptHash),
            "address" => Ok(OwnerType::Address),
            "script" => Ok(OwnerType::Script),
            other => Err(LedgerError::Config(format!("Invalid ownerType: {other}"))),
        }
    }
}
impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerType::ScriptHash => f.write_str("scripthash"),
            OwnerType::Address => f.write_str("address"),
            OwnerType::Script => f.write_str("script"),
        }
    }
}

/// Locking script of a payment source given either as an address or as script hex.
pub fn resolve_source_script(source: &str) -> Result<Script, LedgerError> {
    if let Ok(address) = Address::from_str(source) {
        return Ok(address.to_script());
    }
    Script::from_str(source)
        .map_err(|e| LedgerError::Decode(format!("Payment source {source} is neither address nor script: {e}")))
}

pub fn calculate_script_hash(owner: &str, owner_type: OwnerType) -> Result<Bytes32, LedgerError> {
    match owner_type {
        OwnerType::ScriptHash => {
            Bytes32::from_str(owner).map_err(|e| LedgerError::Decode(format!("{e}")))
        }
        OwnerType::Address => Address::from_str(owner)
            .map(|a| a.to_script().script_hash())
            .map_err(|e| LedgerError::Decode(format!("{e}"))),
        OwnerType::Script => Script::from_str(owner)
            .map(|s| s.script_hash())
            .map_err(|e| LedgerError::Decode(format!("{e}"))),
    }
}

#[test]
fn test_owner_types_resolve_to_same_script_hash() {
    use crate::blockchain::address::Network;
    let address = Address::from_pubkey(&[2u8; 33], Network::Main);
    let script = address.to_script();
    let expected = script.script_hash();
    assert_eq!(
        calculate_script_hash(&address.to_string(), OwnerType::Address).ok(),
        Some(expected)
    );
    assert_eq!(
        calculate_script_hash(&script.to_hex(), OwnerType::Script).ok(),
        Some(expected)
    );
    assert_eq!(
        calculate_script_hash(&expected.to_string(), OwnerType::ScriptHash).ok(),
        Some(expected)
    );
    assert!(calculate_script_hash("zz", OwnerType::Script).is_err());
    assert_eq!(resolve_source_script(&address.to_string()).ok(), Some(script));
}
