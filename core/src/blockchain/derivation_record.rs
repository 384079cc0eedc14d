use crate::blockchain::script::Script;
use crate::constants::FUNDING_ROOT_PATH;
use serde::{Deserialize, Serialize};

/// Key path metadata owned by key management. Read-only to the ledger.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct DerivationRecord {
    pub script: Script,
    #[serde(with = "hex::serde")]
    pub pubkey: Vec<u8>,
    pub path: String,
}
impl DerivationRecord {
    #[must_use]
    pub fn is_funding_root(&self) -> bool {
        self.path == FUNDING_ROOT_PATH
    }
}
