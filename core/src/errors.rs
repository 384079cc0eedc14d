use crate::blockchain::coin::CoinClass;
use crate::blockchain::outpoint::OutPoint;
use crate::blockchain::sized_bytes::Bytes32;
use std::io::{Error, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Input to {txid} already spent in {class}: {outpoint} spent in {spent_by}")]
    Conflict {
        class: CoinClass,
        txid: Bytes32,
        outpoint: OutPoint,
        spent_by: Bytes32,
    },
    #[error("Insufficient UTXOS for {script_hash}")]
    InsufficientFunds { script_hash: Bytes32 },
    #[error("Inadequate UTXOs for payer {payer}: short by {shortfall} satoshis")]
    InadequateFunding { payer: String, shortfall: u64 },
    #[error("{service} failure: {reason}")]
    RemoteFailure { service: String, reason: String },
    #[error("Failed to persist {txid} after node acceptance: {reason}")]
    PersistenceFailure { txid: Bytes32, reason: String },
    #[error("Transaction {txid} touches no tracked keys or scripts")]
    NotTracked { txid: Bytes32 },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Config error: {0}")]
    Config(String),
}
impl LedgerError {
    #[must_use]
    pub fn remote(service: &str, reason: impl ToString) -> Self {
        LedgerError::RemoteFailure {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
    /// Permanent errors must not be retried with the same inputs.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            LedgerError::Conflict { .. }
                | LedgerError::InadequateFunding { .. }
                | LedgerError::NotTracked { .. }
                | LedgerError::Decode(_)
        )
    }
}

impl From<LedgerError> for Error {
    fn from(value: LedgerError) -> Self {
        let kind = match &value {
            LedgerError::Conflict { .. } => ErrorKind::AlreadyExists,
            LedgerError::InsufficientFunds { .. } | LedgerError::InadequateFunding { .. } => {
                ErrorKind::InvalidInput
            }
            LedgerError::NotFound(_) | LedgerError::NotTracked { .. } => ErrorKind::NotFound,
            LedgerError::Decode(_) | LedgerError::Config(_) => ErrorKind::InvalidData,
            LedgerError::RemoteFailure { .. }
            | LedgerError::PersistenceFailure { .. }
            | LedgerError::Store(_) => ErrorKind::Other,
        };
        Error::new(kind, value)
    }
}

impl From<Error> for LedgerError {
    fn from(value: Error) -> Self {
        match value.kind() {
            ErrorKind::NotFound => LedgerError::NotFound(value.to_string()),
            ErrorKind::InvalidData | ErrorKind::InvalidInput | ErrorKind::UnexpectedEof => {
                LedgerError::Decode(value.to_string())
            }
            _ => LedgerError::Store(value.to_string()),
        }
    }
}
