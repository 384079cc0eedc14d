pub mod address;
pub mod coin;
pub mod derivation_record;
pub mod outpoint;
pub mod payment;
pub mod script;
pub mod sized_bytes;
pub mod transaction;
pub mod transaction_record;
