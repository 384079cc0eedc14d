use std::time::Duration;

/// Outputs at or below this many satoshis are not worth creating.
pub const DUST_LIMIT: u64 = 273;
/// Estimated size of a signature unlock script.
pub const SIG_SIZE: usize = 107;
/// Estimated size of a signed P2PKH input.
pub const INPUT_SIZE: usize = 148;
/// Size of a P2PKH output.
pub const OUTPUT_SIZE: usize = 34;
/// Unlock scripts longer than this are treated as already signed.
pub const SIGNED_SCRIPT_THRESHOLD: usize = 50;
pub const MAX_SPLITS: usize = 100;
pub const LEASE_DURATION: Duration = Duration::from_secs(300);
pub const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FEE_RATE: f64 = 0.25;
pub const FUNDING_ROOT_PATH: &str = "m/0/0";

pub const ALREADY_KNOWN_REJECTIONS: [&str; 4] = [
    "Transaction already known",
    "Transaction already in the mempool",
    "txn-already-known",
    "txn-already-in-mempool",
];

/// Hex prefix of the OP_PUSH_TX preimage check every order-lock contract starts with.
pub const DEFAULT_ORDER_LOCK_PATTERN: &str = "^2097dfd76851bf465e8f715593b217714858bbe9570ff3bd5e33840a34e20ff0262102ba79df5f8ae7604a9830f03c7933028186aede0675a16f025dc4f8be8eec0382201008ce7480da41702918d1ec8e6849ba32b4d65b1e40dc669c31a1e6306b266c";

pub const TXN_TOPIC: &str = "txn";
pub const RUN_PROTOCOL_TAG: &[u8] = b"run";
