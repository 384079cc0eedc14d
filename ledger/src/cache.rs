use async_trait::async_trait;
use dashmap::DashMap;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::traits::services::TransactionCache;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_TX_CACHE_CAPACITY: usize = 10_000;

/// Raw transactions keyed by txid. Once `capacity` entries are held the oldest
/// insert is evicted first.
pub struct MemoryTxCache {
    entries: DashMap<Bytes32, Vec<u8>>,
    order: Mutex<VecDeque<Bytes32>>,
    capacity: usize,
}
impl Default for MemoryTxCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TX_CACHE_CAPACITY)
    }
}
impl MemoryTxCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
    #[must_use]
    pub fn contains(&self, txid: &Bytes32) -> bool {
        self.entries.contains_key(txid)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
#[async_trait]
impl TransactionCache for MemoryTxCache {
    async fn get(&self, txid: &Bytes32) -> Option<Vec<u8>> {
        self.entries.get(txid).map(|v| v.value().clone())
    }
    async fn set(&self, txid: &Bytes32, raw: &[u8]) {
        if self.entries.insert(*txid, raw.to_vec()).is_some() {
            return;
        }
        let mut order = match self.order.lock() {
            Ok(order) => order,
            Err(poisoned) => poisoned.into_inner(),
        };
        order.push_back(*txid);
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

#[tokio::test]
async fn test_oldest_entries_are_evicted() {
    let cache = MemoryTxCache::with_capacity(2);
    for seed in 1u8..=3 {
        cache.set(&Bytes32::from([seed; 32]), &[seed]).await;
    }
    assert_eq!(cache.len(), 2);
    assert!(!cache.contains(&Bytes32::from([1u8; 32])));
    assert_eq!(cache.get(&Bytes32::from([3u8; 32])).await, Some(vec![3]));
    cache.set(&Bytes32::from([3u8; 32]), &[9]).await;
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&Bytes32::from([3u8; 32])).await, Some(vec![9]));
}
