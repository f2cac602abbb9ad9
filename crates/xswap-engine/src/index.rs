use dashmap::DashMap;

use xswap_core::{Address, Hash, PendingSwap};

/// In-memory index of discovered, not-yet-settled swaps.
#[derive(Default)]
pub struct SwapIndex {
    swaps: DashMap<Hash, PendingSwap>,
    by_address: DashMap<Address, Vec<Hash>>,
}

impl SwapIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the swap was already indexed.
    pub fn insert(&self, swap: PendingSwap) -> bool {
        if self.swaps.contains_key(&swap.hash) {
            return false;
        }
        self.by_address
            .entry(swap.destination)
            .or_default()
            .push(swap.hash);
        self.swaps.insert(swap.hash, swap);
        true
    }

    pub fn remove(&self, hash: &Hash) -> Option<PendingSwap> {
        let (_, swap) = self.swaps.remove(hash)?;
        if let Some(mut hashes) = self.by_address.get_mut(&swap.destination) {
            hashes.retain(|h| h != hash);
        }
        self.by_address
            .remove_if(&swap.destination, |_, hashes| hashes.is_empty());
        Some(swap)
    }

    pub fn get(&self, hash: &Hash) -> Option<PendingSwap> {
        self.swaps.get(hash).map(|s| s.value().clone())
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.swaps.contains_key(hash)
    }

    pub fn for_address(&self, address: &Address) -> Vec<PendingSwap> {
        let Some(hashes) = self.by_address.get(address).map(|h| h.value().clone()) else {
            return Vec::new();
        };
        hashes.iter().filter_map(|h| self.get(h)).collect()
    }

    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swap(hash: u8, dest: u8) -> PendingSwap {
        let mut bytes = [dest; Address::LENGTH];
        bytes[0] = Address::USER_KIND;
        PendingSwap {
            platform: "eth".to_string(),
            hash: Hash([hash; 32]),
            source: "0xabc".to_string(),
            destination: Address(bytes),
        }
    }

    #[test]
    fn test_insert_is_idempotent() {
        let index = SwapIndex::new();
        assert!(index.insert(swap(1, 7)));
        assert!(!index.insert(swap(1, 7)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.for_address(&swap(1, 7).destination).len(), 1);
    }

    #[test]
    fn test_lookup_by_destination() {
        let index = SwapIndex::new();
        index.insert(swap(1, 7));
        index.insert(swap(2, 7));
        index.insert(swap(3, 8));

        let mut hashes: Vec<Hash> = index
            .for_address(&swap(0, 7).destination)
            .into_iter()
            .map(|s| s.hash)
            .collect();
        hashes.sort();
        assert_eq!(hashes, vec![Hash([1; 32]), Hash([2; 32])]);
    }

    #[test]
    fn test_remove_cleans_address_entry() {
        let index = SwapIndex::new();
        index.insert(swap(1, 7));
        assert!(index.remove(&Hash([1; 32])).is_some());
        assert!(index.remove(&Hash([1; 32])).is_none());
        assert!(index.is_empty());
        assert!(index.for_address(&swap(1, 7).destination).is_empty());
    }
}
