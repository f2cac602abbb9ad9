//! Durable swap state.
//!
//! Four tagged collections in the node store are the only source of truth
//! for settlement progress:
//!
//! | tag           | shape                     |
//! |---------------|---------------------------|
//! | `.settled`    | source hash -> dest hash  |
//! | `.pending`    | list of [`PendingFee`]    |
//! | `.inprogress` | source hash -> payout txid (empty before broadcast) |
//! | `.usedrpc`    | source hash -> RPC endpoint used for broadcast |

use std::sync::Arc;

use xswap_core::{CoreError, Hash, KvStore, PendingFee, StorageList, StorageMap};

pub const SETTLED_TAG: &str = ".settled";
pub const PENDING_TAG: &str = ".pending";
pub const IN_PROGRESS_TAG: &str = ".inprogress";
pub const USED_RPC_TAG: &str = ".usedrpc";

#[derive(Clone)]
pub struct SwapState {
    store: Arc<dyn KvStore>,
}

impl SwapState {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn settled(&self) -> StorageMap<'_, Hash, Hash> {
        StorageMap::new(SETTLED_TAG, self.store.as_ref())
    }

    pub fn pending(&self) -> StorageList<'_, PendingFee> {
        StorageList::new(PENDING_TAG, self.store.as_ref())
    }

    pub fn in_progress(&self) -> StorageMap<'_, Hash, Option<String>> {
        StorageMap::new(IN_PROGRESS_TAG, self.store.as_ref())
    }

    pub fn used_rpc(&self) -> StorageMap<'_, Hash, String> {
        StorageMap::new(USED_RPC_TAG, self.store.as_ref())
    }

    /// Fee record for `source`, with its list index.
    pub fn find_pending(&self, source: &Hash) -> Result<Option<(u64, PendingFee)>, CoreError> {
        Ok(self
            .pending()
            .all()?
            .into_iter()
            .enumerate()
            .find(|(_, fee)| fee.source_hash == *source)
            .map(|(i, fee)| (i as u64, fee)))
    }

    /// Destination hash already known locally, from `.settled` or the fee list.
    pub fn known_settlement(&self, source: &Hash) -> Result<Option<Hash>, CoreError> {
        if let Some(hash) = self.settled().get(source)? {
            return Ok(Some(hash));
        }
        Ok(self.find_pending(source)?.map(|(_, fee)| fee.destination_hash))
    }

    /// Complete a swap: record the settlement and drop its claim.
    pub fn finish(&self, source: &Hash, destination: &Hash) -> Result<(), CoreError> {
        self.settled().set(source, destination)?;
        self.in_progress().remove(source)?;
        self.used_rpc().remove(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xswap_core::MemoryStore;

    fn h(b: u8) -> Hash {
        Hash([b; 32])
    }

    fn state() -> SwapState {
        SwapState::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_known_settlement_prefers_settled() {
        let state = state();
        assert_eq!(state.known_settlement(&h(1)).unwrap(), None);

        state.pending().push(&PendingFee::new(h(1), h(2), "eth", 10)).unwrap();
        assert_eq!(state.known_settlement(&h(1)).unwrap(), Some(h(2)));

        state.settled().set(&h(1), &h(3)).unwrap();
        assert_eq!(state.known_settlement(&h(1)).unwrap(), Some(h(3)));
    }

    #[test]
    fn test_find_pending_index() {
        let state = state();
        state.pending().push(&PendingFee::new(h(1), h(2), "eth", 10)).unwrap();
        state.pending().push(&PendingFee::new(h(5), h(6), "neo", 10)).unwrap();

        let (index, fee) = state.find_pending(&h(5)).unwrap().unwrap();
        assert_eq!(index, 1);
        assert_eq!(fee.platform, "neo");
        assert!(state.find_pending(&h(9)).unwrap().is_none());
    }

    #[test]
    fn test_finish_clears_claim() {
        let state = state();
        state.in_progress().set(&h(1), &Some(h(2).to_string())).unwrap();
        state.used_rpc().set(&h(1), &"http://rpc".to_string()).unwrap();

        state.finish(&h(1), &h(2)).unwrap();

        assert_eq!(state.settled().get(&h(1)).unwrap(), Some(h(2)));
        assert!(!state.in_progress().contains(&h(1)).unwrap());
        assert!(!state.used_rpc().contains(&h(1)).unwrap());
    }

    #[test]
    fn test_empty_claim_distinct_from_absent() {
        let state = state();
        state.in_progress().set(&h(1), &None).unwrap();
        assert!(state.in_progress().contains(&h(1)).unwrap());
        assert_eq!(state.in_progress().get(&h(1)).unwrap(), Some(None));
        assert_eq!(state.in_progress().get(&h(2)).unwrap(), None);
    }
}
