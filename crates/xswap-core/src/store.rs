//! Durable key/value store abstraction with typed, tag-namespaced views.
//!
//! Every map or list lives under a tag (e.g. `.settled`). Keys are laid out
//! as `tag ++ 0x00 ++ encoded key`; list items use the item index as key and
//! keep their length under `tag ++ 0x01`.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::RwLock;

use crate::codec::StoreCodec;
use crate::error::CoreError;

const ENTRY_SEPARATOR: u8 = 0x00;
const LIST_COUNT_SUFFIX: u8 = 0x01;

/// Ordered byte-level key/value store; the only state that survives restarts.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CoreError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), CoreError>;

    fn delete(&self, key: &[u8]) -> Result<(), CoreError>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CoreError>;
}

/// In-memory store for tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> CoreError {
    CoreError::Storage("memory store lock poisoned".into())
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.entries.read().map_err(poisoned)?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), CoreError> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), CoreError> {
        self.entries.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CoreError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

fn entry_prefix(tag: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(tag.len() + 1);
    prefix.extend_from_slice(tag.as_bytes());
    prefix.push(ENTRY_SEPARATOR);
    prefix
}

/// Typed map view over one tag of a [`KvStore`].
pub struct StorageMap<'a, K, V> {
    prefix: Vec<u8>,
    store: &'a dyn KvStore,
    _types: PhantomData<(K, V)>,
}

impl<'a, K: StoreCodec, V: StoreCodec> StorageMap<'a, K, V> {
    pub fn new(tag: &str, store: &'a dyn KvStore) -> Self {
        Self {
            prefix: entry_prefix(tag),
            store,
            _types: PhantomData,
        }
    }

    fn key(&self, key: &K) -> Vec<u8> {
        let mut full = self.prefix.clone();
        full.extend_from_slice(&key.to_bytes());
        full
    }

    pub fn get(&self, key: &K) -> Result<Option<V>, CoreError> {
        self.store
            .get(&self.key(key))?
            .map(|raw| V::from_bytes(&raw))
            .transpose()
    }

    pub fn contains(&self, key: &K) -> Result<bool, CoreError> {
        Ok(self.store.get(&self.key(key))?.is_some())
    }

    pub fn set(&self, key: &K, value: &V) -> Result<(), CoreError> {
        self.store.put(&self.key(key), &value.to_bytes())
    }

    pub fn remove(&self, key: &K) -> Result<(), CoreError> {
        self.store.delete(&self.key(key))
    }

    /// All entries in encoded-key order.
    pub fn entries(&self) -> Result<Vec<(K, V)>, CoreError> {
        self.store
            .scan_prefix(&self.prefix)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_bytes(&k[self.prefix.len()..])?, V::from_bytes(&v)?)))
            .collect()
    }
}

/// Typed, ordered list view over one tag of a [`KvStore`].
pub struct StorageList<'a, V> {
    prefix: Vec<u8>,
    count_key: Vec<u8>,
    store: &'a dyn KvStore,
    _types: PhantomData<V>,
}

impl<'a, V: StoreCodec> StorageList<'a, V> {
    pub fn new(tag: &str, store: &'a dyn KvStore) -> Self {
        let mut count_key = tag.as_bytes().to_vec();
        count_key.push(LIST_COUNT_SUFFIX);
        Self {
            prefix: entry_prefix(tag),
            count_key,
            store,
            _types: PhantomData,
        }
    }

    fn item_key(&self, index: u64) -> Vec<u8> {
        let mut key = self.prefix.clone();
        // Big-endian so byte order matches index order.
        key.extend_from_slice(&index.to_be_bytes());
        key
    }

    pub fn count(&self) -> Result<u64, CoreError> {
        match self.store.get(&self.count_key)? {
            Some(raw) => u64::from_bytes(&raw),
            None => Ok(0),
        }
    }

    fn set_count(&self, count: u64) -> Result<(), CoreError> {
        self.store.put(&self.count_key, &count.to_bytes())
    }

    pub fn get(&self, index: u64) -> Result<V, CoreError> {
        let len = self.count()?;
        if index >= len {
            return Err(CoreError::IndexOutOfBounds { index, len });
        }
        let raw = self
            .store
            .get(&self.item_key(index))?
            .ok_or_else(|| CoreError::Storage(format!("missing list item {}", index)))?;
        V::from_bytes(&raw)
    }

    pub fn push(&self, value: &V) -> Result<u64, CoreError> {
        let index = self.count()?;
        self.store.put(&self.item_key(index), &value.to_bytes())?;
        self.set_count(index + 1)?;
        Ok(index)
    }

    pub fn replace(&self, index: u64, value: &V) -> Result<(), CoreError> {
        let len = self.count()?;
        if index >= len {
            return Err(CoreError::IndexOutOfBounds { index, len });
        }
        self.store.put(&self.item_key(index), &value.to_bytes())
    }

    /// Remove the item at `index`, shifting later items down by one.
    pub fn remove_at(&self, index: u64) -> Result<(), CoreError> {
        let len = self.count()?;
        if index >= len {
            return Err(CoreError::IndexOutOfBounds { index, len });
        }
        for i in index + 1..len {
            if let Some(raw) = self.store.get(&self.item_key(i))? {
                self.store.put(&self.item_key(i - 1), &raw)?;
            }
        }
        self.store.delete(&self.item_key(len - 1))?;
        self.set_count(len - 1)
    }

    pub fn all(&self) -> Result<Vec<V>, CoreError> {
        (0..self.count()?).map(|i| self.get(i)).collect()
    }
}
