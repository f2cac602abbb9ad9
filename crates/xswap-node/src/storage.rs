//! RocksDB storage backend for the xswap node.

use anyhow::Result;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use std::path::Path;

use xswap_core::{CoreError, KvStore};

/// Column family holding swapper and oracle state.
const CF_STATE: &str = "state";

/// RocksDB-backed [`KvStore`].
pub struct RocksStore {
    db: DB,
}

fn storage_error(e: impl std::fmt::Display) -> CoreError {
    CoreError::Storage(e.to_string())
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_STATE, Options::default())];
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn cf(&self) -> Result<&ColumnFamily, CoreError> {
        self.db
            .cf_handle(CF_STATE)
            .ok_or_else(|| storage_error(format!("column family '{}' not found", CF_STATE)))
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CoreError> {
        let cf = self.cf()?;
        self.db.get_cf(&cf, key).map_err(storage_error)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), CoreError> {
        let cf = self.cf()?;
        self.db.put_cf(&cf, key, value).map_err(storage_error)
    }

    fn delete(&self, key: &[u8]) -> Result<(), CoreError> {
        let cf = self.cf()?;
        self.db.delete_cf(&cf, key).map_err(storage_error)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CoreError> {
        let cf = self.cf()?;
        let mut entries = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(storage_error)?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}
