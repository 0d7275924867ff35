//! RocksDB store with one column family per engine component.

use crate::error::StorageError;
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteOptions, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

const GENERATION_KEY: &[u8] = b"generation";

/// Column families making up the persisted engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    /// Ledger accounts: address -> balances, stake, delegation, checkpoints
    Accounts,
    /// Reputation records: address -> raw scores per category
    Reputation,
    /// Proposals: id -> proposal with its receipts
    Proposals,
    /// Treasury book and role registry
    Treasury,
    /// Component headers and the commit counter
    Metadata,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Accounts => "accounts",
            Column::Reputation => "reputation",
            Column::Proposals => "proposals",
            Column::Treasury => "treasury",
            Column::Metadata => "metadata",
        }
    }

    pub fn all() -> [Column; 5] {
        [
            Column::Accounts,
            Column::Reputation,
            Column::Proposals,
            Column::Treasury,
            Column::Metadata,
        ]
    }
}

/// Store tuning options.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Block cache size in MB
    pub cache_size_mb: usize,
    /// Max open files
    pub max_open_files: i32,
    /// Compression type
    pub compression: Compression,
    /// Fsync every commit before acknowledging it
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_size_mb: 32,
            max_open_files: 256,
            compression: Compression::Lz4,
            sync_writes: true,
        }
    }
}

/// Compression type for stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    fn to_rocksdb(self) -> rocksdb::DBCompressionType {
        match self {
            Compression::None => rocksdb::DBCompressionType::None,
            Compression::Snappy => rocksdb::DBCompressionType::Snappy,
            Compression::Lz4 => rocksdb::DBCompressionType::Lz4,
            Compression::Zstd => rocksdb::DBCompressionType::Zstd,
        }
    }
}

/// Durable store; every commit bumps a monotonically increasing generation.
pub struct StateStore {
    db: Arc<DB>,
    generation: RwLock<u64>,
    sync_writes: bool,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("path", &self.db.path())
            .field("generation", &self.generation())
            .finish()
    }
}

impl StateStore {
    /// Open (or create) a store at `path` with default options.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::open_with(path, &StoreConfig::default())
    }

    pub fn open_with(path: &Path, config: &StoreConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);

        let cache = rocksdb::Cache::new_lru_cache(config.cache_size_mb * 1024 * 1024);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        opts.set_block_based_table_factory(&block_opts);
        opts.set_compression_type(config.compression.to_rocksdb());

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = Column::all()
            .into_iter()
            .map(|cf| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(config.compression.to_rocksdb());
                ColumnFamilyDescriptor::new(cf.name(), cf_opts)
            })
            .collect();

        let db = Arc::new(DB::open_cf_descriptors(&opts, path, cf_descriptors)?);

        let generation = {
            let cf = db
                .cf_handle(Column::Metadata.name())
                .ok_or_else(|| StorageError::InvalidColumnFamily(Column::Metadata.name().to_string()))?;
            match db.get_cf(cf, GENERATION_KEY)? {
                Some(bytes) => decode_generation(&bytes)?,
                None => 0,
            }
        };

        tracing::debug!("Opened state store at {:?} (generation {})", path, generation);

        Ok(Self {
            db,
            generation: RwLock::new(generation),
            sync_writes: config.sync_writes,
        })
    }

    /// Latest committed generation; 0 means nothing was ever committed.
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    pub fn is_empty(&self) -> bool {
        self.generation() == 0
    }

    fn handle(&self, column: Column) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(column.name())
            .ok_or_else(|| StorageError::InvalidColumnFamily(column.name().to_string()))
    }

    /// Read and decode one value.
    pub fn get<T: DeserializeOwned>(
        &self,
        column: Column,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        let cf = self.handle(column)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode every row of a column in key order.
    pub fn scan<T: DeserializeOwned>(
        &self,
        column: Column,
    ) -> Result<Vec<(Vec<u8>, T)>, StorageError> {
        let cf = self.handle(column)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            rows.push((key.to_vec(), serde_json::from_slice(&value)?));
        }
        Ok(rows)
    }

    /// Create a new write batch.
    pub fn new_batch(&self) -> WriteBatch {
        WriteBatch::new(self.db.clone())
    }

    /// Atomically apply `batch` as the next generation.
    pub fn commit(&self, mut batch: WriteBatch) -> Result<u64, StorageError> {
        let mut generation = self.generation.write();
        let next = *generation + 1;
        let rows = batch.len();

        let cf = self.handle(Column::Metadata)?;
        batch.inner.put_cf(cf, GENERATION_KEY, next.to_be_bytes());

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch.inner, &write_opts)?;
        *generation = next;

        tracing::debug!("Committed generation {} ({} rows written)", next, rows);
        Ok(next)
    }
}

fn decode_generation(bytes: &[u8]) -> Result<u64, StorageError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Corrupt(format!("bad generation record: {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// Rows applied together by [`StateStore::commit`].
pub struct WriteBatch {
    inner: rocksdb::WriteBatch,
    db: Arc<DB>,
}

impl WriteBatch {
    fn new(db: Arc<DB>) -> Self {
        Self {
            inner: rocksdb::WriteBatch::default(),
            db,
        }
    }

    /// Stage an encoded value.
    pub fn put<T: Serialize>(
        &mut self,
        column: Column,
        key: &[u8],
        value: &T,
    ) -> Result<(), StorageError> {
        let cf = self
            .db
            .cf_handle(column.name())
            .ok_or_else(|| StorageError::InvalidColumnFamily(column.name().to_string()))?;
        let bytes = serde_json::to_vec(value)?;
        self.inner.put_cf(cf, key, bytes);
        Ok(())
    }

    /// Stage a deletion.
    pub fn delete(&mut self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        let cf = self
            .db
            .cf_handle(column.name())
            .ok_or_else(|| StorageError::InvalidColumnFamily(column.name().to_string()))?;
        self.inner.delete_cf(cf, key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
