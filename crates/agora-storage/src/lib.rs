//! Agora Storage - RocksDB-backed keyed stores for the governance engine.
//!
//! The engine state is split across column families (accounts, reputation,
//! proposals, treasury, plus a metadata family for headers and the commit
//! counter). Each engine operation lands as one synced [`WriteBatch`], so a
//! reopened store never observes half of an operation.

pub mod error;
pub mod store;

pub use error::StorageError;
pub use store::{Column, Compression, StateStore, StoreConfig, WriteBatch};
