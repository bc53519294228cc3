//! Storage adapter contract and the generic sharded-file store (spec §4.6).

mod adapter;
mod error;
mod value;

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "fs")]
mod fs;

#[cfg(feature = "rocksdb")]
mod rocks;

#[cfg(feature = "redb")]
mod redb_store;

pub use adapter::StorageAdapter;
pub use error::StoreError;
pub use value::{canonical_id_string, canonical_value_string, safe_name};

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "fs")]
pub use fs::{FakeFilesystemDriver, FilesystemDriver, FsStore, RealFilesystemDriver};

#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;

#[cfg(feature = "redb")]
pub use redb_store::RedbStore;
