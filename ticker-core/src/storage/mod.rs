//! Persistence of engine snapshots
//!
//! [`codec`] turns a snapshot into a checksummed, versioned, obfuscated
//! blob; [`backend`] decides where the blob lives.

pub mod backend;
pub mod codec;

pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use codec::{checksum, decode, encode, storage_key, SecureStorage, StoredItem};
