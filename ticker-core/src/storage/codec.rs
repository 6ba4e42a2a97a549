//! Checksummed, versioned envelope for persisted snapshots
//!
//! ```text
//! data ──serde_json──▶ text ──checksum──▶ { data, timestamp, checksum, version }
//!                                              │ serde_json
//!                                              ▼
//!                       base64 ◀── XOR with static key ◀── envelope bytes
//! ```
//!
//! The XOR pass is obfuscation only. Anyone holding this crate can reverse
//! it; it keeps casual edits of the stored blob from parsing, nothing more.
//! Integrity comes from the checksum, which catches accidental corruption
//! but not deliberate tampering.
//!
//! The envelope keeps `data` as raw JSON text, so the checksum on load is
//! computed over exactly the bytes that were hashed on save.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::sync::Arc;
use tracing::{debug, warn};

use super::backend::KeyValueStore;
use crate::config::constants::{OBFUSCATION_KEY, STORAGE_KEY_PREFIX, STORAGE_VERSION};
use crate::core::StorageError;

/// Storage key for snapshot `name`
pub fn storage_key(name: &str) -> String {
    format!("{}{}", STORAGE_KEY_PREFIX, name)
}

/// Rolling 31-multiplier string hash over UTF-16 code units, as hex
pub fn checksum(text: &str) -> String {
    let hash = text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });
    format!("{:08x}", hash as u32)
}

/// XOR `bytes` with the repeating static key. Self-inverse.
fn obfuscate(bytes: &mut [u8]) {
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte ^= OBFUSCATION_KEY[i % OBFUSCATION_KEY.len()];
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    data: Box<RawValue>,
    timestamp: u64,
    checksum: String,
    version: u32,
}

/// Restored payload with its envelope metadata
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem<T> {
    pub data: T,
    /// Epoch milliseconds of the save
    pub timestamp: u64,
    pub checksum: String,
    pub version: u32,
}

/// Wrap `data` in a checksummed envelope and encode it for storage
pub fn encode<T: Serialize>(data: &T, now_ms: u64) -> Result<String, StorageError> {
    let text = serde_json::to_string(data).map_err(|e| StorageError::Serialize(e.to_string()))?;
    let checksum = checksum(&text);
    let data = RawValue::from_string(text).map_err(|e| StorageError::Serialize(e.to_string()))?;

    let envelope = Envelope {
        data,
        timestamp: now_ms,
        checksum,
        version: STORAGE_VERSION,
    };

    let mut bytes =
        serde_json::to_vec(&envelope).map_err(|e| StorageError::Serialize(e.to_string()))?;
    obfuscate(&mut bytes);
    Ok(STANDARD.encode(bytes))
}

/// Decode and verify a blob produced by [`encode`].
///
/// Unknown versions are rejected before the checksum is looked at.
pub fn decode<T: DeserializeOwned>(blob: &str) -> Result<StoredItem<T>, StorageError> {
    let mut bytes = STANDARD
        .decode(blob.trim())
        .map_err(|e| StorageError::Decode(e.to_string()))?;
    obfuscate(&mut bytes);

    let envelope: Envelope =
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Parse(e.to_string()))?;

    if envelope.version != STORAGE_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: envelope.version,
            expected: STORAGE_VERSION,
        });
    }

    let computed = checksum(envelope.data.get());
    if computed != envelope.checksum {
        return Err(StorageError::ChecksumMismatch {
            stored: envelope.checksum,
            computed,
        });
    }

    let data = serde_json::from_str(envelope.data.get())
        .map_err(|e| StorageError::Parse(e.to_string()))?;

    Ok(StoredItem {
        data,
        timestamp: envelope.timestamp,
        checksum: envelope.checksum,
        version: envelope.version,
    })
}

/// Codec bound to a key-value backend
#[derive(Clone)]
pub struct SecureStorage {
    backend: Arc<dyn KeyValueStore>,
}

impl SecureStorage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Encode `data` and write it under `secure_ticker_{name}`
    pub fn persist<T: Serialize>(&self, name: &str, data: &T, now_ms: u64) -> Result<(), StorageError> {
        let key = storage_key(name);
        let blob = encode(data, now_ms)?;
        self.backend.set(&key, &blob)?;
        debug!(key = %key, bytes = blob.len(), "Persisted snapshot");
        Ok(())
    }

    /// Read and verify `secure_ticker_{name}`
    pub fn restore<T: DeserializeOwned>(&self, name: &str) -> Result<StoredItem<T>, StorageError> {
        let key = storage_key(name);
        let blob = self
            .backend
            .get(&key)?
            .ok_or_else(|| StorageError::Missing { key: key.clone() })?;

        decode(&blob).inspect_err(|e| {
            warn!(key = %key, error = %e, "Discarding stored snapshot");
        })
    }

    pub fn clear(&self, name: &str) -> Result<(), StorageError> {
        self.backend.remove(&storage_key(name))
    }
}

impl std::fmt::Debug for SecureStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStorage").finish_non_exhaustive()
    }
}
