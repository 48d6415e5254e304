// src/watch/hash.rs

//! Content hashing for `use_hash` bindings.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Hash of a single file's contents, hex encoded.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let contents = fs.read(path)?;
    Ok(blake3::hash(&contents).to_hex().to_string())
}

/// Aggregate hash from `(path, file hash)` pairs.
///
/// Pairs must be sorted by path. Paths are part of the hash, so renaming a
/// file changes it even when contents do not.
pub fn compute_aggregate_hash<'a>(entries: impl IntoIterator<Item = (&'a Path, &'a str)>) -> String {
    let mut hasher = Hasher::new();
    for (path, hash) in entries {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, "computed aggregate hash");
    hash
}

/// Last aggregate hash per binding.
pub trait HashStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&mut self, key: &str, hash: &str);
}

/// Stores hashes in memory only, for the lifetime of a watch session.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    map: HashMap<String, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn save(&mut self, key: &str, hash: &str) {
        self.map.insert(key.to_string(), hash.to_string());
        debug!(key = %key, hash = %hash, "stored binding hash");
    }
}
