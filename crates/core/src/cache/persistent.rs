//! Durable snapshots of string caches.
//!
//! A snapshot file is laid out as:
//!
//! ```text
//! u32 LE header length | bincode(SnapshotHeader) | bincode(Vec<(String, String)>)
//! ```
//!
//! The header carries magic bytes, a format version, the entry count and a
//! SHA-256 checksum of the payload. Entries are written least-recently-used
//! first so that replaying them as plain inserts restores the same eviction
//! order. Saves go to a sibling temp file which is synced and then renamed
//! over the previous snapshot.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::memory::{MemoryCache, StringCache};
use super::sized::SizedCache;
use crate::Error;

/// Magic bytes identifying a feedsift snapshot.
const SNAPSHOT_MAGIC: [u8; 4] = *b"FSNP";

/// Current snapshot format version. Increment on breaking changes.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Upper bound on the decoded header. Magic, two varints and a 64-char hex
/// checksum fit well inside it.
const HEADER_LIMIT: usize = 256;

/// Upper bound on bytes a payload may claim while decoding. Length prefixes
/// past it fail instead of allocating.
const PAYLOAD_LIMIT: usize = 1 << 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    format_version: u32,
    entries: u64,
    checksum: String,
}

/// Reasons a snapshot could not be encoded or decoded.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot truncated")]
    Truncated,

    #[error("bad magic bytes")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("entry count mismatch: header says {expected}, payload has {actual}")]
    EntryCount { expected: u64, actual: u64 },

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

fn checksum(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Serialize ordered entries into the snapshot byte layout.
pub fn encode_snapshot(items: &[(String, String)]) -> Result<Vec<u8>, SnapshotError> {
    let config = bincode::config::standard();
    let payload = bincode::serde::encode_to_vec(items, config).map_err(|e| SnapshotError::Encode(e.to_string()))?;

    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        format_version: SNAPSHOT_FORMAT_VERSION,
        entries: items.len() as u64,
        checksum: checksum(&payload),
    };
    let header_bytes =
        bincode::serde::encode_to_vec(&header, config).map_err(|e| SnapshotError::Encode(e.to_string()))?;

    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Parse and validate snapshot bytes, returning entries in file order.
pub fn decode_snapshot(raw: &[u8]) -> Result<Vec<(String, String)>, SnapshotError> {
    let len_bytes: [u8; 4] = raw.get(..4).and_then(|b| b.try_into().ok()).ok_or(SnapshotError::Truncated)?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_end = 4usize.checked_add(header_len).ok_or(SnapshotError::Truncated)?;
    let header_bytes = raw.get(4..header_end).ok_or(SnapshotError::Truncated)?;

    let header_config = bincode::config::standard().with_limit::<HEADER_LIMIT>();
    let (header, _): (SnapshotHeader, usize) = bincode::serde::decode_from_slice(header_bytes, header_config)
        .map_err(|e| SnapshotError::Decode(e.to_string()))?;

    if header.magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    if header.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(header.format_version));
    }

    let payload = &raw[header_end..];
    let actual = checksum(payload);
    if actual != header.checksum {
        return Err(SnapshotError::ChecksumMismatch { expected: header.checksum, actual });
    }

    if payload.len() > PAYLOAD_LIMIT {
        return Err(SnapshotError::Decode(format!("payload of {} bytes exceeds {PAYLOAD_LIMIT}", payload.len())));
    }
    let payload_config = bincode::config::standard().with_limit::<PAYLOAD_LIMIT>();
    let (items, read): (Vec<(String, String)>, usize) = bincode::serde::decode_from_slice(payload, payload_config)
        .map_err(|e| SnapshotError::Decode(e.to_string()))?;
    if read != payload.len() {
        return Err(SnapshotError::Decode(format!("{} trailing bytes", payload.len() - read)));
    }
    if items.len() as u64 != header.entries {
        return Err(SnapshotError::EntryCount { expected: header.entries, actual: items.len() as u64 });
    }

    Ok(items)
}

/// A [`MemoryCache`] bound to a snapshot file.
///
/// Load it at the start of a run, share it between workers through
/// [`StringCache`], and call [`PersistentCache::save`] when the run ends.
#[derive(Debug)]
pub struct PersistentCache {
    name: String,
    path: PathBuf,
    cache: MemoryCache,
}

impl PersistentCache {
    /// Load the snapshot at `path` into a cache of `capacity` bytes.
    ///
    /// A missing file yields an empty cache. Any other read or decode failure
    /// is an [`Error::CacheLoad`]; the caller must abort the run rather than
    /// continue with lost history.
    pub fn load(name: impl Into<String>, path: impl Into<PathBuf>, capacity: u64) -> Result<Self, Error> {
        let name = name.into();
        let path = path.into();
        let mut sized = SizedCache::new(capacity);

        match fs::read(&path) {
            Ok(raw) => {
                let items = decode_snapshot(&raw).map_err(|e| Error::CacheLoad {
                    cache: name.clone(),
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                for (key, value) in items {
                    sized.set(key, value);
                }
                tracing::debug!(
                    cache = %name,
                    path = %path.display(),
                    entries = sized.len(),
                    size = sized.size(),
                    "loaded snapshot"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(cache = %name, path = %path.display(), "no snapshot, starting empty");
            }
            Err(e) => {
                return Err(Error::CacheLoad { cache: name, path, reason: e.to_string() });
            }
        }

        Ok(Self { name, path, cache: MemoryCache::from_sized(sized) })
    }

    /// Atomically replace the snapshot file with the current contents.
    pub fn save(&self) -> Result<(), Error> {
        let items = self.cache.items();
        let bytes = encode_snapshot(&items).map_err(|e| self.save_error(e.to_string()))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.save_error(e.to_string()))?;
        }

        let tmp = temp_path(&self.path);
        if let Err(e) = write_synced(&tmp, &bytes).and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(self.save_error(e.to_string()));
        }
        sync_parent(&self.path).map_err(|e| self.save_error(e.to_string()))?;

        tracing::debug!(cache = %self.name, path = %self.path.display(), entries = items.len(), "saved snapshot");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory cache, for diagnostics such as `size` and `items`.
    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    fn save_error(&self, reason: String) -> Error {
        Error::CacheSave { cache: self.name.clone(), path: self.path.clone(), reason }
    }
}

impl StringCache for PersistentCache {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key)
    }

    fn set(&self, key: &str, value: String) {
        self.cache.set(key, value);
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Flush the directory entry so a completed rename survives power loss.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
