//! Flash slot cache.
//!
//! The persisted layout is `slots × slot_len` fixed-width NUL-terminated
//! byte strings, addressed 1-based as `@N` in scripts.  The whole blob is
//! cached in RAM; every write is a read-modify-write of the entire table
//! through the [`Storage`] collaborator.

use std::path::PathBuf;

use crate::script::value::Value;
use crate::services::Storage;

/// RAM cache of the flash slot table.
#[derive(Debug)]
pub struct FlashCache {
    blob: Vec<u8>,
    slots: usize,
    slot_len: usize,
}

impl FlashCache {
    pub fn new(slots: usize, slot_len: usize) -> FlashCache {
        FlashCache {
            blob: vec![0; slots * slot_len],
            slots,
            slot_len,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Fill the cache from storage.
    pub fn load(&mut self, storage: &mut dyn Storage) {
        let mut blob = storage.load_flash(self.slots * self.slot_len);
        blob.resize(self.slots * self.slot_len, 0);
        self.blob = blob;
    }

    /// Read slot `n` (1-based): the bytes up to the first NUL.  An empty
    /// slot reads as the sentinel default `"0"`.
    pub fn read(&self, n: usize) -> Value {
        debug_assert!(n >= 1 && n <= self.slots);
        let start = (n - 1) * self.slot_len;
        let slot = &self.blob[start..start + self.slot_len];
        let len = slot.iter().position(|&b| b == 0).unwrap_or(self.slot_len);
        if len == 0 {
            Value::str("0")
        } else {
            Value::str(String::from_utf8_lossy(&slot[..len]).into_owned())
        }
    }

    /// Write slot `n` (1-based): truncate to the slot width, NUL-pad, and
    /// write the whole table through storage.  `false` if the storage write
    /// failed (the cache still holds the new value).
    pub fn write(&mut self, n: usize, bytes: &[u8], storage: &mut dyn Storage) -> bool {
        debug_assert!(n >= 1 && n <= self.slots);
        let start = (n - 1) * self.slot_len;
        let slot = &mut self.blob[start..start + self.slot_len];
        slot.fill(0);
        let len = bytes.len().min(self.slot_len);
        slot[..len].copy_from_slice(&bytes[..len]);
        storage.save_flash(&self.blob)
    }
}

// ── File-backed storage ───────────────────────────────────────────────────

/// [`Storage`] backed by a single file, for host builds.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> FileStorage {
        FileStorage { path: path.into() }
    }
}

impl Storage for FileStorage {
    fn load_flash(&mut self, len: usize) -> Vec<u8> {
        let mut blob = std::fs::read(&self.path).unwrap_or_default();
        blob.resize(len, 0);
        blob
    }

    fn save_flash(&mut self, blob: &[u8]) -> bool {
        std::fs::write(&self.path, blob).is_ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
