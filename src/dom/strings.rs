//! String Interning Pool
//!
//! Owned storage for element names, attribute names/values and text content.
//! Sources are dropped after each read, so every string is copied into the
//! pool; identical strings share one entry.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Interned string identifier. `0` is the empty string.
pub type StrId = u32;

/// Entry layout: (offset into `data`, length in bytes)
#[derive(Debug, Clone, Copy)]
struct Entry {
    offset: u32,
    len: u32,
}

/// String interning pool
///
/// Memory layout:
/// - `entries`: one span per interned string ID
/// - `data`: concatenated string bytes
/// - `hash_index`: content hash -> IDs with that hash (collisions are rare)
#[derive(Debug)]
pub struct StringPool {
    entries: Vec<Entry>,
    data: String,
    hash_index: HashMap<u64, Vec<StrId>>,
}

impl StringPool {
    /// Create a new empty string pool
    pub fn new() -> Self {
        let mut pool = StringPool {
            entries: Vec::with_capacity(256),
            data: String::with_capacity(4096),
            hash_index: HashMap::new(),
        };
        // Entry 0 is reserved for ""
        pool.entries.push(Entry { offset: 0, len: 0 });
        pool
    }

    #[inline]
    fn compute_hash(s: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern a string, returning the existing ID when the content is already stored.
    ///
    /// Returns `None` once the pool outgrows 32-bit offsets or IDs.
    pub fn intern(&mut self, s: &str) -> Option<StrId> {
        if s.is_empty() {
            return Some(0);
        }

        let hash = Self::compute_hash(s);
        if let Some(ids) = self.hash_index.get(&hash) {
            for &id in ids {
                if self.get(id) == Some(s) {
                    return Some(id);
                }
            }
        }

        let offset = u32::try_from(self.data.len()).ok()?;
        let len = u32::try_from(s.len()).ok()?;
        offset.checked_add(len)?;
        let id = StrId::try_from(self.entries.len()).ok()?;

        self.data.push_str(s);
        self.entries.push(Entry { offset, len });
        self.hash_index.entry(hash).or_default().push(id);

        Some(id)
    }

    /// Resolve an ID
    pub fn get(&self, id: StrId) -> Option<&str> {
        let entry = self.entries.get(id as usize)?;
        let start = entry.offset as usize;
        self.data.get(start..start + entry.len as usize)
    }

}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}
