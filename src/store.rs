//! Host-owned key/value store exposed to modules.
//!
//! A single flat mapping shared by every module: no plugin-scoped
//! namespacing exists at the ABI level, so callers prefix their keys if they
//! want isolation. All operations are synchronous and immediately visible to
//! subsequent calls from any module; writes are last-write-wins.

use std::collections::HashMap;
use std::ffi::{CString, c_char};
use std::sync::RwLock;

/// The host's flat key/value store.
///
/// Values are stored null-terminated so they can be handed across the C
/// boundary without re-marshaling.
pub struct DataStore {
    map: RwLock<HashMap<String, CString>>,
}

impl DataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Store a value under a key, replacing any previous value.
    ///
    /// Returns false only when the value cannot cross the boundary
    /// (interior NUL byte); the store itself never rejects a write.
    pub fn set(&self, key: &str, value: &str) -> bool {
        let Ok(value) = CString::new(value) else {
            return false;
        };
        self.map.write().unwrap().insert(key.to_string(), value);
        true
    }

    /// Fetch a copy of the value for a key, or `None` when absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let map = self.map.read().unwrap();
        map.get(key).map(|v| v.to_string_lossy().into_owned())
    }

    /// Whether a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.map.read().unwrap().contains_key(key)
    }

    /// Remove a key. Returns false when it was absent.
    pub fn delete(&self, key: &str) -> bool {
        self.map.write().unwrap().remove(key).is_some()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.map.read().unwrap().is_empty()
    }

    /// Borrowless fetch for the C boundary: a pointer to the stored value,
    /// or null when absent.
    ///
    /// The pointed-to bytes live until the next `set` or `delete` of the
    /// *same key*; writes to other keys leave them in place (the map may
    /// move its entries, but not the value's heap buffer). This is the
    /// documented sharp edge of `get_data`, not a long-term stability
    /// guarantee.
    pub(crate) fn get_raw(&self, key: &str) -> *const c_char {
        let map = self.map.read().unwrap();
        map.get(key).map_or(std::ptr::null(), |v| v.as_ptr())
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore").field("entries", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let store = DataStore::new();
        assert!(store.set("k", "v"));
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert!(store.has("k"));
        assert!(store.delete("k"));
        assert!(!store.has("k"));
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_missing_key_is_not_an_error() {
        let store = DataStore::new();
        assert_eq!(store.get("absent"), None);
        assert!(!store.has("absent"));
        assert!(!store.delete("absent"));
    }

    #[test]
    fn test_last_write_wins() {
        let store = DataStore::new();
        store.set("k", "first");
        store.set("k", "second");
        assert_eq!(store.get("k").as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_interior_nul_rejected() {
        let store = DataStore::new();
        assert!(!store.set("k", "a\0b"));
        assert!(!store.has("k"));
    }

    #[test]
    fn test_raw_pointer_null_for_missing() {
        let store = DataStore::new();
        assert!(store.get_raw("absent").is_null());
        store.set("k", "v");
        assert!(!store.get_raw("k").is_null());
    }
}
